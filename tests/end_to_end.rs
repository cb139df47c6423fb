//! 엔드투엔드 시나리오 테스트
//!
//! 로컬호스트 UDP 소켓으로 서버/클라이언트 풀 스택을 돌린다.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;

use rdtp::{Client, Config, Error, LossInjector, Server};

fn test_config(segment_size: usize) -> Config {
    Config {
        segment_size,
        recv_timeout_ms: 200,
        handshake_timeout_ms: 2000,
        max_consecutive_timeouts: 3,
        server_poll_ms: 50,
        recv_buffer_size: 65535,
    }
}

/// 임시 데이터 디렉터리 위에서 서버를 띄우고 주소를 돌려준다
async fn spawn_server(data_dir: &Path, segment_size: usize) -> (Arc<Server>, SocketAddr) {
    let server = Arc::new(Server::new(test_config(segment_size), data_dir.to_path_buf()).unwrap());

    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    let srv = server.clone();
    tokio::spawn(async move {
        let _ = srv.serve(socket).await;
    });

    (server, addr)
}

#[tokio::test]
async fn scenario_a_clean_transfer() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("alpha.bin"), b"ABCDEFGHIJ").unwrap();

    let (server, addr) = spawn_server(dir.path(), 4).await;
    let out = dir.path().join("out/alpha.bin");

    let mut client = Client::new(test_config(4), addr);
    let outcome = client
        .request_file("alpha.bin", Some(&out))
        .await
        .unwrap();

    assert_eq!(outcome.data.as_ref(), b"ABCDEFGHIJ");
    assert_eq!(outcome.stats.total_segments, 3);
    assert_eq!(outcome.stats.nacks_sent, 0);
    assert_eq!(std::fs::read(&out).unwrap(), b"ABCDEFGHIJ");

    // OK가 서버 세션을 정리할 시간을 준다
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(server.store().is_empty());
    server.stop();
}

#[tokio::test]
async fn scenario_b_dropped_segment_recovered_by_nack() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("beta.bin"), b"ABCDEFGHIJ").unwrap();

    let (server, addr) = spawn_server(dir.path(), 4).await;
    let out = dir.path().join("out/beta.bin");

    // seq 1을 정확히 한 번 드롭: END의 갭 검출 -> NACK [1] -> 재전송으로 복구
    let injector = LossInjector::new(HashSet::from([1]), 0.0);
    let mut client = Client::new(test_config(4), addr).with_loss_injector(injector);
    let outcome = client.request_file("beta.bin", Some(&out)).await.unwrap();

    assert_eq!(outcome.data.as_ref(), b"ABCDEFGHIJ");
    assert!(outcome.stats.nacks_sent >= 1);
    assert_eq!(outcome.stats.discarded_frames, 1);
    assert_eq!(std::fs::read(&out).unwrap(), b"ABCDEFGHIJ");
    server.stop();
}

#[tokio::test]
async fn scenario_c_missing_file_yields_err_and_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let (server, addr) = spawn_server(dir.path(), 4).await;
    let out = dir.path().join("out/nope.bin");

    let mut client = Client::new(test_config(4), addr);
    let result = client.request_file("nao_existe.bin", Some(&out)).await;

    assert!(matches!(result, Err(Error::ServerError { code: 0x01, .. })));
    assert!(!out.exists());
    assert!(server.store().is_empty());
    server.stop();
}

#[tokio::test]
async fn path_escape_is_rejected_with_invalid_path() {
    let dir = tempfile::tempdir().unwrap();
    let (server, addr) = spawn_server(dir.path(), 4).await;

    let mut client = Client::new(test_config(4), addr);
    let result = client.request_file("../etc/passwd", None).await;

    assert!(matches!(result, Err(Error::ServerError { code: 0x02, .. })));
    server.stop();
}

#[tokio::test]
async fn zero_length_file_completes_via_end() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("vazio.bin"), b"").unwrap();

    let (server, addr) = spawn_server(dir.path(), 4).await;
    let out = dir.path().join("out/vazio.bin");

    let mut client = Client::new(test_config(4), addr);
    let outcome = client.request_file("vazio.bin", Some(&out)).await.unwrap();

    assert!(outcome.data.is_empty());
    assert_eq!(outcome.stats.total_segments, 0);
    assert_eq!(std::fs::read(&out).unwrap(), b"");
    server.stop();
}

#[tokio::test]
async fn multi_segment_file_with_scattered_drops() {
    let dir = tempfile::tempdir().unwrap();
    let data: Vec<u8> = (0..=255u8).cycle().take(20_000).collect();
    std::fs::write(dir.path().join("grande.bin"), &data).unwrap();

    let (server, addr) = spawn_server(dir.path(), 1200).await;

    // 흩어진 seq 드롭: 전부 NACK 라운드로 복구되어야 한다
    let injector = LossInjector::new(HashSet::from([0, 7, 8, 16]), 0.0);
    let mut client = Client::new(test_config(1200), addr).with_loss_injector(injector);
    let outcome = client.request_file("grande.bin", None).await.unwrap();

    assert_eq!(outcome.data.as_ref(), data.as_slice());
    assert!(outcome.stats.nacks_sent >= 1);
    server.stop();
}

#[tokio::test]
async fn unreachable_server_aborts_after_timeout_ceiling() {
    // 아무도 듣지 않는 주소
    let dead = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = dead.local_addr().unwrap();
    drop(dead);

    let mut config = test_config(4);
    config.handshake_timeout_ms = 100;
    config.recv_timeout_ms = 100;

    let mut client = Client::new(config, addr);
    let result = client.request_file("x.bin", None).await;

    assert!(matches!(result, Err(Error::Timeout { attempts: 3 })));
}

#[tokio::test]
async fn consecutive_requests_reuse_server() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("um.bin"), b"primeiro arquivo").unwrap();
    std::fs::write(dir.path().join("dois.bin"), b"segundo").unwrap();

    let (server, addr) = spawn_server(dir.path(), 5).await;

    let mut client = Client::new(test_config(5), addr);
    let first = client.request_file("um.bin", None).await.unwrap();
    assert_eq!(first.data.as_ref(), b"primeiro arquivo");

    let mut client = Client::new(test_config(5), addr);
    let second = client.request_file("dois.bin", None).await.unwrap();
    assert_eq!(second.data.as_ref(), b"segundo");

    server.stop();
}
