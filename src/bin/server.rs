//! RDTP 서버 - Reliable Datagram Transfer Protocol
//!
//! NACK 기반 선택적 재전송 파일 서버
//! - GET 수신 시 전체 파일을 낙관적으로 한 번에 전송
//! - 인코딩된 세그먼트를 캐싱해 NACK에 즉시 응답
//!
//! 사용법:
//!   cargo run --release --bin rdtp-server -- [OPTIONS]
//!
//! 예시:
//!   cargo run --release --bin rdtp-server -- --bind 0.0.0.0:9000 --data-dir data

use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use rdtp::{Config, Server};

/// 서버 설정
struct ServerConfig {
    bind_addr: SocketAddr,
    data_dir: PathBuf,
    config: Config,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:9000".parse().unwrap(),
            data_dir: PathBuf::from("data"),
            config: Config::default(),
        }
    }
}

fn parse_args() -> ServerConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ServerConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" | "-b" => {
                if i + 1 < args.len() {
                    config.bind_addr = args[i + 1].parse().expect("유효한 주소 필요");
                    i += 1;
                }
            }
            "--data-dir" | "-d" => {
                if i + 1 < args.len() {
                    config.data_dir = PathBuf::from(&args[i + 1]);
                    i += 1;
                }
            }
            "--segment-size" => {
                if i + 1 < args.len() {
                    config.config.segment_size = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!(
                    r#"RDTP Server - Reliable Datagram Transfer Protocol 서버

NACK 기반 선택적 재전송 파일 서버
- 전체 파일을 낙관적으로 한 번에 전송 후 갭만 재전송
- 패킷별 CRC32 + 파일 전체 CRC32 무결성

사용법:
  cargo run --release --bin rdtp-server -- [OPTIONS]

옵션:
  -b, --bind <ADDR>       바인드 주소 (기본: 0.0.0.0:9000)
  -d, --data-dir <DIR>    서빙할 파일 루트 (기본: data)
  --segment-size <SIZE>   세그먼트 크기 바이트, 1~1300 (기본: 1200)
  -h, --help              이 도움말 출력

예시:
  # 기본 실행
  cargo run --release --bin rdtp-server -- --data-dir ./data

  # 작은 세그먼트로 실행
  cargo run --release --bin rdtp-server -- -b 0.0.0.0:9000 --segment-size 512
"#
                );
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    config
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let server_config = parse_args();

    info!("RDTP Server starting...");
    info!("Bind address: {}", server_config.bind_addr);
    info!("Data dir: {:?}", server_config.data_dir);
    info!("Segment size: {} bytes", server_config.config.segment_size);

    let server = Server::new(server_config.config, server_config.data_dir)?;
    server.run(server_config.bind_addr).await?;

    Ok(())
}
