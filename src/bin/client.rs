//! RDTP 클라이언트 - Reliable Datagram Transfer Protocol
//!
//! NACK 기반 선택적 재전송 파일 수신 클라이언트
//! - 누락 세그먼트만 NACK으로 요청
//! - 크기 + 파일 CRC32 검증 통과 시에만 저장
//!
//! 사용법:
//!   cargo run --release --bin rdtp-client -- [OPTIONS]
//!
//! 예시:
//!   cargo run --release --bin rdtp-client -- --server 127.0.0.1:9000 --file data.bin

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use rdtp::{Client, Config, LossInjector};

/// 클라이언트 설정
struct ClientConfig {
    server_addr: SocketAddr,
    filename: Option<String>,
    out_path: Option<PathBuf>,
    drop_seqs: HashSet<u32>,
    drop_prob: f64,
    config: Config,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:9000".parse().unwrap(),
            filename: None,
            out_path: None,
            drop_seqs: HashSet::new(),
            drop_prob: 0.0,
            config: Config::default(),
        }
    }
}

fn parse_args() -> ClientConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ClientConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--server" | "-s" => {
                if i + 1 < args.len() {
                    config.server_addr = args[i + 1].parse().expect("유효한 주소 필요");
                    i += 1;
                }
            }
            "--file" | "-f" => {
                if i + 1 < args.len() {
                    config.filename = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--out" | "-o" => {
                if i + 1 < args.len() {
                    config.out_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--lossy" => {
                // 불안정한 네트워크 프리셋 (--timeout-ms보다 먼저 지정)
                config.config = Config::lossy_network();
            }
            "--timeout-ms" => {
                if i + 1 < args.len() {
                    config.config.recv_timeout_ms = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--drop" => {
                // 테스트 전용: "seq:1,5-9" 형식, 반복 지정 가능
                if i + 1 < args.len() {
                    config
                        .drop_seqs
                        .extend(LossInjector::parse_drop_spec(&args[i + 1]));
                    i += 1;
                }
            }
            "--drop-prob" => {
                if i + 1 < args.len() {
                    config.drop_prob = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!(
                    r#"RDTP Client - Reliable Datagram Transfer Protocol 클라이언트

NACK 기반 선택적 재전송 파일 수신 클라이언트
- 누락 세그먼트만 NACK으로 요청, 완료 시 OK로 서버 세션 정리
- 크기 + 파일 CRC32 검증 실패 시 비정상 종료 (파일 저장 안 함)

사용법:
  cargo run --release --bin rdtp-client -- [OPTIONS]

옵션:
  -s, --server <ADDR>    서버 주소 (기본: 127.0.0.1:9000)
  -f, --file <NAME>      요청할 파일 이름 (필수)
  -o, --out <PATH>       저장 경로 (기본: downloads/<파일명>)
  --lossy                불안정한 네트워크 프리셋 (긴 타임아웃, 여유 있는 재시도 한도)
  --timeout-ms <MS>      수신 타임아웃 밀리초 (기본: 1000)
  --drop <SPEC>          [테스트] 드롭할 seq 지정, 예: seq:1,5-9 (반복 가능)
  --drop-prob <P>        [테스트] 확률적 드롭 0.0~1.0 (기본: 0.0)
  -h, --help             이 도움말 출력

예시:
  # 파일 수신
  cargo run --release --bin rdtp-client -- -s 192.168.1.100:9000 -f data.bin

  # seq 1을 한 번 드롭해 NACK 복구 경로 확인
  cargo run --release --bin rdtp-client -- -f data.bin --drop seq:1
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

    let client_config = parse_args();

    let Some(filename) = client_config.filename.clone() else {
        eprintln!("--file <NAME> 필수 (--help 참고)");
        std::process::exit(2);
    };

    info!("RDTP Client starting...");
    info!("Server address: {}", client_config.server_addr);
    info!("Requested file: {}", filename);

    // 기본 저장 경로: downloads/<파일명>
    let out_path = client_config.out_path.clone().unwrap_or_else(|| {
        let base = std::path::Path::new(&filename)
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("received.bin"));
        PathBuf::from("downloads").join(base)
    });

    let injector = LossInjector::new(client_config.drop_seqs.clone(), client_config.drop_prob);
    let mut client = Client::new(client_config.config.clone(), client_config.server_addr)
        .with_loss_injector(injector);

    match client.request_file(&filename, Some(&out_path)).await {
        Ok(outcome) => {
            info!("Transfer complete!");
            info!("  {}", outcome.stats.summary());
            info!("  Saved to: {:?}", out_path);
            Ok(())
        }
        Err(e) => {
            error!("요청 실패: {}", e);
            std::process::exit(2);
        }
    }
}
