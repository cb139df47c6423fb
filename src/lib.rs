//! # RDTP (Reliable Datagram Transfer Protocol)
//!
//! UDP 기반 NACK 선택적 재전송 파일 전송 프로토콜
//!
//! ## 핵심 특징
//! - **낙관적 전송**: 서버가 전체 파일을 한 번에 쏟아낸 뒤 갭만 복구
//! - **NACK 기반**: ACK 없이 누락 세그먼트만 요청
//! - **이중 무결성**: 패킷별 CRC32 + 파일 전체 CRC32
//! - **세션 캐시**: 인코딩된 DATA 프레임을 주소별로 캐싱, 재분할 없이 재전송
//! - **손실 주입기**: 테스트용 결정적/확률적 패킷 드롭

pub mod client;
pub mod config;
pub mod error;
pub mod frame;
pub mod fsio;
pub mod loss;
pub mod segment;
pub mod server;
pub mod session;
pub mod stats;

pub use client::{Client, TransferOutcome};
pub use config::Config;
pub use error::{Error, Result};
pub use frame::{ErrCode, Frame};
pub use loss::LossInjector;
pub use segment::{file_crc32, Segmenter};
pub use server::Server;
pub use session::{SessionEntry, SessionStore};
pub use stats::TransferStats;

/// 프로토콜 버전
pub const PROTOCOL_VERSION: u8 = 1;

/// 기본 세그먼트 크기 (바이트)
pub const DEFAULT_SEGMENT_SIZE: usize = 1200;

/// 최대 세그먼트 크기 (헤더 포함 UDP MTU 이하 유지)
pub const MAX_SEGMENT_SIZE: usize = 1300;

/// 최대 UDP 페이로드 (수신 버퍼 크기 산정용)
pub const MAX_UDP_PAYLOAD: usize = 1472;
