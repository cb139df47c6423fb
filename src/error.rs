//! 에러 타입 정의

use thiserror::Error;

/// RDTP 프로토콜 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("프레임 잘림: {frame} 최소 {need} 바이트 필요, {got} 바이트 수신")]
    Truncated {
        frame: &'static str,
        need: usize,
        got: usize,
    },

    #[error("알 수 없는 프레임 타입: {got:#04X}")]
    UnknownFrameType { got: u8 },

    #[error("유효하지 않은 프로토콜 버전: expected {expected}, got {got}")]
    InvalidVersion { expected: u8, got: u8 },

    #[error("CRC 불일치: expected {expected:08X}, got {got:08X}")]
    CrcMismatch { expected: u32, got: u32 },

    #[error("유효하지 않은 UTF-8 필드: {field}")]
    InvalidUtf8 { field: &'static str },

    #[error("유효하지 않은 세그먼트 크기: {size} (허용 범위 1..={max})")]
    InvalidSegmentSize { size: usize, max: usize },

    #[error("서버 에러 ({code}): {message}")]
    ServerError { code: u8, message: String },

    #[error("전송 타임아웃: 연속 {attempts}회")]
    Timeout { attempts: u32 },

    #[error("진행 없는 타임아웃, 요청 중단")]
    NoProgress,

    #[error("조립 후 세그먼트 누락: {count}개")]
    MissingSegments { count: usize },

    #[error("크기 불일치: expected {expected} bytes, got {got} bytes")]
    SizeMismatch { expected: u64, got: u64 },

    #[error("파일 CRC 불일치: expected {expected:08X}, got {got:08X}")]
    FileCrcMismatch { expected: u32, got: u32 },

    #[error("유효하지 않은 경로: {path}")]
    InvalidPath { path: String },

    #[error("파일 없음: {path}")]
    FileNotFound { path: String },

    #[error("연결 종료")]
    ConnectionClosed,
}

impl Error {
    /// 구조적 디코드 실패 여부 (수신측에서 조용히 버림)
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Error::Truncated { .. }
                | Error::UnknownFrameType { .. }
                | Error::InvalidVersion { .. }
                | Error::InvalidUtf8 { .. }
        )
    }

    /// 무결성 실패 여부 (패킷 손실과 동일하게 취급)
    pub fn is_integrity(&self) -> bool {
        matches!(self, Error::CrcMismatch { .. })
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
