//! 프로토콜 설정

use crate::DEFAULT_SEGMENT_SIZE;

/// RDTP 프로토콜 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 세그먼트 크기 (바이트, 1..=1300)
    pub segment_size: usize,

    /// 클라이언트 수신 타임아웃 (밀리초)
    pub recv_timeout_ms: u64,

    /// 첫 응답(핸드쉐이크) 대기 타임아웃 (밀리초)
    pub handshake_timeout_ms: u64,

    /// 연속 타임아웃 한도 (도달 시 요청 중단)
    pub max_consecutive_timeouts: u32,

    /// 서버 수신 루프 폴링 주기 (밀리초, 종료 플래그 확인용)
    pub server_poll_ms: u64,

    /// 수신 버퍼 크기 (바이트)
    pub recv_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            segment_size: DEFAULT_SEGMENT_SIZE,
            recv_timeout_ms: 1000,            // 1초
            handshake_timeout_ms: 2000,       // 첫 응답은 2초
            max_consecutive_timeouts: 3,
            server_poll_ms: 200,
            recv_buffer_size: 65535,
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 불안정한 네트워크용 설정
    pub fn lossy_network() -> Self {
        Self {
            segment_size: 1000,               // 작은 세그먼트
            recv_timeout_ms: 2000,
            handshake_timeout_ms: 5000,
            max_consecutive_timeouts: 5,
            server_poll_ms: 200,
            recv_buffer_size: 65535,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MAX_SEGMENT_SIZE;

    #[test]
    fn test_lossy_preset_loosens_retry_budget() {
        let default = Config::default();
        let lossy = Config::lossy_network();

        // 프리셋은 기본보다 더 오래 기다리고 더 많이 재시도한다
        assert!(lossy.recv_timeout_ms > default.recv_timeout_ms);
        assert!(lossy.handshake_timeout_ms > default.handshake_timeout_ms);
        assert!(lossy.max_consecutive_timeouts > default.max_consecutive_timeouts);
        assert!(lossy.segment_size < default.segment_size);
        assert!(lossy.segment_size <= MAX_SEGMENT_SIZE);
    }
}
