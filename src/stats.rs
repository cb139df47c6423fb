//! 전송 통계

use std::time::{Duration, Instant};

/// 요청 한 건의 전송 통계
#[derive(Debug, Clone)]
pub struct TransferStats {
    /// 시작 시간
    pub start_time: Instant,

    /// 수신(또는 송신)한 총 페이로드 바이트
    pub total_bytes: u64,

    /// 수신한 고유 세그먼트 수
    pub total_segments: u64,

    /// 중복 수신 세그먼트 수
    pub duplicate_segments: u64,

    /// 버려진 프레임 수 (디코드 실패 + 손실 주입)
    pub discarded_frames: u64,

    /// 보낸 NACK 수
    pub nacks_sent: u64,

    /// NACK으로 요청한 seq 총수
    pub retransmits_requested: u64,
}

impl TransferStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            total_bytes: 0,
            total_segments: 0,
            duplicate_segments: 0,
            discarded_frames: 0,
            nacks_sent: 0,
            retransmits_requested: 0,
        }
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 처리율 (bytes/sec)
    pub fn throughput(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        self.total_bytes as f64 / elapsed
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Elapsed: {:.2}s | Segments: {} (+{} dup) | Bytes: {} | Throughput: {:.2} MB/s | NACKs: {} ({} seqs)",
            self.elapsed().as_secs_f64(),
            self.total_segments,
            self.duplicate_segments,
            self.total_bytes,
            self.throughput() / 1_000_000.0,
            self.nacks_sent,
            self.retransmits_requested,
        )
    }
}

impl Default for TransferStats {
    fn default() -> Self {
        Self::new()
    }
}
