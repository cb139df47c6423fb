//! 세그먼트 분할기 (송신측 전용)
//!
//! 파일 바이트를 고정 크기 페이로드로 순서대로 자르고,
//! 파일 전체 CRC32 누적 계산 헬퍼를 함께 제공한다.

use crate::error::{Error, Result};
use crate::MAX_SEGMENT_SIZE;

/// 분할된 세그먼트 하나 (시퀀스, 오프셋, 페이로드, 마지막 여부)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentRef<'a> {
    pub seq: u32,
    pub offset: u64,
    pub payload: &'a [u8],
    pub is_final: bool,
}

/// 세그먼트 분할기
///
/// 소스를 정확히 한 번, 갭/중복 없이 오름차순으로 커버한다.
/// `split` 호출마다 처음부터 다시 시작하는 새 이터레이터를 돌려준다.
#[derive(Debug, Clone, Copy)]
pub struct Segmenter {
    segment_size: usize,
}

impl Segmenter {
    /// 새 분할기 생성. 크기는 1..=MAX_SEGMENT_SIZE 로 제한
    pub fn new(segment_size: usize) -> Result<Self> {
        if segment_size == 0 || segment_size > MAX_SEGMENT_SIZE {
            return Err(Error::InvalidSegmentSize {
                size: segment_size,
                max: MAX_SEGMENT_SIZE,
            });
        }
        Ok(Self { segment_size })
    }

    /// 세그먼트 크기
    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    /// 총 세그먼트 수 계산 (빈 입력이면 0)
    pub fn segment_count(&self, total_size: u64) -> u32 {
        total_size.div_ceil(self.segment_size as u64) as u32
    }

    /// 데이터를 (seq, offset, payload) 시퀀스로 분할
    pub fn split<'a>(&self, data: &'a [u8]) -> impl Iterator<Item = SegmentRef<'a>> {
        let segment_size = self.segment_size;
        let total = data.len();

        data.chunks(segment_size)
            .enumerate()
            .map(move |(idx, payload)| {
                let offset = (idx * segment_size) as u64;
                SegmentRef {
                    seq: idx as u32,
                    offset,
                    payload,
                    is_final: offset as usize + payload.len() == total,
                }
            })
    }
}

/// 파일 전체 CRC32: 페이로드 바이트를 시퀀스 오름차순으로 순수 누적
pub fn file_crc32<'a>(payloads: impl IntoIterator<Item = &'a [u8]>) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    for payload in payloads {
        hasher.update(payload);
    }
    hasher.finalize()
}
