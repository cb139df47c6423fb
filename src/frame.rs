//! 와이어 프레임 코덱
//!
//! 여섯 가지 프레임의 바이너리 레이아웃과 체크섬 계산을 전담.
//! 모든 멀티바이트 정수는 빅엔디안, 인코딩/디코딩은 순수 함수.

use bytes::{BufMut, Bytes};

use crate::error::{Error, Result};
use crate::PROTOCOL_VERSION;

/// 프레임 타입 바이트
pub const T_GET: u8 = 0x01;
pub const T_DATA: u8 = 0x02;
pub const T_END: u8 = 0x03;
pub const T_NACK: u8 = 0x11;
pub const T_OK: u8 = 0x12;
pub const T_ERR: u8 = 0x7F;

/// 마지막 세그먼트 플래그 (offset + payload_len == total_size 일 때만)
pub const FLAG_FINAL: u8 = 0x01;

/// 고정 헤더 크기 (바이트)
pub const GET_HDR_SIZE: usize = 5; // type(1) ver(1) flags(1) name_len(2)
pub const DATA_HDR_SIZE: usize = 30; // type ver flags win_id seq(4) total(8) offset(8) plen(2) crc(4)
pub const END_HDR_SIZE: usize = 11; // type ver flags total_segments(4) file_crc(4)
pub const ERR_HDR_SIZE: usize = 5; // type ver code msg_len(2)
pub const NACK_HDR_SIZE: usize = 5; // type ver flags count(2)
pub const OK_SIZE: usize = 3; // type ver flags

/// ERR 프레임 코드
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrCode {
    /// 파일 없음
    NotFound = 0x01,

    /// 데이터 루트 밖 경로
    InvalidPath = 0x02,

    /// 기타
    Unknown = 0xFF,
}

impl ErrCode {
    pub fn from_u8(code: u8) -> Self {
        match code {
            0x01 => ErrCode::NotFound,
            0x02 => ErrCode::InvalidPath,
            _ => ErrCode::Unknown,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// 와이어 프레임
///
/// 공통 프리픽스: type(1) + version(1)
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// 파일 요청 (클라이언트 → 서버)
    Get { filename: String },

    /// 세그먼트 하나
    Data {
        flags: u8,
        window_id: u8,
        seq: u32,
        total_size: u64,
        offset: u64,
        payload: Bytes,
    },

    /// 전송 요약: 총 세그먼트 수 + 파일 전체 CRC32
    End { total_segments: u32, file_crc: u32 },

    /// 실패 알림 (서버 → 클라이언트, 터미널)
    Err { code: ErrCode, message: String },

    /// 누락 세그먼트 재전송 요청
    Nack { seqs: Vec<u32> },

    /// 완료 확인 (서버 세션 정리 트리거)
    Ok,
}

impl Frame {
    /// DATA 프레임 생성 (window_id는 이 리비전에서 항상 0)
    pub fn data(seq: u32, total_size: u64, offset: u64, payload: Bytes, is_final: bool) -> Self {
        Frame::Data {
            flags: if is_final { FLAG_FINAL } else { 0 },
            window_id: 0,
            seq,
            total_size,
            offset,
            payload,
        }
    }

    /// FINAL 플래그 여부 (DATA 전용)
    pub fn is_final(&self) -> bool {
        matches!(self, Frame::Data { flags, .. } if flags & FLAG_FINAL != 0)
    }

    /// 프레임을 바이트로 인코딩
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Frame::Get { filename } => {
                let name = filename.as_bytes();
                let mut buf = Vec::with_capacity(GET_HDR_SIZE + name.len());
                buf.put_u8(T_GET);
                buf.put_u8(PROTOCOL_VERSION);
                buf.put_u8(0);
                buf.put_u16(name.len() as u16);
                buf.put_slice(name);
                buf
            }
            Frame::Data {
                flags,
                window_id,
                seq,
                total_size,
                offset,
                payload,
            } => {
                let mut buf = Vec::with_capacity(DATA_HDR_SIZE + payload.len());
                buf.put_u8(T_DATA);
                buf.put_u8(PROTOCOL_VERSION);
                buf.put_u8(*flags);
                buf.put_u8(*window_id);
                buf.put_u32(*seq);
                buf.put_u64(*total_size);
                buf.put_u64(*offset);
                buf.put_u16(payload.len() as u16);

                // 체크섬: 체크섬 필드를 제외한 헤더 + 페이로드
                let mut hasher = crc32fast::Hasher::new();
                hasher.update(&buf);
                hasher.update(payload);
                buf.put_u32(hasher.finalize());
                buf.put_slice(payload);
                buf
            }
            Frame::End {
                total_segments,
                file_crc,
            } => {
                let mut buf = Vec::with_capacity(END_HDR_SIZE);
                buf.put_u8(T_END);
                buf.put_u8(PROTOCOL_VERSION);
                buf.put_u8(FLAG_FINAL);
                buf.put_u32(*total_segments);
                buf.put_u32(*file_crc);
                buf
            }
            Frame::Err { code, message } => {
                let msg = message.as_bytes();
                let mut buf = Vec::with_capacity(ERR_HDR_SIZE + msg.len());
                buf.put_u8(T_ERR);
                buf.put_u8(PROTOCOL_VERSION);
                buf.put_u8(code.as_u8());
                buf.put_u16(msg.len() as u16);
                buf.put_slice(msg);
                buf
            }
            Frame::Nack { seqs } => {
                let mut buf = Vec::with_capacity(NACK_HDR_SIZE + seqs.len() * 4);
                buf.put_u8(T_NACK);
                buf.put_u8(PROTOCOL_VERSION);
                buf.put_u8(0);
                buf.put_u16(seqs.len() as u16);
                for seq in seqs {
                    buf.put_u32(*seq);
                }
                buf
            }
            Frame::Ok => {
                vec![T_OK, PROTOCOL_VERSION, 0]
            }
        }
    }

    /// 바이트에서 프레임 디코딩
    ///
    /// 구조적 실패(잘림/타입/버전)와 무결성 실패(CRC)를 구분해 보고한다.
    pub fn decode(buf: &[u8]) -> Result<Frame> {
        if buf.len() < 2 {
            return Err(Error::Truncated {
                frame: "prefix",
                need: 2,
                got: buf.len(),
            });
        }

        let version = buf[1];
        if version != PROTOCOL_VERSION {
            return Err(Error::InvalidVersion {
                expected: PROTOCOL_VERSION,
                got: version,
            });
        }

        match buf[0] {
            T_GET => decode_get(buf),
            T_DATA => decode_data(buf),
            T_END => decode_end(buf),
            T_ERR => decode_err(buf),
            T_NACK => decode_nack(buf),
            T_OK => decode_ok(buf),
            other => Err(Error::UnknownFrameType { got: other }),
        }
    }
}

fn decode_get(buf: &[u8]) -> Result<Frame> {
    if buf.len() < GET_HDR_SIZE {
        return Err(Error::Truncated {
            frame: "GET",
            need: GET_HDR_SIZE,
            got: buf.len(),
        });
    }

    let name_len = u16::from_be_bytes([buf[3], buf[4]]) as usize;
    let end = GET_HDR_SIZE + name_len;
    if buf.len() < end {
        return Err(Error::Truncated {
            frame: "GET",
            need: end,
            got: buf.len(),
        });
    }

    let filename = std::str::from_utf8(&buf[GET_HDR_SIZE..end])
        .map_err(|_| Error::InvalidUtf8 { field: "filename" })?
        .to_owned();

    Ok(Frame::Get { filename })
}

fn decode_data(buf: &[u8]) -> Result<Frame> {
    if buf.len() < DATA_HDR_SIZE {
        return Err(Error::Truncated {
            frame: "DATA",
            need: DATA_HDR_SIZE,
            got: buf.len(),
        });
    }

    let flags = buf[2];
    let window_id = buf[3];
    let seq = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let total_size = u64::from_be_bytes(buf[8..16].try_into().unwrap_or_default());
    let offset = u64::from_be_bytes(buf[16..24].try_into().unwrap_or_default());
    let payload_len = u16::from_be_bytes([buf[24], buf[25]]) as usize;
    let rx_crc = u32::from_be_bytes([buf[26], buf[27], buf[28], buf[29]]);

    let end = DATA_HDR_SIZE + payload_len;
    if buf.len() < end {
        return Err(Error::Truncated {
            frame: "DATA",
            need: end,
            got: buf.len(),
        });
    }
    let payload = &buf[DATA_HDR_SIZE..end];

    // 체크섬 재계산: 헤더에서 체크섬 필드 앞까지 + 페이로드
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&buf[..DATA_HDR_SIZE - 4]);
    hasher.update(payload);
    let calc_crc = hasher.finalize();

    if rx_crc != calc_crc {
        return Err(Error::CrcMismatch {
            expected: rx_crc,
            got: calc_crc,
        });
    }

    Ok(Frame::Data {
        flags,
        window_id,
        seq,
        total_size,
        offset,
        payload: Bytes::copy_from_slice(payload),
    })
}

fn decode_end(buf: &[u8]) -> Result<Frame> {
    if buf.len() < END_HDR_SIZE {
        return Err(Error::Truncated {
            frame: "END",
            need: END_HDR_SIZE,
            got: buf.len(),
        });
    }

    Ok(Frame::End {
        total_segments: u32::from_be_bytes([buf[3], buf[4], buf[5], buf[6]]),
        file_crc: u32::from_be_bytes([buf[7], buf[8], buf[9], buf[10]]),
    })
}

fn decode_err(buf: &[u8]) -> Result<Frame> {
    if buf.len() < ERR_HDR_SIZE {
        return Err(Error::Truncated {
            frame: "ERR",
            need: ERR_HDR_SIZE,
            got: buf.len(),
        });
    }

    let code = ErrCode::from_u8(buf[2]);
    let msg_len = u16::from_be_bytes([buf[3], buf[4]]) as usize;
    let end = ERR_HDR_SIZE + msg_len;
    if buf.len() < end {
        return Err(Error::Truncated {
            frame: "ERR",
            need: end,
            got: buf.len(),
        });
    }

    let message = std::str::from_utf8(&buf[ERR_HDR_SIZE..end])
        .map_err(|_| Error::InvalidUtf8 { field: "message" })?
        .to_owned();

    Ok(Frame::Err { code, message })
}

fn decode_nack(buf: &[u8]) -> Result<Frame> {
    if buf.len() < NACK_HDR_SIZE {
        return Err(Error::Truncated {
            frame: "NACK",
            need: NACK_HDR_SIZE,
            got: buf.len(),
        });
    }

    // count가 실제 버퍼보다 크면 읽히는 만큼만 수용
    let count = u16::from_be_bytes([buf[3], buf[4]]) as usize;
    let mut seqs = Vec::with_capacity(count.min((buf.len() - NACK_HDR_SIZE) / 4));
    let mut off = NACK_HDR_SIZE;
    for _ in 0..count {
        if off + 4 > buf.len() {
            break;
        }
        seqs.push(u32::from_be_bytes([
            buf[off],
            buf[off + 1],
            buf[off + 2],
            buf[off + 3],
        ]));
        off += 4;
    }

    Ok(Frame::Nack { seqs })
}

fn decode_ok(buf: &[u8]) -> Result<Frame> {
    if buf.len() < OK_SIZE {
        return Err(Error::Truncated {
            frame: "OK",
            need: OK_SIZE,
            got: buf.len(),
        });
    }
    Ok(Frame::Ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_data(seq: u32, payload: &[u8]) -> Frame {
        Frame::data(seq, 100, seq as u64 * 4, Bytes::copy_from_slice(payload), false)
    }

    #[test]
    fn test_get_roundtrip() {
        let frame = Frame::Get {
            filename: "dir/arquivo.bin".into(),
        };
        let restored = Frame::decode(&frame.encode()).unwrap();
        assert_eq!(frame, restored);
    }

    #[test]
    fn test_data_roundtrip() {
        let frame = Frame::data(7, 1000, 700, Bytes::from_static(b"hello"), true);
        let bytes = frame.encode();
        let restored = Frame::decode(&bytes).unwrap();

        assert_eq!(frame, restored);
        assert!(restored.is_final());
    }

    #[test]
    fn test_end_err_nack_ok_roundtrip() {
        for frame in [
            Frame::End {
                total_segments: 42,
                file_crc: 0xDEADBEEF,
            },
            Frame::Err {
                code: ErrCode::NotFound,
                message: "arquivo não encontrado".into(),
            },
            Frame::Nack {
                seqs: vec![1, 5, 9],
            },
            Frame::Ok,
        ] {
            assert_eq!(frame, Frame::decode(&frame.encode()).unwrap());
        }
    }

    #[test]
    fn test_data_bit_flip_is_integrity_error() {
        let bytes = sample_data(3, b"payload bytes").encode();

        // 체크섬 필드(26..30) 제외 전 바이트 플립 검사
        for i in (2..bytes.len()).filter(|i| !(26..30).contains(i)) {
            let mut corrupted = bytes.clone();
            corrupted[i] ^= 0x40;
            match Frame::decode(&corrupted) {
                Err(e) => assert!(e.is_integrity() || e.is_structural(), "byte {i}"),
                Ok(_) => panic!("corrupted frame accepted at byte {i}"),
            }
        }
    }

    #[test]
    fn test_checksum_mismatch_is_distinct() {
        let mut bytes = sample_data(0, b"abcd").encode();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;

        let err = Frame::decode(&bytes).unwrap_err();
        assert!(err.is_integrity());
        assert!(!err.is_structural());
    }

    #[test]
    fn test_truncated_frames() {
        let bytes = sample_data(0, b"abcd").encode();
        for len in [0, 1, 5, DATA_HDR_SIZE, bytes.len() - 1] {
            let err = Frame::decode(&bytes[..len]).unwrap_err();
            assert!(err.is_structural(), "len {len}");
        }
    }

    #[test]
    fn test_version_mismatch() {
        let mut bytes = Frame::Ok.encode();
        bytes[1] = 9;
        assert!(matches!(
            Frame::decode(&bytes),
            Err(Error::InvalidVersion { expected: 1, got: 9 })
        ));
    }

    #[test]
    fn test_unknown_type() {
        assert!(matches!(
            Frame::decode(&[0x55, PROTOCOL_VERSION, 0]),
            Err(Error::UnknownFrameType { got: 0x55 })
        ));
    }

    #[test]
    fn test_nack_truncated_list_reads_what_fits() {
        let bytes = Frame::Nack {
            seqs: vec![10, 20, 30],
        }
        .encode();

        // 마지막 엔트리 중간에서 잘린 NACK: 두 개만 읽힘
        let decoded = Frame::decode(&bytes[..bytes.len() - 2]).unwrap();
        assert_eq!(decoded, Frame::Nack { seqs: vec![10, 20] });
    }

    #[test]
    fn test_empty_payload_data() {
        let frame = Frame::data(0, 0, 0, Bytes::new(), true);
        assert_eq!(frame, Frame::decode(&frame.encode()).unwrap());
    }
}
