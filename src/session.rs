//! 서버 세션 저장소
//!
//! 요청자 주소별로 이미 인코딩된 DATA 프레임을 캐싱한다.
//! NACK 재전송 시 파일을 다시 읽거나 재분할하지 않는다.

use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::Bytes;
use dashmap::DashMap;

/// 요청자 하나의 캐시된 전송 상태
#[derive(Debug, Clone)]
pub struct SessionEntry {
    /// 요청된 파일 이름 (로그용)
    pub filename: String,

    /// 파일 전체 크기 (바이트)
    pub total_size: u64,

    /// 총 세그먼트 수
    pub total_segments: u32,

    /// seq -> 인코딩 완료된 DATA 프레임 바이트
    packets: HashMap<u32, Bytes>,
}

impl SessionEntry {
    pub fn new(filename: String, total_size: u64, total_segments: u32) -> Self {
        Self {
            filename,
            total_size,
            total_segments,
            packets: HashMap::with_capacity(total_segments as usize),
        }
    }

    /// 인코딩된 프레임 등록
    pub fn insert_packet(&mut self, seq: u32, encoded: Bytes) {
        self.packets.insert(seq, encoded);
    }

    /// 캐시된 프레임 조회
    pub fn packet(&self, seq: u32) -> Option<&Bytes> {
        self.packets.get(&seq)
    }

    /// 캐시된 프레임 수
    pub fn packet_count(&self) -> usize {
        self.packets.len()
    }
}

/// 주소 키 세션 저장소
///
/// 현재 수신 루프는 단일 태스크지만, 요청자별 병렬 처리로 확장해도
/// 안전하도록 DashMap으로 감싼다.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<SocketAddr, SessionEntry>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 세션 등록. 같은 주소의 기존 세션은 새 GET으로 대체된다.
    pub fn insert(&self, addr: SocketAddr, entry: SessionEntry) {
        self.sessions.insert(addr, entry);
    }

    /// OK 수신 시 세션 제거 (유일한 정리 경로)
    pub fn remove(&self, addr: &SocketAddr) -> Option<SessionEntry> {
        self.sessions.remove(addr).map(|(_, entry)| entry)
    }

    /// 요청된 seq 중 캐시에 존재하는 프레임만 순서대로 복제해 반환.
    /// 범위 밖 seq는 조용히 건너뛴다. 세션이 없으면 None.
    pub fn packets_for(&self, addr: &SocketAddr, seqs: &[u32]) -> Option<Vec<Bytes>> {
        let entry = self.sessions.get(addr)?;
        Some(
            seqs.iter()
                .filter_map(|&seq| entry.packet(seq).cloned())
                .collect(),
        )
    }

    /// 세션 존재 여부
    pub fn contains(&self, addr: &SocketAddr) -> bool {
        self.sessions.contains_key(addr)
    }

    /// 활성 세션 수
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    fn entry_with_packets(seqs: &[u32]) -> SessionEntry {
        let mut entry = SessionEntry::new("f.bin".into(), 100, seqs.len() as u32);
        for &seq in seqs {
            entry.insert_packet(seq, Bytes::from(format!("pkt-{seq}")));
        }
        entry
    }

    #[test]
    fn test_retransmit_exactly_cached_frames() {
        let store = SessionStore::new();
        store.insert(addr(9000), entry_with_packets(&[0, 1, 2]));

        // 범위 밖 seq(7, 99)는 건너뛰고 캐시된 것만
        let packets = store.packets_for(&addr(9000), &[1, 7, 2, 99]).unwrap();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0], Bytes::from("pkt-1"));
        assert_eq!(packets[1], Bytes::from("pkt-2"));
    }

    #[test]
    fn test_missing_session_is_none() {
        let store = SessionStore::new();
        assert!(store.packets_for(&addr(9001), &[0]).is_none());
    }

    #[test]
    fn test_new_get_replaces_prior_entry() {
        let store = SessionStore::new();
        store.insert(addr(9000), entry_with_packets(&[0, 1, 2, 3]));
        store.insert(addr(9000), entry_with_packets(&[0]));

        assert_eq!(store.len(), 1);
        assert!(store.packets_for(&addr(9000), &[3]).unwrap().is_empty());
        assert_eq!(store.packets_for(&addr(9000), &[0]).unwrap().len(), 1);
    }

    #[test]
    fn test_ok_removes_session() {
        let store = SessionStore::new();
        store.insert(addr(9000), entry_with_packets(&[0]));
        assert!(store.contains(&addr(9000)));

        let removed = store.remove(&addr(9000)).unwrap();
        assert_eq!(removed.filename, "f.bin");
        assert!(!store.contains(&addr(9000)));
        assert!(store.is_empty());
        assert!(store.remove(&addr(9000)).is_none());
    }

    #[test]
    fn test_sessions_are_tracked_per_address() {
        let store = SessionStore::new();
        store.insert(addr(9000), entry_with_packets(&[0]));
        store.insert(addr(9001), entry_with_packets(&[0, 1]));

        assert_eq!(store.len(), 2);
        assert!(store.contains(&addr(9001)));
        assert!(!store.contains(&addr(9002)));

        // 한 주소의 OK가 다른 주소의 세션을 건드리지 않는다
        store.remove(&addr(9000));
        assert_eq!(store.len(), 1);
        assert!(store.contains(&addr(9001)));
    }
}
