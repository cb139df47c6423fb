//! 패킷 손실 주입기 (테스트 협력자)
//!
//! 수신된 DATA 프레임을 실제 손실처럼 버려서 NACK 복구 경로를
//! 검증한다. 프로토콜 정확성과 무관하며 제거해도 동작은 동일하다.

use std::collections::HashSet;

use rand::Rng;

/// 손실 주입기
///
/// - 명시된 seq는 정확히 한 번만 드롭 (재전송은 통과)
/// - drop_prob 확률로 임의 드롭
#[derive(Debug, Default)]
pub struct LossInjector {
    drop_once: HashSet<u32>,
    already_dropped: HashSet<u32>,
    drop_prob: f64,
}

impl LossInjector {
    pub fn new(drop_once: HashSet<u32>, drop_prob: f64) -> Self {
        Self {
            drop_once,
            already_dropped: HashSet::new(),
            drop_prob: drop_prob.clamp(0.0, 1.0),
        }
    }

    /// "seq:1,5-9" 형식의 드롭 지정 문자열 파싱. 형식이 틀린 항목은 무시.
    pub fn parse_drop_spec(spec: &str) -> HashSet<u32> {
        let mut out = HashSet::new();
        let Some(list) = spec.strip_prefix("seq:") else {
            return out;
        };

        for item in list.split(',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            if let Some((a, b)) = item.split_once('-') {
                if let (Ok(a), Ok(b)) = (a.trim().parse::<u32>(), b.trim().parse::<u32>()) {
                    out.extend(a.min(b)..=a.max(b));
                }
            } else if let Ok(seq) = item.parse::<u32>() {
                out.insert(seq);
            }
        }
        out
    }

    /// 이 seq의 수신을 드롭으로 시뮬레이션할지 결정
    pub fn should_drop(&mut self, seq: u32) -> bool {
        if self.drop_once.contains(&seq) && !self.already_dropped.contains(&seq) {
            self.already_dropped.insert(seq);
            return true;
        }

        self.drop_prob > 0.0 && rand::thread_rng().gen_bool(self.drop_prob)
    }

    /// 드롭할 것이 전혀 없는 주입기인지
    pub fn is_noop(&self) -> bool {
        self.drop_once.is_empty() && self.drop_prob == 0.0
    }
}
