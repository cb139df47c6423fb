//! 클라이언트 재조립 상태 머신
//!
//! 수신 루프에 상태를 숨기지 않고 (상태, 이벤트) -> (상태, 부수효과 목록)
//! 순수 전이 함수로 표현한다. 소켓 없이 모든 전이를 단위 테스트할 수 있다.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::frame::{ErrCode, Frame, NACK_HDR_SIZE};
use crate::fsio;
use crate::loss::LossInjector;
use crate::stats::TransferStats;
use crate::MAX_UDP_PAYLOAD;

/// NACK 하나에 담는 최대 seq 수 (UDP 페이로드 한도 내)
pub const MAX_NACK_SEQS: usize = (MAX_UDP_PAYLOAD - NACK_HDR_SIZE) / 4;

/// 요청 진행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// GET 전송 직후, 아직 아무 응답 없음
    AwaitReply,

    /// DATA/END를 하나 이상 수신
    Receiving,

    /// 모든 세그먼트 수신, OK 전송됨
    Complete,

    /// 터미널 실패 (ERR, 타임아웃 한도, 진행 없음)
    Aborted,
}

/// 상태 머신 입력
#[derive(Debug, Clone)]
pub enum Event {
    /// 디코드에 성공한 DATA 프레임
    Data {
        seq: u32,
        total_size: u64,
        payload: Bytes,
        is_final: bool,
    },

    /// END 요약
    End { total_segments: u32, file_crc: u32 },

    /// 서버 발행 ERR
    ServerErr { code: ErrCode, message: String },

    /// 수신 타임아웃
    Timeout,
}

/// 상태 머신이 요구하는 부수효과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// 원래의 GET 재전송
    SendGet,

    /// 누락 seq 재전송 요청
    SendNack(Vec<u32>),

    /// 완료 확인
    SendOk,
}

/// 재조립 버퍼
///
/// seq -> 페이로드 맵. 저장 순서는 무관하고 최종 출력만 오름차순.
/// 요청 한 건과 수명을 같이한다.
#[derive(Debug, Default)]
pub struct ReassemblyBuffer {
    segments: HashMap<u32, Bytes>,
    total_size: Option<u64>,
    total_segments: Option<u32>,
    max_seq: Option<u32>,
    file_crc: Option<u32>,
}

impl ReassemblyBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 세그먼트 저장. 이미 있던 seq면 내용을 바꾸지 않고 false
    pub fn insert(&mut self, seq: u32, total_size: u64, payload: Bytes) -> bool {
        if self.total_size.is_none() {
            self.total_size = Some(total_size);
        }
        self.max_seq = Some(self.max_seq.map_or(seq, |m| m.max(seq)));

        if self.segments.contains_key(&seq) {
            return false;
        }
        self.segments.insert(seq, payload);
        true
    }

    /// 총 세그먼트 수 확정 (FINAL 플래그 또는 END에서)
    pub fn set_total_segments(&mut self, total: u32) {
        self.total_segments = Some(total);
    }

    pub fn set_file_crc(&mut self, crc: u32) {
        self.file_crc = Some(crc);
    }

    pub fn total_segments(&self) -> Option<u32> {
        self.total_segments
    }

    pub fn received_count(&self) -> usize {
        self.segments.len()
    }

    /// 완료 여부: 총수를 알고 그만큼 모였을 때
    pub fn is_complete(&self) -> bool {
        self.total_segments
            .is_some_and(|total| self.segments.len() as u64 >= total as u64)
    }

    /// 현재 알려진 갭 목록 (오름차순)
    ///
    /// 총수를 알면 0..total, 모르면 0..=max_seq 범위에서 계산.
    pub fn missing_seqs(&self) -> Vec<u32> {
        let upper = match (self.total_segments, self.max_seq) {
            (Some(total), _) => total,
            (None, Some(max)) => max + 1,
            (None, None) => return Vec::new(),
        };
        (0..upper)
            .filter(|seq| !self.segments.contains_key(seq))
            .collect()
    }

    /// 최종 조립 + 검증
    ///
    /// 갭이 남았으면 빈 바이트로 메우지 않고 실패로 처리한다.
    pub fn finalize(self) -> Result<Bytes> {
        let total = match self.total_segments {
            Some(total) => total,
            None => self.max_seq.map_or(0, |max| max + 1),
        };

        let capacity = self.total_size.unwrap_or(0) as usize;
        let mut out = Vec::with_capacity(capacity);
        let mut missing = 0usize;
        for seq in 0..total {
            match self.segments.get(&seq) {
                Some(payload) => out.extend_from_slice(payload),
                None => missing += 1,
            }
        }
        if missing > 0 {
            return Err(Error::MissingSegments { count: missing });
        }

        if let Some(expected) = self.total_size {
            if out.len() as u64 != expected {
                return Err(Error::SizeMismatch {
                    expected,
                    got: out.len() as u64,
                });
            }
        }

        if let Some(expected) = self.file_crc {
            let got = crc32fast::hash(&out);
            if got != expected {
                return Err(Error::FileCrcMismatch { expected, got });
            }
        }

        Ok(Bytes::from(out))
    }
}

/// 요청 한 건의 상태 머신
#[derive(Debug)]
pub struct Exchange {
    state: State,
    buffer: ReassemblyBuffer,
    timeout_count: u32,
    max_timeouts: u32,
    abort_reason: Option<Error>,

    /// 전송 통계 (드라이버가 드롭/디코드 실패도 여기에 기록)
    pub stats: TransferStats,
}

impl Exchange {
    pub fn new(max_timeouts: u32) -> Self {
        Self {
            state: State::AwaitReply,
            buffer: ReassemblyBuffer::new(),
            timeout_count: 0,
            max_timeouts,
            abort_reason: None,
            stats: TransferStats::new(),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, State::Complete | State::Aborted)
    }

    /// 전이 함수. 터미널 상태에서는 아무것도 하지 않는다.
    pub fn on_event(&mut self, event: Event) -> Vec<Action> {
        if self.is_terminal() {
            return Vec::new();
        }

        match event {
            Event::Data {
                seq,
                total_size,
                payload,
                is_final,
            } => {
                self.on_datagram();
                self.on_data(seq, total_size, payload, is_final)
            }
            Event::End {
                total_segments,
                file_crc,
            } => {
                self.on_datagram();
                self.on_end(total_segments, file_crc)
            }
            Event::ServerErr { code, message } => {
                self.on_datagram();
                self.state = State::Aborted;
                self.abort_reason = Some(Error::ServerError {
                    code: code.as_u8(),
                    message,
                });
                Vec::new()
            }
            Event::Timeout => self.on_timeout(),
        }
    }

    /// 수신된 모든 데이터그램은 연속 타임아웃 카운터를 리셋한다
    fn on_datagram(&mut self) {
        self.timeout_count = 0;
        if self.state == State::AwaitReply {
            self.state = State::Receiving;
        }
    }

    fn on_data(&mut self, seq: u32, total_size: u64, payload: Bytes, is_final: bool) -> Vec<Action> {
        let len = payload.len() as u64;
        if self.buffer.insert(seq, total_size, payload) {
            self.stats.total_segments += 1;
            self.stats.total_bytes += len;
        } else {
            self.stats.duplicate_segments += 1;
        }

        if is_final {
            self.buffer.set_total_segments(seq + 1);
        }

        if self.buffer.is_complete() {
            self.state = State::Complete;
            return vec![Action::SendOk];
        }
        Vec::new()
    }

    fn on_end(&mut self, total_segments: u32, file_crc: u32) -> Vec<Action> {
        self.buffer.set_total_segments(total_segments);
        self.buffer.set_file_crc(file_crc);

        let missing = self.buffer.missing_seqs();
        if missing.is_empty() {
            self.state = State::Complete;
            return vec![Action::SendOk];
        }
        vec![self.nack_for(missing)]
    }

    fn on_timeout(&mut self) -> Vec<Action> {
        self.timeout_count += 1;
        if self.timeout_count >= self.max_timeouts {
            self.state = State::Aborted;
            self.abort_reason = Some(Error::Timeout {
                attempts: self.timeout_count,
            });
            return Vec::new();
        }

        // 복구 사다리: 갭 NACK -> GET 재전송 -> 최고 seq 탐침 -> 중단
        let missing = self.buffer.missing_seqs();
        if !missing.is_empty() {
            return vec![self.nack_for(missing)];
        }

        if self.buffer.received_count() == 0 && self.buffer.total_segments().is_none() {
            return vec![Action::SendGet];
        }

        if self.buffer.total_segments().is_none() {
            // 0..=max 가 전부 모였지만 뒤가 더 있는지 모름: 최고 seq로 탐침
            if let Some(max) = self.buffer.max_seq {
                return vec![self.nack_for(vec![max])];
            }
        }

        self.state = State::Aborted;
        self.abort_reason = Some(Error::NoProgress);
        Vec::new()
    }

    fn nack_for(&mut self, mut missing: Vec<u32>) -> Action {
        missing.truncate(MAX_NACK_SEQS);
        self.stats.nacks_sent += 1;
        self.stats.retransmits_requested += missing.len() as u64;
        Action::SendNack(missing)
    }

    /// 종료 처리: Complete면 조립+검증, Aborted면 원인 반환
    pub fn finish(self) -> Result<(Bytes, TransferStats)> {
        match self.state {
            State::Complete => {
                let stats = self.stats;
                let data = self.buffer.finalize()?;
                Ok((data, stats))
            }
            State::Aborted => Err(self.abort_reason.unwrap_or(Error::NoProgress)),
            State::AwaitReply | State::Receiving => Err(Error::ConnectionClosed),
        }
    }
}

/// 완료된 요청의 결과
#[derive(Debug)]
pub struct TransferOutcome {
    pub data: Bytes,
    pub stats: TransferStats,
}

/// 파일 요청 드라이버
///
/// 동기식 요청/응답 사이클 하나: 타임아웃 달린 수신에만 블록한다.
pub struct Client {
    config: Config,
    server_addr: SocketAddr,
    injector: Option<LossInjector>,
}

impl Client {
    pub fn new(config: Config, server_addr: SocketAddr) -> Self {
        Self {
            config,
            server_addr,
            injector: None,
        }
    }

    /// 테스트용 손실 주입기 장착
    pub fn with_loss_injector(mut self, injector: LossInjector) -> Self {
        if !injector.is_noop() {
            self.injector = Some(injector);
        }
        self
    }

    /// 파일 하나를 요청해 수신하고, 성공 시 out_path에 기록
    pub async fn request_file(
        &mut self,
        filename: &str,
        out_path: Option<&Path>,
    ) -> Result<TransferOutcome> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let get = Frame::Get {
            filename: filename.to_owned(),
        }
        .encode();

        info!("GET 전송: {} -> {}", filename, self.server_addr);
        socket.send_to(&get, self.server_addr).await?;

        let mut exchange = Exchange::new(self.config.max_consecutive_timeouts);
        let mut buf = vec![0u8; self.config.recv_buffer_size];

        while !exchange.is_terminal() {
            let timeout = if exchange.state() == State::AwaitReply {
                Duration::from_millis(self.config.handshake_timeout_ms)
            } else {
                Duration::from_millis(self.config.recv_timeout_ms)
            };

            let event = match tokio::time::timeout(timeout, socket.recv_from(&mut buf)).await {
                Ok(Ok((len, _addr))) => match self.classify(&buf[..len], &mut exchange) {
                    Some(event) => event,
                    None => continue,
                },
                Ok(Err(e)) => {
                    // 소켓이 닫히면 크래시 대신 중단으로 표면화
                    warn!("수신 소켓 에러: {}", e);
                    return Err(e.into());
                }
                Err(_) => Event::Timeout,
            };

            for action in exchange.on_event(event) {
                let bytes = match action {
                    Action::SendGet => {
                        debug!("응답 없음, GET 재전송");
                        get.clone()
                    }
                    Action::SendNack(seqs) => {
                        debug!("NACK 전송: {}개 seq", seqs.len());
                        Frame::Nack { seqs }.encode()
                    }
                    Action::SendOk => Frame::Ok.encode(),
                };
                socket.send_to(&bytes, self.server_addr).await?;
            }
        }

        let (data, stats) = exchange.finish()?;
        info!("전송 완료: {}", stats.summary());

        if let Some(path) = out_path {
            fsio::write_file(path, &data).await?;
            info!("저장됨: {:?} ({} bytes)", path, data.len());
        }

        Ok(TransferOutcome { data, stats })
    }

    /// 데이터그램을 이벤트로 분류. 버릴 패킷이면 None
    fn classify(&mut self, datagram: &[u8], exchange: &mut Exchange) -> Option<Event> {
        match Frame::decode(datagram) {
            Ok(Frame::Data {
                flags,
                seq,
                total_size,
                payload,
                window_id: _,
                offset: _,
            }) => {
                let is_final = flags & crate::frame::FLAG_FINAL != 0;
                if let Some(injector) = self.injector.as_mut() {
                    if injector.should_drop(seq) {
                        debug!("[DROP] seq {} 시뮬레이션 드롭", seq);
                        exchange.stats.discarded_frames += 1;
                        return None;
                    }
                }
                Some(Event::Data {
                    seq,
                    total_size,
                    payload,
                    is_final,
                })
            }
            Ok(Frame::End {
                total_segments,
                file_crc,
            }) => Some(Event::End {
                total_segments,
                file_crc,
            }),
            Ok(Frame::Err { code, message }) => {
                warn!("서버 에러 ({:?}): {}", code, message);
                Some(Event::ServerErr { code, message })
            }
            Ok(other) => {
                // 클라이언트가 받을 일 없는 타입 (GET/NACK/OK)
                debug!("예상 밖 프레임 무시: {:?}", other);
                None
            }
            Err(e) => {
                debug!("손상 패킷 폐기: {}", e);
                exchange.stats.discarded_frames += 1;
                None
            }
        }
    }
}
