//! 서버측 요청 핸들러
//!
//! GET -> 분할/인코딩/캐시 후 전체 스트림 + END,
//! NACK -> 캐시 재전송, OK -> 세션 정리.
//! 데이터그램 하나를 끝까지 처리한 뒤 다음을 읽는 단일 루프.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::frame::{ErrCode, Frame};
use crate::fsio;
use crate::segment::Segmenter;
use crate::session::{SessionEntry, SessionStore};

/// RDTP 서버
pub struct Server {
    config: Config,
    data_dir: PathBuf,
    segmenter: Segmenter,
    store: SessionStore,
    running: AtomicBool,
}

impl Server {
    pub fn new(config: Config, data_dir: PathBuf) -> Result<Self> {
        let segmenter = Segmenter::new(config.segment_size)?;
        Ok(Self {
            config,
            data_dir,
            segmenter,
            store: SessionStore::new(),
            running: AtomicBool::new(false),
        })
    }

    /// 세션 저장소 (테스트/관측용)
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// 바인드 후 수신 루프 실행
    pub async fn run(&self, bind_addr: SocketAddr) -> Result<()> {
        let socket = UdpSocket::bind(bind_addr).await?;
        self.serve(socket).await
    }

    /// 이미 바인드된 소켓으로 수신 루프 실행. stop() 호출 시 다음 폴링에서 빠져나온다.
    pub async fn serve(&self, socket: UdpSocket) -> Result<()> {
        self.running.store(true, Ordering::SeqCst);

        info!(
            "RDTP Server listening on {} | data_dir={:?} | segment_size={}",
            socket.local_addr()?,
            self.data_dir,
            self.segmenter.segment_size()
        );

        let poll = Duration::from_millis(self.config.server_poll_ms);
        let mut buf = vec![0u8; self.config.recv_buffer_size];

        while self.running.load(Ordering::SeqCst) {
            match tokio::time::timeout(poll, socket.recv_from(&mut buf)).await {
                Ok(Ok((len, addr))) => {
                    if let Err(e) = self.handle_datagram(&buf[..len], addr, &socket).await {
                        warn!("{} 데이터그램 처리 에러: {}", addr, e);
                    }
                }
                Ok(Err(e)) => {
                    warn!("수신 에러: {}", e);
                }
                Err(_) => {
                    // 폴링 타임아웃, 종료 플래그 확인 후 계속
                }
            }
        }

        info!("서버 루프 종료");
        Ok(())
    }

    /// 정지
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// 데이터그램 하나 처리
    pub async fn handle_datagram(
        &self,
        datagram: &[u8],
        addr: SocketAddr,
        socket: &UdpSocket,
    ) -> Result<()> {
        let frame = match Frame::decode(datagram) {
            Ok(frame) => frame,
            Err(e) => {
                // 구조적으로 깨진 패킷은 조용히 버림
                debug!("{} 디코드 실패, 폐기: {}", addr, e);
                return Ok(());
            }
        };

        match frame {
            Frame::Get { filename } => self.handle_get(&filename, addr, socket).await,
            Frame::Nack { seqs } => self.handle_nack(&seqs, addr, socket).await,
            Frame::Ok => {
                if let Some(entry) = self.store.remove(&addr) {
                    info!("OK from {}: {} 세션 정리", addr, entry.filename);
                } else {
                    debug!("OK from {}: 세션 없음", addr);
                }
                Ok(())
            }
            other => {
                debug!("{} 예상 밖 프레임 무시: {:?}", addr, other);
                Ok(())
            }
        }
    }

    async fn handle_get(
        &self,
        filename: &str,
        addr: SocketAddr,
        socket: &UdpSocket,
    ) -> Result<()> {
        // 경로 검증 실패는 ERR로 응답하고 세션을 만들지 않는다
        let path = match fsio::resolve_under_root(&self.data_dir, filename) {
            Ok(path) => path,
            Err(e) => {
                let (code, message) = match &e {
                    Error::InvalidPath { path } => {
                        (ErrCode::InvalidPath, format!("caminho inválido: {path}"))
                    }
                    Error::FileNotFound { path } => {
                        (ErrCode::NotFound, format!("arquivo não encontrado: {path}"))
                    }
                    other => (ErrCode::Unknown, other.to_string()),
                };
                warn!("GET {} from {}: {}", filename, addr, message);
                socket
                    .send_to(&Frame::Err { code, message }.encode(), addr)
                    .await?;
                return Ok(());
            }
        };

        let data = match fsio::read_file(&path).await {
            Ok(data) => data,
            Err(e) => {
                warn!("GET {} from {}: 읽기 실패: {}", filename, addr, e);
                socket
                    .send_to(
                        &Frame::Err {
                            code: ErrCode::Unknown,
                            message: format!("falha ao ler: {filename}"),
                        }
                        .encode(),
                        addr,
                    )
                    .await?;
                return Ok(());
            }
        };
        let (entry, file_crc) = self.build_session(filename, &data);
        let total_segments = entry.total_segments;

        info!(
            "GET {} from {}: {} 세그먼트 ({} bytes) 전송",
            filename,
            addr,
            total_segments,
            data.len()
        );

        // 세션 교체 후 전체를 오름차순으로 한 번 전송
        self.store.insert(addr, entry);
        if let Some(packets) = self
            .store
            .packets_for(&addr, &(0..total_segments).collect::<Vec<_>>())
        {
            for packet in packets {
                socket.send_to(&packet, addr).await?;
            }
        }

        socket
            .send_to(
                &Frame::End {
                    total_segments,
                    file_crc,
                }
                .encode(),
                addr,
            )
            .await?;

        Ok(())
    }

    /// 파일 바이트를 분할해 인코딩 완료된 세션과 파일 CRC를 만든다
    fn build_session(&self, filename: &str, data: &[u8]) -> (SessionEntry, u32) {
        let total_size = data.len() as u64;
        let total_segments = self.segmenter.segment_count(total_size);
        let mut entry = SessionEntry::new(filename.to_owned(), total_size, total_segments);

        // 패킷 인코딩과 파일 CRC 누적을 한 패스로
        let mut hasher = crc32fast::Hasher::new();
        for seg in self.segmenter.split(data) {
            hasher.update(seg.payload);
            let frame = Frame::data(
                seg.seq,
                total_size,
                seg.offset,
                Bytes::copy_from_slice(seg.payload),
                seg.is_final,
            );
            entry.insert_packet(seg.seq, Bytes::from(frame.encode()));
        }

        (entry, hasher.finalize())
    }

    async fn handle_nack(
        &self,
        seqs: &[u32],
        addr: SocketAddr,
        socket: &UdpSocket,
    ) -> Result<()> {
        // 세션 없는 NACK은 무시 (재전송할 것이 없음)
        let Some(packets) = self.store.packets_for(&addr, seqs) else {
            debug!("NACK from {}: 세션 없음, 무시", addr);
            return Ok(());
        };

        debug!(
            "NACK from {}: {}개 요청, {}개 재전송",
            addr,
            seqs.len(),
            packets.len()
        );

        for packet in packets {
            socket.send_to(&packet, addr).await?;
        }
        Ok(())
    }
}
