//! 송신자
//!
//! - 파일 이름 전송 (선택)
//! - 청크 순차 전송 + pacing
//! - END 마커 후 쓰기 방향 종료 (half-close)

use std::path::Path;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::chunk::{ChunkSplitter, FileIdentity};
use crate::message::{write_end_marker, write_frame, write_line};
use crate::stats::TransferStats;
use crate::{Config, Result, END_MARKER};

/// 파일 송신자
///
/// 청크마다 ACK를 기다리지 않는 단방향 push. 흐름 제어는 TCP에 맡긴다.
#[derive(Debug, Clone)]
pub struct FileSender {
    config: Config,
}

impl FileSender {
    /// 새 송신자 생성
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// 송신 파일 정보 조회 (이름 + 크기)
    ///
    /// 청크 수가 헤더 범위를 넘는 파일은 여기서 거부된다 (와이어에 쓰기 전).
    pub async fn identify(&self, path: &Path) -> Result<FileIdentity> {
        let name = FileIdentity::bare_name(path)?;
        let size = tokio::fs::metadata(path).await?.len();
        self.config.total_chunks(size)?;
        Ok(FileIdentity::new(name, size))
    }

    /// 파일 이름 + 청크 전송 (업로드)
    pub async fn send_file<W: AsyncWrite + Unpin>(
        &self,
        writer: &mut W,
        path: &Path,
    ) -> Result<TransferStats> {
        let identity = self.identify(path).await?;
        let file = tokio::fs::File::open(path).await?;

        info!("파일 이름 전송: {}", identity.name);
        write_line(writer, &identity.name).await?;

        if self.config.name_delay_ms > 0 {
            tokio::time::sleep(self.config.name_delay()).await;
        }

        let mut stats = self.send_chunks(file, identity.size, writer).await?;
        stats.wire_bytes += identity.name.len() as u64 + 1;
        Ok(stats)
    }

    /// 이름 없이 청크만 전송 (에코)
    pub async fn send_contents<W: AsyncWrite + Unpin>(
        &self,
        writer: &mut W,
        path: &Path,
    ) -> Result<TransferStats> {
        let size = tokio::fs::metadata(path).await?.len();
        let file = tokio::fs::File::open(path).await?;
        self.send_chunks(file, size, writer).await
    }

    /// 청크 스트림 전송: 프레임들 -> END 마커 -> half-close
    pub async fn send_chunks<R, W>(
        &self,
        reader: R,
        file_size: u64,
        writer: &mut W,
    ) -> Result<TransferStats>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut splitter = ChunkSplitter::new(reader, self.config.chunk_size, file_size)?;
        let total_chunks = splitter.total_chunks();
        let mut stats = TransferStats::new();

        info!(
            "청크 전송 시작: {} bytes, {} chunks (chunk_size={})",
            file_size, total_chunks, self.config.chunk_size
        );

        while let Some(chunk) = splitter.next_chunk().await? {
            let wire_len = write_frame(writer, &chunk).await?;
            stats.record_chunk(chunk.len(), wire_len);
            debug!("청크 전송: seq={} ({} bytes)", chunk.seq, chunk.len());

            // 전송 간격 (마지막 청크 뒤에는 쉬지 않음)
            if self.config.chunk_interval_ms > 0 && chunk.seq + 1 < total_chunks {
                tokio::time::sleep(self.config.chunk_interval()).await;
            }
        }

        write_end_marker(writer).await?;
        stats.wire_bytes += END_MARKER.len() as u64;
        writer.shutdown().await?;
        stats.finish();

        info!("청크 전송 완료: {}", stats);
        Ok(stats)
    }
}
