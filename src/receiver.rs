//! 수신자
//!
//! - 파일 이름 대기
//! - 프레임 수신 및 재조립 버퍼링
//! - 시퀀스 번호 순 조립 후 SHA-256 검증

use std::fmt;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufRead, AsyncRead};
use tracing::{debug, info, warn};

use crate::checksum::digest_file;
use crate::chunk::{FileIdentity, ReassemblyBuffer};
use crate::message::{read_line, FrameEvent, FrameReader};
use crate::stats::TransferStats;
use crate::{Config, Error, Result, END_MARKER, HEADER_LEN};

/// 검증 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Success,
    Corrupt { expected: String, actual: String },
}

impl Verdict {
    /// 두 체크섬 문자열 비교
    pub fn compare(expected: &str, actual: &str) -> Self {
        if expected == actual {
            Verdict::Success
        } else {
            Verdict::Corrupt {
                expected: expected.to_owned(),
                actual: actual.to_owned(),
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Verdict::Success)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Success => write!(f, "SUCCESS"),
            Verdict::Corrupt { expected, actual } => {
                write!(f, "CORRUPT (expected {expected}, got {actual})")
            }
        }
    }
}

/// 디스크에 기록된 수신 파일
#[derive(Debug, Clone)]
pub struct ReceivedFile {
    pub path: PathBuf,
    pub size: u64,

    /// 기록된 파일로부터 다시 계산한 체크섬
    pub checksum: String,

    pub stats: TransferStats,
}

/// 파일 수신자
#[derive(Debug, Clone)]
pub struct FileReceiver {
    config: Config,
}

impl FileReceiver {
    /// 새 수신자 생성
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// 파일 이름 대기
    ///
    /// 이름 없이 연결이 끊기면 `None` (조기 종료, 에러 아님).
    /// 경로가 섞인 이름은 마지막 컴포넌트만 사용한다.
    pub async fn read_file_name<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Option<String>> {
        match read_line(reader).await {
            Ok(Some(line)) => FileIdentity::bare_name(Path::new(&line)).map(Some),
            Ok(None) => Ok(None),
            Err(Error::LineTooLong { max }) => Err(Error::InvalidFileName(format!(
                "name line longer than {max} bytes"
            ))),
            Err(e) => Err(e),
        }
    }

    /// END 마커 또는 스트림 종료까지 프레임 수신
    pub async fn receive_chunks<R: AsyncRead + Unpin>(
        &self,
        reader: R,
    ) -> Result<(ReassemblyBuffer, TransferStats)> {
        let mut frames = FrameReader::new(reader, self.config.chunk_size);
        let mut buffer = ReassemblyBuffer::new();
        let mut stats = TransferStats::new();

        loop {
            match frames.next_frame().await? {
                FrameEvent::Chunk(chunk) => {
                    debug!("청크 수신: seq={} ({} bytes)", chunk.seq, chunk.len());
                    stats.record_chunk(chunk.len(), HEADER_LEN + chunk.len());
                    if !buffer.insert(chunk) {
                        debug!("중복 청크 덮어씀");
                    }
                }
                FrameEvent::Malformed(_) => {
                    stats.record_malformed(HEADER_LEN);
                }
                FrameEvent::End => {
                    debug!("END 마커 수신");
                    stats.end_marker_seen = true;
                    stats.wire_bytes += END_MARKER.len() as u64;
                    break;
                }
                FrameEvent::Closed => {
                    info!("END 마커 없이 스트림 종료");
                    break;
                }
            }
        }

        stats.duplicate_chunks = buffer.duplicates();
        let missing = buffer.missing_sequences();
        if !missing.is_empty() {
            warn!(
                "누락된 청크 {}개 (첫 번째: seq={})",
                missing.len(),
                missing[0]
            );
        }
        stats.missing_chunks = missing.len() as u64;
        stats.finish();

        info!("총 수신 청크: {} ({})", buffer.len(), stats);
        Ok((buffer, stats))
    }

    /// 프레임 수신 -> 시퀀스 순 조립 -> 파일 기록 -> 체크섬 재계산
    pub async fn receive_to_file<R: AsyncRead + Unpin>(
        &self,
        reader: R,
        dest: &Path,
    ) -> Result<ReceivedFile> {
        let (buffer, stats) = self.receive_chunks(reader).await?;
        Self::store(buffer, stats, dest).await
    }

    /// 버퍼를 시퀀스 순으로 파일에 기록하고 기록된 파일의 체크섬을 계산
    pub async fn store(
        buffer: ReassemblyBuffer,
        stats: TransferStats,
        dest: &Path,
    ) -> Result<ReceivedFile> {
        let size = {
            let mut file = tokio::fs::File::create(dest).await?;
            buffer.write_to(&mut file).await?
        };
        drop(buffer);

        let checksum = digest_file(dest).await?;
        info!("파일 조립 완료: {:?} ({} bytes, sha256={})", dest, size, checksum);

        Ok(ReceivedFile {
            path: dest.to_path_buf(),
            size,
            checksum,
            stats,
        })
    }

    /// 기록된 파일을 기대 체크섬과 비교
    pub async fn verify_file(path: &Path, expected: &str) -> Result<Verdict> {
        let actual = digest_file(path).await?;
        Ok(Verdict::compare(expected, &actual))
    }
}
