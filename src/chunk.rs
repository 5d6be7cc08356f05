//! 청크와 재조립 버퍼 정의
//!
//! - Chunk: 시퀀스 번호가 붙은 파일 조각 (기본 1024 bytes, 마지막만 짧을 수 있음)
//! - ChunkSplitter: 송신측, 파일 스트림을 청크로 분할
//! - ReassemblyBuffer: 수신측, 도착 순서와 무관하게 시퀀스 번호 순으로 조립

use std::collections::BTreeMap;
use std::path::Path;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{Error, Result, MAX_SEQUENCE};

/// 시퀀스 번호 (0부터 시작, 파일 순서대로 빈틈 없이 부여)
pub type SequenceNumber = u32;

/// 청크 (전송 단위)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 시퀀스 번호
    pub seq: SequenceNumber,

    /// 실제 데이터
    pub payload: Bytes,
}

impl Chunk {
    /// 새 청크 생성
    pub fn new(seq: SequenceNumber, payload: Bytes) -> Self {
        Self { seq, payload }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// 전송 파일 식별 정보
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIdentity {
    /// 경로가 제거된 파일 이름
    pub name: String,

    /// 파일 크기 (바이트)
    pub size: u64,
}

impl FileIdentity {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }

    /// 경로에서 파일 이름만 추출
    ///
    /// 디렉터리 구분자, `..` 등이 섞인 이름은 마지막 컴포넌트만 남긴다.
    pub fn bare_name(path: &Path) -> Result<String> {
        path.file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .map(str::to_owned)
            .ok_or_else(|| Error::InvalidFileName(path.to_string_lossy().into_owned()))
    }
}

/// 스트림에서 `buf`가 가득 차거나 EOF가 올 때까지 읽는다.
///
/// 한 번의 read 호출이 요청한 만큼을 돌려준다는 보장이 없으므로 루프를 돈다.
/// 반환값이 `buf.len()`보다 작으면 EOF에 도달한 것.
pub(crate) async fn read_until_full<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut [u8],
) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// 파일 크기 기준 청크 수 (빈 파일은 0). 헤더 범위를 넘으면 거부한다.
pub fn chunk_count(file_size: u64, chunk_size: usize) -> Result<u32> {
    if chunk_size == 0 {
        return Err(Error::InvalidChunkSize(chunk_size));
    }

    let total_chunks = file_size.div_ceil(chunk_size as u64);
    if total_chunks > MAX_SEQUENCE as u64 {
        return Err(Error::TooManyChunks {
            file_size,
            chunk_size,
            total_chunks,
            max: MAX_SEQUENCE,
        });
    }
    Ok(total_chunks as u32)
}

/// 청크 분할기 (송신측)
pub struct ChunkSplitter<R> {
    reader: R,
    chunk_size: usize,
    next_seq: SequenceNumber,
    total_chunks: u32,
}

impl<R: AsyncRead + Unpin> ChunkSplitter<R> {
    /// `file_size`는 송신 시작 시점의 크기. 청크 수가 헤더 범위를 넘으면 거부한다.
    pub fn new(reader: R, chunk_size: usize, file_size: u64) -> Result<Self> {
        let total_chunks = chunk_count(file_size, chunk_size)?;
        Ok(Self {
            reader,
            chunk_size,
            next_seq: 0,
            total_chunks,
        })
    }

    /// 총 청크 수
    pub fn total_chunks(&self) -> u32 {
        self.total_chunks
    }

    /// 다음 청크 읽기. 모두 보냈거나 파일이 예상보다 일찍 끝나면 `None`.
    pub async fn next_chunk(&mut self) -> Result<Option<Chunk>> {
        if self.next_seq >= self.total_chunks {
            return Ok(None);
        }

        let mut buf = BytesMut::zeroed(self.chunk_size);
        let n = read_until_full(&mut self.reader, &mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);

        let chunk = Chunk::new(self.next_seq, buf.freeze());
        self.next_seq += 1;
        Ok(Some(chunk))
    }
}

/// 메모리 데이터를 청크들로 분할 (복사 없음)
#[cfg(test)]
pub(crate) fn split_into_chunks(data: &Bytes, chunk_size: usize) -> Vec<Chunk> {
    (0..data.len())
        .step_by(chunk_size.max(1))
        .enumerate()
        .map(|(idx, offset)| {
            let end = (offset + chunk_size).min(data.len());
            Chunk::new(idx as SequenceNumber, data.slice(offset..end))
        })
        .collect()
}

/// 재조립 버퍼 (수신측)
///
/// 시퀀스 번호 -> 페이로드. 같은 번호가 다시 오면 마지막 값으로 덮어쓴다.
#[derive(Debug, Default)]
pub struct ReassemblyBuffer {
    chunks: BTreeMap<SequenceNumber, Bytes>,

    /// 덮어쓴 중복 청크 수
    duplicates: u64,
}

impl ReassemblyBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 청크 삽입. 이미 있던 번호면 `false`.
    pub fn insert(&mut self, chunk: Chunk) -> bool {
        let is_new = self.chunks.insert(chunk.seq, chunk.payload).is_none();
        if !is_new {
            self.duplicates += 1;
        }
        is_new
    }

    /// 버퍼링된 청크 수
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    /// 버퍼링된 총 바이트
    pub fn total_bytes(&self) -> u64 {
        self.chunks.values().map(|p| p.len() as u64).sum()
    }

    /// `0..=max_seq` 중 빠진 시퀀스 번호
    pub fn missing_sequences(&self) -> Vec<SequenceNumber> {
        let Some(&max_seq) = self.chunks.keys().next_back() else {
            return Vec::new();
        };
        (0..=max_seq)
            .filter(|seq| !self.chunks.contains_key(seq))
            .collect()
    }

    /// 시퀀스 번호 오름차순으로 이어붙여 기록. 기록한 바이트 수 반환.
    pub async fn write_to<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> Result<u64> {
        let mut written = 0u64;
        for payload in self.chunks.values() {
            writer.write_all(payload).await?;
            written += payload.len() as u64;
        }
        writer.flush().await?;
        Ok(written)
    }

    /// 조립된 데이터 추출
    #[cfg(test)]
    pub(crate) fn into_bytes(self) -> Bytes {
        let mut out = BytesMut::with_capacity(self.total_bytes() as usize);
        for payload in self.chunks.into_values() {
            out.extend_from_slice(&payload);
        }
        out.freeze()
    }
}
