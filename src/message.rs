//! 와이어 포맷 (청크 프레임 + 라인 메시지)
//!
//! ```text
//! CHUNK FRAME:   [6 bytes: zero-padded ASCII decimal seq][payload, 최대 chunk_size]
//! END MARKER:    [4 bytes: "END\n"]  (헤더 자리에 온다)
//! NAME/CHECKSUM: [UTF-8 text]["\n"]
//! ```
//!
//! 페이로드 길이 필드가 없으므로 수신측은 항상 `chunk_size`만큼 읽으려 하고,
//! 그보다 짧은 페이로드는 스트림이 닫힌 경우(= 마지막 청크)에만 받아들인다.
//! 송신측은 END 마커 후 쓰기 방향을 닫아(half-close) 이를 보장한다.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::chunk::{Chunk, SequenceNumber};
use crate::{Error, Result, END_MARKER, HEADER_LEN, MAX_SEQUENCE};

/// 라인 메시지 최대 길이 (파일 이름, 체크섬)
pub const MAX_LINE_LEN: u64 = 4096;

/// 디코딩된 시퀀스 헤더
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Header {
    Sequence(SequenceNumber),
    Malformed,
}

/// 프레임 리더가 돌려주는 이벤트
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// 정상 청크
    Chunk(Chunk),

    /// 10진수도 END 마커도 아닌 헤더 (건너뛰고 계속 읽을 수 있음)
    Malformed([u8; HEADER_LEN]),

    /// END 마커 수신
    End,

    /// 스트림 종료 (헤더 도중 끊긴 경우 포함)
    Closed,
}

/// 시퀀스 번호를 6자리 헤더로 인코딩
pub fn encode_header(seq: SequenceNumber) -> Result<[u8; HEADER_LEN]> {
    if seq >= MAX_SEQUENCE {
        return Err(Error::SequenceOverflow {
            seq,
            max: MAX_SEQUENCE - 1,
        });
    }

    let mut header = [0u8; HEADER_LEN];
    header.copy_from_slice(format!("{seq:06}").as_bytes());
    Ok(header)
}

/// 6바이트 헤더 디코딩
pub fn decode_header(bytes: &[u8; HEADER_LEN]) -> Header {
    if !bytes.iter().all(u8::is_ascii_digit) {
        return Header::Malformed;
    }

    let seq = bytes
        .iter()
        .fold(0u32, |acc, &b| acc * 10 + u32::from(b - b'0'));
    Header::Sequence(seq)
}

/// 청크를 프레임 바이트로 직렬화
pub fn encode_frame(chunk: &Chunk) -> Result<Bytes> {
    let header = encode_header(chunk.seq)?;

    let mut buf = BytesMut::with_capacity(HEADER_LEN + chunk.payload.len());
    buf.put_slice(&header);
    buf.put_slice(&chunk.payload);
    Ok(buf.freeze())
}

/// 프레임 하나 전송. 전송한 바이트 수 반환.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, chunk: &Chunk) -> Result<usize> {
    let frame = encode_frame(chunk)?;
    writer.write_all(&frame).await?;
    Ok(frame.len())
}

/// END 마커 전송
pub async fn write_end_marker<W: AsyncWrite + Unpin>(writer: &mut W) -> Result<()> {
    writer.write_all(END_MARKER).await?;
    writer.flush().await?;
    Ok(())
}

/// 라인 메시지 전송 (`text` + `\n`)
pub async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, text: &str) -> Result<()> {
    let mut buf = BytesMut::with_capacity(text.len() + 1);
    buf.put_slice(text.as_bytes());
    buf.put_u8(b'\n');
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// 라인 메시지 수신
///
/// 스트림이 바로 닫혔거나 빈 줄이면 `None`. 앞뒤 공백은 제거한다.
/// `MAX_LINE_LEN` 안에 줄바꿈이 없으면 `LineTooLong` (나머지를 프레임으로 읽지 않도록).
pub async fn read_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Option<String>> {
    let mut raw = Vec::new();
    let n = (&mut *reader)
        .take(MAX_LINE_LEN)
        .read_until(b'\n', &mut raw)
        .await?;
    if n == 0 {
        return Ok(None);
    }
    if n as u64 == MAX_LINE_LEN && raw.last() != Some(&b'\n') {
        return Err(Error::LineTooLong { max: MAX_LINE_LEN });
    }

    let line = String::from_utf8_lossy(&raw).trim().to_owned();
    if line.is_empty() {
        return Ok(None);
    }
    Ok(Some(line))
}

/// 프레임 리더 (수신측)
///
/// 마지막 청크가 `chunk_size`에 거의 가득 차면 END 마커가 페이로드 경계에 걸친다.
/// 그래서 페이로드는 항상 `chunk_size + 4`바이트(또는 EOF)까지 미리 읽고 판단한다.
pub struct FrameReader<R> {
    reader: R,
    chunk_size: usize,

    /// 아직 소비하지 않은 선읽기 바이트
    buf: BytesMut,

    /// 하위 스트림 EOF 도달
    eof: bool,

    /// 마지막 짧은 페이로드 뒤에서 END 마커를 떼어냈음
    pending_end: bool,

    /// 건너뛴 잘못된 헤더 수
    malformed: u64,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk_size,
            buf: BytesMut::with_capacity(chunk_size + END_MARKER.len()),
            eof: false,
            pending_end: false,
            malformed: 0,
        }
    }

    pub fn malformed_count(&self) -> u64 {
        self.malformed
    }

    /// 버퍼에 `want`바이트가 모이거나 EOF가 올 때까지 읽는다. `want`를 넘겨 읽지 않는다.
    async fn fill(&mut self, want: usize) -> Result<usize> {
        while self.buf.len() < want && !self.eof {
            let start = self.buf.len();
            self.buf.resize(want, 0);
            let n = self.reader.read(&mut self.buf[start..]).await?;
            self.buf.truncate(start + n);
            if n == 0 {
                self.eof = true;
            }
        }
        Ok(self.buf.len().min(want))
    }

    /// 다음 프레임 읽기
    pub async fn next_frame(&mut self) -> Result<FrameEvent> {
        if self.pending_end {
            self.pending_end = false;
            return Ok(FrameEvent::End);
        }

        // END 마커는 4바이트라 먼저 4바이트만 본다
        let have = self.fill(END_MARKER.len()).await?;
        if have == 0 {
            return Ok(FrameEvent::Closed);
        }
        if have < END_MARKER.len() {
            warn!("헤더 도중 스트림 종료: {} bytes", have);
            self.buf.clear();
            return Ok(FrameEvent::Closed);
        }
        if &self.buf[..END_MARKER.len()] == END_MARKER {
            self.buf.advance(END_MARKER.len());
            return Ok(FrameEvent::End);
        }

        let have = self.fill(HEADER_LEN).await?;
        if have < HEADER_LEN {
            warn!("헤더 도중 스트림 종료: {} bytes", have);
            self.buf.clear();
            return Ok(FrameEvent::Closed);
        }

        let mut head = [0u8; HEADER_LEN];
        head.copy_from_slice(&self.buf.split_to(HEADER_LEN));

        let seq = match decode_header(&head) {
            Header::Sequence(seq) => seq,
            Header::Malformed => {
                self.malformed += 1;
                warn!("잘못된 헤더 건너뜀: {:?}", String::from_utf8_lossy(&head));
                return Ok(FrameEvent::Malformed(head));
            }
        };

        let want = self.chunk_size + END_MARKER.len();
        let have = self.fill(want).await?;
        if have == 0 {
            warn!("페이로드 없이 스트림 종료: seq={}", seq);
            return Ok(FrameEvent::Closed);
        }

        let payload = if have == want {
            // 뒤에 다음 헤더(또는 END 마커)가 이어진다: 꽉 찬 청크
            self.buf.split_to(self.chunk_size)
        } else {
            // EOF까지 남은 전부 = 마지막 청크. 끝에 붙은 END 마커 하나를 떼어낸다.
            let mut rest = self.buf.split();
            if rest.ends_with(END_MARKER) {
                rest.truncate(rest.len() - END_MARKER.len());
                self.pending_end = true;
            }
            if rest.len() > self.chunk_size {
                // 다음 헤더 도중에 끊긴 경우: 남은 조각은 다음 호출에서 Closed
                self.buf = rest.split_off(self.chunk_size);
            }
            debug!("마지막 청크: seq={}, {} bytes", seq, rest.len());
            rest
        };

        Ok(FrameEvent::Chunk(Chunk::new(seq, payload.freeze())))
    }
}
