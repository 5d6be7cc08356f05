//! 전송 통계

use std::fmt;
use std::time::{Duration, Instant};

/// 한 방향 전송(세션)의 통계
#[derive(Debug, Clone)]
pub struct TransferStats {
    /// 송신/수신한 청크 수
    pub chunks: u64,

    /// 페이로드 바이트 (헤더 제외)
    pub payload_bytes: u64,

    /// 와이어 바이트 (헤더, END 마커 포함)
    pub wire_bytes: u64,

    /// 덮어쓴 중복 청크 수
    pub duplicate_chunks: u64,

    /// 건너뛴 잘못된 헤더 수
    pub malformed_headers: u64,

    /// 조립 시 빠져 있던 시퀀스 번호 수
    pub missing_chunks: u64,

    /// END 마커를 받았는지 (수신측)
    pub end_marker_seen: bool,

    /// 시작 시간
    started_at: Instant,

    /// 소요 시간 (finish 이후 고정)
    elapsed: Option<Duration>,
}

impl TransferStats {
    pub fn new() -> Self {
        Self {
            chunks: 0,
            payload_bytes: 0,
            wire_bytes: 0,
            duplicate_chunks: 0,
            malformed_headers: 0,
            missing_chunks: 0,
            end_marker_seen: false,
            started_at: Instant::now(),
            elapsed: None,
        }
    }

    /// 청크 하나 기록
    pub fn record_chunk(&mut self, payload_len: usize, wire_len: usize) {
        self.chunks += 1;
        self.payload_bytes += payload_len as u64;
        self.wire_bytes += wire_len as u64;
    }

    /// 잘못된 헤더 기록
    pub fn record_malformed(&mut self, wire_len: usize) {
        self.malformed_headers += 1;
        self.wire_bytes += wire_len as u64;
    }

    /// 전송 종료 시점 고정
    pub fn finish(&mut self) {
        if self.elapsed.is_none() {
            self.elapsed = Some(self.started_at.elapsed());
        }
    }

    /// 소요 시간
    pub fn elapsed(&self) -> Duration {
        self.elapsed.unwrap_or_else(|| self.started_at.elapsed())
    }

    /// 페이로드 처리율 (bytes/sec)
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.payload_bytes as f64 / secs
    }

    /// 깨끗한 전송인지 (중복/누락/잘못된 헤더 없음)
    pub fn is_clean(&self) -> bool {
        self.duplicate_chunks == 0 && self.missing_chunks == 0 && self.malformed_headers == 0
    }
}

impl Default for TransferStats {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransferStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} chunks, {} bytes in {:.3}s ({:.1} KB/s)",
            self.chunks,
            self.payload_bytes,
            self.elapsed().as_secs_f64(),
            self.throughput() / 1024.0
        )?;
        if !self.is_clean() {
            write!(
                f,
                " [dup={}, missing={}, malformed={}]",
                self.duplicate_chunks, self.missing_chunks, self.malformed_headers
            )?;
        }
        Ok(())
    }
}
