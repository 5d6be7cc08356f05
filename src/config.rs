//! 프로토콜 설정

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::chunk::chunk_count;
use crate::{Error, Result, DEFAULT_CHUNK_SIZE, DEFAULT_PORT};

/// CFT 프로토콜 설정
///
/// 서버/클라이언트, 송신자/수신자 모두 같은 구조체를 받는다.
/// 양측의 `chunk_size`는 반드시 같아야 한다 (와이어에 길이 필드가 없음).
#[derive(Debug, Clone)]
pub struct Config {
    /// 서버: 바인드 주소, 클라이언트: 접속 대상
    pub addr: SocketAddr,

    /// 청크 크기 (바이트)
    pub chunk_size: usize,

    /// 청크 전송 간격 (밀리초)
    /// 0이면 최대 속도로 전송
    pub chunk_interval_ms: u64,

    /// 파일 이름 전송 후 대기 시간 (밀리초)
    pub name_delay_ms: u64,

    /// 수신 파일 저장 디렉터리
    pub output_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_interval_ms: 10, // 10ms pacing
            name_delay_ms: 0,
            output_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 지연 없는 설정 (로컬 링크, 테스트용)
    pub fn unpaced() -> Self {
        Self {
            chunk_interval_ms: 0,
            name_delay_ms: 0,
            ..Self::default()
        }
    }

    /// 청크 전송 간격
    pub fn chunk_interval(&self) -> Duration {
        Duration::from_millis(self.chunk_interval_ms)
    }

    /// 이름 전송 후 대기 시간
    pub fn name_delay(&self) -> Duration {
        Duration::from_millis(self.name_delay_ms)
    }

    /// 파일 크기 기준 청크 수 계산 (빈 파일은 0)
    ///
    /// 시퀀스 헤더로 표현할 수 없는 크기면 `TooManyChunks`.
    pub fn total_chunks(&self, file_size: u64) -> Result<u32> {
        chunk_count(file_size, self.chunk_size)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidChunkSize(self.chunk_size));
        }
        Ok(())
    }
}
