//! 에러 타입 정의

use thiserror::Error;

/// CFT 프로토콜 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("시퀀스 번호 범위 초과: {seq} (최대 {max})")]
    SequenceOverflow { seq: u32, max: u32 },

    #[error("청크 수 초과: file_size={file_size}, chunk_size={chunk_size} -> {total_chunks} chunks (최대 {max})")]
    TooManyChunks {
        file_size: u64,
        chunk_size: usize,
        total_chunks: u64,
        max: u32,
    },

    #[error("유효하지 않은 청크 크기: {0}")]
    InvalidChunkSize(usize),

    #[error("유효하지 않은 파일 이름: {0:?}")]
    InvalidFileName(String),

    #[error("라인 메시지가 너무 김: 최대 {max} bytes 안에 줄바꿈 없음")]
    LineTooLong { max: u64 },

    #[error("체크섬 메시지 누락")]
    MissingChecksum,
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
