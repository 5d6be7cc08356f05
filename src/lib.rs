//! # CFT (Chunked File Transfer)
//!
//! TCP 기반 청크 전송 + SHA-256 에코 검증 프로토콜
//!
//! ## 핵심 특징
//! - **시퀀스 청크**: 파일을 고정 크기 청크로 분할, 6자리 ASCII 헤더 부착
//! - **순서 무관 조립**: 도착 순서와 상관없이 시퀀스 번호 순으로 재조립
//! - **종단 간 검증**: 양측이 독립적으로 SHA-256 계산 후 비교
//! - **에코 전송**: 서버가 저장한 파일을 다시 클라이언트로 돌려보내 재검증
//!
//! ## 와이어 포맷
//!
//! ```text
//! client -> server:  name\n  [000000|payload] [000001|payload] ...  END\n  <half-close>
//! server -> client:  checksum\n  [000000|payload] ...  END\n  <close>
//! ```

pub mod checksum;
pub mod chunk;
pub mod config;
pub mod connection;
pub mod error;
pub mod logging;
pub mod message;
pub mod receiver;
pub mod sender;
pub mod stats;

pub use checksum::{digest_bytes, digest_file, digest_reader};
pub use chunk::{Chunk, ChunkSplitter, FileIdentity, ReassemblyBuffer, SequenceNumber};
pub use config::Config;
pub use connection::{Client, RoundTripReport, Server, SessionId};
pub use error::{Error, Result};
pub use message::{FrameEvent, FrameReader, Header};
pub use receiver::{FileReceiver, ReceivedFile, Verdict};
pub use sender::FileSender;
pub use stats::TransferStats;

/// 기본 청크 크기 (바이트)
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// 기본 포트
pub const DEFAULT_PORT: u16 = 12345;

/// 시퀀스 헤더 길이 (6자리 zero-padded ASCII 10진수)
pub const HEADER_LEN: usize = 6;

/// 전송 종료 마커. 헤더 자리에 대신 온다.
pub const END_MARKER: &[u8; 4] = b"END\n";

/// 시퀀스 번호 상한 (헤더 폭 고정: 000000 ~ 999999)
pub const MAX_SEQUENCE: u32 = 1_000_000;
