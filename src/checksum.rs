//! SHA-256 체크섬
//!
//! 송신측/수신측이 각자 독립적으로 계산하는 종단 간 무결성 지문.
//! 스트리밍 해시이므로 블록 경계와 무관하게 같은 결과가 나온다.

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::Result;

/// 해시 계산 시 읽기 블록 크기
pub const DIGEST_BLOCK_SIZE: usize = 8192;

/// 메모리 데이터의 SHA-256 (소문자 hex)
pub fn digest_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// 스트림을 끝까지 읽으며 SHA-256 계산
pub async fn digest_reader<R: AsyncRead + Unpin>(reader: &mut R) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; DIGEST_BLOCK_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// 파일 전체의 SHA-256 계산 (읽기 전용으로 연다)
pub async fn digest_file(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    digest_reader(&mut file).await
}
