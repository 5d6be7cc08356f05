//! CFT 서버 - Chunked File Transfer
//!
//! 클라이언트가 올린 파일을 청크 단위로 받아 조립하고,
//! SHA-256 체크섬을 돌려준 뒤 저장한 파일을 다시 에코한다.
//!
//! 사용법:
//!   cargo run --release --bin cft-server -- [OPTIONS]
//!
//! 예시:
//!   cargo run --release --bin cft-server -- --bind 0.0.0.0:12345 --output-dir ./inbox

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use cft::{Config, Server};

/// CFT Server - 청크 파일 수신 + 에코
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// 바인드 주소
    #[arg(short, long, default_value = "127.0.0.1:12345")]
    bind: SocketAddr,

    /// 청크 크기 (바이트, 클라이언트와 같아야 함)
    #[arg(long, default_value_t = cft::DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// 에코 전송 시 청크 간격 (밀리초)
    #[arg(long, default_value_t = 10)]
    interval_ms: u64,

    /// 수신 파일 저장 디렉터리
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// 디버그 로그 (RUST_LOG가 있으면 그쪽이 우선)
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    cft::logging::init(args.debug)?;

    let config = Config {
        addr: args.bind,
        chunk_size: args.chunk_size,
        chunk_interval_ms: args.interval_ms,
        output_dir: args.output_dir,
        ..Config::default()
    };

    info!("CFT Server starting...");
    info!("Chunk size: {} bytes", config.chunk_size);
    info!("Chunk interval: {} ms", config.chunk_interval_ms);
    info!("Output dir: {:?}", config.output_dir);

    let server = Server::bind(config)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    server.run().await?;
    Ok(())
}
