//! CFT 클라이언트 - Chunked File Transfer
//!
//! 파일을 청크 단위로 서버에 올리고, 서버가 돌려준 체크섬과
//! 에코된 파일을 검증한다.
//!
//! 사용법:
//!   cargo run --release --bin cft-client -- <FILE> [OPTIONS]
//!
//! 예시:
//!   cargo run --release --bin cft-client -- report.pdf --server 127.0.0.1:12345

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use cft::{Client, Config};

/// CFT Client - 청크 파일 업로드 + 에코 검증
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// 업로드할 파일
    file: PathBuf,

    /// 서버 주소
    #[arg(short, long, default_value = "127.0.0.1:12345")]
    server: SocketAddr,

    /// 청크 크기 (바이트, 서버와 같아야 함)
    #[arg(long, default_value_t = cft::DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// 청크 간격 (밀리초)
    #[arg(long, default_value_t = 10)]
    interval_ms: u64,

    /// 에코 파일 저장 디렉터리
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// 디버그 로그 (RUST_LOG가 있으면 그쪽이 우선)
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    cft::logging::init(args.debug)?;

    let config = Config {
        addr: args.server,
        chunk_size: args.chunk_size,
        chunk_interval_ms: args.interval_ms,
        output_dir: args.output_dir,
        ..Config::default()
    };

    let report = Client::new(config)
        .send_file(&args.file)
        .await
        .with_context(|| format!("transfer of {:?} failed", args.file))?;

    info!("Upload: {} ({})", report.upload, report.sent);
    info!("Echo: {} ({})", report.echo, report.received);
    info!("Echo saved to {:?}", report.echo_path);

    if report.is_success() {
        info!("File transfer successful");
        Ok(ExitCode::SUCCESS)
    } else {
        error!("File corrupted");
        Ok(ExitCode::FAILURE)
    }
}
