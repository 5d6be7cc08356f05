//! 연결 처리
//!
//! - Server: accept 루프, 연결마다 독립 태스크 (공유 상태 없음)
//! - handle_connection: 서버 역할 세션 (수신 -> 체크섬 응답 -> 에코 송신)
//! - Client: 클라이언트 역할 세션 (송신 -> 체크섬 수신 -> 에코 수신 및 검증)

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

use crate::checksum::digest_file;
use crate::message::{read_line, write_line};
use crate::receiver::{FileReceiver, ReceivedFile, Verdict};
use crate::sender::FileSender;
use crate::stats::TransferStats;
use crate::{Config, Error, Result};

/// 연결 식별자 (저장 파일 이름 접두사로 사용)
pub type SessionId = u64;

/// 서버 (수신 후 에코)
pub struct Server {
    config: Config,
    listener: TcpListener,
    next_id: SessionId,
}

impl Server {
    /// 리스너 바인딩. 포트 사용 중 등 설정 에러는 여기서 반환된다.
    pub async fn bind(config: Config) -> Result<Self> {
        config.validate()?;
        let listener = TcpListener::bind(config.addr).await?;
        info!("CFT Server listening on {}", listener.local_addr()?);

        Ok(Self {
            config,
            listener,
            next_id: 1,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// accept 루프. 연결마다 태스크를 하나씩 띄운다 (상한 없음).
    pub async fn run(mut self) -> Result<()> {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("accept 에러: {}", e);
                    continue;
                }
            };

            let id = self.next_id;
            self.next_id += 1;
            info!("클라이언트 연결: {} (session {})", peer, id);

            let config = self.config.clone();
            tokio::spawn(handle_connection(stream, id, config));
        }
    }
}

/// 연결 하나 처리. 에러는 여기서 로그로 끝나고 다른 연결에 전파되지 않는다.
pub async fn handle_connection(stream: TcpStream, id: SessionId, config: Config) {
    info!("세션 {} 처리 시작", id);

    match serve_session(stream, id, &config).await {
        Ok(Some(received)) => info!(
            "세션 {} 완료: {:?} ({} bytes)",
            id, received.path, received.size
        ),
        Ok(None) => info!("세션 {}: 수신한 파일 없음", id),
        Err(e) => warn!("세션 {} 에러: {}", id, e),
    }

    // stream은 serve_session 안에서 이미 drop됨
    info!("세션 {} 연결 종료", id);
}

async fn serve_session(
    stream: TcpStream,
    id: SessionId,
    config: &Config,
) -> Result<Option<ReceivedFile>> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let Some(name) = FileReceiver::read_file_name(&mut reader).await? else {
        info!("세션 {}: 파일 이름 전에 연결 종료", id);
        return Ok(None);
    };
    info!("세션 {}: 파일 수신 {}", id, name);

    let receiver = FileReceiver::new(config.clone());
    let (buffer, stats) = receiver.receive_chunks(&mut reader).await?;

    // END 마커 없이 아무것도 못 받았으면 빈 파일과 구분해 작업 없음으로 처리
    if buffer.is_empty() && !stats.end_marker_seen {
        return Ok(None);
    }

    let dest = config.output_dir.join(format!("received_{id}_{name}"));
    let received = FileReceiver::store(buffer, stats, &dest).await?;

    info!("세션 {}: 체크섬 전송 {}", id, received.checksum);
    write_line(&mut write_half, &received.checksum).await?;

    info!("세션 {}: 에코 전송 {:?}", id, received.path);
    FileSender::new(config.clone())
        .send_contents(&mut write_half, &received.path)
        .await?;

    Ok(Some(received))
}

/// 왕복 전송 결과
#[derive(Debug, Clone)]
pub struct RoundTripReport {
    pub file_name: String,

    /// 원본 파일의 로컬 체크섬
    pub local_checksum: String,

    /// 서버가 저장 후 계산해 보낸 체크섬
    pub server_checksum: String,

    /// 업로드 검증 (로컬 vs 서버)
    pub upload: Verdict,

    /// 에코 검증 (서버 vs 되돌려받은 파일)
    pub echo: Verdict,

    /// 에코 저장 경로
    pub echo_path: PathBuf,

    pub sent: TransferStats,
    pub received: TransferStats,
}

impl RoundTripReport {
    pub fn is_success(&self) -> bool {
        self.upload.is_success() && self.echo.is_success()
    }
}

/// 클라이언트 (송신 후 에코 수신)
#[derive(Debug, Clone)]
pub struct Client {
    config: Config,
}

impl Client {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// 파일 업로드 후 에코를 받아 검증
    pub async fn send_file(&self, path: &Path) -> Result<RoundTripReport> {
        self.config.validate()?;

        // 파일 문제(없음, 청크 수 초과)는 해시와 연결 전에 드러나야 한다
        let sender = FileSender::new(self.config.clone());
        let identity = sender.identify(path).await?;
        let local_checksum = digest_file(path).await?;

        info!("서버 연결 중: {}", self.config.addr);
        let stream = TcpStream::connect(self.config.addr).await?;
        info!("서버 연결됨: {}", self.config.addr);

        let (read_half, mut write_half) = stream.into_split();
        let sent = sender.send_file(&mut write_half, path).await?;
        info!("업로드 완료, 응답 대기 중");

        let mut reader = BufReader::new(read_half);
        let server_checksum = read_line(&mut reader)
            .await?
            .ok_or(Error::MissingChecksum)?;
        info!("서버 체크섬 수신: {}", server_checksum);

        let upload = Verdict::compare(&server_checksum, &local_checksum);

        let dest = self
            .config
            .output_dir
            .join(format!("received_{}", identity.name));
        let received = FileReceiver::new(self.config.clone())
            .receive_to_file(&mut reader, &dest)
            .await?;
        let echo = Verdict::compare(&server_checksum, &received.checksum);

        match (&upload, &echo) {
            (Verdict::Success, Verdict::Success) => info!("파일 전송 성공: {}", identity.name),
            _ => warn!("파일 손상: upload={}, echo={}", upload, echo),
        }

        Ok(RoundTripReport {
            file_name: identity.name,
            local_checksum,
            server_checksum,
            upload,
            echo,
            echo_path: received.path,
            sent,
            received: received.stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::digest_bytes;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn start_server(output_dir: &Path) -> SocketAddr {
        let config = Config {
            addr: "127.0.0.1:0".parse().unwrap(),
            output_dir: output_dir.to_path_buf(),
            ..Config::unpaced()
        };
        let server = Server::bind(config).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());
        addr
    }

    fn client_config(addr: SocketAddr, output_dir: &Path) -> Config {
        Config {
            addr,
            output_dir: output_dir.to_path_buf(),
            ..Config::unpaced()
        }
    }

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| ((i * 31 + 7) % 253) as u8).collect()
    }

    /// 업로드를 끝까지 읽은 뒤 `reply`를 그대로 돌려주는 한 번짜리 서버
    async fn scripted_server(reply: Vec<u8>) -> (SocketAddr, tokio::task::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut upload = Vec::new();
            stream.read_to_end(&mut upload).await.unwrap();
            stream.write_all(&reply).await.unwrap();
            stream.shutdown().await.unwrap();
            upload
        });
        (addr, handle)
    }

    async fn echo_frames(data: &[u8]) -> Vec<u8> {
        let mut wire = Vec::new();
        FileSender::new(Config::unpaced())
            .send_chunks(data, data.len() as u64, &mut wire)
            .await
            .unwrap();
        wire
    }

    #[tokio::test]
    async fn test_round_trip_over_tcp() {
        let server_dir = tempfile::tempdir().unwrap();
        let client_dir = tempfile::tempdir().unwrap();
        let addr = start_server(server_dir.path()).await;
        let client = Client::new(client_config(addr, client_dir.path()));

        for size in [0usize, 1, 452, 1023, 1024, 2500, 10 * 1024] {
            let source = client_dir.path().join(format!("source_{size}.bin"));
            let data = sample(size);
            std::fs::write(&source, &data).unwrap();

            let report = client.send_file(&source).await.unwrap();

            assert!(report.is_success(), "size={size}: {report:?}");
            assert_eq!(report.server_checksum, digest_bytes(&data));
            assert_eq!(report.file_name, format!("source_{size}.bin"));
            assert_eq!(std::fs::read(&report.echo_path).unwrap(), data);
            assert_eq!(report.sent.chunks, size.div_ceil(1024) as u64);
            assert_eq!(report.received.chunks, report.sent.chunks);
        }
    }

    #[tokio::test]
    async fn test_server_names_files_by_session() {
        let server_dir = tempfile::tempdir().unwrap();
        let client_dir = tempfile::tempdir().unwrap();
        let addr = start_server(server_dir.path()).await;

        let source = client_dir.path().join("hello.txt");
        std::fs::write(&source, b"hello").unwrap();

        let client = Client::new(client_config(addr, client_dir.path()));
        client.send_file(&source).await.unwrap();
        client.send_file(&source).await.unwrap();

        assert_eq!(
            std::fs::read(server_dir.path().join("received_1_hello.txt")).unwrap(),
            b"hello"
        );
        assert_eq!(
            std::fs::read(server_dir.path().join("received_2_hello.txt")).unwrap(),
            b"hello"
        );
        assert_eq!(
            std::fs::read(client_dir.path().join("received_hello.txt")).unwrap(),
            b"hello"
        );
    }

    #[tokio::test]
    async fn test_concurrent_clients() {
        let server_dir = tempfile::tempdir().unwrap();
        let client_dir = tempfile::tempdir().unwrap();
        let addr = start_server(server_dir.path()).await;

        let mut tasks = Vec::new();
        for i in 0..4usize {
            let dir = client_dir.path().join(format!("client_{i}"));
            std::fs::create_dir(&dir).unwrap();
            let source = dir.join("payload.bin");
            std::fs::write(&source, sample(3000 + i * 700)).unwrap();

            let client = Client::new(client_config(addr, &dir));
            tasks.push(tokio::spawn(async move { client.send_file(&source).await }));
        }

        for task in tasks {
            let report = task.await.unwrap().unwrap();
            assert!(report.is_success());
        }
    }

    #[tokio::test]
    async fn test_early_disconnect_does_not_stop_server() {
        let server_dir = tempfile::tempdir().unwrap();
        let client_dir = tempfile::tempdir().unwrap();
        let addr = start_server(server_dir.path()).await;

        // 이름도 보내지 않고 끊기
        drop(TcpStream::connect(addr).await.unwrap());

        // 이름 + 잘린 프레임 후 끊기
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"broken.bin\n000000abc").await.unwrap();
        stream.shutdown().await.unwrap();
        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).await.unwrap();

        // 서버가 받은 만큼의 체크섬을 돌려주고 에코한다
        let text = String::from_utf8_lossy(&reply);
        assert!(text.starts_with(&digest_bytes(b"abc")));

        let source = client_dir.path().join("after.bin");
        std::fs::write(&source, sample(5000)).unwrap();
        let report = Client::new(client_config(addr, client_dir.path()))
            .send_file(&source)
            .await
            .unwrap();
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn test_malformed_header_over_tcp() {
        let server_dir = tempfile::tempdir().unwrap();
        let addr = start_server(server_dir.path()).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut wire = b"x.bin\n".to_vec();
        wire.extend_from_slice(b"000000");
        wire.extend_from_slice(&[b'a'; 1024]);
        wire.extend_from_slice(b"??????");
        wire.extend_from_slice(b"000001");
        wire.extend_from_slice(b"tail");
        wire.extend_from_slice(b"END\n");
        stream.write_all(&wire).await.unwrap();
        stream.shutdown().await.unwrap();

        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).await.unwrap();

        let mut expected = vec![b'a'; 1024];
        expected.extend_from_slice(b"tail");
        let text = String::from_utf8_lossy(&reply);
        assert!(text.starts_with(&digest_bytes(&expected)));
        assert!(reply.ends_with(b"END\n"));
    }

    #[tokio::test]
    async fn test_wrong_server_checksum_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let data = sample(2500);
        let source = dir.path().join("upload.bin");
        std::fs::write(&source, &data).unwrap();

        let mut reply = format!("{}\n", "0".repeat(64)).into_bytes();
        reply.extend_from_slice(&echo_frames(&data).await);
        let (addr, peer) = scripted_server(reply).await;

        let report = Client::new(client_config(addr, dir.path()))
            .send_file(&source)
            .await
            .unwrap();

        assert!(matches!(report.upload, Verdict::Corrupt { .. }));
        assert!(matches!(report.echo, Verdict::Corrupt { .. }));
        assert!(!report.is_success());
        assert!(peer.await.unwrap().starts_with(b"upload.bin\n000000"));
    }

    #[tokio::test]
    async fn test_truncated_echo_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let data = sample(2500);
        let source = dir.path().join("upload.bin");
        std::fs::write(&source, &data).unwrap();

        // 올바른 체크섬 + 첫 프레임만, END 없이 종료
        let mut reply = format!("{}\n", digest_bytes(&data)).into_bytes();
        reply.extend_from_slice(&echo_frames(&data).await[..6 + 1024]);
        let (addr, _peer) = scripted_server(reply).await;

        let report = Client::new(client_config(addr, dir.path()))
            .send_file(&source)
            .await
            .unwrap();

        assert_eq!(report.upload, Verdict::Success);
        assert!(matches!(report.echo, Verdict::Corrupt { .. }));
        assert!(!report.is_success());
        assert!(!report.received.end_marker_seen);
        assert_eq!(std::fs::read(&report.echo_path).unwrap(), &data[..1024]);
    }

    #[tokio::test]
    async fn test_close_before_checksum_is_missing_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("upload.bin");
        std::fs::write(&source, sample(100)).unwrap();

        let (addr, _peer) = scripted_server(Vec::new()).await;
        let result = Client::new(client_config(addr, dir.path()))
            .send_file(&source)
            .await;
        assert!(matches!(result, Err(Error::MissingChecksum)));
    }

    #[tokio::test]
    async fn test_oversized_source_fails_before_connect() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("big.bin");
        let file = std::fs::File::create(&source).unwrap();
        file.set_len(crate::MAX_SEQUENCE as u64 + 1).unwrap();

        let config = Config {
            chunk_size: 1,
            ..client_config("127.0.0.1:1".parse().unwrap(), dir.path())
        };
        let result = Client::new(config).send_file(&source).await;
        assert!(matches!(result, Err(Error::TooManyChunks { .. })));
    }

    #[tokio::test]
    async fn test_missing_source_fails_before_connect() {
        let dir = tempfile::tempdir().unwrap();
        // 아무도 듣지 않는 주소여도 파일 에러가 먼저 나야 한다
        let client = Client::new(client_config("127.0.0.1:1".parse().unwrap(), dir.path()));
        let result = client.send_file(&dir.path().join("missing.bin")).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_bind_conflict_is_setup_error() {
        let dir = tempfile::tempdir().unwrap();
        let first = Server::bind(client_config("127.0.0.1:0".parse().unwrap(), dir.path()))
            .await
            .unwrap();
        let taken = first.local_addr().unwrap();

        let second = Server::bind(client_config(taken, dir.path())).await;
        assert!(matches!(second, Err(Error::Io(_))));
    }
}
