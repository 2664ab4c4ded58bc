use std::fmt;
use std::path::PathBuf;

use anyhow::{anyhow, Context as _, Result};
use jiracache_protocol::Request;
use tokio::io::{AsyncRead, AsyncWrite, BufReader, BufWriter};
use tokio::net::{TcpStream, UnixStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::ipc::jsonl::{read_frame, write_jsonl};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerAddr {
    Tcp(String),
    Unix(PathBuf),
}

impl ServerAddr {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some(path) = raw.strip_prefix("unix:") {
            return ServerAddr::Unix(PathBuf::from(path));
        }
        if raw.starts_with('/') {
            return ServerAddr::Unix(PathBuf::from(raw));
        }
        ServerAddr::Tcp(raw.to_owned())
    }
}

impl fmt::Display for ServerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerAddr::Tcp(addr) => f.write_str(addr),
            ServerAddr::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}

/// Ordered duplex connection carrying one JSON frame per line.
///
/// Writes are queued and flushed by a background task. Inbound frames
/// are handed out raw; `recv` returns `None` once the peer hangs up.
pub struct Channel {
    outbound: mpsc::UnboundedSender<Request>,
    inbound: mpsc::UnboundedReceiver<String>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Channel {
    pub async fn connect(addr: &ServerAddr) -> Result<Self> {
        let channel = match addr {
            ServerAddr::Tcp(host) => {
                let stream = TcpStream::connect(host.as_str())
                    .await
                    .with_context(|| format!("connect: {addr}"))?;
                stream.set_nodelay(true).context("set TCP_NODELAY")?;
                Self::from_stream(stream)
            }
            ServerAddr::Unix(path) => {
                let stream = UnixStream::connect(path)
                    .await
                    .with_context(|| format!("connect: {addr}"))?;
                Self::from_stream(stream)
            }
        };
        tracing::info!(%addr, "channel connected");
        Ok(channel)
    }

    pub fn from_stream<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Request>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<String>();

        let writer = tokio::spawn(async move {
            let mut writer = BufWriter::new(write_half);
            while let Some(req) = out_rx.recv().await {
                if let Err(err) = write_jsonl(&mut writer, &req).await {
                    tracing::warn!(error = %err, seq = req.seq, "channel write failed");
                    break;
                }
            }
        });

        let reader = tokio::spawn(async move {
            let mut reader = BufReader::new(read_half);
            loop {
                match read_frame(&mut reader).await {
                    Ok(Some(frame)) => {
                        if in_tx.send(frame).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        tracing::debug!("channel closed by peer");
                        break;
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "channel read failed");
                        break;
                    }
                }
            }
        });

        Self {
            outbound: out_tx,
            inbound: in_rx,
            reader,
            writer,
        }
    }

    pub fn send(&self, req: Request) -> Result<()> {
        self.outbound
            .send(req)
            .map_err(|_| anyhow!("channel writer stopped"))
    }

    pub async fn recv(&mut self) -> Option<String> {
        self.inbound.recv().await
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}
