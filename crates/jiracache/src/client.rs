use anyhow::{anyhow, Context as _, Result};
use jiracache_core::correlator::{Outbox, RequestCorrelator, Routed};
use jiracache_protocol::{decode_entries, parse_frame, Issue, Push, RequestKind, ResultEntry};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::channel::{Channel, ServerAddr};

struct PendingRequest {
    kind: RequestKind,
    reply: oneshot::Sender<Value>,
}

/// Request/response client for one-shot commands.
///
/// A single driver task owns the channel and the pending table, so
/// sequence allocation and resolution never race.
pub struct Client {
    requests: mpsc::UnboundedSender<PendingRequest>,
    pushes: mpsc::UnboundedReceiver<Push>,
    driver: JoinHandle<()>,
}

impl Client {
    pub async fn connect(addr: &ServerAddr) -> Result<Self> {
        Ok(Self::new(Channel::connect(addr).await?))
    }

    pub fn new(channel: Channel) -> Self {
        let (req_tx, req_rx) = mpsc::unbounded_channel();
        let (push_tx, push_rx) = mpsc::unbounded_channel();
        let driver = tokio::spawn(drive(channel, req_rx, push_tx));
        Self {
            requests: req_tx,
            pushes: push_rx,
            driver,
        }
    }

    pub async fn request(&self, kind: RequestKind) -> Result<Value> {
        let (reply, rx) = oneshot::channel();
        self.requests
            .send(PendingRequest { kind, reply })
            .map_err(|_| anyhow!("connection closed"))?;
        rx.await
            .map_err(|_| anyhow!("connection closed before response"))
    }

    pub async fn query(&self, query: &str) -> Result<Vec<ResultEntry>> {
        let payload = self
            .request(RequestKind::Query {
                query: query.to_owned(),
            })
            .await?;
        decode_entries(payload).ok_or_else(|| anyhow!("query response is not a list"))
    }

    /// `None` when the backend does not know `key`.
    pub async fn get(&self, key: &str) -> Result<Option<Issue>> {
        let payload = self
            .request(RequestKind::Get {
                key: key.to_owned(),
            })
            .await?;
        if payload.is_null() {
            return Ok(None);
        }
        let issue = serde_json::from_value(payload).context("parse issue response")?;
        Ok(Some(issue))
    }

    pub async fn next_push(&mut self) -> Option<Push> {
        self.pushes.recv().await
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

async fn drive(
    mut channel: Channel,
    mut requests: mpsc::UnboundedReceiver<PendingRequest>,
    pushes: mpsc::UnboundedSender<Push>,
) {
    let mut correlator = RequestCorrelator::<oneshot::Sender<Value>>::new();
    let mut outbox = Outbox::new();

    loop {
        tokio::select! {
            req = requests.recv() => {
                let Some(PendingRequest { kind, reply }) = req else { break };
                correlator.send(&mut outbox, kind, reply);
                for frame in outbox.drain(..) {
                    if let Err(err) = channel.send(frame) {
                        tracing::warn!(error = %err, "dropping request");
                    }
                }
            }
            frame = channel.recv() => {
                let Some(frame) = frame else { break };
                match correlator.route(parse_frame(&frame)) {
                    Routed::Resolved { continuation, payload } => {
                        let _ = continuation.send(payload);
                    }
                    Routed::Push(push) => {
                        let _ = pushes.send(push);
                    }
                    Routed::Dropped => {}
                }
            }
        }
    }

    let abandoned = correlator.abandon();
    tracing::debug!(abandoned, "client driver stopped");
}
