use std::collections::BTreeMap;

use jiracache_protocol::{Inbound, Push, Request, RequestKind, Seq};
use serde_json::Value;

/// Requests waiting to be written to the channel, in send order.
pub type Outbox = Vec<Request>;

/// Result of routing one inbound frame.
#[derive(Debug)]
pub enum Routed<C> {
    Resolved { continuation: C, payload: Value },
    Push(Push),
    Dropped,
}

/// Tags outgoing requests with sequence numbers and hands each response to
/// the continuation registered for its number, at most once.
///
/// `C` is whatever the owner needs to finish the request: a closed enum
/// for the interactive session, a `oneshot::Sender` for the async client.
#[derive(Debug)]
pub struct RequestCorrelator<C> {
    next_seq: Seq,
    pending: BTreeMap<Seq, C>,
}

impl<C> Default for RequestCorrelator<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> RequestCorrelator<C> {
    pub fn new() -> Self {
        Self {
            next_seq: 0,
            pending: BTreeMap::new(),
        }
    }

    pub fn send(&mut self, outbox: &mut Outbox, kind: RequestKind, continuation: C) -> Seq {
        let seq = self.next_seq;
        self.next_seq += 1;

        tracing::trace!(seq, command = kind.command(), "request queued");
        self.pending.insert(seq, continuation);
        outbox.push(kind.into_request(seq));
        seq
    }

    pub fn resolve(&mut self, seq: Seq) -> Option<C> {
        let continuation = self.pending.remove(&seq);
        if continuation.is_none() {
            tracing::debug!(seq, "dropping unmatched response");
        }
        continuation
    }

    pub fn route(&mut self, inbound: Inbound) -> Routed<C> {
        match inbound {
            Inbound::Response { seq, payload } => match self.resolve(seq) {
                Some(continuation) => Routed::Resolved {
                    continuation,
                    payload,
                },
                None => Routed::Dropped,
            },
            Inbound::Push(push) => Routed::Push(push),
            Inbound::Unrecognized => {
                tracing::debug!("dropping unrecognized frame");
                Routed::Dropped
            }
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Forgets every outstanding continuation. Numbers are not reused.
    pub fn abandon(&mut self) -> usize {
        let abandoned = self.pending.len();
        self.pending.clear();
        abandoned
    }
}
