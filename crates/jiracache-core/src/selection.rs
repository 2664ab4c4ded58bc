use jiracache_protocol::{decode_entries, Issue, RequestKind, ResultEntry, Seq};
use serde_json::Value;

use crate::cache::ObjectCache;
use crate::correlator::{Outbox, RequestCorrelator};

/// What the session still has to do once a tagged response comes back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuation {
    QueryResults { query: String },
    IssueDetail { key: String },
}

/// Borrowed session state a transition may touch besides its own.
pub struct Ctx<'a> {
    pub cache: &'a mut ObjectCache,
    pub correlator: &'a mut RequestCorrelator<Continuation>,
    pub outbox: &'a mut Outbox,
}

impl Ctx<'_> {
    fn send(&mut self, kind: RequestKind, continuation: Continuation) -> Seq {
        self.correlator.send(self.outbox, kind, continuation)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedEntry {
    Issue(Issue),
    /// A reference the cache could not expand.
    Unresolved(String),
}

impl ResolvedEntry {
    pub fn key(&self) -> &str {
        match self {
            ResolvedEntry::Issue(issue) => &issue.key,
            ResolvedEntry::Unresolved(key) => key,
        }
    }

    pub fn issue(&self) -> Option<&Issue> {
        match self {
            ResolvedEntry::Issue(issue) => Some(issue),
            ResolvedEntry::Unresolved(_) => None,
        }
    }
}

/// Markup rendered by the backend and accepted for display without
/// client-side sanitizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedHtml(String);

impl TrustedHtml {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayedIssue {
    pub issue: Issue,
    pub description: Option<TrustedHtml>,
}

impl DisplayedIssue {
    pub fn key(&self) -> &str {
        &self.issue.key
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Searching {
        seq: Seq,
    },
    Displaying,
}

/// Query, result list, active index and displayed issue for one session.
///
/// Every mutating method returns whether observable state changed.
#[derive(Debug, Clone, Default)]
pub struct SelectionController {
    query: String,
    phase: Phase,
    results: Vec<ResolvedEntry>,
    active: Option<usize>,
    wanted_key: Option<String>,
    issue: Option<DisplayedIssue>,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn results(&self) -> &[ResolvedEntry] {
        &self.results
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active_entry(&self) -> Option<&ResolvedEntry> {
        self.results.get(self.active?)
    }

    pub fn wanted_key(&self) -> Option<&str> {
        self.wanted_key.as_deref()
    }

    pub fn issue(&self) -> Option<&DisplayedIssue> {
        self.issue.as_ref()
    }

    pub fn set_query(&mut self, query: &str, ctx: &mut Ctx<'_>) -> bool {
        if query == self.query {
            return false;
        }
        self.query = query.to_owned();

        if query.is_empty() {
            self.phase = Phase::Idle;
            self.results.clear();
            self.active = None;
            self.fetch_and_display_issue(None, ctx);
            return true;
        }

        let seq = ctx.send(
            RequestKind::Query {
                query: query.to_owned(),
            },
            Continuation::QueryResults {
                query: query.to_owned(),
            },
        );
        self.phase = Phase::Searching { seq };
        true
    }

    pub fn on_query_results(&mut self, query: &str, payload: Value, ctx: &mut Ctx<'_>) -> bool {
        if query != self.query {
            tracing::debug!(stale = query, current = %self.query, "discarding stale query response");
            return false;
        }
        let Some(entries) = decode_entries(payload) else {
            tracing::debug!(query, "query response payload is not a list");
            return false;
        };

        self.results = resolve_entries(entries, ctx.cache);
        self.phase = Phase::Displaying;

        match self.results.first().map(|e| e.key().to_owned()) {
            Some(key) => {
                self.active = Some(0);
                self.fetch_and_display_issue(Some(&key), ctx);
            }
            None => {
                self.active = None;
                self.fetch_and_display_issue(None, ctx);
            }
        }
        true
    }

    pub fn move_active(&mut self, delta: isize, ctx: &mut Ctx<'_>) -> bool {
        let Some(current) = self.active else {
            return false;
        };
        match current.checked_add_signed(delta) {
            Some(next) => self.set_active_index(next, ctx),
            None => false,
        }
    }

    /// Out-of-range indices are ignored.
    pub fn set_active_index(&mut self, index: usize, ctx: &mut Ctx<'_>) -> bool {
        let Some(entry) = self.results.get(index) else {
            return false;
        };
        let key = entry.key().to_owned();
        let moved = self.active != Some(index);
        self.active = Some(index);
        self.fetch_and_display_issue(Some(&key), ctx) || moved
    }

    pub fn fetch_and_display_issue(&mut self, key: Option<&str>, ctx: &mut Ctx<'_>) -> bool {
        let Some(key) = key else {
            let changed = self.issue.is_some() || self.wanted_key.is_some();
            self.issue = None;
            self.wanted_key = None;
            return changed;
        };

        if self.issue.as_ref().is_some_and(|shown| shown.key() == key) {
            return false;
        }

        ctx.send(
            RequestKind::Get {
                key: key.to_owned(),
            },
            Continuation::IssueDetail {
                key: key.to_owned(),
            },
        );
        self.wanted_key = Some(key.to_owned());
        true
    }

    pub fn on_issue_detail(&mut self, requested: &str, payload: Value) -> bool {
        let Ok(issue) = serde_json::from_value::<Issue>(payload) else {
            tracing::debug!(requested, "issue response carries no issue");
            return false;
        };
        if self.wanted_key.as_deref() != Some(issue.key.as_str()) {
            tracing::debug!(requested, received = %issue.key, "discarding superseded issue response");
            return false;
        }

        self.set_issue(issue);
        self.wanted_key = None;
        true
    }

    pub fn set_issue(&mut self, issue: Issue) {
        let description = issue
            .rendered_description()
            .map(|html| TrustedHtml(html.to_owned()));
        self.issue = Some(DisplayedIssue { issue, description });
    }

    /// Live replacement of the displayed (or awaited) issue.
    pub fn apply_raw_update(&mut self, issue: Issue) -> bool {
        let shown = self.issue.as_ref().is_some_and(|i| i.key() == issue.key);
        let wanted = self.wanted_key.as_deref() == Some(issue.key.as_str());
        if !shown && !wanted {
            return false;
        }
        self.set_issue(issue);
        true
    }

    /// Server-side re-run of the current query.
    pub fn apply_search_update(
        &mut self,
        query: &str,
        entries: Vec<ResultEntry>,
        ctx: &mut Ctx<'_>,
    ) -> bool {
        if query != self.query {
            tracing::debug!(pushed = query, current = %self.query, "ignoring search update for another query");
            return false;
        }

        let focused = self.issue.as_ref().map(|i| i.key().to_owned());
        self.results = resolve_entries(entries, ctx.cache);

        let Some(focused) = focused else {
            self.clamp_active();
            return true;
        };

        if self.results.is_empty() {
            self.active = None;
            self.fetch_and_display_issue(None, ctx);
            return true;
        }

        let index = match self.position(&focused) {
            Some(index) => index,
            None => {
                self.issue = None;
                0
            }
        };
        self.set_active_index(index, ctx);
        true
    }

    /// Re-reads cached entries for `key` into the visible list.
    pub fn refresh_from_cache(&mut self, key: &str, cache: &ObjectCache) -> bool {
        let Some(cached) = cache.get(key) else {
            return false;
        };

        let mut changed = false;
        for entry in self.results.iter_mut().filter(|e| e.key() == key) {
            if entry.issue() != Some(cached) {
                *entry = ResolvedEntry::Issue(cached.clone());
                changed = true;
            }
        }
        changed
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.results.iter().position(|e| e.key() == key)
    }

    fn clamp_active(&mut self) {
        self.active = match self.results.len() {
            0 => None,
            len => Some(self.active.unwrap_or(0).min(len - 1)),
        };
    }

    #[cfg(test)]
    pub fn validate(&self) -> Result<(), String> {
        match (self.active, self.results.len()) {
            (None, 0) => Ok(()),
            (Some(idx), len) if idx < len => Ok(()),
            (active, len) => Err(format!("active index {active:?} invalid for {len} results")),
        }
    }
}

fn resolve_entries(entries: Vec<ResultEntry>, cache: &mut ObjectCache) -> Vec<ResolvedEntry> {
    entries
        .into_iter()
        .map(|entry| {
            let key = entry.key().to_owned();
            match cache.resolve(entry) {
                Some(issue) => ResolvedEntry::Issue(issue),
                None => ResolvedEntry::Unresolved(key),
            }
        })
        .collect()
}
