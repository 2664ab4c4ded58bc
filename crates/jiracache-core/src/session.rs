use jiracache_protocol::{parse_frame, Inbound, Request};

use crate::cache::ObjectCache;
use crate::correlator::{Outbox, RequestCorrelator, Routed};
use crate::push;
use crate::selection::{Continuation, Ctx, SelectionController};

/// What one session transition produced.
#[derive(Debug, Default, PartialEq)]
pub struct Outcome {
    /// Frames to write to the channel, in order.
    pub requests: Vec<Request>,
    /// Observers should re-render.
    pub changed: bool,
}

/// All state for one connection: cache, pending requests and selection.
#[derive(Debug, Default)]
pub struct Session {
    cache: ObjectCache,
    correlator: RequestCorrelator<Continuation>,
    selection: SelectionController,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    pub fn cache(&self) -> &ObjectCache {
        &self.cache
    }

    pub fn correlator(&self) -> &RequestCorrelator<Continuation> {
        &self.correlator
    }

    pub fn set_query(&mut self, query: &str) -> Outcome {
        self.transition(|selection, ctx| selection.set_query(query, ctx))
    }

    pub fn move_active(&mut self, delta: isize) -> Outcome {
        self.transition(|selection, ctx| selection.move_active(delta, ctx))
    }

    pub fn fetch_and_display_issue(&mut self, key: Option<&str>) -> Outcome {
        self.transition(|selection, ctx| selection.fetch_and_display_issue(key, ctx))
    }

    pub fn on_frame(&mut self, frame: &str) -> Outcome {
        self.on_inbound(parse_frame(frame))
    }

    pub fn on_inbound(&mut self, inbound: Inbound) -> Outcome {
        match self.correlator.route(inbound) {
            Routed::Resolved {
                continuation,
                payload,
            } => self.transition(|selection, ctx| match continuation {
                Continuation::QueryResults { query } => {
                    selection.on_query_results(&query, payload, ctx)
                }
                Continuation::IssueDetail { key } => selection.on_issue_detail(&key, payload),
            }),
            Routed::Push(message) => {
                self.transition(|selection, ctx| push::dispatch(message, selection, ctx))
            }
            Routed::Dropped => Outcome::default(),
        }
    }

    /// Channel teardown: outstanding requests are never answered.
    pub fn close(&mut self) -> usize {
        let abandoned = self.correlator.abandon();
        tracing::debug!(abandoned, "session closed");
        abandoned
    }

    fn transition(
        &mut self,
        f: impl FnOnce(&mut SelectionController, &mut Ctx<'_>) -> bool,
    ) -> Outcome {
        let mut outbox = Outbox::new();
        let mut ctx = Ctx {
            cache: &mut self.cache,
            correlator: &mut self.correlator,
            outbox: &mut outbox,
        };
        let changed = f(&mut self.selection, &mut ctx);
        Outcome {
            requests: outbox,
            changed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::{Phase, ResolvedEntry};
    use jiracache_protocol::{Issue, CMD_GET, CMD_QUERY};
    use serde_json::{json, Value};

    fn respond(session: &mut Session, seq: u64, payload: Value) -> Outcome {
        session.on_frame(&json!({"s": seq, "r": payload}).to_string())
    }

    fn push(session: &mut Session, frame: Value) -> Outcome {
        session.on_frame(&frame.to_string())
    }

    fn full(key: &str, summary: &str) -> Value {
        json!({
            "key": key,
            "fields": {"summary": summary},
            "renderedFields": {"description": format!("<p>{summary}</p>")}
        })
    }

    fn only_request(outcome: &Outcome) -> &Request {
        assert_eq!(outcome.requests.len(), 1, "requests: {:?}", outcome.requests);
        &outcome.requests[0]
    }

    /// Runs a query and answers it plus the follow-up fetch for the first hit.
    fn searched(query: &str, results: Value, first: Value) -> Session {
        let mut session = Session::new();
        let q = session.set_query(query);
        let q_seq = only_request(&q).seq;

        let r = respond(&mut session, q_seq, results);
        let get_seq = only_request(&r).seq;
        respond(&mut session, get_seq, first);
        session
    }

    #[test]
    fn query_sends_tagged_request_and_enters_searching() {
        let mut session = Session::new();
        let out = session.set_query("auth");

        let req = only_request(&out);
        assert_eq!(req.command, CMD_QUERY);
        assert_eq!(req.query.as_deref(), Some("auth"));
        assert_eq!(req.seq, 0);
        assert!(out.changed);
        assert_eq!(session.selection().phase(), Phase::Searching { seq: 0 });
    }

    #[test]
    fn same_query_twice_is_noop() {
        let mut session = Session::new();
        session.set_query("auth");
        assert_eq!(session.set_query("auth"), Outcome::default());
    }

    #[test]
    fn query_response_selects_first_and_fetches_it() {
        let mut session = Session::new();
        session.set_query("auth");

        let out = respond(&mut session, 0, json!([full("P-1", "one"), full("P-2", "two")]));
        let req = only_request(&out);
        assert_eq!(req.command, CMD_GET);
        assert_eq!(req.key.as_deref(), Some("P-1"));
        assert!(req.full);

        let sel = session.selection();
        assert_eq!(sel.phase(), Phase::Displaying);
        assert_eq!(sel.active_index(), Some(0));
        assert_eq!(sel.wanted_key(), Some("P-1"));
        assert!(sel.issue().is_none());

        let out = respond(&mut session, req.seq, full("P-1", "one"));
        assert!(out.changed);
        let sel = session.selection();
        assert_eq!(sel.issue().unwrap().key(), "P-1");
        assert_eq!(
            sel.issue().unwrap().description.as_ref().unwrap().as_str(),
            "<p>one</p>"
        );
        assert_eq!(sel.wanted_key(), None);
        sel.validate().unwrap();
    }

    #[test]
    fn empty_query_response_clears_displayed_issue() {
        let mut session = searched("auth", json!([full("P-1", "one")]), full("P-1", "one"));
        let out = session.set_query("authx");
        let seq = only_request(&out).seq;

        let out = respond(&mut session, seq, json!([]));
        assert!(out.changed);
        assert!(out.requests.is_empty());
        let sel = session.selection();
        assert!(sel.results().is_empty());
        assert_eq!(sel.active_index(), None);
        assert!(sel.issue().is_none());
        sel.validate().unwrap();
    }

    #[test]
    fn clearing_query_returns_to_idle() {
        let mut session = searched("auth", json!([full("P-1", "one")]), full("P-1", "one"));
        let out = session.set_query("");

        assert!(out.changed);
        assert!(out.requests.is_empty());
        let sel = session.selection();
        assert_eq!(sel.phase(), Phase::Idle);
        assert!(sel.results().is_empty());
        assert!(sel.issue().is_none());
        assert_eq!(sel.wanted_key(), None);
    }

    #[test]
    fn stale_query_response_is_discarded() {
        let mut session = Session::new();
        let old = only_request(&session.set_query("au")).seq;
        let new = only_request(&session.set_query("auth")).seq;

        let out = respond(&mut session, new, json!([full("P-2", "two")]));
        assert!(out.changed);
        let before = session.selection().results().to_vec();

        let out = respond(&mut session, old, json!([full("P-9", "nine")]));
        assert_eq!(out, Outcome::default());
        assert_eq!(session.selection().results(), before.as_slice());
        assert_eq!(session.selection().wanted_key(), Some("P-2"));
    }

    #[test]
    fn duplicate_response_resolves_once() {
        let mut session = Session::new();
        session.set_query("auth");
        let first = respond(&mut session, 0, json!([full("P-1", "one")]));
        assert_eq!(first.requests.len(), 1);

        let second = respond(&mut session, 0, json!([full("P-1", "one")]));
        assert_eq!(second, Outcome::default());
    }

    #[test]
    fn fetch_of_displayed_issue_sends_nothing() {
        let mut session = searched("auth", json!([full("P-1", "one")]), full("P-1", "one"));
        let pending = session.correlator().pending_len();

        let out = session.fetch_and_display_issue(Some("P-1"));
        assert_eq!(out, Outcome::default());
        assert_eq!(session.correlator().pending_len(), pending);
    }

    #[test]
    fn slower_first_fetch_does_not_override_second() {
        let mut session = Session::new();
        let a = only_request(&session.fetch_and_display_issue(Some("A"))).seq;
        let b = only_request(&session.fetch_and_display_issue(Some("B"))).seq;

        let out = respond(&mut session, a, full("A", "a"));
        assert!(!out.changed);
        assert!(session.selection().issue().is_none());
        assert_eq!(session.selection().wanted_key(), Some("B"));

        let out = respond(&mut session, b, full("B", "b"));
        assert!(out.changed);
        assert_eq!(session.selection().issue().unwrap().key(), "B");
    }

    #[test]
    fn null_issue_response_is_ignored() {
        let mut session = Session::new();
        let seq = only_request(&session.fetch_and_display_issue(Some("NOPE-1"))).seq;
        let out = respond(&mut session, seq, Value::Null);
        assert!(!out.changed);
        assert_eq!(session.selection().wanted_key(), Some("NOPE-1"));
    }

    #[test]
    fn references_expand_from_cache_and_misses_stay_unresolved() {
        let mut session = Session::new();
        push(&mut session, json!({"c": "update", "i": full("P-1", "cached")}));

        session.set_query("auth");
        let out = respond(&mut session, 0, json!(["P-1", "P-2"]));
        assert_eq!(only_request(&out).key.as_deref(), Some("P-1"));

        let results = session.selection().results();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].issue().unwrap().summary(), Some("cached"));
        assert_eq!(results[1], ResolvedEntry::Unresolved("P-2".to_owned()));
    }

    #[test]
    fn object_form_references_expand_from_cache() {
        let mut session = Session::new();
        push(&mut session, json!({"c": "update", "i": full("P-1", "cached")}));

        session.set_query("auth");
        respond(&mut session, 0, json!([{"key": "P-1"}, {"key": "P-2"}]));

        let results = session.selection().results();
        assert_eq!(results[0].issue().unwrap().summary(), Some("cached"));
        assert_eq!(results[1], ResolvedEntry::Unresolved("P-2".to_owned()));
    }

    #[test]
    fn search_update_with_object_references_expands_from_cache() {
        let mut session = searched("auth", json!([full("P-1", "one")]), full("P-1", "one"));

        push(
            &mut session,
            json!({"c": "updatesearch", "q": "auth", "i": [{"key": "P-1"}, {"key": "P-9"}]}),
        );

        let results = session.selection().results();
        assert_eq!(results[0].issue().unwrap().summary(), Some("one"));
        assert_eq!(results[1], ResolvedEntry::Unresolved("P-9".to_owned()));
        assert_eq!(session.selection().issue().unwrap().key(), "P-1");
    }

    #[test]
    fn full_entries_in_results_populate_cache() {
        let session = searched("auth", json!([full("P-1", "one")]), full("P-1", "one"));
        assert_eq!(session.cache().get("P-1").unwrap().summary(), Some("one"));
    }

    #[test]
    fn move_active_fetches_new_entry_and_ignores_out_of_range() {
        let mut session = searched(
            "auth",
            json!([full("P-1", "one"), full("P-2", "two")]),
            full("P-1", "one"),
        );

        let out = session.move_active(1);
        assert_eq!(only_request(&out).key.as_deref(), Some("P-2"));
        assert_eq!(session.selection().active_index(), Some(1));
        respond(&mut session, only_request(&out).seq, full("P-2", "two"));

        let out = session.move_active(1);
        assert_eq!(out, Outcome::default());
        assert_eq!(session.selection().active_index(), Some(1));
        assert_eq!(session.selection().issue().unwrap().key(), "P-2");

        let out = session.move_active(-5);
        assert_eq!(out, Outcome::default());
        assert_eq!(session.selection().active_index(), Some(1));
    }

    #[test]
    fn move_active_with_no_results_is_noop() {
        let mut session = Session::new();
        assert_eq!(session.move_active(1), Outcome::default());
    }

    #[test]
    fn raw_update_replaces_displayed_issue() {
        let mut session = searched("auth", json!([full("P-1", "one")]), full("P-1", "one"));

        let out = push(&mut session, json!({"c": "updateraw", "i": full("P-1", "edited")}));
        assert!(out.changed);
        assert_eq!(
            session.selection().issue().unwrap().issue.summary(),
            Some("edited")
        );

        let out = push(&mut session, json!({"c": "updateraw", "i": full("P-7", "other")}));
        assert!(!out.changed);
        assert_eq!(session.selection().issue().unwrap().key(), "P-1");
    }

    #[test]
    fn raw_update_preempts_pending_fetch() {
        let mut session = Session::new();
        session.fetch_and_display_issue(Some("P-3"));

        let out = push(&mut session, json!({"c": "updateraw", "i": full("P-3", "live")}));
        assert!(out.changed);
        assert_eq!(session.selection().issue().unwrap().key(), "P-3");
    }

    #[test]
    fn update_push_merges_into_cache_and_refreshes_list() {
        let mut session = Session::new();
        session.set_query("auth");
        respond(&mut session, 0, json!(["P-1", full("P-2", "two")]));

        let out = push(
            &mut session,
            json!({"c": "update", "i": {"key": "P-2", "fields": {"summary": "renamed"}}}),
        );
        assert!(out.changed);

        let cached = session.cache().get("P-2").unwrap();
        assert_eq!(cached.summary(), Some("renamed"));
        assert!(cached.rendered_description().is_some());
        assert_eq!(
            session.selection().results()[1].issue().unwrap().summary(),
            Some("renamed")
        );
    }

    #[test]
    fn search_update_for_other_query_is_ignored() {
        let mut session = searched("billing", json!([full("B-1", "bill")]), full("B-1", "bill"));
        let before = session.selection().results().to_vec();

        let out = push(
            &mut session,
            json!({"c": "updatesearch", "q": "auth", "i": [full("P-1", "one")]}),
        );
        assert_eq!(out, Outcome::default());
        assert_eq!(session.selection().results(), before.as_slice());
    }

    #[test]
    fn search_update_keeps_focus_on_displayed_issue() {
        let mut session = searched(
            "auth",
            json!([full("P-1", "one"), full("P-2", "two")]),
            full("P-1", "one"),
        );

        let out = push(
            &mut session,
            json!({"c": "updatesearch", "q": "auth", "i": [full("P-0", "zero"), "P-1"]}),
        );
        assert!(out.changed);
        assert!(out.requests.is_empty());

        let sel = session.selection();
        assert_eq!(sel.active_index(), Some(1));
        assert_eq!(sel.issue().unwrap().key(), "P-1");
        assert_eq!(sel.results()[1].issue().unwrap().summary(), Some("one"));
        sel.validate().unwrap();
    }

    #[test]
    fn search_update_with_focus_in_place_keeps_selection() {
        let mut session = searched(
            "auth",
            json!([full("P-1", "one"), full("P-2", "two")]),
            full("P-1", "one"),
        );

        let out = push(
            &mut session,
            json!({"c": "updatesearch", "q": "auth", "i": ["P-1", "P-2", "P-3"]}),
        );
        assert!(out.changed);
        assert!(out.requests.is_empty());

        let sel = session.selection();
        assert_eq!(sel.active_index(), Some(0));
        assert_eq!(sel.issue().unwrap().key(), "P-1");
        assert_eq!(sel.results().len(), 3);
        sel.validate().unwrap();
    }

    #[test]
    fn search_update_without_focused_issue_falls_back_to_first() {
        let mut session = searched(
            "auth",
            json!([full("P-1", "one"), full("P-2", "two")]),
            full("P-1", "one"),
        );

        let out = push(
            &mut session,
            json!({"c": "updatesearch", "q": "auth", "i": [full("P-5", "five")]}),
        );
        assert!(out.changed);
        assert_eq!(only_request(&out).key.as_deref(), Some("P-5"));

        let sel = session.selection();
        assert_eq!(sel.active_index(), Some(0));
        assert!(sel.issue().is_none());
        assert_eq!(sel.wanted_key(), Some("P-5"));
    }

    #[test]
    fn search_update_to_empty_list_clears_selection() {
        let mut session = searched("auth", json!([full("P-1", "one")]), full("P-1", "one"));

        let out = push(&mut session, json!({"c": "updatesearch", "q": "auth", "i": []}));
        assert!(out.changed);
        let sel = session.selection();
        assert_eq!(sel.active_index(), None);
        assert!(sel.issue().is_none());
        sel.validate().unwrap();
    }

    #[test]
    fn unknown_and_malformed_frames_are_ignored() {
        let mut session = searched("auth", json!([full("P-1", "one")]), full("P-1", "one"));

        assert_eq!(push(&mut session, json!({"c": "reindex"})), Outcome::default());
        assert_eq!(session.on_frame("not json"), Outcome::default());
        assert_eq!(session.on_frame(r#"{"s": 42, "r": []}"#), Outcome::default());
        assert_eq!(session.selection().issue().unwrap().key(), "P-1");
    }

    #[test]
    fn close_abandons_pending_requests() {
        let mut session = Session::new();
        session.set_query("auth");
        session.fetch_and_display_issue(Some("P-1"));

        assert_eq!(session.close(), 2);
        assert_eq!(respond(&mut session, 0, json!([])), Outcome::default());
        assert_eq!(session.selection().query(), "auth");
    }

    #[test]
    fn sequence_numbers_never_repeat_across_mixed_requests() {
        let mut session = Session::new();
        let mut seen = Vec::new();
        for query in ["a", "au", "aut", ""] {
            seen.extend(session.set_query(query).requests.iter().map(|r| r.seq));
        }
        for key in ["P-1", "P-2", "P-1"] {
            seen.extend(
                session
                    .fetch_and_display_issue(Some(key))
                    .requests
                    .iter()
                    .map(|r| r.seq),
            );
        }
        assert_eq!(seen, (0..seen.len() as u64).collect::<Vec<_>>());
    }

    #[test]
    fn displayed_issue_description_is_trusted_markup() {
        let mut sel = SelectionController::new();
        let issue: Issue = serde_json::from_value(full("P-1", "<b>x</b>")).unwrap();
        sel.set_issue(issue);
        assert_eq!(
            sel.issue().unwrap().description.as_ref().unwrap().as_str(),
            "<p><b>x</b></p>"
        );
    }
}
