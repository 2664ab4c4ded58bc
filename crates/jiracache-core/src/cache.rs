use std::collections::hash_map::Entry;
use std::collections::HashMap;

use jiracache_protocol::{Issue, ResultEntry};

/// Most complete representation of every issue seen on this connection.
///
/// Entries are never evicted; the cache lives exactly as long as the
/// session that owns it.
#[derive(Debug, Clone, Default)]
pub struct ObjectCache {
    entries: HashMap<String, Issue>,
}

impl ObjectCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shallow, right-biased merge: top-level fields in `issue` overwrite
    /// the stored ones, everything else is kept.
    pub fn merge(&mut self, issue: Issue) -> &Issue {
        match self.entries.entry(issue.key.clone()) {
            Entry::Occupied(slot) => {
                let stored = slot.into_mut();
                for (name, value) in issue.fields {
                    stored.fields.insert(name, value);
                }
                stored
            }
            Entry::Vacant(slot) => slot.insert(issue),
        }
    }

    /// Entries carrying data are merged and returned as given. Bare keys and
    /// key-only objects are looked up; a miss is `None`.
    pub fn resolve(&mut self, entry: ResultEntry) -> Option<Issue> {
        match entry {
            ResultEntry::Full(issue) if issue.is_partial() => {
                self.entries.get(&issue.key).cloned()
            }
            ResultEntry::Full(issue) => {
                self.merge(issue.clone());
                Some(issue)
            }
            ResultEntry::Ref(key) => self.entries.get(&key).cloned(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Issue> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
