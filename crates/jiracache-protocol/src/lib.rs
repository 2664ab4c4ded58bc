use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const CMD_QUERY: &str = "query";
pub const CMD_GET: &str = "get";

pub const PUSH_UPDATE: &str = "update";
pub const PUSH_UPDATE_RAW: &str = "updateraw";
pub const PUSH_UPDATE_SEARCH: &str = "updatesearch";

/// Per-connection request sequence number.
pub type Seq = u64;

/// Client -> backend frame: `{c, s, q?, key?, full?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "c")]
    pub command: String,
    #[serde(rename = "s")]
    pub seq: Seq,
    #[serde(rename = "q", default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub full: bool,
}

impl Request {
    pub fn to_frame(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    Query { query: String },
    Get { key: String },
}

impl RequestKind {
    pub fn command(&self) -> &'static str {
        match self {
            RequestKind::Query { .. } => CMD_QUERY,
            RequestKind::Get { .. } => CMD_GET,
        }
    }

    pub fn into_request(self, seq: Seq) -> Request {
        let command = self.command().to_owned();
        match self {
            RequestKind::Query { query } => Request {
                command,
                seq,
                query: Some(query),
                key: None,
                full: false,
            },
            RequestKind::Get { key } => Request {
                command,
                seq,
                query: None,
                key: Some(key),
                full: true,
            },
        }
    }
}

/// An issue as the backend ships it. Everything except `key` stays
/// opaque JSON so partial and full representations share one type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub key: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Issue {
    pub fn reference(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            fields: Map::new(),
        }
    }

    pub fn is_partial(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn summary(&self) -> Option<&str> {
        self.nested(&["fields", "summary"])
    }

    pub fn status(&self) -> Option<&str> {
        self.nested(&["fields", "status", "name"])
    }

    pub fn assignee(&self) -> Option<&str> {
        self.nested(&["fields", "assignee", "displayName"])
    }

    /// Server-rendered HTML for the description, when the issue was
    /// fetched with rendered fields.
    pub fn rendered_description(&self) -> Option<&str> {
        self.nested(&["renderedFields", "description"])
    }

    fn nested(&self, path: &[&str]) -> Option<&str> {
        let (first, rest) = path.split_first()?;
        let mut cur = self.fields.get(*first)?;
        for segment in rest {
            cur = cur.get(*segment)?;
        }
        cur.as_str()
    }
}

/// One element of a search result: either a full issue object or a bare
/// key the client is expected to already hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultEntry {
    Full(Issue),
    Ref(String),
}

impl ResultEntry {
    pub fn key(&self) -> &str {
        match self {
            ResultEntry::Full(issue) => &issue.key,
            ResultEntry::Ref(key) => key,
        }
    }
}

/// Decodes a result list, skipping elements that are neither an issue
/// object nor a string. Returns `None` when `value` is not an array.
pub fn decode_entries(value: Value) -> Option<Vec<ResultEntry>> {
    let Value::Array(items) = value else {
        return None;
    };
    Some(
        items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
    )
}

#[derive(Debug, Clone, PartialEq)]
pub enum Push {
    Update(Issue),
    UpdateRaw(Issue),
    UpdateSearch {
        query: String,
        entries: Vec<ResultEntry>,
    },
    Unknown {
        tag: String,
    },
}

impl Push {
    pub fn tag(&self) -> &str {
        match self {
            Push::Update(_) => PUSH_UPDATE,
            Push::UpdateRaw(_) => PUSH_UPDATE_RAW,
            Push::UpdateSearch { .. } => PUSH_UPDATE_SEARCH,
            Push::Unknown { tag } => tag,
        }
    }
}

/// Backend -> client frame after classification.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Response { seq: Seq, payload: Value },
    Push(Push),
    Unrecognized,
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(default)]
    s: Option<Seq>,
    #[serde(default)]
    r: Option<Value>,
    #[serde(default)]
    c: Option<String>,
    #[serde(default)]
    i: Option<Value>,
    #[serde(default)]
    q: Option<String>,
}

pub fn parse_frame(text: &str) -> Inbound {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => Inbound::from_value(value),
        Err(_) => Inbound::Unrecognized,
    }
}

impl Inbound {
    pub fn from_value(value: Value) -> Self {
        let Ok(raw) = serde_json::from_value::<RawFrame>(value) else {
            return Inbound::Unrecognized;
        };

        match (raw.s, raw.c) {
            (Some(seq), None) => Inbound::Response {
                seq,
                payload: raw.r.unwrap_or(Value::Null),
            },
            (None, Some(tag)) => decode_push(tag, raw.i, raw.q)
                .map(Inbound::Push)
                .unwrap_or(Inbound::Unrecognized),
            _ => Inbound::Unrecognized,
        }
    }
}

fn decode_push(tag: String, payload: Option<Value>, query: Option<String>) -> Option<Push> {
    let push = match tag.as_str() {
        PUSH_UPDATE => Push::Update(serde_json::from_value(payload?).ok()?),
        PUSH_UPDATE_RAW => Push::UpdateRaw(serde_json::from_value(payload?).ok()?),
        PUSH_UPDATE_SEARCH => Push::UpdateSearch {
            query: query?,
            entries: decode_entries(payload?)?,
        },
        _ => Push::Unknown { tag },
    };
    Some(push)
}
