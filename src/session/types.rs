//! Session types for Agentry
//!
//! A session is the conversational context one `(app, user, session)` triple
//! refers to. The runtime only tracks its identity and activity; message
//! history belongs to the execution engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of a session.
///
/// `app_name` is the name of the agent that owns the session, so two agents
/// never share a session record even for the same user and session ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
}

impl SessionKey {
    pub fn new(
        app_name: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }

    /// Filesystem-safe, reversible name for this key.
    ///
    /// Each component is percent-encoded (including `.`) and the components
    /// are joined with `.`, so distinct keys never collide.
    ///
    /// ```
    /// use agentry::session::SessionKey;
    ///
    /// let key = SessionKey::new("Echo", "u/1", "s.1");
    /// assert_eq!(key.storage_name(), "Echo.u%2F1.s%2E1");
    /// assert_eq!(SessionKey::from_storage_name(&key.storage_name()), Some(key));
    /// ```
    pub fn storage_name(&self) -> String {
        [&self.app_name, &self.user_id, &self.session_id]
            .iter()
            .map(|part| encode_component(part))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Inverse of [`storage_name`](Self::storage_name).
    pub fn from_storage_name(name: &str) -> Option<Self> {
        let mut parts = name.split('.');
        let app_name = decode_component(parts.next()?)?;
        let user_id = decode_component(parts.next()?)?;
        let session_id = decode_component(parts.next()?)?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            app_name,
            user_id,
            session_id,
        })
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.app_name, self.user_id, self.session_id)
    }
}

fn encode_component(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    for byte in part.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' => out.push(byte as char),
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}

fn decode_component(part: &str) -> Option<String> {
    let bytes = part.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = part.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

/// A stored session record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(flatten)]
    pub key: SessionKey,
    /// When this session was created
    pub created_at: DateTime<Utc>,
    /// When this session was last used by a run
    pub updated_at: DateTime<Utc>,
    /// Completed runs against this session
    pub turn_count: u64,
}

impl Session {
    /// Create a fresh session record for `key`.
    pub fn new(key: SessionKey) -> Self {
        let now = Utc::now();
        Self {
            key,
            created_at: now,
            updated_at: now,
            turn_count: 0,
        }
    }

    /// Record one run against this session.
    pub fn touch(&mut self) {
        self.turn_count += 1;
        self.updated_at = Utc::now();
    }
}
