/*
 * Responsibility
 * - Session record (key -> typed value) as stored in the session backend
 * - Tagged accessors (get_bool / get_uint) that report absent-or-mismatch as None
 * - The two checks the auth guards rely on (is_authenticated / session_owner_matches)
 */
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const AUTHENTICATED_KEY: &str = "authenticated";
pub const USER_ID_KEY: &str = "user_id";

/// A single session value.
///
/// Stored externally tagged (`{"uint": 42}`) so the value type survives a
/// round trip through the backend. `Int(42)` and `Uint(42)` are different values.
///
/// Anything else lands in `Other` so one odd entry does not poison the record;
/// the typed accessors never match it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionValue {
    Bool(bool),
    Uint(u64),
    Int(i64),
    Str(String),
    #[serde(untagged)]
    Other(serde_json::Value),
}

/// Values bound to one cookie-identified client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Session {
    values: HashMap<String, SessionValue>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: SessionValue) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&SessionValue> {
        self.values.get(key)
    }

    /// `Some` only when `key` holds a `Bool`.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            SessionValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// `Some` only when `key` holds a `Uint`. A signed value is a mismatch.
    pub fn get_uint(&self, key: &str) -> Option<u64> {
        match self.get(key)? {
            SessionValue::Uint(n) => Some(*n),
            _ => None,
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// True iff `authenticated` is present and exactly `true`.
pub fn is_authenticated(session: &Session) -> bool {
    session.get_bool(AUTHENTICATED_KEY) == Some(true)
}

/// True iff `user_id` is present, unsigned, and equal to `candidate`.
pub fn session_owner_matches(session: &Session, candidate: u64) -> bool {
    session.get_uint(USER_ID_KEY) == Some(candidate)
}
