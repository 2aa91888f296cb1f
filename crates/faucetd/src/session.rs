//! Server-held sessions.
//!
//! The cookie carries only an opaque random id; the identity it maps to
//! stays in process memory and is lost on restart.

use axum::http::{HeaderMap, header};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use faucet_common::Identity;
use faucet_common::constants::SESSION_COOKIE_NAME;
use rand::Rng;
use std::collections::HashMap;
use std::sync::RwLock;

struct SessionEntry {
    identity: Identity,
    expires_at: i64,
}

/// Session registry
pub struct SessionStore {
    ttl_secs: u64,
    secure_cookie: bool,
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionStore {
    pub fn new(ttl_secs: u64, secure_cookie: bool) -> Self {
        Self {
            ttl_secs,
            secure_cookie,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve the identity behind the request's session cookie
    pub fn current_identity(&self, headers: &HeaderMap) -> Option<Identity> {
        let session_id = session_id_from_headers(headers)?;
        let now = chrono::Utc::now().timestamp();

        let sessions = self.sessions.read().unwrap_or_else(|p| p.into_inner());
        sessions
            .get(&session_id)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.identity.clone())
    }

    /// Start a session for `identity`, returning the new session id
    pub fn establish(&self, identity: Identity) -> String {
        let session_id = generate_session_id();
        let now = chrono::Utc::now().timestamp();

        let mut sessions = self.sessions.write().unwrap_or_else(|p| p.into_inner());
        sessions.retain(|_, entry| entry.expires_at > now);
        sessions.insert(
            session_id.clone(),
            SessionEntry {
                identity,
                expires_at: now + self.ttl_secs as i64,
            },
        );

        session_id
    }

    /// Destroy the request's session, if any
    pub fn terminate(&self, headers: &HeaderMap) -> Option<Identity> {
        let session_id = session_id_from_headers(headers)?;
        let mut sessions = self.sessions.write().unwrap_or_else(|p| p.into_inner());
        sessions.remove(&session_id).map(|entry| entry.identity)
    }

    pub fn active_count(&self) -> usize {
        let now = chrono::Utc::now().timestamp();
        let sessions = self.sessions.read().unwrap_or_else(|p| p.into_inner());
        sessions.values().filter(|e| e.expires_at > now).count()
    }

    /// `Set-Cookie` value carrying `session_id`
    pub fn set_cookie(&self, session_id: &str) -> String {
        format_cookie(session_id, self.ttl_secs, self.secure_cookie)
    }

    /// `Set-Cookie` value that removes the session cookie
    pub fn clear_cookie(&self) -> String {
        format_cookie("", 0, self.secure_cookie)
    }
}

fn format_cookie(value: &str, max_age: u64, secure: bool) -> String {
    let secure_flag = if secure { "; Secure" } else { "" };
    format!(
        "{SESSION_COOKIE_NAME}={value}; HttpOnly{secure_flag}; SameSite=Lax; Path=/; Max-Age={max_age}"
    )
}

fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE_NAME && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

fn generate_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
