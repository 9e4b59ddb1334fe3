//! Side-channel endpoint addressing.
//!
//! Sockets live at `{ws_base}/ws/{user|agent}/{conversation_id}?token=...`.

use url::Url;

use crate::errors::{ClientError, Result};

/// Which side of the conversation a socket speaks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// End-user client; token is the user id.
    User,
    /// Human operator console; token is the agent id.
    Agent,
}

impl Role {
    /// Path segment.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
        }
    }
}

/// A side-channel endpoint for one conversation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    /// Speaking side.
    pub role: Role,
    /// Conversation the socket joins.
    pub conversation_id: String,
    /// Credential sent as the `token` query parameter.
    pub token: String,
}

impl Endpoint {
    /// Endpoint for an end user.
    pub fn user(conversation_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            conversation_id: conversation_id.into(),
            token: user_id.into(),
        }
    }

    /// Endpoint for an operator.
    pub fn agent(conversation_id: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            role: Role::Agent,
            conversation_id: conversation_id.into(),
            token: agent_id.into(),
        }
    }

    /// `/ws/{role}/{conversation_id}`.
    pub fn path(&self) -> String {
        format!("/ws/{}/{}", self.role.as_str(), self.conversation_id)
    }

    /// Full socket URL under `base`, with the token percent-encoded.
    pub fn url(&self, base: &str) -> Result<Url> {
        let raw = format!("{}{}", base.trim_end_matches('/'), self.path());
        let mut url = Url::parse(&raw)
            .map_err(|e| ClientError::WebSocket(format!("invalid endpoint {raw}: {e}")))?;
        let _ = url.query_pairs_mut().append_pair("token", &self.token);
        Ok(url)
    }
}

/// Conversation id from an endpoint path or URL, e.g. `/ws/user/c1?token=x`
/// yields `c1`.
pub fn conversation_id_from_path(endpoint: &str) -> Option<&str> {
    let start = [Role::User, Role::Agent]
        .into_iter()
        .filter_map(|role| {
            let marker = format!("/{}/", role.as_str());
            endpoint.find(&marker).map(|at| (at, at + marker.len()))
        })
        .min_by_key(|(at, _)| *at)
        .map(|(_, start)| start)?;
    let rest = &endpoint[start..];
    let id = rest.split('?').next().unwrap_or(rest);
    (!id.is_empty()).then_some(id)
}
