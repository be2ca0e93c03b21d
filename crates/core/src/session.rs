//! Authenticated session as observed by the sync core.
//!
//! The session is owned by an auth collaborator. The core only watches for its
//! presence, its user id and (for data access) its access token.

use std::fmt;

use tokio::sync::watch;

#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub access_token: String,
}

impl Session {
    pub fn new(user_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_token: access_token.into(),
        }
    }

    /// Whether both sessions belong to the same identity.
    pub fn same_identity(&self, other: &Session) -> bool {
        self.user_id == other.user_id
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Owning side of the session stream.
///
/// Constructed once by the host; the coordinator receives a subscription.
#[derive(Debug)]
pub struct SessionHandle {
    sender: watch::Sender<Option<Session>>,
}

impl SessionHandle {
    pub fn new(initial: Option<Session>) -> Self {
        let (sender, _receiver) = watch::channel(initial);
        Self { sender }
    }

    pub fn current(&self) -> Option<Session> {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.sender.subscribe()
    }

    pub fn sign_in(&self, session: Session) {
        self.sender.send_replace(Some(session));
    }

    pub fn sign_out(&self) {
        self.sender.send_replace(None);
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new(None)
    }
}
