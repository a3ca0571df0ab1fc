use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::models::UserProfile;

/// Client-side view of the authentication state.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Set iff a login, registration or restoration succeeded and no logout
    /// or terminal refresh failure happened since.
    pub user: Option<UserProfile>,
    /// True only while the initial restoration is running.
    pub loading: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Restoring,
    Anonymous,
    Authenticated,
}

impl Session {
    pub fn state(&self) -> SessionState {
        match (&self.user, self.loading) {
            (Some(_), _) => SessionState::Authenticated,
            (None, true) => SessionState::Restoring,
            (None, false) => SessionState::Anonymous,
        }
    }
}

/// Shared, observable session handle.
///
/// Clones share one value. Readers call [`SessionContext::current`] or
/// [`SessionContext::subscribe`] to be notified of every change; only the
/// session controller and the refresh coordinator update it.
#[derive(Clone)]
pub struct SessionContext {
    tx: Arc<watch::Sender<Session>>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    /// A fresh context in the `Restoring` state.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Session {
            user: None,
            loading: true,
        });
        SessionContext { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> Session {
        self.tx.borrow().clone()
    }

    pub fn state(&self) -> SessionState {
        self.tx.borrow().state()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.tx.borrow().user.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }

    /// Ends restoration with whatever profile was found. A user who signed
    /// in while restoration was running is kept.
    pub(crate) fn finish_restore(&self, user: Option<UserProfile>) {
        self.tx.send_modify(|session| {
            if session.user.is_none() {
                session.user = user;
            }
            session.loading = false;
        });
    }

    pub(crate) fn sign_in(&self, user: UserProfile) {
        info!("Session authenticated as '{}'", user.username);
        self.tx.send_modify(|session| session.user = Some(user));
    }

    /// Drops the user. No notification is sent when already anonymous.
    pub(crate) fn sign_out(&self) {
        self.tx.send_if_modified(|session| {
            if session.user.is_none() {
                return false;
            }
            session.user = None;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_restoring() {
        let ctx = SessionContext::new();
        assert_eq!(ctx.state(), SessionState::Restoring);
        assert!(ctx.current().loading);
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let ctx = SessionContext::new();
        let mut rx = ctx.subscribe();

        ctx.finish_restore(None);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().state(), SessionState::Anonymous);

        ctx.sign_in(UserProfile::new(1, "a"));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().state(), SessionState::Authenticated);

        ctx.sign_out();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().state(), SessionState::Anonymous);
    }

    #[test]
    fn sign_out_when_anonymous_is_silent() {
        let ctx = SessionContext::new();
        ctx.finish_restore(None);
        let rx = ctx.subscribe();
        ctx.sign_out();
        assert!(!rx.has_changed().unwrap());
    }
}
