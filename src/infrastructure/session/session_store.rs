use crate::application::ports::AuthContext;
use crate::domain::value_objects::{AuthToken, UserId};
use std::sync::RwLock;

#[derive(Debug, Clone)]
struct Session {
    user_id: UserId,
    token: AuthToken,
}

/// In-memory holder of the signed-in user and their API token.
#[derive(Debug, Default)]
pub struct SessionStore {
    current: RwLock<Option<Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, user_id: UserId, token: AuthToken) {
        if let Ok(mut guard) = self.current.write() {
            tracing::info!(target: "agrisync::session", user_id = %user_id, "signed in");
            *guard = Some(Session { user_id, token });
        }
    }

    pub fn sign_out(&self) {
        if let Ok(mut guard) = self.current.write() {
            if let Some(session) = guard.take() {
                tracing::info!(
                    target: "agrisync::session",
                    user_id = %session.user_id,
                    "signed out"
                );
            }
        }
    }

    fn read(&self) -> Option<Session> {
        self.current.read().ok().and_then(|guard| guard.clone())
    }
}

impl AuthContext for SessionStore {
    fn current_user_id(&self) -> Option<UserId> {
        self.read().map(|session| session.user_id)
    }

    fn auth_token(&self) -> Option<AuthToken> {
        self.read().map(|session| session.token)
    }
}
