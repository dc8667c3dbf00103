use crate::domain::value_objects::{AuthToken, UserId};

/// Who is signed in right now. Read at call time, never cached by callers.
pub trait AuthContext: Send + Sync {
    fn current_user_id(&self) -> Option<UserId>;
    fn auth_token(&self) -> Option<AuthToken>;
}
