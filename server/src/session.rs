//! Global login bookkeeping: which users currently hold an active session,
//! regardless of which connection they arrived on. One active session per
//! user is enforced here.

use std::collections::HashSet;
use tokio::sync::RwLock;

pub struct SessionRegistry {
    logged_in: RwLock<HashSet<String>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            logged_in: RwLock::new(HashSet::new()),
        }
    }

    /// Claims a session for `username`. Returns false when a session for
    /// the user already exists; the check and the claim happen under one
    /// write lock so two connections cannot both succeed.
    pub async fn try_mark_logged_in(&self, username: &str) -> bool {
        self.logged_in
            .write()
            .await
            .insert(username.to_ascii_lowercase())
    }

    pub async fn mark_logged_out(&self, username: &str) {
        self.logged_in
            .write()
            .await
            .remove(&username.to_ascii_lowercase());
    }

    pub async fn is_logged_in(&self, username: &str) -> bool {
        self.logged_in
            .read()
            .await
            .contains(&username.to_ascii_lowercase())
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn single_session_per_user() {
        let sessions = SessionRegistry::new();

        assert!(sessions.try_mark_logged_in("Anna").await);
        assert!(sessions.is_logged_in("anna").await);

        // Second claim fails, whatever the casing.
        assert!(!sessions.try_mark_logged_in("anna").await);
        assert!(!sessions.try_mark_logged_in("ANNA").await);

        sessions.mark_logged_out("aNNa").await;
        assert!(!sessions.is_logged_in("anna").await);
        assert!(sessions.try_mark_logged_in("anna").await);
    }
}
