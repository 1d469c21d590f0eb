//! # Credential Gate
//!
//! Signup and login checks against the credential store. Both operations are
//! boolean-coded: collaborator failures are logged and reported as `false`.

use std::sync::Arc;
use std::time::Duration;

use domains::{Credential, CredentialStore};
use tracing::{info, warn};

use crate::timeouts::bounded;

pub struct CredentialGate {
    store: Arc<dyn CredentialStore>,
    timeout: Duration,
}

impl CredentialGate {
    pub fn new(store: Arc<dyn CredentialStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// True only when a stored credential matches both fields exactly.
    pub async fn authenticate(&self, username: &str, password: &str) -> bool {
        match bounded(self.timeout, self.store.find(username)).await {
            Ok(Some(stored)) => stored.username == username && stored.password == password,
            Ok(None) => false,
            Err(err) => {
                warn!(username, error = %err, "credential lookup failed");
                false
            }
        }
    }

    /// Registers a new credential.
    ///
    /// The existence check and the insert are two separate calls, so two
    /// concurrent signups for the same username can both pass the check. The
    /// insert is conditional (`insert_if_absent`), which closes the window for
    /// stores that implement it atomically; a store that does not inherits
    /// the race.
    pub async fn register(&self, username: &str, password: &str) -> bool {
        if username.is_empty() || password.is_empty() {
            return false;
        }

        match bounded(self.timeout, self.store.find(username)).await {
            Ok(Some(_)) => {
                info!(username, "username already taken");
                return false;
            }
            Ok(None) => {}
            Err(err) => {
                warn!(username, error = %err, "credential lookup failed");
                return false;
            }
        }

        let credential = Credential::new(username, password);
        match bounded(self.timeout, self.store.insert_if_absent(&credential)).await {
            Ok(true) => {
                info!(username, "user registered");
                true
            }
            Ok(false) => {
                info!(username, "username taken between check and insert");
                false
            }
            Err(err) => {
                warn!(username, error = %err, "credential insert failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::{MockCredentialStore, StoreError};

    fn gate(store: MockCredentialStore) -> CredentialGate {
        CredentialGate::new(Arc::new(store), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn authenticate_accepts_exact_match() {
        let mut store = MockCredentialStore::new();
        store
            .expect_find()
            .returning(|_| Ok(Some(Credential::new("alice", "pw"))));
        assert!(gate(store).authenticate("alice", "pw").await);
    }

    #[tokio::test]
    async fn authenticate_rejects_wrong_password() {
        let mut store = MockCredentialStore::new();
        store
            .expect_find()
            .returning(|_| Ok(Some(Credential::new("alice", "pw"))));
        assert!(!gate(store).authenticate("alice", "PW").await);
    }

    #[tokio::test]
    async fn authenticate_rejects_unknown_user() {
        let mut store = MockCredentialStore::new();
        store.expect_find().returning(|_| Ok(None));
        assert!(!gate(store).authenticate("mallory", "pw").await);
    }

    #[tokio::test]
    async fn authenticate_denies_when_store_is_down() {
        let mut store = MockCredentialStore::new();
        store
            .expect_find()
            .returning(|_| Err(StoreError::unavailable("connection refused")));
        assert!(!gate(store).authenticate("alice", "pw").await);
    }

    #[tokio::test]
    async fn register_rejects_empty_fields_without_touching_store() {
        let mut store = MockCredentialStore::new();
        store.expect_find().never();
        store.expect_insert_if_absent().never();
        let gate = gate(store);
        assert!(!gate.register("", "pw").await);
        assert!(!gate.register("alice", "").await);
    }

    #[tokio::test]
    async fn register_rejects_existing_username() {
        let mut store = MockCredentialStore::new();
        store
            .expect_find()
            .returning(|_| Ok(Some(Credential::new("alice", "old"))));
        store.expect_insert_if_absent().never();
        assert!(!gate(store).register("alice", "new").await);
    }

    #[tokio::test]
    async fn register_inserts_new_username() {
        let mut store = MockCredentialStore::new();
        store.expect_find().returning(|_| Ok(None));
        store
            .expect_insert_if_absent()
            .withf(|c| c.username == "alice" && c.password == "pw")
            .times(1)
            .returning(|_| Ok(true));
        assert!(gate(store).register("alice", "pw").await);
    }

    // Check-then-insert race: the lookup saw no entry but another signup won
    // the insert. The conditional insert reports it and registration fails.
    #[tokio::test]
    async fn register_loses_race_to_concurrent_signup() {
        let mut store = MockCredentialStore::new();
        store.expect_find().returning(|_| Ok(None));
        store.expect_insert_if_absent().returning(|_| Ok(false));
        assert!(!gate(store).register("alice", "pw").await);
    }

    #[tokio::test]
    async fn register_fails_when_insert_errors() {
        let mut store = MockCredentialStore::new();
        store.expect_find().returning(|_| Ok(None));
        store
            .expect_insert_if_absent()
            .returning(|_| Err(StoreError::unavailable("down")));
        assert!(!gate(store).register("alice", "pw").await);
    }
}
