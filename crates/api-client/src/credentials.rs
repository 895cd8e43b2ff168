use std::sync::{Mutex, MutexGuard};

use base64::{engine::general_purpose::STANDARD, Engine};

/// Process-wide HTTP Basic credential, shared by every request the client
/// makes.
///
/// The credential lives in one injectable store (an `Arc<CredentialStore>`
/// handed to [`crate::ApiClient::new`]) rather than a global: embedders own
/// exactly one per login scope and tests get isolation for free. The first
/// 401 clears the store so that every in-flight and future request fails
/// fast with `Unauthorized` until a new login is stored.
///
/// The header value is encoded once at `set` time; per-request access is a
/// short lock-and-clone, never held across an await.
#[derive(Debug, Default)]
pub struct CredentialStore {
    header: Mutex<Option<String>>,
}

impl CredentialStore {
    /// Empty store; requests go out unauthenticated until `set_basic`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with a credential already present.
    pub fn with_basic(user: &str, password: &str) -> Self {
        let store = Self::new();
        store.set_basic(user, password);
        store
    }

    fn slot(&self) -> MutexGuard<'_, Option<String>> {
        self.header.lock().expect("credential mutex poisoned")
    }

    /// Replace the stored credential.
    pub fn set_basic(&self, user: &str, password: &str) {
        let encoded = STANDARD.encode(format!("{user}:{password}"));
        *self.slot() = Some(format!("Basic {encoded}"));
    }

    /// Ready-to-send `Authorization` header value, if a credential is stored.
    pub fn header_value(&self) -> Option<String> {
        self.slot().clone()
    }

    /// Drop the stored credential. Called by the client on the first 401.
    pub fn clear(&self) {
        *self.slot() = None;
    }

    pub fn is_set(&self) -> bool {
        self.slot().is_some()
    }
}
