//! Credential lookup and change notification.
//!
//! The API token lives in a host-provided [`SecretStore`]. A [`CredentialService`]
//! is created explicitly with [`CredentialService::init`], owns the cached token,
//! and is passed to whatever needs it; there is no process-wide state. Requests
//! take an immutable snapshot ([`CredentialService::api_key`]) when they start, so
//! a concurrent [`set_api_key`](CredentialService::set_api_key) never affects a
//! request already in flight.
//!
//! Dropping the service closes the change channel: subscribers see
//! [`watch::Receiver::changed`] return an error.

use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, watch};

/// Environment variable read by [`EnvSecretStore`].
pub const API_KEY_ENV: &str = "FLOWCHAT_API_KEY";

/// Key/value secret storage provided by the host.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Process-local store, handy for tests and short-lived tools.
#[derive(Debug, Default)]
pub struct InMemorySecretStore {
    values: RwLock<HashMap<String, String>>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with one secret.
    pub fn with_secret(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut values = HashMap::new();
        values.insert(key.into(), value.into());
        Self {
            values: RwLock::new(values),
        }
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Read-only store answering every key from `FLOWCHAT_API_KEY`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecretStore;

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Ok(std::env::var(API_KEY_ENV).ok().filter(|v| !v.is_empty()))
    }

    async fn set(&self, key: &str, _value: &str) -> Result<()> {
        Err(Error::secret(format!(
            "environment store is read-only, cannot set '{}'",
            key
        )))
    }
}

/// Owns the current API token and notifies subscribers when it changes.
pub struct CredentialService {
    store: Arc<dyn SecretStore>,
    key: String,
    current: watch::Sender<Option<Arc<str>>>,
}

impl std::fmt::Debug for CredentialService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialService")
            .field("key", &self.key)
            .field("api_key", &self.masked())
            .finish()
    }
}

impl CredentialService {
    /// Load the token stored under `key`.
    ///
    /// A failing store is logged and treated as "no credential"; the service is
    /// still usable and a later [`reload`](Self::reload) or
    /// [`set_api_key`](Self::set_api_key) can fill it in.
    pub async fn init(store: Arc<dyn SecretStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        let initial: Option<Arc<str>> = match store.get(&key).await {
            Ok(value) => value.filter(|v| !v.is_empty()).map(Arc::from),
            Err(e) => {
                log::error!("Failed to load API key '{}': {}", key, e);
                None
            }
        };
        let (current, _) = watch::channel(initial);
        Self {
            store,
            key,
            current,
        }
    }

    /// Snapshot of the current token.
    pub fn api_key(&self) -> Option<Arc<str>> {
        self.current.borrow().clone()
    }

    pub fn has_api_key(&self) -> bool {
        self.current.borrow().is_some()
    }

    /// Persist a new token and notify subscribers.
    pub async fn set_api_key(&self, api_key: impl Into<String>) -> Result<()> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::invalid_input("API key must not be empty"));
        }
        self.store.set(&self.key, &api_key).await?;
        self.current.send_replace(Some(Arc::from(api_key)));
        log::info!("API key updated");
        Ok(())
    }

    /// Re-read the token from the store, notifying subscribers if it changed.
    pub async fn reload(&self) -> Result<()> {
        let fresh: Option<Arc<str>> = self
            .store
            .get(&self.key)
            .await?
            .filter(|v| !v.is_empty())
            .map(Arc::from);
        self.current.send_if_modified(|current| {
            if *current == fresh {
                false
            } else {
                *current = fresh;
                true
            }
        });
        Ok(())
    }

    /// Receiver that is notified on every token change.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<str>>> {
        self.current.subscribe()
    }

    /// First ten characters followed by `...`, for logs.
    pub fn masked(&self) -> Option<String> {
        self.api_key().map(|key| mask(&key))
    }
}

pub(crate) fn mask(key: &str) -> String {
    let prefix: String = key.chars().take(10).collect();
    format!("{}...", prefix)
}
