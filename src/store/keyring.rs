//! OS keyring-backed [`KeyValueStore`], the secure primary tier.
//!
//! Each key becomes one credential entry under the configured service name:
//! - macOS: Keychain
//! - Linux: Secret Service API (via libsecret)
//! - Windows: Credential Manager

// crates.io
use keyring::Entry;
// self
use crate::store::{KeyValueStore, StoreError, StoreFuture};

/// OS keyring storage tier.
#[derive(Clone, Debug)]
pub struct KeyringStore {
	service: String,
}
impl KeyringStore {
	/// Creates a tier that stores entries under `service`.
	pub fn new(service: impl Into<String>) -> Self {
		Self { service: service.into() }
	}

	fn entry(&self, key: &str) -> Result<Entry, StoreError> {
		Entry::new(&self.service, key).map_err(|e| StoreError::Backend {
			message: format!("Failed to open keyring entry {key}: {e}"),
		})
	}
}
impl KeyValueStore for KeyringStore {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		Box::pin(async move {
			match self.entry(key)?.get_password() {
				Ok(value) => Ok(Some(value)),
				Err(keyring::Error::NoEntry) => Ok(None),
				Err(e) => Err(StoreError::Backend {
					message: format!("Failed to read keyring entry {key}: {e}"),
				}),
			}
		})
	}

	fn set<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.entry(key)?.set_password(value).map_err(|e| StoreError::Backend {
				message: format!("Failed to write keyring entry {key}: {e}"),
			})
		})
	}

	fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			match self.entry(key)?.delete_credential() {
				Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
				Err(e) => Err(StoreError::Backend {
					message: format!("Failed to delete keyring entry {key}: {e}"),
				}),
			}
		})
	}
}
