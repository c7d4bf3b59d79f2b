//! Durable token storage: key/value backends and the two-tier [`TokenStore`].
//!
//! Every token is written to a primary tier (ideally a secure store such as the OS keyring) and
//! a secondary plain tier. Reads prefer the primary tier, fall back to the secondary tier, and
//! copy a fallback hit back into the primary tier. Backend failures never reach callers: losing
//! one tier must not block authentication, so failures are logged and absorbed here.

#[cfg(feature = "keyring")] pub mod keyring;
pub mod file;
pub mod memory;

#[cfg(feature = "keyring")] pub use self::keyring::KeyringStore;
pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::_prelude::*;

/// Boxed future returned by [`KeyValueStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Primary-tier key holding the access token.
pub const ACCESS_TOKEN_KEY: &str = "auth_token";
/// Primary-tier key holding the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
/// Suffix appended to keys in the secondary tier.
pub const BACKUP_SUFFIX: &str = "_backup";

/// Storage backend contract implemented by each tier.
pub trait KeyValueStore
where
	Self: Send + Sync,
{
	/// Reads the value stored under `key`, if any.
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

	/// Stores or replaces the value under `key`.
	fn set<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()>;

	/// Deletes `key`; deleting a missing key succeeds.
	fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;
}

/// Error type produced by [`KeyValueStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Which tier an operation touched; used for log fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Tier {
	Primary,
	Secondary,
}
impl Tier {
	const fn as_str(self) -> &'static str {
		match self {
			Self::Primary => "primary",
			Self::Secondary => "secondary",
		}
	}
}

/// Two-tier durable token storage with self-healing reads.
#[derive(Clone)]
pub struct TokenStore {
	primary: Arc<dyn KeyValueStore>,
	secondary: Arc<dyn KeyValueStore>,
}
impl TokenStore {
	/// Creates a store over the provided tiers.
	pub fn new(primary: Arc<dyn KeyValueStore>, secondary: Arc<dyn KeyValueStore>) -> Self {
		Self { primary, secondary }
	}

	/// Creates a store whose tiers both live in memory.
	pub fn in_memory() -> Self {
		Self::new(Arc::new(MemoryStore::default()), Arc::new(MemoryStore::default()))
	}

	/// Returns the secondary-tier key for `key`.
	pub fn backup_key(key: &str) -> String {
		format!("{key}{BACKUP_SUFFIX}")
	}

	/// Reads `key`, preferring the primary tier and healing it from the secondary tier.
	pub async fn get(&self, key: &str) -> Option<String> {
		match self.primary.get(key).await {
			Ok(Some(value)) if !value.is_empty() => return Some(value),
			Ok(_) => {},
			Err(e) => log_failure(Tier::Primary, "get", key, &e),
		}

		let backup_key = Self::backup_key(key);
		let value = match self.secondary.get(&backup_key).await {
			Ok(Some(value)) if !value.is_empty() => value,
			Ok(_) => return None,
			Err(e) => {
				log_failure(Tier::Secondary, "get", &backup_key, &e);

				return None;
			},
		};

		tracing::debug!(key, "Token served from the secondary tier; healing the primary tier.");

		if let Err(e) = self.primary.set(key, &value).await {
			log_failure(Tier::Primary, "heal", key, &e);
		}

		Some(value)
	}

	/// Writes `value` to both tiers; a failure in one tier never skips the other.
	pub async fn set(&self, key: &str, value: &str) {
		if let Err(e) = self.primary.set(key, value).await {
			log_failure(Tier::Primary, "set", key, &e);
		}

		let backup_key = Self::backup_key(key);

		if let Err(e) = self.secondary.set(&backup_key, value).await {
			log_failure(Tier::Secondary, "set", &backup_key, &e);
		}
	}

	/// Deletes `key` from both tiers.
	pub async fn clear(&self, key: &str) {
		if let Err(e) = self.primary.remove(key).await {
			log_failure(Tier::Primary, "clear", key, &e);
		}

		let backup_key = Self::backup_key(key);

		if let Err(e) = self.secondary.remove(&backup_key).await {
			log_failure(Tier::Secondary, "clear", &backup_key, &e);
		}
	}
}
impl Debug for TokenStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("TokenStore(..)")
	}
}

fn log_failure(tier: Tier, op: &'static str, key: &str, error: &StoreError) {
	tracing::warn!(tier = tier.as_str(), op, key, %error, "Token storage operation failed.");
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as _;
	// self
	use super::*;

	struct BrokenStore;
	impl KeyValueStore for BrokenStore {
		fn get<'a>(&'a self, _: &'a str) -> StoreFuture<'a, Option<String>> {
			Box::pin(async { Err(StoreError::Backend { message: "keychain locked".into() }) })
		}

		fn set<'a>(&'a self, _: &'a str, _: &'a str) -> StoreFuture<'a, ()> {
			Box::pin(async { Err(StoreError::Backend { message: "keychain locked".into() }) })
		}

		fn remove<'a>(&'a self, _: &'a str) -> StoreFuture<'a, ()> {
			Box::pin(async { Err(StoreError::Backend { message: "keychain locked".into() }) })
		}
	}

	#[tokio::test]
	async fn writes_land_in_both_tiers_with_backup_suffix() {
		let primary = Arc::new(MemoryStore::default());
		let secondary = Arc::new(MemoryStore::default());
		let store = TokenStore::new(primary.clone(), secondary.clone());

		store.set(ACCESS_TOKEN_KEY, "A1").await;

		assert_eq!(primary.value("auth_token").as_deref(), Some("A1"));
		assert_eq!(secondary.value("auth_token_backup").as_deref(), Some("A1"));

		store.clear(ACCESS_TOKEN_KEY).await;

		assert!(primary.value("auth_token").is_none());
		assert!(secondary.value("auth_token_backup").is_none());
		assert!(store.get(ACCESS_TOKEN_KEY).await.is_none());
	}

	#[tokio::test]
	async fn empty_primary_value_falls_back_and_heals() {
		let primary = Arc::new(MemoryStore::default());
		let secondary = Arc::new(MemoryStore::default());
		let store = TokenStore::new(primary.clone(), secondary.clone());

		primary.insert(REFRESH_TOKEN_KEY, "");
		secondary.insert("refresh_token_backup", "R1");

		assert_eq!(store.get(REFRESH_TOKEN_KEY).await.as_deref(), Some("R1"));
		assert_eq!(primary.value(REFRESH_TOKEN_KEY).as_deref(), Some("R1"));
	}

	#[tokio::test]
	async fn broken_tiers_are_absorbed() {
		let secondary = Arc::new(MemoryStore::default());
		let store = TokenStore::new(Arc::new(BrokenStore), secondary.clone());

		store.set(ACCESS_TOKEN_KEY, "A1").await;

		assert_eq!(store.get(ACCESS_TOKEN_KEY).await.as_deref(), Some("A1"));

		store.clear(ACCESS_TOKEN_KEY).await;

		assert!(secondary.is_empty());

		let both_broken = TokenStore::new(Arc::new(BrokenStore), Arc::new(BrokenStore));

		both_broken.set(ACCESS_TOKEN_KEY, "A1").await;

		assert!(both_broken.get(ACCESS_TOKEN_KEY).await.is_none());
	}

	#[test]
	fn store_error_converts_message() {
		let err = StoreError::Backend { message: "database unreachable".into() };

		assert_eq!(err.to_string(), "Backend failure: database unreachable.");
		assert!(err.source().is_none());
	}
}
