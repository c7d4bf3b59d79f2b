// std
use std::{
	env, fs, process,
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
	time::{SystemTime, UNIX_EPOCH},
};
// self
use bearer_relay::{
	auth::{AuthCoordinator, RefreshFuture, TokenPair, TokenRefresher},
	error::Error,
	store::{
		ACCESS_TOKEN_KEY, FileStore, KeyValueStore, MemoryStore, REFRESH_TOKEN_KEY, StoreError,
		StoreFuture, TokenStore,
	},
};

/// Primary tier that can be switched offline, like a locked keychain.
#[derive(Default)]
struct FlakyStore {
	offline: AtomicBool,
	inner: MemoryStore,
}
impl FlakyStore {
	fn offline() -> Arc<Self> {
		let store = Self::default();

		store.offline.store(true, Ordering::SeqCst);

		Arc::new(store)
	}

	fn check(&self) -> Result<(), StoreError> {
		if self.offline.load(Ordering::SeqCst) {
			Err(StoreError::Backend { message: "keychain unavailable".into() })
		} else {
			Ok(())
		}
	}
}
impl KeyValueStore for FlakyStore {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		Box::pin(async move {
			self.check()?;

			self.inner.get(key).await
		})
	}

	fn set<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.check()?;

			self.inner.set(key, value).await
		})
	}

	fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.check()?;

			self.inner.remove(key).await
		})
	}
}

struct OfflineRefresher;
impl TokenRefresher for OfflineRefresher {
	fn refresh<'a>(&'a self, _: &'a str) -> RefreshFuture<'a> {
		Box::pin(async { Err(Error::MissingAccessToken) })
	}
}

fn temp_path(tag: &str) -> std::path::PathBuf {
	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System clock should be after the Unix epoch.")
		.as_nanos();

	env::temp_dir().join(format!("bearer_relay_{tag}_{}_{nanos}.json", process::id()))
}

#[tokio::test]
async fn tokens_survive_a_restart_when_the_primary_tier_fails() {
	let path = temp_path("tiers");
	let secondary =
		Arc::new(FileStore::open(&path).expect("File store should open in the temp directory."));
	let coordinator = AuthCoordinator::new(
		TokenStore::new(FlakyStore::offline(), secondary),
		Arc::new(OfflineRefresher),
	);

	coordinator.set_tokens(TokenPair::new("A1", Some("R1".into()))).await;

	// Fresh process: the keychain is back but empty; the plain tier still holds the tokens.
	let primary = Arc::new(FlakyStore::default());
	let reopened = Arc::new(FileStore::open(&path).expect("File store should reopen from disk."));
	let restarted = AuthCoordinator::new(
		TokenStore::new(primary.clone(), reopened),
		Arc::new(OfflineRefresher),
	);
	let tokens =
		restarted.tokens().await.expect("Tokens should be recovered from the backup tier.");

	assert_eq!(tokens, TokenPair::new("A1", Some("R1".into())));
	assert_eq!(primary.inner.value(ACCESS_TOKEN_KEY).as_deref(), Some("A1"));
	assert_eq!(primary.inner.value(REFRESH_TOKEN_KEY).as_deref(), Some("R1"));

	fs::remove_file(&path).expect("Temporary token file should be removable.");
}

#[tokio::test]
async fn clearing_reaches_every_reachable_tier() {
	let primary = Arc::new(FlakyStore::default());
	let secondary = Arc::new(MemoryStore::default());
	let coordinator = AuthCoordinator::new(
		TokenStore::new(primary.clone(), secondary.clone()),
		Arc::new(OfflineRefresher),
	);

	coordinator.set_tokens(TokenPair::new("A1", Some("R1".into()))).await;
	primary.offline.store(true, Ordering::SeqCst);
	coordinator.clear_tokens().await;

	assert!(secondary.is_empty());
	assert!(coordinator.tokens().await.is_none());
}
