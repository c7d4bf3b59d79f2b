//! In-memory token cache plus the single-flight refresh protocol.
//!
//! Many requests can hit `401` at nearly the same moment once an access token expires. The
//! coordinator makes sure exactly one of them reaches the refresh endpoint; every other caller
//! that arrives while that refresh is in flight waits on the same gate and receives its
//! outcome instead of starting a second refresh. The gate is an async mutex paired with a
//! generation counter: a waiter that finds the generation advanced once it gets the gate knows
//! a refresh completed while it was queued and reuses the recorded outcome.
//!
//! Cache writes and their storage writes run under one persistence lock, and every external
//! `set_tokens`/`clear_tokens` advances a session epoch. A refresh or lazy load that started
//! under an older epoch never writes its result back, so a logout is never undone.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{TokenPair, TokenRefresher, TokenSecret},
	obs::{self, CallKind, CallOutcome, CallSpan},
	store::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, TokenStore},
};

/// Result of a refresh attempt, shared by every caller that joined it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshOutcome {
	/// A new access token is cached and persisted.
	Refreshed,
	/// The server rejected the refresh token (or none was stored); tokens were cleared.
	Rejected,
	/// The refresh could not complete (network, 5xx, malformed body); tokens were kept.
	Unavailable,
}
impl RefreshOutcome {
	/// Whether the original request may be retried with the new access token.
	pub const fn is_refreshed(self) -> bool {
		matches!(self, Self::Refreshed)
	}
}

/// Observable state of the refresh slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshState {
	/// No refresh is running.
	Idle,
	/// A refresh is in flight; new callers will join it.
	Refreshing,
}

#[derive(Default)]
struct TokenCache {
	access: Option<TokenSecret>,
	refresh: Option<TokenSecret>,
	epoch: u64,
}

struct RefreshSlot {
	generation: u64,
	last: RefreshOutcome,
}

/// Owns the token cache and coordinates refreshes across concurrent callers.
///
/// The coordinator is the only component that mutates the cache or the refresh slot. Share it
/// behind an [`Arc`] between every client that talks to the same backend.
pub struct AuthCoordinator {
	store: TokenStore,
	refresher: Arc<dyn TokenRefresher>,
	cache: RwLock<TokenCache>,
	slot: Mutex<RefreshSlot>,
	gate: AsyncMutex<()>,
	persist: AsyncMutex<()>,
	metrics: Arc<RefreshMetrics>,
}
impl AuthCoordinator {
	/// Creates a coordinator over `store` that refreshes through `refresher`.
	pub fn new(store: TokenStore, refresher: Arc<dyn TokenRefresher>) -> Self {
		Self {
			store,
			refresher,
			cache: RwLock::new(TokenCache::default()),
			slot: Mutex::new(RefreshSlot { generation: 0, last: RefreshOutcome::Unavailable }),
			gate: AsyncMutex::new(()),
			persist: AsyncMutex::new(()),
			metrics: Default::default(),
		}
	}

	/// Shared refresh counters.
	pub fn metrics(&self) -> &Arc<RefreshMetrics> {
		&self.metrics
	}

	/// Reports whether a refresh is currently in flight.
	pub fn state(&self) -> RefreshState {
		match self.gate.try_lock() {
			Some(_) => RefreshState::Idle,
			None => RefreshState::Refreshing,
		}
	}

	/// Returns the access token, loading it from durable storage on first use.
	pub async fn access_token(&self) -> Option<TokenSecret> {
		self.cached_or_load(ACCESS_TOKEN_KEY, |cache| &mut cache.access).await
	}

	/// Returns the refresh token, loading it from durable storage on first use.
	pub async fn refresh_token(&self) -> Option<TokenSecret> {
		self.cached_or_load(REFRESH_TOKEN_KEY, |cache| &mut cache.refresh).await
	}

	/// Returns a snapshot of both tokens when an access token is available.
	pub async fn tokens(&self) -> Option<TokenPair> {
		let access_token = self.access_token().await?;
		let refresh_token = self.refresh_token().await;

		Some(TokenPair { access_token, refresh_token })
	}

	/// Replaces both tokens: the cache is updated immediately, then both are persisted.
	///
	/// A pair without a refresh token removes any previously stored refresh token. A refresh
	/// in flight when this is called discards its result.
	pub async fn set_tokens(&self, pair: TokenPair) {
		let _persist = self.persist.lock().await;

		self.install(pair).await;
	}

	/// Replaces only the access token, keeping the refresh token.
	pub async fn set_access_token(&self, access_token: TokenSecret) {
		let refresh_token = self.refresh_token().await;
		let _persist = self.persist.lock().await;

		{
			let mut cache = self.cache.write();

			cache.access = Some(access_token.clone());
			cache.refresh = cache.refresh.take().or(refresh_token);
			cache.epoch += 1;
		}

		self.store.set(ACCESS_TOKEN_KEY, access_token.expose()).await;
	}

	/// Clears the cache and both storage tiers.
	///
	/// A refresh or storage load in flight when this is called discards its result.
	pub async fn clear_tokens(&self) {
		let _persist = self.persist.lock().await;

		self.wipe().await;
	}

	/// Refreshes the access token, joining an in-flight refresh instead of starting another.
	pub async fn refresh_if_needed(&self) -> RefreshOutcome {
		let observed = self.slot.lock().generation;

		self.refresh_since(observed).await
	}

	/// Refresh entry point used after the server rejected `rejected` with a `401`.
	///
	/// When the cached access token already differs from the rejected one, another caller has
	/// refreshed in the meantime and the request can simply be retried.
	pub async fn refresh_after_rejection(&self, rejected: Option<&str>) -> RefreshOutcome {
		let observed = self.slot.lock().generation;

		if let Some(current) = self.access_token().await
			&& Some(current.expose()) != rejected
		{
			tracing::debug!("Access token changed since the rejected call; skipping refresh.");

			return RefreshOutcome::Refreshed;
		}

		self.refresh_since(observed).await
	}

	async fn refresh_since(&self, observed: u64) -> RefreshOutcome {
		let _singleflight = self.gate.lock().await;

		{
			let slot = self.slot.lock();

			if slot.generation != observed {
				tracing::debug!(outcome = ?slot.last, "Joined a refresh that completed meanwhile.");

				return slot.last;
			}
		}

		const KIND: CallKind = CallKind::Refresh;

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let outcome =
			CallSpan::new(KIND, "refresh_if_needed").instrument(self.perform_refresh()).await;

		obs::record_call_outcome(
			KIND,
			if outcome.is_refreshed() { CallOutcome::Success } else { CallOutcome::Failure },
		);

		let mut slot = self.slot.lock();

		slot.generation += 1;
		slot.last = outcome;

		outcome
	}

	async fn perform_refresh(&self) -> RefreshOutcome {
		let epoch = self.cache.read().epoch;
		let Some(current_refresh) = self.refresh_token().await else {
			tracing::debug!("No refresh token is stored; refresh cannot proceed.");

			return RefreshOutcome::Rejected;
		};

		self.metrics.record_attempt();

		match self.refresher.refresh(current_refresh.expose()).await {
			Ok(issued) => {
				let _persist = self.persist.lock().await;

				if let Some(outcome) = self.superseded(epoch) {
					self.metrics.record_failure();

					return outcome;
				}

				let pair = TokenPair {
					access_token: issued.access_token,
					refresh_token: issued.refresh_token.or(Some(current_refresh)),
				};

				self.install(pair).await;
				self.metrics.record_success();

				RefreshOutcome::Refreshed
			},
			Err(e) if e.is_auth_rejection() => {
				let _persist = self.persist.lock().await;

				self.metrics.record_failure();

				if let Some(outcome) = self.superseded(epoch) {
					return outcome;
				}

				tracing::warn!(error = %e, "Refresh token was rejected; clearing stored tokens.");
				self.wipe().await;

				RefreshOutcome::Rejected
			},
			Err(e) => {
				tracing::warn!(
					kind = %e.kind(),
					error = %e,
					"Refresh failed transiently; keeping stored tokens."
				);
				self.metrics.record_failure();

				RefreshOutcome::Unavailable
			},
		}
	}

	/// Outcome to report when the tokens were replaced or cleared since `epoch`.
	fn superseded(&self, epoch: u64) -> Option<RefreshOutcome> {
		let cache = self.cache.read();

		if cache.epoch == epoch {
			return None;
		}

		tracing::debug!("Tokens changed while the refresh was in flight; discarding its result.");

		Some(if cache.access.is_some() {
			RefreshOutcome::Refreshed
		} else {
			RefreshOutcome::Rejected
		})
	}

	async fn cached_or_load(
		&self,
		key: &'static str,
		field: fn(&mut TokenCache) -> &mut Option<TokenSecret>,
	) -> Option<TokenSecret> {
		let cached = field(&mut self.cache.write()).clone();

		if cached.is_some() {
			return cached;
		}

		let _persist = self.persist.lock().await;
		let epoch = {
			let mut cache = self.cache.write();

			if let Some(token) = field(&mut cache).clone() {
				return Some(token);
			}

			cache.epoch
		};
		let loaded = TokenSecret::new(self.store.get(key).await?);
		let mut cache = self.cache.write();

		if cache.epoch != epoch {
			return field(&mut cache).clone();
		}

		Some(field(&mut cache).get_or_insert(loaded).clone())
	}

	/// Caller holds the persistence lock.
	async fn install(&self, pair: TokenPair) {
		{
			let mut cache = self.cache.write();

			cache.access = Some(pair.access_token.clone());
			cache.refresh = pair.refresh_token.clone();
			cache.epoch += 1;
		}

		self.store.set(ACCESS_TOKEN_KEY, pair.access_token.expose()).await;

		match &pair.refresh_token {
			Some(refresh) => self.store.set(REFRESH_TOKEN_KEY, refresh.expose()).await,
			None => self.store.clear(REFRESH_TOKEN_KEY).await,
		}
	}

	/// Caller holds the persistence lock.
	async fn wipe(&self) {
		{
			let mut cache = self.cache.write();
			let epoch = cache.epoch + 1;

			*cache = TokenCache { epoch, ..Default::default() };
		}

		self.store.clear(ACCESS_TOKEN_KEY).await;
		self.store.clear(REFRESH_TOKEN_KEY).await;
	}
}
impl Debug for AuthCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let cache = self.cache.read();

		f.debug_struct("AuthCoordinator")
			.field("access_cached", &cache.access.is_some())
			.field("refresh_cached", &cache.refresh.is_some())
			.field("state", &self.state())
			.finish()
	}
}
