//! The authenticated API client facade.
//!
//! [`ApiClient`] layers the `401` protocol on top of an [`Executor`]: it attaches the cached
//! access token, and when the server rejects it, asks the shared [`AuthCoordinator`] for a
//! refresh and re-issues the call exactly once. Everything else (status classification, body
//! decoding, stream framing) is delegated to [`response`] and [`stream`](crate::stream).

pub mod executor;
pub mod request;

pub use executor::Executor;
pub use request::{RequestDescriptor, RequestOptions};

// self
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;
use crate::{
	_prelude::*,
	auth::{AuthCoordinator, HttpRefresher, RefreshOutcome, TokenPair, TokenSecret},
	config::ClientConfig,
	http::{HttpResponse, HttpTransport, StreamingResponse},
	obs::{self, CallKind, CallOutcome, CallSpan},
	response,
	store::TokenStore,
	stream::{self, EventStream, StreamLimits},
};

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestApiClient = ApiClient<ReqwestTransport>;

/// Resilient API client: bearer auth, single-flight refresh on `401`, bounded GET retries, and
/// event-stream decoding.
///
/// Clones share the transport, the configuration, and the [`AuthCoordinator`], so concurrent
/// calls issued through any clone join the same refresh.
pub struct ApiClient<T>
where
	T: ?Sized + HttpTransport,
{
	executor: Executor<T>,
	auth: Arc<AuthCoordinator>,
}
impl<T> ApiClient<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a client over `transport` whose refreshes go through the same transport.
	pub fn with_transport(
		config: ClientConfig,
		store: TokenStore,
		transport: impl Into<Arc<T>>,
	) -> Self {
		let executor = Executor::new(transport, Arc::new(config));
		let refresher = Arc::new(HttpRefresher::new(executor.clone()));
		let auth = Arc::new(AuthCoordinator::new(store, refresher));

		Self { executor, auth }
	}

	/// Creates a client that shares an existing coordinator, e.g. across several backends that
	/// accept the same credentials.
	pub fn with_coordinator(
		config: ClientConfig,
		transport: impl Into<Arc<T>>,
		auth: Arc<AuthCoordinator>,
	) -> Self {
		Self { executor: Executor::new(transport, Arc::new(config)), auth }
	}

	/// Token cache and refresh coordinator.
	pub fn auth(&self) -> &Arc<AuthCoordinator> {
		&self.auth
	}

	/// Policy constants in effect.
	pub fn config(&self) -> &ClientConfig {
		self.executor.config()
	}

	/// `GET path`.
	pub async fn get(&self, path: &str) -> Result<Value> {
		self.send(&RequestDescriptor::get(path)).await
	}

	/// `POST path` with a JSON body.
	pub async fn post<B>(&self, path: &str, body: &B) -> Result<Value>
	where
		B: ?Sized + Serialize,
	{
		self.send(&RequestDescriptor::post(path).with_json(body)?).await
	}

	/// `PUT path` with a JSON body.
	pub async fn put<B>(&self, path: &str, body: &B) -> Result<Value>
	where
		B: ?Sized + Serialize,
	{
		self.send(&RequestDescriptor::put(path).with_json(body)?).await
	}

	/// `PATCH path` with a JSON body.
	pub async fn patch<B>(&self, path: &str, body: &B) -> Result<Value>
	where
		B: ?Sized + Serialize,
	{
		self.send(&RequestDescriptor::patch(path).with_json(body)?).await
	}

	/// `DELETE path`.
	pub async fn delete(&self, path: &str) -> Result<Value> {
		self.send(&RequestDescriptor::delete(path)).await
	}

	/// Issues `descriptor` and returns the decoded JSON body.
	pub async fn send(&self, descriptor: &RequestDescriptor) -> Result<Value> {
		self.send_as(descriptor).await
	}

	/// Issues `descriptor` and decodes the body into `R`, reporting the failing JSON path on
	/// mismatch.
	pub async fn send_as<R>(&self, descriptor: &RequestDescriptor) -> Result<R>
	where
		R: DeserializeOwned,
	{
		const KIND: CallKind = CallKind::Request;

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let span = CallSpan::new(KIND, "send");
		let result = span
			.instrument(async {
				tracing::debug!(
					method = %descriptor.method,
					path = %descriptor.path,
					"Issuing call."
				);

				let answer = self
					.authorized(descriptor, |token| self.executor.execute(descriptor, token))
					.await?;

				response::map_response(answer)
			})
			.await;

		obs::record_call_outcome(
			KIND,
			if result.is_ok() { CallOutcome::Success } else { CallOutcome::Failure },
		);

		result
	}

	/// Opens a streamed call and returns its decoded events.
	///
	/// Opening follows the same bearer and `401` protocol as [`send`](Self::send); a non-2xx
	/// answer is buffered and classified instead of decoded.
	pub async fn stream(&self, descriptor: &RequestDescriptor) -> Result<EventStream> {
		const KIND: CallKind = CallKind::Stream;

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let span = CallSpan::new(KIND, "stream");
		let result = span
			.instrument(async {
				let opened = self
					.authorized(descriptor, |token| self.executor.open_stream(descriptor, token))
					.await?;

				if !opened.is_success() {
					let buffered = opened.buffer().await?;

					return Err(response::classify_failure(&buffered));
				}

				Ok(stream::decode_events(opened.body, StreamLimits::from(self.config())))
			})
			.await;

		obs::record_call_outcome(
			KIND,
			if result.is_ok() { CallOutcome::Success } else { CallOutcome::Failure },
		);

		result
	}

	/// Posts `credentials` to the login endpoint and stores the issued tokens.
	pub async fn login<B>(&self, credentials: &B) -> Result<Value>
	where
		B: ?Sized + Serialize,
	{
		self.authenticate(&self.config().login_path, credentials).await
	}

	/// Posts `payload` to the signup endpoint and stores the issued tokens.
	pub async fn signup<B>(&self, payload: &B) -> Result<Value>
	where
		B: ?Sized + Serialize,
	{
		self.authenticate(&self.config().signup_path, payload).await
	}

	/// Posts `payload` anonymously to `path` and stores the tokens found in the response.
	///
	/// Returns the whole response body so callers can read profile fields next to the tokens.
	pub async fn authenticate<B>(&self, path: &str, payload: &B) -> Result<Value>
	where
		B: ?Sized + Serialize,
	{
		let descriptor = RequestDescriptor::post(path)
			.with_json(payload)?
			.with_options(RequestOptions::anonymous());
		let body = self.send(&descriptor).await?;
		let pair = TokenPair::from_body(&body).ok_or(Error::MissingAccessToken)?;

		self.auth.set_tokens(pair).await;

		Ok(body)
	}

	/// Forgets both tokens.
	pub async fn logout(&self) {
		self.auth.clear_tokens().await;
	}

	/// Whether an access token is available locally.
	///
	/// The token is not validated against the server.
	pub async fn is_authenticated(&self) -> bool {
		self.auth.access_token().await.is_some()
	}

	async fn authorized<R, F, Fut>(&self, descriptor: &RequestDescriptor, issue: F) -> Result<R>
	where
		R: Answer,
		F: Fn(Option<TokenSecret>) -> Fut,
		Fut: Future<Output = Result<R>>,
	{
		let options = &descriptor.options;
		let token = if options.attach_token { self.auth.access_token().await } else { None };
		let answer = issue(token.clone()).await?;

		if answer.status() != 401 {
			return Ok(answer);
		}

		if options.refresh_on_401 {
			let rejected = token.as_ref().map(TokenSecret::expose);

			match self.auth.refresh_after_rejection(rejected).await {
				RefreshOutcome::Refreshed => {
					tracing::debug!(path = %descriptor.path, "Re-issuing call with the new token.");

					// The second answer is final, even if it is another `401`.
					return issue(self.auth.access_token().await).await;
				},
				RefreshOutcome::Unavailable => {
					tracing::debug!(path = %descriptor.path, "Refresh unavailable; tokens kept.");

					return Err(Error::RefreshUnavailable);
				},
				RefreshOutcome::Rejected => {
					tracing::debug!(path = %descriptor.path, "Refresh rejected; call unrecoverable.");
				},
			}
		}
		if options.clear_tokens_on_401 {
			self.auth.clear_tokens().await;
		}

		Ok(answer)
	}
}
#[cfg(feature = "reqwest")]
impl ApiClient<ReqwestTransport> {
	/// Creates a client backed by a reqwest transport built from `config`.
	pub fn new(config: ClientConfig, store: TokenStore) -> Result<Self> {
		let transport = ReqwestTransport::from_config(&config)?;

		Ok(Self::with_transport(config, store, transport))
	}
}
impl<T> Clone for ApiClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self { executor: self.executor.clone(), auth: self.auth.clone() }
	}
}
impl<T> Debug for ApiClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient")
			.field("executor", &self.executor)
			.field("auth", &self.auth)
			.finish()
	}
}

/// Anything carrying an HTTP status, buffered or streamed.
trait Answer {
	fn status(&self) -> u16;
}
impl Answer for HttpResponse {
	fn status(&self) -> u16 {
		self.status
	}
}
impl Answer for StreamingResponse {
	fn status(&self) -> u16 {
		self.status
	}
}
