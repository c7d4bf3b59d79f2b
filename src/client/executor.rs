//! Builds transport requests from descriptors and applies the connection-level retry policy.
//!
//! The executor knows nothing about token refresh: it attaches whatever token it is handed and
//! returns the raw response for the caller to classify. That keeps the refresh call itself
//! (which goes through an executor too) free of any recursion into the refresh protocol.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	client::RequestDescriptor,
	config::ClientConfig,
	error::{ConfigError, TransportError},
	http::{HttpRequest, HttpResponse, HttpTransport, Method, StreamingResponse},
};

const JSON: &str = "application/json";
const EVENT_STREAM: &str = "text/event-stream";

/// Dispatches requests through a transport under the client's policy constants.
pub struct Executor<T>
where
	T: ?Sized + HttpTransport,
{
	transport: Arc<T>,
	config: Arc<ClientConfig>,
}
impl<T> Executor<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates an executor over `transport`.
	pub fn new(transport: impl Into<Arc<T>>, config: Arc<ClientConfig>) -> Self {
		Self { transport: transport.into(), config }
	}

	/// Policy constants in effect.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Sends a buffered call, retrying idempotent verbs after connection-level failures.
	pub async fn execute(
		&self,
		descriptor: &RequestDescriptor,
		token: Option<TokenSecret>,
	) -> Result<HttpResponse> {
		let request = self
			.build_request(descriptor, token.as_ref(), JSON)?
			.with_timeout(self.config.request_timeout);

		self.with_retry(descriptor.method, || self.transport.send(request.clone())).await
	}

	/// Opens a streamed call under the same retry policy; the body is left unread.
	pub async fn open_stream(
		&self,
		descriptor: &RequestDescriptor,
		token: Option<TokenSecret>,
	) -> Result<StreamingResponse> {
		let request = self.build_request(descriptor, token.as_ref(), EVENT_STREAM)?;

		self.with_retry(descriptor.method, || self.transport.open_stream(request.clone())).await
	}

	/// Resolves the descriptor into a transport request.
	pub fn build_request(
		&self,
		descriptor: &RequestDescriptor,
		token: Option<&TokenSecret>,
		accept: &str,
	) -> Result<HttpRequest> {
		let url = self.config.endpoint(&descriptor.path)?;
		let mut request = HttpRequest::new(descriptor.method, url).with_header("Accept", accept);

		if let Some(token) = token.filter(|_| descriptor.options.attach_token) {
			request = request.with_header("Authorization", token.bearer());
		}

		for (name, value) in &descriptor.options.headers {
			request = request.with_header(name.as_str(), value.as_str());
		}

		if let Some(body) = &descriptor.body {
			request = request.with_body(serde_json::to_vec(body).map_err(ConfigError::from)?);
		}

		Ok(request)
	}

	async fn with_retry<R, F, Fut>(&self, method: Method, mut attempt: F) -> Result<R>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<R, TransportError>>,
	{
		let max_attempts =
			if method.is_idempotent() { self.config.get_retries.saturating_add(1) } else { 1 };
		let mut attempts = 0;

		loop {
			attempts += 1;

			match attempt().await {
				Ok(response) => return Ok(response),
				Err(e) if e.is_retryable() && attempts < max_attempts => {
					tracing::debug!(
						%method,
						attempts,
						max_attempts,
						error = %e,
						"Connection-level failure; retrying idempotent call."
					);
					tokio::time::sleep(self.config.retry_delay).await;
				},
				Err(e) => return Err(e.into()),
			}
		}
	}
}
impl<T> Clone for Executor<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self { transport: self.transport.clone(), config: self.config.clone() }
	}
}
impl<T> Debug for Executor<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Executor").field("base_url", &self.config.base_url.as_str()).finish()
	}
}
