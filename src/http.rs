//! Transport primitives for API calls.
//!
//! The module exposes [`HttpTransport`], the client's only dependency on an HTTP stack, along
//! with the plain request/response values that cross it. Keeping the seam this narrow lets
//! tests swap in fake transports that inject timeouts or connection failures, and lets
//! downstream crates bring their own HTTP client without losing the retry and refresh
//! protocol layered above it.

// crates.io
use futures_util::Stream;
#[cfg(feature = "reqwest")] use futures_util::StreamExt;
#[cfg(feature = "reqwest")]
use reqwest::header::{CONTENT_TYPE, HeaderMap, RETRY_AFTER};
use time::{OffsetDateTime, format_description::well_known::Rfc2822};
// self
use crate::{_prelude::*, error::TransportError};

/// Boxed future returned by [`HttpTransport`] methods.
pub type TransportFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, TransportError>> + 'a + Send>>;

/// Raw body chunks of a streamed response, in arrival order.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, TransportError>> + Send>>;

/// HTTP verbs issued through the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
	/// `GET`.
	Get,
	/// `POST`.
	Post,
	/// `PUT`.
	Put,
	/// `PATCH`.
	Patch,
	/// `DELETE`.
	Delete,
}
impl Method {
	/// Returns the canonical verb string.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Get => "GET",
			Self::Post => "POST",
			Self::Put => "PUT",
			Self::Patch => "PATCH",
			Self::Delete => "DELETE",
		}
	}

	/// Whether repeating the call cannot duplicate side effects.
	///
	/// Only `GET` qualifies; the automatic retry policy never repeats other verbs.
	pub const fn is_idempotent(self) -> bool {
		matches!(self, Self::Get)
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Fully resolved request handed to a transport.
#[derive(Clone, Debug)]
pub struct HttpRequest {
	/// Verb.
	pub method: Method,
	/// Absolute URL.
	pub url: Url,
	/// Extra headers, including `Authorization` when a token is attached.
	pub headers: Vec<(String, String)>,
	/// Serialized JSON body.
	pub body: Option<Vec<u8>>,
	/// Per-call deadline; `None` leaves the call unbounded (streams).
	pub timeout: Option<Duration>,
}
impl HttpRequest {
	/// Creates a bodiless request.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: Vec::new(), body: None, timeout: None }
	}

	/// Appends a header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}

	/// Sets the JSON body.
	pub fn with_body(mut self, body: Vec<u8>) -> Self {
		self.body = Some(body);

		self
	}

	/// Sets the per-call deadline.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	/// Returns the first header value matching `name` (case-insensitive).
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers
			.iter()
			.find(|(key, _)| key.eq_ignore_ascii_case(name))
			.map(|(_, value)| value.as_str())
	}
}

/// Buffered response of an ordinary call.
#[derive(Clone, Debug)]
pub struct HttpResponse {
	/// HTTP status code.
	pub status: u16,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
	/// Raw body bytes.
	pub body: Vec<u8>,
}
impl HttpResponse {
	/// Creates a response without a retry hint.
	pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
		Self { status, retry_after: None, body: body.into() }
	}

	/// Whether the status is in the 2xx range.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

/// Response whose body is consumed incrementally.
pub struct StreamingResponse {
	/// HTTP status code.
	pub status: u16,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
	/// Body chunks.
	pub body: ChunkStream,
}
impl StreamingResponse {
	/// Whether the status is in the 2xx range.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Drains the body into a buffered response, used to classify non-2xx stream openings.
	pub async fn buffer(self) -> Result<HttpResponse, TransportError> {
		use futures_util::TryStreamExt;

		let body = self
			.body
			.try_fold(Vec::new(), |mut acc, chunk| async move {
				acc.extend_from_slice(&chunk);

				Ok(acc)
			})
			.await?;

		Ok(HttpResponse { status: self.status, retry_after: self.retry_after, body })
	}
}
impl Debug for StreamingResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("StreamingResponse")
			.field("status", &self.status)
			.field("retry_after", &self.retry_after)
			.finish_non_exhaustive()
	}
}

/// Abstraction over HTTP stacks capable of executing API calls.
///
/// Implementations must be `Send + Sync + 'static` so a single transport can be shared by the
/// client and its refresher, and the futures they return must be `Send` so callers can move
/// in-flight requests across executor threads. Implementations classify failures into
/// [`TransportError::Timeout`] and [`TransportError::Connect`] where they can, since only those
/// two variants are retried.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and buffers the whole response body.
	fn send(&self, request: HttpRequest) -> TransportFuture<'_, HttpResponse>;

	/// Sends `request` and returns as soon as the response head arrives.
	fn open_stream(&self, request: HttpRequest) -> TransportFuture<'_, StreamingResponse>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a reqwest client honoring the connect timeout and user agent from `config`.
	///
	/// Per-call deadlines are applied on each request instead of the client, since streams
	/// must outlive the ordinary request timeout.
	pub fn from_config(
		config: &crate::config::ClientConfig,
	) -> Result<Self, crate::error::ConfigError> {
		let client = ReqwestClient::builder()
			.connect_timeout(config.connect_timeout)
			.user_agent(config.user_agent.as_str())
			.build()?;

		Ok(Self(client))
	}

	fn prepare(&self, request: HttpRequest) -> reqwest::RequestBuilder {
		let method = match request.method {
			Method::Get => reqwest::Method::GET,
			Method::Post => reqwest::Method::POST,
			Method::Put => reqwest::Method::PUT,
			Method::Patch => reqwest::Method::PATCH,
			Method::Delete => reqwest::Method::DELETE,
		};
		let mut builder = self.0.request(method, request.url);

		for (name, value) in request.headers {
			builder = builder.header(name, value);
		}

		if let Some(body) = request.body {
			builder = builder.header(CONTENT_TYPE, "application/json").body(body);
		}
		if let Some(timeout) = request.timeout {
			builder = builder.timeout(timeout);
		}

		builder
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn send(&self, request: HttpRequest) -> TransportFuture<'_, HttpResponse> {
		let builder = self.prepare(request);

		Box::pin(async move {
			let response = builder.send().await?;
			let status = response.status().as_u16();
			let retry_after = parse_retry_after(response.headers());
			let body = response.bytes().await?.to_vec();

			Ok(HttpResponse { status, retry_after, body })
		})
	}

	fn open_stream(&self, request: HttpRequest) -> TransportFuture<'_, StreamingResponse> {
		let builder = self.prepare(request);

		Box::pin(async move {
			let response = builder.send().await?;
			let status = response.status().as_u16();
			let retry_after = parse_retry_after(response.headers());
			let body = response
				.bytes_stream()
				.map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(TransportError::from));

			Ok(StreamingResponse { status, retry_after, body: Box::pin(body) })
		})
	}
}

#[cfg(feature = "reqwest")]
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;

	parse_retry_after_value(value.to_str().ok()?)
}

/// Parses a `Retry-After` header value given either as delta-seconds or as an HTTP date.
///
/// Dates in the past yield `None`.
pub fn parse_retry_after_value(raw: &str) -> Option<Duration> {
	let raw = raw.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::from_secs(secs));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Duration::try_from(delta).ok();
		}
	}

	None
}
