//! Client-level error types shared across the transport, auth, and streaming layers.
//!
//! Every failure is classified once, at the point where the HTTP status or transport error is
//! first observed, and the classification travels with the error as an [`ErrorKind`].

// self
use crate::{_prelude::*, stream::StreamError};

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (timeout, DNS, TCP, TLS).
	#[error("Network error: {0}")]
	Transport(#[from] TransportError),
	/// Failure raised while consuming a streamed response.
	#[error(transparent)]
	Stream(#[from] StreamError),

	/// The server rejected the access token and the refresh endpoint could not be reached.
	#[error("Network error: the session could not be refreshed.")]
	RefreshUnavailable,
	/// The server rejected the credentials and no refresh could recover the call.
	#[error("Unauthorized, please log in again.")]
	Unauthorized {
		/// Server-supplied message, when the body carried one.
		message: Option<String>,
	},
	/// The token was accepted structurally but the session is no longer allowed.
	#[error("Session expired.")]
	Forbidden {
		/// Server-supplied message, when the body carried one.
		message: Option<String>,
	},
	/// The server throttled the call.
	#[error("Rate limited: {message}")]
	RateLimited {
		/// Server-supplied message, or a generic fallback.
		message: String,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Any other non-2xx response (validation and domain errors).
	#[error("{message}")]
	Api {
		/// HTTP status code.
		status: u16,
		/// Best available message extracted from the body.
		message: String,
	},
	/// A 2xx body could not be decoded into the requested shape.
	#[error("Response body could not be decoded.")]
	Decode {
		/// Structured parsing failure including the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// An authentication response did not carry an access token.
	#[error("Authentication response is missing an access token.")]
	MissingAccessToken,
}
impl Error {
	/// Returns the classification assigned when the error was created.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::Config(_) => ErrorKind::Config,
			Self::Transport(_) | Self::RefreshUnavailable => ErrorKind::Network,
			Self::Stream(_) => ErrorKind::Stream,
			Self::Unauthorized { .. } => ErrorKind::Unauthorized,
			Self::Forbidden { .. } => ErrorKind::Forbidden,
			Self::RateLimited { .. } => ErrorKind::RateLimited,
			Self::Api { .. } => ErrorKind::Api,
			Self::Decode { .. } | Self::MissingAccessToken => ErrorKind::Decode,
		}
	}

	/// Returns the HTTP status that produced this error, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Unauthorized { .. } => Some(401),
			Self::Forbidden { .. } => Some(403),
			Self::RateLimited { .. } => Some(429),
			Self::Api { status, .. } => Some(*status),
			Self::Decode { status, .. } => *status,
			_ => None,
		}
	}

	/// Returns the server-supplied message when one was extracted from the body.
	pub fn server_message(&self) -> Option<&str> {
		match self {
			Self::Unauthorized { message } | Self::Forbidden { message } => message.as_deref(),
			Self::RateLimited { message, .. } | Self::Api { message, .. } => Some(message),
			Self::Stream(StreamError::Upstream { message }) => Some(message),
			_ => None,
		}
	}

	/// Whether the server authoritatively rejected the presented credential.
	///
	/// Used to decide if a failed refresh must clear stored tokens.
	pub fn is_auth_rejection(&self) -> bool {
		matches!(
			self,
			Self::Unauthorized { .. } | Self::Forbidden { .. } | Self::Api { status: 400, .. }
		)
	}
}

/// Stable classification carried by every [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	/// Timeouts and connection failures.
	Network,
	/// HTTP 401 that could not be recovered by a refresh.
	Unauthorized,
	/// HTTP 403.
	Forbidden,
	/// HTTP 429.
	RateLimited,
	/// Validation or domain errors (other 4xx/5xx).
	Api,
	/// Terminal failure inside a streamed response.
	Stream,
	/// Undecodable success payloads.
	Decode,
	/// Local configuration problems.
	Config,
}
impl ErrorKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Network => "network",
			Self::Unauthorized => "unauthorized",
			Self::Forbidden => "forbidden",
			Self::RateLimited => "rate_limited",
			Self::Api => "api",
			Self::Stream => "stream",
			Self::Decode => "decode",
			Self::Config => "config",
		}
	}
}
impl Display for ErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Configuration and validation failures raised by the client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Base URL uses a scheme other than http or https.
	#[error("Base URL must use http or https: {url}.")]
	UnsupportedScheme {
		/// Offending URL.
		url: String,
	},
	/// Base URL cannot have paths joined onto it.
	#[error("Base URL cannot be used as a base: {url}.")]
	CannotBeABase {
		/// Offending URL.
		url: String,
	},
	/// Endpoint paths must be absolute.
	#[error("The {name} path must start with '/': {path}.")]
	InvalidPath {
		/// Which path failed validation.
		name: &'static str,
		/// Supplied path.
		path: String,
	},
	/// Timeouts must be positive.
	#[error("The {name} duration must be greater than zero.")]
	ZeroDuration {
		/// Which duration failed validation.
		name: &'static str,
	},
	/// Request path could not be joined onto the base URL.
	#[error("Request path is not a valid URL.")]
	InvalidRequestUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	RequestBody(#[from] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// The call did not complete before its deadline.
	#[error("connection timed out")]
	Timeout {
		/// Transport-specific timeout error.
		#[source]
		source: BoxError,
	},
	/// The connection could not be established (DNS, refused, TLS handshake).
	#[error("connection failed")]
	Connect {
		/// Transport-specific connection error.
		#[source]
		source: BoxError,
	},
	/// Any other failure reported by the underlying HTTP client.
	#[error("request could not be completed")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O failure")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific timeout.
	pub fn timeout(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Timeout { source: Box::new(src) }
	}

	/// Wraps a transport-specific connection failure.
	pub fn connect(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Connect { source: Box::new(src) }
	}

	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Whether the failure happened at the connection level and is safe to retry for
	/// idempotent calls.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Timeout { .. } | Self::Connect { .. })
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() {
			Self::timeout(e)
		} else if e.is_connect() {
			Self::connect(e)
		} else {
			Self::network(e)
		}
	}
}
