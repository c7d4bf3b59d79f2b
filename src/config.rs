//! Client configuration and its validating builder.

// self
use crate::{_prelude::*, error::ConfigError};

/// Immutable policy shared by every call issued through one client.
#[derive(Clone, Debug)]
pub struct ClientConfig {
	/// Base URL every request path is joined onto.
	pub base_url: Url,
	/// Path of the token refresh endpoint.
	pub refresh_path: String,
	/// Path of the login endpoint.
	pub login_path: String,
	/// Path of the signup endpoint.
	pub signup_path: String,
	/// Deadline applied to ordinary (non-streaming) calls.
	pub request_timeout: Duration,
	/// Deadline for establishing a connection.
	pub connect_timeout: Duration,
	/// A stream that delivers no data for this long is closed with a timeout.
	pub stream_idle_timeout: Duration,
	/// Upper bound on the total lifetime of a stream.
	pub stream_max_duration: Duration,
	/// Extra attempts granted to idempotent calls after connection-level failures.
	pub get_retries: u32,
	/// Fixed delay between those attempts.
	pub retry_delay: Duration,
	/// User agent sent with every request.
	pub user_agent: String,
}
impl ClientConfig {
	/// Default refresh endpoint path.
	pub const DEFAULT_REFRESH_PATH: &'static str = "/auth/refresh";
	/// Default login endpoint path.
	pub const DEFAULT_LOGIN_PATH: &'static str = "/auth/login";
	/// Default signup endpoint path.
	pub const DEFAULT_SIGNUP_PATH: &'static str = "/auth/signup";
	/// Default deadline for ordinary calls.
	pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
	/// Default connect deadline.
	pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
	/// Default stream idle timeout.
	pub const DEFAULT_STREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
	/// Default stream lifetime cap.
	pub const DEFAULT_STREAM_MAX_DURATION: Duration = Duration::from_secs(600);
	/// Default retry count for idempotent calls.
	pub const DEFAULT_GET_RETRIES: u32 = 2;
	/// Default delay between retries.
	pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

	/// Starts a builder for the provided base URL.
	pub fn builder(base_url: Url) -> ClientConfigBuilder {
		ClientConfigBuilder::new(base_url)
	}

	/// Joins `path` onto the base URL, keeping any path prefix the base carries.
	pub fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
		let mut joined = self.base_url.as_str().trim_end_matches('/').to_owned();

		if !path.starts_with('/') {
			joined.push('/');
		}

		joined.push_str(path);

		Url::parse(&joined).map_err(|source| ConfigError::InvalidRequestUrl { source })
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	base_url: Url,
	refresh_path: String,
	login_path: String,
	signup_path: String,
	request_timeout: Duration,
	connect_timeout: Duration,
	stream_idle_timeout: Duration,
	stream_max_duration: Duration,
	get_retries: u32,
	retry_delay: Duration,
	user_agent: String,
}
impl ClientConfigBuilder {
	/// Creates a builder seeded with defaults.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			refresh_path: ClientConfig::DEFAULT_REFRESH_PATH.into(),
			login_path: ClientConfig::DEFAULT_LOGIN_PATH.into(),
			signup_path: ClientConfig::DEFAULT_SIGNUP_PATH.into(),
			request_timeout: ClientConfig::DEFAULT_REQUEST_TIMEOUT,
			connect_timeout: ClientConfig::DEFAULT_CONNECT_TIMEOUT,
			stream_idle_timeout: ClientConfig::DEFAULT_STREAM_IDLE_TIMEOUT,
			stream_max_duration: ClientConfig::DEFAULT_STREAM_MAX_DURATION,
			get_retries: ClientConfig::DEFAULT_GET_RETRIES,
			retry_delay: ClientConfig::DEFAULT_RETRY_DELAY,
			user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).into(),
		}
	}

	/// Overrides the refresh endpoint path.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.refresh_path = path.into();

		self
	}

	/// Overrides the login endpoint path.
	pub fn login_path(mut self, path: impl Into<String>) -> Self {
		self.login_path = path.into();

		self
	}

	/// Overrides the signup endpoint path.
	pub fn signup_path(mut self, path: impl Into<String>) -> Self {
		self.signup_path = path.into();

		self
	}

	/// Overrides the deadline for ordinary calls.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;

		self
	}

	/// Overrides the connect deadline.
	pub fn connect_timeout(mut self, timeout: Duration) -> Self {
		self.connect_timeout = timeout;

		self
	}

	/// Overrides the stream idle timeout.
	pub fn stream_idle_timeout(mut self, timeout: Duration) -> Self {
		self.stream_idle_timeout = timeout;

		self
	}

	/// Overrides the stream lifetime cap.
	pub fn stream_max_duration(mut self, limit: Duration) -> Self {
		self.stream_max_duration = limit;

		self
	}

	/// Overrides the number of extra attempts for idempotent calls.
	pub fn get_retries(mut self, retries: u32) -> Self {
		self.get_retries = retries;

		self
	}

	/// Overrides the delay between retries.
	pub fn retry_delay(mut self, delay: Duration) -> Self {
		self.retry_delay = delay;

		self
	}

	/// Overrides the user agent.
	pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.user_agent = user_agent.into();

		self
	}

	/// Validates the collected values and produces a [`ClientConfig`].
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		if !matches!(self.base_url.scheme(), "http" | "https") {
			return Err(ConfigError::UnsupportedScheme { url: self.base_url.to_string() });
		}
		if self.base_url.cannot_be_a_base() {
			return Err(ConfigError::CannotBeABase { url: self.base_url.to_string() });
		}

		for (name, path) in [
			("refresh", &self.refresh_path),
			("login", &self.login_path),
			("signup", &self.signup_path),
		] {
			if !path.starts_with('/') {
				return Err(ConfigError::InvalidPath { name, path: path.clone() });
			}
		}
		for (name, duration) in [
			("request_timeout", self.request_timeout),
			("connect_timeout", self.connect_timeout),
			("stream_idle_timeout", self.stream_idle_timeout),
			("stream_max_duration", self.stream_max_duration),
		] {
			if duration.is_zero() {
				return Err(ConfigError::ZeroDuration { name });
			}
		}

		Ok(ClientConfig {
			base_url: self.base_url,
			refresh_path: self.refresh_path,
			login_path: self.login_path,
			signup_path: self.signup_path,
			request_timeout: self.request_timeout,
			connect_timeout: self.connect_timeout,
			stream_idle_timeout: self.stream_idle_timeout,
			stream_max_duration: self.stream_max_duration,
			get_retries: self.get_retries,
			retry_delay: self.retry_delay,
			user_agent: self.user_agent,
		})
	}
}
