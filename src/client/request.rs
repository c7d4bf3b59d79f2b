//! Request descriptors and the per-call options that steer the `401` protocol.

// self
use crate::{_prelude::*, http::Method};

/// Per-call switches for token handling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestOptions {
	/// Attach `Authorization: Bearer <token>` when a token is available.
	pub attach_token: bool,
	/// Run the refresh protocol and retry once when the server answers `401`.
	pub refresh_on_401: bool,
	/// Clear stored tokens when a `401` could not be recovered.
	pub clear_tokens_on_401: bool,
	/// Extra headers sent with the call.
	pub headers: Vec<(String, String)>,
}
impl RequestOptions {
	/// Options for calls that must never carry or touch credentials (login, signup, refresh).
	pub fn anonymous() -> Self {
		Self {
			attach_token: false,
			refresh_on_401: false,
			clear_tokens_on_401: false,
			headers: Vec::new(),
		}
	}

	/// Disables the refresh-and-retry protocol for this call.
	pub fn without_refresh(mut self) -> Self {
		self.refresh_on_401 = false;

		self
	}

	/// Keeps stored tokens even when a `401` cannot be recovered.
	pub fn keep_tokens_on_401(mut self) -> Self {
		self.clear_tokens_on_401 = false;

		self
	}

	/// Appends a header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}
}
impl Default for RequestOptions {
	fn default() -> Self {
		Self {
			attach_token: true,
			refresh_on_401: true,
			clear_tokens_on_401: true,
			headers: Vec::new(),
		}
	}
}

/// A `(method, path, body)` triple plus its [`RequestOptions`].
#[derive(Clone, Debug, PartialEq)]
pub struct RequestDescriptor {
	/// Verb.
	pub method: Method,
	/// Path joined onto the configured base URL (may include a query string).
	pub path: String,
	/// JSON body.
	pub body: Option<Value>,
	/// Token handling switches.
	pub options: RequestOptions,
}
impl RequestDescriptor {
	/// Creates a descriptor with default options and no body.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self { method, path: path.into(), body: None, options: RequestOptions::default() }
	}

	/// `GET path`.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::Get, path)
	}

	/// `POST path`.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::Post, path)
	}

	/// `PUT path`.
	pub fn put(path: impl Into<String>) -> Self {
		Self::new(Method::Put, path)
	}

	/// `PATCH path`.
	pub fn patch(path: impl Into<String>) -> Self {
		Self::new(Method::Patch, path)
	}

	/// `DELETE path`.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::Delete, path)
	}

	/// Sets the JSON body.
	pub fn with_body(mut self, body: Value) -> Self {
		self.body = Some(body);

		self
	}

	/// Serializes `body` and sets it as the JSON body.
	pub fn with_json<B>(self, body: &B) -> Result<Self>
	where
		B: ?Sized + Serialize,
	{
		let value = serde_json::to_value(body).map_err(crate::error::ConfigError::from)?;

		Ok(self.with_body(value))
	}

	/// Replaces the options.
	pub fn with_options(mut self, options: RequestOptions) -> Self {
		self.options = options;

		self
	}
}
