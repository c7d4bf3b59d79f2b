//! The network half of a token refresh, kept behind a trait so the coordinator can be driven
//! by fakes in tests.

// self
use crate::{
	_prelude::*,
	auth::TokenPair,
	client::{Executor, RequestDescriptor, RequestOptions},
	http::HttpTransport,
	response,
};

/// Boxed future returned by [`TokenRefresher::refresh`].
pub type RefreshFuture<'a> = Pin<Box<dyn Future<Output = Result<TokenPair>> + 'a + Send>>;

/// Exchanges a refresh token for a new access token.
///
/// Implementations report authoritative rejections as errors for which
/// [`Error::is_auth_rejection`] holds; every other error is treated as transient and leaves
/// stored tokens untouched.
pub trait TokenRefresher
where
	Self: 'static + Send + Sync,
{
	/// Calls the refresh endpoint with `refresh_token`.
	///
	/// The returned pair carries a rotated refresh token only when the server issued one.
	fn refresh<'a>(&'a self, refresh_token: &'a str) -> RefreshFuture<'a>;
}

/// Default refresher that POSTs `{ "refreshToken": .. }` to the configured refresh path.
///
/// The call never carries a bearer token, never triggers a nested refresh, and never clears
/// tokens on `401`; the coordinator alone decides what a failure means.
pub struct HttpRefresher<T>
where
	T: ?Sized + HttpTransport,
{
	executor: Executor<T>,
}
impl<T> HttpRefresher<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a refresher that issues calls through `executor`.
	pub fn new(executor: Executor<T>) -> Self {
		Self { executor }
	}
}
impl<T> TokenRefresher for HttpRefresher<T>
where
	T: ?Sized + HttpTransport,
{
	fn refresh<'a>(&'a self, refresh_token: &'a str) -> RefreshFuture<'a> {
		Box::pin(async move {
			let descriptor = RequestDescriptor::post(self.executor.config().refresh_path.as_str())
				.with_body(serde_json::json!({ "refreshToken": refresh_token }))
				.with_options(RequestOptions::anonymous());
			let response = self.executor.execute(&descriptor, None).await?;
			let body: Value = response::map_response(response)?;

			TokenPair::from_body(&body).ok_or(Error::MissingAccessToken)
		})
	}
}
impl<T> Debug for HttpRefresher<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HttpRefresher")
			.field("refresh_path", &self.executor.config().refresh_path)
			.finish()
	}
}
