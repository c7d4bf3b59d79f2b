//! Access/refresh token pair and its extraction from authentication responses.

pub mod secret;

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Access token plus the refresh token that can renew it.
///
/// Expiry is not tracked client-side; an expired access token is discovered through a `401`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenPair {
	/// Credential attached to authenticated requests.
	pub access_token: TokenSecret,
	/// Credential used only to obtain a new access token.
	pub refresh_token: Option<TokenSecret>,
}
impl TokenPair {
	const ACCESS_FIELDS: [&'static str; 3] = ["accessToken", "access_token", "token"];
	const REFRESH_FIELDS: [&'static str; 2] = ["refreshToken", "refresh_token"];

	/// Creates a pair from raw strings.
	pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: refresh_token.map(TokenSecret::new),
		}
	}

	/// Extracts tokens from a login, signup, or refresh response body.
	///
	/// Both camelCase and snake_case field names are accepted, either at the top level or
	/// inside a `data` envelope. Returns `None` when no non-empty access token is present.
	pub fn from_body(body: &Value) -> Option<Self> {
		Self::from_object(body).or_else(|| body.get("data").and_then(Self::from_object))
	}

	fn from_object(value: &Value) -> Option<Self> {
		let object = value.as_object()?;
		let access = Self::first_field(object, &Self::ACCESS_FIELDS)?;
		let refresh = Self::first_field(object, &Self::REFRESH_FIELDS);

		Some(Self::new(access, refresh))
	}

	fn first_field(object: &Map<String, Value>, names: &[&str]) -> Option<String> {
		names
			.iter()
			.filter_map(|name| object.get(*name).and_then(Value::as_str))
			.find(|value| !value.is_empty())
			.map(Into::into)
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	#[test]
	fn extracts_camel_and_snake_case_fields() {
		let camel = TokenPair::from_body(&json!({ "accessToken": "A1", "refreshToken": "R1" }))
			.expect("camelCase tokens should be extracted.");
		let snake = TokenPair::from_body(&json!({ "data": { "access_token": "A2" } }))
			.expect("Enveloped snake_case tokens should be extracted.");

		assert_eq!(camel, TokenPair::new("A1", Some("R1".into())));
		assert_eq!(snake.access_token.expose(), "A2");
		assert!(snake.refresh_token.is_none());
	}

	#[test]
	fn empty_or_missing_access_token_is_rejected() {
		assert!(
			TokenPair::from_body(&json!({ "accessToken": "", "refreshToken": "R1" })).is_none()
		);
		assert!(TokenPair::from_body(&json!({ "user": { "id": 1 } })).is_none());
		assert!(TokenPair::from_body(&json!("A1")).is_none());
	}
}
