//! Maps raw HTTP outcomes into decoded payloads or classified [`Error`] values.

// self
use crate::{_prelude::*, http::HttpResponse};

/// Decodes a 2xx response into `T` or classifies a non-2xx response.
pub fn map_response<T>(response: HttpResponse) -> Result<T>
where
	T: DeserializeOwned,
{
	if !response.is_success() {
		return Err(classify_failure(&response));
	}

	decode_body(response.status, &response.body)
}

/// Decodes a success body, treating an empty body as JSON `null`.
pub fn decode_body<T>(status: u16, body: &[u8]) -> Result<T>
where
	T: DeserializeOwned,
{
	let body = if body.iter().all(u8::is_ascii_whitespace) { b"null".as_slice() } else { body };
	let mut de = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut de)
		.map_err(|source| Error::Decode { source, status: Some(status) })
}

/// Turns a non-2xx response into the matching [`Error`] variant.
pub fn classify_failure(response: &HttpResponse) -> Error {
	let message = extract_message(&response.body);

	match response.status {
		401 => Error::Unauthorized { message },
		403 => Error::Forbidden { message },
		429 => Error::RateLimited {
			message: message.unwrap_or_else(|| "Too many requests, please try again later.".into()),
			retry_after: response.retry_after,
		},
		status => Error::Api {
			status,
			message: message.unwrap_or_else(|| format!("Request failed: {status}")),
		},
	}
}

/// Extracts the best human-readable message from a JSON error body.
///
/// `message` wins over `error`; an `error` object contributes its own `message` field.
pub fn extract_message(body: &[u8]) -> Option<String> {
	let Value::Object(map) = serde_json::from_slice::<Value>(body).ok()? else {
		return None;
	};

	non_empty_str(map.get("message")).or_else(|| match map.get("error") {
		Some(Value::Object(inner)) => non_empty_str(inner.get("message")),
		other => non_empty_str(other),
	})
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
	value.and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty()).map(Into::into)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn message_prefers_message_over_error() {
		assert_eq!(
			extract_message(br#"{"error":"Bad Request","message":"Title is required"}"#),
			Some("Title is required".into())
		);
		assert_eq!(
			extract_message(br#"{"error":"Quota exceeded"}"#),
			Some("Quota exceeded".into())
		);
		assert_eq!(
			extract_message(br#"{"error":{"message":"model overloaded"}}"#),
			Some("model overloaded".into())
		);
		assert_eq!(extract_message(br#"{"message":"  "}"#), None);
		assert_eq!(extract_message(b"<html>502</html>"), None);
	}

	#[test]
	fn failures_are_classified_by_status() {
		let unauthorized = classify_failure(&HttpResponse::new(401, "{}"));
		let forbidden = classify_failure(&HttpResponse::new(403, r#"{"message":"revoked"}"#));
		let limited = classify_failure(&HttpResponse {
			status: 429,
			retry_after: Some(Duration::from_secs(3)),
			body: br#"{"message":"Slow down"}"#.to_vec(),
		});
		let opaque = classify_failure(&HttpResponse::new(502, "Bad Gateway"));

		assert_eq!(unauthorized.kind(), ErrorKind::Unauthorized);
		assert_eq!(forbidden.server_message(), Some("revoked"));
		assert!(matches!(
			limited,
			Error::RateLimited { ref message, retry_after: Some(delay) }
				if message == "Slow down" && delay == Duration::from_secs(3)
		));
		assert_eq!(opaque.to_string(), "Request failed: 502");
		assert_eq!(opaque.status(), Some(502));
	}

	#[test]
	fn success_bodies_decode_or_report_the_path() {
		#[derive(Debug, Deserialize)]
		struct Notebook {
			#[allow(dead_code)]
			title: String,
		}

		let empty: Value =
			map_response(HttpResponse::new(204, "")).expect("Empty bodies should decode as null.");

		assert!(empty.is_null());

		let err = map_response::<Notebook>(HttpResponse::new(200, r#"{"title":7}"#))
			.expect_err("Mismatched types should fail to decode.");

		match err {
			Error::Decode { source, status } => {
				assert_eq!(status, Some(200));
				assert_eq!(source.path().to_string(), "title");
			},
			other => panic!("Unexpected error: {other:?}."),
		}
	}
}
