#![cfg(all(feature = "reqwest", feature = "test"))]

// crates.io
use futures_util::{StreamExt, future};
use httpmock::prelude::*;
use serde_json::json;
// self
use bearer_relay::{
	_preludet::*,
	client::{ApiClient, RequestDescriptor},
	config::ClientConfig,
	http::ReqwestTransport,
	store::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, TokenStore},
	stream::StreamEvent,
};

async fn login(client: &ReqwestTestClient, server: &MockServer) {
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/auth/login")
				.json_body(json!({ "email": "ada@example.com", "password": "hunter2" }));
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"accessToken":"A1","refreshToken":"R1"}"#);
		})
		.await;

	client
		.login(&json!({ "email": "ada@example.com", "password": "hunter2" }))
		.await
		.expect("Login against the mock server should succeed.");

	mock.assert_async().await;
}

#[tokio::test]
async fn expired_access_token_is_refreshed_and_the_call_retried() {
	let server = MockServer::start_async().await;
	let (client, primary, secondary) = build_reqwest_test_client(&server.base_url());

	login(&client, &server).await;

	let expired = server
		.mock_async(|when, then| {
			when.method(GET).path("/notebooks").header("authorization", "Bearer A1");
			then.status(401).body(r#"{"message":"jwt expired"}"#);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/auth/refresh")
				.header_missing("authorization")
				.json_body(json!({ "refreshToken": "R1" }));
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"accessToken":"A2"}"#);
		})
		.await;
	let fresh = server
		.mock_async(|when, then| {
			when.method(GET).path("/notebooks").header("authorization", "Bearer A2");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"[{"id":1,"title":"Physics"}]"#);
		})
		.await;
	let notebooks = client.get("/notebooks").await.expect("The retried call should succeed.");

	assert_eq!(notebooks, json!([{ "id": 1, "title": "Physics" }]));

	expired.assert_calls_async(1).await;
	refresh.assert_calls_async(1).await;
	fresh.assert_calls_async(1).await;

	assert_eq!(primary.value(ACCESS_TOKEN_KEY).as_deref(), Some("A2"));
	assert_eq!(primary.value(REFRESH_TOKEN_KEY).as_deref(), Some("R1"));
	assert_eq!(secondary.value("auth_token_backup").as_deref(), Some("A2"));
	assert_eq!(secondary.value("refresh_token_backup").as_deref(), Some("R1"));
}

#[tokio::test]
async fn concurrent_401s_share_one_refresh() {
	let server = MockServer::start_async().await;
	let (client, _, _) = build_reqwest_test_client(&server.base_url());

	login(&client, &server).await;

	let expired = server
		.mock_async(|when, then| {
			when.method(GET).path("/sources").header("authorization", "Bearer A1");
			then.status(401);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200)
				.delay(Duration::from_millis(200))
				.header("content-type", "application/json")
				.body(r#"{"accessToken":"A2","refreshToken":"R2"}"#);
		})
		.await;
	let fresh = server
		.mock_async(|when, then| {
			when.method(GET).path("/sources").header("authorization", "Bearer A2");
			then.status(200).header("content-type", "application/json").body("[]");
		})
		.await;
	let results = future::join_all((0..5).map(|_| client.get("/sources"))).await;

	for result in results {
		assert_eq!(result.expect("Every caller should recover."), json!([]));
	}

	refresh.assert_calls_async(1).await;
	expired.assert_calls_async(5).await;
	fresh.assert_calls_async(5).await;

	assert_eq!(client.auth().metrics().attempts(), 1);
}

#[tokio::test]
async fn forbidden_keeps_tokens() {
	let server = MockServer::start_async().await;
	let (client, primary, _) = build_reqwest_test_client(&server.base_url());

	login(&client, &server).await;

	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200).body(r#"{"accessToken":"never"}"#);
		})
		.await;

	server
		.mock_async(|when, then| {
			when.method(DELETE).path("/notebooks/9");
			then.status(403).body(r#"{"message":"Not your notebook"}"#);
		})
		.await;

	let err = client.delete("/notebooks/9").await.expect_err("403 should surface.");

	assert_eq!(err.kind(), ErrorKind::Forbidden);
	assert_eq!(err.server_message(), Some("Not your notebook"));
	assert_eq!(primary.value(ACCESS_TOKEN_KEY).as_deref(), Some("A1"));
	assert_eq!(primary.value(REFRESH_TOKEN_KEY).as_deref(), Some("R1"));

	refresh.assert_calls_async(0).await;
}

#[tokio::test]
async fn rate_limits_and_validation_errors_carry_server_messages() {
	let server = MockServer::start_async().await;
	let (client, _, _) = build_reqwest_test_client(&server.base_url());

	server
		.mock_async(|when, then| {
			when.method(POST).path("/flashcards/generate");
			then.status(429)
				.header("retry-after", "7")
				.body(r#"{"error":"Too Many Requests","message":"Daily limit reached"}"#);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(PUT).path("/tags/3");
			then.status(422).body(r#"{"error":"Tag name is required"}"#);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(PATCH).path("/chunks/1");
			then.status(500).body("<html>oops</html>");
		})
		.await;

	let limited = client
		.post("/flashcards/generate", &json!({ "sourceId": 4 }))
		.await
		.expect_err("429 should surface.");

	assert!(matches!(
		limited,
		Error::RateLimited { ref message, retry_after: Some(delay) }
			if message == "Daily limit reached" && delay == Duration::from_secs(7)
	));

	let invalid =
		client.put("/tags/3", &json!({ "name": "" })).await.expect_err("422 should surface.");

	assert_eq!(invalid.kind(), ErrorKind::Api);
	assert_eq!(invalid.status(), Some(422));
	assert_eq!(invalid.to_string(), "Tag name is required");

	let opaque = client.patch("/chunks/1", &json!({})).await.expect_err("500 should surface.");

	assert_eq!(opaque.to_string(), "Request failed: 500");
}

#[tokio::test]
async fn rejected_refresh_clears_both_tiers() {
	let server = MockServer::start_async().await;
	let (client, primary, secondary) = build_reqwest_test_client(&server.base_url());

	login(&client, &server).await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/profile");
			then.status(401);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(401).body(r#"{"message":"Refresh token revoked"}"#);
		})
		.await;

	let err = client.get("/profile").await.expect_err("401 should surface.");

	assert_eq!(err.kind(), ErrorKind::Unauthorized);
	assert!(primary.is_empty());
	assert!(secondary.is_empty());
	assert!(!client.is_authenticated().await);
}

#[tokio::test]
async fn unavailable_refresh_keeps_tokens_and_surfaces_a_network_error() {
	let server = MockServer::start_async().await;
	let (client, primary, secondary) = build_reqwest_test_client(&server.base_url());

	login(&client, &server).await;

	let expired = server
		.mock_async(|when, then| {
			when.method(GET).path("/profile");
			then.status(401);
		})
		.await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(503).body(r#"{"message":"Auth service restarting"}"#);
		})
		.await;

	let err = client.get("/profile").await.expect_err("The call should fail.");

	assert_eq!(err.kind(), ErrorKind::Network);
	assert_eq!(primary.value(ACCESS_TOKEN_KEY).as_deref(), Some("A1"));
	assert_eq!(secondary.value("refresh_token_backup").as_deref(), Some("R1"));
	assert!(client.is_authenticated().await);

	expired.assert_calls_async(1).await;
}

#[tokio::test]
async fn timed_out_gets_are_retried_but_posts_are_not() {
	let server = MockServer::start_async().await;
	let config = ClientConfig::builder(
		Url::parse(&server.base_url()).expect("Failed to parse the mock server base URL."),
	)
	.request_timeout(Duration::from_millis(100))
	.retry_delay(Duration::from_millis(10))
	.build()
	.expect("Failed to build the timeout test configuration.");
	let transport =
		ReqwestTransport::from_config(&config).expect("Failed to build the reqwest transport.");
	let client =
		ApiClient::<ReqwestTransport>::with_transport(config, TokenStore::in_memory(), transport);
	let slow_get = server
		.mock_async(|when, then| {
			when.method(GET).path("/slow");
			then.status(200).delay(Duration::from_millis(500)).body("{}");
		})
		.await;
	let slow_post = server
		.mock_async(|when, then| {
			when.method(POST).path("/slow");
			then.status(200).delay(Duration::from_millis(500)).body("{}");
		})
		.await;
	let err = client.get("/slow").await.expect_err("Every GET attempt should time out.");

	assert_eq!(err.kind(), ErrorKind::Network);

	slow_get.assert_calls_async(3).await;

	let err = client
		.post("/slow", &json!({ "title": "draft" }))
		.await
		.expect_err("The POST should time out once.");

	assert_eq!(err.kind(), ErrorKind::Network);

	slow_post.assert_calls_async(1).await;
}

#[tokio::test]
async fn chat_stream_decodes_events_over_http() {
	let server = MockServer::start_async().await;
	let (client, _, _) = build_reqwest_test_client(&server.base_url());

	login(&client, &server).await;

	server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/chat/stream")
				.header("authorization", "Bearer A1")
				.header("accept", "text/event-stream");
			then.status(200).header("content-type", "text/event-stream").body(concat!(
				": keep-alive\n\n",
				"data: {\"content\":\"Photo\"}\n\n",
				"data: {\"text\":\"synthesis\"}\n\n",
				"data: {\"status\":\"citing\",\"progress\":90}\n\n",
				"data: [DONE]\n\n",
				"data: {\"content\":\"ignored\"}\n\n",
			));
		})
		.await;

	let stream = client
		.stream(&RequestDescriptor::post("/chat/stream").with_body(json!({ "message": "Explain" })))
		.await
		.expect("The stream should open.");
	let events = stream
		.collect::<Vec<_>>()
		.await
		.into_iter()
		.collect::<Result<Vec<_>>>()
		.expect("Every event should decode.");

	assert_eq!(events.len(), 4);
	assert_eq!(events[0], StreamEvent::ContentDelta("Photo".into()));
	assert_eq!(events[1], StreamEvent::ContentDelta("synthesis".into()));
	assert!(matches!(&events[2], StreamEvent::Raw(map) if map["status"] == "citing"));
	assert_eq!(events[3], StreamEvent::Done);
}

#[tokio::test]
async fn mid_stream_error_ends_the_iteration() {
	let server = MockServer::start_async().await;
	let (client, _, _) = build_reqwest_test_client(&server.base_url());

	server
		.mock_async(|when, then| {
			when.method(POST).path("/research/stream");
			then.status(200).body(concat!(
				"data: {\"content\":\"Searching\"}\n",
				"data: {\"error\":\"quota exceeded\"}\n",
				"data: {\"content\":\"never\"}\n",
			));
		})
		.await;

	let mut stream = client
		.stream(&RequestDescriptor::post("/research/stream"))
		.await
		.expect("The stream should open.");

	assert!(matches!(
		stream.next().await,
		Some(Ok(StreamEvent::ContentDelta(text))) if text == "Searching"
	));

	let err = stream
		.next()
		.await
		.expect("The error should be yielded.")
		.expect_err("The upstream error should fail the stream.");

	assert_eq!(err.kind(), ErrorKind::Stream);
	assert_eq!(err.to_string(), "quota exceeded");
	assert!(stream.next().await.is_none());
}
