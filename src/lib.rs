//! Resilient authenticated API client: tiered token storage, single-flight refresh,
//! classified retries, and server-sent event decoding in one crate.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod obs;
pub mod response;
pub mod store;
pub mod stream;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		client::ApiClient,
		config::ClientConfig,
		http::ReqwestTransport,
		store::{MemoryStore, TokenStore},
	};

	/// Client type alias used by reqwest-backed integration tests.
	pub type ReqwestTestClient = ApiClient<ReqwestTransport>;

	/// Builds a client configuration pointing at `base_url` with short retry delays so tests
	/// never sleep for long.
	pub fn test_config(base_url: &str) -> ClientConfig {
		ClientConfig::builder(
			Url::parse(base_url).expect("Failed to parse the mock server base URL."),
		)
		.retry_delay(Duration::from_millis(10))
		.build()
		.expect("Failed to build the test client configuration.")
	}

	/// Constructs an [`ApiClient`] backed by two in-memory tiers and the reqwest transport.
	///
	/// Returns the client plus the primary and secondary tiers so tests can inspect what was
	/// persisted.
	pub fn build_reqwest_test_client(
		base_url: &str,
	) -> (ReqwestTestClient, Arc<MemoryStore>, Arc<MemoryStore>) {
		let primary = Arc::new(MemoryStore::default());
		let secondary = Arc::new(MemoryStore::default());
		let store = TokenStore::new(primary.clone(), secondary.clone());
		let config = test_config(base_url);
		let transport = ReqwestTransport::from_config(&config)
			.expect("Failed to build the reqwest transport for tests.");
		let client = ApiClient::with_transport(config, store, transport);

		(client, primary, secondary)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
		time::Duration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
	pub use serde_json::{Map, Value};
	pub use thiserror::Error as ThisError;
	pub use url::Url;

	pub use crate::error::{Error, ErrorKind, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use httpmock as _;
