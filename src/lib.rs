//! Federated sign-in adapter for one identity provider.
//!
//! The broker drives OAuth 2.0 authorization-code, OpenID Connect, and SAML 2.0 browser SSO
//! flows against every configured provider environment and folds each protocol's answer
//! into one [`identity::IdentityRecord`]. The record is wrapped in a sixty-second
//! [`session::Session`] that the transport layer hands to the browser.
//!
//! The `server` feature adds the TOML configuration loader and an axum front end.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

#[cfg(feature = "server")] pub mod config;
pub mod environment;
pub mod error;
pub mod flows;
pub mod http;
pub mod id;
pub mod identity;
pub mod normalize;
pub mod oauth;
pub mod obs;
pub mod policy;
pub mod protocol;
pub mod secret;
pub mod session;
#[cfg(feature = "server")] pub mod web;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		environment::{Environment, EnvironmentRegistry},
		flows::{Broker, BrokerSettings},
		http::ReqwestHttpClient,
		id::EnvironmentKey,
		oauth::ReqwestTransportErrorMapper,
		secret::Secret,
	};

	/// Broker type alias used by reqwest-backed integration tests.
	pub type ReqwestTestBroker = Broker<ReqwestHttpClient, ReqwestTransportErrorMapper>;

	/// Client identifier carried by every test environment.
	pub const TEST_CLIENT_ID: &str = "test-client";
	/// Client secret carried by every test environment.
	pub const TEST_CLIENT_SECRET: &str = "test-secret";

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.timeout(crate::http::DEFAULT_TIMEOUT)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Creates an environment pointing at `domain` with the shared test credentials.
	pub fn test_environment(key: &str, domain: &str) -> Environment {
		Environment::new(
			EnvironmentKey::new(key).expect("Test environment key should be valid."),
			Url::parse(domain).expect("Test domain should parse."),
			TEST_CLIENT_ID,
			Secret::new(TEST_CLIENT_SECRET),
		)
		.expect("Test environment should be valid.")
	}

	/// Settings with a fixed entity id and the default groups endpoint.
	pub fn test_settings() -> BrokerSettings {
		BrokerSettings::new(
			"https://rp.test",
			Url::parse(crate::flows::DEFAULT_GROUPS_ENDPOINT)
				.expect("Default groups endpoint should parse."),
		)
	}

	/// Constructs a [`Broker`] over the given environments and the insecure test transport.
	pub fn build_reqwest_test_broker<I>(environments: I) -> ReqwestTestBroker
	where
		I: IntoIterator<Item = Environment>,
	{
		let registry =
			EnvironmentRegistry::new(environments).expect("Test registry should be valid.");

		Broker::with_http_client(
			registry,
			test_settings(),
			test_reqwest_http_client(),
			ReqwestTransportErrorMapper,
		)
	}
}

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(feature = "server")] use {clap as _, color_eyre as _, tracing_subscriber as _};
#[cfg(test)] use {color_eyre as _, http_body_util as _, httpmock as _, tokio as _, tower as _};
