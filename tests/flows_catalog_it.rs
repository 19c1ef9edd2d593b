#![cfg(all(feature = "reqwest", feature = "test"))]

// crates.io
use httpmock::prelude::*;
// self
use federation_broker::{
	_preludet::*,
	error::{FailureKind, ValidationError},
	policy::PolicySelection,
	protocol::Protocol,
};

const POLICIES_PATH: &str = "/api/public/v3/policies.json";

#[tokio::test]
async fn fetch_policies_reads_the_catalog_with_client_credentials() {
	let server = MockServer::start_async().await;
	let broker = build_reqwest_test_broker([test_environment("sandbox", &server.base_url())]);
	let mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path(POLICIES_PATH)
				.query_param("client_id", TEST_CLIENT_ID)
				.query_param("client_secret", TEST_CLIENT_SECRET);
			then.status(200).header("content-type", "application/json").body(
				r#"[{"handle":"loa3","name":"Identity Verified"},{"handle":"teacher"}]"#,
			);
		})
		.await;
	let policies =
		broker.fetch_policies("sandbox").await.expect("Catalog fetch should succeed.");

	mock.assert_async().await;

	assert_eq!(policies.len(), 2);
	assert_eq!(policies[0].handle.as_ref(), "loa3");
	assert_eq!(policies[0].display_name, "Identity Verified");
	assert_eq!(policies[1].display_name, "teacher");
}

#[tokio::test]
async fn catalog_is_fetched_fresh_every_time() {
	let server = MockServer::start_async().await;
	let broker = build_reqwest_test_broker([test_environment("sandbox", &server.base_url())]);
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path(POLICIES_PATH);
			then.status(200).body(r#"[{"handle":"loa3"}]"#);
		})
		.await;

	for _ in 0..3 {
		broker
			.validate_request("sandbox", "oauth", "loa3")
			.await
			.expect("Known policy should validate.");
	}

	assert_eq!(mock.hits_async().await, 3);
}

#[tokio::test]
async fn catalog_failures_are_classified() {
	let unavailable = MockServer::start_async().await;
	let malformed = MockServer::start_async().await;
	let broker = build_reqwest_test_broker([
		test_environment("sandbox", &unavailable.base_url()),
		test_environment("prod", &malformed.base_url()),
	]);
	let _unavailable = unavailable
		.mock_async(|when, then| {
			when.method(GET).path(POLICIES_PATH);
			then.status(502).body("bad gateway");
		})
		.await;
	let _malformed = malformed
		.mock_async(|when, then| {
			when.method(GET).path(POLICIES_PATH);
			then.status(200).body(r#"{"policies":"nope"}"#);
		})
		.await;
	let err = broker.fetch_policies("sandbox").await.expect_err("Non-2xx should fail.");

	assert_eq!(err.kind(), FailureKind::UpstreamUnavailable);

	let err = broker.fetch_policies("prod").await.expect_err("Malformed JSON should fail.");

	assert_eq!(err.kind(), FailureKind::MalformedResponse);
	assert!(err.to_string().contains("policies"));
}

#[tokio::test]
async fn invalid_targets_fail_before_any_network_call() {
	let server = MockServer::start_async().await;
	let broker = build_reqwest_test_broker([test_environment("sandbox", &server.base_url())]);
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path(POLICIES_PATH);
			then.status(200).body(r#"[{"handle":"loa3"}]"#);
		})
		.await;
	let err = broker
		.validate_request("staging", "oauth", "loa3")
		.await
		.expect_err("Unknown environments should fail.");

	assert!(matches!(
		err,
		Error::Validation(ValidationError::UnknownEnvironment { ref key }) if key == "staging"
	));

	let err = broker
		.validate_request("sandbox", "OAuth", "loa3")
		.await
		.expect_err("Protocol tokens are case-sensitive.");

	assert!(matches!(err, Error::Validation(ValidationError::UnknownProtocol { .. })));

	let err = broker.fetch_policies("staging").await.expect_err("Unknown environments should fail.");

	assert_eq!(err.kind(), FailureKind::Validation);
	assert_eq!(mock.hits_async().await, 0);
}

#[tokio::test]
async fn unknown_policy_is_a_validation_failure() {
	let server = MockServer::start_async().await;
	let broker = build_reqwest_test_broker([test_environment("sandbox", &server.base_url())]);
	let _mock = server
		.mock_async(|when, then| {
			when.method(GET).path(POLICIES_PATH);
			then.status(200).body(r#"[{"handle":"loa3"}]"#);
		})
		.await;
	let err = broker
		.validate_request("sandbox", "saml", "loa1")
		.await
		.expect_err("Unlisted policies should fail.");

	assert!(matches!(
		err,
		Error::Validation(ValidationError::UnknownPolicy { ref handle }) if handle == "loa1"
	));
}

#[tokio::test]
async fn groups_bypasses_the_catalog() {
	let server = MockServer::start_async().await;
	let broker = build_reqwest_test_broker([test_environment("sandbox", &server.base_url())]);
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path(POLICIES_PATH);
			then.status(500);
		})
		.await;
	let validated = broker
		.validate_request("sandbox", "oidc", "groups")
		.await
		.expect("Reserved policy should always validate.");

	assert_eq!(validated.protocol, Protocol::Oidc);
	assert_eq!(validated.policy, PolicySelection::Groups);
	assert_eq!(mock.hits_async().await, 0);
}

#[tokio::test]
async fn one_unusable_catalog_entry_does_not_hide_the_rest() {
	let server = MockServer::start_async().await;
	let broker = build_reqwest_test_broker([test_environment("sandbox", &server.base_url())]);
	let _mock = server
		.mock_async(|when, then| {
			when.method(GET).path(POLICIES_PATH);
			then.status(200).body(r#"[{"handle":"identity"},{"handle":"loa3 ial2"}]"#);
		})
		.await;
	let validated = broker
		.validate_request("sandbox", "oauth", "identity")
		.await
		.expect("Valid handles should still validate.");

	assert_eq!(validated.policy.handle(), "identity");

	let err = broker
		.validate_request("sandbox", "oauth", "loa3 ial2")
		.await
		.expect_err("Skipped entries never match.");

	assert_eq!(err.kind(), FailureKind::Validation);
}
