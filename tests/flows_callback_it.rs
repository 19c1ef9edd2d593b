#![cfg(all(feature = "reqwest", feature = "test"))]

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use httpmock::prelude::*;
use jsonwebtoken::{EncodingKey, Header};
// self
use federation_broker::{
	_preludet::*,
	error::{FailureKind, UpstreamError, ValidationError},
	flows::{CallbackOutcome, CallbackResult, CallerOrigin},
	identity::RawPayload,
	protocol::Protocol,
	session::{SESSION_TTL, Session},
};

const TOKEN_BODY: &str =
	r#"{"access_token":"access-1","token_type":"bearer","expires_in":300,"scope":"loa3"}"#;

fn origin() -> CallerOrigin {
	CallerOrigin::new("http", "localhost:5001").expect("Origin fixture should be valid.")
}

fn authenticated(outcome: CallbackOutcome) -> Session {
	match outcome {
		CallbackOutcome::Authenticated(session) => session,
		CallbackOutcome::Restart => panic!("Callback should authenticate."),
	}
}

fn saml_document(assertion: &str) -> String {
	let xml = format!(
		r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_resp1" Version="2.0" IssueInstant="2024-05-01T12:00:00Z"><saml:Issuer>https://api.id.me</saml:Issuer><samlp:Status><samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Success"/></samlp:Status>{assertion}</samlp:Response>"#
	);

	STANDARD.encode(xml)
}

#[tokio::test]
async fn oauth_callback_exchanges_code_and_folds_attributes() {
	let server = MockServer::start_async().await;
	let broker = build_reqwest_test_broker([test_environment("sandbox", &server.base_url())]);
	let token = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth/token")
				.header("content-type", "application/x-www-form-urlencoded")
				.body_contains("grant_type=authorization_code")
				.body_contains("code=code-1")
				.body_contains("client_id=test-client")
				.body_contains("client_secret=test-secret")
				.body_contains(
					"redirect_uri=http%3A%2F%2Flocalhost%3A5001%2Fcallback%2Fsandbox%2Foauth",
				);
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await;
	let attributes = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/public/v3/attributes.json")
				.header("authorization", "Bearer access-1");
			then.status(200).header("content-type", "application/json").body(
				r#"{"attributes":[{"handle":"email","value":"a@b.com"},{"handle":"zip","value":"12345"},{"handle":"email","value":"c@d.com"}],"status":[]}"#,
			);
		})
		.await;
	let outcome = broker
		.complete_callback(
			"sandbox",
			"oauth",
			CallbackResult::AuthorizationCode(Some("code-1".into())),
			&origin(),
		)
		.await
		.expect("OAuth callback should succeed.");

	token.assert_async().await;
	attributes.assert_async().await;

	let session = authenticated(outcome);
	let identity = &session.identity;

	assert_eq!(identity.attributes().len(), 2);
	assert_eq!(identity.attributes().get("email"), Some("c@d.com"));
	assert_eq!(identity.attributes().get("zip"), Some("12345"));
	assert!(matches!(
		identity.raw_payload(),
		RawPayload::Structured(value) if value.get("status").is_some()
	));
	assert_eq!(session.expires_at - session.issued_at, SESSION_TTL);
}

#[tokio::test]
async fn oidc_callback_decodes_userinfo_claims() {
	let server = MockServer::start_async().await;
	let broker = build_reqwest_test_broker([test_environment("prod", &server.base_url())]);
	let jwt = jsonwebtoken::encode(
		&Header::default(),
		&serde_json::json!({ "fname": "Ada", "lname": "Lovelace", "uuid": "u-1", "age": 36 }),
		&EncodingKey::from_secret(b"provider-signing-key"),
	)
	.expect("Fixture token should encode.");
	let _token = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token").body_contains("code=code-2");
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await;
	let userinfo = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/public/v3/userinfo.json")
				.header("authorization", "Bearer access-1");
			then.status(200).header("content-type", "application/jwt").body(&jwt);
		})
		.await;
	let outcome = broker
		.complete_callback(
			"prod",
			"oidc",
			CallbackResult::AuthorizationCode(Some("code-2".into())),
			&origin(),
		)
		.await
		.expect("OIDC callback should succeed.");

	userinfo.assert_async().await;

	let session = authenticated(outcome);

	assert_eq!(session.identity.attributes().get("fname"), Some("Ada"));
	assert_eq!(session.identity.attributes().get("age"), Some("36"));
	assert_eq!(session.identity.raw_payload(), &RawPayload::Opaque(jwt));
}

#[tokio::test]
async fn missing_code_is_terminal_without_network() {
	let server = MockServer::start_async().await;
	let broker = build_reqwest_test_broker([test_environment("sandbox", &server.base_url())]);
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).body(TOKEN_BODY);
		})
		.await;

	for code in [None, Some(String::new())] {
		let err = broker
			.complete_callback("sandbox", "oidc", CallbackResult::AuthorizationCode(code), &origin())
			.await
			.expect_err("Missing codes should fail.");

		assert!(matches!(err, Error::MissingAuthorizationCode));
		assert_eq!(err.kind(), FailureKind::ClientInput);
	}

	assert_eq!(token.hits_async().await, 0);
}

#[tokio::test]
async fn rejected_exchange_stops_before_the_resource_call() {
	let server = MockServer::start_async().await;
	let broker = build_reqwest_test_broker([test_environment("sandbox", &server.base_url())]);
	let _token = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(400)
				.header("content-type", "application/json")
				.body(r#"{"error":"invalid_grant","error_description":"code already used"}"#);
		})
		.await;
	let attributes = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/public/v3/attributes.json");
			then.status(200).body(r#"{"attributes":[]}"#);
		})
		.await;
	let err = broker
		.complete_callback(
			"sandbox",
			"oauth",
			CallbackResult::AuthorizationCode(Some("stale".into())),
			&origin(),
		)
		.await
		.expect_err("Rejected codes should fail.");

	assert!(matches!(
		err,
		Error::Upstream(UpstreamError::TokenRejected { ref error, status: Some(400) })
			if error == "invalid_grant"
	));
	assert_eq!(err.kind(), FailureKind::UpstreamUnavailable);
	assert_eq!(attributes.hits_async().await, 0);
}

#[tokio::test]
async fn resource_failures_are_classified() {
	let server = MockServer::start_async().await;
	let broker = build_reqwest_test_broker([test_environment("sandbox", &server.base_url())]);
	let _token = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await;
	let _attributes = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/public/v3/attributes.json");
			then.status(500).body("boom");
		})
		.await;
	let _userinfo = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/public/v3/userinfo.json");
			then.status(200).body("not a jwt");
		})
		.await;
	let err = broker
		.complete_callback(
			"sandbox",
			"oauth",
			CallbackResult::AuthorizationCode(Some("code".into())),
			&origin(),
		)
		.await
		.expect_err("Resource outages should fail.");

	assert!(matches!(
		err,
		Error::Upstream(UpstreamError::Status { endpoint: "attributes", status: 500 })
	));

	let err = broker
		.complete_callback(
			"sandbox",
			"oidc",
			CallbackResult::AuthorizationCode(Some("code".into())),
			&origin(),
		)
		.await
		.expect_err("Undecodable userinfo should fail.");

	assert_eq!(err.kind(), FailureKind::MalformedResponse);
}

#[tokio::test]
async fn saml_callback_normalizes_the_assertion() {
	let broker = build_reqwest_test_broker([test_environment("prod", "https://api.id.me")]);
	let document = saml_document(
		r#"<saml:Assertion ID="_a1" Version="2.0" IssueInstant="2024-05-01T12:00:00Z"><saml:Issuer>https://api.id.me</saml:Issuer><saml:AttributeStatement><saml:Attribute Name="fname"><saml:AttributeValue>Ada</saml:AttributeValue></saml:Attribute><saml:Attribute Name="email"><saml:AttributeValue>a@b.com</saml:AttributeValue></saml:Attribute></saml:AttributeStatement></saml:Assertion>"#,
	);
	let outcome = broker
		.complete_callback("prod", "saml", CallbackResult::SamlAssertion(Some(document)), &origin())
		.await
		.expect("SAML callback should succeed.");
	let session = authenticated(outcome);

	assert_eq!(session.identity.attributes().get("fname"), Some("Ada"));
	assert_eq!(session.identity.attributes().get("email"), Some("a@b.com"));
	assert!(matches!(session.identity.raw_payload(), RawPayload::Opaque(text) if text.contains("fname")));
}

#[tokio::test]
async fn saml_without_assertion_restarts_and_without_field_fails() {
	let broker = build_reqwest_test_broker([test_environment("prod", "https://api.id.me")]);
	let outcome = broker
		.complete_callback(
			"prod",
			"saml",
			CallbackResult::SamlAssertion(Some(saml_document(""))),
			&origin(),
		)
		.await
		.expect("Missing assertions should not fail.");

	assert_eq!(outcome, CallbackOutcome::Restart);

	let err = broker
		.complete_callback("prod", "saml", CallbackResult::SamlAssertion(None), &origin())
		.await
		.expect_err("Missing form fields should fail.");

	assert!(matches!(err, Error::MissingSamlResponse));
}

#[tokio::test]
async fn binding_must_match_the_protocol() {
	let broker = build_reqwest_test_broker([test_environment("prod", "https://api.id.me")]);
	let err = broker
		.complete_callback(
			"prod",
			"saml",
			CallbackResult::AuthorizationCode(Some("code".into())),
			&origin(),
		)
		.await
		.expect_err("SAML never completes over redirect.");

	assert!(matches!(
		err,
		Error::Validation(ValidationError::UnsupportedBinding {
			protocol: Protocol::Saml,
			binding: "redirect"
		})
	));

	let err = broker
		.complete_callback("prod", "oauth", CallbackResult::SamlAssertion(None), &origin())
		.await
		.expect_err("OAuth never completes over POST.");

	assert_eq!(err.kind(), FailureKind::Validation);
}
