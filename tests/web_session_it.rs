#![cfg(all(feature = "server", feature = "test"))]

// crates.io
use axum::{
	Router,
	body::Body,
	http::{Request, StatusCode, header},
	response::Response,
};
use http_body_util::BodyExt;
use httpmock::prelude::*;
use tower::ServiceExt;
// self
use federation_broker::{
	_preludet::*,
	identity::{IdentityRecord, RawPayload},
	session::Session,
	web::{
		self, AppState,
		cookies::{self, ATTRIBUTES_COOKIE, PAYLOAD_COOKIE},
	},
};

fn app(server: &MockServer) -> Router {
	let broker = build_reqwest_test_broker([test_environment("sandbox", &server.base_url())]);

	web::router(AppState::new(broker, "http"))
}

fn request(uri: &str, cookie: Option<&str>) -> Request<Body> {
	let mut builder = Request::builder().uri(uri).header(header::HOST, "localhost:5001");

	if let Some(cookie) = cookie {
		builder = builder.header(header::COOKIE, cookie);
	}

	builder.body(Body::empty()).expect("Request should build.")
}

fn location(response: &Response) -> String {
	response
		.headers()
		.get(header::LOCATION)
		.and_then(|value| value.to_str().ok())
		.expect("Redirect should carry a location.")
		.to_owned()
}

async fn json(response: Response) -> serde_json::Value {
	let bytes =
		response.into_body().collect().await.expect("Body should be readable.").to_bytes();

	serde_json::from_slice(&bytes).expect("Body should be JSON.")
}

#[tokio::test]
async fn callback_cookies_unlock_the_profile() {
	let server = MockServer::start_async().await;
	let _token = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth/token")
				.body_contains("redirect_uri=http%3A%2F%2Flocalhost%3A5001%2Fcallback%2Fsandbox%2Foauth");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"access-1","token_type":"bearer"}"#);
		})
		.await;
	let _attributes = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/public/v3/attributes.json");
			then.status(200).header("content-type", "application/json").body(
				r#"{"attributes":[{"handle":"fname","value":"Ada"},{"handle":"email","value":"a@b.com"},{"handle":"uuid","value":"u-1"}]}"#,
			);
		})
		.await;
	let app = app(&server);
	let response = app
		.clone()
		.oneshot(request("/callback/sandbox/oauth?code=code-1&state=s1", None))
		.await
		.expect("Router should respond.");

	assert_eq!(response.status(), StatusCode::FOUND);
	assert_eq!(location(&response), "/profile");

	let set_cookies: Vec<String> = response
		.headers()
		.get_all(header::SET_COOKIE)
		.iter()
		.filter_map(|value| value.to_str().ok())
		.map(ToOwned::to_owned)
		.collect();

	assert_eq!(set_cookies.len(), 2);
	assert!(set_cookies.iter().all(|cookie| cookie.contains("Max-Age=60")));

	let cookie_header = set_cookies
		.iter()
		.filter_map(|cookie| cookie.split(';').next())
		.collect::<Vec<_>>()
		.join("; ");

	assert!(cookie_header.contains(PAYLOAD_COOKIE));
	assert!(cookie_header.contains(ATTRIBUTES_COOKIE));

	let response =
		app.oneshot(request("/profile", Some(&cookie_header))).await.expect("Router should respond.");

	assert_eq!(response.status(), StatusCode::OK);

	let body = json(response).await;

	assert_eq!(body["fname"], "Ada");
	assert_eq!(body["email"], "a@b.com");
	assert_eq!(body["uuid"], "u-1");
	assert_eq!(body["lname"], serde_json::Value::Null);
	assert_eq!(body["attributes"]["fname"], "Ada");
	assert!(body["payload"].as_str().is_some_and(|payload| payload.contains("attributes")));
}

#[tokio::test]
async fn expired_or_partial_sessions_redirect_home() {
	let server = MockServer::start_async().await;
	let stale = Session::issue(
		IdentityRecord::new(
			RawPayload::Opaque("token".into()),
			[("email", "a@b.com")].into_iter().collect(),
		),
		OffsetDateTime::now_utc() - Duration::seconds(61),
	);
	let (payload, attributes) = cookies::encode_session(&stale).expect("Session should encode.");

	for cookie in [
		format!("{PAYLOAD_COOKIE}={payload}; {ATTRIBUTES_COOKIE}={attributes}"),
		format!("{ATTRIBUTES_COOKIE}={attributes}"),
	] {
		let response = app(&server)
			.oneshot(request("/profile", Some(&cookie)))
			.await
			.expect("Router should respond.");

		assert_eq!(response.status(), StatusCode::FOUND);
		assert_eq!(location(&response), "/");
	}
}

#[tokio::test]
async fn policy_listing_and_landing() {
	let server = MockServer::start_async().await;
	let catalog = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/public/v3/policies.json");
			then.status(200).body(r#"[{"handle":"loa3","name":"LOA3"},{"handle":"teacher"}]"#);
		})
		.await;
	let app = app(&server);
	let landing = json(
		app.clone()
			.oneshot(request("/idme/sandbox", None))
			.await
			.expect("Router should respond."),
	)
	.await;

	assert_eq!(landing["protocols"], serde_json::json!(["oauth", "oidc", "saml"]));
	assert_eq!(landing["production"], false);
	assert_eq!(catalog.hits_async().await, 0);

	let listing = json(
		app.oneshot(request("/idme/sandbox/saml", None)).await.expect("Router should respond."),
	)
	.await;

	assert_eq!(listing["protocol"], "saml");
	assert_eq!(listing["policies"][0]["handle"], "loa3");
	assert_eq!(listing["policies"][1]["name"], "teacher");
	assert_eq!(catalog.hits_async().await, 1);
}
