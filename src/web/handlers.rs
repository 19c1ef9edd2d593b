//! Route handlers.

// crates.io
use axum::{
	Form, Json,
	extract::{Path, Query, State, rejection::FormRejection},
	http::{HeaderMap, StatusCode, header},
	response::{IntoResponse, Response},
};
use serde_json::{Map, Value, json};
use tower_cookies::Cookies;
// self
use crate::{
	_prelude::*,
	flows::{AuthorizationParams, CallbackOutcome, CallbackResult},
	identity::WELL_KNOWN_ATTRIBUTES,
	protocol::Protocol,
	session::{self, SessionRead},
	web::{AppState, WebError, cookies},
};

/// Query string of the redirect-binding callback.
#[derive(Debug, Deserialize)]
pub struct CodeQuery {
	/// Authorization code.
	#[serde(default)]
	pub code: Option<String>,
}

/// Form body of the POST-binding callback.
#[derive(Debug, Deserialize)]
pub struct SamlForm {
	/// Base64 SAML response document.
	#[serde(default, rename = "SAMLResponse")]
	pub saml_response: Option<String>,
}

/// `GET /`: lists the configured environments.
pub async fn index(State(state): State<AppState>) -> Json<Value> {
	let environments: Vec<&str> = state.broker.registry.keys().map(AsRef::as_ref).collect();

	Json(json!({ "environments": environments }))
}

/// `GET /idme/{env}`: environment landing with the available protocols.
pub async fn landing(
	State(state): State<AppState>,
	Path(env): Path<String>,
) -> Result<Json<Value>, WebError> {
	let environment = state.broker.environment(&env)?;
	let protocols: Vec<&str> = Protocol::ALL.iter().map(|protocol| protocol.as_str()).collect();

	Ok(Json(json!({
		"environment": environment.key.as_ref(),
		"production": environment.is_production(),
		"protocols": protocols,
	})))
}

/// `GET /idme/{env}/{protocol}`: policies offered for the pair.
pub async fn policies(
	State(state): State<AppState>,
	Path((env, protocol)): Path<(String, String)>,
) -> Result<Json<Value>, WebError> {
	let target = state.broker.validate_target(&env, &protocol)?;
	let policies = state.broker.fetch_policies(&env).await?;
	let policies: Vec<Value> = policies
		.iter()
		.map(|policy| json!({ "handle": policy.handle.as_ref(), "name": policy.display_name }))
		.collect();

	Ok(Json(json!({
		"environment": target.environment.key.as_ref(),
		"protocol": target.protocol.as_str(),
		"policies": policies,
	})))
}

/// `GET /idme/{env}/{protocol}/{policy}`: redirects the browser to the provider.
pub async fn authorize(
	State(state): State<AppState>,
	Path((env, protocol, policy)): Path<(String, String, String)>,
	Query(params): Query<AuthorizationParams>,
	headers: HeaderMap,
) -> Result<Response, WebError> {
	// Validation runs before the origin check so unknown targets answer 404.
	state.broker.validate_target(&env, &protocol)?;

	let origin = state.caller_origin(&headers)?;
	let request = state.broker.authorize(&env, &protocol, &policy, &params, &origin).await?;

	Ok(found(request.target_url.as_str()))
}

/// `GET /callback/{env}/{protocol}`: OAuth/OIDC callback.
pub async fn code_callback(
	State(state): State<AppState>,
	Path((env, protocol)): Path<(String, String)>,
	Query(query): Query<CodeQuery>,
	headers: HeaderMap,
	jar: Cookies,
) -> Result<Response, WebError> {
	state.broker.validate_target(&env, &protocol)?;

	let origin = state.caller_origin(&headers)?;
	let outcome = state
		.broker
		.complete_callback(&env, &protocol, CallbackResult::AuthorizationCode(query.code), &origin)
		.await?;

	finish_callback(&jar, outcome)
}

/// `POST /callback/{env}/{protocol}`: SAML callback.
///
/// The body is inspected only after the path validates; an unreadable form reads as a
/// missing `SAMLResponse`.
pub async fn saml_callback(
	State(state): State<AppState>,
	Path((env, protocol)): Path<(String, String)>,
	headers: HeaderMap,
	jar: Cookies,
	form: Result<Form<SamlForm>, FormRejection>,
) -> Result<Response, WebError> {
	state.broker.validate_target(&env, &protocol)?;

	let origin = state.caller_origin(&headers)?;
	let document = form.ok().and_then(|Form(form)| form.saml_response);
	let outcome = state
		.broker
		.complete_callback(&env, &protocol, CallbackResult::SamlAssertion(document), &origin)
		.await?;

	finish_callback(&jar, outcome)
}

/// `GET /profile`: current identity, or a redirect home when no live session exists.
pub async fn profile(jar: Cookies) -> Response {
	let read = session::read_session(cookies::read_session(&jar), OffsetDateTime::now_utc());
	let SessionRead::Authenticated { attributes, raw_payload } = read else {
		return found("/");
	};
	let mut body = Map::new();

	for name in WELL_KNOWN_ATTRIBUTES {
		body.insert(name.into(), attributes.get(name).map_or(Value::Null, |value| value.into()));
	}

	body.insert(
		"attributes".into(),
		Value::Object(
			attributes.iter().map(|(name, value)| (name.to_owned(), Value::from(value))).collect(),
		),
	);
	body.insert("payload".into(), Value::String(raw_payload.render()));

	Json(Value::Object(body)).into_response()
}

fn finish_callback(jar: &Cookies, outcome: CallbackOutcome) -> Result<Response, WebError> {
	match outcome {
		CallbackOutcome::Authenticated(session) => {
			cookies::write_session(jar, &session)?;

			Ok(found("/profile"))
		},
		CallbackOutcome::Restart => Ok(found("/")),
	}
}

fn found(location: &str) -> Response {
	(StatusCode::FOUND, [(header::LOCATION, location.to_owned())]).into_response()
}
