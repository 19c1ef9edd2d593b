//! Axum front end for the broker.
//!
//! Routes map one-to-one onto broker operations. Failures are translated by
//! [`FailureKind`] alone: validation answers 404, client input answers 400, everything
//! else answers a generic 500 whose detail stays in the server log.

pub mod cookies;
pub mod handlers;

// crates.io
use axum::{
	Router,
	http::{HeaderMap, StatusCode, header},
	response::{IntoResponse, Response},
	routing::get,
};
use tokio::net::TcpListener;
use tower_cookies::CookieManagerLayer;
// self
use crate::{
	_prelude::*,
	error::FailureKind,
	flows::{CallerOrigin, ReqwestBroker},
};

/// Body returned for every upstream or internal failure.
pub const GENERIC_ERROR: &str = "An error occurred";

/// Shared handler state.
#[derive(Clone, Debug)]
pub struct AppState {
	/// Broker serving every route.
	pub broker: ReqwestBroker,
	/// Scheme used for callback URIs when the request carries no `X-Forwarded-Proto`.
	pub public_scheme: Arc<str>,
}
impl AppState {
	/// Creates state for `broker`.
	pub fn new(broker: ReqwestBroker, public_scheme: impl Into<Arc<str>>) -> Self {
		Self { broker, public_scheme: public_scheme.into() }
	}

	/// Derives the caller origin from `Host` and `X-Forwarded-Proto`.
	pub fn caller_origin(&self, headers: &HeaderMap) -> Result<CallerOrigin> {
		let scheme = headers
			.get("x-forwarded-proto")
			.and_then(|value| value.to_str().ok())
			.and_then(|value| value.split(',').next())
			.map(str::trim)
			.filter(|value| !value.is_empty())
			.unwrap_or(&*self.public_scheme);
		let host = headers.get(header::HOST).and_then(|value| value.to_str().ok()).unwrap_or_default();

		CallerOrigin::new(scheme, host)
	}
}

/// Error returned by route handlers.
#[derive(Debug, ThisError)]
pub enum WebError {
	/// Broker operation failed.
	#[error(transparent)]
	Broker(#[from] Error),
	/// Session could not be written to the cookie transport.
	#[error(transparent)]
	Session(#[from] cookies::CookieError),
}
impl IntoResponse for WebError {
	fn into_response(self) -> Response {
		match self {
			WebError::Broker(err) => match err.kind() {
				FailureKind::Validation => (StatusCode::NOT_FOUND, err.to_string()).into_response(),
				FailureKind::ClientInput => (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
				FailureKind::UpstreamUnavailable
				| FailureKind::MalformedResponse
				| FailureKind::Internal =>
					(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_ERROR).into_response(),
			},
			WebError::Session(err) => {
				tracing::error!(error = %err, "Failed to write session cookies.");

				(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_ERROR).into_response()
			},
		}
	}
}

/// Builds the router for every broker route.
pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/", get(handlers::index))
		.route("/idme/{env}", get(handlers::landing))
		.route("/idme/{env}/{protocol}", get(handlers::policies))
		.route("/idme/{env}/{protocol}/{policy}", get(handlers::authorize))
		.route(
			"/callback/{env}/{protocol}",
			get(handlers::code_callback).post(handlers::saml_callback),
		)
		.route("/profile", get(handlers::profile))
		.layer(CookieManagerLayer::new())
		.with_state(state)
}

/// Serves `router` until Ctrl-C.
pub async fn serve(listener: TcpListener, router: Router) -> std::io::Result<()> {
	axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await
}

async fn shutdown_signal() {
	if let Err(err) = tokio::signal::ctrl_c().await {
		tracing::error!(error = %err, "Failed to listen for the shutdown signal.");
	}

	tracing::info!("Shutting down.");
}
