//! Broker-level error types shared across flows, transports, and the web surface.

// self
use crate::{_prelude::*, protocol::Protocol};

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Unknown environment, protocol, or policy.
	#[error(transparent)]
	Validation(#[from] ValidationError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Provider answered, but not with something usable.
	#[error(transparent)]
	Upstream(#[from] UpstreamError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// OAuth/OIDC callback arrived without an authorization code.
	#[error("Authorization code not provided.")]
	MissingAuthorizationCode,
	/// SAML callback arrived without a `SAMLResponse` form field.
	#[error("SAML response not provided.")]
	MissingSamlResponse,
	/// Scheme or host of the inbound request cannot form a callback URI.
	#[error("Caller origin `{origin}` cannot form a callback URI.")]
	InvalidCallerOrigin {
		/// Origin as received.
		origin: String,
	},
}
impl Error {
	/// Classifies the error for the response-mapping layer.
	pub fn kind(&self) -> FailureKind {
		match self {
			Self::Validation(_) => FailureKind::Validation,
			Self::MissingAuthorizationCode
			| Self::MissingSamlResponse
			| Self::InvalidCallerOrigin { .. } => FailureKind::ClientInput,
			Self::Transport(_) => FailureKind::UpstreamUnavailable,
			Self::Upstream(inner) => inner.kind(),
			Self::Config(_) => FailureKind::Internal,
		}
	}
}

/// Failure categories surfaced to callers; each maps to exactly one response class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureKind {
	/// Unknown environment/protocol/policy; answered as not-found.
	Validation,
	/// Caller omitted required callback input; answered as bad-request.
	ClientInput,
	/// Provider unreachable or returned a non-success status.
	UpstreamUnavailable,
	/// Provider returned a body that could not be interpreted.
	MalformedResponse,
	/// Local misconfiguration.
	Internal,
}
impl FailureKind {
	/// Returns a stable label suitable for log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FailureKind::Validation => "validation",
			FailureKind::ClientInput => "client_input",
			FailureKind::UpstreamUnavailable => "upstream_unavailable",
			FailureKind::MalformedResponse => "malformed_response",
			FailureKind::Internal => "internal",
		}
	}
}
impl Display for FailureKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Request parameters that failed registry or catalog validation.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ValidationError {
	/// Environment key is not registered.
	#[error("Failed to find environment `{key}`.")]
	UnknownEnvironment {
		/// Key supplied by the caller.
		key: String,
	},
	/// Protocol token is not one of `oauth`, `oidc`, `saml`.
	#[error("Failed to find protocol `{token}`.")]
	UnknownProtocol {
		/// Token supplied by the caller.
		token: String,
	},
	/// Policy handle is not offered by the provider for this environment.
	#[error("Failed to find policy `{handle}`.")]
	UnknownPolicy {
		/// Handle supplied by the caller.
		handle: String,
	},
	/// Callback arrived over a binding the protocol never uses.
	#[error("The {protocol} protocol does not accept callbacks over {binding}.")]
	UnsupportedBinding {
		/// Protocol named in the callback path.
		protocol: Protocol,
		/// Binding label (`redirect` or `post`).
		binding: &'static str,
	},
}

/// Configuration and construction failures raised by the broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A provider endpoint could not be derived from the configured domain.
	#[error("Provider endpoint `{endpoint}` is invalid.")]
	InvalidEndpoint {
		/// Endpoint label.
		endpoint: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Callback URI cannot be built from the caller origin.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Environment definition is unusable.
	#[error("Environment `{key}` is invalid: {reason}.")]
	InvalidEnvironment {
		/// Environment key.
		key: String,
		/// Human-readable reason.
		reason: &'static str,
	},
	/// Registry was built without any environment.
	#[error("At least one environment must be configured.")]
	NoEnvironments,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Provider answered, but the response cannot complete the flow.
#[derive(Debug, ThisError)]
pub enum UpstreamError {
	/// Provider returned a non-success HTTP status.
	#[error("The {endpoint} endpoint returned HTTP {status}.")]
	Status {
		/// Endpoint label.
		endpoint: &'static str,
		/// HTTP status code.
		status: u16,
	},
	/// Token endpoint rejected the exchange with an OAuth error body.
	#[error("Token endpoint returned an OAuth error: {error}.")]
	TokenRejected {
		/// OAuth `error` code.
		error: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Provider responded with JSON that does not match the expected shape.
	#[error("The {endpoint} endpoint returned malformed JSON.")]
	MalformedJson {
		/// Endpoint label.
		endpoint: &'static str,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Token endpoint response could not be parsed by the OAuth client.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	MalformedTokenResponse {
		/// Summary of the parsing failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Userinfo body is not a decodable JWT.
	#[error("Userinfo endpoint returned an undecodable token.")]
	MalformedIdToken(#[source] jsonwebtoken::errors::Error),
	/// Userinfo claims are not a JSON object.
	#[error("Userinfo token claims are not an object.")]
	ClaimsNotObject,
	/// Provider body is not UTF-8 text where text is required.
	#[error("The {endpoint} endpoint returned a non-UTF-8 body.")]
	NonUtf8Body {
		/// Endpoint label.
		endpoint: &'static str,
	},
	/// SAMLResponse field is not valid base64.
	#[error("SAML response is not valid base64.")]
	SamlEncoding(#[source] base64::DecodeError),
	/// SAMLResponse document could not be parsed.
	#[error("SAML response could not be parsed: {message}.")]
	MalformedSamlResponse {
		/// Parser message.
		message: String,
	},
}
impl UpstreamError {
	/// Classifies the upstream failure.
	pub fn kind(&self) -> FailureKind {
		match self {
			Self::Status { .. } | Self::TokenRejected { .. } => FailureKind::UpstreamUnavailable,
			_ => FailureKind::MalformedResponse,
		}
	}
}

/// Transport-level failures (network, IO, timeouts).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the {endpoint} endpoint.")]
	Network {
		/// Endpoint label.
		endpoint: &'static str,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Request exceeded the configured timeout.
	#[error("Request to the {endpoint} endpoint timed out.")]
	Timeout {
		/// Endpoint label.
		endpoint: &'static str,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling a provider endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		endpoint: &'static str,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { endpoint, source: Box::new(src) }
	}
}
