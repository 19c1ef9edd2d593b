//! Federation protocols supported by the broker.

// self
use crate::{_prelude::*, error::ValidationError};

/// Federation protocol spoken with the identity provider.
///
/// Parsing is exhaustive: anything other than `oauth`, `oidc`, or `saml` is rejected
/// rather than coerced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
	/// OAuth 2.0 authorization-code flow with the flat attributes resource.
	OAuth,
	/// OpenID Connect on top of the authorization-code flow.
	Oidc,
	/// SAML 2.0 browser SSO with a POSTed assertion.
	Saml,
}
impl Protocol {
	/// Every protocol in display order.
	pub const ALL: [Protocol; 3] = [Protocol::OAuth, Protocol::Oidc, Protocol::Saml];

	/// Returns the path token used in routes and callback URIs.
	pub const fn as_str(self) -> &'static str {
		match self {
			Protocol::OAuth => "oauth",
			Protocol::Oidc => "oidc",
			Protocol::Saml => "saml",
		}
	}

	/// Returns true when the provider delivers an authorization code by redirect.
	pub const fn uses_authorization_code(self) -> bool {
		matches!(self, Protocol::OAuth | Protocol::Oidc)
	}
}
impl Display for Protocol {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for Protocol {
	type Err = ValidationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"oauth" => Ok(Protocol::OAuth),
			"oidc" => Ok(Protocol::Oidc),
			"saml" => Ok(Protocol::Saml),
			other => Err(ValidationError::UnknownProtocol { token: other.to_owned() }),
		}
	}
}
