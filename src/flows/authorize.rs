//! Authorization request construction for the three protocols.
//!
//! Nothing here is persisted: the callback leg rebuilds the same `redirect_uri` from the
//! inbound request, so the two legs may be served by different instances.

// crates.io
use oauth2::http::Method;
// self
use crate::{
	_prelude::*,
	environment::ProviderEndpoint,
	flows::{Broker, BrokerSettings, ValidatedRequest},
	http::ProviderHttpClient,
	id::EnvironmentKey,
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	policy::{GROUP_SCOPES, PolicySelection},
	protocol::Protocol,
};

/// Name-ID format requested from the SAML provider.
pub const NAME_ID_POLICY: &str = "urn:oasis:names:tc:SAML:1.1:nameid-format:unspecified";

/// Scheme and host the browser used to reach the broker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallerOrigin {
	scheme: String,
	host: String,
}
impl CallerOrigin {
	/// Accepts `http` or `https` and a non-empty host (optionally with a port).
	pub fn new(scheme: impl Into<String>, host: impl Into<String>) -> Result<Self> {
		let scheme = scheme.into().to_ascii_lowercase();
		let host = host.into();
		let valid_scheme = scheme == "http" || scheme == "https";
		let valid_host = !host.is_empty()
			&& !host.contains(['/', '?', '#', '@'])
			&& !host.chars().any(char::is_whitespace);

		if !valid_scheme || !valid_host {
			return Err(Error::InvalidCallerOrigin { origin: format!("{scheme}://{host}") });
		}

		Ok(Self { scheme, host })
	}

	/// URL scheme.
	pub fn scheme(&self) -> &str {
		&self.scheme
	}

	/// Host, including the port when one was supplied.
	pub fn host(&self) -> &str {
		&self.host
	}

	/// Callback destination `{scheme}://{host}/callback/{env}/{protocol}`.
	///
	/// Both legs call this with the same inputs so the `redirect_uri` matches exactly.
	pub fn callback_uri(&self, environment: &EnvironmentKey, protocol: Protocol) -> Result<Url> {
		let raw = format!("{}://{}/callback/{environment}/{protocol}", self.scheme, self.host);

		Url::parse(&raw).map_err(|_| Error::InvalidCallerOrigin {
			origin: format!("{}://{}", self.scheme, self.host),
		})
	}
}

/// Optional passthrough parameters from the inbound request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct AuthorizationParams {
	/// Opaque correlation state.
	#[serde(default)]
	pub state: Option<String>,
	/// Opaque external identifier.
	#[serde(default)]
	pub eid: Option<String>,
	/// Group-scope override.
	#[serde(default)]
	pub groups: Option<String>,
}
impl AuthorizationParams {
	/// Present, non-empty parameters in emission order.
	fn passthrough(&self) -> impl Iterator<Item = (&'static str, &str)> {
		[("state", &self.state), ("eid", &self.eid), ("groups", &self.groups)]
			.into_iter()
			.filter_map(|(name, value)| {
				value.as_deref().filter(|value| !value.is_empty()).map(|value| (name, value))
			})
	}
}

/// Redirect the browser must follow to reach the provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationRequest {
	/// Fully composed provider URL.
	pub target_url: Url,
	/// HTTP method of the redirect; always `GET`.
	pub method: Method,
	/// Passthrough `state`.
	pub correlation_state: Option<String>,
	/// Passthrough `eid`.
	pub external_id: Option<String>,
	/// Scope, `AuthnContext`, or group list sent to the provider.
	pub requested_scope: String,
}

impl<C, M> Broker<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Validates the target and composes the provider redirect.
	pub async fn authorize(
		&self,
		environment: &str,
		protocol: &str,
		policy: &str,
		params: &AuthorizationParams,
		origin: &CallerOrigin,
	) -> Result<AuthorizationRequest> {
		const KIND: FlowKind = FlowKind::Authorize;

		let span = FlowSpan::new(KIND, "authorize", environment);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let validated = self.validate_request(environment, protocol, policy).await?;

				build_authorization_request(&self.settings, &validated, params, origin)
			})
			.await;

		super::finish(KIND, result)
	}
}

/// Scope requested for `policy`; OIDC adds the `openid` term.
pub fn requested_scope(protocol: Protocol, policy: &str) -> String {
	match protocol {
		Protocol::Oidc => format!("{policy} openid"),
		Protocol::OAuth | Protocol::Saml => policy.to_owned(),
	}
}

/// Composes the provider redirect for an already validated request.
pub fn build_authorization_request(
	settings: &BrokerSettings,
	request: &ValidatedRequest<'_>,
	params: &AuthorizationParams,
	origin: &CallerOrigin,
) -> Result<AuthorizationRequest> {
	let ValidatedRequest { environment, protocol, policy } = request;
	let protocol = *protocol;
	let scope = requested_scope(protocol, policy.handle());
	let (mut target_url, requested_scope) = match (protocol, policy) {
		(Protocol::Saml, _) => {
			let mut url = environment.endpoint(ProviderEndpoint::SamlSso)?;

			url.query_pairs_mut()
				.append_pair("EntityID", &settings.saml_entity_id)
				.append_pair("AuthnContext", &scope)
				.append_pair("NameIDPolicy", NAME_ID_POLICY);

			(url, scope)
		},
		(Protocol::OAuth | Protocol::Oidc, PolicySelection::Groups) => {
			let redirect_uri = origin.callback_uri(&environment.key, protocol)?;
			let groups = GROUP_SCOPES.join(",");
			let sandbox = if environment.is_production() { "false" } else { "true" };
			let mut url = settings.groups_endpoint.clone();

			url.query_pairs_mut()
				.append_pair("client_id", &environment.client_id)
				.append_pair("redirect_uri", redirect_uri.as_str())
				.append_pair("response_type", "code")
				.append_pair("scopes", &groups)
				.append_pair("sandbox", sandbox);

			(url, groups)
		},
		(Protocol::OAuth | Protocol::Oidc, PolicySelection::Catalog(_)) => {
			let redirect_uri = origin.callback_uri(&environment.key, protocol)?;
			let mut url = environment.endpoint(ProviderEndpoint::Authorize)?;

			url.query_pairs_mut()
				.append_pair("client_id", &environment.client_id)
				.append_pair("redirect_uri", redirect_uri.as_str())
				.append_pair("response_type", "code")
				.append_pair("scope", &scope);

			(url, scope)
		},
	};

	{
		let mut query = target_url.query_pairs_mut();

		for (name, value) in params.passthrough() {
			query.append_pair(name, value);
		}
	}

	Ok(AuthorizationRequest {
		target_url,
		method: Method::GET,
		correlation_state: params.state.clone().filter(|value| !value.is_empty()),
		external_id: params.eid.clone().filter(|value| !value.is_empty()),
		requested_scope,
	})
}
