//! Static registry of provider environments.
//!
//! Each environment binds a key (`prod`, `sandbox`, ...) to the provider's base domain and
//! the relying party's client credentials. The registry is built once at startup and is
//! read-only afterwards; lookups fail closed.

// self
use crate::{
	_prelude::*,
	error::{ConfigError, ValidationError},
	id::EnvironmentKey,
	secret::Secret,
};

/// Key conventionally used for the production environment.
pub const PRODUCTION_KEY: &str = "prod";

/// Provider endpoints derived from an environment's base domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProviderEndpoint {
	/// OAuth/OIDC authorize endpoint.
	Authorize,
	/// Token endpoint for the authorization-code exchange.
	Token,
	/// SAML single sign-on endpoint.
	SamlSso,
	/// Policy catalog resource.
	Policies,
	/// OIDC userinfo resource (returns a JWT).
	UserInfo,
	/// OAuth attributes resource (returns a handle/value list).
	Attributes,
}
impl ProviderEndpoint {
	/// Path appended to the provider domain.
	pub const fn path(self) -> &'static str {
		match self {
			ProviderEndpoint::Authorize => "/oauth/authorize",
			ProviderEndpoint::Token => "/oauth/token",
			ProviderEndpoint::SamlSso => "/saml/SingleSignOnService",
			ProviderEndpoint::Policies => "/api/public/v3/policies.json",
			ProviderEndpoint::UserInfo => "/api/public/v3/userinfo.json",
			ProviderEndpoint::Attributes => "/api/public/v3/attributes.json",
		}
	}

	/// Returns a stable label for logs and error messages.
	pub const fn as_str(self) -> &'static str {
		match self {
			ProviderEndpoint::Authorize => "authorize",
			ProviderEndpoint::Token => "token",
			ProviderEndpoint::SamlSso => "saml_sso",
			ProviderEndpoint::Policies => "policies",
			ProviderEndpoint::UserInfo => "userinfo",
			ProviderEndpoint::Attributes => "attributes",
		}
	}
}
impl Display for ProviderEndpoint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// One provider environment with the relying party's credentials.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Environment {
	/// Registry key.
	pub key: EnvironmentKey,
	/// Provider base domain, e.g. `https://api.id.me`.
	pub provider_domain: Url,
	/// OAuth client identifier registered with the provider.
	pub client_id: String,
	/// OAuth client secret registered with the provider.
	pub client_secret: Secret,
	production: bool,
}
impl Environment {
	/// Creates an environment; the production flag defaults to `key == "prod"`.
	pub fn new(
		key: EnvironmentKey,
		provider_domain: Url,
		client_id: impl Into<String>,
		client_secret: Secret,
	) -> Result<Self, ConfigError> {
		let client_id = client_id.into();

		if provider_domain.host_str().is_none() || provider_domain.cannot_be_a_base() {
			return Err(ConfigError::InvalidEnvironment {
				key: key.to_string(),
				reason: "provider domain must be an absolute URL with a host",
			});
		}
		if client_id.is_empty() {
			return Err(ConfigError::InvalidEnvironment {
				key: key.to_string(),
				reason: "client_id cannot be empty",
			});
		}
		if client_secret.is_empty() {
			return Err(ConfigError::InvalidEnvironment {
				key: key.to_string(),
				reason: "client_secret cannot be empty",
			});
		}

		let production = key.as_ref() == PRODUCTION_KEY;

		Ok(Self { key, provider_domain, client_id, client_secret, production })
	}

	/// Overrides the production flag.
	pub fn with_production(mut self, production: bool) -> Self {
		self.production = production;

		self
	}

	/// Returns true for the production environment.
	pub fn is_production(&self) -> bool {
		self.production
	}

	/// Resolves a provider endpoint against the base domain.
	pub fn endpoint(&self, endpoint: ProviderEndpoint) -> Result<Url, ConfigError> {
		self.provider_domain
			.join(endpoint.path())
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: endpoint.as_str(), source })
	}
}

/// Immutable lookup table of environments.
#[derive(Clone, Debug, Default)]
pub struct EnvironmentRegistry {
	environments: BTreeMap<EnvironmentKey, Environment>,
}
impl EnvironmentRegistry {
	/// Builds a registry; duplicate keys and empty registries are rejected.
	pub fn new<I>(environments: I) -> Result<Self, ConfigError>
	where
		I: IntoIterator<Item = Environment>,
	{
		let mut map = BTreeMap::new();

		for environment in environments {
			let key = environment.key.clone();

			if map.insert(key.clone(), environment).is_some() {
				return Err(ConfigError::InvalidEnvironment {
					key: key.to_string(),
					reason: "key is defined more than once",
				});
			}
		}

		if map.is_empty() {
			return Err(ConfigError::NoEnvironments);
		}

		Ok(Self { environments: map })
	}

	/// Looks up an environment by its raw key; unknown keys are a validation failure.
	pub fn get(&self, key: &str) -> Result<&Environment, ValidationError> {
		self.environments
			.get(key)
			.ok_or_else(|| ValidationError::UnknownEnvironment { key: key.to_owned() })
	}

	/// Iterates registered keys in sorted order.
	pub fn keys(&self) -> impl Iterator<Item = &EnvironmentKey> {
		self.environments.keys()
	}

	/// Number of registered environments.
	pub fn len(&self) -> usize {
		self.environments.len()
	}

	/// Returns true when no environment is registered.
	pub fn is_empty(&self) -> bool {
		self.environments.is_empty()
	}
}
