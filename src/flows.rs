//! High-level flow orchestrators powered by the broker facade.

pub mod authorize;
pub mod callback;
pub mod catalog;

pub use authorize::*;
pub use callback::*;
pub use catalog::*;

// self
use crate::{
	_prelude::*,
	environment::{Environment, EnvironmentRegistry},
	http::ProviderHttpClient,
	oauth::{ProviderFacade, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome},
};
#[cfg(feature = "reqwest")]
use crate::{error::ConfigError, http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

/// Relying-party identifier sent as `EntityID` when no other value is configured.
pub const DEFAULT_SAML_ENTITY_ID: &str = "federation-broker";
/// Fixed provider sub-domain serving the reserved `groups` flow.
pub const DEFAULT_GROUPS_ENDPOINT: &str = "https://groups.id.me/";

#[cfg(feature = "reqwest")]
/// Broker specialized for the crate's default reqwest transport stack.
pub type ReqwestBroker = Broker<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Deployment-wide settings shared by every environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokerSettings {
	/// Relying-party identifier placed in SAML requests.
	pub saml_entity_id: String,
	/// Endpoint for the reserved `groups` policy.
	pub groups_endpoint: Url,
	/// Upper bound on each provider call.
	pub http_timeout: std::time::Duration,
}
impl BrokerSettings {
	/// Creates settings with the default HTTP timeout.
	pub fn new(saml_entity_id: impl Into<String>, groups_endpoint: Url) -> Self {
		Self {
			saml_entity_id: saml_entity_id.into(),
			groups_endpoint,
			http_timeout: crate::http::DEFAULT_TIMEOUT,
		}
	}

	/// Overrides the provider call timeout.
	pub fn with_http_timeout(mut self, timeout: std::time::Duration) -> Self {
		self.http_timeout = timeout;

		self
	}
}

/// Coordinates the federation flows against every configured environment.
///
/// The broker owns the HTTP client, the immutable environment registry, and the
/// deployment settings. It keeps no per-user state: the authorization leg and the
/// callback leg only share what the browser carries between them, so any instance can
/// serve either leg.
pub struct Broker<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every outbound provider request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Environments loaded at startup.
	pub registry: Arc<EnvironmentRegistry>,
	/// Deployment-wide settings.
	pub settings: Arc<BrokerSettings>,
}
impl<C, M> Broker<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a broker that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		registry: impl Into<Arc<EnvironmentRegistry>>,
		settings: BrokerSettings,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			registry: registry.into(),
			settings: Arc::new(settings),
		}
	}

	/// Looks up an environment; unknown keys fail closed.
	pub fn environment(&self, key: &str) -> Result<&Environment> {
		Ok(self.registry.get(key)?)
	}

	pub(crate) fn facade<'a>(&'a self, environment: &'a Environment) -> ProviderFacade<'a, C, M> {
		ProviderFacade::new(environment, self.http_client.as_ref(), self.transport_mapper.as_ref())
	}
}
#[cfg(feature = "reqwest")]
impl Broker<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a broker with its own reqwest transport bounded by the configured timeout.
	pub fn new(registry: EnvironmentRegistry, settings: BrokerSettings) -> Result<Self, ConfigError> {
		let http_client = ReqwestHttpClient::new(settings.http_timeout)?;

		Ok(Self::with_http_client(registry, settings, http_client, ReqwestTransportErrorMapper))
	}
}
impl<C, M> Clone for Broker<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			http_client: Arc::clone(&self.http_client),
			transport_mapper: Arc::clone(&self.transport_mapper),
			registry: Arc::clone(&self.registry),
			settings: Arc::clone(&self.settings),
		}
	}
}
impl<C, M> Debug for Broker<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Broker")
			.field("environments", &self.registry.keys().collect::<Vec<_>>())
			.field("settings", &self.settings)
			.finish()
	}
}

fn finish<T>(kind: FlowKind, result: Result<T>) -> Result<T> {
	match &result {
		Ok(_) => obs::record_flow_outcome(kind, FlowOutcome::Success),
		Err(err) => {
			obs::log_flow_failure(kind, err);
			obs::record_flow_outcome(kind, FlowOutcome::Failure);
		},
	}

	result
}
