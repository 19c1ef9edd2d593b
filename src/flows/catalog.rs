//! Policy catalog reads and request validation.
//!
//! The catalog is fetched fresh on every call. Environment and protocol checks run first
//! against static sets so an invalid request never reaches the network.

// self
use crate::{
	_prelude::*,
	environment::Environment,
	error::ValidationError,
	flows::Broker,
	http::ProviderHttpClient,
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	policy::{self, Policy, PolicySelection},
	protocol::Protocol,
};

/// Environment + protocol pair that passed static validation.
#[derive(Clone, Copy, Debug)]
pub struct ValidatedTarget<'a> {
	/// Registered environment.
	pub environment: &'a Environment,
	/// Parsed protocol.
	pub protocol: Protocol,
}

/// Fully validated authorization target.
#[derive(Clone, Debug)]
pub struct ValidatedRequest<'a> {
	/// Registered environment.
	pub environment: &'a Environment,
	/// Parsed protocol.
	pub protocol: Protocol,
	/// Catalog policy or the reserved `groups` flow.
	pub policy: PolicySelection,
}

impl<C, M> Broker<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Validates the environment key and protocol token without touching the network.
	pub fn validate_target<'a>(
		&'a self,
		environment: &str,
		protocol: &str,
	) -> Result<ValidatedTarget<'a>> {
		let environment = self.environment(environment)?;
		let protocol = protocol.parse::<Protocol>()?;

		Ok(ValidatedTarget { environment, protocol })
	}

	/// Fetches the provider's policy catalog for `environment`.
	pub async fn fetch_policies(&self, environment: &str) -> Result<Vec<Policy>> {
		const KIND: FlowKind = FlowKind::PolicyCatalog;

		let environment = self.environment(environment)?;
		let span = FlowSpan::new(KIND, "fetch_policies", environment.key.as_ref());

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let body = self.facade(environment).fetch_policies().await?;

				Ok(policy::parse_catalog(&body)?)
			})
			.await;

		super::finish(KIND, result)
	}

	/// Validates environment, protocol, and policy in that order.
	///
	/// The reserved `groups` token is accepted without consulting the catalog. Any other
	/// handle must appear in a freshly fetched catalog.
	pub async fn validate_request<'a>(
		&'a self,
		environment: &str,
		protocol: &str,
		policy: &str,
	) -> Result<ValidatedRequest<'a>> {
		let ValidatedTarget { environment, protocol } = self.validate_target(environment, protocol)?;

		if policy::is_reserved(policy) {
			return Ok(ValidatedRequest { environment, protocol, policy: PolicySelection::Groups });
		}

		let found = self
			.fetch_policies(environment.key.as_ref())
			.await?
			.into_iter()
			.find(|candidate| candidate.handle.as_ref() == policy)
			.ok_or_else(|| ValidationError::UnknownPolicy { handle: policy.to_owned() })?;

		Ok(ValidatedRequest { environment, protocol, policy: PolicySelection::Catalog(found) })
	}
}
