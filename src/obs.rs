//! Optional observability helpers for broker flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `federation_broker.flow` with the `flow`
//!   and `stage` fields, plus warn-level events for upstream failures.
//! - Enable `metrics` to increment the `federation_broker_flow_total` counter for every
//!   attempt/success/failure/abandon, labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Flow kinds observed by the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Policy catalog reads (listing or validation).
	PolicyCatalog,
	/// Authorization request construction.
	Authorize,
	/// OAuth/OIDC code callback.
	CodeCallback,
	/// SAML assertion callback.
	SamlCallback,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::PolicyCatalog => "policy_catalog",
			FlowKind::Authorize => "authorize",
			FlowKind::CodeCallback => "code_callback",
			FlowKind::SamlCallback => "saml_callback",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a broker helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
	/// Flow abandoned without error (SAML response lacking an assertion).
	Abandoned,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
			FlowOutcome::Abandoned => "abandoned",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
