// self
use crate::{_prelude::*, error::Error, obs::FlowKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by broker flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the flow kind, stage, and environment key.
	pub fn new(kind: FlowKind, stage: &'static str, environment: &str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"federation_broker.flow",
				flow = kind.as_str(),
				stage,
				environment
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage, environment);

			Self {}
		}
	}

	/// Runs synchronous work inside the span.
	pub fn in_scope<F, T>(&self, f: F) -> T
	where
		F: FnOnce() -> T,
	{
		#[cfg(feature = "tracing")]
		{
			self.span.in_scope(f)
		}
		#[cfg(not(feature = "tracing"))]
		{
			f()
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Logs a failed flow server-side; the message never includes secrets or payloads.
pub fn log_flow_failure(kind: FlowKind, err: &Error) {
	#[cfg(feature = "tracing")]
	{
		match err.kind() {
			crate::error::FailureKind::Validation | crate::error::FailureKind::ClientInput =>
				tracing::debug!(flow = kind.as_str(), failure = %err.kind(), error = %err, "Flow rejected."),
			_ => tracing::warn!(flow = kind.as_str(), failure = %err.kind(), error = %err, "Flow failed."),
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, err);
	}
}
