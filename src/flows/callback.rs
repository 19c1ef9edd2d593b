//! Protocol-dispatching callback adapter.
//!
//! OAuth and OIDC complete over the redirect binding: the code is exchanged at the token
//! endpoint and the access token reads the attributes (OAuth) or userinfo (OIDC)
//! resource. SAML completes over the POST binding with an encoded response document. A SAML
//! response without an assertion abandons the flow instead of failing it.

// self
use crate::{
	_prelude::*,
	environment::ProviderEndpoint,
	error::ValidationError,
	flows::{Broker, CallerOrigin, ValidatedTarget},
	http::ProviderHttpClient,
	normalize::{self, SamlOutcome},
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	protocol::Protocol,
	session::Session,
};

/// Provider response as received by the callback route.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackResult {
	/// Redirect binding: query-string `code`.
	AuthorizationCode(Option<String>),
	/// POST binding: base64 `SAMLResponse` form field.
	SamlAssertion(Option<String>),
}
impl CallbackResult {
	fn binding(&self) -> &'static str {
		match self {
			CallbackResult::AuthorizationCode(_) => "redirect",
			CallbackResult::SamlAssertion(_) => "post",
		}
	}
}

/// How a callback ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackOutcome {
	/// Identity established; the session goes to the transport boundary.
	Authenticated(Session),
	/// SAML response without an assertion; send the user back to the start.
	Restart,
}

impl<C, M> Broker<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Completes a callback and issues a session on success.
	///
	/// Environment and protocol are validated before any provider call. The binding of
	/// `result` must match the protocol named in the path.
	pub async fn complete_callback(
		&self,
		environment: &str,
		protocol: &str,
		result: CallbackResult,
		origin: &CallerOrigin,
	) -> Result<CallbackOutcome> {
		let target = self.validate_target(environment, protocol)?;

		match (target.protocol, result) {
			(protocol, CallbackResult::AuthorizationCode(code))
				if protocol.uses_authorization_code() =>
				self.complete_code_callback(target, code, origin).await,
			(protocol, CallbackResult::SamlAssertion(document))
				if !protocol.uses_authorization_code() =>
				self.complete_saml_callback(target, document),
			(protocol, result) =>
				Err(ValidationError::UnsupportedBinding { protocol, binding: result.binding() }.into()),
		}
	}

	async fn complete_code_callback(
		&self,
		target: ValidatedTarget<'_>,
		code: Option<String>,
		origin: &CallerOrigin,
	) -> Result<CallbackOutcome> {
		const KIND: FlowKind = FlowKind::CodeCallback;

		let ValidatedTarget { environment, protocol } = target;
		let span = FlowSpan::new(KIND, "complete_code_callback", environment.key.as_ref());

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let code =
					code.filter(|code| !code.is_empty()).ok_or(Error::MissingAuthorizationCode)?;
				let redirect_uri = origin.callback_uri(&environment.key, protocol)?;
				let facade = self.facade(environment);
				let token = facade.exchange_authorization_code(&code, &redirect_uri).await?;
				let record = if protocol == Protocol::Oidc {
					let body = facade.fetch_resource(ProviderEndpoint::UserInfo, &token).await?;

					normalize::oidc_claims(&body)?
				} else {
					let body = facade.fetch_resource(ProviderEndpoint::Attributes, &token).await?;

					normalize::oauth_attributes(&body)?
				};

				Ok(CallbackOutcome::Authenticated(Session::issue(record, OffsetDateTime::now_utc())))
			})
			.await;

		super::finish(KIND, result)
	}

	fn complete_saml_callback(
		&self,
		target: ValidatedTarget<'_>,
		document: Option<String>,
	) -> Result<CallbackOutcome> {
		const KIND: FlowKind = FlowKind::SamlCallback;

		let span = FlowSpan::new(KIND, "complete_saml_callback", target.environment.key.as_ref());

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.in_scope(|| {
			let document = document
				.filter(|document| !document.trim().is_empty())
				.ok_or(Error::MissingSamlResponse)?;

			match normalize::saml_response(&document)? {
				SamlOutcome::Identity(record) => Ok(CallbackOutcome::Authenticated(Session::issue(
					record,
					OffsetDateTime::now_utc(),
				))),
				SamlOutcome::MissingAssertion => Ok(CallbackOutcome::Restart),
			}
		});

		if matches!(result, Ok(CallbackOutcome::Restart)) {
			obs::record_flow_outcome(KIND, FlowOutcome::Abandoned);

			return result;
		}

		super::finish(KIND, result)
	}
}
