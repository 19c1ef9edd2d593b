//! Provider client facade: the `oauth2` token exchange plus plain resource reads.

pub use oauth2;

// std
use std::borrow::Cow;
// crates.io
use oauth2::{
	AsyncHttpClient, AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret,
	EndpointNotSet, EndpointSet, HttpClientError, RedirectUrl, RequestTokenError, TokenResponse,
	TokenUrl,
	basic::{BasicClient, BasicRequestTokenError},
	http::{Method, Request, header},
};
// self
use crate::{
	_prelude::*,
	environment::{Environment, ProviderEndpoint},
	error::{ConfigError, TransportError, UpstreamError},
	http::{ProviderHttpClient, ResponseMetadata, ResponseMetadataSlot},
	secret::Secret,
};

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Maps HTTP transport failures into broker [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a broker error.
	fn map_transport_error(
		&self,
		endpoint: ProviderEndpoint,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		endpoint: ProviderEndpoint,
		_meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(endpoint, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) =>
				TransportError::network(endpoint.as_str(), std::io::Error::other(message)).into(),
			_ => TransportError::network(
				endpoint.as_str(),
				std::io::Error::other("unrecognized HTTP client failure"),
			)
			.into(),
		}
	}
}

/// Access token returned by the token endpoint.
#[derive(Clone, Debug)]
pub struct AccessToken(pub Secret);

/// Facade over one environment's token endpoint and protected resources.
pub(crate) struct ProviderFacade<'a, C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	environment: &'a Environment,
	http_client: &'a C,
	error_mapper: &'a M,
}
impl<'a, C, M> ProviderFacade<'a, C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn new(environment: &'a Environment, http_client: &'a C, error_mapper: &'a M) -> Self {
		Self { environment, http_client, error_mapper }
	}

	/// Exchanges an authorization code for an access token.
	///
	/// `redirect_uri` must equal the value sent on the authorization leg.
	pub(crate) async fn exchange_authorization_code(
		&self,
		code: &str,
		redirect_uri: &Url,
	) -> Result<AccessToken> {
		let client = self.oauth_client()?;
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let redirect_url = RedirectUrl::new(redirect_uri.to_string())
			.map_err(|source| ConfigError::InvalidRedirect { source })?;
		let response = client
			.exchange_code(AuthorizationCode::new(code.to_owned()))
			.set_redirect_uri(Cow::Owned(redirect_url))
			.request_async(&instrumented)
			.await
			.map_err(|err| self.map_token_error(meta.take(), err))?;

		Ok(AccessToken(Secret::new(response.access_token().secret().to_owned())))
	}

	/// Reads a protected resource with the bearer token and returns the raw body.
	pub(crate) async fn fetch_resource(
		&self,
		endpoint: ProviderEndpoint,
		token: &AccessToken,
	) -> Result<Vec<u8>> {
		let url = self.environment.endpoint(endpoint)?;
		let request = Request::builder()
			.method(Method::GET)
			.uri(url.as_str())
			.header(header::ACCEPT, "application/json")
			.header(header::AUTHORIZATION, format!("Bearer {}", token.0.expose()))
			.body(Vec::new())
			.map_err(ConfigError::from)?;

		self.send(endpoint, request).await
	}

	/// Reads the policy catalog authenticated by client credentials.
	pub(crate) async fn fetch_policies(&self) -> Result<Vec<u8>> {
		let endpoint = ProviderEndpoint::Policies;
		let mut url = self.environment.endpoint(endpoint)?;

		url.query_pairs_mut()
			.append_pair("client_id", &self.environment.client_id)
			.append_pair("client_secret", self.environment.client_secret.expose());

		let request = Request::builder()
			.method(Method::GET)
			.uri(url.as_str())
			.header(header::ACCEPT, "application/json")
			.body(Vec::new())
			.map_err(ConfigError::from)?;

		self.send(endpoint, request).await
	}

	async fn send(&self, endpoint: ProviderEndpoint, request: Request<Vec<u8>>) -> Result<Vec<u8>> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let response = instrumented.call(request).await.map_err(|err| {
			let captured = meta.take();

			self.error_mapper.map_transport_error(endpoint, captured.as_ref(), err)
		})?;
		let status = response.status();

		if !status.is_success() {
			return Err(
				UpstreamError::Status { endpoint: endpoint.as_str(), status: status.as_u16() }.into()
			);
		}

		Ok(response.into_body())
	}

	fn oauth_client(&self) -> Result<ConfiguredBasicClient> {
		let authorize = self.environment.endpoint(ProviderEndpoint::Authorize)?;
		let token = self.environment.endpoint(ProviderEndpoint::Token)?;
		let auth_url = AuthUrl::new(authorize.to_string()).map_err(|source| {
			ConfigError::InvalidEndpoint { endpoint: ProviderEndpoint::Authorize.as_str(), source }
		})?;
		let token_url = TokenUrl::new(token.to_string()).map_err(|source| {
			ConfigError::InvalidEndpoint { endpoint: ProviderEndpoint::Token.as_str(), source }
		})?;

		Ok(BasicClient::new(ClientId::new(self.environment.client_id.clone()))
			.set_client_secret(ClientSecret::new(
				self.environment.client_secret.expose().to_owned(),
			))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url)
			.set_auth_type(AuthType::RequestBody))
	}

	fn map_token_error(
		&self,
		meta: Option<ResponseMetadata>,
		err: BasicRequestTokenError<HttpClientError<C::TransportError>>,
	) -> Error {
		let status = meta.as_ref().and_then(|value| value.status);

		match err {
			RequestTokenError::ServerResponse(response) => UpstreamError::TokenRejected {
				error: response.error().as_ref().to_owned(),
				status,
			}
			.into(),
			RequestTokenError::Request(error) => self.error_mapper.map_transport_error(
				ProviderEndpoint::Token,
				meta.as_ref(),
				error,
			),
			RequestTokenError::Parse(error, _body) => match status {
				Some(code) if !(200..300).contains(&code) =>
					UpstreamError::Status { endpoint: ProviderEndpoint::Token.as_str(), status: code }
						.into(),
				_ => UpstreamError::MalformedTokenResponse { message: error.to_string(), status }
					.into(),
			},
			RequestTokenError::Other(message) => match status {
				Some(code) if !(200..300).contains(&code) =>
					UpstreamError::Status { endpoint: ProviderEndpoint::Token.as_str(), status: code }
						.into(),
				_ => UpstreamError::MalformedTokenResponse { message, status }.into(),
			},
		}
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(endpoint: ProviderEndpoint, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransportError::Timeout { endpoint: endpoint.as_str() }.into();
	}

	TransportError::network(endpoint.as_str(), err).into()
}
