//! Pure transformations from each protocol's success payload into an [`IdentityRecord`].
//!
//! - OAuth: the attributes resource returns `{"attributes": [{"handle", "value"}, ...]}`; the
//!   list is folded into the map by handle, later entries winning.
//! - OIDC: the userinfo resource returns a compact JWT whose claims become the attributes.
//!   The signature is not verified.
//! - SAML: every `Attribute` under the response's top-level `Assertion` contributes
//!   `Name → AttributeValue`, later values winning.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use samael::schema::{Assertion, Attribute, Response as SamlResponse};
// self
use crate::{
	_prelude::*,
	error::UpstreamError,
	identity::{AttributeMap, IdentityRecord, RawPayload},
};

/// One `{handle, value}` entry of the OAuth attributes resource.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AttributeEntry {
	/// Attribute name.
	pub handle: String,
	/// Attribute value; non-string JSON values are kept as their JSON text.
	#[serde(default)]
	pub value: serde_json::Value,
}

#[derive(Deserialize)]
struct AttributesResponse {
	attributes: Vec<AttributeEntry>,
}

/// Outcome of interpreting a SAML response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SamlOutcome {
	/// Assertion found and normalized.
	Identity(IdentityRecord),
	/// Response carried no top-level assertion; the flow restarts.
	MissingAssertion,
}

/// Folds an ordered sequence of attribute entries into a map; duplicate handles keep the
/// last value.
pub fn fold_attributes<I>(entries: I) -> AttributeMap
where
	I: IntoIterator<Item = AttributeEntry>,
{
	entries.into_iter().fold(AttributeMap::new(), |mut map, entry| {
		map.insert(entry.handle, render_value(&entry.value));

		map
	})
}

/// Normalizes the OAuth attributes resource body.
pub fn oauth_attributes(body: &[u8]) -> Result<IdentityRecord, UpstreamError> {
	let mut de = serde_json::Deserializer::from_slice(body);
	let raw: serde_json::Value = serde_path_to_error::deserialize(&mut de)
		.map_err(|source| UpstreamError::MalformedJson { endpoint: "attributes", source })?;
	let response: AttributesResponse = serde_path_to_error::deserialize(raw.clone())
		.map_err(|source| UpstreamError::MalformedJson { endpoint: "attributes", source })?;

	Ok(IdentityRecord::new(RawPayload::Structured(raw), fold_attributes(response.attributes)))
}

/// Normalizes the OIDC userinfo body (a compact JWT) without verifying its signature.
pub fn oidc_claims(body: &[u8]) -> Result<IdentityRecord, UpstreamError> {
	let token = std::str::from_utf8(body)
		.map_err(|_| UpstreamError::NonUtf8Body { endpoint: "userinfo" })?
		.trim();
	let claims = decode_claims_unverified(token)?;
	let attributes = claims.iter().map(|(name, value)| (name.clone(), render_value(value))).collect();

	Ok(IdentityRecord::new(RawPayload::Opaque(token.to_owned()), attributes))
}

/// Decodes the base64 `SAMLResponse` form field and normalizes its assertion.
pub fn saml_response(encoded: &str) -> Result<SamlOutcome, UpstreamError> {
	let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
	let bytes = STANDARD.decode(compact).map_err(UpstreamError::SamlEncoding)?;
	let xml = String::from_utf8(bytes)
		.map_err(|_| UpstreamError::NonUtf8Body { endpoint: "saml_response" })?;
	let response = xml
		.parse::<SamlResponse>()
		.map_err(|err| UpstreamError::MalformedSamlResponse { message: err.to_string() })?;

	Ok(match response.assertion.as_ref() {
		Some(assertion) => SamlOutcome::Identity(saml_assertion(assertion)),
		None => SamlOutcome::MissingAssertion,
	})
}

/// Normalizes a parsed assertion.
pub fn saml_assertion(assertion: &Assertion) -> IdentityRecord {
	let nodes: Vec<&Attribute> = assertion
		.attribute_statements
		.iter()
		.flatten()
		.flat_map(|statement| statement.attributes.iter())
		.collect();
	let mut attributes = AttributeMap::new();

	for attribute in &nodes {
		let Some(name) = attribute.name.as_deref().or(attribute.friendly_name.as_deref()) else {
			continue;
		};

		for value in &attribute.values {
			attributes.insert(name, value.value.clone().unwrap_or_default());
		}
	}

	IdentityRecord::new(RawPayload::Opaque(render_attribute_nodes(&nodes)), attributes)
}

fn decode_claims_unverified(
	token: &str,
) -> Result<serde_json::Map<String, serde_json::Value>, UpstreamError> {
	let mut validation = Validation::new(Algorithm::RS256);

	validation.insecure_disable_signature_validation();
	validation.validate_exp = false;
	validation.validate_aud = false;
	validation.required_spec_claims.clear();

	let data = jsonwebtoken::decode::<serde_json::Value>(
		token,
		&DecodingKey::from_secret(&[]),
		&validation,
	)
	.map_err(UpstreamError::MalformedIdToken)?;

	match data.claims {
		serde_json::Value::Object(map) => Ok(map),
		_ => Err(UpstreamError::ClaimsNotObject),
	}
}

fn render_value(value: &serde_json::Value) -> String {
	match value {
		serde_json::Value::String(text) => text.clone(),
		serde_json::Value::Null => String::new(),
		other => other.to_string(),
	}
}

fn render_attribute_nodes(nodes: &[&Attribute]) -> String {
	let mut buf = String::new();

	for attribute in nodes {
		if !buf.is_empty() {
			buf.push('\n');
		}

		buf.push_str("<Attribute");

		if let Some(name) = attribute.name.as_deref() {
			buf.push_str(&format!(" Name=\"{}\"", escape_xml(name)));
		}
		if let Some(friendly) = attribute.friendly_name.as_deref() {
			buf.push_str(&format!(" FriendlyName=\"{}\"", escape_xml(friendly)));
		}

		buf.push('>');

		for value in &attribute.values {
			buf.push_str("<AttributeValue>");
			buf.push_str(&escape_xml(value.value.as_deref().unwrap_or_default()));
			buf.push_str("</AttributeValue>");
		}

		buf.push_str("</Attribute>");
	}

	buf
}

fn escape_xml(text: &str) -> String {
	let mut out = String::with_capacity(text.len());

	for ch in text.chars() {
		match ch {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'"' => out.push_str("&quot;"),
			other => out.push(other),
		}
	}

	out
}
