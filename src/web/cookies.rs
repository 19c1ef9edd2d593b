//! Client-held session transport.
//!
//! A session travels as two cookies: the raw payload and the attribute map. Each carries
//! the session expiry next to its content and a matching `Max-Age`, so an expired cookie
//! that a client keeps sending still reads as unauthenticated.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use tower_cookies::{Cookie, Cookies, cookie::SameSite};
// self
use crate::{
	_prelude::*,
	identity::{AttributeMap, IdentityRecord, RawPayload},
	session::{SESSION_TTL, Session},
};

/// Cookie carrying the protocol-native payload.
pub const PAYLOAD_COOKIE: &str = "federation_payload";
/// Cookie carrying the normalized attribute map.
pub const ATTRIBUTES_COOKIE: &str = "federation_attributes";
/// Largest `name=value` pair browsers are required to keep.
pub const MAX_COOKIE_BYTES: usize = 4096;

/// Failures raised while writing the session cookies.
#[derive(Debug, ThisError)]
pub enum CookieError {
	/// Session could not be serialized.
	#[error("Failed to encode session: {0}")]
	Encode(#[from] serde_json::Error),
	/// Encoded cookie exceeds what a browser would store.
	#[error("Session cookie `{name}` is {len} bytes; browsers keep at most {max}.")]
	TooLarge {
		/// Cookie name.
		name: &'static str,
		/// Encoded `name=value` length.
		len: usize,
		/// Size limit.
		max: usize,
	},
}

#[derive(Serialize, Deserialize)]
struct PayloadCookie {
	raw_payload: RawPayload,
	#[serde(with = "time::serde::rfc3339")]
	expires_at: OffsetDateTime,
}

#[derive(Serialize, Deserialize)]
struct AttributesCookie {
	attributes: AttributeMap,
	#[serde(with = "time::serde::rfc3339")]
	issued_at: OffsetDateTime,
	#[serde(with = "time::serde::rfc3339")]
	expires_at: OffsetDateTime,
}

/// Writes `session` as the two session cookies.
///
/// Nothing is written when either cookie would exceed [`MAX_COOKIE_BYTES`].
pub fn write_session(cookies: &Cookies, session: &Session) -> Result<(), CookieError> {
	let (payload, attributes) = encode_session(session)?;

	check_size(PAYLOAD_COOKIE, &payload)?;
	check_size(ATTRIBUTES_COOKIE, &attributes)?;

	cookies.add(session_cookie(PAYLOAD_COOKIE, payload));
	cookies.add(session_cookie(ATTRIBUTES_COOKIE, attributes));

	Ok(())
}

/// Reads the session cookies; see [`decode_session`].
pub fn read_session(cookies: &Cookies) -> Option<Session> {
	let payload = cookies.get(PAYLOAD_COOKIE)?;
	let attributes = cookies.get(ATTRIBUTES_COOKIE)?;

	decode_session(payload.value(), attributes.value())
}

/// Encodes `session` into the payload and attribute cookie values.
pub fn encode_session(session: &Session) -> Result<(String, String), serde_json::Error> {
	let payload = PayloadCookie {
		raw_payload: session.identity.raw_payload().clone(),
		expires_at: session.expires_at,
	};
	let attributes = AttributesCookie {
		attributes: session.identity.attributes().clone(),
		issued_at: session.issued_at,
		expires_at: session.expires_at,
	};

	Ok((encode(&payload)?, encode(&attributes)?))
}

/// Reassembles a session; malformed or mismatched values yield `None`.
pub fn decode_session(payload: &str, attributes: &str) -> Option<Session> {
	let payload: PayloadCookie = decode(payload)?;
	let attributes: AttributesCookie = decode(attributes)?;

	if payload.expires_at != attributes.expires_at {
		return None;
	}

	Some(Session {
		identity: IdentityRecord::new(payload.raw_payload, attributes.attributes),
		issued_at: attributes.issued_at,
		expires_at: attributes.expires_at,
	})
}

fn check_size(name: &'static str, value: &str) -> Result<(), CookieError> {
	let len = name.len() + 1 + value.len();

	if len > MAX_COOKIE_BYTES {
		return Err(CookieError::TooLarge { name, len, max: MAX_COOKIE_BYTES });
	}

	Ok(())
}

fn session_cookie(name: &'static str, value: String) -> Cookie<'static> {
	Cookie::build((name, value))
		.path("/")
		.http_only(true)
		.same_site(SameSite::Lax)
		.max_age(SESSION_TTL)
		.build()
}

fn encode<T>(value: &T) -> Result<String, serde_json::Error>
where
	T: Serialize,
{
	Ok(URL_SAFE_NO_PAD.encode(serde_json::to_vec(value)?))
}

fn decode<T>(value: &str) -> Option<T>
where
	T: for<'de> Deserialize<'de>,
{
	let bytes = URL_SAFE_NO_PAD.decode(value).ok()?;

	serde_json::from_slice(&bytes).ok()
}
