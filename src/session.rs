//! Short-lived, client-held session artifacts.
//!
//! The broker only issues [`Session`] values. Whatever carries them to the browser (the
//! cookie transport in `web`) owns serialization and must call [`read_session`] to enforce
//! the expiry on the way back in.

// self
use crate::{
	_prelude::*,
	identity::{AttributeMap, IdentityRecord, RawPayload},
};

/// Fixed lifetime of every issued session.
pub const SESSION_TTL: Duration = Duration::seconds(60);

/// Identity record bound to its validity window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
	/// Identity delivered by the callback.
	pub identity: IdentityRecord,
	/// Issue timestamp.
	#[serde(with = "time::serde::rfc3339")]
	pub issued_at: OffsetDateTime,
	/// Expiry timestamp (`issued_at + 60s`).
	#[serde(with = "time::serde::rfc3339")]
	pub expires_at: OffsetDateTime,
}
impl Session {
	/// Issues a session at `now`; the lifetime is always [`SESSION_TTL`].
	pub fn issue(identity: IdentityRecord, now: OffsetDateTime) -> Self {
		Self { identity, issued_at: now, expires_at: now + SESSION_TTL }
	}

	/// Returns true while `now` is strictly before the expiry.
	pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
		now < self.expires_at
	}
}

/// Result of reading the session at the presentation boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionRead {
	/// A live session with its attributes.
	Authenticated {
		/// Normalized attributes.
		attributes: AttributeMap,
		/// Protocol-native payload.
		raw_payload: RawPayload,
	},
	/// No session or an expired one.
	Unauthenticated,
}

/// Presence check used by the profile view.
///
/// Missing or expired sessions read as unauthenticated; there is no partial state.
pub fn read_session(session: Option<Session>, now: OffsetDateTime) -> SessionRead {
	match session {
		Some(session) if session.is_valid_at(now) => {
			let (raw_payload, attributes) = session.identity.into_parts();

			SessionRead::Authenticated { attributes, raw_payload }
		},
		_ => SessionRead::Unauthenticated,
	}
}
