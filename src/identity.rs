//! Protocol-agnostic identity result produced by every successful callback.

// self
use crate::_prelude::*;

/// Attribute names surfaced individually by the profile view.
pub const WELL_KNOWN_ATTRIBUTES: [&str; 5] = ["fname", "lname", "email", "zip", "uuid"];

/// Canonical attribute map; keys are unique and sorted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeMap(BTreeMap<String, String>);
impl AttributeMap {
	/// Creates an empty map.
	pub fn new() -> Self {
		Self::default()
	}

	/// Writes a value; an existing value under the same name is replaced.
	pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
		self.0.insert(name.into(), value.into());
	}

	/// Returns the value stored under `name`.
	pub fn get(&self, name: &str) -> Option<&str> {
		self.0.get(name).map(String::as_str)
	}

	/// Iterates `(name, value)` pairs in key order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}

	/// Number of attributes.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns true when no attribute is present.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
impl<K, V> FromIterator<(K, V)> for AttributeMap
where
	K: Into<String>,
	V: Into<String>,
{
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		let mut map = Self::new();

		for (name, value) in iter {
			map.insert(name, value);
		}

		map
	}
}

/// Protocol-native payload kept verbatim for display and debugging.
///
/// The variant is chosen by the protocol branch that produced the payload and is never
/// inferred from its shape afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RawPayload {
	/// Structured JSON document (OAuth attributes response).
	Structured(serde_json::Value),
	/// Opaque text (OIDC compact JWT, rendered SAML attribute nodes).
	Opaque(String),
}
impl RawPayload {
	/// Renders the payload for display; structured payloads are pretty-printed.
	pub fn render(&self) -> String {
		match self {
			RawPayload::Structured(value) =>
				serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
			RawPayload::Opaque(text) => text.clone(),
		}
	}
}

/// Identity produced by one successful callback; immutable once built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
	raw_payload: RawPayload,
	attributes: AttributeMap,
}
impl IdentityRecord {
	/// Pairs a raw payload with its normalized attributes.
	pub fn new(raw_payload: RawPayload, attributes: AttributeMap) -> Self {
		Self { raw_payload, attributes }
	}

	/// Protocol-native payload.
	pub fn raw_payload(&self) -> &RawPayload {
		&self.raw_payload
	}

	/// Normalized attributes.
	pub fn attributes(&self) -> &AttributeMap {
		&self.attributes
	}

	/// Splits the record into its parts.
	pub fn into_parts(self) -> (RawPayload, AttributeMap) {
		(self.raw_payload, self.attributes)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn later_entries_replace_earlier_ones() {
		let map: AttributeMap =
			[("email", "old@example.com"), ("zip", "12345"), ("email", "new@example.com")]
				.into_iter()
				.collect();

		assert_eq!(map.len(), 2);
		assert_eq!(map.get("email"), Some("new@example.com"));
	}

	#[test]
	fn raw_payload_serializes_with_an_explicit_tag() {
		let structured = RawPayload::Structured(serde_json::json!({"attributes": []}));
		let opaque = RawPayload::Opaque("a.b.c".into());

		assert_eq!(
			serde_json::to_value(&structured).expect("Payload should serialize."),
			serde_json::json!({"kind": "structured", "value": {"attributes": []}})
		);
		assert_eq!(
			serde_json::to_value(&opaque).expect("Payload should serialize."),
			serde_json::json!({"kind": "opaque", "value": "a.b.c"})
		);
		assert_eq!(opaque.render(), "a.b.c");
	}
}
