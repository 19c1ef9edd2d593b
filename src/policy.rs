//! Provider authentication policies and the reserved `groups` pseudo-policy.

// self
use crate::{_prelude::*, error::UpstreamError, id::PolicyHandle};

/// Reserved policy token that bypasses the catalog and targets the group endpoint.
pub const GROUPS_POLICY: &str = "groups";

/// Group categories requested by the reserved `groups` flow.
pub const GROUP_SCOPES: [&str; 8] = [
	"military",
	"responder",
	"student",
	"teacher",
	"nurse",
	"medical",
	"government",
	"hospital",
];

/// Authentication policy offered by the provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
	/// Stable handle used as the requested scope.
	pub handle: PolicyHandle,
	/// Human-readable name; falls back to the handle when the provider omits it.
	pub display_name: String,
}

/// Policy chosen for an authorization request after validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PolicySelection {
	/// Policy confirmed against the provider catalog.
	Catalog(Policy),
	/// Reserved `groups` flow; never looked up in the catalog.
	Groups,
}
impl PolicySelection {
	/// Handle string used when building the scope parameter.
	pub fn handle(&self) -> &str {
		match self {
			PolicySelection::Catalog(policy) => policy.handle.as_ref(),
			PolicySelection::Groups => GROUPS_POLICY,
		}
	}
}

/// Returns true when `handle` is the reserved `groups` token.
pub fn is_reserved(handle: &str) -> bool {
	handle == GROUPS_POLICY
}

#[derive(Deserialize)]
struct CatalogEntry {
	handle: String,
	#[serde(default)]
	name: Option<String>,
}

/// Parses the provider's policy catalog body.
///
/// Entries whose handle cannot appear in a request path are skipped; they could never
/// match a requested policy.
pub(crate) fn parse_catalog(body: &[u8]) -> Result<Vec<Policy>, UpstreamError> {
	let mut de = serde_json::Deserializer::from_slice(body);
	let entries: Vec<CatalogEntry> = serde_path_to_error::deserialize(&mut de)
		.map_err(|source| UpstreamError::MalformedJson { endpoint: "policies", source })?;

	Ok(entries.into_iter().filter_map(catalog_policy).collect())
}

fn catalog_policy(entry: CatalogEntry) -> Option<Policy> {
	let handle = match PolicyHandle::new(&entry.handle) {
		Ok(handle) => handle,
		Err(_err) => {
			#[cfg(feature = "tracing")]
			tracing::warn!(handle = %entry.handle, error = %_err, "Skipping catalog policy.");

			return None;
		},
	};
	let display_name = entry.name.unwrap_or_else(|| handle.to_string());

	Some(Policy { handle, display_name })
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn catalog_parsing_keeps_handles_and_names() {
		let body = br#"[
			{"name":"Identity Verification","handle":"identity","active":true},
			{"handle":"teacher"}
		]"#;
		let policies = parse_catalog(body).expect("Catalog should parse.");

		assert_eq!(policies.len(), 2);
		assert_eq!(policies[0].handle.as_ref(), "identity");
		assert_eq!(policies[0].display_name, "Identity Verification");
		assert_eq!(policies[1].display_name, "teacher");
	}

	#[test]
	fn catalog_parsing_reports_the_failing_path() {
		let err = parse_catalog(br#"[{"handle":"identity"},{"name":"missing"}]"#)
			.expect_err("Entries without a handle must be rejected.");

		match err {
			UpstreamError::MalformedJson { endpoint, source } => {
				assert_eq!(endpoint, "policies");
				assert!(source.path().to_string().starts_with("[1]"));
			},
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}

	#[test]
	fn unrepresentable_handles_are_skipped() {
		let policies = parse_catalog(br#"[{"handle":"identity"},{"handle":"loa3 ial2"}]"#)
			.expect("One bad entry should not reject the catalog.");

		assert_eq!(policies.len(), 1);
		assert_eq!(policies[0].handle.as_ref(), "identity");
	}

	#[test]
	fn groups_is_reserved() {
		assert!(is_reserved("groups"));
		assert!(!is_reserved("Groups"));
		assert_eq!(PolicySelection::Groups.handle(), "groups");
	}
}
