//! TOML configuration for the server binary.
//!
//! Values of the form `${VAR_NAME}` are replaced with the process environment before
//! parsing, so credentials can stay out of the file:
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 5001
//!
//! [environments.prod]
//! domain = "https://api.id.me"
//! client_id = "${PRODUCTION_CLIENT_ID}"
//! client_secret = "${PRODUCTION_CLIENT_SECRET}"
//!
//! [environments.sandbox]
//! domain = "https://api.idmelabs.com"
//! client_id = "${SANDBOX_CLIENT_ID}"
//! client_secret = "${SANDBOX_CLIENT_SECRET}"
//! ```
//!
//! Loading fails on a missing variable, an empty environment table, or an environment
//! that does not validate. The core never reads the process environment afterwards.

// std
use std::{
	net::{IpAddr, Ipv4Addr, SocketAddr},
	path::{Path, PathBuf},
};
// crates.io
use regex::Regex;
// self
use crate::{
	_prelude::*,
	environment::{Environment, EnvironmentRegistry},
	flows::{BrokerSettings, DEFAULT_GROUPS_ENDPOINT, DEFAULT_SAML_ENTITY_ID},
	id::EnvironmentKey,
	secret::Secret,
};

/// Failures raised while loading configuration.
#[derive(Debug, ThisError)]
pub enum LoadError {
	/// File could not be read.
	#[error("Failed to read config file {path}: {source}")]
	Io {
		/// Path that was read.
		path: PathBuf,
		/// Underlying IO error.
		#[source]
		source: std::io::Error,
	},
	/// TOML syntax or shape error.
	#[error("Failed to parse config: {0}")]
	Parse(#[from] toml::de::Error),
	/// `${VAR}` reference to an unset variable.
	#[error("Environment variable `{0}` is not set.")]
	EnvVarNotFound(String),
	/// Interpolation pattern failed to compile.
	#[error(transparent)]
	Pattern(#[from] regex::Error),
	/// Semantically invalid configuration.
	#[error("Invalid config: {0}")]
	Validation(String),
	/// Environment table rejected by the registry.
	#[error(transparent)]
	Environment(#[from] crate::error::ConfigError),
}

/// Root of the configuration file.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrokerConfig {
	/// Listener and public origin.
	#[serde(default)]
	pub server: ServerConfig,
	/// Provider call limits.
	#[serde(default)]
	pub http: HttpConfig,
	/// SAML relying-party settings.
	#[serde(default)]
	pub saml: SamlConfig,
	/// Reserved `groups` flow settings.
	#[serde(default)]
	pub groups: GroupsConfig,
	/// Provider environments keyed by their route segment.
	#[serde(default)]
	pub environments: BTreeMap<String, EnvironmentConfig>,
}
impl BrokerConfig {
	/// Loads and validates a configuration file.
	pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LoadError> {
		let path = path.as_ref();
		let contents = std::fs::read_to_string(path)
			.map_err(|source| LoadError::Io { path: path.to_path_buf(), source })?;

		Self::from_toml(&contents)
	}

	/// Parses configuration text, expanding `${VAR}` from the process environment.
	pub fn from_toml(contents: &str) -> Result<Self, LoadError> {
		Self::from_toml_with(contents, |name| std::env::var(name).ok())
	}

	/// Parses configuration text with a caller-supplied variable lookup.
	pub fn from_toml_with<F>(contents: &str, lookup: F) -> Result<Self, LoadError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let expanded = expand_env_vars(contents, lookup)?;
		let config: BrokerConfig = toml::from_str(&expanded)?;

		config.validate()?;

		Ok(config)
	}

	fn validate(&self) -> Result<(), LoadError> {
		if self.http.timeout_secs == 0 {
			return Err(LoadError::Validation("http.timeout_secs must be positive".into()));
		}
		if !matches!(self.server.public_scheme.as_str(), "http" | "https") {
			return Err(LoadError::Validation(
				"server.public_scheme must be `http` or `https`".into(),
			));
		}

		self.settings()?;
		self.registry()?;

		Ok(())
	}

	/// Builds the immutable environment registry.
	pub fn registry(&self) -> Result<EnvironmentRegistry, LoadError> {
		let environments = self
			.environments
			.iter()
			.map(|(key, env)| env.build(key))
			.collect::<Result<Vec<_>, _>>()?;

		Ok(EnvironmentRegistry::new(environments)?)
	}

	/// Builds the deployment-wide broker settings.
	pub fn settings(&self) -> Result<BrokerSettings, LoadError> {
		let groups_endpoint = Url::parse(&self.groups.endpoint)
			.map_err(|e| LoadError::Validation(format!("groups.endpoint: {e}")))?;

		if self.saml.entity_id.is_empty() {
			return Err(LoadError::Validation("saml.entity_id cannot be empty".into()));
		}

		Ok(BrokerSettings::new(self.saml.entity_id.clone(), groups_endpoint)
			.with_http_timeout(std::time::Duration::from_secs(self.http.timeout_secs)))
	}

	/// Splits the configuration into the values the broker and server consume.
	pub fn into_parts(self) -> Result<(EnvironmentRegistry, BrokerSettings, ServerConfig), LoadError> {
		let registry = self.registry()?;
		let settings = self.settings()?;

		Ok((registry, settings, self.server))
	}
}

/// Listener settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
	/// Bind address.
	#[serde(default = "default_host")]
	pub host: IpAddr,
	/// Bind port.
	#[serde(default = "default_port")]
	pub port: u16,
	/// Scheme used for callback URIs when no `X-Forwarded-Proto` header is present.
	#[serde(default = "default_public_scheme")]
	pub public_scheme: String,
}
impl ServerConfig {
	/// Socket address to bind.
	pub fn socket_addr(&self) -> SocketAddr {
		SocketAddr::new(self.host, self.port)
	}
}
impl Default for ServerConfig {
	fn default() -> Self {
		Self { host: default_host(), port: default_port(), public_scheme: default_public_scheme() }
	}
}

/// Provider call limits.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
	/// Per-call timeout in seconds.
	#[serde(default = "default_timeout_secs")]
	pub timeout_secs: u64,
}
impl Default for HttpConfig {
	fn default() -> Self {
		Self { timeout_secs: default_timeout_secs() }
	}
}

/// SAML relying-party settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SamlConfig {
	/// Value sent as `EntityID`.
	#[serde(default = "default_entity_id")]
	pub entity_id: String,
}
impl Default for SamlConfig {
	fn default() -> Self {
		Self { entity_id: default_entity_id() }
	}
}

/// Reserved `groups` flow settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupsConfig {
	/// Group sub-domain endpoint.
	#[serde(default = "default_groups_endpoint")]
	pub endpoint: String,
}
impl Default for GroupsConfig {
	fn default() -> Self {
		Self { endpoint: default_groups_endpoint() }
	}
}

/// One provider environment.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentConfig {
	/// Provider base domain.
	pub domain: String,
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: Secret,
	/// Overrides the production flag (defaults to `key == "prod"`).
	#[serde(default)]
	pub production: Option<bool>,
}
impl EnvironmentConfig {
	fn build(&self, key: &str) -> Result<Environment, LoadError> {
		let env_key = EnvironmentKey::new(key)
			.map_err(|e| LoadError::Validation(format!("environments.{key}: {e}")))?;
		let domain = Url::parse(&self.domain)
			.map_err(|e| LoadError::Validation(format!("environments.{key}.domain: {e}")))?;
		let environment =
			Environment::new(env_key, domain, self.client_id.clone(), self.client_secret.clone())?;

		Ok(match self.production {
			Some(production) => environment.with_production(production),
			None => environment,
		})
	}
}
impl Debug for EnvironmentConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("EnvironmentConfig")
			.field("domain", &self.domain)
			.field("client_id", &self.client_id)
			.field("client_secret", &self.client_secret)
			.field("production", &self.production)
			.finish()
	}
}

fn default_host() -> IpAddr {
	IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_port() -> u16 {
	5001
}

fn default_public_scheme() -> String {
	"http".into()
}

fn default_timeout_secs() -> u64 {
	crate::http::DEFAULT_TIMEOUT.as_secs()
}

fn default_entity_id() -> String {
	DEFAULT_SAML_ENTITY_ID.into()
}

fn default_groups_endpoint() -> String {
	DEFAULT_GROUPS_ENDPOINT.into()
}

/// Replaces `${VAR_NAME}` outside `#` comments; unset variables are an error.
///
/// Values substituted inside a basic string (`"..."`) are escaped for TOML, so secrets may
/// contain quotes or backslashes. Literal strings (`'...'`) cannot hold a `'`.
fn expand_env_vars<F>(input: &str, lookup: F) -> Result<String, LoadError>
where
	F: Fn(&str) -> Option<String>,
{
	let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")?;
	let mut result = String::with_capacity(input.len());

	for line in input.lines() {
		let mut last_end = 0;

		for cap in re.captures_iter(line) {
			let Some(whole) = cap.get(0) else { continue };
			let quote = match scan_line(line, whole.start()) {
				LineContext::Comment => break,
				LineContext::Code(quote) => quote,
			};
			let name = &cap[1];
			let value = lookup(name).ok_or_else(|| LoadError::EnvVarNotFound(name.to_owned()))?;

			result.push_str(&line[last_end..whole.start()]);

			match quote {
				Quote::Basic => push_basic_escaped(&mut result, &value),
				Quote::Literal if value.contains(['\'', '\n']) =>
					return Err(LoadError::Validation(format!(
						"`{name}` cannot be placed in a literal string"
					))),
				Quote::Literal | Quote::None => result.push_str(&value),
			}

			last_end = whole.end();
		}

		result.push_str(&line[last_end..]);
		result.push('\n');
	}

	if !input.ends_with('\n') && result.ends_with('\n') {
		result.pop();
	}

	Ok(result)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Quote {
	None,
	Basic,
	Literal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LineContext {
	Code(Quote),
	Comment,
}

/// Classifies byte offset `pos` of a single TOML line.
fn scan_line(line: &str, pos: usize) -> LineContext {
	let mut quote = Quote::None;
	let mut escaped = false;

	for (idx, ch) in line.char_indices() {
		if idx >= pos {
			break;
		}

		match (quote, ch) {
			(Quote::None, '#') => return LineContext::Comment,
			(Quote::None, '"') => quote = Quote::Basic,
			(Quote::None, '\'') => quote = Quote::Literal,
			(Quote::Basic, _) if escaped => escaped = false,
			(Quote::Basic, '\\') => escaped = true,
			(Quote::Basic, '"') | (Quote::Literal, '\'') => quote = Quote::None,
			_ => {},
		}
	}

	LineContext::Code(quote)
}

fn push_basic_escaped(buf: &mut String, value: &str) {
	for ch in value.chars() {
		match ch {
			'"' => buf.push_str("\\\""),
			'\\' => buf.push_str("\\\\"),
			'\n' => buf.push_str("\\n"),
			'\r' => buf.push_str("\\r"),
			'\t' => buf.push_str("\\t"),
			c if c.is_control() => buf.push_str(&format!("\\u{:04X}", c as u32)),
			c => buf.push(c),
		}
	}
}
