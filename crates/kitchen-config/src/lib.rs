//! Configuration for the kitchen board service.
//!
//! Configuration is read from TOML. String values may reference environment
//! variables as `${VAR}` or `${VAR:-default}`, and a file may pull other files
//! in with `include = ["backend.toml"]`. Each top-level section must be
//! defined in exactly one file.

mod loader;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Configuration error: {0}")]
	Parse(String),
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep only the message; the default rendering dumps the whole input.
		ConfigError::Parse(err.message().to_string())
	}
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Settings of this board instance.
	pub board: BoardConfig,
	/// Authoritative backend implementations.
	pub backend: BackendConfig,
	/// Realtime event sources.
	#[serde(default)]
	pub realtime: RealtimeConfig,
}

/// Settings of one kitchen board instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BoardConfig {
	/// Identifier used in logs.
	pub id: String,
	/// Preparation budget applied to menu items without one.
	#[serde(default = "default_prep_minutes")]
	pub default_prep_minutes: u32,
	/// Upper bound for every authoritative request.
	#[serde(default = "default_request_timeout_seconds")]
	pub request_timeout_seconds: u64,
	/// How often preparing items are checked for overdue alerts.
	#[serde(default = "default_overdue_check_interval_seconds")]
	pub overdue_check_interval_seconds: u64,
}

impl BoardConfig {
	pub fn request_timeout(&self) -> Duration {
		Duration::from_secs(self.request_timeout_seconds)
	}

	pub fn overdue_check_interval(&self) -> Duration {
		Duration::from_secs(self.overdue_check_interval_seconds)
	}
}

fn default_prep_minutes() -> u32 {
	15
}

fn default_request_timeout_seconds() -> u64 {
	10
}

fn default_overdue_check_interval_seconds() -> u64 {
	30
}

/// Configuration of the authoritative backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
	/// Which implementation the board talks to.
	pub primary: String,
	/// Implementation name to raw implementation table.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration of realtime event sources.
///
/// Empty means the board only refreshes after its own writes.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RealtimeConfig {
	#[serde(default)]
	pub implementations: HashMap<String, toml::Value>,
}

/// Replaces `${VAR}` and `${VAR:-default}` with environment values.
///
/// Input is capped at 1MB to keep the regex scan bounded.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut missing = None;
	let resolved = re.replace_all(input, |caps: &regex::Captures<'_>| {
		let var_name = &caps[1];
		match (std::env::var(var_name), caps.get(2)) {
			(Ok(value), _) => value,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				missing.get_or_insert_with(|| var_name.to_string());
				String::new()
			}
		}
	});

	match missing {
		Some(var_name) => Err(ConfigError::Validation(format!(
			"Environment variable '{}' not found",
			var_name
		))),
		None => Ok(resolved.into_owned()),
	}
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let base_dir = path
			.parent()
			.filter(|p| !p.as_os_str().is_empty())
			.unwrap_or_else(|| Path::new("."));
		let file_name = path.file_name().ok_or_else(|| {
			ConfigError::Validation(format!("Invalid path: {}", path.display()))
		})?;

		let mut loader = loader::ConfigLoader::new(base_dir);
		loader.load_config(file_name).await
	}

	/// Checks the semantic constraints serde cannot express.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.board.id.trim().is_empty() {
			return Err(ConfigError::Validation("Board ID cannot be empty".into()));
		}
		if !(1..=1440).contains(&self.board.default_prep_minutes) {
			return Err(ConfigError::Validation(
				"default_prep_minutes must be between 1 and 1440".into(),
			));
		}
		if !(1..=300).contains(&self.board.request_timeout_seconds) {
			return Err(ConfigError::Validation(
				"request_timeout_seconds must be between 1 and 300".into(),
			));
		}
		if !(1..=3600).contains(&self.board.overdue_check_interval_seconds) {
			return Err(ConfigError::Validation(
				"overdue_check_interval_seconds must be between 1 and 3600".into(),
			));
		}

		if self.backend.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one backend implementation must be configured".into(),
			));
		}
		if self.backend.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Backend primary implementation cannot be empty".into(),
			));
		}
		if !self
			.backend
			.implementations
			.contains_key(&self.backend.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary backend '{}' not found in implementations",
				self.backend.primary
			)));
		}

		Ok(())
	}
}

/// Parses a TOML string, resolving environment variables and validating.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const MINIMAL: &str = r#"
[board]
id = "kitchen-main"

[backend]
primary = "memory"
[backend.implementations.memory]
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("KITCHEN_TEST_HOST", "localhost");
		std::env::set_var("KITCHEN_TEST_PORT", "5432");

		let input = "host = \"${KITCHEN_TEST_HOST}:${KITCHEN_TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "host = \"localhost:5432\"");

		std::env::remove_var("KITCHEN_TEST_HOST");
		std::env::remove_var("KITCHEN_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${KITCHEN_MISSING_VAR:-fallback}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "value = \"fallback\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let input = "value = \"${KITCHEN_MISSING_VAR}\"";
		let result = resolve_env_vars(input);
		assert!(result.unwrap_err().to_string().contains("KITCHEN_MISSING_VAR"));
	}

	#[test]
	fn test_defaults_applied() {
		let config: Config = MINIMAL.parse().unwrap();
		assert_eq!(config.board.id, "kitchen-main");
		assert_eq!(config.board.default_prep_minutes, 15);
		assert_eq!(config.board.request_timeout(), Duration::from_secs(10));
		assert_eq!(config.board.overdue_check_interval(), Duration::from_secs(30));
		assert!(config.realtime.implementations.is_empty());
	}

	#[test]
	fn test_board_id_from_env() {
		std::env::set_var("KITCHEN_TEST_BOARD_ID", "line-2");
		let config: Config = r#"
[board]
id = "${KITCHEN_TEST_BOARD_ID}"
request_timeout_seconds = 3

[backend]
primary = "memory"
[backend.implementations.memory]
seed_file = "orders.json"

[realtime.implementations.local]
capacity = 64
"#
		.parse()
		.unwrap();
		std::env::remove_var("KITCHEN_TEST_BOARD_ID");

		assert_eq!(config.board.id, "line-2");
		assert_eq!(config.board.request_timeout_seconds, 3);
		assert!(config.realtime.implementations.contains_key("local"));
	}

	#[test]
	fn test_unknown_primary_rejected() {
		let result: Result<Config, _> = r#"
[board]
id = "kitchen-main"

[backend]
primary = "postgres"
[backend.implementations.memory]
"#
		.parse();
		assert!(result
			.unwrap_err()
			.to_string()
			.contains("Primary backend 'postgres' not found"));
	}

	#[test]
	fn test_out_of_range_values_rejected() {
		let result: Result<Config, _> = r#"
[board]
id = "kitchen-main"
request_timeout_seconds = 0

[backend]
primary = "memory"
[backend.implementations.memory]
"#
		.parse();
		assert!(matches!(result, Err(ConfigError::Validation(_))));

		let result: Result<Config, _> = r#"
[board]
id = "   "

[backend]
primary = "memory"
[backend.implementations.memory]
"#
		.parse();
		assert!(result.unwrap_err().to_string().contains("Board ID"));
	}
}
