//! Multi-file configuration loading.
//!
//! A configuration file may list other files under `include`. Every file's
//! top-level sections are merged into one document; a section defined twice
//! is an error, as is a file included more than once.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

/// Loads a configuration file together with its includes.
pub struct ConfigLoader {
	base_path: PathBuf,
	/// Canonical paths read so far.
	seen: HashSet<PathBuf>,
	/// File that defined each top-level section.
	owners: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	pub fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			seen: HashSet::new(),
			owners: HashMap::new(),
		}
	}

	/// Loads, merges and validates a configuration file.
	pub async fn load_config(&mut self, path: impl AsRef<Path>) -> Result<Config, ConfigError> {
		let root_path = self.locate(path.as_ref())?;
		let (root_text, mut root) = self.read_document(&root_path).await?;

		let includes = include_list(&root)?;
		if includes.is_empty() {
			return root_text.parse();
		}

		let sections = root
			.as_table_mut()
			.ok_or_else(|| ConfigError::Parse("Configuration root must be a table".into()))?;
		sections.remove("include");
		self.claim_sections(sections, &root_path)?;

		for include in includes {
			let include_path = self.locate(&include)?;
			let (_, document) = self.read_document(&include_path).await?;
			let Some(table) = document.as_table() else {
				continue;
			};
			if table.contains_key("include") {
				return Err(ConfigError::Validation(format!(
					"{} includes further files; only the root file may use include",
					include_path.display()
				)));
			}
			self.claim_sections(table, &include_path)?;
			sections.extend(table.clone());
		}

		toml::to_string(&root)
			.map_err(|e| ConfigError::Parse(format!("Cannot re-encode merged config: {}", e)))?
			.parse()
	}

	/// Records `path` as the owner of each section, rejecting redefinitions.
	fn claim_sections(
		&mut self,
		sections: &toml::map::Map<String, toml::Value>,
		path: &Path,
	) -> Result<(), ConfigError> {
		for name in sections.keys() {
			if let Some(owner) = self.owners.get(name) {
				return Err(ConfigError::Validation(format!(
					"Duplicate section '{}' in {} (already defined in {})",
					name,
					path.display(),
					owner.display()
				)));
			}
			self.owners.insert(name.clone(), path.to_path_buf());
		}
		Ok(())
	}

	/// Reads a file once, resolving environment variables before parsing.
	async fn read_document(&mut self, path: &Path) -> Result<(String, toml::Value), ConfigError> {
		let canonical = tokio::fs::canonicalize(path).await?;
		if !self.seen.insert(canonical.clone()) {
			return Err(ConfigError::Validation(format!(
				"Include cycle: {} was already loaded",
				canonical.display()
			)));
		}

		let text = resolve_env_vars(&tokio::fs::read_to_string(&canonical).await?)?;
		let document = toml::from_str(&text)?;
		Ok((text, document))
	}

	fn locate(&self, path: &Path) -> Result<PathBuf, ConfigError> {
		let resolved = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_path.join(path)
		};
		if resolved.exists() {
			Ok(resolved)
		} else {
			Err(ConfigError::Io(io::Error::new(
				io::ErrorKind::NotFound,
				format!("Configuration file not found: {}", resolved.display()),
			)))
		}
	}
}

/// Reads the `include` directive, a string or an array of strings.
fn include_list(document: &toml::Value) -> Result<Vec<PathBuf>, ConfigError> {
	match document.get("include") {
		None => Ok(Vec::new()),
		Some(toml::Value::String(path)) => Ok(vec![PathBuf::from(path)]),
		Some(toml::Value::Array(items)) => items
			.iter()
			.map(|item| {
				item.as_str()
					.map(PathBuf::from)
					.ok_or_else(|| ConfigError::Validation("include entries must be strings".into()))
			})
			.collect(),
		Some(_) => Err(ConfigError::Validation(
			"include must be a string or an array of strings".into(),
		)),
	}
}
