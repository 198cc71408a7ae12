use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::AppError;
use crate::field::RecordSchema;
use crate::models::SchemaDefinition;
use crate::util::derive_schema_name;

const SCHEMAS_DIR_VAR: &str = "HARVEST_SCHEMAS_DIR";
const DEFAULT_SCHEMAS_DIR: &str = "schemas";

/// Configuration for locating record schema definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    pub schemas_dir: PathBuf,
}

impl ResolverConfig {
    /// Read configuration from environment variables.
    ///
    /// - `HARVEST_SCHEMAS_DIR` (optional, defaults to `schemas`)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_value(std::env::var(SCHEMAS_DIR_VAR).ok())
    }

    fn from_value(raw: Option<String>) -> Result<Self, AppError> {
        let schemas_dir = match raw {
            None => PathBuf::from(DEFAULT_SCHEMAS_DIR),
            Some(raw) if raw.trim().is_empty() => {
                return Err(AppError::ConfigError(format!(
                    "{SCHEMAS_DIR_VAR} is set but empty"
                )));
            }
            Some(raw) => PathBuf::from(raw),
        };
        Ok(Self { schemas_dir })
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            schemas_dir: PathBuf::from(DEFAULT_SCHEMAS_DIR),
        }
    }
}

/// A fully resolved record schema: path, canonical name, and built schema.
#[derive(Debug, Clone)]
pub struct ResolvedSchema {
    pub path: PathBuf,
    pub name: String,
    pub schema: Arc<RecordSchema>,
}

/// Resolves schema references (file paths or `name@version` strings) to
/// record schemas.
pub struct SchemaResolver {
    schemas_dir: PathBuf,
}

impl SchemaResolver {
    pub fn new(schemas_dir: impl Into<PathBuf>) -> Self {
        Self {
            schemas_dir: schemas_dir.into(),
        }
    }

    pub fn from_config(config: &ResolverConfig) -> Self {
        Self::new(config.schemas_dir.clone())
    }

    /// Resolve a schema reference to a loaded [`ResolvedSchema`].
    ///
    /// Accepts:
    /// - A direct file path (e.g. `schemas/article.json`)
    /// - `name@version` (e.g. `article@1.0.0`)
    /// - `name@latest` (resolved via `registry.json`)
    pub fn resolve(&self, schema_ref: &str) -> Result<ResolvedSchema, AppError> {
        let (path, name) = self.resolve_path(schema_ref)?;

        let definition_str = std::fs::read_to_string(&path).map_err(|e| {
            AppError::SchemaError(format!(
                "Failed to read schema file {}: {e}",
                path.display()
            ))
        })?;

        let definition: SchemaDefinition = serde_json::from_str(&definition_str).map_err(|e| {
            AppError::SchemaError(format!(
                "Invalid schema definition in {}: {e}",
                path.display()
            ))
        })?;

        let schema = Arc::new(definition.into_schema(&name)?);
        tracing::debug!(
            schema = %name,
            path = %path.display(),
            fields = schema.len(),
            "Resolved record schema"
        );

        Ok(ResolvedSchema { path, name, schema })
    }

    /// Map a reference to the file to load and the canonical schema name.
    fn resolve_path(&self, schema_ref: &str) -> Result<(PathBuf, String), AppError> {
        let direct = PathBuf::from(schema_ref);
        if direct.exists() {
            let name = self
                .structured_name(&direct)
                .unwrap_or_else(|| derive_schema_name(&direct));
            return Ok((direct, name));
        }

        let (name, version) = match schema_ref.split_once('@') {
            Some((name, version)) if !name.is_empty() && !version.is_empty() => (name, version),
            Some(_) => {
                return Err(AppError::SchemaError(format!(
                    "Schema must be in the form name@version, got: {schema_ref}"
                )));
            }
            None => return Err(AppError::SchemaError(format!("Schema not found: {schema_ref}"))),
        };
        let version = match version {
            "latest" => self.latest_version(name)?,
            pinned => pinned.to_string(),
        };

        let path = self.schemas_dir.join(name).join(format!("{version}.json"));
        if !path.is_file() {
            return Err(AppError::SchemaError(format!(
                "Schema file not found: {}",
                path.display()
            )));
        }
        Ok((path, format!("{name}@{version}")))
    }

    /// `name@version` for files laid out as `{schemas_dir}/{name}/{version}.json`.
    fn structured_name(&self, path: &Path) -> Option<String> {
        let root = self.schemas_dir.canonicalize().ok()?;
        let file = path.canonicalize().ok()?;
        let relative = file.strip_prefix(&root).ok()?;
        let name = relative.parent()?.to_str()?;
        let version = relative.file_stem()?.to_str()?;
        (!name.is_empty() && !name.contains(std::path::MAIN_SEPARATOR))
            .then(|| format!("{name}@{version}"))
    }

    /// Version pinned as latest for `name` in `registry.json`.
    fn latest_version(&self, name: &str) -> Result<String, AppError> {
        let registry_path = self.schemas_dir.join("registry.json");
        let raw = std::fs::read_to_string(&registry_path).map_err(|e| {
            AppError::SchemaError(format!(
                "Failed to read schema registry {}: {e}",
                registry_path.display()
            ))
        })?;
        let mut registry: HashMap<String, String> = serde_json::from_str(&raw)
            .map_err(|e| AppError::SchemaError(format!("Invalid JSON in schema registry: {e}")))?;
        registry
            .remove(name)
            .ok_or_else(|| AppError::SchemaError(format!("No latest version for schema {name}")))
    }
}
