//! Configuration file loading

use super::schema::ConfigSchema;
use crate::error::{Error, ErrorCode, Result, ResultExt};
use std::path::{Path, PathBuf};

/// Environment variables that override file settings
pub mod env {
    pub const REMOTE_URL: &str = "LARDER_REMOTE_URL";
    pub const AUTH_TOKEN: &str = "LARDER_AUTH_TOKEN";
    pub const DB_PATH: &str = "LARDER_DB_PATH";
    pub const TIMEOUT_SECS: &str = "LARDER_TIMEOUT_SECS";
}

/// Configuration wrapper
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub schema: ConfigSchema,
    /// File the schema was read from, if any
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load from an explicit path, or the first discovered file, or defaults,
    /// then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Same as [`Config::load`] with an injectable environment lookup
    pub fn load_with_env<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config_path = match path {
            Some(p) if !p.exists() => return Err(Error::config_not_found(p)),
            Some(p) => Some(p.to_path_buf()),
            None => find_config_file(),
        };

        let mut schema = match &config_path {
            Some(p) => load_config_file(p)?,
            None => ConfigSchema::default(),
        };

        apply_env_overrides(&mut schema, lookup)?;

        Ok(Self {
            schema,
            path: config_path,
        })
    }
}

/// Find configuration file in standard locations
fn find_config_file() -> Option<PathBuf> {
    let mut candidates = vec![PathBuf::from("larder.toml"), PathBuf::from(".larder.toml")];
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("larder").join("larder.toml"));
    }

    candidates.into_iter().find(|p| p.exists())
}

/// Load and parse a TOML configuration file
fn load_config_file(path: &Path) -> Result<ConfigSchema> {
    let content = std::fs::read_to_string(path)
        .map_err(Error::from)
        .context(format!("Reading {}", path.display()))?;

    toml::from_str(&content)
        .map_err(Error::from)
        .context(format!("Parsing {}", path.display()))
}

fn apply_env_overrides<F>(schema: &mut ConfigSchema, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(env::REMOTE_URL) {
        schema.remote.base_url = url;
    }
    if let Some(token) = lookup(env::AUTH_TOKEN) {
        schema.remote.auth_token = Some(token);
    }
    if let Some(path) = lookup(env::DB_PATH) {
        schema.store.path = PathBuf::from(path);
    }
    if let Some(secs) = lookup(env::TIMEOUT_SECS) {
        schema.remote.timeout_secs = secs.trim().parse().map_err(|_| {
            Error::new(
                ErrorCode::ConfigValidationError,
                format!("{} must be a whole number of seconds, got {:?}", env::TIMEOUT_SECS, secs),
            )
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.path.is_none());
        assert_eq!(config.schema.remote.id_field, "id");
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let err = Config::load_with_env(Some(Path::new("/nonexistent/larder.toml")), no_env)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigNotFound);
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [remote]
            base_url = "https://api.example.com"
            resource_path = "/realestate"

            [store.collection]
            name = "properties"
            fields = [{{ name = "price", kind = "integer" }}]

            [scheduler]
            period_secs = 900
            "#
        )
        .unwrap();

        let config = Config::load_with_env(Some(file.path()), no_env).unwrap();
        assert_eq!(config.schema.remote.resource_path, "/realestate");
        assert_eq!(config.schema.store.collection.name, "properties");
        assert_eq!(config.schema.scheduler.period_secs, Some(900));
        assert!(config.schema.validate().is_ok());
    }

    #[test]
    fn test_parse_error_has_context() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[remote\nbase_url = ").unwrap();

        let err = Config::load_with_env(Some(file.path()), no_env).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigParseError);
        assert!(err.context.is_some());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (env::REMOTE_URL, "http://localhost:8080"),
            (env::AUTH_TOKEN, "secret"),
            (env::DB_PATH, "/tmp/x.db"),
            (env::TIMEOUT_SECS, "5"),
        ]
        .into_iter()
        .collect();

        let mut schema = ConfigSchema::default();
        apply_env_overrides(&mut schema, |k| vars.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(schema.remote.base_url, "http://localhost:8080");
        assert_eq!(schema.remote.auth_token.as_deref(), Some("secret"));
        assert_eq!(schema.store.path, PathBuf::from("/tmp/x.db"));
        assert_eq!(schema.remote.timeout_secs, 5);
    }

    #[test]
    fn test_bad_timeout_override() {
        let mut schema = ConfigSchema::default();
        let result = apply_env_overrides(&mut schema, |k| {
            (k == env::TIMEOUT_SECS).then(|| "soon".to_string())
        });
        assert!(result.is_err());
    }
}
