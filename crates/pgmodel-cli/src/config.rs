use pgmodel::{ModelConfig, MonitorSettings};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub config_dir: PathBuf,
    pub file: ConfigFile,
}

impl ProjectConfig {
    /// Read and expand a config file. A missing file at the default path
    /// yields the defaults; a missing explicit path is an error.
    pub fn load(config_path: &Path, explicit: bool) -> anyhow::Result<Self> {
        let config_dir = config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        if !explicit && !config_path.exists() {
            return Ok(Self {
                config_dir,
                file: ConfigFile::default(),
            });
        }

        let raw = std::fs::read_to_string(config_path).map_err(|e| {
            anyhow::anyhow!(
                "failed to read config file {}: {e}",
                config_path.display()
            )
        })?;

        let mut file: ConfigFile = toml::from_str(&raw).map_err(|e| {
            anyhow::anyhow!(
                "failed to parse config file {}: {e}",
                config_path.display()
            )
        })?;

        file.expand_env()?;
        file.validate()?;

        Ok(Self { config_dir, file })
    }

    pub fn resolve_path(&self, p: impl AsRef<Path>) -> PathBuf {
        let p = p.as_ref();
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.config_dir.join(p)
        }
    }

    /// Database URL: command line, then config file, then `DATABASE_URL`.
    pub fn database_url(&self, cli: Option<&str>) -> anyhow::Result<String> {
        if let Some(url) = cli {
            return Ok(url.to_string());
        }
        if let Some(db) = &self.file.database {
            return Ok(db.url.clone());
        }
        std::env::var("DATABASE_URL").map_err(|_| {
            anyhow::anyhow!("no database url: pass --database, set [database] url or DATABASE_URL")
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub database: Option<DatabaseConfig>,

    #[serde(default)]
    pub models: ModelsConfig,

    /// Request shaping (reserved keys, LIKE flavour, limit cap).
    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub monitor: MonitorSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_pool_size() -> usize {
    4
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelsConfig {
    #[serde(default = "default_models_dir")]
    pub dir: String,
}

fn default_models_dir() -> String {
    "models".to_string()
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            dir: default_models_dir(),
        }
    }
}

impl ConfigFile {
    fn expand_env(&mut self) -> anyhow::Result<()> {
        if let Some(db) = self.database.as_mut() {
            db.url = expand_env_vars(&db.url)?;
        }
        self.models.dir = expand_env_vars(&self.models.dir)?;
        Ok(())
    }

    fn validate(&self) -> anyhow::Result<()> {
        if let Some(db) = &self.database {
            if db.url.trim().is_empty() {
                anyhow::bail!("database.url must not be empty");
            }
            if db.pool_size == 0 {
                anyhow::bail!("database.pool_size must be at least 1");
            }
        }
        if self.models.dir.trim().is_empty() {
            anyhow::bail!("models.dir must not be empty");
        }
        Ok(())
    }
}

fn expand_env_vars(input: &str) -> anyhow::Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();

            let mut key = String::new();
            let mut closed = false;
            for ch in chars.by_ref() {
                if ch == '}' {
                    closed = true;
                    break;
                }
                key.push(ch);
            }

            if !closed {
                anyhow::bail!("unterminated env var reference: ${{{key}}}");
            }
            if key.is_empty() {
                anyhow::bail!("invalid env var reference: ${{}}");
            }

            let v = std::env::var(&key)
                .map_err(|_| anyhow::anyhow!("missing env var for config expansion: {key}"))?;
            out.push_str(&v);
            continue;
        }

        out.push(c);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_known_vars() {
        let key = format!("PGMODEL_TEST_HOST_{}", std::process::id());
        // SAFETY: the key is unique to this test process.
        unsafe { std::env::set_var(&key, "db.internal") };
        let input = format!("postgres://app@${{{key}}}/shop");
        assert_eq!(
            expand_env_vars(&input).unwrap(),
            "postgres://app@db.internal/shop"
        );
        assert_eq!(expand_env_vars("plain").unwrap(), "plain");
    }

    #[test]
    fn rejects_bad_references() {
        assert!(expand_env_vars("${UNTERMINATED").is_err());
        assert!(expand_env_vars("${}").is_err());
        assert!(expand_env_vars("${PGMODEL_SURELY_NOT_SET_ANYWHERE}").is_err());
    }

    #[test]
    fn parses_full_file() {
        let file: ConfigFile = toml::from_str(
            r#"
            [database]
            url = "postgres://localhost/shop"
            pool_size = 8

            [models]
            dir = "defs"

            [model]
            max_limit = 100
            case_insensitive_like = true

            [model.reserved]
            join = "with"

            [monitor]
            slow_query_ms = 200
            "#,
        )
        .unwrap();
        file.validate().unwrap();
        assert_eq!(file.database.as_ref().unwrap().pool_size, 8);
        assert_eq!(file.models.dir, "defs");
        assert_eq!(file.model.max_limit, Some(100));
        assert_eq!(file.model.reserved.join, "with");
        assert_eq!(file.model.reserved.order_by, "xorder_by");
        assert_eq!(file.monitor.slow_query_ms, Some(200));
    }

    #[test]
    fn missing_default_file_uses_defaults() {
        let config =
            ProjectConfig::load(Path::new("/nonexistent/pgmodel.toml"), false).unwrap();
        assert_eq!(config.file.models.dir, "models");
        assert!(config.file.database.is_none());
        assert!(ProjectConfig::load(Path::new("/nonexistent/pgmodel.toml"), true).is_err());
    }
}
