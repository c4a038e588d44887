//! Configuration and data directory management.
//!
//! Settings come from a TOML file (the `[snowflakeconnection]` table mirrors
//! the hosted connection secrets) with environment variables layered on top.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::input::validate_identifier;

pub const DEFAULT_CONFIG_FILE: &str = "lylyric.toml";
pub const DEFAULT_PORT: u16 = 8501;
pub const DEFAULT_TABLE: &str = "LYLYRIC";
pub const DEFAULT_SIMILAR_LIMIT: usize = 5;

/// Paths to all Ly-Lyric data files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// Local SQLite backend directory (`data/db/`).
    pub db_dir: PathBuf,
    /// Checkout of the lyrics corpus (`data/lyrics-database/`).
    pub corpus_dir: PathBuf,
    /// Completion provider configuration (`data/llm-config.json`).
    pub llm_config_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            db_dir: root.join("db"),
            corpus_dir: root.join("lyrics-database"),
            llm_config_file: root.join("llm-config.json"),
            root,
        };
        std::fs::create_dir_all(&paths.db_dir)?;
        Ok(paths)
    }
}

/// Connection settings for the hosted warehouse, search and completion services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnowflakeSettings {
    /// Account identifier, e.g. `myorg-myaccount`.
    pub account: String,
    pub user: String,
    /// Programmatic access token used as the bearer credential.
    #[serde(skip_serializing)]
    pub password: String,
    pub warehouse: String,
    pub database: String,
    pub schema: String,
    pub role: Option<String>,
    /// Cortex Search service over the lyrics table.
    pub search_service: Option<String>,
}

/// `[snowflakeconnection]` as written in the file; every key optional so env
/// variables can fill the gaps.
#[derive(Debug, Clone, Default, Deserialize)]
struct RawSnowflake {
    account: Option<String>,
    user: Option<String>,
    password: Option<String>,
    warehouse: Option<String>,
    database: Option<String>,
    schema: Option<String>,
    role: Option<String>,
    search_service: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawConfig {
    port: Option<u16>,
    data_dir: Option<PathBuf>,
    table: Option<String>,
    similar_limit: Option<usize>,
    #[serde(default, rename = "snowflakeconnection")]
    snowflake: RawSnowflake,
}

/// Top-level Ly-Lyric configuration.
#[derive(Debug, Clone, Serialize)]
pub struct LylyricConfig {
    /// HTTP server port.
    pub port: u16,
    /// Root of local data (SQLite backend, corpus checkout, LLM config).
    pub data_dir: PathBuf,
    /// Lyrics table name, validated as an identifier.
    pub table: String,
    /// Number of similar songs shown per lookup.
    pub similar_limit: usize,
    /// Hosted backend; `None` selects the local SQLite backend.
    pub snowflake: Option<SnowflakeSettings>,
}

impl LylyricConfig {
    /// Load from `path` (or `LYLYRIC_CONFIG`, or `./lylyric.toml`) and the
    /// process environment. A missing default file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("LYLYRIC_CONFIG").ok().map(PathBuf::from));

        let contents = match &explicit {
            Some(p) => Some(std::fs::read_to_string(p).map_err(|e| {
                Error::Config(format!("Cannot read config {}: {}", p.display(), e))
            })?),
            None => std::fs::read_to_string(DEFAULT_CONFIG_FILE).ok(),
        };

        if contents.is_none() {
            debug!("No config file found, using environment and defaults");
        }

        Self::from_sources(contents.as_deref(), |key| std::env::var(key).ok())
    }

    /// Build configuration from file contents and an environment lookup.
    pub fn from_sources<F>(contents: Option<&str>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw: RawConfig = match contents {
            Some(s) => toml::from_str(s).map_err(|e| Error::Config(e.to_string()))?,
            None => RawConfig::default(),
        };

        let port = match env("PORT") {
            Some(p) => p
                .parse()
                .map_err(|_| Error::Config(format!("PORT is not a port number: {}", p)))?,
            None => raw.port.unwrap_or(DEFAULT_PORT),
        };

        let data_dir = env("LYLYRIC_DATA_DIR")
            .map(PathBuf::from)
            .or(raw.data_dir)
            .unwrap_or_else(|| PathBuf::from("data"));

        let table = raw.table.unwrap_or_else(|| DEFAULT_TABLE.into());
        validate_identifier(&table)?;

        let similar_limit = raw.similar_limit.unwrap_or(DEFAULT_SIMILAR_LIMIT);
        if similar_limit == 0 {
            return Err(Error::Config("similar_limit must be at least 1".into()));
        }

        let snowflake = Self::resolve_snowflake(raw.snowflake, &env)?;

        match &snowflake {
            Some(s) => info!("Using hosted warehouse: account={}, table={}", s.account, table),
            None => info!("Using local SQLite backend under {}", data_dir.display()),
        }

        Ok(Self {
            port,
            data_dir,
            table,
            similar_limit,
            snowflake,
        })
    }

    /// Merge file and env values. All-absent means local mode; partially set
    /// connection settings are an error rather than a silent fallback.
    fn resolve_snowflake<F>(raw: RawSnowflake, env: &F) -> Result<Option<SnowflakeSettings>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |key: &str, file: Option<String>| env(key).or(file).filter(|v| !v.trim().is_empty());

        let account = pick("SNOWFLAKE_ACCOUNT", raw.account);
        let user = pick("SNOWFLAKE_USER", raw.user);
        let password = pick("SNOWFLAKE_PASSWORD", raw.password);
        let warehouse = pick("SNOWFLAKE_WAREHOUSE", raw.warehouse);
        let database = pick("SNOWFLAKE_DATABASE", raw.database);
        let schema = pick("SNOWFLAKE_SCHEMA", raw.schema);
        let role = pick("SNOWFLAKE_ROLE", raw.role);
        let search_service = pick("SNOWFLAKE_SEARCH_SERVICE", raw.search_service);

        let required = [
            ("account", &account),
            ("user", &user),
            ("password", &password),
            ("warehouse", &warehouse),
            ("database", &database),
            ("schema", &schema),
        ];

        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(k, _)| *k)
            .collect();

        if missing.len() == required.len() {
            return Ok(None);
        }
        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "Incomplete snowflakeconnection settings, missing: {}",
                missing.join(", ")
            )));
        }

        if let Some(service) = &search_service {
            validate_identifier(service)?;
        }

        Ok(Some(SnowflakeSettings {
            account: account.unwrap_or_default(),
            user: user.unwrap_or_default(),
            password: password.unwrap_or_default(),
            warehouse: warehouse.unwrap_or_default(),
            database: database.unwrap_or_default(),
            schema: schema.unwrap_or_default(),
            role,
            search_service,
        }))
    }

    /// Resolve and create the data directories.
    pub fn data_paths(&self) -> std::io::Result<DataPaths> {
        DataPaths::new(&self.data_dir)
    }
}
