use anyhow::{Context, Result};
use jsonapi_core::{QueryConfig, SchemaDecl, SchemaRegistry};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::home_dir::{resolve_against, resolve_home_dir};

/// Application configuration: server and logging sections plus the query engine setup.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    /// Logging configuration (optional, uses defaults if None).
    pub logging: Option<LoggingConfig>,
    /// Limits applied by the query parser.
    #[serde(default)]
    pub query: QueryConfig,
    /// Resource schemas served by the engine.
    #[serde(default)]
    pub resources: Vec<SchemaDecl>,
    /// Directory of YAML files, each declaring one more resource schema.
    #[serde(default)]
    pub resources_dir: Option<String>,
    /// JSON document (`{"data": [...]}`) seeding the in-memory repository.
    #[serde(default)]
    pub fixtures: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub home_dir: String, // normalized to an absolute path on load
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub timeout_sec: u64,
}

/// Subsystem name → logging settings. Key "default" catches everything else.
pub type LoggingConfig = HashMap<String, Section>;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Section {
    pub console_level: String, // "info", "debug", "error", "off"
    pub file: String,          // "logs/api.log"
    #[serde(default)]
    pub file_level: String,
    pub max_age_days: Option<u32>,
    #[serde(default)]
    pub max_backups: Option<usize>,
    #[serde(default)]
    pub max_size_mb: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            // Empty => $HOME/.jsonapi (%APPDATA% on Windows)
            home_dir: String::new(),
            host: "127.0.0.1".to_string(),
            port: 8087,
            timeout_sec: 0,
        }
    }
}

pub fn default_logging_config() -> LoggingConfig {
    let mut logging = HashMap::new();
    logging.insert(
        "default".to_string(),
        Section {
            console_level: "info".to_string(),
            file: "logs/jsonapi.log".to_string(),
            file_level: "debug".to_string(),
            max_age_days: Some(7),
            max_backups: Some(3),
            max_size_mb: Some(100),
        },
    );
    logging
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: Some(default_logging_config()),
            query: QueryConfig::default(),
            resources: Vec::new(),
            resources_dir: None,
            fixtures: None,
        }
    }
}

const DEFAULT_SUBDIR: &str = ".jsonapi";

impl AppConfig {
    /// Defaults → YAML file → `APP__` environment variables.
    ///
    /// `server.home_dir` is normalized and created; `resources_dir` and `fixtures`
    /// are resolved against the directory holding the config file.
    pub fn load_layered<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        use figment::{
            providers::{Env, Format, Serialized, Yaml},
            Figment,
        };

        let config_path = config_path.as_ref();
        let base = AppConfig {
            logging: None,
            ..AppConfig::default()
        };

        let figment = Figment::new()
            .merge(Serialized::defaults(base))
            .merge(Yaml::file(config_path))
            // APP__SERVER__PORT=8087 maps to server.port
            .merge(Env::prefixed("APP__").split("__"));

        let mut config: AppConfig = figment
            .extract()
            .with_context(|| format!("Failed to load config from '{}'", config_path.display()))?;
        config.query.validate().context("Invalid 'query' section")?;

        normalize_home_dir_inplace(&mut config.server)
            .context("Failed to resolve server.home_dir")?;

        let config_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        if let Some(dir) = config.resources_dir.take() {
            let dir = resolve_against(&dir, &config_dir);
            merge_resource_files(&mut config.resources, &dir)?;
            config.resources_dir = Some(dir.to_string_lossy().into_owned());
        }
        if let Some(fixtures) = config.fixtures.as_mut() {
            *fixtures = resolve_against(fixtures, &config_dir)
                .to_string_lossy()
                .into_owned();
        }

        Ok(config)
    }

    /// Loads from `config_path` if given, otherwise uses defaults (home_dir still normalized).
    pub fn load_or_default<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_layered(path),
            None => {
                let mut c = Self::default();
                normalize_home_dir_inplace(&mut c.server)
                    .context("Failed to resolve server.home_dir (defaults)")?;
                Ok(c)
            }
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config to YAML")
    }

    /// Builds the schema registry from `resources`.
    pub fn schema_registry(&self) -> Result<SchemaRegistry> {
        SchemaRegistry::from_decls(self.resources.iter().cloned())
            .context("Invalid resource declarations")
    }

    pub fn fixtures_path(&self) -> Option<PathBuf> {
        self.fixtures.as_deref().map(PathBuf::from)
    }

    /// Port and verbosity from the command line win over the loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(port) = args.port {
            self.server.port = port;
        }

        let logging = self.logging.get_or_insert_with(default_logging_config);
        if let Some(default_section) = logging.get_mut("default") {
            match args.verbose {
                0 => {}
                1 => default_section.console_level = "debug".to_string(),
                _ => default_section.console_level = "trace".to_string(),
            }
        }
    }
}

/// Command line arguments the config layer cares about.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config: Option<String>,
    pub port: Option<u16>,
    pub print_config: bool,
    pub verbose: u8,
}

fn normalize_home_dir_inplace(server: &mut ServerConfig) -> Result<()> {
    let opt = if server.home_dir.trim().is_empty() {
        None
    } else {
        Some(server.home_dir.clone())
    };

    let resolved = resolve_home_dir(opt, DEFAULT_SUBDIR, true)?;
    server.home_dir = resolved.to_string_lossy().to_string();
    Ok(())
}

/// Appends one `SchemaDecl` per `*.yaml`/`*.yml` file in `dir`, in file name order.
fn merge_resource_files(resources: &mut Vec<SchemaDecl>, dir: &Path) -> Result<()> {
    use std::fs;
    if !dir.exists() {
        tracing::warn!(dir = %dir.display(), "resources_dir does not exist");
        return Ok(());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        if path.is_file() && (ext == "yml" || ext == "yaml") {
            files.push(path);
        }
    }
    files.sort();
    for path in files {
        let raw = fs::read_to_string(&path)?;
        let decl: SchemaDecl = serde_yaml::from_str(&raw)
            .with_context(|| format!("Invalid resource file '{}'", path.display()))?;
        resources.push(decl);
    }
    Ok(())
}
