use crate::metrics::{requests, worker};
use config::Config;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const FLAG_PRINT_CONFIG: &str = "--print-config";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Log {
    pub enable_stdout: bool,
    pub enable_log_file: bool,
    pub log_file_directory: Option<String>,
    pub level: String,
    pub directives: Vec<String>,
    pub max_log_files: usize,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            enable_stdout: true,
            enable_log_file: false,
            log_file_directory: Some("/tmp/var/log/undertow-metrics/".to_owned()),
            level: "INFO".to_owned(),
            directives: vec![],
            max_log_files: 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Http {
    pub address: String,
    pub port: u16,
    pub timeout: u64,
}

impl Default for Http {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_owned(),
            port: 8080,
            timeout: Duration::from_secs(10).as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Runtime {
    /// Number of I/O worker threads. Tokio picks one per core when unset.
    pub worker_threads: Option<usize>,
    pub max_blocking_threads: usize,
    /// Name under which the runtime is registered in the management server.
    pub worker_name: String,
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            worker_threads: None,
            max_blocking_threads: 512,
            worker_name: worker::DEFAULT_WORKER.to_owned(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Metrics {
    pub requests: requests::Config,
    pub worker: worker::Config,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub log: Log,
    pub http: Http,
    pub runtime: Runtime,
    pub metrics: Metrics,
}

impl Configuration {
    pub fn load(base_path: impl AsRef<Path>) -> Result<Self, config::ConfigError> {
        let base_path = base_path.as_ref();

        let cfg = Config::builder()
            .add_source(
                config::File::from(base_path.join("config.toml"))
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::File::from(base_path.join("config.json"))
                    .format(config::FileFormat::Json)
                    .required(false),
            )
            .add_source(config::Environment::with_prefix("CFG").separator("__"))
            .build()?;

        cfg.try_deserialize()
    }
}

/// The first positional argument is the directory holding the configuration
/// files. Defaults to the working directory.
pub fn get_config_base_path(args: impl IntoIterator<Item = String>) -> anyhow::Result<PathBuf> {
    let positional = args
        .into_iter()
        .skip(1)
        .filter(|arg| !arg.starts_with("--"))
        .collect::<Vec<_>>();

    match positional.as_slice() {
        [] => Ok(PathBuf::from("./")),
        [path] => Ok(PathBuf::from(path)),
        _ => Err(anyhow::anyhow!(
            "Expected at most one configuration directory, got {:?}",
            positional
        )),
    }
}

pub fn should_print_config_and_exit(args: impl IntoIterator<Item = String>) -> bool {
    args.into_iter().skip(1).any(|arg| arg == FLAG_PRINT_CONFIG)
}

pub fn print_config(configuration: &Configuration) -> anyhow::Result<()> {
    println!("{}", toml::to_string_pretty(configuration)?);
    Ok(())
}
