use crate::record::OddTokenPolicy;
use crate::runner::RunnerConf;

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    time::Duration,
};

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    /// Address to listen at.
    pub host: IpAddr,
    pub port: u16,
    /// Script to run for each page request.
    pub runner: RunnerConf,
    /// Path of the sqlite database.
    pub db_path: PathBuf,
    pub odd_tokens: OddTokenPolicy,
    /// Shopify credentials. Read from the environment but currently unused,
    /// the modelling script loads its own.
    pub api_key: Option<String>,
    pub api_password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 5000,
            runner: RunnerConf::default(),
            db_path: PathBuf::from("footprint.db"),
            odd_tokens: OddTokenPolicy::default(),
            api_key: None,
            api_password: None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("script not found: {0}")]
    ScriptNotFound(String),
    #[error("empty interpreter")]
    EmptyInterpreter,
    #[error("max runs should be at least 1")]
    NoRuns,
    #[error("script timeout should be greater than 0")]
    ZeroTimeout,
    #[error("database directory not found: {0}")]
    DbDirNotFound(String),
}

impl Config {
    pub fn check(&self) -> Result<(), ConfigError> {
        let runner = &self.runner;
        if runner.interpreter.as_os_str().is_empty() {
            return Err(ConfigError::EmptyInterpreter);
        }
        if !runner.script.is_file() {
            return Err(ConfigError::ScriptNotFound(
                runner.script.display().to_string(),
            ));
        }
        if runner.max_runs == 0 {
            return Err(ConfigError::NoRuns);
        }
        if runner.timeout == Some(Duration::from_secs(0)) {
            return Err(ConfigError::ZeroTimeout);
        }
        if let Some(dir) = self.db_path.parent() {
            if dir != Path::new("") && !dir.is_dir() {
                return Err(ConfigError::DbDirNotFound(dir.display().to_string()));
            }
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
