use footprint::{config::Config, logger, record::OddTokenPolicy, runner::RunnerConf};
use log::LevelFilter;
use std::{net::IpAddr, path::PathBuf, time::Duration};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "footprint",
    about = "Serve the records printed by a modelling script."
)]
struct Settings {
    /// Address to listen at.
    #[structopt(long, env = "HOST", default_value = "127.0.0.1")]
    host: IpAddr,
    /// Port to listen at.
    #[structopt(short, long, env = "PORT", default_value = "5000")]
    port: u16,
    /// Interpreter of the script.
    #[structopt(long, env = "SCRIPT_INTERPRETER", default_value = "python3")]
    interpreter: PathBuf,
    /// Script to run for each page request.
    #[structopt(short, long, env = "SCRIPT_PATH", default_value = "test_script.py")]
    script: PathBuf,
    /// Path to the sqlite database, created if missing.
    #[structopt(short, long = "db", env = "DB_PATH", default_value = "footprint.db")]
    db_path: PathBuf,
    /// Max number of scripts running at the same time.
    #[structopt(short = "j", long, env = "MAX_RUNS", default_value = "4")]
    max_runs: usize,
    /// Kill the script after this many seconds, 0 disables the limit.
    #[structopt(long, env = "SCRIPT_TIMEOUT", default_value = "60")]
    timeout: u64,
    /// Trailing key without value: keep, drop or reject.
    #[structopt(long, env = "ODD_TOKENS", default_value = "keep")]
    odd_tokens: OddTokenPolicy,
    /// Log level: off, error, warn, info, debug or trace.
    #[structopt(long, env = "FOOTPRINT_LOG", default_value = "info")]
    log_level: LevelFilter,
    /// Also write logs to this file.
    #[structopt(long, env = "FOOTPRINT_LOG_FILE")]
    log_file: Option<PathBuf>,
    /// Shopify api key, unused.
    #[structopt(long, env = "API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    /// Shopify api password, unused.
    #[structopt(long, env = "API_PASSWORD", hide_env_values = true)]
    api_password: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let settings = Settings::from_args();
    logger::init(settings.log_level, settings.log_file.as_deref())?;

    let config = Config {
        host: settings.host,
        port: settings.port,
        runner: RunnerConf {
            interpreter: settings.interpreter,
            script: settings.script,
            max_runs: settings.max_runs,
            timeout: match settings.timeout {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        },
        db_path: settings.db_path,
        odd_tokens: settings.odd_tokens,
        api_key: settings.api_key,
        api_password: settings.api_password,
    };

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("footprint-worker")
        .build()?;
    rt.block_on(footprint::boot(config))
}
