//! Footprint: serve the records printed by a modelling script.
//!
//! Each `GET /` runs the script once, parses its `key,value,...` output,
//! appends the records to a sqlite store and renders them as HTML.

pub mod config;
pub mod logger;
pub mod pipeline;
pub mod record;
pub mod runner;
pub mod server;
pub mod store;
pub mod utils;
pub mod view;

use crate::{
    config::Config,
    pipeline::Pipeline,
    runner::ScriptRunner,
    store::{RecordStore, SqliteStore},
};

use std::sync::Arc;

use anyhow::Context;

pub async fn boot(config: Config) -> anyhow::Result<()> {
    config.check().context("config error")?;
    if config.api_key.is_some() || config.api_password.is_some() {
        log::debug!("api credentials are set but not used");
    }

    log::info!("opening store {}...", config.db_path.display());
    let store = Arc::new(SqliteStore::open(&config.db_path).context("failed to open store")?);
    let records = store.count().context("failed to read store")?;
    log::info!("records in store: {}", records);

    let runner = ScriptRunner::new(&config.runner);
    log::info!(
        "script: {} {} (max runs: {}, odd tokens: {})",
        config.runner.interpreter.display(),
        runner.script().display(),
        config.runner.max_runs,
        config.odd_tokens
    );
    let shared: Arc<dyn RecordStore> = store.clone();
    let pipeline = Arc::new(Pipeline::new(runner, shared, config.odd_tokens));

    server::serve(config.addr(), pipeline)
        .await
        .context("server error")?;

    match Arc::try_unwrap(store) {
        Ok(store) => store.close().context("failed to close store")?,
        Err(_) => log::warn!("store still in use at shutdown, not closed explicitly"),
    }
    log::info!("bye");
    Ok(())
}
