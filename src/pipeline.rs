//! Run the script, store what it printed, build the page.
use crate::{
    record::{parse_with, OddTokenPolicy, ParseError},
    runner::{ScriptRunner, SubprocessError},
    store::{PersistenceError, RecordStore},
    view::IndexView,
};

use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("subprocess: {0}")]
    Subprocess(#[from] SubprocessError),
    #[error("parse: {0}")]
    Parse(#[from] ParseError),
    #[error("persistence: {0}")]
    Persistence(#[from] PersistenceError),
}

pub struct Pipeline {
    runner: ScriptRunner,
    store: Arc<dyn RecordStore>,
    policy: OddTokenPolicy,
}

impl Pipeline {
    pub fn new(runner: ScriptRunner, store: Arc<dyn RecordStore>, policy: OddTokenPolicy) -> Self {
        Self {
            runner,
            store,
            policy,
        }
    }

    pub fn runner(&self) -> &ScriptRunner {
        &self.runner
    }

    /// One full pass for one request.
    ///
    /// Nothing is written unless the script exits successfully, and an empty
    /// record set is never written.
    pub async fn run(&self) -> Result<IndexView, PipelineError> {
        let raw = self.runner.run().await?.drain().await?;
        let records = parse_with(&raw, self.policy)?;
        log::info!("script printed {} records", records.len());

        let store = Arc::clone(&self.store);
        let view = tokio::task::spawn_blocking(move || -> Result<IndexView, PersistenceError> {
            if !records.is_empty() {
                store.write(&records)?;
            }
            let stored = store.read_all()?;
            Ok(IndexView::new(records, stored))
        })
        .await
        .map_err(PersistenceError::from)??;
        Ok(view)
    }
}
