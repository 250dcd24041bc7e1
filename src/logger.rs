use std::{fs::OpenOptions, io, path::Path};

use simplelog::*;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("open log file: {0}")]
    File(#[from] io::Error),
    #[error("logger already set: {0}")]
    Init(#[from] log::SetLoggerError),
}

/// Log to the terminal, and to `file` too if given.
pub fn init(level: LevelFilter, file: Option<&Path>) -> Result<(), LoggerError> {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    if let Some(path) = file {
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        loggers.push(WriteLogger::new(level, Config::default(), f));
    }
    CombinedLogger::init(loggers)?;
    Ok(())
}
