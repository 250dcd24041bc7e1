//! Spawn the modelling script and stream its stdout.
use crate::utils::{redirect, LogReader};

use std::{
    io,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
    sync::Arc,
    time::Duration,
};

use bytes::BytesMut;
use thiserror::Error;
use tokio::{
    process::{Child, Command},
    sync::{mpsc, OwnedSemaphorePermit, Semaphore},
};

#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("script exited with {status}: {stderr}")]
    Exit { status: ExitStatus, stderr: String },
    #[error("script did not finish within {0:?}")]
    Timeout(Duration),
    #[error("runner closed")]
    Closed,
}

/// Configuration of the script runner.
#[derive(Debug, Clone)]
pub struct RunnerConf {
    /// Interpreter to run the script with, default is "python3".
    pub interpreter: PathBuf,
    /// Path to the script, passed as the only argument.
    pub script: PathBuf,
    /// Max number of scripts alive at the same time.
    pub max_runs: usize,
    /// Kill the script if it runs longer than this, default is 60s.
    pub timeout: Option<Duration>,
}

/// A hung script holds its run slot until it is killed.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

impl Default for RunnerConf {
    fn default() -> Self {
        Self {
            interpreter: PathBuf::from("python3"),
            script: PathBuf::from("test_script.py"),
            max_runs: 4,
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }
}

/// Runs the script, one process per call to `run`.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    interpreter: PathBuf,
    script: PathBuf,
    timeout: Option<Duration>,
    slots: Arc<Semaphore>,
}

impl ScriptRunner {
    pub fn new(conf: &RunnerConf) -> Self {
        Self {
            interpreter: conf.interpreter.clone(),
            script: conf.script.clone(),
            timeout: conf.timeout,
            slots: Arc::new(Semaphore::new(conf.max_runs)),
        }
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    /// Spawn the script once. Waits for a free slot if `max_runs` scripts are alive.
    pub async fn run(&self) -> Result<ScriptOutput, SubprocessError> {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| SubprocessError::Closed)?;

        let mut cmd = Command::new(&self.interpreter);
        cmd.arg(&self.script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| SubprocessError::Spawn {
            program: self.interpreter.display().to_string(),
            source: e,
        })?;
        log::debug!(
            "spawned {} {} (pid {:?})",
            self.interpreter.display(),
            self.script.display(),
            child.id()
        );

        let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;
        Ok(ScriptOutput {
            child,
            chunks: redirect(stdout),
            stderr: Some(LogReader::new(stderr)),
            timeout: self.timeout,
            _permit: permit,
        })
    }
}

fn missing_pipe(name: &str) -> SubprocessError {
    SubprocessError::Io(io::Error::new(
        io::ErrorKind::BrokenPipe,
        format!("{} of script not captured", name),
    ))
}

/// Output of one running script. Dropping it kills the script.
pub struct ScriptOutput {
    child: Child,
    chunks: mpsc::UnboundedReceiver<io::Result<BytesMut>>,
    stderr: Option<LogReader>,
    timeout: Option<Duration>,
    _permit: OwnedSemaphorePermit,
}

impl ScriptOutput {
    /// Next chunk of stdout, None once the script closed it.
    pub async fn next_chunk(&mut self) -> Option<Result<BytesMut, SubprocessError>> {
        let chunk = self.chunks.recv().await?;
        Some(chunk.map_err(SubprocessError::Io))
    }

    /// Buffer all of stdout, then wait for the script to exit.
    ///
    /// Chunks are never parsed on their own, a token may be split between two
    /// of them.
    pub async fn drain(mut self) -> Result<String, SubprocessError> {
        match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.collect()).await {
                Ok(ret) => ret,
                Err(_) => {
                    log::warn!("script timed out after {:?}, killing it", limit);
                    Err(SubprocessError::Timeout(limit))
                }
            },
            None => self.collect().await,
        }
    }

    async fn collect(&mut self) -> Result<String, SubprocessError> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.next_chunk().await {
            let chunk = chunk?;
            log::debug!("script output: {} bytes", chunk.len());
            buf.extend_from_slice(&chunk);
        }

        let status = self.child.wait().await?;
        let stderr = match self.stderr.take() {
            Some(reader) => reader.read_to_string().await.0,
            None => String::new(),
        };
        if !status.success() {
            return Err(SubprocessError::Exit { status, stderr });
        }
        if !stderr.is_empty() {
            log::warn!("script stderr: {}", stderr.trim_end());
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn script(dir: &Path, body: &str) -> RunnerConf {
        let path = dir.join("script.sh");
        fs::write(&path, body).unwrap();
        RunnerConf {
            interpreter: PathBuf::from("sh"),
            script: path,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn drain_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let conf = script(dir.path(), "printf 'name,Alice,age,30'\n");
        let out = ScriptRunner::new(&conf).run().await.unwrap();
        assert_eq!(out.drain().await.unwrap(), "name,Alice,age,30");
    }

    #[tokio::test]
    async fn chunks_are_joined() {
        let dir = tempfile::tempdir().unwrap();
        let conf = script(
            dir.path(),
            "printf 'na'\nsleep 0.2\nprintf 'me,Al'\nsleep 0.2\nprintf 'ice'\n",
        );
        let out = ScriptRunner::new(&conf).run().await.unwrap();
        assert_eq!(out.drain().await.unwrap(), "name,Alice");
    }

    #[tokio::test]
    async fn next_chunk_ends() {
        let dir = tempfile::tempdir().unwrap();
        let conf = script(dir.path(), "printf 'k,v'\n");
        let mut out = ScriptRunner::new(&conf).run().await.unwrap();
        let mut got = Vec::new();
        while let Some(chunk) = out.next_chunk().await {
            got.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(got, b"k,v");
        assert!(out.next_chunk().await.is_none());
    }

    #[tokio::test]
    async fn non_zero_exit() {
        let dir = tempfile::tempdir().unwrap();
        let conf = script(dir.path(), "printf 'k,v'\necho boom >&2\nexit 3\n");
        let out = ScriptRunner::new(&conf).run().await.unwrap();
        match out.drain().await {
            Err(SubprocessError::Exit { status, stderr }) => {
                assert_eq!(status.code(), Some(3));
                assert_eq!(stderr.trim(), "boom");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn spawn_failure() {
        let conf = RunnerConf {
            interpreter: PathBuf::from("/nonexistent/interpreter"),
            ..Default::default()
        };
        match ScriptRunner::new(&conf).run().await {
            Err(SubprocessError::Spawn { program, .. }) => {
                assert_eq!(program, "/nonexistent/interpreter")
            }
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("spawned a missing interpreter"),
        }
    }

    #[tokio::test]
    async fn timeout() {
        let dir = tempfile::tempdir().unwrap();
        let mut conf = script(dir.path(), "sleep 5\n");
        conf.timeout = Some(Duration::from_millis(100));
        let out = ScriptRunner::new(&conf).run().await.unwrap();
        match out.drain().await {
            Err(SubprocessError::Timeout(d)) => assert_eq!(d, Duration::from_millis(100)),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn default_timeout() {
        assert_eq!(RunnerConf::default().timeout, Some(DEFAULT_TIMEOUT));
    }

    fn marked(dir: &Path) -> (RunnerConf, PathBuf) {
        let marker = dir.join("ran");
        let conf = script(dir, &format!("sleep 1\ntouch '{}'\n", marker.display()));
        (conf, marker)
    }

    #[tokio::test]
    async fn timeout_kills_script() {
        let dir = tempfile::tempdir().unwrap();
        let (mut conf, marker) = marked(dir.path());
        conf.timeout = Some(Duration::from_millis(100));
        let out = ScriptRunner::new(&conf).run().await.unwrap();
        assert!(matches!(out.drain().await, Err(SubprocessError::Timeout(_))));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn drop_kills_script() {
        let dir = tempfile::tempdir().unwrap();
        let (conf, marker) = marked(dir.path());
        let out = ScriptRunner::new(&conf).run().await.unwrap();
        drop(out);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn runs_are_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let mut conf = script(dir.path(), "printf 'k,v'\n");
        conf.max_runs = 1;
        let runner = ScriptRunner::new(&conf);

        let first = runner.run().await.unwrap();
        let blocked = tokio::time::timeout(Duration::from_millis(100), runner.run()).await;
        assert!(blocked.is_err());

        first.drain().await.unwrap();
        let second = runner.run().await.unwrap();
        assert_eq!(second.drain().await.unwrap(), "k,v");
    }
}
