use std::io;
use std::sync::{Arc, Mutex};

use bytes::BytesMut;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    sync::mpsc,
    task::JoinHandle,
};

const DEFAULT_BUF_SZ: usize = 4096;

/// Collects everything written to a pipe in the background.
pub struct LogReader {
    buf: Arc<Mutex<Vec<u8>>>,
    handle: JoinHandle<Option<io::Error>>,
}

impl LogReader {
    /// Spawns a new task for reading.
    pub fn new<R: Unpin + Send + AsyncRead + 'static>(mut file: R) -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let buf0 = Arc::clone(&buf);

        let handle = tokio::spawn(async move {
            let mut buf = vec![0; DEFAULT_BUF_SZ];
            loop {
                match file.read(&mut buf[..]).await {
                    Ok(0) => break None,
                    Ok(bytes_read) => {
                        let mut shared_buf = buf0.lock().unwrap_or_else(|e| e.into_inner());
                        shared_buf.extend(&buf[..bytes_read]);
                    }
                    Err(e) => break Some(e),
                }
            }
        });
        LogReader { buf, handle }
    }

    pub fn current_string(&self) -> String {
        lossy(&self.buf)
    }

    /// Waits for EOF and returns all content, lossy decoded.
    pub async fn read_to_string(self) -> (String, Option<io::Error>) {
        let LogReader { buf, handle } = self;
        let err = match handle.await {
            Ok(err) => err,
            Err(e) => Some(io::Error::new(io::ErrorKind::Other, e)),
        };
        (lossy(&buf), err)
    }
}

fn lossy(buf: &Mutex<Vec<u8>>) -> String {
    let buf = buf.lock().unwrap_or_else(|e| e.into_inner());
    String::from_utf8_lossy(&buf).into_owned()
}

/// Forwards chunks read from `src` until EOF or the first error.
pub fn redirect<T: AsyncRead + Send + Unpin + 'static>(
    mut src: T,
) -> mpsc::UnboundedReceiver<io::Result<BytesMut>> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        loop {
            let mut buf = BytesMut::with_capacity(DEFAULT_BUF_SZ);
            match src.read_buf(&mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    if tx.send(Ok(buf)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e));
                    break;
                }
            }
        }
    });
    rx
}
