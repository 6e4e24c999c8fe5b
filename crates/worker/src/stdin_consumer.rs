use std::sync::Mutex;

use async_trait::async_trait;
use worker_engine::{Consumer, Message};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Demo [`Consumer`] reading newline-delimited job JSON from an async
/// reader (stdin, or a file opened by the caller). A real message-bus
/// client (Kafka, SQS, ...) is out of scope for this crate; this exists so
/// the worker binary is runnable end to end without one.
///
/// `poll` buffers whatever is immediately available up to `batch_size`
/// lines; reaching EOF yields one final, possibly-empty batch and every
/// subsequent call returns empty. `commit_offsets` is a no-op since there
/// is no upstream offset to advance.
pub struct StdinBatchConsumer {
    lines: Mutex<tokio::sync::mpsc::Receiver<String>>,
}

impl StdinBatchConsumer {
    pub fn spawn(reader: Box<dyn tokio::io::AsyncRead + Unpin + Send>) -> Self {
        let (tx, rx) = tokio::sync::mpsc::channel(1024);
        tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if tx.send(line).await.is_err() {
                            return;
                        }
                    }
                    Ok(None) | Err(_) => return,
                }
            }
        });
        Self {
            lines: Mutex::new(rx),
        }
    }
}

#[async_trait]
impl Consumer for StdinBatchConsumer {
    async fn poll(&self, batch_size: usize) -> Vec<Message> {
        let mut rx = self.lines.lock().unwrap();
        let mut batch = Vec::with_capacity(batch_size);

        while batch.len() < batch_size {
            match rx.try_recv() {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        batch.push(Message { value: line.into_bytes() });
                    }
                }
                Err(_) => break,
            }
        }

        batch
    }

    async fn commit_offsets(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
