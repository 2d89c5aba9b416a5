//! Live partial-result streams.

use crate::error::ClientError;
use serde_json::Value;
use tokio::sync::mpsc;

/// Capacity of the per-request stream channel. Bounded so a slow consumer
/// suspends the session's frame handling instead of buffering without limit.
pub(crate) const STREAM_CHANNEL_CAPACITY: usize = 32;

/// A sequence of partial results for one streaming request.
///
/// Items arrive in frame-arrival order. The stream ends after the terminal
/// frame; an error (application, decode, or connection) is delivered as a
/// final `Err` item before the end.
pub struct ReplyStream {
    rx: mpsc::Receiver<Result<Value, ClientError>>,
}

impl ReplyStream {
    pub(crate) fn new(rx: mpsc::Receiver<Result<Value, ClientError>>) -> Self {
        Self { rx }
    }

    /// Waits for the next partial result. `None` means the stream ended.
    pub async fn next(&mut self) -> Option<Result<Value, ClientError>> {
        self.rx.recv().await
    }

    /// Drains the stream, collecting every partial result, or returns the
    /// first error.
    pub async fn collect(mut self) -> Result<Vec<Value>, ClientError> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await {
            items.push(item?);
        }
        Ok(items)
    }
}

pub(crate) fn channel() -> (mpsc::Sender<Result<Value, ClientError>>, ReplyStream) {
    let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
    (tx, ReplyStream::new(rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collect_in_order() {
        let (tx, stream) = channel();
        tokio_test::block_on(async {
            tx.send(Ok(json!({"n": 1}))).await.unwrap();
            tx.send(Ok(json!({"n": 2}))).await.unwrap();
            drop(tx);
            let items = stream.collect().await.unwrap();
            assert_eq!(items, vec![json!({"n": 1}), json!({"n": 2})]);
        });
    }

    #[test]
    fn test_collect_stops_at_error() {
        let (tx, stream) = channel();
        tokio_test::block_on(async {
            tx.send(Ok(json!({"n": 1}))).await.unwrap();
            tx.send(Err(ClientError::ConnectionClosed)).await.unwrap();
            drop(tx);
            assert!(matches!(
                stream.collect().await,
                Err(ClientError::ConnectionClosed)
            ));
        });
    }

    #[test]
    fn test_next_after_end() {
        let (tx, mut stream) = channel();
        drop(tx);
        tokio_test::block_on(async {
            assert!(stream.next().await.is_none());
        });
    }
}
