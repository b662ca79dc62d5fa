//! The getRawNetworkLog seam and an in-memory implementation for replay.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::decode::RawLogEntry;
use crate::errors::SourceError;

/// Hands out everything the browser logged since the previous drain.
#[async_trait]
pub trait NetworkLogSource: Send + Sync {
    async fn drain_log(&self) -> Result<Vec<RawLogEntry>, SourceError>;
}

/// Serves pre-recorded batches, one per drain. Once exhausted it yields empty batches.
#[derive(Debug, Default)]
pub struct ReplaySource {
    batches: Mutex<VecDeque<Vec<RawLogEntry>>>,
}

impl ReplaySource {
    pub fn new<I>(batches: I) -> Self
    where
        I: IntoIterator<Item = Vec<RawLogEntry>>,
    {
        Self {
            batches: Mutex::new(batches.into_iter().collect()),
        }
    }

    pub fn remaining(&self) -> usize {
        self.batches.lock().len()
    }
}

#[async_trait]
impl NetworkLogSource for ReplaySource {
    async fn drain_log(&self) -> Result<Vec<RawLogEntry>, SourceError> {
        Ok(self.batches.lock().pop_front().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn drains_batches_in_order_then_empty() {
        let source = ReplaySource::new(vec![
            vec![RawLogEntry::new("Network.requestWillBeSent", json!({"requestId": "1"}))],
            Vec::new(),
        ]);
        assert_eq!(source.remaining(), 2);
        assert_eq!(source.drain_log().await.expect("first").len(), 1);
        assert!(source.drain_log().await.expect("second").is_empty());
        assert!(source.drain_log().await.expect("exhausted").is_empty());
        assert_eq!(source.remaining(), 0);
    }
}
