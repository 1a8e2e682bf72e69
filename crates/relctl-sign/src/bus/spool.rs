//! Spool-directory bridge to an external messaging relay
//!
//! ```text
//! <spool>/<topic>/<uuid>.json
//! ```
//!
//! The relay forwards files written under request topics and drops replies
//! under response topics. Each file holds one serialized [`BusMessage`].
//!
//! Several runs may wait on one reply topic at once. A correlated
//! subscriber only consumes the files carrying its own request id.

use super::{correlation_id, BusMessage, MessageBus, Subscription};
use async_trait::async_trait;
use relctl_core::{Error, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, trace, warn};

const MESSAGE_EXT: &str = "json";

#[derive(Debug, Clone)]
pub struct SpoolBus {
    root: PathBuf,
    poll_interval: Duration,
}

impl SpoolBus {
    pub fn new(root: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            root: root.into(),
            poll_interval,
        }
    }

    pub fn topic_dir(&self, topic: &str) -> PathBuf {
        self.root.join(topic)
    }
}

/// Message files in `dir`, oldest first
async fn pending_messages(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::bus(format!("cannot read {}: {}", dir.display(), e))),
    };

    let mut found = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(MESSAGE_EXT) {
            continue;
        }
        let modified = entry.metadata().await?.modified()?;
        found.push((modified, path));
    }
    found.sort();
    Ok(found.into_iter().map(|(_, path)| path).collect())
}

/// Read and consume one message file.
///
/// With `request_id` set, a message carrying another correlation id is left
/// on disk for the subscriber it belongs to.
async fn take_message(path: &Path, request_id: Option<&str>) -> Result<Option<BusMessage>> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        // Another consumer got there first
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let message: BusMessage = match serde_json::from_str(&content) {
        Ok(message) => message,
        Err(e) => {
            warn!("Discarding malformed spool message {}: {}", path.display(), e);
            remove_message(path).await?;
            return Ok(None);
        }
    };

    if let Some(wanted) = request_id {
        if correlation_id(&message.body) != Some(wanted) {
            trace!("Leaving {} for another subscriber", path.display());
            return Ok(None);
        }
    }

    if remove_message(path).await? {
        Ok(Some(message))
    } else {
        Ok(None)
    }
}

/// Delete a message file; `false` if it was already gone
async fn remove_message(path: &Path) -> Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

impl SpoolBus {
    async fn poll(&self, topic: &str, request_id: Option<String>) -> Result<Subscription> {
        let dir = self.topic_dir(topic);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::bus(format!("cannot create {}: {}", dir.display(), e)))?;

        let (tx, subscription) = Subscription::channel();
        let interval = self.poll_interval;
        debug!("Polling {} every {:?}", dir.display(), interval);

        tokio::spawn(async move {
            loop {
                match pending_messages(&dir).await {
                    Ok(paths) => {
                        for path in paths {
                            match take_message(&path, request_id.as_deref()).await {
                                Ok(Some(message)) => {
                                    if tx.send(message).await.is_err() {
                                        return;
                                    }
                                }
                                Ok(None) => {}
                                Err(e) => warn!("Failed to consume {}: {}", path.display(), e),
                            }
                        }
                    }
                    Err(e) => warn!("Spool poll failed: {}", e),
                }

                if tx.is_closed() {
                    return;
                }
                tokio::time::sleep(interval).await;
            }
        });

        Ok(subscription)
    }
}

#[async_trait]
impl MessageBus for SpoolBus {
    async fn subscribe(&self, topic: &str) -> Result<Subscription> {
        self.poll(topic, None).await
    }

    async fn subscribe_correlated(&self, topic: &str, request_id: &str) -> Result<Subscription> {
        self.poll(topic, Some(request_id.to_string())).await
    }

    async fn publish(&self, message: BusMessage) -> Result<()> {
        let dir = self.topic_dir(&message.topic);
        let path = dir.join(format!("{}.{}", uuid::Uuid::new_v4(), MESSAGE_EXT));
        let payload = serde_json::to_vec_pretty(&message)?;

        // Temp file has no .json extension, so pollers never see it half-written
        tokio::task::spawn_blocking(move || -> Result<PathBuf> {
            std::fs::create_dir_all(&dir)?;
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(&payload)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| Error::Io(e.error))?;
            Ok(path)
        })
        .await
        .map_err(|e| Error::bus(format!("spool write task failed: {}", e)))?
        .map(|path| debug!("Spooled message {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn message(topic: &str, id: &str) -> BusMessage {
        BusMessage {
            topic: topic.to_string(),
            priority: Some(4),
            body: json!({ "request_id": id }),
        }
    }

    #[tokio::test]
    async fn test_publish_writes_one_file_per_message() {
        let tmp = TempDir::new().unwrap();
        let bus = SpoolBus::new(tmp.path(), Duration::from_millis(10));

        bus.publish(message("a.b", "1")).await.unwrap();
        bus.publish(message("a.b", "2")).await.unwrap();

        let files = pending_messages(&bus.topic_dir("a.b")).await.unwrap();
        assert_eq!(files.len(), 2);
    }

    #[tokio::test]
    async fn test_subscriber_consumes_messages_once() {
        let tmp = TempDir::new().unwrap();
        let bus = SpoolBus::new(tmp.path(), Duration::from_millis(10));

        let mut sub = bus.subscribe("replies").await.unwrap();
        bus.publish(message("replies", "abc")).await.unwrap();

        let received = sub.next().await.unwrap();
        assert_eq!(received.body["request_id"], "abc");
        assert_eq!(received.priority, Some(4));
        assert!(pending_messages(&bus.topic_dir("replies"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_malformed_file_is_discarded() {
        let tmp = TempDir::new().unwrap();
        let bus = SpoolBus::new(tmp.path(), Duration::from_millis(10));
        let dir = bus.topic_dir("replies");
        std::fs::create_dir_all(&dir).unwrap();
        let junk = dir.join("junk.json");
        std::fs::write(&junk, "not json").unwrap();

        assert!(take_message(&junk, Some("abc")).await.unwrap().is_none());
        assert!(!junk.exists());
    }

    #[tokio::test]
    async fn test_correlated_subscriber_leaves_other_replies() {
        let tmp = TempDir::new().unwrap();
        let bus = SpoolBus::new(tmp.path(), Duration::from_millis(10));

        let mut mine = bus.subscribe_correlated("replies", "mine").await.unwrap();
        bus.publish(message("replies", "theirs")).await.unwrap();
        bus.publish(message("replies", "mine")).await.unwrap();

        let received = mine.next().await.unwrap();
        assert_eq!(received.body["request_id"], "mine");

        let left = pending_messages(&bus.topic_dir("replies")).await.unwrap();
        assert_eq!(left.len(), 1);
        let mut theirs = bus.subscribe_correlated("replies", "theirs").await.unwrap();
        assert_eq!(theirs.next().await.unwrap().body["request_id"], "theirs");
    }
}
