//! Recently proxied URLs, newest first.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::RwLock;

#[derive(Clone, Debug)]
pub struct UrlHistory {
    entries: Arc<RwLock<VecDeque<String>>>,
    capacity: usize,
}

impl UrlHistory {
    /// A zero capacity keeps nothing.
    pub fn new(capacity: usize) -> Self {
        Self { entries: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))), capacity }
    }

    pub async fn push(&self, url: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }

        let mut entries = self.entries.write().await;
        entries.push_front(url.into());
        entries.truncate(self.capacity);
    }

    pub async fn snapshot(&self) -> Vec<String> {
        self.entries.read().await.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_newest_first_and_bounded() {
        let history = UrlHistory::new(2);
        history.push("http://a/").await;
        history.push("http://b/").await;
        history.push("http://c/").await;

        assert_eq!(history.snapshot().await, vec!["http://c/", "http://b/"]);
    }

    #[tokio::test]
    async fn test_repeats_are_kept() {
        let history = UrlHistory::new(5);
        history.push("http://a/").await;
        history.push("http://a/").await;

        assert_eq!(history.snapshot().await.len(), 2);
    }

    #[tokio::test]
    async fn test_zero_capacity() {
        let history = UrlHistory::new(0);
        history.push("http://a/").await;
        assert!(history.snapshot().await.is_empty());
    }
}
