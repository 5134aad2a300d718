//! Shared state handed to every axum handler.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use waybackproxy_client::Coordinator;
use waybackproxy_core::RecordStore;

use crate::history::UrlHistory;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Coordinator,
    /// Read-only use: record count on the admin page.
    pub store: Arc<dyn RecordStore>,
    pub history: UrlHistory,
    /// Admin mount path without a trailing slash; `None` disables the admin UI.
    pub admin_path: Option<String>,
    /// Admin page auto-refresh in seconds; 0 is off.
    refresh_secs: Arc<AtomicU32>,
}

impl AppState {
    pub fn new(
        coordinator: Coordinator, store: Arc<dyn RecordStore>, history: UrlHistory, admin_path: Option<String>,
    ) -> Self {
        let admin_path = admin_path
            .map(|path| path.trim_end_matches('/').to_string())
            .filter(|path| !path.is_empty());

        Self { coordinator, store, history, admin_path, refresh_secs: Arc::new(AtomicU32::new(0)) }
    }

    pub fn refresh_interval(&self) -> Option<u32> {
        match self.refresh_secs.load(Ordering::Relaxed) {
            0 => None,
            secs => Some(secs),
        }
    }

    pub fn set_refresh_interval(&self, secs: Option<u32>) {
        self.refresh_secs.store(secs.unwrap_or(0), Ordering::Relaxed);
    }
}
