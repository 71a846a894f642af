//! Shared state handed to every handler.

use crate::services::object_store::ObjectStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// The single store instance shared by all listeners and handlers.
    pub store: Arc<dyn ObjectStore>,

    /// Configured public base URL, without trailing slash.
    pub base_url: Option<Arc<str>>,
}

impl AppState {
    pub fn new(store: Arc<dyn ObjectStore>, base_url: Option<String>) -> Self {
        Self {
            store,
            base_url: base_url.map(Arc::from),
        }
    }
}
