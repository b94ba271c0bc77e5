//! Shared daemon state threaded through HTTP handlers.

use std::sync::Arc;

use steward_core::supervisor::SupervisorControl;

use crate::store::Store;

/// Everything a request handler needs. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Durable store handle.
    pub store: Store,
    /// Supervisor control client.
    pub supervisor: Arc<dyn SupervisorControl>,
    /// Whether session cookies carry the `Secure` attribute.
    pub secure_cookies: bool,
}

impl AppState {
    /// Assemble the daemon state.
    #[must_use]
    pub fn new(store: Store, supervisor: Arc<dyn SupervisorControl>, secure_cookies: bool) -> Self {
        Self {
            store,
            supervisor,
            secure_cookies,
        }
    }
}
