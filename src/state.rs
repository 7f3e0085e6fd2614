//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the two backend capability handles behind trait objects so route
//! code never knows which implementation is live — production wires the
//! HTTP client to both, tests wire the mock.

use std::sync::Arc;

use crate::backend::{AuthBackend, ProfileStore};

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum — both fields are Arc handles.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<dyn AuthBackend>,
    pub profiles: Arc<dyn ProfileStore>,
}

impl AppState {
    #[must_use]
    pub fn new(auth: Arc<dyn AuthBackend>, profiles: Arc<dyn ProfileStore>) -> Self {
        Self { auth, profiles }
    }
}

#[cfg(test)]
pub mod test_helpers {
    use super::*;
    use crate::backend::mock::MockBackend;

    /// Create a test `AppState` backed by a scriptable mock, returning the
    /// mock alongside for scripting.
    #[must_use]
    pub fn test_app_state() -> (AppState, Arc<MockBackend>) {
        let mock = MockBackend::new();
        (AppState::new(mock.clone(), mock.clone()), mock)
    }
}
