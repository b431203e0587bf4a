//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use std::sync::Arc;
use study_tracker_core::ports::AccountService;
use study_tracker_core::workspace::Workspaces;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Cookie accounts. `None` in local mode, where every request acts as the
    /// configured local user.
    pub accounts: Option<Arc<dyn AccountService>>,
    /// One session store and data cache per active user.
    pub workspaces: Arc<Workspaces>,
    pub config: Arc<Config>,
}
