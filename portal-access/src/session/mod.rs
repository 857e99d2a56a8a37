//! Session lifecycle
//!
//! - [`store`]: reactive session state and its reducer
//! - [`activity`]: user activity signals
//! - [`clock`]: per-view expiry warning and forced logout
//! - [`manager`]: activity throttling, timeout checks and token refresh

pub mod activity;
pub mod clock;
pub mod manager;
pub mod store;

pub use activity::{ActivityBus, ActivityKind};
pub use clock::{SessionClock, SessionPhase, TimeRemaining};
pub use manager::{SessionManager, TokenRefresher};
pub use store::{SessionAction, SessionPort, SessionState, SessionStore};
