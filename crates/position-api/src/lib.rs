//! position-api: Presentation boundary for splitwell
//!
//! Shared application state plus the handlers a UI calls to preview and
//! execute positions. Handlers take and return serde DTOs; amounts cross the
//! boundary as decimal strings.

pub mod dto;
pub mod positions;
pub mod state;

pub use state::{ApiError, AppState};

/// Default log filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "splitwell=debug,position_api=debug,tranche=debug,info";

/// Install the fmt subscriber. Returns false if one was already installed.
pub fn init_tracing() -> bool {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}
