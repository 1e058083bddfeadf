//! Shared utilities: logging setup, environment overrides, lock helpers

pub mod env;
pub mod lock;
pub mod logging;

pub use env::{env_bool, env_opt};
pub use lock::{with_read_lock, with_write_lock};
pub use logging::{init_logging, init_logging_from_config};
#[cfg(feature = "json-logging")]
pub use logging::init_json_logging;
