//! CLI command implementations.

mod config;
mod extract;
mod run;
mod serve;
mod session;

pub use config::run_config;
pub use extract::run_extract;
pub use run::run_study;
pub use serve::run_serve;
pub use session::run_session;
