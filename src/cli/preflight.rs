//! Pre-flight checks before expensive operations.
//!
//! Validates that required credentials are available before starting a
//! pipeline run that would otherwise fail midway.

use crate::agent::{CredentialRouter, Lane};
use crate::config::Settings;
use crate::error::{Result, StudyError};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// A pipeline run needs both lane keys and a valid routing table.
    Run,
    /// Serving runs pipelines on demand.
    Serve,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Run | Operation::Serve => {
            CredentialRouter::validate(&settings.routing)?;
            check_lane_key(Lane::A, settings)?;
            check_lane_key(Lane::B, settings)?;
        }
    }
    Ok(())
}

fn check_lane_key(lane: Lane, settings: &Settings) -> Result<()> {
    let lane_settings = settings.lanes.get(lane);
    if lane_settings.resolve_api_key().is_some() {
        return Ok(());
    }
    let first = lane_settings
        .api_key_env
        .first()
        .map(String::as_str)
        .unwrap_or("GOOGLE_API_KEY");
    Err(StudyError::Config(format!(
        "No API key for lane {} (checked: {}). Set it with: export {}='...'",
        lane,
        lane_settings.api_key_env.join(", "),
        first
    )))
}
