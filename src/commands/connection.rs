// ABOUTME: Shared helper building the control-plane client from settings.
// ABOUTME: Every command talks to ECS and EventBridge through the same client.

use ecsdeploy::api::HttpControlPlane;
use ecsdeploy::config::Settings;
use ecsdeploy::error::Result;
use std::sync::Arc;

/// Connect to the control plane named by `settings`.
pub fn control_plane(settings: &Settings) -> Result<Arc<HttpControlPlane>> {
    settings.validate()?;
    let client = HttpControlPlane::new(&settings.client_config())?;
    Ok(Arc::new(client))
}
