use reqwest::Client;
use stress_core::Url;

use crate::prelude::*;

/// The target has to answer a plain GET with 200 before a run may start.
pub async fn preflight(client: &Client, target: &Url) -> Result<()> {
    let resp = client
        .get(target.clone())
        .send()
        .await
        .map_err(|e| Error::PreflightFailed(e.to_string()))?;
    let status = resp.status();
    if let Err(e) = resp.bytes().await {
        debug!("Pre-flight body read failed: {}", e);
    }
    if status != reqwest::StatusCode::OK {
        return Err(Error::PreflightFailed(format!(
            "status code should be 200, but is {}. Check the URL.",
            status.as_u16()
        )));
    }
    debug!("Pre-flight check passed for {}", target);
    Ok(())
}
