use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::DeviceError;
use crate::hal::Network;

#[derive(Debug, Clone)]
pub struct WifiCredentials {
    pub host_name: String,
    pub ssid: String,
    pub password: String,
}

/// Start association and poll until the link is up.
///
/// `timeout = None` waits forever; this is what the appliance does at boot.
pub async fn associate(
    network: &dyn Network,
    credentials: &WifiCredentials,
    timeout: Option<Duration>,
    poll: Duration,
) -> Result<(), DeviceError> {
    if network.is_associated() {
        debug!("wifi: already associated");
        return Ok(());
    }

    info!("wifi: associating with '{}'", credentials.ssid);
    network.begin(&credentials.host_name, &credentials.ssid, &credentials.password);

    let started = Instant::now();
    loop {
        if network.is_associated() {
            info!(
                "wifi: associated after {:?}, address {:?}",
                started.elapsed(),
                network.local_address()
            );
            return Ok(());
        }
        if let Some(limit) = timeout {
            if started.elapsed() >= limit {
                warn!("wifi: association timed out after {:?}", limit);
                return Err(DeviceError::AssociationTimeout { waited: limit });
            }
        }
        tokio::time::sleep(poll).await;
    }
}
