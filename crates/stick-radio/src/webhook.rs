//! Song-info webhook.  Fire-and-forget: the response is logged and never
//! feeds back into device state.

use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::error::DeviceError;
use crate::hal::Notifier;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const LOGGED_BODY_CHARS: usize = 120;

pub fn request_body(song: &str) -> Value {
    json!({ "value1": song })
}

pub struct Webhook {
    client: Client,
    url: String,
    runtime: Handle,
}

impl Webhook {
    /// Must be called from within the tokio runtime the requests run on.
    pub fn new(url: String) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            url,
            runtime: Handle::current(),
        })
    }
}

impl Notifier for Webhook {
    fn notify(&self, song: &str) {
        if song.is_empty() {
            debug!("webhook: no song info, nothing to send");
            return;
        }
        let request = self.client.post(&self.url).json(&request_body(song));
        let song = song.to_string();
        self.runtime.spawn(async move {
            match request.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    let excerpt: String = body.chars().take(LOGGED_BODY_CHARS).collect();
                    info!("webhook: sent '{}' → {} {}", song, status, excerpt);
                }
                Err(e) => {
                    warn!("{}", DeviceError::Webhook(e.to_string()));
                }
            }
        });
    }
}

/// Used when no webhook URL is configured.
#[derive(Debug, Default)]
pub struct DisabledNotifier;

impl Notifier for DisabledNotifier {
    fn notify(&self, song: &str) {
        debug!("webhook: not configured, dropping '{}'", song);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body = request_body("Artist - Title");
        assert_eq!(body.to_string(), r#"{"value1":"Artist - Title"}"#);
    }
}
