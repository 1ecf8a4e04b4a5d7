use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("wifi association did not complete within {waited:?}")]
    AssociationTimeout { waited: Duration },

    #[error("preference storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("invalid boot preference byte {0:#04x}")]
    InvalidBootPreference(u8),

    #[error("display error: {0}")]
    Display(String),

    #[error("webhook error: {0}")]
    Webhook(String),
}
