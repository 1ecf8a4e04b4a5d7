//! Desktop implementations of the board collaborators, so the appliance
//! runs in a terminal.

mod store;
mod terminal;

use std::net::{ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use stick_proto::config::Config;
use stick_proto::platform;
use stick_proto::protocol::A2dpAudioState;
use tracing::{debug, info, warn};

pub use store::FilePreferenceStore;
pub use terminal::{KeyPanel, TerminalDisplay};

use crate::coordinator::{Board, Devices};
use crate::hal::{
    Amplifier, BluetoothSink, I2sPins, Network, Notifier, StreamDecoder, TrackMetadataCallback,
};
use crate::icy::IcySession;
use crate::webhook::{DisabledNotifier, Webhook};

/// "Associated" means the probe host resolves.
#[derive(Debug)]
pub struct HostNetwork {
    probe_host: String,
    begun: AtomicBool,
}

impl HostNetwork {
    pub fn new(probe_host: String) -> Self {
        Self {
            probe_host,
            begun: AtomicBool::new(false),
        }
    }
}

impl Network for HostNetwork {
    fn begin(&self, host_name: &str, ssid: &str, _password: &str) {
        info!(
            "network: begin as '{}' on '{}' (probing {})",
            host_name, ssid, self.probe_host
        );
        self.begun.store(true, Ordering::SeqCst);
    }

    fn is_associated(&self) -> bool {
        self.begun.load(Ordering::SeqCst)
            && self
                .probe_host
                .to_socket_addrs()
                .map(|mut addrs| addrs.next().is_some())
                .unwrap_or(false)
    }

    fn local_address(&self) -> Option<String> {
        let target = self.probe_host.to_socket_addrs().ok()?.next()?;
        let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
        socket.connect(target).ok()?;
        Some(socket.local_addr().ok()?.ip().to_string())
    }
}

/// Amplifier shutdown line, logged on change.
#[derive(Debug)]
pub struct LoggingAmplifier {
    shutdown: AtomicBool,
}

impl LoggingAmplifier {
    pub fn new() -> Self {
        Self {
            shutdown: AtomicBool::new(true),
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

impl Default for LoggingAmplifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Amplifier for LoggingAmplifier {
    fn set_shutdown(&self, shutdown: bool) {
        if self.shutdown.swap(shutdown, Ordering::SeqCst) != shutdown {
            debug!("amp: {}", if shutdown { "muted" } else { "live" });
        }
    }
}

/// There is no A2DP stack on the host.  The sink records its setup and
/// reports Idle forever.
#[derive(Default)]
pub struct HostA2dp {
    callback: Mutex<Option<TrackMetadataCallback>>,
}

impl BluetoothSink for HostA2dp {
    fn set_pin_config(&self, pins: I2sPins) {
        debug!(
            "a2dp: i2s pins bck={} ws={} data_out={}",
            pins.bck, pins.ws, pins.data_out
        );
    }

    fn start(&self, device_name: &str) {
        warn!(
            "a2dp: no bluetooth stack on this host, '{}' will not be discoverable",
            device_name
        );
    }

    fn on_track_metadata(&self, callback: TrackMetadataCallback) {
        if let Ok(mut slot) = self.callback.lock() {
            *slot = Some(callback);
        }
    }

    fn audio_state(&self) -> A2dpAudioState {
        A2dpAudioState::Idle
    }
}

/// Build a fresh set of collaborators for one boot.
/// Must be called from within the tokio runtime.
pub fn open_board(config: &Config) -> anyhow::Result<Board> {
    let notifier: Arc<dyn Notifier> = match &config.webhook.url {
        Some(url) => Arc::new(Webhook::new(url.clone())?),
        None => Arc::new(DisabledNotifier),
    };
    let capacity = config.radio.buffer_capacity_bytes;

    let display = TerminalDisplay::enter(&config.device.name)?;
    let panel = KeyPanel::spawn()?;

    Ok(Board {
        display: Box::new(display),
        panel: Box::new(panel),
        devices: Devices {
            network: Arc::new(HostNetwork::new(config.wifi.probe_host.clone())),
            amp: Arc::new(LoggingAmplifier::new()),
            bluetooth: Arc::new(HostA2dp::default()),
            prefs: Box::new(FilePreferenceStore::new(platform::boot_mode_path())),
            notifier,
            sessions: Box::new(move || Box::new(IcySession::new(capacity)) as Box<dyn StreamDecoder>),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amplifier_starts_muted() {
        let amp = LoggingAmplifier::new();
        assert!(amp.is_shutdown());
        amp.set_shutdown(false);
        assert!(!amp.is_shutdown());
    }

    #[test]
    fn test_network_down_before_begin() {
        let net = HostNetwork::new("localhost:80".into());
        assert!(!net.is_associated());
        net.begin("stick", "home", "");
        assert!(net.is_associated());
    }
}
