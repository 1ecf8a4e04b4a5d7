use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use super::platform;
use super::protocol::VOLUME_MAX;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub wifi: WifiConfig,
    #[serde(default)]
    pub radio: RadioConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub bluetooth: BluetoothConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Host name announced on WiFi and the A2DP sink name.
    #[serde(default = "default_device_name")]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WifiConfig {
    #[serde(default)]
    pub ssid: String,
    #[serde(default)]
    pub password: String,
    /// Upper bound on association at boot.  Absent means retry forever.
    #[serde(default)]
    pub boot_timeout_secs: Option<u64>,
    #[serde(default = "default_resume_timeout_secs")]
    pub resume_timeout_secs: u64,
    #[serde(default = "default_wifi_poll_ms")]
    pub poll_interval_ms: u64,
    /// `host:port` the host network stand-in resolves to decide whether
    /// the link is up.
    #[serde(default = "default_probe_host")]
    pub probe_host: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadioConfig {
    /// Volume the fade-in ramp stops at (0..=21).
    #[serde(default = "default_normal_volume")]
    pub normal_volume: u8,
    #[serde(default = "default_volume_step")]
    pub volume_step: f32,
    /// Fraction of the buffer that must be filled before unmuting.
    #[serde(default = "default_priming_ratio")]
    pub priming_ratio: f32,
    /// How long a fresh connection may take to prime before it is
    /// reported as a stream error.
    #[serde(default = "default_stream_grace_ms")]
    pub stream_grace_ms: u64,
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity_bytes: usize,
    /// Optional station list override (`.toml` or `.m3u`).
    #[serde(default)]
    pub stations_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_audio_cycle_ms")]
    pub cycle_ms: u64,
    #[serde(default = "default_audio_idle_cycle_ms")]
    pub idle_cycle_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_healthy_cycle_ms")]
    pub healthy_cycle_ms: u64,
    /// Cadence while an error banner is up or playback is paused.
    #[serde(default = "default_idle_cycle_ms")]
    pub idle_cycle_ms: u64,
    #[serde(default = "default_power_poll_ms")]
    pub power_poll_ms: u64,
    /// Consecutive identical samples needed to accept a button level.
    #[serde(default = "default_debounce_samples")]
    pub debounce_samples: u8,
}

/// I2S pins handed to the A2DP sink.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BluetoothConfig {
    #[serde(default = "default_pin_bck")]
    pub bck: u8,
    #[serde(default = "default_pin_ws")]
    pub ws: u8,
    #[serde(default = "default_pin_data_out")]
    pub data_out: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// POST target for the "forward song info" button.  Absent disables it.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: default_device_name(),
        }
    }
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            ssid: String::new(),
            password: String::new(),
            boot_timeout_secs: None,
            resume_timeout_secs: default_resume_timeout_secs(),
            poll_interval_ms: default_wifi_poll_ms(),
            probe_host: default_probe_host(),
        }
    }
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            normal_volume: default_normal_volume(),
            volume_step: default_volume_step(),
            priming_ratio: default_priming_ratio(),
            stream_grace_ms: default_stream_grace_ms(),
            buffer_capacity_bytes: default_buffer_capacity(),
            stations_file: None,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            cycle_ms: default_audio_cycle_ms(),
            idle_cycle_ms: default_audio_idle_cycle_ms(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            healthy_cycle_ms: default_healthy_cycle_ms(),
            idle_cycle_ms: default_idle_cycle_ms(),
            power_poll_ms: default_power_poll_ms(),
            debounce_samples: default_debounce_samples(),
        }
    }
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            bck: default_pin_bck(),
            ws: default_pin_ws(),
            data_out: default_pin_data_out(),
        }
    }
}

fn default_device_name() -> String {
    "ESP32-Webradio".to_string()
}

fn default_resume_timeout_secs() -> u64 {
    10
}

fn default_wifi_poll_ms() -> u64 {
    100
}

fn default_probe_host() -> String {
    "example.com:80".to_string()
}

fn default_normal_volume() -> u8 {
    VOLUME_MAX
}

fn default_volume_step() -> f32 {
    0.25
}

fn default_priming_ratio() -> f32 {
    0.9
}

fn default_stream_grace_ms() -> u64 {
    3000
}

fn default_buffer_capacity() -> usize {
    64 * 1024
}

fn default_audio_cycle_ms() -> u64 {
    1
}

fn default_audio_idle_cycle_ms() -> u64 {
    100
}

fn default_healthy_cycle_ms() -> u64 {
    20
}

fn default_idle_cycle_ms() -> u64 {
    200
}

fn default_power_poll_ms() -> u64 {
    200
}

fn default_debounce_samples() -> u8 {
    2
}

fn default_pin_bck() -> u8 {
    0
}

fn default_pin_ws() -> u8 {
    26
}

fn default_pin_data_out() -> u8 {
    25
}

impl WifiConfig {
    pub fn boot_timeout(&self) -> Option<Duration> {
        self.boot_timeout_secs.map(Duration::from_secs)
    }

    pub fn resume_timeout(&self) -> Duration {
        Duration::from_secs(self.resume_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl RadioConfig {
    pub fn stream_grace(&self) -> Duration {
        Duration::from_millis(self.stream_grace_ms)
    }
}

impl UiConfig {
    pub fn healthy_cycle(&self) -> Duration {
        Duration::from_millis(self.healthy_cycle_ms)
    }

    pub fn idle_cycle(&self) -> Duration {
        Duration::from_millis(self.idle_cycle_ms)
    }

    pub fn power_poll(&self) -> Duration {
        Duration::from_millis(self.power_poll_ms)
    }
}

impl AudioConfig {
    pub fn cycle(&self) -> Duration {
        Duration::from_millis(self.cycle_ms)
    }

    pub fn idle_cycle(&self) -> Duration {
        Duration::from_millis(self.idle_cycle_ms)
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.validate();
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }

    /// Clamp values the rest of the system relies on being in range.
    pub fn validate(&mut self) {
        if self.radio.normal_volume > VOLUME_MAX {
            warn!(
                "config: normal_volume {} above maximum, clamping to {}",
                self.radio.normal_volume, VOLUME_MAX
            );
            self.radio.normal_volume = VOLUME_MAX;
        }
        if !(self.radio.volume_step > 0.0) {
            warn!(
                "config: volume_step {} must be positive, using default",
                self.radio.volume_step
            );
            self.radio.volume_step = default_volume_step();
        }
        if !(0.0..1.0).contains(&self.radio.priming_ratio) {
            warn!(
                "config: priming_ratio {} outside [0, 1), using default",
                self.radio.priming_ratio
            );
            self.radio.priming_ratio = default_priming_ratio();
        }
        if self.radio.buffer_capacity_bytes == 0 {
            warn!("config: buffer_capacity_bytes must be non-zero, using default");
            self.radio.buffer_capacity_bytes = default_buffer_capacity();
        }
        if self.ui.debounce_samples == 0 {
            self.ui.debounce_samples = 1;
        }
    }
}
