//! Mode coordinator: reads the boot preference, brings up exactly one of
//! the two modes and tears it down again.
//!
//! Switching modes never happens live.  The other mode's byte is stored
//! and the device restarts; a fresh boot then enters the chosen mode.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use stick_proto::config::Config;
use stick_proto::metadata::TrackInfo;
use stick_proto::protocol::{
    ConnectionHealth, DeviceMode, TrackAttribute, BOOT_BYTE_BLUETOOTH, BOOT_BYTE_RADIO,
};
use stick_proto::stations::StationCatalog;
use tracing::{debug, info, warn};

use crate::audio::{
    radio_channels, AudioCadence, AudioControl, AudioEngine, AudioRun, AudioTask, EngineSettings,
    RadioLinks, SystemClock,
};
use crate::error::DeviceError;
use crate::hal::{
    Amplifier, BluetoothSink, Color, Display, I2sPins, InputPanel, Network, Notifier,
    PreferenceStore, StreamDecoder,
};
use crate::latest::{latest, Subscriber};
use crate::screen::render_splash;
use crate::ui::{BluetoothUi, RadioUi, UiExit, UiMode, UiSettings, UiTask};
use crate::wifi::{associate, WifiCredentials};

const IDLE_ACK_POLL: Duration = Duration::from_millis(5);

pub type SessionFactory = Box<dyn FnMut() -> Box<dyn StreamDecoder> + Send>;

/// Everything the coordinator drives besides the display and buttons.
pub struct Devices {
    pub network: Arc<dyn Network>,
    pub amp: Arc<dyn Amplifier>,
    pub bluetooth: Arc<dyn BluetoothSink>,
    pub prefs: Box<dyn PreferenceStore>,
    pub notifier: Arc<dyn Notifier>,
    /// Creates the decoder session for a radio-mode run.
    pub sessions: SessionFactory,
}

/// One boot's worth of collaborators.
pub struct Board {
    pub display: Box<dyn Display>,
    pub panel: Box<dyn InputPanel>,
    pub devices: Devices,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Boot again; the preference byte decides the mode.
    Restart,
    Shutdown,
}

struct RadioRuntime {
    task: AudioTask,
    control: AudioControl,
    /// The audio task was told to connect on its first cycle.
    connect_now: bool,
}

pub struct ModeCoordinator {
    config: Config,
    catalog: StationCatalog,
    devices: Devices,
    mode: DeviceMode,
    radio: Option<RadioRuntime>,
}

impl ModeCoordinator {
    pub fn new(config: Config, catalog: StationCatalog, devices: Devices) -> Self {
        Self {
            config,
            catalog,
            devices,
            mode: DeviceMode::None,
            radio: None,
        }
    }

    pub fn mode(&self) -> DeviceMode {
        self.mode
    }

    pub fn radio_active(&self) -> bool {
        self.radio.is_some()
    }

    pub fn credentials(&self) -> WifiCredentials {
        WifiCredentials {
            host_name: self.config.device.name.clone(),
            ssid: self.config.wifi.ssid.clone(),
            password: self.config.wifi.password.clone(),
        }
    }

    /// Mode to boot into.  Unreadable storage and unknown bytes boot Radio.
    pub fn boot_mode(&mut self) -> DeviceMode {
        let byte = match self.devices.prefs.read_byte() {
            Ok(byte @ (0 | BOOT_BYTE_RADIO | BOOT_BYTE_BLUETOOTH)) => Some(byte),
            Ok(other) => {
                warn!("coordinator: {}, booting radio", DeviceError::InvalidBootPreference(other));
                None
            }
            Err(e) => {
                warn!("coordinator: {}, booting radio", e);
                None
            }
        };
        let mode = DeviceMode::from_boot_byte(byte);
        info!("coordinator: boot preference {:?} → {} mode", byte, mode.label());
        mode
    }

    /// Associate with WiFi, spawn the audio task and hand back the UI ends
    /// of its cells.  `None` if a mode is already running.
    pub async fn enter_radio_mode(
        &mut self,
        display: &mut dyn Display,
    ) -> anyhow::Result<Option<RadioLinks>> {
        if self.mode != DeviceMode::None {
            warn!(
                "coordinator: cannot enter radio mode, {} mode active",
                self.mode.label()
            );
            return Ok(None);
        }
        info!("coordinator: entering radio mode");
        let credentials = self.credentials();

        let mut splash = vec![
            (" Hello!".to_string(), Color::Magenta),
            (format!(" Host: {}", credentials.host_name), Color::DarkGrey),
            (" Connecting to WiFi...".to_string(), Color::DarkGrey),
            (format!(" SSID: {}", credentials.ssid), Color::DarkGrey),
        ];
        show_splash(display, &splash);

        let associated = associate(
            self.devices.network.as_ref(),
            &credentials,
            self.config.wifi.boot_timeout(),
            self.config.wifi.poll_interval(),
        )
        .await;
        let connect_now = match associated {
            Ok(()) => {
                splash.push((" Connected to WiFi".to_string(), Color::DarkGrey));
                if let Some(address) = self.devices.network.local_address() {
                    splash.push((format!(" IP: {}", address), Color::DarkGrey));
                }
                show_splash(display, &splash);
                true
            }
            Err(e) => {
                warn!("coordinator: {}, starting radio without a connection", e);
                false
            }
        };

        let (links, ports, control) = radio_channels(0, connect_now);
        let initial_health = if connect_now {
            ConnectionHealth::Ok
        } else {
            ConnectionHealth::ConnectError
        };
        let engine = AudioEngine::new(
            EngineSettings {
                priming_ratio: self.config.radio.priming_ratio,
                stream_grace: self.config.radio.stream_grace(),
            },
            self.catalog.clone(),
            (self.devices.sessions)(),
            Arc::clone(&self.devices.amp),
            Box::new(SystemClock),
            ports,
            0,
            initial_health,
        );
        let task = AudioTask::spawn(
            engine,
            AudioCadence {
                active: self.config.audio.cycle(),
                idle: self.config.audio.idle_cycle(),
            },
        )
        .context("spawning audio task")?;

        self.radio = Some(RadioRuntime {
            task,
            control,
            connect_now,
        });
        self.mode = DeviceMode::Radio;
        Ok(Some(links))
    }

    /// Quiesce the audio task, wait for it to acknowledge, then stop and
    /// release the session.
    pub async fn exit_radio_mode(&mut self) {
        let Some(RadioRuntime { task, control, .. }) = self.radio.take() else {
            warn!("coordinator: radio mode not active, nothing to tear down");
            return;
        };
        info!("coordinator: leaving radio mode");

        control.run.publish(AudioRun::Idle);
        while control.observed_run.get() != AudioRun::Idle {
            if task.is_finished() {
                warn!("coordinator: audio task ended before acknowledging idle");
                break;
            }
            tokio::time::sleep(IDLE_ACK_POLL).await;
        }
        debug!("coordinator: audio task idle");

        control.run.publish(AudioRun::Exit);
        // joining and dropping the session both block
        let released = tokio::task::spawn_blocking(move || {
            let engine = task.join()?;
            let mut session = engine.into_session()?;
            session.stop();
            drop(session);
            Some(())
        })
        .await;
        match released {
            Ok(Some(())) => debug!("coordinator: session stopped and released"),
            Ok(None) => warn!("coordinator: no session to release"),
            Err(e) => warn!("coordinator: teardown task failed: {}", e),
        }
        self.mode = DeviceMode::None;
    }

    /// Start the A2DP sink.  Returns the song-line cell fed by the AVRC
    /// metadata callback, or `None` if a mode is already running.
    pub fn enter_bluetooth_mode(&mut self) -> Option<Subscriber<String>> {
        if self.mode != DeviceMode::None {
            warn!(
                "coordinator: cannot enter bluetooth mode, {} mode active",
                self.mode.label()
            );
            return None;
        }
        info!("coordinator: entering bluetooth mode");

        let pins = self.config.bluetooth;
        let sink = &self.devices.bluetooth;
        sink.set_pin_config(I2sPins {
            bck: pins.bck,
            ws: pins.ws,
            data_out: pins.data_out,
        });

        let (song_tx, song_rx) = latest(String::new());
        let mut track = TrackInfo::default();
        sink.on_track_metadata(Box::new(move |attribute: TrackAttribute, text: &str| {
            if track.apply(attribute, text) {
                song_tx.publish(track.song_line());
            }
        }));
        sink.start(&self.config.device.name);
        self.devices.amp.set_shutdown(false);

        self.mode = DeviceMode::Bluetooth;
        Some(song_rx)
    }

    /// The A2DP stack cannot be stopped; only logged.
    pub fn stop_bluetooth(&mut self) {
        warn!("coordinator: stopping the bluetooth sink is not supported");
    }

    /// Persist `target` as the boot mode, wind down the current mode and
    /// ask for a restart.
    pub async fn switch_and_restart(&mut self, target: DeviceMode) -> RunOutcome {
        info!(
            "coordinator: switching {} → {}, restarting",
            self.mode.label(),
            target.label()
        );
        if let Some(byte) = target.boot_byte() {
            if let Err(e) = self.devices.prefs.write_byte(byte) {
                warn!("coordinator: boot preference not saved: {}", e);
            }
        }
        self.wind_down().await;
        RunOutcome::Restart
    }

    pub async fn shutdown(&mut self) -> RunOutcome {
        info!("coordinator: shutting down");
        self.wind_down().await;
        RunOutcome::Shutdown
    }

    async fn wind_down(&mut self) {
        match self.mode {
            DeviceMode::Radio => self.exit_radio_mode().await,
            DeviceMode::Bluetooth => {
                self.stop_bluetooth();
                self.mode = DeviceMode::None;
            }
            DeviceMode::None => {}
        }
    }

    /// UI side of the running radio mode.  If boot never connected, the
    /// first station change requests the start station.
    pub fn radio_ui(&self, links: RadioLinks, settings: &UiSettings) -> RadioUi {
        let start_pending = self.radio.as_ref().is_some_and(|r| !r.connect_now);
        RadioUi::new(
            links,
            self.catalog.clone(),
            0,
            Arc::clone(&self.devices.network),
            self.credentials(),
            Arc::clone(&self.devices.notifier),
            settings,
        )
        .with_start_pending(start_pending)
    }
}

fn show_splash(display: &mut dyn Display, lines: &[(String, Color)]) {
    let lines: Vec<(&str, Color)> = lines.iter().map(|(t, c)| (t.as_str(), *c)).collect();
    render_splash(display, &lines);
    if let Err(e) = display.present() {
        warn!("coordinator: {}", e);
    }
}

/// One boot: pick the mode, run the UI until it asks to switch or quit,
/// then wind everything down.
pub async fn run_device(
    config: Config,
    catalog: StationCatalog,
    board: Board,
) -> anyhow::Result<RunOutcome> {
    let Board {
        mut display,
        panel,
        devices,
    } = board;
    let settings = UiSettings::from_config(&config);
    let device_name = config.device.name.clone();
    let mut coordinator = ModeCoordinator::new(config, catalog, devices);

    let mode = coordinator.boot_mode();
    let (ui_mode, station_line) = match mode {
        DeviceMode::Bluetooth => {
            let song = coordinator
                .enter_bluetooth_mode()
                .ok_or_else(|| anyhow!("bluetooth mode could not start"))?;
            let sink = Arc::clone(&coordinator.devices.bluetooth);
            (UiMode::Bluetooth(BluetoothUi::new(sink, song)), Some(device_name))
        }
        DeviceMode::Radio | DeviceMode::None => {
            let links = coordinator
                .enter_radio_mode(display.as_mut())
                .await?
                .ok_or_else(|| anyhow!("radio mode could not start"))?;
            (UiMode::Radio(coordinator.radio_ui(links, &settings)), None)
        }
    };

    let mut ui = UiTask::new(display, panel, settings, ui_mode, station_line);
    let outcome = match ui.run().await {
        UiExit::SwitchMode => coordinator.switch_and_restart(mode.other()).await,
        UiExit::Shutdown => coordinator.shutdown().await,
    };
    Ok(outcome)
}
