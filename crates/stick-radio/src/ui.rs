//! UI task: buttons in, display out.
//!
//! In radio mode the task is the single writer of the station index,
//! the playback intent and the volume, and it owns the fade-in ramp.  The
//! audio task is never touched directly; everything goes through the
//! [`RadioLinks`] cells.

use std::sync::Arc;
use std::time::Duration;

use stick_proto::config::Config;
use stick_proto::protocol::{ConnectionHealth, PlaybackIntent};
use stick_proto::stations::StationCatalog;
use tracing::{debug, info, warn};

use crate::audio::RadioLinks;
use crate::gate::VolumeRamp;
use crate::hal::{BluetoothSink, Display, InputPanel, Network, Notifier};
use crate::input::{InputEvents, Inputs};
use crate::latest::Subscriber;
use crate::screen::{DisplayText, Screen};
use crate::wifi::{associate, WifiCredentials};

#[derive(Debug, Clone, Copy)]
pub struct UiSettings {
    pub healthy_cycle: Duration,
    pub idle_cycle: Duration,
    pub resume_timeout: Duration,
    pub wifi_poll: Duration,
    pub normal_volume: u8,
    pub volume_step: f32,
    pub debounce_samples: u8,
    pub power_poll: Duration,
}

impl UiSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            healthy_cycle: config.ui.healthy_cycle(),
            idle_cycle: config.ui.idle_cycle(),
            resume_timeout: config.wifi.resume_timeout(),
            wifi_poll: config.wifi.poll_interval(),
            normal_volume: config.radio.normal_volume,
            volume_step: config.radio.volume_step,
            debounce_samples: config.ui.debounce_samples,
            power_poll: config.ui.power_poll(),
        }
    }
}

/// Why the UI loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiExit {
    SwitchMode,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleResult {
    /// Sleep this long before the next cycle.
    Continue(Duration),
    Exit(UiExit),
}

/// Radio-mode side of the UI.
pub struct RadioUi {
    links: RadioLinks,
    catalog: StationCatalog,
    station: usize,
    /// The start station was never requested (boot gave up on WiFi).  The
    /// first station change asks for it instead of advancing.
    start_pending: bool,
    paused: bool,
    /// Resume could not bring WiFi back.  Shown like a connection error
    /// until the next successful resume or station change.
    link_error: bool,
    /// Connect counter seen when volume was last forced to 0.  The ramp
    /// waits until the audio task has reported a newer connect.
    ramp_hold: Option<u32>,
    ramp: VolumeRamp,
    network: Arc<dyn Network>,
    credentials: WifiCredentials,
    notifier: Arc<dyn Notifier>,
}

impl RadioUi {
    pub fn new(
        links: RadioLinks,
        catalog: StationCatalog,
        start_station: usize,
        network: Arc<dyn Network>,
        credentials: WifiCredentials,
        notifier: Arc<dyn Notifier>,
        settings: &UiSettings,
    ) -> Self {
        let station = start_station % catalog.len();
        Self {
            links,
            catalog,
            station,
            start_pending: false,
            paused: false,
            link_error: false,
            ramp_hold: None,
            ramp: VolumeRamp::new(settings.normal_volume, settings.volume_step),
            network,
            credentials,
            notifier,
        }
    }

    /// Mark the start station as not yet requested from the audio task.
    pub fn with_start_pending(mut self, pending: bool) -> Self {
        self.start_pending = pending;
        self
    }

    pub fn station(&self) -> usize {
        self.station
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn volume(&self) -> u8 {
        self.links.volume.current()
    }

    pub fn has_link_error(&self) -> bool {
        self.link_error
    }

    /// Health as the user sees it: the audio task's report, overridden by
    /// a failed WiFi resume.
    pub fn health(&self) -> ConnectionHealth {
        if self.link_error {
            ConnectionHealth::ConnectError
        } else {
            self.links.status.get().health
        }
    }

    fn force_silence(&mut self) {
        self.ramp.reset();
        self.links.volume.publish(0);
        self.ramp_hold = Some(self.links.status.get().connect_attempts);
    }

    fn pause(&mut self, display: &mut dyn Display, screen: &mut Screen) {
        if self.paused {
            debug!("ui: already paused");
            return;
        }
        info!("ui: pause requested");
        self.paused = true;
        self.force_silence();
        self.links.playback.publish(PlaybackIntent::UserPaused);
        screen.set_status(display, "Paused");
    }

    /// Bring WiFi back within the resume timeout.  On failure the link
    /// error is raised and `false` returned.
    async fn rejoin(&mut self, settings: &UiSettings, purpose: &str) -> bool {
        if self.network.is_associated() {
            return true;
        }
        info!("ui: WiFi down, reconnecting before {}", purpose);
        match associate(
            self.network.as_ref(),
            &self.credentials,
            Some(settings.resume_timeout),
            settings.wifi_poll,
        )
        .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!("ui: {} aborted: {}", purpose, e);
                self.link_error = true;
                false
            }
        }
    }

    async fn resume(&mut self, settings: &UiSettings) {
        if !self.rejoin(settings, "resume").await {
            return;
        }
        info!("ui: resume requested");
        self.link_error = false;
        self.paused = false;
        self.force_silence();
        self.links.playback.publish(PlaybackIntent::Playing);
    }

    async fn next_station(&mut self, text: &mut DisplayText, settings: &UiSettings) {
        if !self.rejoin(settings, "station change").await {
            return;
        }
        if self.start_pending {
            self.start_pending = false;
            info!("ui: requesting start station {}", self.station);
        } else {
            self.station = self.catalog.next_index(self.station);
            info!("ui: station change → {}", self.station);
        }
        self.force_silence();
        self.link_error = false;
        // anything still queued belongs to the previous station
        let _ = self.links.station_name.take();
        let _ = self.links.stream_title.take();
        text.clear();
        self.links.station.publish(self.station);
    }

    fn ramp_allowed(&mut self) -> bool {
        let status = self.links.status.get();
        if let Some(held) = self.ramp_hold {
            if status.connect_attempts == held {
                return false;
            }
            self.ramp_hold = None;
        }
        !status.muted && !status.paused && !self.paused && !self.ramp.is_at_normal()
    }

    async fn cycle(
        &mut self,
        events: InputEvents,
        display: &mut dyn Display,
        screen: &mut Screen,
        text: &mut DisplayText,
        settings: &UiSettings,
    ) -> Duration {
        if events.power_pressed {
            self.pause(display, screen);
        }

        if events.primary_pressed {
            if self.paused {
                self.resume(settings).await;
            } else {
                self.next_station(text, settings).await;
            }
        } else if self.ramp_allowed() {
            if let Some(volume) = self.ramp.advance() {
                self.links.volume.publish(volume);
                screen.show_volume(display, volume);
            }
        }

        if events.secondary_pressed {
            if text.song().is_empty() {
                debug!("ui: no song info to forward");
            } else {
                self.notifier.notify(text.song());
            }
        }

        if let Some(name) = self.links.station_name.take() {
            text.set_station(name);
        }
        if let Some(title) = self.links.stream_title.take() {
            text.set_song(title);
        }

        if let Some(banner) = self.health().banner() {
            screen.render_banner(display, banner);
            return settings.idle_cycle;
        }
        screen.render(display, text);
        if self.paused {
            screen.set_status(display, "Paused");
            return settings.idle_cycle;
        }
        settings.healthy_cycle
    }
}

/// Bluetooth-mode side of the UI: device name on top, AVRC song below.
pub struct BluetoothUi {
    sink: Arc<dyn BluetoothSink>,
    song: Subscriber<String>,
}

impl BluetoothUi {
    pub fn new(sink: Arc<dyn BluetoothSink>, song: Subscriber<String>) -> Self {
        Self { sink, song }
    }

    fn cycle(
        &mut self,
        display: &mut dyn Display,
        screen: &mut Screen,
        text: &mut DisplayText,
        settings: &UiSettings,
    ) -> Duration {
        if let Some(song) = self.song.take() {
            text.set_song(song);
        }
        screen.render(display, text);
        screen.set_status(display, self.sink.audio_state().label());
        settings.healthy_cycle
    }
}

pub enum UiMode {
    Radio(RadioUi),
    Bluetooth(BluetoothUi),
}

pub struct UiTask {
    display: Box<dyn Display>,
    panel: Box<dyn InputPanel>,
    inputs: Inputs,
    screen: Screen,
    text: DisplayText,
    settings: UiSettings,
    mode: UiMode,
}

impl UiTask {
    pub fn new(
        display: Box<dyn Display>,
        panel: Box<dyn InputPanel>,
        settings: UiSettings,
        mode: UiMode,
        station_line: Option<String>,
    ) -> Self {
        let screen = Screen::new(display.as_ref());
        let mut text = DisplayText::new();
        if let Some(line) = station_line {
            text.set_station(line);
        }
        Self {
            display,
            panel,
            inputs: Inputs::new(settings.debounce_samples, settings.power_poll),
            screen,
            text,
            settings,
            mode,
        }
    }

    pub fn mode(&self) -> &UiMode {
        &self.mode
    }

    pub fn text(&self) -> &DisplayText {
        &self.text
    }

    pub async fn cycle(&mut self) -> CycleResult {
        if self.panel.shutdown_requested() {
            info!("ui: shutdown requested");
            return CycleResult::Exit(UiExit::Shutdown);
        }

        let now = tokio::time::Instant::now().into_std();
        let events = self.inputs.sample(self.panel.as_mut(), now);
        if events.mode_released {
            info!("ui: mode button released");
            return CycleResult::Exit(UiExit::SwitchMode);
        }

        let delay = match &mut self.mode {
            UiMode::Radio(radio) => {
                radio
                    .cycle(
                        events,
                        self.display.as_mut(),
                        &mut self.screen,
                        &mut self.text,
                        &self.settings,
                    )
                    .await
            }
            UiMode::Bluetooth(bt) => bt.cycle(
                self.display.as_mut(),
                &mut self.screen,
                &mut self.text,
                &self.settings,
            ),
        };

        if let Err(e) = self.display.present() {
            warn!("ui: {}", e);
        }
        CycleResult::Continue(delay)
    }

    pub async fn run(&mut self) -> UiExit {
        loop {
            match self.cycle().await {
                CycleResult::Continue(delay) => tokio::time::sleep(delay).await,
                CycleResult::Exit(exit) => return exit,
            }
        }
    }
}
