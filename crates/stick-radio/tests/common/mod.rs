//! Scripted collaborators shared by the integration tests.  Every fake
//! hands out an `Arc` handle so a test can inspect it after the
//! appliance has taken ownership of the boxed half.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stick_proto::config::Config;
use stick_proto::protocol::{A2dpAudioState, TrackAttribute};
use stick_proto::stations::{Station, StationCatalog};
use stick_radio::coordinator::{Board, Devices};
use stick_radio::error::DeviceError;
use stick_radio::hal::{
    Amplifier, BluetoothSink, ButtonLevels, Color, Display, I2sPins, InputPanel, Network,
    Notifier, PowerKeySample, PreferenceStore, Region, StreamDecoder, StreamEvent,
    TrackMetadataCallback,
};

pub const CAPACITY: usize = 1000;

/// Fast cadences and a short grace window so scenarios finish quickly.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.wifi.ssid = "home".into();
    config.wifi.poll_interval_ms = 10;
    config.radio.stream_grace_ms = 60;
    config.ui.healthy_cycle_ms = 2;
    config.ui.idle_cycle_ms = 5;
    config.ui.power_poll_ms = 10;
    config.ui.debounce_samples = 2;
    config
}

pub fn catalog() -> StationCatalog {
    StationCatalog::new(vec![
        Station::new("One", "http://one.example/stream"),
        Station::new("Two", "http://two.example/stream"),
    ])
    .unwrap()
}

/// Poll `cond` until it holds or `limit` passes.
pub async fn wait_until(limit: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    cond()
}

// ── decoder ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct DecoderLog {
    pub connects: Vec<String>,
    pub stops: usize,
    pub volumes: Vec<u8>,
    /// Filled bytes out of [`CAPACITY`] while connected.
    pub fill: usize,
    pub refuse: bool,
    pub connected: bool,
    pub events: VecDeque<StreamEvent>,
}

pub struct ScriptedDecoder(pub Arc<Mutex<DecoderLog>>);

impl StreamDecoder for ScriptedDecoder {
    fn connect(&mut self, url: &str) -> bool {
        let mut log = self.0.lock().unwrap();
        log.connects.push(url.to_string());
        log.connected = !log.refuse;
        log.connected
    }
    fn stop(&mut self) {
        let mut log = self.0.lock().unwrap();
        log.stops += 1;
        log.connected = false;
    }
    fn step(&mut self, events: &mut dyn FnMut(StreamEvent)) {
        let pending: Vec<StreamEvent> = self.0.lock().unwrap().events.drain(..).collect();
        for event in pending {
            events(event);
        }
    }
    fn set_volume(&mut self, volume: u8) {
        self.0.lock().unwrap().volumes.push(volume);
    }
    fn buffer_filled(&self) -> usize {
        let log = self.0.lock().unwrap();
        if log.connected {
            log.fill.min(CAPACITY)
        } else {
            0
        }
    }
    fn buffer_free(&self) -> usize {
        CAPACITY - self.buffer_filled()
    }
}

// ── display ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct Frame {
    pub texts: HashMap<Region, (i32, String, Color)>,
    pub presents: usize,
}

impl Frame {
    pub fn text(&self, region: Region) -> Option<&str> {
        self.texts.get(&region).map(|(_, t, _)| t.as_str())
    }

    pub fn color(&self, region: Region) -> Option<Color> {
        self.texts.get(&region).map(|(_, _, c)| *c)
    }
}

pub struct RecordingDisplay(pub Arc<Mutex<Frame>>);

impl Display for RecordingDisplay {
    fn width(&self) -> i32 {
        240
    }
    fn text_width(&self, text: &str) -> i32 {
        text.chars().count() as i32 * 6
    }
    fn clear(&mut self) {
        self.0.lock().unwrap().texts.clear();
    }
    fn fill(&mut self, region: Region, _color: Color) {
        self.0.lock().unwrap().texts.remove(&region);
    }
    fn draw_text(&mut self, region: Region, x: i32, text: &str, color: Color) {
        self.0
            .lock()
            .unwrap()
            .texts
            .insert(region, (x, text.to_string(), color));
    }
    fn present(&mut self) -> Result<(), DeviceError> {
        self.0.lock().unwrap().presents += 1;
        Ok(())
    }
}

// ── buttons ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub enum Button {
    Primary,
    Secondary,
    Mode,
}

#[derive(Debug, Default)]
pub struct PanelScript {
    frames: VecDeque<ButtonLevels>,
    power: VecDeque<PowerKeySample>,
    pub shutdown: bool,
}

impl PanelScript {
    /// Held for two samples, released for two: one debounced press.
    pub fn press(&mut self, button: Button) {
        let down = match button {
            Button::Primary => ButtonLevels {
                primary: true,
                ..ButtonLevels::default()
            },
            Button::Secondary => ButtonLevels {
                secondary: true,
                ..ButtonLevels::default()
            },
            Button::Mode => ButtonLevels {
                mode: true,
                ..ButtonLevels::default()
            },
        };
        self.frames.extend([down, down]);
        self.frames.extend([ButtonLevels::default(); 2]);
    }

    pub fn power_press(&mut self) {
        self.power.push_back(PowerKeySample {
            pressed: true,
            long_pressed: false,
        });
    }

    pub fn is_drained(&self) -> bool {
        self.frames.is_empty() && self.power.is_empty()
    }
}

pub struct ScriptedPanel(pub Arc<Mutex<PanelScript>>);

impl InputPanel for ScriptedPanel {
    fn buttons(&mut self) -> ButtonLevels {
        self.0.lock().unwrap().frames.pop_front().unwrap_or_default()
    }
    fn power_key(&mut self) -> PowerKeySample {
        self.0.lock().unwrap().power.pop_front().unwrap_or_default()
    }
    fn shutdown_requested(&mut self) -> bool {
        self.0.lock().unwrap().shutdown
    }
}

// ── board devices ────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct FakeNetwork {
    pub up: AtomicBool,
    /// Whether `begin` brings the link up.
    pub joinable: AtomicBool,
    pub begins: AtomicUsize,
}

impl FakeNetwork {
    pub fn up() -> Self {
        Self {
            up: AtomicBool::new(true),
            joinable: AtomicBool::new(true),
            begins: AtomicUsize::new(0),
        }
    }

    pub fn drop_link(&self, joinable: bool) {
        self.up.store(false, Ordering::SeqCst);
        self.joinable.store(joinable, Ordering::SeqCst);
    }
}

impl Network for FakeNetwork {
    fn begin(&self, _host_name: &str, _ssid: &str, _password: &str) {
        self.begins.fetch_add(1, Ordering::SeqCst);
        if self.joinable.load(Ordering::SeqCst) {
            self.up.store(true, Ordering::SeqCst);
        }
    }
    fn is_associated(&self) -> bool {
        self.up.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct RecordingAmp {
    pub shutdown: AtomicBool,
}

impl Default for RecordingAmp {
    fn default() -> Self {
        Self {
            shutdown: AtomicBool::new(true),
        }
    }
}

impl RecordingAmp {
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

impl Amplifier for RecordingAmp {
    fn set_shutdown(&self, shutdown: bool) {
        self.shutdown.store(shutdown, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeSink {
    pub pins: Mutex<Option<I2sPins>>,
    pub started: Mutex<Vec<String>>,
    pub callback: Mutex<Option<TrackMetadataCallback>>,
    pub state: Mutex<A2dpAudioState>,
}

impl FakeSink {
    /// Deliver one AVRC attribute as the stack would.
    pub fn emit(&self, attribute: TrackAttribute, text: &str) {
        if let Some(cb) = self.callback.lock().unwrap().as_mut() {
            cb(attribute, text);
        }
    }
}

impl BluetoothSink for FakeSink {
    fn set_pin_config(&self, pins: I2sPins) {
        *self.pins.lock().unwrap() = Some(pins);
    }
    fn start(&self, device_name: &str) {
        self.started.lock().unwrap().push(device_name.to_string());
    }
    fn on_track_metadata(&self, callback: TrackMetadataCallback) {
        *self.callback.lock().unwrap() = Some(callback);
    }
    fn audio_state(&self) -> A2dpAudioState {
        *self.state.lock().unwrap()
    }
}

/// `None` makes the store fail like unreadable flash.
pub struct MemoryPrefs(pub Arc<Mutex<Option<u8>>>);

impl PreferenceStore for MemoryPrefs {
    fn read_byte(&mut self) -> Result<u8, DeviceError> {
        self.0
            .lock()
            .unwrap()
            .ok_or_else(|| DeviceError::StorageUnavailable("test store".into()))
    }
    fn write_byte(&mut self, value: u8) -> Result<(), DeviceError> {
        *self.0.lock().unwrap() = Some(value);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<String>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, song: &str) {
        self.sent.lock().unwrap().push(song.to_string());
    }
}

// ── rig ───────────────────────────────────────────────────────────────────────

/// Test-side handles of every fake on a [`Board`].
pub struct Handles {
    pub decoder: Arc<Mutex<DecoderLog>>,
    pub sessions_made: Arc<AtomicUsize>,
    pub frame: Arc<Mutex<Frame>>,
    pub panel: Arc<Mutex<PanelScript>>,
    pub network: Arc<FakeNetwork>,
    pub amp: Arc<RecordingAmp>,
    pub sink: Arc<FakeSink>,
    pub prefs: Arc<Mutex<Option<u8>>>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn devices(boot_byte: Option<u8>) -> (Devices, Handles) {
    let decoder = Arc::new(Mutex::new(DecoderLog::default()));
    let sessions_made = Arc::new(AtomicUsize::new(0));
    let network = Arc::new(FakeNetwork::up());
    let amp = Arc::new(RecordingAmp::default());
    let sink = Arc::new(FakeSink::default());
    let prefs = Arc::new(Mutex::new(boot_byte));
    let notifier = Arc::new(RecordingNotifier::default());

    let factory_log = Arc::clone(&decoder);
    let factory_count = Arc::clone(&sessions_made);
    let devices = Devices {
        network: network.clone(),
        amp: amp.clone(),
        bluetooth: sink.clone(),
        prefs: Box::new(MemoryPrefs(Arc::clone(&prefs))),
        notifier: notifier.clone(),
        sessions: Box::new(move || {
            factory_count.fetch_add(1, Ordering::SeqCst);
            Box::new(ScriptedDecoder(Arc::clone(&factory_log))) as Box<dyn StreamDecoder>
        }),
    };
    (
        devices,
        Handles {
            decoder,
            sessions_made,
            frame: Arc::new(Mutex::new(Frame::default())),
            panel: Arc::new(Mutex::new(PanelScript::default())),
            network,
            amp,
            sink,
            prefs,
            notifier,
        },
    )
}

pub fn board(boot_byte: Option<u8>) -> (Board, Handles) {
    let (devices, handles) = devices(boot_byte);
    let board = Board {
        display: Box::new(RecordingDisplay(Arc::clone(&handles.frame))),
        panel: Box::new(ScriptedPanel(Arc::clone(&handles.panel))),
        devices,
    };
    (board, handles)
}
