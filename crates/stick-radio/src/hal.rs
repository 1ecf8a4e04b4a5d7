//! Interfaces of the collaborators the appliance core drives: stream
//! decoder, amplifier, Bluetooth sink, network link, preference storage,
//! display, buttons and the notification webhook.
//!
//! Board implementations live in [`crate::host`]; tests use scripted fakes.

use stick_proto::protocol::{A2dpAudioState, TrackAttribute};

use crate::error::DeviceError;

/// Metadata the decoder reports from inside [`StreamDecoder::step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    StationName(String),
    StreamTitle(String),
}

/// The MP3/AAC stream decoder and its input ring buffer.
pub trait StreamDecoder: Send {
    /// Open the stream.  May block for the decoder's own connect timeout.
    fn connect(&mut self, url: &str) -> bool;
    fn stop(&mut self);
    /// Process one slice of buffered audio, reporting metadata found in it.
    fn step(&mut self, events: &mut dyn FnMut(StreamEvent));
    fn set_volume(&mut self, volume: u8);
    fn buffer_filled(&self) -> usize;
    fn buffer_free(&self) -> usize;
}

/// Output stage shutdown control.
pub trait Amplifier: Send + Sync {
    fn set_shutdown(&self, shutdown: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I2sPins {
    pub bck: u8,
    pub ws: u8,
    pub data_out: u8,
}

pub type TrackMetadataCallback = Box<dyn FnMut(TrackAttribute, &str) + Send>;

/// A2DP sink.  The stack offers no way to stop it once started.
pub trait BluetoothSink: Send + Sync {
    fn set_pin_config(&self, pins: I2sPins);
    fn start(&self, device_name: &str);
    /// Register the AVRC metadata callback; invoked from the stack's own
    /// thread, once per attribute.
    fn on_track_metadata(&self, callback: TrackMetadataCallback);
    fn audio_state(&self) -> A2dpAudioState;
}

/// WiFi station interface.
pub trait Network: Send + Sync {
    fn begin(&self, host_name: &str, ssid: &str, password: &str);
    fn is_associated(&self) -> bool;
    fn local_address(&self) -> Option<String> {
        None
    }
}

/// One byte of non-volatile storage.
pub trait PreferenceStore: Send {
    fn read_byte(&mut self) -> Result<u8, DeviceError>;
    fn write_byte(&mut self, value: u8) -> Result<(), DeviceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Black,
    White,
    Orange,
    Cyan,
    Red,
    Green,
    Magenta,
    DarkGrey,
}

/// Fixed screen areas, top to bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Station,
    Status,
    Song,
    Footer,
    /// Free-form line used by the startup screen.
    Line(u8),
}

/// Framebuffer region writer.  Horizontal positions are in display dots.
pub trait Display: Send {
    fn width(&self) -> i32;
    fn text_width(&self, text: &str) -> i32;
    fn clear(&mut self);
    fn fill(&mut self, region: Region, color: Color);
    fn draw_text(&mut self, region: Region, x: i32, text: &str, color: Color);
    fn present(&mut self) -> Result<(), DeviceError>;
}

/// Raw button levels, `true` = held down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonLevels {
    pub primary: bool,
    pub secondary: bool,
    pub mode: bool,
}

/// What the power-management chip latched since the last poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PowerKeySample {
    pub pressed: bool,
    pub long_pressed: bool,
}

pub trait InputPanel: Send {
    fn buttons(&mut self) -> ButtonLevels;
    fn power_key(&mut self) -> PowerKeySample;
    /// Host-only escape hatch; the device itself never shuts down.
    fn shutdown_requested(&mut self) -> bool {
        false
    }
}

/// Fire-and-forget song-info forwarder.
pub trait Notifier: Send + Sync {
    fn notify(&self, song: &str);
}
