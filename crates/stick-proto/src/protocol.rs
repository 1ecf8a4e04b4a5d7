/// Highest volume step the decoder accepts.
pub const VOLUME_MAX: u8 = 21;

/// Boot-preference byte values as stored in non-volatile storage.
pub const BOOT_BYTE_RADIO: u8 = 1;
pub const BOOT_BYTE_BLUETOOTH: u8 = 2;

/// Which of the two appliance personalities is active.
///
/// `None` only exists between power-up and the end of boot, and while a
/// mode switch is tearing the current mode down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceMode {
    #[default]
    None,
    Radio,
    Bluetooth,
}

impl DeviceMode {
    /// Decode the persisted boot preference.  Anything other than the
    /// Bluetooth byte (including unreadable storage) boots into Radio.
    pub fn from_boot_byte(byte: Option<u8>) -> Self {
        match byte {
            Some(BOOT_BYTE_BLUETOOTH) => DeviceMode::Bluetooth,
            _ => DeviceMode::Radio,
        }
    }

    /// Byte to persist for this mode.  `None` is never persisted.
    pub fn boot_byte(self) -> Option<u8> {
        match self {
            DeviceMode::Radio => Some(BOOT_BYTE_RADIO),
            DeviceMode::Bluetooth => Some(BOOT_BYTE_BLUETOOTH),
            DeviceMode::None => None,
        }
    }

    /// The mode the mode-switch button flips to.
    pub fn other(self) -> Self {
        match self {
            DeviceMode::Radio => DeviceMode::Bluetooth,
            DeviceMode::Bluetooth | DeviceMode::None => DeviceMode::Radio,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DeviceMode::None => "none",
            DeviceMode::Radio => "radio",
            DeviceMode::Bluetooth => "bluetooth",
        }
    }
}

/// What the user asked for with the play/pause controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackIntent {
    #[default]
    Playing,
    UserPaused,
}

/// Stream availability as judged by the audio task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionHealth {
    #[default]
    Ok,
    /// The outbound connection attempt itself failed.
    ConnectError,
    /// Connected, but the buffer never reached the priming threshold
    /// within the grace window.
    StreamError,
}

impl ConnectionHealth {
    pub fn is_error(self) -> bool {
        !matches!(self, ConnectionHealth::Ok)
    }

    /// Banner text shown across the station line while unhealthy.
    pub fn banner(self) -> Option<&'static str> {
        match self {
            ConnectionHealth::Ok => None,
            ConnectionHealth::ConnectError => Some("Connection failed"),
            ConnectionHealth::StreamError => Some("Stream unavailable"),
        }
    }
}

const PPM: u128 = 1_000_000;

/// Decoder input-buffer occupancy.  `filled <= capacity` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferState {
    pub filled: usize,
    pub capacity: usize,
}

impl BufferState {
    /// Build from the decoder's filled/free counters.
    pub fn from_counts(filled: usize, free: usize) -> Self {
        Self {
            filled,
            capacity: filled.saturating_add(free),
        }
    }

    /// True once `filled` is strictly above `ratio * capacity`.
    /// An empty (zero-capacity) buffer is never primed.
    ///
    /// The ratio is rounded to parts per million and compared in integers,
    /// so `0.9f32` means exactly nine tenths.
    pub fn is_primed(&self, ratio: f32) -> bool {
        if self.capacity == 0 {
            return false;
        }
        let ppm = (f64::from(ratio) * PPM as f64).round().clamp(0.0, PPM as f64) as u128;
        self.filled as u128 * PPM > ppm * self.capacity as u128
    }
}

/// Snapshot the audio task publishes for the UI task once per change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioStatus {
    pub buffer: BufferState,
    /// MuteGate: amplifier held in shutdown while true.
    pub muted: bool,
    pub paused: bool,
    pub health: ConnectionHealth,
    /// Station the audio task last acted on.
    pub station: usize,
    /// Bumped on every connect attempt (successful or not).
    pub connect_attempts: u32,
}

impl Default for AudioStatus {
    fn default() -> Self {
        Self {
            buffer: BufferState::default(),
            muted: true,
            paused: false,
            health: ConnectionHealth::Ok,
            station: 0,
            connect_attempts: 0,
        }
    }
}

/// A2DP sink audio state as reported by the Bluetooth stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum A2dpAudioState {
    #[default]
    Idle,
    Started,
    Suspended,
    Stopped,
}

impl A2dpAudioState {
    pub fn label(self) -> &'static str {
        match self {
            A2dpAudioState::Idle => "Waiting",
            A2dpAudioState::Started => "Playing",
            A2dpAudioState::Suspended => "Paused",
            A2dpAudioState::Stopped => "Stopped",
        }
    }
}

/// AVRC metadata attribute, decoded from the raw attribute id mask value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackAttribute {
    Title,
    Artist,
    Album,
    Other(u8),
}

impl TrackAttribute {
    pub fn from_id(id: u8) -> Self {
        match id {
            0x01 => TrackAttribute::Title,
            0x02 => TrackAttribute::Artist,
            0x04 => TrackAttribute::Album,
            other => TrackAttribute::Other(other),
        }
    }
}
