//! Audio task: connection and buffer management for radio mode.
//!
//! The engine owns the decoder session and the mute gate.  Once per cycle
//! it consumes the UI's intents (volume, pause/resume, station change),
//! judges stream health from the buffer fill level, lets the decoder
//! process one slice and publishes a status snapshot back to the UI.
//!
//! ```text
//!   UI task ── station / playback / volume ──▶ AudioEngine::cycle()
//!           ◀── AudioStatus / station name / stream title ──
//!   Coordinator ── AudioRun ──▶            ◀── observed AudioRun ──
//! ```

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use stick_proto::metadata::{normalize_station_name, normalize_stream_title};
use stick_proto::protocol::{AudioStatus, BufferState, ConnectionHealth, PlaybackIntent};
use stick_proto::stations::StationCatalog;
use tracing::{debug, info, warn};

use crate::gate::MuteGate;
use crate::hal::{Amplifier, StreamDecoder, StreamEvent};
use crate::latest::{latest, latest_pending, Publisher, Subscriber};

/// Run state the coordinator imposes on the audio task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioRun {
    Active,
    /// Touch nothing; the session may be torn down once this is observed.
    Idle,
    /// Leave the task loop and hand the engine back.
    Exit,
}

/// What a cycle decided about the loop cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Active,
    Idle,
    Exit,
}

pub trait Clock: Send {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

// ── channels ──────────────────────────────────────────────────────────────────

/// UI-task ends of the radio-mode cells.
#[derive(Debug)]
pub struct RadioLinks {
    pub station: Publisher<usize>,
    pub playback: Publisher<PlaybackIntent>,
    pub volume: Publisher<u8>,
    pub status: Subscriber<AudioStatus>,
    pub station_name: Subscriber<String>,
    pub stream_title: Subscriber<String>,
}

/// Audio-task ends of the radio-mode cells.
#[derive(Debug)]
pub struct AudioPorts {
    station: Subscriber<usize>,
    playback: Subscriber<PlaybackIntent>,
    volume: Subscriber<u8>,
    run: Subscriber<AudioRun>,
    status: Publisher<AudioStatus>,
    observed_run: Publisher<AudioRun>,
    station_name: Publisher<String>,
    stream_title: Publisher<String>,
}

/// Coordinator ends: run control and its acknowledgement.
#[derive(Debug)]
pub struct AudioControl {
    pub run: Publisher<AudioRun>,
    pub observed_run: Subscriber<AudioRun>,
}

/// Wire up every cell for one radio-mode session.
///
/// With `connect_now` the first cycle connects to `start_station`;
/// without it the engine waits for an explicit station change or resume.
pub fn radio_channels(
    start_station: usize,
    connect_now: bool,
) -> (RadioLinks, AudioPorts, AudioControl) {
    let (station_tx, station_rx) = if connect_now {
        latest_pending(start_station)
    } else {
        latest(start_station)
    };
    let (playback_tx, playback_rx) = latest(PlaybackIntent::Playing);
    let (volume_tx, volume_rx) = latest_pending(0u8);
    let (status_tx, status_rx) = latest(AudioStatus::default());
    let (name_tx, name_rx) = latest(String::new());
    let (title_tx, title_rx) = latest(String::new());
    let (run_tx, run_rx) = latest(AudioRun::Active);
    let (observed_tx, observed_rx) = latest(AudioRun::Active);

    (
        RadioLinks {
            station: station_tx,
            playback: playback_tx,
            volume: volume_tx,
            status: status_rx,
            station_name: name_rx,
            stream_title: title_rx,
        },
        AudioPorts {
            station: station_rx,
            playback: playback_rx,
            volume: volume_rx,
            run: run_rx,
            status: status_tx,
            observed_run: observed_tx,
            station_name: name_tx,
            stream_title: title_tx,
        },
        AudioControl {
            run: run_tx,
            observed_run: observed_rx,
        },
    )
}

// ── engine ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub priming_ratio: f32,
    pub stream_grace: Duration,
}

pub struct AudioEngine {
    settings: EngineSettings,
    catalog: StationCatalog,
    session: Option<Box<dyn StreamDecoder>>,
    amp: Arc<dyn Amplifier>,
    clock: Box<dyn Clock>,
    ports: AudioPorts,
    gate: MuteGate,
    run: AudioRun,
    station: usize,
    paused: bool,
    health: ConnectionHealth,
    buffer: BufferState,
    /// Set by a successful connect; cleared by pause and failed connects.
    connected_at: Option<Instant>,
    connect_attempts: u32,
}

impl AudioEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings: EngineSettings,
        catalog: StationCatalog,
        session: Box<dyn StreamDecoder>,
        amp: Arc<dyn Amplifier>,
        clock: Box<dyn Clock>,
        ports: AudioPorts,
        start_station: usize,
        initial_health: ConnectionHealth,
    ) -> Self {
        let mut engine = Self {
            settings,
            station: start_station % catalog.len(),
            catalog,
            session: Some(session),
            amp,
            clock,
            ports,
            gate: MuteGate::new(),
            run: AudioRun::Active,
            paused: false,
            health: initial_health,
            buffer: BufferState::default(),
            connected_at: None,
            connect_attempts: 0,
        };
        engine.gate.engage(engine.amp.as_ref());
        engine.publish_status();
        engine
    }

    pub fn health(&self) -> ConnectionHealth {
        self.health
    }

    pub fn is_muted(&self) -> bool {
        self.gate.is_engaged()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn station(&self) -> usize {
        self.station
    }

    pub fn buffer(&self) -> BufferState {
        self.buffer
    }

    pub fn connected_at(&self) -> Option<Instant> {
        self.connected_at
    }

    pub fn connect_attempts(&self) -> u32 {
        self.connect_attempts
    }

    /// Give up the session; the caller stops and drops it.
    pub fn into_session(mut self) -> Option<Box<dyn StreamDecoder>> {
        self.session.take()
    }

    /// One audio-task cycle.
    ///
    /// Order within a cycle: run state, intents, buffer health, decode step,
    /// status publish.
    pub fn cycle(&mut self) -> CycleOutcome {
        if let Some(run) = self.ports.run.take() {
            if run != self.run {
                info!("audio: run state {:?} → {:?}", self.run, run);
            }
            self.run = run;
        }
        self.ports.observed_run.publish_if_changed(self.run);

        match self.run {
            AudioRun::Active => {}
            AudioRun::Idle => return CycleOutcome::Idle,
            AudioRun::Exit => return CycleOutcome::Exit,
        }

        if let Some(volume) = self.ports.volume.take() {
            if let Some(session) = self.session.as_mut() {
                session.set_volume(volume);
            }
        }

        if let Some(intent) = self.ports.playback.take() {
            match intent {
                PlaybackIntent::UserPaused => self.pause(),
                PlaybackIntent::Playing => self.resume(),
            }
        }

        if let Some(index) = self.ports.station.take() {
            self.station = index % self.catalog.len();
            if self.paused {
                debug!("audio: station {} recorded while paused", self.station);
            } else {
                self.connect();
            }
        }

        self.check_buffer_health();

        if let Some(session) = self.session.as_mut() {
            let ports = &self.ports;
            session.step(&mut |event| match event {
                StreamEvent::StationName(name) => {
                    ports.station_name.publish(normalize_station_name(&name));
                }
                StreamEvent::StreamTitle(title) => {
                    ports.stream_title.publish(normalize_stream_title(&title));
                }
            });
        }
        self.refresh_buffer();

        self.publish_status();
        CycleOutcome::Active
    }

    fn pause(&mut self) {
        if self.paused {
            debug!("audio: already paused");
            return;
        }
        info!("audio: pausing, tearing down stream");
        if let Some(session) = self.session.as_mut() {
            session.stop();
        }
        self.gate.engage(self.amp.as_ref());
        self.paused = true;
        self.connected_at = None;
        self.health = ConnectionHealth::Ok;
        self.refresh_buffer();
    }

    fn resume(&mut self) {
        if !self.paused {
            debug!("audio: resume while playing ignored");
            return;
        }
        info!("audio: resuming station {}", self.station);
        self.paused = false;
        self.connect();
    }

    fn connect(&mut self) {
        let station = self.catalog.get(self.station).clone();
        self.gate.engage(self.amp.as_ref());
        self.connect_attempts = self.connect_attempts.wrapping_add(1);

        let Some(session) = self.session.as_mut() else {
            warn!("audio: no session, cannot connect to {}", station.url);
            self.health = ConnectionHealth::ConnectError;
            self.connected_at = None;
            return;
        };

        session.stop();
        if session.connect(&station.url) {
            info!("audio: connected to '{}' ({})", station.name, station.url);
            self.health = ConnectionHealth::Ok;
            self.connected_at = Some(self.clock.now());
        } else {
            warn!("audio: connection to '{}' failed ({})", station.name, station.url);
            self.health = ConnectionHealth::ConnectError;
            self.connected_at = None;
        }
        self.refresh_buffer();
    }

    /// Open the gate once primed, or flag a stalled stream after the grace
    /// window.  Only meaningful while muted, playing and connected.
    fn check_buffer_health(&mut self) {
        if !self.gate.is_engaged() || self.paused {
            return;
        }
        if self.buffer.is_primed(self.settings.priming_ratio) {
            info!(
                "audio: buffer primed ({} of {} bytes), unmuting",
                self.buffer.filled, self.buffer.capacity
            );
            self.gate.release(self.amp.as_ref());
            if self.health == ConnectionHealth::StreamError {
                self.health = ConnectionHealth::Ok;
            }
            return;
        }
        let Some(connected_at) = self.connected_at else {
            return;
        };
        let stalled =
            self.clock.now().saturating_duration_since(connected_at) > self.settings.stream_grace;
        if stalled && self.health != ConnectionHealth::StreamError {
            warn!(
                "audio: buffer low: {} of {} bytes after {:?}",
                self.buffer.filled, self.buffer.capacity, self.settings.stream_grace
            );
            self.health = ConnectionHealth::StreamError;
        }
    }

    fn refresh_buffer(&mut self) {
        if let Some(session) = self.session.as_ref() {
            self.buffer = BufferState::from_counts(session.buffer_filled(), session.buffer_free());
        }
    }

    fn publish_status(&self) {
        self.ports.status.publish_if_changed(AudioStatus {
            buffer: self.buffer,
            muted: self.gate.is_engaged(),
            paused: self.paused,
            health: self.health,
            station: self.station,
            connect_attempts: self.connect_attempts,
        });
    }
}

// ── task ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct AudioCadence {
    pub active: Duration,
    pub idle: Duration,
}

/// The audio task runs on its own OS thread so a blocking connect never
/// stalls the UI.
pub struct AudioTask {
    join: JoinHandle<AudioEngine>,
}

impl AudioTask {
    pub fn spawn(mut engine: AudioEngine, cadence: AudioCadence) -> std::io::Result<Self> {
        let join = thread::Builder::new()
            .name("audio".to_string())
            .spawn(move || {
                debug!("audio task started");
                loop {
                    match engine.cycle() {
                        CycleOutcome::Active => thread::sleep(cadence.active),
                        CycleOutcome::Idle => thread::sleep(cadence.idle),
                        CycleOutcome::Exit => break,
                    }
                }
                debug!("audio task exiting");
                engine
            })?;
        Ok(Self { join })
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the thread to leave its loop and take the engine back.
    pub fn join(self) -> Option<AudioEngine> {
        match self.join.join() {
            Ok(engine) => Some(engine),
            Err(_) => {
                warn!("audio task panicked; session lost");
                None
            }
        }
    }
}
