//! Host stream session: an ICY (Shoutcast/Icecast) HTTP client standing in
//! for the board's MP3 decoder.
//!
//! A reader thread pulls the response body into a bounded byte counter,
//! splitting out the interleaved metadata blocks.  Once the buffer has
//! filled, [`StreamDecoder::step`] drains it at the stream's advertised
//! bitrate, so the fill level behaves like a real playback buffer.

use std::io::Read;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use reqwest::blocking::{Client, Response};
use tracing::{debug, info, warn};

use crate::hal::{StreamDecoder, StreamEvent};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const USER_AGENT: &str = concat!("stickradio/", env!("CARGO_PKG_VERSION"));
const DEFAULT_BITRATE_KBPS: u32 = 128;
const READ_CHUNK: usize = 4096;
const FULL_BACKOFF: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IcyHeaders {
    pub metaint: usize,
    pub station_name: Option<String>,
    pub bitrate_kbps: Option<u32>,
}

fn parse_icy_headers(response: &Response) -> IcyHeaders {
    let headers = response.headers();
    let text = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().to_string())
    };
    IcyHeaders {
        metaint: text("icy-metaint")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
        station_name: text("icy-name"),
        bitrate_kbps: text("icy-br").and_then(|v| v.parse().ok()),
    }
}

/// Pull the `StreamTitle` value out of one metadata block.
///
/// Blocks look like `StreamTitle='Artist - Title';StreamUrl='';` padded
/// with NULs.  Titles may themselves contain `'`, so the value runs up to
/// the first `';`.
pub fn extract_stream_title(block: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(block);
    let text = text.trim_end_matches('\0');
    let start = text.find("StreamTitle='")? + "StreamTitle='".len();
    let rest = &text[start..];
    let end = rest.find("';").unwrap_or(rest.len());
    Some(rest[..end].to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DemuxState {
    Audio { remaining: usize },
    Length,
    Meta { remaining: usize },
}

/// Splits an ICY body into audio bytes and metadata blocks.
/// Chunk boundaries may fall anywhere, including inside a block.
#[derive(Debug)]
pub struct IcyDemuxer {
    metaint: usize,
    state: DemuxState,
    block: Vec<u8>,
}

impl IcyDemuxer {
    /// `metaint == 0` means the server sends no metadata.
    pub fn new(metaint: usize) -> Self {
        Self {
            metaint,
            state: DemuxState::Audio { remaining: metaint },
            block: Vec::new(),
        }
    }

    /// Returns the number of audio bytes in `bytes`; each completed
    /// metadata block is handed to `on_block`.
    pub fn feed(&mut self, mut bytes: &[u8], on_block: &mut dyn FnMut(&[u8])) -> usize {
        if self.metaint == 0 {
            return bytes.len();
        }
        let mut audio = 0;
        while !bytes.is_empty() {
            match self.state {
                DemuxState::Audio { remaining } => {
                    let n = remaining.min(bytes.len());
                    audio += n;
                    bytes = &bytes[n..];
                    self.state = if n == remaining {
                        DemuxState::Length
                    } else {
                        DemuxState::Audio {
                            remaining: remaining - n,
                        }
                    };
                }
                DemuxState::Length => {
                    let len = usize::from(bytes[0]) * 16;
                    bytes = &bytes[1..];
                    self.state = if len == 0 {
                        DemuxState::Audio {
                            remaining: self.metaint,
                        }
                    } else {
                        self.block.clear();
                        DemuxState::Meta { remaining: len }
                    };
                }
                DemuxState::Meta { remaining } => {
                    let n = remaining.min(bytes.len());
                    self.block.extend_from_slice(&bytes[..n]);
                    bytes = &bytes[n..];
                    if n == remaining {
                        on_block(&self.block);
                        self.state = DemuxState::Audio {
                            remaining: self.metaint,
                        };
                    } else {
                        self.state = DemuxState::Meta {
                            remaining: remaining - n,
                        };
                    }
                }
            }
        }
        audio
    }
}

/// State shared with one reader thread.  Every connect gets a fresh one,
/// so a reader that outlives its connection only updates stale counters.
#[derive(Debug, Default)]
struct Shared {
    filled: AtomicUsize,
    stop: AtomicBool,
}

struct Connection {
    shared: Arc<Shared>,
    events: Receiver<StreamEvent>,
    bytes_per_sec: usize,
    draining: bool,
    last_step: Option<Instant>,
}

pub struct IcySession {
    client: Option<Client>,
    capacity: usize,
    volume: u8,
    connection: Option<Connection>,
    pending: Vec<StreamEvent>,
}

impl IcySession {
    pub fn new(capacity: usize) -> Self {
        Self {
            client: None,
            capacity: capacity.max(1),
            volume: 0,
            connection: None,
            pending: Vec::new(),
        }
    }

    // Built on first use so it is created on the audio thread.
    fn client(&mut self) -> Option<&Client> {
        if self.client.is_none() {
            match Client::builder()
                .user_agent(USER_AGENT)
                .connect_timeout(CONNECT_TIMEOUT)
                .timeout(None::<Duration>)
                .build()
            {
                Ok(client) => self.client = Some(client),
                Err(e) => {
                    warn!("icy: cannot build HTTP client: {}", e);
                    return None;
                }
            }
        }
        self.client.as_ref()
    }

    fn filled(&self) -> usize {
        self.connection
            .as_ref()
            .map_or(0, |c| c.shared.filled.load(Ordering::Relaxed))
    }
}

impl StreamDecoder for IcySession {
    fn connect(&mut self, url: &str) -> bool {
        self.stop();
        let capacity = self.capacity;
        let Some(client) = self.client() else {
            return false;
        };

        let response = match client.get(url).header("Icy-MetaData", "1").send() {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!("icy: {} answered {}", url, r.status());
                return false;
            }
            Err(e) => {
                warn!("icy: request to {} failed: {}", url, e);
                return false;
            }
        };

        let headers = parse_icy_headers(&response);
        info!(
            "icy: connected, metaint={} bitrate={:?} name={:?}",
            headers.metaint, headers.bitrate_kbps, headers.station_name
        );
        if let Some(name) = headers.station_name.clone() {
            self.pending.push(StreamEvent::StationName(name));
        }

        let shared = Arc::new(Shared::default());
        let (tx, rx) = mpsc::channel();
        let reader_shared = Arc::clone(&shared);
        let metaint = headers.metaint;
        let spawned = thread::Builder::new()
            .name("icy-reader".to_string())
            .spawn(move || read_body(response, metaint, capacity, reader_shared, tx));
        if let Err(e) = spawned {
            warn!("icy: cannot start reader thread: {}", e);
            return false;
        }

        let kbps = headers.bitrate_kbps.unwrap_or(DEFAULT_BITRATE_KBPS).max(1);
        self.connection = Some(Connection {
            shared,
            events: rx,
            bytes_per_sec: kbps as usize * 1000 / 8,
            draining: false,
            last_step: None,
        });
        true
    }

    fn stop(&mut self) {
        if let Some(conn) = self.connection.take() {
            debug!("icy: stopping reader");
            conn.shared.stop.store(true, Ordering::SeqCst);
        }
        self.pending.clear();
    }

    fn step(&mut self, events: &mut dyn FnMut(StreamEvent)) {
        for event in self.pending.drain(..) {
            events(event);
        }
        let capacity = self.capacity;
        let Some(conn) = self.connection.as_mut() else {
            return;
        };
        while let Ok(event) = conn.events.try_recv() {
            events(event);
        }

        let now = Instant::now();
        let elapsed = conn.last_step.map_or(Duration::ZERO, |t| now - t);
        conn.last_step = Some(now);

        if !conn.draining {
            if conn.shared.filled.load(Ordering::Relaxed) >= capacity {
                debug!("icy: buffer full, starting playback drain");
                conn.draining = true;
            }
            return;
        }
        let consumed = (conn.bytes_per_sec as f64 * elapsed.as_secs_f64()) as usize;
        if consumed > 0 {
            let _ = conn
                .shared
                .filled
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |f| {
                    Some(f.saturating_sub(consumed))
                });
        }
    }

    fn set_volume(&mut self, volume: u8) {
        if volume != self.volume {
            debug!("icy: volume {}", volume);
            self.volume = volume;
        }
    }

    fn buffer_filled(&self) -> usize {
        self.filled().min(self.capacity)
    }

    fn buffer_free(&self) -> usize {
        self.capacity - self.buffer_filled()
    }
}

fn read_body(
    mut response: Response,
    metaint: usize,
    capacity: usize,
    shared: Arc<Shared>,
    events: Sender<StreamEvent>,
) {
    let mut demux = IcyDemuxer::new(metaint);
    let mut chunk = vec![0u8; READ_CHUNK];
    let mut last_title: Option<String> = None;

    loop {
        if shared.stop.load(Ordering::SeqCst) {
            debug!("icy: reader stopped");
            return;
        }
        if shared.filled.load(Ordering::Relaxed) >= capacity {
            thread::sleep(FULL_BACKOFF);
            continue;
        }
        let n = match response.read(&mut chunk) {
            Ok(0) => {
                info!("icy: server closed the stream");
                return;
            }
            Ok(n) => n,
            Err(e) => {
                warn!("icy: read error: {}", e);
                return;
            }
        };

        let audio = demux.feed(&chunk[..n], &mut |block| {
            if let Some(title) = extract_stream_title(block) {
                if last_title.as_deref() != Some(title.as_str()) {
                    last_title = Some(title.clone());
                    let _ = events.send(StreamEvent::StreamTitle(title));
                }
            }
        });
        let _ = shared
            .filled
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |f| {
                Some(f.saturating_add(audio).min(capacity))
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta_block(text: &str) -> Vec<u8> {
        let mut block = text.as_bytes().to_vec();
        let padded = block.len().div_ceil(16) * 16;
        block.resize(padded, 0);
        let mut out = vec![(padded / 16) as u8];
        out.extend(block);
        out
    }

    #[test]
    fn test_extract_title_with_apostrophe() {
        let block = b"StreamTitle='Guns N' Roses - Patience';StreamUrl='';\0\0\0";
        assert_eq!(
            extract_stream_title(block).as_deref(),
            Some("Guns N' Roses - Patience")
        );
    }

    #[test]
    fn test_extract_title_missing() {
        assert_eq!(extract_stream_title(b"StreamUrl='x';\0"), None);
    }

    #[test]
    fn test_demux_splits_audio_and_metadata() {
        let mut body = vec![0xAA; 8];
        body.extend(meta_block("StreamTitle='A - B';"));
        body.extend(vec![0xBB; 8]);
        body.push(0); // empty metadata block
        body.extend(vec![0xCC; 3]);

        let mut demux = IcyDemuxer::new(8);
        let mut titles = Vec::new();
        let audio = demux.feed(&body, &mut |b| titles.push(extract_stream_title(b)));
        assert_eq!(audio, 19);
        assert_eq!(titles, vec![Some("A - B".to_string())]);
    }

    #[test]
    fn test_demux_handles_any_chunk_boundary() {
        let mut body = vec![0u8; 16];
        body.extend(meta_block("StreamTitle='Split';"));
        body.extend(vec![0u8; 16]);

        for size in 1..body.len() {
            let mut demux = IcyDemuxer::new(16);
            let mut titles = Vec::new();
            let mut audio = 0;
            for chunk in body.chunks(size) {
                audio += demux.feed(chunk, &mut |b| titles.push(extract_stream_title(b)));
            }
            assert_eq!(audio, 32, "chunk size {}", size);
            assert_eq!(titles, vec![Some("Split".to_string())], "chunk size {}", size);
        }
    }

    #[test]
    fn test_no_metaint_is_all_audio() {
        let mut demux = IcyDemuxer::new(0);
        let mut called = false;
        assert_eq!(demux.feed(&[1, 2, 3], &mut |_| called = true), 3);
        assert!(!called);
    }

    #[test]
    fn test_unconnected_session_reports_empty_buffer() {
        let session = IcySession::new(1000);
        assert_eq!(session.buffer_filled(), 0);
        assert_eq!(session.buffer_free(), 1000);
    }
}
