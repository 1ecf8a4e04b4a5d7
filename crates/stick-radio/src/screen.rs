//! What the UI task puts on the display each cycle.

use crate::hal::{Color, Display, Region};

/// Widest song line that is scrolled; anything beyond is clipped.
pub const MAX_SONG_WIDTH: i32 = 1000;

/// Left margin of the station and status lines.
const TEXT_INSET: i32 = 4;

/// Station name and song info, each with a pending-redraw flag.
/// Owned by the UI task.
#[derive(Debug, Clone, Default)]
pub struct DisplayText {
    station: String,
    station_dirty: bool,
    song: String,
    song_dirty: bool,
}

impl DisplayText {
    pub fn new() -> Self {
        Self {
            station_dirty: true,
            song_dirty: true,
            ..Self::default()
        }
    }

    pub fn set_station(&mut self, station: String) {
        self.station = station;
        self.station_dirty = true;
    }

    pub fn set_song(&mut self, song: String) {
        self.song = song;
        self.song_dirty = true;
    }

    /// Blank both lines, e.g. after switching stations.
    pub fn clear(&mut self) {
        self.set_station(String::new());
        self.set_song(String::new());
    }

    pub fn station(&self) -> &str {
        &self.station
    }

    pub fn song(&self) -> &str {
        &self.song
    }

}

/// Scroll state and bookkeeping for the rendered regions.
#[derive(Debug)]
pub struct Screen {
    song_x: i32,
    song_width: i32,
    banner_up: bool,
    status: String,
}

impl Screen {
    pub fn new(display: &dyn Display) -> Self {
        Self {
            song_x: display.width(),
            song_width: 0,
            banner_up: false,
            status: String::new(),
        }
    }

    #[cfg(test)]
    fn song_x(&self) -> i32 {
        self.song_x
    }

    #[cfg(test)]
    fn banner_up(&self) -> bool {
        self.banner_up
    }

    /// Full-width error banner over the station line.
    pub fn render_banner(&mut self, display: &mut dyn Display, banner: &str) {
        display.fill(Region::Station, Color::Red);
        display.draw_text(Region::Station, TEXT_INSET, banner, Color::White);
        self.banner_up = true;
    }

    /// Normal refresh: station line when dirty, song line always (redraw
    /// when dirty, otherwise scroll one dot to the left).
    pub fn render(&mut self, display: &mut dyn Display, text: &mut DisplayText) {
        if self.banner_up {
            self.banner_up = false;
            text.station_dirty = true;
        }

        if text.station_dirty {
            display.fill(Region::Station, Color::Black);
            display.draw_text(Region::Station, TEXT_INSET, &text.station, Color::Orange);
            text.station_dirty = false;
            self.set_status(display, "Playing");
        }

        display.fill(Region::Song, Color::Black);
        if text.song_dirty {
            self.song_x = display.width();
            self.song_width = display.text_width(&text.song).min(MAX_SONG_WIDTH);
            text.song_dirty = false;
        } else {
            self.song_x -= 1;
            if self.song_x < -self.song_width {
                self.song_x = display.width();
            }
        }
        display.draw_text(Region::Song, self.song_x, &text.song, Color::Cyan);
    }

    /// Status line under the station name; redrawn only on change.
    pub fn set_status(&mut self, display: &mut dyn Display, status: &str) {
        if self.status == status {
            return;
        }
        self.status = status.to_string();
        display.fill(Region::Status, Color::Black);
        display.draw_text(Region::Status, TEXT_INSET, status, Color::DarkGrey);
    }

    pub fn show_volume(&mut self, display: &mut dyn Display, volume: u8) {
        display.fill(Region::Footer, Color::Black);
        display.draw_text(Region::Footer, 3, &format!("Vol: {:2}", volume), Color::Green);
    }
}

/// Startup screen lines, drawn before the network is up.
pub fn render_splash(display: &mut dyn Display, lines: &[(&str, Color)]) {
    display.clear();
    for (row, (text, color)) in lines.iter().enumerate() {
        let row = u8::try_from(row).unwrap_or(u8::MAX);
        display.draw_text(Region::Line(row), 0, text, *color);
    }
}
