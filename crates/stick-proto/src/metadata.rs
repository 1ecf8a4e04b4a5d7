//! Metadata adapter: turns radio ICY tags and Bluetooth AVRC attributes
//! into the two strings the display shows.

use crate::protocol::TrackAttribute;

/// Normalise an ICY `StreamTitle` value.
///
/// Accepts either the bare title or the raw `StreamTitle='...';` payload.
/// Titles made only of separators (some stations send `" - "` between
/// songs) collapse to the empty string.
pub fn normalize_stream_title(raw: &str) -> String {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("StreamTitle=") {
        s = rest.trim_end_matches(';');
        s = s.strip_prefix('\'').unwrap_or(s);
        s = s.strip_suffix('\'').unwrap_or(s);
        s = s.trim();
    }
    if s.trim_matches(|c: char| c == '-' || c.is_whitespace()).is_empty() {
        return String::new();
    }
    s.to_string()
}

/// Normalise an ICY station name (`icy-name` header).
pub fn normalize_station_name(raw: &str) -> String {
    raw.trim().to_string()
}

/// Join artist and title the way the display and the webhook expect:
/// `"<artist> - <title>"`, or whichever one is non-empty.
pub fn song_line(artist: &str, title: &str) -> String {
    let artist = artist.trim();
    let title = title.trim();
    match (artist.is_empty(), title.is_empty()) {
        (false, false) => format!("{} - {}", artist, title),
        (false, true) => artist.to_string(),
        (true, false) => title.to_string(),
        (true, true) => String::new(),
    }
}

/// Accumulates AVRC attributes, which arrive one at a time, into a single
/// song line.
#[derive(Debug, Clone, Default)]
pub struct TrackInfo {
    artist: String,
    title: String,
}

impl TrackInfo {
    /// Apply one attribute.  Returns `true` when the song line changed.
    pub fn apply(&mut self, attribute: TrackAttribute, text: &str) -> bool {
        let slot = match attribute {
            TrackAttribute::Artist => &mut self.artist,
            TrackAttribute::Title => &mut self.title,
            TrackAttribute::Album | TrackAttribute::Other(_) => return false,
        };
        let text = text.trim();
        if slot == text {
            return false;
        }
        *slot = text.to_string();
        true
    }

    pub fn song_line(&self) -> String {
        song_line(&self.artist, &self.title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_title_plain() {
        assert_eq!(
            normalize_stream_title("  The Beatles - Hey Jude "),
            "The Beatles - Hey Jude"
        );
    }

    #[test]
    fn test_stream_title_raw_payload() {
        assert_eq!(
            normalize_stream_title("StreamTitle='Queen - Bicycle';"),
            "Queen - Bicycle"
        );
    }

    #[test]
    fn test_stream_title_separator_only() {
        assert_eq!(normalize_stream_title(" - "), "");
        assert_eq!(normalize_stream_title("StreamTitle='';"), "");
    }

    #[test]
    fn test_song_line_variants() {
        assert_eq!(song_line("Artist", "Title"), "Artist - Title");
        assert_eq!(song_line("", "Title"), "Title");
        assert_eq!(song_line("Artist", " "), "Artist");
        assert_eq!(song_line("", ""), "");
    }

    #[test]
    fn test_track_info_independent_attributes() {
        let mut info = TrackInfo::default();
        assert!(info.apply(TrackAttribute::Title, "Song"));
        assert_eq!(info.song_line(), "Song");
        assert!(info.apply(TrackAttribute::Artist, "Band"));
        assert_eq!(info.song_line(), "Band - Song");
        assert!(!info.apply(TrackAttribute::Artist, "Band"));
        assert!(!info.apply(TrackAttribute::Album, "Record"));
    }
}
