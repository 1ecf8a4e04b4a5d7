use std::path::Path;

use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Station {
    pub name: String,
    pub url: String,
}

impl Station {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

const BUILTIN_STATIONS: &[(&str, &str)] = &[
    (
        "Radio BOB",
        "http://streams.radiobob.de/bob-national/mp3-192/streams.radiobob.de/",
    ),
    (
        "Rock Antenne",
        "http://stream.rockantenne.de/rockantenne/stream/mp3",
    ),
    (
        "WDR 2 Ruhrgebiet",
        "http://wdr-wdr2-ruhrgebiet.icecast.wdr.de/wdr/wdr2/ruhrgebiet/mp3/128/stream.mp3",
    ),
    ("Bayern 3", "http://streams.br.de/bayern3_2.m3u"),
    ("Antenne Bayern", "http://play.antenne.de/antenne.m3u"),
    (
        "Radio IN",
        "http://funkhaus-ingolstadt.stream24.net/radio-in.mp3",
    ),
];

/// Ordered, never-empty list of stream endpoints.
#[derive(Debug, Clone)]
pub struct StationCatalog {
    stations: Vec<Station>,
}

impl StationCatalog {
    /// Returns `None` for an empty list; the catalog must always have a
    /// station to advance to.
    pub fn new(stations: Vec<Station>) -> Option<Self> {
        if stations.is_empty() {
            None
        } else {
            Some(Self { stations })
        }
    }

    pub fn builtin() -> Self {
        Self {
            stations: BUILTIN_STATIONS
                .iter()
                .map(|(name, url)| Station::new(*name, *url))
                .collect(),
        }
    }

    /// Load from an override file (`.toml` or `.m3u`), falling back to the
    /// built-in list when the file is missing, unreadable or empty.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::builtin();
        };

        let loaded = match path.extension().and_then(|e| e.to_str()) {
            Some("m3u") | Some("m3u8") => load_stations_from_m3u(path),
            _ => load_stations_from_toml(path),
        };

        match loaded {
            Ok(stations) => match Self::new(stations) {
                Some(catalog) => {
                    info!("Loaded {} stations from {:?}", catalog.len(), path);
                    catalog
                }
                None => {
                    warn!("Station file {:?} is empty, using built-in stations", path);
                    Self::builtin()
                }
            },
            Err(e) => {
                warn!(
                    "Failed to load stations from {:?}: {}, using built-in stations",
                    path, e
                );
                Self::builtin()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Station at `index`, wrapping out-of-range indices.
    pub fn get(&self, index: usize) -> &Station {
        &self.stations[index % self.stations.len()]
    }

    /// Index after `index`, modulo catalog size.
    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.stations.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Station> {
        self.stations.iter()
    }
}

pub fn parse_m3u_from_str(content: &str) -> Vec<Station> {
    let mut stations = Vec::new();
    let mut pending_name: Option<String> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("#EXTINF:") {
            if let Some(comma_idx) = rest.find(',') {
                pending_name = Some(rest[comma_idx + 1..].trim().to_string());
            }
            continue;
        }

        if line.starts_with('#') {
            continue;
        }

        let url = line.to_string();
        let name = pending_name.take().unwrap_or_else(|| url.clone());
        stations.push(Station { name, url });
    }

    stations
}

pub fn load_stations_from_m3u(path: &Path) -> anyhow::Result<Vec<Station>> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_m3u_from_str(&content))
}

// ── TOML station loader ───────────────────────────────────────────────────────

#[derive(Debug, serde::Deserialize)]
struct TomlStationFile {
    #[serde(default)]
    station: Vec<TomlStation>,
}

#[derive(Debug, serde::Deserialize)]
struct TomlStation {
    name: String,
    url: String,
}

pub fn load_stations_from_toml(path: &Path) -> anyhow::Result<Vec<Station>> {
    let content = std::fs::read_to_string(path)?;
    parse_stations_from_toml_str(&content)
}

pub fn parse_stations_from_toml_str(content: &str) -> anyhow::Result<Vec<Station>> {
    let file: TomlStationFile = toml::from_str(content)?;
    Ok(file
        .station
        .into_iter()
        .map(|s| Station {
            name: s.name,
            url: s.url,
        })
        .collect())
}
