//! Station catalog loading from override files on disk.

use std::io::Write;

use stick_proto::stations::StationCatalog;

fn write_file(suffix: &str, content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn toml_override_replaces_builtin_list() {
    let file = write_file(
        ".toml",
        r#"
        [[station]]
        name = "Only"
        url = "http://only.example/stream"
        "#,
    );
    let catalog = StationCatalog::load(Some(file.path()));
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog.get(0).name, "Only");
    assert_eq!(catalog.next_index(0), 0);
}

#[test]
fn m3u_override_is_detected_by_extension() {
    let file = write_file(
        ".m3u",
        "#EXTM3U\n#EXTINF:-1,First\nhttp://first/stream\n#EXTINF:-1,Second\nhttp://second/stream\n",
    );
    let catalog = StationCatalog::load(Some(file.path()));
    let names: Vec<_> = catalog.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["First", "Second"]);
}

#[test]
fn empty_override_falls_back_to_builtin() {
    let file = write_file(".m3u", "#EXTM3U\n");
    let catalog = StationCatalog::load(Some(file.path()));
    assert_eq!(catalog.len(), StationCatalog::builtin().len());
}

#[test]
fn missing_override_falls_back_to_builtin() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = StationCatalog::load(Some(&dir.path().join("absent.toml")));
    assert_eq!(catalog.len(), 6);
}
