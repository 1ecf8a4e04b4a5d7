use stick_proto::config::Config;
use stick_proto::platform;
use stick_proto::stations::StationCatalog;
use stick_radio::coordinator::{run_device, RunOutcome};
use stick_radio::host;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let log_path = platform::log_path();
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // The terminal belongs to the display, so logs go to a file.
    let log_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,stick_radio=debug".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    eprintln!("stickradio log: {}", log_path.display());
    tracing::info!("stickradio starting…");

    // ── Boot loop: a restart re-runs everything from config upwards ─────────
    loop {
        let config = Config::load().unwrap_or_else(|e| {
            tracing::warn!("config: {:#}, using defaults", e);
            Config::default()
        });
        let catalog = StationCatalog::load(config.radio.stations_file.as_deref());
        tracing::info!("boot: {} stations", catalog.len());

        let board = host::open_board(&config)?;
        match run_device(config, catalog, board).await? {
            RunOutcome::Restart => tracing::info!("restarting"),
            RunOutcome::Shutdown => break,
        }
    }

    tracing::info!("stickradio stopped");
    Ok(())
}
