use std::path::PathBuf;

const APP_DIR: &str = "stickradio";

pub fn data_dir() -> PathBuf {
    // ~/.local/share/stickradio on unix, matching the config layout below
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".local")
            .join("share")
            .join(APP_DIR)
    }
    #[cfg(windows)]
    {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }
}

pub fn config_dir() -> PathBuf {
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join(APP_DIR)
    }

    #[cfg(windows)]
    {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }
}

/// File holding the single boot-preference byte.
pub fn boot_mode_path() -> PathBuf {
    data_dir().join("boot_mode")
}

pub fn log_path() -> PathBuf {
    data_dir().join("stickradio.log")
}
