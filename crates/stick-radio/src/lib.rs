pub mod audio;
pub mod coordinator;
pub mod error;
pub mod gate;
pub mod hal;
pub mod host;
pub mod icy;
pub mod input;
pub mod latest;
pub mod screen;
pub mod ui;
pub mod webhook;
pub mod wifi;
