//! Domain logic for the ASCII car radio: mood table, playback controller,
//! level meter, marquee, panel rendering and input routing. Nothing in here
//! touches the terminal or the audio player.

pub mod config;
pub mod input;
pub mod level_meter;
pub mod marquee;
pub mod mood;
pub mod panel;
pub mod platform;
pub mod playback;
pub mod protocol;
