use crate::mood::MoodSetting;

/// Gain reported for silence (muted or zero volume), in dB.
pub const SILENT_DB: f64 = -100.0;

/// Commands the playback controller issues to the external audio player.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    /// Begin output at `offset_secs` into the track.
    Start { offset_secs: f64 },
    /// Stop output. Failures (e.g. already stopped) are ignored.
    Halt,
    /// Move the output gain to `db`, linearly over `ramp_secs`.
    SetGain { db: f64, ramp_secs: f64 },
    /// Playback rate and shelf gains for the current mood.
    ApplyMood(MoodSetting),
}

/// What the status line shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl PlaybackStatus {
    pub fn label(self) -> &'static str {
        match self {
            PlaybackStatus::Playing => "▶ PLAYING",
            PlaybackStatus::Paused => "Ⅱ PAUSED",
            PlaybackStatus::Stopped => "■ STOPPED",
        }
    }
}

/// Health of the external player process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PlayerHealth {
    #[default]
    Absent,
    Starting,
    Loading,
    Ready,
    Dead(String),
}
