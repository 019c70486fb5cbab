//! Time-of-day mood table.
//!
//! Each hour of the day maps to one of four fixed tone/rate bundles. The mood
//! is recomputed on demand and never stored.

use chrono::{DateTime, Local, Timelike};

/// Corner frequency of the low-shelf filter (Hz).
pub const LOW_SHELF_HZ: u32 = 200;
/// Corner frequency of the high-shelf filter (Hz).
pub const HIGH_SHELF_HZ: u32 = 3000;

/// The four hour buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mood {
    SunriseEnergy,
    AfternoonBrightness,
    SunsetWarmth,
    MidnightCalm,
}

impl Mood {
    pub const ALL: [Mood; 4] = [
        Mood::SunriseEnergy,
        Mood::AfternoonBrightness,
        Mood::SunsetWarmth,
        Mood::MidnightCalm,
    ];

    /// Bucket for a wall-clock hour. Hours past 23 wrap around.
    pub fn for_hour(hour: u32) -> Self {
        match hour % 24 {
            5..=11 => Mood::SunriseEnergy,
            12..=17 => Mood::AfternoonBrightness,
            18..=22 => Mood::SunsetWarmth,
            _ => Mood::MidnightCalm,
        }
    }

    pub fn setting(self) -> MoodSetting {
        match self {
            Mood::SunriseEnergy => MoodSetting {
                mood: self,
                label: "Sunrise Energy",
                pitch: "Bright",
                rate: 1.06,
                low_gain_db: 3.0,
                high_gain_db: 3.0,
            },
            Mood::AfternoonBrightness => MoodSetting {
                mood: self,
                label: "Afternoon Brightness",
                pitch: "Normal",
                rate: 1.0,
                low_gain_db: 0.0,
                high_gain_db: 0.0,
            },
            Mood::SunsetWarmth => MoodSetting {
                mood: self,
                label: "Sunset Warmth",
                pitch: "Warm",
                rate: 0.98,
                low_gain_db: 5.0,
                high_gain_db: -2.0,
            },
            Mood::MidnightCalm => MoodSetting {
                mood: self,
                label: "Midnight Calm",
                pitch: "Low",
                rate: 0.94,
                low_gain_db: 6.0,
                high_gain_db: -6.0,
            },
        }
    }
}

/// Immutable tone/rate record for one mood.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoodSetting {
    pub mood: Mood,
    pub label: &'static str,
    pub pitch: &'static str,
    /// Playback-rate multiplier (resampling, so pitch follows).
    pub rate: f64,
    pub low_gain_db: f64,
    pub high_gain_db: f64,
}

pub fn mood_for_hour(hour: u32) -> MoodSetting {
    Mood::for_hour(hour).setting()
}

/// Mood for a local timestamp, or for `fixed_hour` when one is configured.
pub fn current_mood(now: DateTime<Local>, fixed_hour: Option<u32>) -> MoodSetting {
    mood_for_hour(fixed_hour.unwrap_or_else(|| now.hour()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn every_hour_maps_to_one_bucket() {
        let expected = [
            (0..5, Mood::MidnightCalm),
            (5..12, Mood::SunriseEnergy),
            (12..18, Mood::AfternoonBrightness),
            (18..23, Mood::SunsetWarmth),
            (23..24, Mood::MidnightCalm),
        ];
        for (range, mood) in expected {
            for h in range {
                assert_eq!(Mood::for_hour(h), mood, "hour {h}");
            }
        }
    }

    #[test]
    fn bucket_edges() {
        assert_eq!(mood_for_hour(4).label, "Midnight Calm");
        assert_eq!(mood_for_hour(5).label, "Sunrise Energy");
        assert_eq!(mood_for_hour(11).rate, 1.06);
        assert_eq!(mood_for_hour(12).pitch, "Normal");
        assert_eq!(mood_for_hour(18).high_gain_db, -2.0);
        assert_eq!(mood_for_hour(22).low_gain_db, 5.0);
        assert_eq!(mood_for_hour(23).rate, 0.94);
    }

    #[test]
    fn hours_wrap() {
        assert_eq!(Mood::for_hour(24 + 6), Mood::SunriseEnergy);
    }

    #[test]
    fn fixed_hour_overrides_clock() {
        let noon = Local.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap();
        assert_eq!(current_mood(noon, None).mood, Mood::AfternoonBrightness);
        assert_eq!(current_mood(noon, Some(2)).mood, Mood::MidnightCalm);
    }
}
