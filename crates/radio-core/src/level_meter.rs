//! Level meter: buckets an energy sample buffer into bands and quantises each
//! band to one of four glyph levels with a per-frame decay.

use serde::{Deserialize, Serialize};

pub const DEFAULT_BANDS: usize = 20;
pub const DEFAULT_DECAY: f32 = 0.8;
pub const MAX_LEVEL: u8 = 3;

/// Waveform amplitudes rarely exceed ~0.25 mean; scale them into [0, 1].
const WAVEFORM_GAIN: f32 = 4.0;
/// Spectrum magnitudes are dBFS with a −100 dB floor.
const SPECTRUM_FLOOR_DB: f32 = -100.0;

const GLYPHS: [char; 4] = ['.', ':', '|', '#'];

/// What the sample buffer holds; decides the normalisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeterSource {
    /// FFT magnitudes in dBFS.
    #[default]
    Spectrum,
    /// Raw amplitudes in −1..1.
    Waveform,
}

impl MeterSource {
    /// Map a band average into [0, 1].
    pub fn normalize(self, avg: f32) -> f32 {
        let norm = match self {
            MeterSource::Spectrum => (avg - SPECTRUM_FLOOR_DB) / -SPECTRUM_FLOOR_DB,
            MeterSource::Waveform => avg * WAVEFORM_GAIN,
        };
        if norm.is_nan() {
            return 0.0;
        }
        norm.clamp(0.0, 1.0)
    }

    fn magnitude(self, sample: f32) -> f32 {
        match self {
            MeterSource::Spectrum => sample,
            MeterSource::Waveform => sample.abs(),
        }
    }
}

pub fn glyph(level: u8) -> char {
    GLYPHS[level.min(MAX_LEVEL) as usize]
}

/// Average of each of `bands` contiguous slices of `samples`.
///
/// Each slice holds `max(1, len / bands)` samples and the last one also takes
/// the remainder. Slices that fall past the end of a short buffer are empty
/// and average to the source's floor.
pub fn band_averages(samples: &[f32], bands: usize, source: MeterSource) -> Vec<f32> {
    let empty = match source {
        MeterSource::Spectrum => SPECTRUM_FLOOR_DB,
        MeterSource::Waveform => 0.0,
    };
    let len = samples.len();
    let per_band = (len / bands.max(1)).max(1);
    (0..bands)
        .map(|b| {
            let start = (b * per_band).min(len);
            let end = if b + 1 == bands {
                len
            } else {
                (start + per_band).min(len)
            };
            let slice = &samples[start..end];
            if slice.is_empty() {
                return empty;
            }
            let sum: f32 = slice
                .iter()
                .map(|&v| {
                    let m = source.magnitude(v);
                    // -inf dB bins from silent input count as the floor.
                    if m.is_finite() {
                        m
                    } else {
                        empty
                    }
                })
                .sum();
            sum / slice.len() as f32
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct LevelMeter {
    levels: Vec<u8>,
    decay: f32,
    source: MeterSource,
}

impl LevelMeter {
    pub fn new(bands: usize, decay: f32, source: MeterSource) -> Self {
        Self {
            levels: vec![0; bands.max(1)],
            decay: decay.clamp(0.0, 1.0),
            source,
        }
    }

    pub fn levels(&self) -> &[u8] {
        &self.levels
    }

    /// Fold one frame of samples into the band levels.
    pub fn update(&mut self, samples: Option<&[f32]>) {
        let samples = match samples {
            Some(s) if !s.is_empty() => s,
            _ => {
                self.levels.fill(0);
                return;
            }
        };
        let averages = band_averages(samples, self.levels.len(), self.source);
        for (level, avg) in self.levels.iter_mut().zip(averages) {
            let fresh = (self.source.normalize(avg) * MAX_LEVEL as f32).round() as u8;
            let decayed = (*level as f32 * self.decay).floor() as u8;
            *level = fresh.max(decayed).min(MAX_LEVEL);
        }
    }

    /// A frame of silence: every band decays one step toward zero.
    pub fn update_silent(&mut self) {
        for level in self.levels.iter_mut() {
            *level = (*level as f32 * self.decay).floor() as u8;
        }
    }

    /// Band glyphs separated by single spaces.
    pub fn ascii(&self) -> String {
        let mut out = String::with_capacity(self.levels.len() * 2);
        for (i, &level) in self.levels.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push(glyph(level));
        }
        out
    }
}

impl Default for LevelMeter {
    fn default() -> Self {
        Self::new(DEFAULT_BANDS, DEFAULT_DECAY, MeterSource::Spectrum)
    }
}
