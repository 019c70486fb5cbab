//! Analyser tap: a second decode of the track through ffmpeg, paced to the
//! playback rate, turned into spectrum or waveform frames for the level meter.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info};

use radio_core::level_meter::MeterSource;

use crate::core::PlayerEvent;

pub const TAP_SAMPLE_RATE: u32 = 44_100;
/// New frame every ~20 ms of audio.
const HOP_SAMPLES: usize = TAP_SAMPLE_RATE as usize / 50;
const FLOOR_DB: f32 = -100.0;

/// Turns a window of mono samples into the array the meter reads.
pub struct Analyser {
    source: MeterSource,
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
}

impl Analyser {
    pub fn new(source: MeterSource, fft_size: usize) -> Self {
        let fft_size = fft_size.max(2);
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        // Hann window
        let window = (0..fft_size)
            .map(|i| {
                let t = i as f32 / (fft_size - 1) as f32;
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * t).cos())
            })
            .collect();

        Self {
            source,
            fft_size,
            fft,
            window,
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Spectrum: `fft_size / 2` bins in dBFS, floored at -100.
    /// Waveform: the last `fft_size` samples unchanged.
    pub fn analyse(&mut self, samples: &[f32]) -> Vec<f32> {
        let start = samples.len().saturating_sub(self.fft_size);
        let samples = &samples[start..];
        match self.source {
            MeterSource::Waveform => samples.to_vec(),
            MeterSource::Spectrum => {
                for (i, slot) in self.buffer.iter_mut().enumerate() {
                    let s = samples.get(i).copied().unwrap_or(0.0);
                    let s = if s.is_finite() { s } else { 0.0 };
                    *slot = Complex::new(s * self.window[i], 0.0);
                }
                self.fft.process(&mut self.buffer);
                let scale = 2.0 / self.fft_size as f32;
                self.buffer[..self.fft_size / 2]
                    .iter()
                    .map(|c| {
                        let mag = c.norm() * scale;
                        if mag > 0.0 {
                            (20.0 * mag.log10()).max(FLOOR_DB)
                        } else {
                            FLOOR_DB
                        }
                    })
                    .collect()
            }
        }
    }
}

/// Where and how fast the tap should read.
#[derive(Debug, Clone)]
pub struct TapRequest {
    pub track: PathBuf,
    pub offset_secs: f64,
    pub rate: f64,
    pub source: MeterSource,
    pub fft_size: usize,
}

fn ffmpeg_args(track: &Path, offset_secs: f64, rate: f64) -> Vec<String> {
    let rate = if rate.is_finite() && rate > 0.0 { rate } else { 1.0 };
    // Resampling by the rate shifts pitch the same way mpv does without
    // pitch correction.
    let filter = format!(
        "aresample={sr},asetrate={shifted},aresample={sr}",
        sr = TAP_SAMPLE_RATE,
        shifted = (TAP_SAMPLE_RATE as f64 * rate).round() as u32
    );
    vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-nostdin".into(),
        "-readrate".into(),
        format!("{rate:.3}"),
        "-ss".into(),
        format!("{:.3}", offset_secs.max(0.0)),
        "-i".into(),
        track.to_string_lossy().into_owned(),
        "-vn".into(),
        "-af".into(),
        filter,
        "-ac".into(),
        "1".into(),
        "-ar".into(),
        TAP_SAMPLE_RATE.to_string(),
        "-f".into(),
        "s16le".into(),
        "pipe:1".into(),
    ]
}

/// Run the tap until ffmpeg exits or the receiver goes away.
pub async fn run_tap(req: TapRequest, tx: mpsc::Sender<PlayerEvent>) -> anyhow::Result<()> {
    let ffmpeg_bin =
        radio_core::platform::find_ffmpeg_binary().unwrap_or_else(|| PathBuf::from("ffmpeg"));
    info!(
        "analyser: tap at {:.2}s rate {:.2} ({:?})",
        req.offset_secs, req.rate, req.source
    );
    let mut child = Command::new(ffmpeg_bin)
        .args(ffmpeg_args(&req.track, req.offset_secs, req.rate))
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::null())
        .kill_on_drop(true)
        .spawn()?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow::anyhow!("ffmpeg stdout not captured"))?;

    let mut analyser = Analyser::new(req.source, req.fft_size);
    let keep = analyser.fft_size();
    let mut buf = vec![0u8; HOP_SAMPLES * 2];
    let mut carry: Option<u8> = None;
    let mut window: Vec<f32> = Vec::with_capacity(keep + HOP_SAMPLES);
    let mut since_frame = 0usize;

    loop {
        let n = stdout.read(&mut buf).await?;
        if n == 0 {
            debug!("analyser: ffmpeg stream ended");
            break;
        }
        let mut bytes = &buf[..n];
        // Reads may split a sample in half.
        if let Some(lo) = carry.take() {
            window.push(i16::from_le_bytes([lo, bytes[0]]) as f32 / 32768.0);
            since_frame += 1;
            bytes = &bytes[1..];
        }
        let mut pairs = bytes.chunks_exact(2);
        for pair in &mut pairs {
            window.push(i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0);
        }
        since_frame += bytes.len() / 2;
        carry = pairs.remainder().first().copied();

        if window.len() > keep {
            window.drain(..window.len() - keep);
        }
        if since_frame >= HOP_SAMPLES && window.len() == keep {
            since_frame = 0;
            let frame = analyser.analyse(&window);
            if tx.send(PlayerEvent::Frame(Arc::new(frame))).await.is_err() {
                break;
            }
        }
    }
    Ok(())
}
