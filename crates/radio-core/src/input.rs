//! Input routing: keys and pointer positions to radio intents.
//!
//! Pointer clicks are resolved against the last rendered panel text. The
//! pointer position is translated into a row/column of that text and matched
//! against the spans of the control labels on the controls line.

use crate::marquee::display_width;
use crate::panel::Panel;

/// Something the user asked the radio to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Space bar: play when stopped, otherwise pause toggle.
    TogglePlay,
    Play,
    Pause,
    Stop,
    VolumeUp,
    VolumeDown,
    ToggleMute,
    ToggleLoop,
}

/// Labels on the controls line, in the order they are checked.
pub const CONTROL_LABELS: [(&str, Intent); 5] = [
    ("[ PLAY ]", Intent::Play),
    ("[ STOP ]", Intent::Stop),
    ("[ PAUSE ]", Intent::Pause),
    ("[ MUTE ]", Intent::ToggleMute),
    ("[ LOOP ]", Intent::ToggleLoop),
];

/// Key binding for a typed character. Letters are case-insensitive.
pub fn intent_for_char(c: char) -> Option<Intent> {
    match c.to_ascii_lowercase() {
        ' ' => Some(Intent::TogglePlay),
        'p' => Some(Intent::Play),
        's' => Some(Intent::Stop),
        '+' | '=' => Some(Intent::VolumeUp),
        '-' => Some(Intent::VolumeDown),
        'm' => Some(Intent::ToggleMute),
        'l' => Some(Intent::ToggleLoop),
        _ => None,
    }
}

/// Where the rendered text sits and how big it is, in pointer units.
///
/// For a terminal the pointer units are cells and `width == cols`; for a
/// pixel surface each character cell is `width / cols` by `height / rows`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub cols: usize,
    pub rows: usize,
}

impl GridGeometry {
    /// Geometry of a panel drawn at a terminal cell origin.
    pub fn cells(x: u16, y: u16, panel: &Panel) -> Self {
        let cols = panel
            .lines
            .iter()
            .map(|(_, l)| display_width(l))
            .max()
            .unwrap_or(0);
        let rows = panel.rows();
        Self {
            x: x as f64,
            y: y as f64,
            width: cols as f64,
            height: rows as f64,
            cols,
            rows,
        }
    }

    /// `(row, col)` of the character under the pointer, if inside the text.
    pub fn cell_at(&self, px: f64, py: f64) -> Option<(usize, usize)> {
        if self.cols == 0 || self.rows == 0 || self.width <= 0.0 || self.height <= 0.0 {
            return None;
        }
        let cell_w = self.width / self.cols as f64;
        let cell_h = self.height / self.rows as f64;
        let col = ((px - self.x) / cell_w).floor();
        let row = ((py - self.y) / cell_h).floor();
        if col < 0.0 || row < 0.0 {
            return None;
        }
        let (row, col) = (row as usize, col as usize);
        if row >= self.rows || col >= self.cols {
            return None;
        }
        Some((row, col))
    }
}

/// Column span `[start, end)` of `label` within `line`, in display columns.
fn label_span(line: &str, label: &str) -> Option<(usize, usize)> {
    let byte_idx = line.find(label)?;
    let start = display_width(&line[..byte_idx]);
    Some((start, start + display_width(label)))
}

/// Control under `(row, col)` of the panel, if any.
pub fn intent_at(panel: &Panel, row: usize, col: usize) -> Option<Intent> {
    let controls = panel
        .lines
        .iter()
        .position(|(_, l)| l.contains(CONTROL_LABELS[0].0))?;
    if row != controls {
        return None;
    }
    let line = panel.line(row)?;
    CONTROL_LABELS.iter().find_map(|&(label, intent)| {
        let (start, end) = label_span(line, label)?;
        (col >= start && col < end).then_some(intent)
    })
}

/// Resolve a pointer position straight to an intent.
pub fn intent_at_point(panel: &Panel, geometry: &GridGeometry, px: f64, py: f64) -> Option<Intent> {
    let (row, col) = geometry.cell_at(px, py)?;
    intent_at(panel, row, col)
}
