//! Text rendering of the radio face.
//!
//! The panel is a fixed 50-column block of box-drawing characters. Every line
//! is padded or truncated to exactly `PANEL_WIDTH` display columns so the
//! pointer hit-testing in [`crate::input`] can rely on column positions.

use crate::marquee::fit_width;
use crate::mood::MoodSetting;
use crate::protocol::PlaybackStatus;

pub const PANEL_WIDTH: usize = 50;
/// Columns between the two `║` borders.
pub const INNER_WIDTH: usize = PANEL_WIDTH - 2;
/// Columns available to the track marquee.
pub const TRACK_WIDTH: usize = 37;

pub const TITLE: &str = "ASCII CAR RADIO";
pub const CONTROLS_LINE: &str = "  [ PLAY ] [ STOP ] [ PAUSE ] [ MUTE ] [ LOOP ] ";
pub const KEYS_LINE: &str = "    ( P )    ( S )    ( SPC )   ( M )   ( L )   ";

const VOLUME_CELLS: usize = 10;

/// Everything the renderer needs for one frame.
#[derive(Debug, Clone)]
pub struct PanelView<'a> {
    /// Already-scrolled marquee window.
    pub track: &'a str,
    pub status: PlaybackStatus,
    /// Wall-clock time, `HH:MM:SS`.
    pub time: &'a str,
    pub mood: &'a MoodSetting,
    pub volume: u8,
    pub muted: bool,
    pub looping: bool,
    /// Level meter glyphs.
    pub eq: &'a str,
    /// Optional one-line notice (player unavailable, etc.).
    pub notice: Option<&'a str>,
}

/// Which kind of row a panel line is; the TUI styles by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Border,
    Title,
    Info,
    Volume,
    Controls,
    Keys,
    Meter,
    Mode,
    Notice,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Panel {
    pub lines: Vec<(LineKind, String)>,
}

impl Panel {
    pub fn text(&self) -> String {
        let mut out = String::new();
        for (_, line) in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    pub fn rows(&self) -> usize {
        self.lines.len()
    }

    pub fn line(&self, row: usize) -> Option<&str> {
        self.lines.get(row).map(|(_, l)| l.as_str())
    }
}

fn top() -> String {
    format!("╔{}╗", "═".repeat(INNER_WIDTH))
}

fn divider() -> String {
    format!("╠{}╣", "═".repeat(INNER_WIDTH))
}

fn bottom() -> String {
    format!("╚{}╝", "═".repeat(INNER_WIDTH))
}

fn row(content: &str) -> String {
    format!("║{}║", fit_width(content, INNER_WIDTH))
}

fn centered(content: &str) -> String {
    let len = content.chars().count().min(INNER_WIDTH);
    let left = (INNER_WIDTH - len) / 2;
    row(&format!("{}{}", " ".repeat(left), content))
}

/// `||||||----` for the given volume.
pub fn volume_bar(volume: u8) -> String {
    let filled = ((volume.min(100) as f32 / 10.0).round() as usize).min(VOLUME_CELLS);
    format!("{}{}", "|".repeat(filled), "-".repeat(VOLUME_CELLS - filled))
}

pub fn render(view: &PanelView) -> Panel {
    use LineKind::*;

    let volume = view.volume.min(100);
    let mute = if view.muted { " MUTE" } else { "" };
    let mode = if view.looping { "CASSETTE LOOP" } else { "FM BAND" };

    let mut lines = vec![
        (Border, top()),
        (Title, centered(TITLE)),
        (Border, divider()),
        (Info, row(&format!("   TRACK: {}", fit_width(view.track, TRACK_WIDTH)))),
        (Info, row(&format!("   STATUS: {}", view.status.label()))),
        (Info, row(&format!("   TIME: {}", view.time))),
        (Info, row(&format!("   MOOD: {}", view.mood.label))),
        (Border, divider()),
        (
            Volume,
            row(&format!("   VOL [{}] {:>3}%{}", volume_bar(volume), volume, mute)),
        ),
        (Info, row(&format!("   PITCH: {}", view.mood.pitch))),
        (Border, divider()),
        (Controls, row(CONTROLS_LINE)),
        (Keys, row(KEYS_LINE)),
        (Border, divider()),
        (Meter, row(&format!("   EQ: {}", view.eq))),
        (Border, divider()),
        (Mode, row(&format!("   MODE: {}", mode))),
    ];
    if let Some(notice) = view.notice {
        lines.push((Notice, row(&format!("   ! {}", notice))));
    }
    lines.push((Border, bottom()));

    Panel { lines }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marquee::display_width;
    use crate::mood::mood_for_hour;

    fn view<'a>(mood: &'a MoodSetting) -> PanelView<'a> {
        PanelView {
            track: "TRACK.MP3",
            status: PlaybackStatus::Stopped,
            time: "07:15:00",
            mood,
            volume: 50,
            muted: false,
            looping: false,
            eq: ". . . .",
            notice: None,
        }
    }

    #[test]
    fn every_line_is_panel_width() {
        let mood = mood_for_hour(20);
        let mut v = view(&mood);
        v.muted = true;
        v.notice = Some("mpv not found on PATH, playback disabled and then some more text");
        for (_, line) in render(&v).lines {
            assert_eq!(display_width(&line), PANEL_WIDTH, "{line}");
        }
    }

    #[test]
    fn known_lines() {
        let mood = mood_for_hour(8);
        let panel = render(&view(&mood));
        assert_eq!(panel.line(0).unwrap(), top());
        assert_eq!(
            panel.line(1).unwrap(),
            "║                ASCII CAR RADIO                 ║"
        );
        assert_eq!(
            panel.line(11).unwrap(),
            "║  [ PLAY ] [ STOP ] [ PAUSE ] [ MUTE ] [ LOOP ] ║"
        );
        assert!(panel.line(4).unwrap().contains("■ STOPPED"));
        assert!(panel.line(6).unwrap().contains("Sunrise Energy"));
        assert!(panel.line(9).unwrap().contains("PITCH: Bright"));
        assert!(panel.line(16).unwrap().contains("MODE: FM BAND"));
        assert_eq!(panel.rows(), 18);
    }

    #[test]
    fn volume_line() {
        let mood = mood_for_hour(13);
        let mut v = view(&mood);
        v.volume = 60;
        v.muted = true;
        let panel = render(&v);
        assert!(panel.line(8).unwrap().starts_with("║   VOL [||||||----]  60% MUTE"));
    }

    #[test]
    fn volume_bar_rounds() {
        assert_eq!(volume_bar(0), "----------");
        assert_eq!(volume_bar(45), "|||||-----");
        assert_eq!(volume_bar(100), "||||||||||");
    }

    #[test]
    fn loop_mode_label() {
        let mood = mood_for_hour(1);
        let mut v = view(&mood);
        v.looping = true;
        assert!(render(&v).text().contains("MODE: CASSETTE LOOP"));
    }
}
