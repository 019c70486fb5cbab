//! RadioPanel: the bordered text block, centred in the terminal.
//!
//! The app hands over a freshly rendered `Panel` each frame. Mouse clicks
//! are hit-tested against the text that was drawn last, at the place it was
//! drawn.

use ratatui::crossterm::event::{
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Clear, Paragraph},
    Frame,
};

use radio_core::input::{intent_at_point, intent_for_char, GridGeometry};
use radio_core::panel::{Panel, PANEL_WIDTH};

use crate::{action::Action, component::Component, theme};

#[derive(Default)]
pub struct RadioPanel {
    panel: Panel,
    /// Where `panel` was last drawn; `None` before the first frame.
    geometry: Option<GridGeometry>,
}

impl RadioPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_panel(&mut self, panel: Panel) {
        self.panel = panel;
    }
}

/// Centre a `width`×`height` block in `area`, clipped to it.
pub fn centred(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    Rect {
        x: area.x + (area.width - w) / 2,
        y: area.y + (area.height - h) / 2,
        width: w,
        height: h,
    }
}

impl Component for RadioPanel {
    fn handle_key(&mut self, key: KeyEvent) -> Vec<Action> {
        if key.kind != KeyEventKind::Press {
            return Vec::new();
        }
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                vec![Action::Quit]
            }
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => vec![Action::Quit],
            KeyCode::Char(c) => intent_for_char(c).map(Action::Radio).into_iter().collect(),
            _ => Vec::new(),
        }
    }

    fn handle_mouse(&mut self, event: MouseEvent) -> Vec<Action> {
        if event.kind != MouseEventKind::Down(MouseButton::Left) {
            return Vec::new();
        }
        let Some(geometry) = self.geometry.as_ref() else {
            return Vec::new();
        };
        intent_at_point(
            &self.panel,
            geometry,
            event.column as f64,
            event.row as f64,
        )
        .map(Action::Radio)
        .into_iter()
        .collect()
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect) {
        let rect = centred(area, PANEL_WIDTH as u16, self.panel.rows() as u16);
        self.geometry = Some(GridGeometry::cells(rect.x, rect.y, &self.panel));

        let lines: Vec<Line> = self
            .panel
            .lines
            .iter()
            .map(|(kind, text)| Line::from(Span::styled(text.as_str(), theme::style_for(*kind))))
            .collect();
        frame.render_widget(Clear, rect);
        frame.render_widget(Paragraph::new(lines), rect);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radio_core::input::Intent;
    use radio_core::mood::mood_for_hour;
    use radio_core::panel::{render, PanelView};
    use radio_core::protocol::PlaybackStatus;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn panel() -> Panel {
        let mood = mood_for_hour(9);
        render(&PanelView {
            track: "TRACK.MP3",
            status: PlaybackStatus::Stopped,
            time: "09:00:00",
            mood: &mood,
            volume: 50,
            muted: false,
            looping: false,
            eq: "",
            notice: None,
        })
    }

    fn click(column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[test]
    fn keys_map_to_actions() {
        let mut p = RadioPanel::new();
        let key = |code| KeyEvent::new(code, KeyModifiers::NONE);
        assert_eq!(p.handle_key(key(KeyCode::Char(' '))), vec![Action::Radio(Intent::TogglePlay)]);
        assert_eq!(p.handle_key(key(KeyCode::Char('q'))), vec![Action::Quit]);
        assert_eq!(
            p.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            vec![Action::Quit]
        );
        assert!(p.handle_key(key(KeyCode::Char('z'))).is_empty());
    }

    #[test]
    fn centring_clips_to_small_terminals() {
        let r = centred(Rect::new(0, 0, 80, 24), 50, 18);
        assert_eq!((r.x, r.y, r.width, r.height), (15, 3, 50, 18));
        let r = centred(Rect::new(0, 0, 40, 10), 50, 18);
        assert_eq!((r.x, r.y, r.width, r.height), (0, 0, 40, 10));
    }

    #[test]
    fn clicks_resolve_against_drawn_position() {
        let mut p = RadioPanel::new();
        p.set_panel(panel());
        // Nothing drawn yet.
        assert!(p.handle_mouse(click(18, 14)).is_empty());

        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal
            .draw(|f| {
                let area = f.area();
                p.draw(f, area);
            })
            .unwrap();

        // Panel at (15, 3); controls row 11 → screen row 14; "[ PLAY ]" at cols 3..11.
        assert_eq!(p.handle_mouse(click(18, 14)), vec![Action::Radio(Intent::Play)]);
        assert_eq!(p.handle_mouse(click(15 + 45, 14)), vec![Action::Radio(Intent::ToggleLoop)]);
        assert!(p.handle_mouse(click(18, 15)).is_empty());
    }
}
