//! Color palette and per-row styles for the radio panel.

use ratatui::style::{Color, Modifier, Style};

use radio_core::panel::LineKind;

// ── Color palette ─────────────────────────────────────────────────────────────

pub const C_ACCENT: Color = Color::Rgb(255, 95, 95);
pub const C_PLAYING: Color = Color::Rgb(80, 200, 120);
pub const C_CONNECTING: Color = Color::Rgb(255, 184, 80);
pub const C_SECONDARY: Color = Color::Rgb(115, 115, 138);
pub const C_PRIMARY: Color = Color::Rgb(210, 210, 225);
pub const C_PANEL_BORDER: Color = Color::Rgb(120, 100, 200);
pub const C_METER: Color = Color::Rgb(158, 76, 26);
pub const C_MODE: Color = Color::Rgb(80, 140, 200);

pub fn style_for(kind: LineKind) -> Style {
    match kind {
        LineKind::Border => Style::default().fg(C_PANEL_BORDER),
        LineKind::Title => Style::default().fg(C_ACCENT).add_modifier(Modifier::BOLD),
        LineKind::Info => Style::default().fg(C_PRIMARY),
        LineKind::Volume => Style::default().fg(C_PLAYING),
        LineKind::Controls => Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
        LineKind::Keys => Style::default().fg(C_SECONDARY),
        LineKind::Meter => Style::default().fg(C_METER),
        LineKind::Mode => Style::default().fg(C_MODE),
        LineKind::Notice => Style::default().fg(C_CONNECTING),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_and_notice_stand_out() {
        assert!(style_for(LineKind::Title)
            .add_modifier
            .contains(Modifier::BOLD));
        assert_ne!(style_for(LineKind::Notice), style_for(LineKind::Info));
    }
}
