//! Fixed-width, horizontally scrolling window over a longer string.

use unicode_width::UnicodeWidthChar;

/// Gap inserted between the end of the text and its wrapped-around start.
const GAP: &str = "   ";

#[derive(Debug, Clone)]
pub struct Marquee {
    text: String,
    width: usize,
    offset: usize,
}

impl Marquee {
    pub fn new(text: impl Into<String>, width: usize) -> Self {
        Self {
            text: text.into(),
            width,
            offset: 0,
        }
    }

    fn scrolls(&self) -> bool {
        display_width(&self.text) > self.width
    }

    /// Step the scroll position by one character.
    pub fn advance(&mut self) {
        if !self.scrolls() {
            self.offset = 0;
            return;
        }
        let cycle = self.text.chars().count() + GAP.chars().count();
        self.offset = (self.offset + 1) % cycle;
    }

    /// The visible slice, always exactly `width` display columns.
    pub fn window(&self) -> String {
        if !self.scrolls() {
            return fit_width(&self.text, self.width);
        }
        let looped: Vec<char> = self.text.chars().chain(GAP.chars()).collect();
        let stream = looped.iter().cycle().skip(self.offset).copied();
        fit_width_iter(stream, self.width)
    }
}

pub fn display_width(s: &str) -> usize {
    s.chars().map(|c| c.width().unwrap_or(0)).sum()
}

/// Truncate or right-pad `s` to exactly `width` display columns.
pub fn fit_width(s: &str, width: usize) -> String {
    fit_width_iter(s.chars(), width)
}

fn fit_width_iter(chars: impl Iterator<Item = char>, width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for c in chars {
        let w = c.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.extend(std::iter::repeat(' ').take(width - used));
    out
}
