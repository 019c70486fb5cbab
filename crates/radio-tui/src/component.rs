//! Component trait: the interface every UI panel implements.
//!
//! - Components own their state and render themselves.
//! - Components produce `Vec<Action>`; they never mutate app state directly.

use ratatui::crossterm::event::{KeyEvent, MouseEvent};
use ratatui::{layout::Rect, Frame};

use crate::action::Action;

pub trait Component {
    /// Handle a key event. Returns actions to be dispatched.
    fn handle_key(&mut self, key: KeyEvent) -> Vec<Action>;

    /// Handle a mouse event. Coordinates are terminal cells.
    fn handle_mouse(&mut self, event: MouseEvent) -> Vec<Action>;

    /// Render the component into `area`.
    fn draw(&mut self, frame: &mut Frame, area: Rect);
}
