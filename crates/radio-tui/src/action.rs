//! Actions produced by components and dispatched by the App.

use radio_core::input::Intent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Forwarded to the playback controller.
    Radio(Intent),
    Quit,
}
