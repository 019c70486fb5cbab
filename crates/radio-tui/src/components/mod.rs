pub mod radio_panel;
