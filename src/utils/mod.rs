pub mod line_editor;
pub mod logging;
