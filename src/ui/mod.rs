//! Ratatui front-end: dashboard, registration form, patient detail and the
//! SQL console.

mod app;
mod forms;
mod helpers;
mod screens;
mod terminal;

pub use app::App;
pub use terminal::run_app;
