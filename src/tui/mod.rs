//! TUI dashboard for the virtual machine.
//!
//! Provides an interactive terminal front-end with:
//! - register, stack and memory views
//! - code listing following the PC
//! - run / step / pause / reset controls and an adjustable clock

mod app;
mod ui;

pub use app::{run_dashboard, DashboardApp};
