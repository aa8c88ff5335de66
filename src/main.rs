//! osav: Open Sound Analyzer & Visualizer.

mod app;
mod commands;
mod config;
mod logging;
mod ui;
mod visualizer;

fn main() {
    if let Err(e) = app::run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
