//! Terminal user interface for the live visualizer.
//!
//! Paints per-channel volume bars, the spectrum grid, and the peak-hold
//! overlay from display snapshots, and turns key presses into session
//! commands.

use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    style::{Color, Style},
};
use std::error::Error;
use std::io::{stdout, Stdout};

use super::spectrum::{cell_filled, glyph_level, BAR_LEVELS};
use super::stream::DisplayFrame;

/// User input command during visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualizerCommand {
    /// Keep rendering (no key pressed)
    Continue,
    /// Tear down and reopen the stream ('r' key)
    Restart,
    /// Exit the session (Escape, 'q', or Ctrl+C)
    Quit,
}

/// Partial-block glyphs for the horizontal volume bars, one per level.
const BAR_GLYPHS: [char; BAR_LEVELS] = ['▏', '▎', '▍', '▌', '▋', '▊', '▉', '█'];

const VOLUME_COLOR: Color = Color::Rgb(206, 224, 220);
const SPECTRUM_COLOR: Color = Color::Rgb(185, 207, 212);
const PEAK_COLOR: Color = Color::Rgb(255, 184, 108);
const BACKGROUND: Color = Color::Rgb(0, 0, 0);

/// Terminal UI for the visualizer session.
pub struct VisualizerTui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    terminal_width: usize,
    session_start: std::time::Instant,
}

impl VisualizerTui {
    /// Creates a new TUI instance and enters alternate screen mode.
    ///
    /// # Errors
    /// - If terminal cannot be initialized
    /// - If raw mode cannot be enabled
    /// - If alternate screen cannot be entered
    pub fn new() -> Result<Self, Box<dyn Error>> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        execute!(stdout, crossterm::terminal::EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.hide_cursor()?;

        let size = terminal.size()?;
        let terminal_width = size.width as usize;

        Ok(VisualizerTui {
            terminal,
            terminal_width,
            session_start: std::time::Instant::now(),
        })
    }

    /// Current display width in columns.
    pub fn width(&self) -> usize {
        self.terminal_width
    }

    /// Checks for a terminal resize and returns the new width if it changed.
    pub fn poll_resize(&mut self) -> Result<Option<usize>, Box<dyn Error>> {
        let width = self.terminal.size()?.width as usize;
        if width != self.terminal_width {
            self.terminal_width = width;
            Ok(Some(width))
        } else {
            Ok(None)
        }
    }

    /// Renders one display frame: volume bars on top, spectrum grid with the
    /// peak-hold overlay below, key hints in the footer.
    ///
    /// # Errors
    /// - If terminal rendering fails
    pub fn render(&mut self, display: &DisplayFrame, sample_rate: u32) -> Result<(), Box<dyn Error>> {
        let elapsed = self.session_start.elapsed().as_secs();

        self.terminal.draw(|frame| {
            let area = frame.area();
            if area.width == 0 || area.height < 4 {
                return;
            }

            for y in area.y..area.y + area.height {
                for x in area.x..area.x + area.width {
                    frame
                        .buffer_mut()
                        .set_string(x, y, " ", Style::default().bg(BACKGROUND));
                }
            }

            // One volume bar per channel, capped so the spectrum keeps room
            let volume_rows = display.channel_volumes.len().clamp(1, 4) as u16;
            let footer_height = 1;
            let spectrum_top = area.y + volume_rows + 1;
            let spectrum_height = area
                .height
                .saturating_sub(volume_rows + 1 + footer_height) as usize;

            draw_volume_bars(frame, area, display);

            if spectrum_height > 0 {
                draw_spectrum_grid(frame, area, spectrum_top, spectrum_height, display);
            }

            // Footer: elapsed time, device rate, key hints
            let footer_y = area.y + area.height - footer_height;
            let minutes = elapsed / 60;
            let secs = elapsed % 60;
            let footer = format!(
                "● {minutes}:{secs:02}  {sample_rate}Hz  [r] restart  [q] quit"
            );
            frame.buffer_mut().set_string(
                area.x,
                footer_y,
                footer,
                Style::default().fg(SPECTRUM_COLOR).bg(BACKGROUND),
            );
        })?;

        Ok(())
    }

    /// Processes user input and returns the appropriate session command.
    ///
    /// Only responds to 'r' (restart), Escape, 'q', and Ctrl+C (quit).
    /// All other keys are ignored.
    ///
    /// # Errors
    /// - If event polling fails
    pub fn handle_input(&mut self) -> Result<VisualizerCommand, Box<dyn Error>> {
        if event::poll(std::time::Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                return Ok(match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => {
                        tracing::debug!("Escape or 'q' pressed: quitting visualizer");
                        VisualizerCommand::Quit
                    }
                    KeyCode::Char('c')
                        if key
                            .modifiers
                            .contains(crossterm::event::KeyModifiers::CONTROL) =>
                    {
                        tracing::debug!("Ctrl+C pressed: quitting visualizer");
                        VisualizerCommand::Quit
                    }
                    KeyCode::Char('r') => {
                        tracing::debug!("'r' pressed: restarting stream");
                        VisualizerCommand::Restart
                    }
                    _ => VisualizerCommand::Continue,
                });
            }
        }
        Ok(VisualizerCommand::Continue)
    }

    /// Cleans up terminal state and exits alternate screen mode.
    ///
    /// # Errors
    /// - If terminal mode cannot be disabled
    /// - If cursor cannot be shown
    pub fn cleanup(&mut self) -> Result<(), Box<dyn Error>> {
        disable_raw_mode()?;
        execute!(
            self.terminal.backend_mut(),
            crossterm::terminal::LeaveAlternateScreen
        )?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

/// Paints one horizontal bar per channel using 8-level block glyphs.
fn draw_volume_bars(frame: &mut Frame, area: Rect, display: &DisplayFrame) {
    let width = area.width as usize;
    let style = Style::default().fg(VOLUME_COLOR).bg(BACKGROUND);

    for (channel, &volume) in display.channel_volumes.iter().take(4).enumerate() {
        let y = area.y + channel as u16;
        let level = volume.clamp(0.0, 1.0);
        let cells = level * width as f32;
        let full = cells as usize;
        // Fractional remainder quantizes into the partial-block glyph set
        let partial = glyph_level(cells - full as f32, BAR_LEVELS);

        let mut bar = String::with_capacity(width * 3);
        for _ in 0..full.min(width) {
            bar.push('█');
        }
        if full < width && partial > 0 {
            bar.push(BAR_GLYPHS[partial - 1]);
        }
        frame.buffer_mut().set_string(area.x, y, bar, style);
    }
}

/// Paints the spectrum grid (threshold-filled cells) and the peak-hold
/// overlay marker above each column.
fn draw_spectrum_grid(
    frame: &mut Frame,
    area: Rect,
    top: u16,
    height: usize,
    display: &DisplayFrame,
) {
    let grid_style = Style::default().fg(SPECTRUM_COLOR).bg(BACKGROUND);
    let peak_style = Style::default().fg(PEAK_COLOR).bg(BACKGROUND);
    let width = area.width as usize;

    for (column, &magnitude) in display.columns.iter().take(width).enumerate() {
        let x = area.x + column as u16;
        for row in 0..height {
            if cell_filled(magnitude.min(1.0), row, height) {
                frame
                    .buffer_mut()
                    .set_string(x, top + row as u16, "█", grid_style);
            }
        }
    }

    for (column, &held) in display.peak_hold.iter().take(width).enumerate() {
        if held <= 0.0 {
            continue;
        }
        let x = area.x + column as u16;
        let filled_rows = (held.min(1.0) * height as f32) as usize;
        let row = height - filled_rows.min(height);
        if row < height {
            frame
                .buffer_mut()
                .set_string(x, top + row as u16, "▔", peak_style);
        }
    }
}
