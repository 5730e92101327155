use crate::converter::AsciiFrame;
use crate::Result;
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use log::debug;
use std::io::{stdout, Stdout, Write};
use std::time::Duration;

/// Where rendered frames go. Playback only talks to this trait, so it never
/// touches the terminal directly.
pub trait DisplaySink {
    /// Wipe the previous frame
    fn clear(&mut self) -> Result<()>;

    /// Draw a frame with its optional caption and info line
    fn show(&mut self, frame: &AsciiFrame, caption: Option<&str>, info: Option<&str>) -> Result<()>;
}

/// Display sink writing to stdout
pub struct TerminalRenderer {
    stdout: Stdout,
    interactive: bool,
    cursor_hidden: bool,
}

impl TerminalRenderer {
    /// Create a new renderer. Screen clearing and colors are only used when
    /// stdout is a terminal, so piped output stays plain text.
    pub fn new() -> Self {
        Self {
            stdout: stdout(),
            interactive: atty::is(atty::Stream::Stdout),
            cursor_hidden: false,
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Prepare the terminal for animation
    pub fn init(&mut self) -> Result<()> {
        if self.interactive {
            execute!(self.stdout, Hide, Clear(ClearType::All))?;
            self.cursor_hidden = true;
            debug!("Terminal initialized for animation");
        }
        Ok(())
    }

    /// Restore terminal to normal state
    pub fn cleanup(&mut self) -> Result<()> {
        if self.cursor_hidden {
            execute!(self.stdout, Show, ResetColor)?;
            self.cursor_hidden = false;
            debug!("Terminal restored to normal state");
        }
        Ok(())
    }

    /// Print a plain informational line
    pub fn display_message(&mut self, message: &str) -> Result<()> {
        writeln!(self.stdout, "{}", message)?;
        self.stdout.flush()?;
        Ok(())
    }

    /// Print an error line, in red on a terminal
    pub fn display_error(&mut self, error: &str) -> Result<()> {
        if self.interactive {
            execute!(
                self.stdout,
                SetForegroundColor(Color::Red),
                Print("ERROR: "),
                Print(error),
                ResetColor,
                Print("\n")
            )?;
        } else {
            writeln!(self.stdout, "ERROR: {}", error)?;
        }
        Ok(())
    }
}

impl Default for TerminalRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplaySink for TerminalRenderer {
    fn clear(&mut self) -> Result<()> {
        if self.interactive {
            execute!(self.stdout, Clear(ClearType::All), MoveTo(0, 0))?;
        }
        Ok(())
    }

    fn show(
        &mut self,
        frame: &AsciiFrame,
        caption: Option<&str>,
        info: Option<&str>,
    ) -> Result<()> {
        let start_time = std::time::Instant::now();

        for row in frame.rows() {
            queue!(self.stdout, Print(row), Print("\n"))?;
        }

        if let Some(caption) = caption {
            queue!(self.stdout, Print("\n"), Print(caption), Print("\n"))?;
        }

        if let Some(info) = info {
            if self.interactive {
                queue!(
                    self.stdout,
                    SetForegroundColor(Color::DarkGrey),
                    Print(info),
                    ResetColor,
                    Print("\n")
                )?;
            } else {
                queue!(self.stdout, Print(info), Print("\n"))?;
            }
        }

        self.stdout.flush()?;
        debug!(
            "Frame {}x{} written in {}ms",
            frame.width,
            frame.height,
            start_time.elapsed().as_millis()
        );
        Ok(())
    }
}

impl Drop for TerminalRenderer {
    fn drop(&mut self) {
        // Ensure the cursor comes back even if playback bailed out
        let _ = self.cleanup();
    }
}

/// Delay between animation frames. Negative or non-finite intervals play
/// back to back.
pub fn calculate_frame_delay(interval_seconds: f64) -> Duration {
    if interval_seconds.is_finite() && interval_seconds > 0.0 {
        Duration::try_from_secs_f64(interval_seconds).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}
