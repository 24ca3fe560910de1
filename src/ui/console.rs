//! Styled line output for the interactive client.
//!
//! Styling lives in a [`Console`] value handed to whoever prints; nothing in
//! `core` touches it.

use std::io::{self, IsTerminal, Write};

use ratatui::crossterm::{
    cursor::MoveTo,
    execute,
    style::{Color, ContentStyle, Stylize},
    terminal::{Clear, ClearType},
};
use tracing::debug;

use crate::core::turn::FragmentSink;

#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub success: ContentStyle,
    pub info: ContentStyle,
    pub error: ContentStyle,
    pub prompt: ContentStyle,
    pub model: ContentStyle,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            success: ContentStyle::new().green().bold(),
            info: ContentStyle::new().yellow(),
            error: ContentStyle::new().red(),
            prompt: ContentStyle::new().cyan().bold(),
            model: ContentStyle::new().with(Color::White),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Success,
    Info,
    Error,
    Prompt,
    Model,
}

pub struct Console<W: Write> {
    out: W,
    palette: Palette,
    color: bool,
}

impl Console<io::Stdout> {
    /// Stdout console; colour is dropped when disabled, when `NO_COLOR` is
    /// set, or when stdout is not a terminal.
    pub fn stdout(color: bool) -> Self {
        let stdout = io::stdout();
        let color = color && std::env::var_os("NO_COLOR").is_none() && stdout.is_terminal();
        Console::new(stdout, color)
    }
}

impl<W: Write> Console<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self {
            out,
            palette: Palette::default(),
            color,
        }
    }

    pub fn color_enabled(&self) -> bool {
        self.color
    }

    pub fn writer(&mut self) -> &mut W {
        &mut self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn write(&mut self, tone: Tone, text: &str) -> io::Result<()> {
        if self.color {
            let style = match tone {
                Tone::Success => self.palette.success,
                Tone::Info => self.palette.info,
                Tone::Error => self.palette.error,
                Tone::Prompt => self.palette.prompt,
                Tone::Model => self.palette.model,
            };
            write!(self.out, "{}", style.apply(text))?;
        } else {
            self.out.write_all(text.as_bytes())?;
        }
        self.out.flush()
    }

    pub fn line(&mut self, tone: Tone, text: &str) -> io::Result<()> {
        self.write(tone, text)?;
        self.newline()
    }

    pub fn newline(&mut self) -> io::Result<()> {
        writeln!(self.out)?;
        self.out.flush()
    }

    pub fn info(&mut self, text: &str) -> io::Result<()> {
        self.line(Tone::Info, text)
    }

    pub fn success(&mut self, text: &str) -> io::Result<()> {
        self.line(Tone::Success, text)
    }

    pub fn error(&mut self, text: &str) -> io::Result<()> {
        self.line(Tone::Error, text)
    }

    pub fn plain(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes())?;
        self.out.flush()
    }

    pub fn clear_screen(&mut self) -> io::Result<()> {
        if self.color {
            execute!(self.out, Clear(ClearType::All), MoveTo(0, 0))
        } else {
            Ok(())
        }
    }

    /// Live display of a streaming reply.
    pub fn reply_sink(&mut self) -> ReplySink<'_, W> {
        ReplySink { console: self }
    }
}

pub struct ReplySink<'a, W: Write> {
    console: &'a mut Console<W>,
}

impl<W: Write> FragmentSink for ReplySink<'_, W> {
    fn on_fragment(&mut self, fragment: &str) {
        if let Err(err) = self.console.write(Tone::Model, fragment) {
            debug!(error = %err, "dropping reply fragment; terminal write failed");
        }
    }
}
