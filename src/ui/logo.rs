//! ASCII-art logos drawn with a horizontal colour gradient.

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use ratatui::crossterm::style::{Color, Stylize};
use unicode_width::UnicodeWidthChar;

use crate::ui::console::Console;
use crate::utils::color::{ColorDepth, Rgb};

pub type ArtMap = BTreeMap<String, Vec<String>>;

#[derive(Debug)]
pub enum LogoError {
    Read { path: PathBuf, source: io::Error },
    Parse { path: PathBuf, source: serde_json::Error },
}

impl fmt::Display for LogoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogoError::Read { path, source } => {
                write!(f, "could not read logo file '{}': {}", path.display(), source)
            }
            LogoError::Parse { path, source } => {
                write!(f, "could not parse logo file '{}': {}", path.display(), source)
            }
        }
    }
}

impl StdError for LogoError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            LogoError::Read { source, .. } => Some(source),
            LogoError::Parse { source, .. } => Some(source),
        }
    }
}

/// Read a JSON object mapping a model family to its art lines.
pub fn load_art(path: &Path) -> Result<ArtMap, LogoError> {
    let data = fs::read_to_string(path).map_err(|source| LogoError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| LogoError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gradient {
    pub key: Option<String>,
    pub start: Rgb,
    pub end: Rgb,
}

const FAMILY_GRADIENTS: &[(&str, Rgb, Rgb)] = &[
    ("llama", Rgb::new(170, 0, 255), Rgb::new(0, 170, 255)),
    ("mistral", Rgb::new(255, 140, 0), Rgb::new(0, 130, 255)),
    ("gemma", Rgb::new(74, 144, 226), Rgb::new(213, 62, 79)),
    ("phi3", Rgb::new(0, 180, 180), Rgb::new(200, 200, 0)),
    ("qwen", Rgb::new(255, 100, 0), Rgb::new(255, 200, 0)),
    ("deepseek", Rgb::new(0, 200, 100), Rgb::new(100, 100, 255)),
];

const NEUTRAL_START: Rgb = Rgb::new(240, 240, 240);
const NEUTRAL_END: Rgb = Rgb::new(220, 220, 220);

/// Pick art key and colours for `model`. Known families get their own
/// gradient; anything else matches the first art key contained in the name.
pub fn gradient_for(model: &str, art: &ArtMap) -> Gradient {
    let lowered = model.to_lowercase();
    if let Some((key, start, end)) = FAMILY_GRADIENTS
        .iter()
        .find(|(key, _, _)| lowered.contains(key))
    {
        return Gradient {
            key: Some(key.to_string()),
            start: *start,
            end: *end,
        };
    }

    Gradient {
        key: art.keys().find(|key| lowered.contains(key.as_str())).cloned(),
        start: NEUTRAL_START,
        end: NEUTRAL_END,
    }
}

/// Draw the logo for `model` if the art map has one.
pub fn show_logo<W: Write>(
    console: &mut Console<W>,
    model: &str,
    art: &ArtMap,
    depth: ColorDepth,
) -> io::Result<()> {
    let gradient = gradient_for(model, art);
    let Some(lines) = gradient.key.as_ref().and_then(|key| art.get(key)) else {
        return Ok(());
    };
    let truecolor = console.color_enabled() && depth == ColorDepth::Truecolor;
    print_with_gradient(console.writer(), lines, gradient.start, gradient.end, truecolor)
}

pub fn print_with_gradient<W: Write>(
    out: &mut W,
    lines: &[String],
    start: Rgb,
    end: Rgb,
    truecolor: bool,
) -> io::Result<()> {
    let max_width = lines.iter().map(|line| display_width(line)).max().unwrap_or(0);
    if max_width == 0 {
        return Ok(());
    }

    for line in lines {
        if !truecolor {
            writeln!(out, "{line}")?;
            continue;
        }
        let mut column = 0usize;
        for ch in line.chars() {
            let rgb = start.lerp(end, column as f64 / max_width as f64);
            let color = Color::Rgb {
                r: rgb.r,
                g: rgb.g,
                b: rgb.b,
            };
            write!(out, "{}", ch.to_string().with(color))?;
            column += ch.width().unwrap_or(0);
        }
        writeln!(out)?;
    }
    out.flush()
}

fn display_width(line: &str) -> usize {
    line.chars().map(|ch| ch.width().unwrap_or(0)).sum()
}
