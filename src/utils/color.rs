#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorDepth {
    Truecolor,
    X256,
    X16,
}

/// Detect terminal color depth from environment.
/// Priority: OLLAMA_CLI_COLOR override -> COLORTERM truecolor/24bit -> TERM *256color -> fallback 16.
pub fn detect_color_depth() -> ColorDepth {
    depth_from_env(
        std::env::var("OLLAMA_CLI_COLOR").ok().as_deref(),
        std::env::var("COLORTERM").ok().as_deref(),
        std::env::var("TERM").ok().as_deref(),
    )
}

fn depth_from_env(force: Option<&str>, colorterm: Option<&str>, term: Option<&str>) -> ColorDepth {
    if let Some(force) = force {
        match force.trim().to_ascii_lowercase().as_str() {
            "truecolor" | "24bit" | "24-bit" => return ColorDepth::Truecolor,
            "256" | "x256" | "256color" => return ColorDepth::X256,
            "16" | "ansi" | "x16" => return ColorDepth::X16,
            _ => {}
        }
    }

    if let Some(colorterm) = colorterm {
        let s = colorterm.to_ascii_lowercase();
        if s.contains("truecolor") || s.contains("24bit") || s.contains("24-bit") {
            return ColorDepth::Truecolor;
        }
    }
    if let Some(term) = term {
        if term.to_ascii_lowercase().contains("256color") {
            return ColorDepth::X256;
        }
    }
    ColorDepth::X16
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Linear interpolation; `ratio` is clamped to `0.0..=1.0`.
    pub fn lerp(self, end: Rgb, ratio: f64) -> Rgb {
        let ratio = ratio.clamp(0.0, 1.0);
        let channel = |a: u8, b: u8| (a as f64 + ratio * (b as f64 - a as f64)) as u8;
        Rgb {
            r: channel(self.r, end.r),
            g: channel(self.g, end.g),
            b: channel(self.b, end.b),
        }
    }
}
