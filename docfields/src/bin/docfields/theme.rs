use clap::builder::styling::{AnsiColor, Color as ClapColor, Style};
use colored::Color;
use once_cell::sync::Lazy;

/// Terminal palette shared by status lines, tables, and `--help`.
pub struct ColorTheme {
    pub success: Color,
    pub error: Color,
    pub warning: Color,
    pub info: Color,
    pub highlight: Color,
    pub muted: Color,
    pub primary: Color,
    pub secondary: Color,
    pub key: Color,
    pub value: Color,
}

impl Default for ColorTheme {
    fn default() -> Self {
        Self {
            success: Color::Green,
            error: Color::Red,
            warning: Color::Yellow,
            info: Color::Blue,
            highlight: Color::Cyan,
            muted: Color::BrightBlack,
            primary: Color::BrightBlue,
            secondary: Color::Magenta,
            key: Color::BrightCyan,
            value: Color::White,
        }
    }
}

impl ColorTheme {
    /// Foreground style for clap's help renderer. Only the palette's own colors are mapped.
    pub fn help_style(&self, color: Color) -> Style {
        let ansi = match color {
            Color::Green => AnsiColor::Green,
            Color::Red => AnsiColor::Red,
            Color::Yellow => AnsiColor::Yellow,
            Color::Blue => AnsiColor::Blue,
            Color::Cyan => AnsiColor::Cyan,
            Color::Magenta => AnsiColor::Magenta,
            Color::BrightBlack => AnsiColor::BrightBlack,
            Color::BrightBlue => AnsiColor::BrightBlue,
            Color::BrightCyan => AnsiColor::BrightCyan,
            _ => AnsiColor::White,
        };
        Style::new().fg_color(Some(ClapColor::Ansi(ansi)))
    }
}

pub static THEME: Lazy<ColorTheme> = Lazy::new(ColorTheme::default);

pub struct Icons {
    pub success: &'static str,
    pub error: &'static str,
    pub warning: &'static str,
    pub info: &'static str,
    pub arrow: &'static str,
    pub bullet: &'static str,
}

pub const ICONS: Icons = Icons {
    success: "✓",
    error: "✗",
    warning: "⚠",
    info: "ℹ",
    arrow: "→",
    bullet: "•",
};
