//! UI colors: a purple palette with optional overrides from the `[theme]`
//! table of the config file

use ratatui::style::Color;

use crate::config::ThemeConfig;

/// Theme colors for the UI
#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    pub accent: Color,      // Active borders, key hints
    pub danger: Color,      // Error toasts
    pub success: Color,     // Success toasts
    pub text: Color,        // Primary text
    pub text_dim: Color,    // Hints, placeholders
    pub bg_selected: Color, // Selected card
    pub inactive: Color,    // Inactive borders
    pub header: Color,      // Titles
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            accent: Color::Rgb(232, 121, 249),      // fuchsia-400
            danger: Color::Rgb(248, 113, 113),      // red-400
            success: Color::Rgb(134, 239, 172),     // green-300
            text: Color::Rgb(243, 232, 255),        // purple-100
            text_dim: Color::Rgb(192, 132, 252),    // purple-400
            bg_selected: Color::Rgb(88, 28, 135),   // purple-900
            inactive: Color::Rgb(107, 33, 168),     // purple-800
            header: Color::Rgb(251, 207, 232),      // pink-200
        }
    }
}

impl Theme {
    /// Build the theme, applying any valid overrides
    pub fn from_config(config: &ThemeConfig) -> Self {
        let mut theme = Self::default();

        let pick = |value: &Option<String>, fallback: Color| {
            match value.as_deref() {
                Some(s) => Self::parse_hex_color(s).unwrap_or_else(|| {
                    tracing::warn!("Ignoring invalid theme color {:?}", s);
                    fallback
                }),
                None => fallback,
            }
        };

        theme.accent = pick(&config.accent, theme.accent);
        theme.danger = pick(&config.danger, theme.danger);
        theme.success = pick(&config.success, theme.success);
        theme.text = pick(&config.text, theme.text);
        theme.text_dim = pick(&config.text_dim, theme.text_dim);
        theme
    }

    /// Parse a hex color string (#RRGGBB or #RGB)
    fn parse_hex_color(s: &str) -> Option<Color> {
        let s = s.trim().trim_start_matches('#');
        if !s.is_ascii() {
            return None;
        }

        if s.len() == 6 {
            let r = u8::from_str_radix(&s[0..2], 16).ok()?;
            let g = u8::from_str_radix(&s[2..4], 16).ok()?;
            let b = u8::from_str_radix(&s[4..6], 16).ok()?;
            Some(Color::Rgb(r, g, b))
        } else if s.len() == 3 {
            let r = u8::from_str_radix(&s[0..1], 16).ok()? * 17;
            let g = u8::from_str_radix(&s[1..2], 16).ok()? * 17;
            let b = u8::from_str_radix(&s[2..3], 16).ok()? * 17;
            Some(Color::Rgb(r, g, b))
        } else {
            None
        }
    }
}
