//! Theme loading: btop-style `theme[key]="value"` and hex → ratatui Color.

use crate::Palette;
use crate::config::MAX_COLORS;
use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Gem colours and UI colours loaded from a theme file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    /// Gem colours for colour 1..=6: green, yellow, red, blue, magenta, cyan.
    pub gems: [Color; MAX_COLORS as usize],
    /// Bombs, line blasts and rainbow clears.
    pub bonus: Color,
    /// Board background.
    pub bg: Color,
    /// Grid / border.
    pub div_line: Color,
    /// Text (score, level).
    pub main_fg: Color,
    /// Highlight / titles.
    pub title: Color,
    /// Secondary text and cleared cells during playback.
    pub inactive_fg: Color,
    /// Cursor and picked gem.
    pub cursor: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

const ONEDARK_GEMS: [Color; MAX_COLORS as usize] = [
    Color::Rgb(0x98, 0xC3, 0x79), // mem_box / green
    Color::Rgb(0xE5, 0xC0, 0x7B), // title / yellow
    Color::Rgb(0xE0, 0x6C, 0x75), // cpu_end / red
    Color::Rgb(0x61, 0xAF, 0xEF), // cpu_box / blue
    Color::Rgb(0xC6, 0x78, 0xDD), // net_box / magenta
    Color::Rgb(0x56, 0xB6, 0xC2), // hi_fg / cyan
];

impl Default for Theme {
    fn default() -> Self {
        Self::onedark_default()
    }
}

impl Theme {
    /// One Dark values from onedark.theme.
    pub fn onedark_default() -> Self {
        Self {
            gems: ONEDARK_GEMS,
            bonus: Color::Rgb(0xFF, 0xFF, 0xFF),
            bg: Color::Rgb(0x31, 0x35, 0x3F),
            div_line: Color::Rgb(0x3F, 0x44, 0x4F),
            main_fg: Color::Rgb(0xAB, 0xB2, 0xBF),
            title: Color::Rgb(0xE5, 0xC0, 0x7B),
            inactive_fg: Color::Rgb(0x5C, 0x63, 0x70),
            cursor: Color::Rgb(0xAB, 0xB2, 0xBF),
        }
    }

    /// Load theme from a btop-style file: `theme[key]="value"` or `theme[key]='value'`.
    /// Falls back to One Dark defaults if path is None or the file is missing.
    pub fn load(path: Option<&Path>, palette: Palette) -> Result<Self, ThemeError> {
        let path = match path {
            Some(p) if p.exists() => p,
            _ => return Ok(Self::default_for_palette(palette)),
        };
        let s = std::fs::read_to_string(path)?;
        let map = parse_theme_file(&s);
        let mut theme = Self::from_map(&map);
        theme.apply_palette(palette);
        Ok(theme)
    }

    pub fn default_for_palette(palette: Palette) -> Self {
        let mut t = Self::onedark_default();
        t.apply_palette(palette);
        t
    }

    /// Override gem colours for high-contrast or colorblind play.
    pub fn apply_palette(&mut self, palette: Palette) {
        match palette {
            Palette::Normal => {}
            Palette::HighContrast => {
                self.gems = [
                    Color::Rgb(0x00, 0xFF, 0x00),
                    Color::Rgb(0xFF, 0xFF, 0x00),
                    Color::Rgb(0xFF, 0x00, 0x00),
                    Color::Rgb(0x00, 0x88, 0xFF),
                    Color::Rgb(0xFF, 0x00, 0xFF),
                    Color::Rgb(0x00, 0xFF, 0xFF),
                ];
                self.cursor = Color::White;
            }
            Palette::Colorblind => {
                // Avoid red/green pairs; the glyph shapes stay the same for every colour.
                self.gems = [
                    Color::Rgb(0x00, 0x77, 0xBB), // blue
                    Color::Rgb(0xEE, 0x77, 0x33), // orange
                    Color::Rgb(0x00, 0x99, 0x88), // teal
                    Color::Rgb(0xCC, 0x33, 0x11), // red
                    Color::Rgb(0xEE, 0x33, 0x77), // magenta
                    Color::Rgb(0xBB, 0xBB, 0x00), // yellow
                ];
            }
        }
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |key: &str| map.get(key).and_then(|v| parse_hex(v).ok());
        let base = Self::onedark_default();
        let [green, yellow, red, blue, magenta, cyan] = base.gems;
        Self {
            gems: [
                get("mem_box").or_else(|| get("cpu_start")).unwrap_or(green),
                get("title").or_else(|| get("cpu_mid")).unwrap_or(yellow),
                get("cpu_end").or_else(|| get("temp_end")).unwrap_or(red),
                get("cpu_box").unwrap_or(blue),
                get("net_box").unwrap_or(magenta),
                get("hi_fg").or_else(|| get("proc_misc")).unwrap_or(cyan),
            ],
            bonus: get("selected_fg").unwrap_or(base.bonus),
            bg: get("meter_bg").unwrap_or(base.bg),
            div_line: get("div_line").unwrap_or(base.div_line),
            main_fg: get("main_fg").unwrap_or(base.main_fg),
            title: get("title").unwrap_or(base.title),
            inactive_fg: get("inactive_fg").unwrap_or(base.inactive_fg),
            cursor: get("hi_fg").unwrap_or(base.cursor),
        }
    }

    /// Colour of gem `color` (1-based); out-of-range values wrap.
    #[inline]
    pub fn gem_color(&self, color: u8) -> Color {
        self.gems[usize::from(color.saturating_sub(1)) % self.gems.len()]
    }
}

/// Parse btop-style theme file into key -> value map.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(stripped) = line.strip_prefix("theme[") else {
            continue;
        };
        let Some(end) = stripped.find(']') else {
            continue;
        };
        let key = stripped[..end].trim();
        let rest = stripped[end + 1..].trim();
        if let Some(value) = rest.strip_prefix('=') {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            if !value.is_empty() {
                map.insert(key.to_string(), value.to_string());
            }
        }
    }
    map
}

/// Parse hex colour "#RRGGBB" or "#RGB" into ratatui Color.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let s = s.trim().trim_start_matches('#');
    let invalid = || ThemeError::InvalidHex(s.to_string());
    let channel = |digits: &str| u8::from_str_radix(digits, 16).map_err(|_| invalid());
    let (r, g, b) = match s.len() {
        6 => (channel(&s[0..2])?, channel(&s[2..4])?, channel(&s[4..6])?),
        3 => (
            channel(&s[0..1])? * 17,
            channel(&s[1..2])? * 17,
            channel(&s[2..3])? * 17,
        ),
        _ => return Err(invalid()),
    };
    Ok(Color::Rgb(r, g, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_6() {
        let c = parse_hex("#98C379").unwrap();
        assert!(matches!(c, Color::Rgb(0x98, 0xC3, 0x79)));
    }

    #[test]
    fn test_parse_hex_3() {
        let c = parse_hex("#FFF").unwrap();
        assert!(matches!(c, Color::Rgb(255, 255, 255)));
        assert!(parse_hex("#12345").is_err());
        assert!(parse_hex("#GGGGGG").is_err());
    }

    #[test]
    fn test_parse_theme_line() {
        let map = parse_theme_file(r##"theme[meter_bg]="#31353F""##);
        assert_eq!(map.get("meter_bg"), Some(&"#31353F".to_string()));
    }

    #[test]
    fn theme_file_overrides_gems() {
        let map = parse_theme_file("theme[mem_box]='#010203'\n# comment\ntheme[net_box]=\"#0A0B0C\"");
        let theme = Theme::from_map(&map);
        assert_eq!(theme.gem_color(1), Color::Rgb(1, 2, 3));
        assert_eq!(theme.gem_color(5), Color::Rgb(10, 11, 12));
        assert_eq!(theme.gem_color(2), Theme::default().gem_color(2));
    }

    #[test]
    fn palettes_swap_gems_only() {
        let base = Theme::default();
        let cb = Theme::default_for_palette(Palette::Colorblind);
        assert_ne!(cb.gems, base.gems);
        assert_eq!(cb.bg, base.bg);
    }
}
