//! Color themes for the TUI.
//!
//! The theme is chosen by name through `ui.theme` in the config file.

use ratatui::style::Color;

/// A complete color theme for the TUI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    /// Theme name for display and configuration
    pub name: String,
    /// Titles, focused borders and the progress bar
    pub primary: Color,
    /// Checked export items
    pub checked: Color,
    /// Main text color
    pub text: Color,
    /// Dimmed text (hints, secondary labels)
    pub text_dim: Color,
    /// Hidden modules and sections
    pub hidden: Color,
    /// Background color (Reset uses terminal default)
    pub background: Color,
    /// Selected row background
    pub selected_bg: Color,
    /// Border color
    pub border: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::default_theme()
    }
}

impl Theme {
    /// Default theme - works well on both light and dark terminals.
    pub fn default_theme() -> Self {
        Self {
            name: "default".to_string(),
            primary: Color::Rgb(249, 128, 18),     // Moodle orange
            checked: Color::Rgb(16, 185, 129),     // Emerald
            text: Color::White,
            text_dim: Color::Rgb(156, 163, 175),   // Gray-400
            hidden: Color::Rgb(107, 114, 128),     // Gray-500
            background: Color::Reset,
            selected_bg: Color::Rgb(55, 65, 81),   // Gray-700
            border: Color::Rgb(75, 85, 99),        // Gray-600
            success: Color::Rgb(34, 197, 94),      // Green
            warning: Color::Rgb(234, 179, 8),      // Yellow
            error: Color::Rgb(239, 68, 68),        // Red
        }
    }

    /// Nord theme - arctic, bluish colors.
    pub fn nord() -> Self {
        Self {
            name: "nord".to_string(),
            primary: Color::Rgb(136, 192, 208),    // Nord8 (Frost)
            checked: Color::Rgb(163, 190, 140),    // Nord14 (Aurora Green)
            text: Color::Rgb(236, 239, 244),       // Nord6 (Snow Storm)
            text_dim: Color::Rgb(216, 222, 233),   // Nord5
            hidden: Color::Rgb(76, 86, 106),       // Nord3 (Polar Night)
            background: Color::Rgb(46, 52, 64),    // Nord0
            selected_bg: Color::Rgb(59, 66, 82),   // Nord1
            border: Color::Rgb(67, 76, 94),        // Nord2
            success: Color::Rgb(163, 190, 140),    // Nord14
            warning: Color::Rgb(235, 203, 139),    // Nord13
            error: Color::Rgb(191, 97, 106),       // Nord11
        }
    }

    /// High contrast theme for accessibility.
    pub fn high_contrast() -> Self {
        Self {
            name: "high-contrast".to_string(),
            primary: Color::Yellow,
            checked: Color::Green,
            text: Color::White,
            text_dim: Color::Gray,
            hidden: Color::DarkGray,
            background: Color::Black,
            selected_bg: Color::Blue,
            border: Color::White,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
        }
    }

    /// Look up a built-in theme by name.
    pub fn by_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "default" => Some(Self::default_theme()),
            "nord" => Some(Self::nord()),
            "high-contrast" | "high_contrast" | "highcontrast" => Some(Self::high_contrast()),
            _ => None,
        }
    }

    /// Names of all built-in themes.
    pub fn available_themes() -> Vec<&'static str> {
        vec!["default", "nord", "high-contrast"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theme_by_name() {
        assert_eq!(Theme::by_name("nord").unwrap().name, "nord");
        assert_eq!(Theme::by_name("High_Contrast").unwrap().name, "high-contrast");
        assert!(Theme::by_name("nonexistent").is_none());
    }

    #[test]
    fn test_all_builtin_themes_valid() {
        for name in Theme::available_themes() {
            let theme = Theme::by_name(name).unwrap();
            assert_eq!(theme.name, name);
        }
    }

    #[test]
    fn test_hidden_differs_from_text() {
        for name in Theme::available_themes() {
            let theme = Theme::by_name(name).unwrap();
            assert_ne!(theme.hidden, theme.text, "{name}");
        }
    }
}
