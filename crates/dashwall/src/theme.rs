use palette::{FromColor, Hsl, Srgb};

use crate::widget::Widget;

pub const LIGHT_BACKGROUND: &str = "#FFFFFF";
pub const BLACK_BACKGROUND: &str = "#000000";
pub const LIGHT_TEXT: &str = "#111827";
pub const BLACK_TEXT: &str = "#F9FAFB";
pub const DEFAULT_PRIMARY: &str = "#3B82F6";
pub const DEFAULT_POSITIVE: &str = "#10B981";
pub const DEFAULT_NEGATIVE: &str = "#EF4444";

/// Colours a renderer paints with, after per-widget overrides have been
/// applied and validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    pub is_black: bool,
    pub background: String,
    pub text: String,
    pub primary: String,
    pub positive: String,
    pub negative: String,
}

impl Theme {
    pub fn for_widget(widget: &Widget) -> Self {
        let overrides = &widget.theme;
        let is_black = overrides.is_black_theme.unwrap_or(false);
        let (background, text) = if is_black {
            (BLACK_BACKGROUND, BLACK_TEXT)
        } else {
            (LIGHT_BACKGROUND, LIGHT_TEXT)
        };
        Self {
            is_black,
            background: resolve_color(overrides.background_color.as_deref(), background),
            text: text.to_string(),
            primary: resolve_color(overrides.primary_color.as_deref(), DEFAULT_PRIMARY),
            positive: resolve_color(overrides.positive_color.as_deref(), DEFAULT_POSITIVE),
            negative: resolve_color(overrides.negative_color.as_deref(), DEFAULT_NEGATIVE),
        }
    }

    /// Inline style for a widget root.
    pub fn root_style(&self) -> String {
        format!("background-color: {}; color: {}", self.background, self.text)
    }

    /// Faded variant of the primary colour used for progress tracks.
    pub fn track(&self) -> String {
        let amount = if self.is_black { -30 } else { 35 };
        adjust_lightness(&self.primary, amount).unwrap_or_else(|| self.primary.clone())
    }
}

/// Normalises a hex (`#abc`, `#aabbcc`) or CSS colour name to `#RRGGBB`.
pub fn parse_color(raw: &str) -> Option<Srgb<u8>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Some(hex) = raw.strip_prefix('#') {
        return hex.parse::<Srgb<u8>>().ok();
    }
    palette::named::from_str(&raw.to_ascii_lowercase())
}

/// Resolves a user-supplied colour, falling back to `default` when it is
/// absent or unparseable.
pub fn resolve_color(raw: Option<&str>, default: &str) -> String {
    let Some(raw) = raw else {
        return default.to_string();
    };
    match parse_color(raw) {
        Some(color) => to_hex(color),
        None => {
            tracing::debug!(color = raw, default, "unknown colour, using default");
            default.to_string()
        }
    }
}

/// Shifts lightness by `amount` percentage points.
pub fn adjust_lightness(color: &str, amount: i32) -> Option<String> {
    let rgb: Srgb<f32> = parse_color(color)?.into_format();
    let hsl: Hsl = Hsl::from_color(rgb);
    let delta = amount as f32 / 100.0;
    let next = Hsl::new(
        hsl.hue,
        hsl.saturation,
        (hsl.lightness + delta).clamp(0.0, 1.0),
    );
    Some(to_hex(Srgb::<f32>::from_color(next).into_format()))
}

pub fn to_hex(color: Srgb<u8>) -> String {
    format!("#{:02X}{:02X}{:02X}", color.red, color.green, color.blue)
}
