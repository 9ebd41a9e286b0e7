use serde::{Deserialize, Serialize};

use crate::types::Color;

/// Semantic color tokens resolved by the renderer's active theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThemeToken {
    FrameApplication,
    FrameSystem,
    FrameFallback,

    SelectedFrame,
    HoveredFrame,
    SearchHighlight,

    // Differential flamegraphs
    DifferentialIncrease,
    DifferentialDecrease,
    DifferentialNeutral,

    GridLine,
    GridText,
    Background,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThemeMode {
    Dark,
    Light,
}

/// Resolved palette consumed by renderers and by differential coloring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlamegraphTheme {
    pub mode: ThemeMode,
    /// Alpha applied to a differential frame whose count changed by 100%.
    pub max_differential_alpha: f32,
}

impl Default for FlamegraphTheme {
    fn default() -> Self {
        Self::light()
    }
}

impl FlamegraphTheme {
    pub fn light() -> Self {
        Self {
            mode: ThemeMode::Light,
            max_differential_alpha: 0.8,
        }
    }

    pub fn dark() -> Self {
        Self {
            mode: ThemeMode::Dark,
            max_differential_alpha: 0.8,
        }
    }

    pub fn resolve(&self, token: ThemeToken) -> Color {
        match self.mode {
            ThemeMode::Dark => resolve_dark(token),
            ThemeMode::Light => resolve_light(token),
        }
    }
}

fn rgb8(r: u8, g: u8, b: u8) -> Color {
    Color::rgb(f32::from(r) / 255.0, f32::from(g) / 255.0, f32::from(b) / 255.0)
}

fn resolve_dark(token: ThemeToken) -> Color {
    // Catppuccin Mocha palette
    use ThemeToken::*;
    match token {
        FrameApplication => rgb8(0xfa, 0xb3, 0x87), // Peach
        FrameSystem => rgb8(0x89, 0xb4, 0xfa),      // Blue
        FrameFallback => rgb8(0xcb, 0xa6, 0xf7),    // Mauve

        SelectedFrame => rgb8(0x89, 0xb4, 0xfa).with_alpha(0.3),
        HoveredFrame => rgb8(0xcd, 0xd6, 0xf4).with_alpha(0.1),
        SearchHighlight => rgb8(0xf9, 0xe2, 0xaf), // Yellow

        DifferentialIncrease => rgb8(0xf3, 0x8b, 0xa8), // Red
        DifferentialDecrease => rgb8(0x89, 0xb4, 0xfa), // Blue
        DifferentialNeutral => rgb8(0x6c, 0x70, 0x86),  // Overlay0

        GridLine => rgb8(0x31, 0x32, 0x44),   // Surface0
        GridText => rgb8(0xa6, 0xad, 0xc8),   // Subtext0
        Background => rgb8(0x11, 0x11, 0x1b), // Crust
    }
}

fn resolve_light(token: ThemeToken) -> Color {
    // Catppuccin Latte palette
    use ThemeToken::*;
    match token {
        FrameApplication => rgb8(0xfe, 0x64, 0x0b), // Peach
        FrameSystem => rgb8(0x1e, 0x66, 0xf5),      // Blue
        FrameFallback => rgb8(0x88, 0x39, 0xef),    // Mauve

        SelectedFrame => rgb8(0x1e, 0x66, 0xf5).with_alpha(0.3),
        HoveredFrame => rgb8(0x4c, 0x4f, 0x69).with_alpha(0.1),
        SearchHighlight => rgb8(0xdf, 0x8e, 0x1d), // Yellow

        DifferentialIncrease => rgb8(0xd2, 0x0f, 0x39), // Red
        DifferentialDecrease => rgb8(0x1e, 0x66, 0xf5), // Blue
        DifferentialNeutral => rgb8(0x9c, 0xa0, 0xb0),  // Overlay0

        GridLine => rgb8(0xcc, 0xd0, 0xda),   // Surface0
        GridText => rgb8(0x6c, 0x6f, 0x85),   // Subtext0
        Background => rgb8(0xef, 0xf1, 0xf5), // Base
    }
}
