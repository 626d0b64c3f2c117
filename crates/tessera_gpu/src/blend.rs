//! Blend and color-write state

use bitflags::bitflags;

/// How source and destination terms are combined
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlendEquation {
    #[default]
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// Multiplier applied to a blend term
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstColor,
    OneMinusDstColor,
    DstAlpha,
    OneMinusDstAlpha,
    SrcAlphaSaturated,
}

/// The four blend-function factors
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlendFunc {
    pub src_rgb: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_rgb: BlendFactor,
    pub dst_alpha: BlendFactor,
}

impl BlendFunc {
    /// Straight-alpha "source over"
    pub const SOURCE_OVER: BlendFunc = BlendFunc {
        src_rgb: BlendFactor::SrcAlpha,
        src_alpha: BlendFactor::One,
        dst_rgb: BlendFactor::OneMinusSrcAlpha,
        dst_alpha: BlendFactor::OneMinusSrcAlpha,
    };

    /// Additive blending
    pub const ADDITIVE: BlendFunc = BlendFunc {
        src_rgb: BlendFactor::SrcAlpha,
        src_alpha: BlendFactor::One,
        dst_rgb: BlendFactor::One,
        dst_alpha: BlendFactor::One,
    };

    /// Overwrite the destination
    pub const REPLACE: BlendFunc = BlendFunc {
        src_rgb: BlendFactor::One,
        src_alpha: BlendFactor::One,
        dst_rgb: BlendFactor::Zero,
        dst_alpha: BlendFactor::Zero,
    };
}

impl Default for BlendFunc {
    fn default() -> Self {
        Self::SOURCE_OVER
    }
}

bitflags! {
    /// Which color channels a draw writes
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ColorMask: u8 {
        const RED = 1;
        const GREEN = 1 << 1;
        const BLUE = 1 << 2;
        const ALPHA = 1 << 3;
        const ALL = Self::RED.bits() | Self::GREEN.bits() | Self::BLUE.bits() | Self::ALPHA.bits();
    }
}

impl Default for ColorMask {
    fn default() -> Self {
        Self::ALL
    }
}
