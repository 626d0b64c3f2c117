//! Stencil effects
//!
//! The 8-bit stencil buffer is split into two halves. The lower nibble is
//! scratch space for the shape being drawn (winding counts, parity, clamp
//! marks). The upper nibble holds a previously established clip region.
//! Keeping them apart lets a shape be stamped, masked and filled while a clip
//! region stays intact.
//!
//! Every [`StencilEffect`] resolves through [`STENCIL_TABLE`] to one fixed
//! [`StencilMode`]. Wrong mask bits never raise an error on hardware, only
//! visual artifacts, so the table is data rather than branching code.

use crate::blend::ColorMask;
use crate::device::RenderDevice;

/// Scratch bits for the shape being drawn
pub const LOWER_HALF: u8 = 0x0F;
/// Clip-region bits
pub const UPPER_HALF: u8 = 0xF0;
/// The whole stencil byte
pub const FULL_STENCIL: u8 = 0xFF;

/// Stencil comparison
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

/// Stencil update
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    IncrementClamp,
    DecrementClamp,
    Invert,
    IncrementWrap,
    DecrementWrap,
}

/// Operations for one face
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StencilFaceOps {
    pub fail: StencilOp,
    pub depth_fail: StencilOp,
    pub pass: StencilOp,
}

impl StencilFaceOps {
    pub const KEEP: StencilFaceOps = StencilFaceOps::on_pass(StencilOp::Keep);

    /// Keep on failure, apply `op` where the test passes
    pub const fn on_pass(op: StencilOp) -> Self {
        Self {
            fail: StencilOp::Keep,
            depth_fail: StencilOp::Keep,
            pass: op,
        }
    }
}

/// A complete stencil configuration.
///
/// The test passes where `(reference & read_mask) <compare> (stencil & read_mask)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StencilState {
    pub compare: CompareFunction,
    pub reference: u8,
    pub read_mask: u8,
    pub front: StencilFaceOps,
    pub back: StencilFaceOps,
    pub write_mask: u8,
    /// Whether color is written at all
    pub color_write: bool,
}

impl StencilState {
    pub fn color_mask(&self) -> ColorMask {
        if self.color_write {
            ColorMask::ALL
        } else {
            ColorMask::empty()
        }
    }
}

/// What applying an effect does to the pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StencilMode {
    /// Leave the current stencil configuration alone
    Untouched,
    /// Stencil test off, full color writes
    Disabled,
    Enabled(StencilState),
}

/// Named stencil configurations used by the batch and the canvas compositor
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StencilEffect {
    /// Whatever the caller configured directly on the device
    Native = 0,
    /// No stencil test
    #[default]
    None,
    /// Count winding in the lower half: increment front faces, decrement back faces
    Stamp,
    /// Toggle the lower half for each covering triangle
    StampEvenOdd,
    /// Draw everywhere and mark the lower half
    Cover,
    /// Draw where the lower half is set, zeroing it
    Fill,
    /// Draw where the lower half is clear
    Outside,
    /// Draw where the lower half is clear and mark it, so overlaps blend once
    Clamp,
    /// Zero the lower half without drawing
    Wipe,
    /// Move stamped coverage from the lower half into the upper half
    Carve,
    /// Remove stamped coverage from both halves
    Uncarve,
    /// Mark the upper half without drawing
    Region,
    /// Draw inside the clip region
    Clip,
    /// Draw outside the clip region
    Mask,
    /// Stamp restricted to the clip region
    ClipStamp,
    ClipStampEvenOdd,
    /// Draw inside the clip region where the lower half is clear
    ClipOutside,
    ClipClamp,
    /// Stamp restricted to outside the clip region
    MaskStamp,
    MaskStampEvenOdd,
    /// Draw outside the clip region where the lower half is clear
    MaskOutside,
    MaskClamp,
    /// Zero the upper half without drawing
    WipeRegion,
    /// Zero the whole stencil without drawing
    WipeAll,
}

const fn test(
    compare: CompareFunction,
    reference: u8,
    read_mask: u8,
    front: StencilOp,
    back: StencilOp,
    write_mask: u8,
    color_write: bool,
) -> StencilMode {
    StencilMode::Enabled(StencilState {
        compare,
        reference,
        read_mask,
        front: StencilFaceOps::on_pass(front),
        back: StencilFaceOps::on_pass(back),
        write_mask,
        color_write,
    })
}

use CompareFunction::{Always, Equal, NotEqual};
use StencilOp::{DecrementWrap, IncrementWrap, Invert, Keep, Replace, Zero};

/// Lookup table indexed by `StencilEffect as usize`
pub const STENCIL_TABLE: [StencilMode; StencilEffect::COUNT] = [
    // Native
    StencilMode::Untouched,
    // None
    StencilMode::Disabled,
    // Stamp
    test(Always, 0, FULL_STENCIL, IncrementWrap, DecrementWrap, LOWER_HALF, false),
    // StampEvenOdd
    test(Always, 0, FULL_STENCIL, Invert, Invert, LOWER_HALF, false),
    // Cover
    test(Always, LOWER_HALF, FULL_STENCIL, Replace, Replace, LOWER_HALF, true),
    // Fill
    test(NotEqual, 0, LOWER_HALF, Zero, Zero, LOWER_HALF, true),
    // Outside
    test(Equal, 0, LOWER_HALF, Keep, Keep, 0, true),
    // Clamp
    test(Equal, 0, LOWER_HALF, Invert, Invert, LOWER_HALF, true),
    // Wipe
    test(Always, 0, FULL_STENCIL, Zero, Zero, LOWER_HALF, false),
    // Carve
    test(NotEqual, UPPER_HALF, LOWER_HALF, Replace, Replace, FULL_STENCIL, false),
    // Uncarve
    test(NotEqual, 0, LOWER_HALF, Zero, Zero, FULL_STENCIL, false),
    // Region
    test(Always, UPPER_HALF, FULL_STENCIL, Replace, Replace, UPPER_HALF, false),
    // Clip
    test(NotEqual, 0, UPPER_HALF, Keep, Keep, 0, true),
    // Mask
    test(Equal, 0, UPPER_HALF, Keep, Keep, 0, true),
    // ClipStamp
    test(NotEqual, 0, UPPER_HALF, IncrementWrap, DecrementWrap, LOWER_HALF, false),
    // ClipStampEvenOdd
    test(NotEqual, 0, UPPER_HALF, Invert, Invert, LOWER_HALF, false),
    // ClipOutside
    test(Equal, UPPER_HALF, FULL_STENCIL, Keep, Keep, 0, true),
    // ClipClamp
    test(Equal, UPPER_HALF, FULL_STENCIL, Invert, Invert, LOWER_HALF, true),
    // MaskStamp
    test(Equal, 0, UPPER_HALF, IncrementWrap, DecrementWrap, LOWER_HALF, false),
    // MaskStampEvenOdd
    test(Equal, 0, UPPER_HALF, Invert, Invert, LOWER_HALF, false),
    // MaskOutside
    test(Equal, 0, FULL_STENCIL, Keep, Keep, 0, true),
    // MaskClamp
    test(Equal, 0, FULL_STENCIL, Invert, Invert, LOWER_HALF, true),
    // WipeRegion
    test(Always, 0, FULL_STENCIL, Zero, Zero, UPPER_HALF, false),
    // WipeAll
    test(Always, 0, FULL_STENCIL, Zero, Zero, FULL_STENCIL, false),
];

impl StencilEffect {
    pub const COUNT: usize = 24;

    pub const ALL: [StencilEffect; StencilEffect::COUNT] = [
        StencilEffect::Native,
        StencilEffect::None,
        StencilEffect::Stamp,
        StencilEffect::StampEvenOdd,
        StencilEffect::Cover,
        StencilEffect::Fill,
        StencilEffect::Outside,
        StencilEffect::Clamp,
        StencilEffect::Wipe,
        StencilEffect::Carve,
        StencilEffect::Uncarve,
        StencilEffect::Region,
        StencilEffect::Clip,
        StencilEffect::Mask,
        StencilEffect::ClipStamp,
        StencilEffect::ClipStampEvenOdd,
        StencilEffect::ClipOutside,
        StencilEffect::ClipClamp,
        StencilEffect::MaskStamp,
        StencilEffect::MaskStampEvenOdd,
        StencilEffect::MaskOutside,
        StencilEffect::MaskClamp,
        StencilEffect::WipeRegion,
        StencilEffect::WipeAll,
    ];

    pub fn mode(self) -> StencilMode {
        STENCIL_TABLE[self as usize]
    }

    /// The stencil state this effect installs, if it enables the test
    pub fn state(self) -> Option<StencilState> {
        match self.mode() {
            StencilMode::Enabled(state) => Some(state),
            _ => None,
        }
    }

    /// Issue the device calls for this effect
    pub fn apply(self, device: &mut dyn RenderDevice) {
        match self.mode() {
            StencilMode::Untouched => {}
            StencilMode::Disabled => {
                device.set_stencil_test(false);
                device.set_color_mask(ColorMask::ALL);
            }
            StencilMode::Enabled(state) => {
                device.set_stencil_test(true);
                device.set_stencil_state(&state);
                device.set_color_mask(state.color_mask());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_indexed_by_discriminant() {
        for (i, effect) in StencilEffect::ALL.iter().enumerate() {
            assert_eq!(*effect as usize, i);
        }
    }

    #[test]
    fn test_lower_half_effects_never_write_upper_bits() {
        use StencilEffect::*;
        for effect in [Stamp, StampEvenOdd, Cover, Fill, Clamp, Wipe, ClipStamp, ClipClamp, MaskStamp, MaskClamp] {
            let state = effect.state().unwrap();
            assert_eq!(state.write_mask & UPPER_HALF, 0, "{effect:?} writes the clip region");
        }
    }

    #[test]
    fn test_stamps_do_not_draw_color() {
        use StencilEffect::*;
        for effect in [Stamp, StampEvenOdd, ClipStamp, ClipStampEvenOdd, MaskStamp, MaskStampEvenOdd, Wipe, Carve, Region, WipeAll] {
            assert!(!effect.state().unwrap().color_write, "{effect:?}");
        }
    }

    #[test]
    fn test_clip_and_mask_read_upper_half() {
        let clip = StencilEffect::Clip.state().unwrap();
        assert_eq!((clip.compare, clip.read_mask), (CompareFunction::NotEqual, UPPER_HALF));
        let mask = StencilEffect::Mask.state().unwrap();
        assert_eq!((mask.compare, mask.read_mask), (CompareFunction::Equal, UPPER_HALF));
    }

    #[test]
    fn test_stamp_counts_winding_by_face() {
        let stamp = StencilEffect::Stamp.state().unwrap();
        assert_eq!(stamp.front.pass, StencilOp::IncrementWrap);
        assert_eq!(stamp.back.pass, StencilOp::DecrementWrap);
    }

    #[test]
    fn test_native_and_none() {
        assert_eq!(StencilEffect::Native.mode(), StencilMode::Untouched);
        assert_eq!(StencilEffect::None.mode(), StencilMode::Disabled);
        assert_eq!(StencilEffect::default(), StencilEffect::None);
    }
}
