//! Stencil compositing of recorded commands
//!
//! Every concrete [`CommandType`] maps to a fixed [`Recipe`]: the stencil
//! effect for the main mesh, the effect for the antialiasing border, and an
//! optional cover pass. Concave fills stamp their fans into the lower half of
//! the stencil, draw the border where nothing was stamped, then cover the
//! bounds quad (the mesh's last fan) where the stamp left coverage. Clip and
//! mask variants do the same against the clip region in the upper half.

use tessera_gpu::{RenderDevice, SpriteBatch, StencilEffect};
use tessera_paint::{Affine, Color, Mesh};
use tracing::trace;

use crate::command::{Command, CommandType};

/// Geometry drawn by a cover pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cover {
    /// The mesh's last fan, which is then left out of the main pass
    LastFan,
    /// The whole mesh again
    Mesh,
}

/// Stencil passes for one command type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recipe {
    pub mesh: StencilEffect,
    /// `None` skips the border even when the command has one
    pub border: Option<StencilEffect>,
    pub cover: Option<(StencilEffect, Cover)>,
}

impl Recipe {
    const fn single(mesh: StencilEffect, border: Option<StencilEffect>) -> Self {
        Self {
            mesh,
            border,
            cover: None,
        }
    }

    const fn covered(
        mesh: StencilEffect,
        border: Option<StencilEffect>,
        cover: StencilEffect,
        geometry: Cover,
    ) -> Self {
        Self {
            mesh,
            border,
            cover: Some((cover, geometry)),
        }
    }

    /// The recipe for `kind`; `None` for the generic intents
    pub fn for_kind(kind: CommandType) -> Option<Recipe> {
        use CommandType as T;
        use StencilEffect as E;

        let recipe = match kind {
            T::None | T::Fill | T::Text => return None,

            T::ConvexFill => Recipe::single(E::None, Some(E::None)),
            T::ConvexStencilFill => Recipe::single(E::Region, None),
            T::ConvexClipFill => Recipe::single(E::Clip, Some(E::Clip)),
            T::ConvexMaskFill => Recipe::single(E::Mask, Some(E::Mask)),

            T::ConcaveFill => Recipe::covered(E::Stamp, Some(E::Outside), E::Fill, Cover::LastFan),
            T::EvenOddFill => {
                Recipe::covered(E::StampEvenOdd, Some(E::Outside), E::Fill, Cover::LastFan)
            }
            T::StencilFill => Recipe::covered(E::Stamp, None, E::Carve, Cover::LastFan),
            T::ClipFill => {
                Recipe::covered(E::ClipStamp, Some(E::ClipOutside), E::Fill, Cover::LastFan)
            }
            T::MaskFill => {
                Recipe::covered(E::MaskStamp, Some(E::MaskOutside), E::Fill, Cover::LastFan)
            }

            T::NormalStroke => Recipe::single(E::None, Some(E::None)),
            T::Stroke => Recipe::covered(E::Clamp, Some(E::Clamp), E::Wipe, Cover::Mesh),
            T::StencilStroke => Recipe::single(E::Region, None),
            T::ClipStroke => Recipe::covered(E::ClipClamp, Some(E::ClipClamp), E::Wipe, Cover::Mesh),
            T::MaskStroke => Recipe::covered(E::MaskClamp, Some(E::MaskClamp), E::Wipe, Cover::Mesh),

            T::NormalText => Recipe::single(E::None, None),
            T::StencilText => Recipe::single(E::Region, None),
            T::ClipText => Recipe::single(E::Clip, None),
            T::MaskText => Recipe::single(E::Mask, None),
        };
        Some(recipe)
    }
}

/// Replay one command into an active batch.
///
/// Vertex colors are multiplied by `tint`. Commands without a recipe are
/// skipped.
pub fn draw_command<D: RenderDevice>(
    batch: &mut SpriteBatch<D>,
    command: &Command,
    transform: &Affine,
    tint: Color,
) {
    let Some(recipe) = Recipe::for_kind(command.kind) else {
        trace!("Skipping generic {:?} command", command.kind);
        return;
    };

    batch.set_blend_equation(command.blend_equation);
    batch.set_blend_func(command.blend_func());
    batch.set_texture(command.texture.clone());
    batch.set_gradient(command.gradient.as_deref());
    batch.set_scissor(command.scissor.as_deref());
    batch.set_blur(command.blur_step);
    batch.set_color(tint);

    let split: (Mesh, Mesh);
    let (body, cover) = match recipe.cover {
        Some((_, Cover::LastFan)) => {
            split = command.mesh.split_last_fan();
            (&split.0, &split.1)
        }
        _ => (&command.mesh, &command.mesh),
    };

    batch.set_stencil_effect(recipe.mesh);
    batch.draw_mesh(body, transform, true);

    if let Some(effect) = recipe.border {
        if command.has_border() {
            batch.set_stencil_effect(effect);
            batch.draw_mesh(&command.border, transform, true);
        }
    }

    if let Some((effect, _)) = recipe.cover {
        batch.set_stencil_effect(effect);
        batch.draw_mesh(cover, transform, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_generic_intents_lack_a_recipe() {
        for kind in CommandType::ALL {
            let generic = matches!(kind, CommandType::None | CommandType::Fill | CommandType::Text);
            assert_eq!(Recipe::for_kind(kind).is_none(), generic, "{kind:?}");
        }
    }

    #[test]
    fn test_last_fan_covers_only_fills() {
        for kind in CommandType::ALL {
            if let Some(Recipe {
                cover: Some((_, Cover::LastFan)),
                ..
            }) = Recipe::for_kind(kind)
            {
                assert!(kind.is_fill(), "{kind:?}");
            }
        }
    }

    #[test]
    fn test_stamped_passes_end_clean() {
        // Every pass that writes coverage into the lower half is followed by
        // one that clears it.
        for kind in CommandType::ALL {
            let Some(recipe) = Recipe::for_kind(kind) else {
                continue;
            };
            let stamps = matches!(
                recipe.mesh,
                StencilEffect::Stamp
                    | StencilEffect::StampEvenOdd
                    | StencilEffect::ClipStamp
                    | StencilEffect::MaskStamp
                    | StencilEffect::Clamp
                    | StencilEffect::ClipClamp
                    | StencilEffect::MaskClamp
            );
            if stamps {
                let cleaner = recipe.cover.map(|(e, _)| e);
                assert!(
                    matches!(
                        cleaner,
                        Some(StencilEffect::Fill | StencilEffect::Carve | StencilEffect::Wipe)
                    ),
                    "{kind:?}"
                );
            }
        }
    }
}
