// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::driver::{DriverError, FramebufferStatus, TextureId, TextureTarget};
use crate::resources::buffer::MapMode;
use crate::resources::texture::ResourceUsage;

/// Errors surfaced by the state layer.
///
/// All of these describe a configuration the device can't realize.  They are
/// returned immediately and never retried.  Contract violations (drawing
/// without an active context, unbalanced `begin`/`end`) panic instead.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error(
        "framebuffer is incomplete: {color_count} color targets [first: {first_color:?}]; depth {depth:?} (status: {status:?})"
    )]
    IncompleteFramebuffer {
        color_count: usize,
        first_color: Option<TextureId>,
        depth: Option<TextureId>,
        status: FramebufferStatus,
    },
    #[error("the window framebuffer can't be combined with a user depth-stencil buffer")]
    WindowTargetWithDepth,
    #[error("render target {index} is {actual:?} but the first target is {expected:?}")]
    MismatchedTargetSize {
        index: usize,
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("depth-stencil buffer is {actual:?} but the render targets are {expected:?}")]
    MismatchedDepthSize {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("{count} render targets exceeds the limit of {limit}")]
    TooManyRenderTargets { count: usize, limit: usize },
    #[error("can't attach a {0:?} texture to a framebuffer")]
    UnsupportedTextureTarget(TextureTarget),
    #[error("multisample textures are not supported on this device")]
    MultisampleUnsupported,
    #[error("only one command list may exist per device")]
    MultipleCommandLists,
    #[error("{usage:?} textures can't be mapped with {mode:?}")]
    UnmappableTexture { usage: ResourceUsage, mode: MapMode },
    #[error("copy from a {from:?} texture into a {to:?} texture is not supported")]
    UnsupportedCopy { from: ResourceUsage, to: ResourceUsage },
    #[error("effect {effect} uses {what} {index}, but only {limit} are tracked")]
    LayoutOutOfRange {
        effect: u64,
        what: &'static str,
        index: u32,
        limit: usize,
    },
    #[error("effect {effect} failed to compile")]
    ProgramCreation {
        effect: u64,
        #[source]
        source: DriverError,
    },
}
