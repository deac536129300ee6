// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
GPU resources as the state layer sees them.

Textures, buffers and sampler states are shared handles compared by identity,
the same way two clones of one resource are "the same binding" while two
resources with equal descriptions are not.  The mirror and the framebuffer
cache both key on this identity.
*/
pub mod buffer;
pub mod sampler;
pub mod texture;

pub use buffer::{Buffer, BufferDescription, BufferKind, MapMode};
pub use sampler::{Filter, SamplerState, SamplerStateDescription, TextureAddressMode};
pub use texture::{ResourceUsage, Texture, TextureDescription, TextureDimension};
