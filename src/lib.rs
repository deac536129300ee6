// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! bound_state is the state-tracking layer between a renderer and a binding-based
GPU API such as OpenGL or OpenGL ES.

Binding-based APIs are expensive to talk to.  Every state change is a driver
call, and most renderers set far more state per draw than actually changes.
bound_state keeps a mirror of what the context has bound and turns a renderer's
"here is everything I want for this draw" into the handful of calls that differ.

# Pieces

| Piece                                  | Role                                                              |
|----------------------------------------|-------------------------------------------------------------------|
| [`driver::Driver`]                     | The API itself, one method per call.  You implement it.           |
| [`GraphicsDevice`]                     | Owns the contexts, the shared caches, and frame bookkeeping       |
| [`CommandList`]                        | Records state, flushes the difference before each draw            |
| [`pipeline::PipelineState`]            | Program plus fixed-function state, deduplicated by description    |
| [`framebuffer::FramebufferCache`]      | One framebuffer object per distinct attachment set                |
| [`creation_context::CreationContext`]  | Resource creation from any thread through a secondary context     |

# Contexts and threads

A device holds two contexts that share objects.  The render thread makes the
primary one current with [`GraphicsDevice::begin`] and drives the
[`CommandList`] on it.  Any other thread that needs to create a buffer, texture
or program does so through [`GraphicsDevice::use_creation_context`], which
borrows the secondary context for the duration.  Only one thread may hold the
secondary context at a time; acquisitions nested on that thread share it.

# Driver

Nothing here renders by itself.  [`imp::RecordingDriver`] records every call
instead, which is what the tests inspect.
*/

logwise::declare_logging_domain!();

pub mod cache;
pub mod command_list;
pub mod creation_context;
pub mod device;
pub mod driver;
mod error;
pub mod framebuffer;
pub mod imp;
pub mod pipeline;
pub mod resources;
pub mod state;

mod bittricks;

pub use command_list::{CommandList, GraphicsResource, Mapped, MappedResource, ResourceRegion};
pub use device::{DeviceConfig, GraphicsDevice};
pub use error::Error;

/// Frames a non-blocking staging read waits after the copy that filled it.
pub const READBACK_FRAME_DELAY: u64 = 2;
pub const MAX_BOUND_RENDER_TARGETS: usize = 16;
pub const MAX_TEXTURE_UNITS: usize = 64;
pub const MAX_VERTEX_BUFFERS: usize = 8;
/// Attribute locations a program may use; enabled lanes are tracked as a `u64`.
pub const MAX_VERTEX_ATTRIBUTES: usize = 64;
pub const MAX_CONSTANT_BUFFERS: usize = 64;
pub const MAX_DESCRIPTOR_SETS: usize = 32;
pub const MAX_VIEWPORTS: usize = 16;
