// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Textures and renderbuffers.

use crate::Error;
use crate::device::GraphicsDevice;
use crate::driver::{BufferId, BufferTarget, BufferUsageHint, Driver, TextureId, TextureTarget};
use crate::resources::sampler::SamplerState;
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    Texture1D,
    Texture2D,
    Texture3D,
    TextureCube,
}

/// How the CPU is allowed to touch a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceUsage {
    #[default]
    Default,
    Immutable,
    /// CPU writes through `WriteDiscard` maps.
    Dynamic,
    /// CPU readback through a pixel-pack buffer.
    Staging,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDescription {
    pub dimension: TextureDimension,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mip_levels: u32,
    pub array_size: u32,
    pub usage: ResourceUsage,
    pub render_target: bool,
    pub depth_stencil: bool,
    pub has_stencil: bool,
    /// Depth and stencil live in one packed surface.  When false, stencil gets
    /// its own renderbuffer.
    pub packed_depth_stencil: bool,
    pub shader_resource: bool,
    pub multisample_count: u32,
    /// Supplied by the format table.
    pub bytes_per_pixel: u32,
}

impl TextureDescription {
    pub fn new_2d(width: u32, height: u32) -> Self {
        TextureDescription {
            dimension: TextureDimension::Texture2D,
            width,
            height,
            depth: 1,
            mip_levels: 1,
            array_size: 1,
            usage: ResourceUsage::Default,
            render_target: false,
            depth_stencil: false,
            has_stencil: false,
            packed_depth_stencil: true,
            shader_resource: true,
            multisample_count: 1,
            bytes_per_pixel: 4,
        }
    }

    pub fn render_target(width: u32, height: u32) -> Self {
        TextureDescription {
            render_target: true,
            ..TextureDescription::new_2d(width, height)
        }
    }

    /// A depth buffer that isn't sampled, optionally with stencil.
    pub fn depth_stencil(width: u32, height: u32, has_stencil: bool) -> Self {
        TextureDescription {
            depth_stencil: true,
            has_stencil,
            shader_resource: false,
            ..TextureDescription::new_2d(width, height)
        }
    }

    pub fn with_mip_levels(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels.max(1);
        self
    }

    pub fn with_array_size(mut self, array_size: u32) -> Self {
        self.array_size = array_size.max(1);
        self
    }

    pub fn with_dimension(mut self, dimension: TextureDimension) -> Self {
        self.dimension = dimension;
        if dimension == TextureDimension::TextureCube {
            self.array_size = 6;
        }
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth.max(1);
        self
    }

    pub fn with_usage(mut self, usage: ResourceUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_multisample(mut self, count: u32) -> Self {
        self.multisample_count = count.max(1);
        self
    }

    pub fn with_shader_resource(mut self, shader_resource: bool) -> Self {
        self.shader_resource = shader_resource;
        self
    }

    pub fn with_separate_stencil(mut self) -> Self {
        self.packed_depth_stencil = false;
        self
    }

    pub fn is_multisample(&self) -> bool {
        self.multisample_count > 1
    }

    /// Surfaces that are never sampled are created as renderbuffers.
    pub fn is_renderbuffer(&self) -> bool {
        (self.depth_stencil || self.is_multisample())
            && !self.shader_resource
            && self.dimension == TextureDimension::Texture2D
            && self.array_size == 1
    }

    pub fn target(&self) -> TextureTarget {
        if self.is_renderbuffer() {
            return TextureTarget::Renderbuffer;
        }
        match self.dimension {
            TextureDimension::Texture1D => TextureTarget::Texture1D,
            TextureDimension::Texture2D if self.is_multisample() => {
                TextureTarget::Texture2DMultisample
            }
            TextureDimension::Texture2D if self.array_size > 1 => TextureTarget::Texture2DArray,
            TextureDimension::Texture2D => TextureTarget::Texture2D,
            TextureDimension::Texture3D => TextureTarget::Texture3D,
            TextureDimension::TextureCube => TextureTarget::TextureCubeMap,
        }
    }

    pub fn mip_size(&self, mip_level: u32) -> [u32; 3] {
        [
            (self.width >> mip_level).max(1),
            (self.height >> mip_level).max(1),
            (self.depth >> mip_level).max(1),
        ]
    }

    pub fn row_pitch(&self, mip_level: u32) -> usize {
        self.mip_size(mip_level)[0] as usize * self.bytes_per_pixel as usize
    }

    pub fn slice_pitch(&self, mip_level: u32) -> usize {
        self.row_pitch(mip_level) * self.mip_size(mip_level)[1] as usize
    }

    pub fn subresource_size(&self, mip_level: u32) -> usize {
        self.slice_pitch(mip_level) * self.mip_size(mip_level)[2] as usize
    }

    /// Byte offset of `depth_slice` of `subresource` in a buffer holding every
    /// subresource back to back, mip-major within each array slice.
    pub fn buffer_offset(&self, subresource: u32, depth_slice: u32) -> usize {
        let mips = self.mip_levels.max(1);
        let preceding: usize = (0..subresource)
            .map(|s| self.subresource_size(s % mips))
            .sum();
        preceding + depth_slice as usize * self.slice_pitch(subresource % mips)
    }

    /// Size of a buffer holding every subresource.
    pub fn total_size(&self) -> usize {
        self.buffer_offset(self.array_size * self.mip_levels.max(1), 0)
    }
}

struct Shared {
    description: TextureDescription,
    texture_id: TextureId,
    stencil_id: TextureId,
    pixel_buffer: BufferId,
    pixel_buffer_frame: AtomicU64,
    discard_next_map: AtomicBool,
    /// Sampler whose parameters were last written to this texture; `None`
    /// until the first draw samples it.
    bound_sampler: wasm_safe_mutex::Mutex<Option<SamplerState>>,
    debug_name: String,
}

/// A shared texture handle.
///
/// Clones refer to the same GPU texture and compare equal; equality and
/// hashing go by identity, not by description.
#[derive(Clone)]
pub struct Texture {
    shared: Arc<Shared>,
}

impl Texture {
    /// Allocates the texture through the device's creation context.
    pub fn new<D: Driver>(
        device: &GraphicsDevice<D>,
        description: TextureDescription,
        debug_name: &str,
    ) -> Result<Texture, Error> {
        let target = description.target();
        if target == TextureTarget::Texture2DMultisample
            && !device.capabilities().has_multisample_textures
        {
            return Err(Error::MultisampleUnsupported);
        }
        let context = device.use_creation_context();
        let mut gl = context.driver();
        let size = [description.width, description.height, description.depth];
        let texture_id = if target == TextureTarget::Renderbuffer {
            let id = gl.gen_renderbuffer();
            gl.tex_storage(target, 1, size, description.multisample_count);
            id
        } else {
            let id = gl.gen_texture();
            gl.bind_texture(target, id);
            gl.tex_storage(
                target,
                description.mip_levels,
                size,
                description.multisample_count,
            );
            gl.bind_texture(target, TextureId::NONE);
            id
        };
        let stencil_id = if !description.has_stencil {
            TextureId::NONE
        } else if description.packed_depth_stencil {
            texture_id
        } else {
            let id = gl.gen_renderbuffer();
            gl.tex_storage(
                TextureTarget::Renderbuffer,
                1,
                size,
                description.multisample_count,
            );
            id
        };
        let pixel_buffer = if description.usage == ResourceUsage::Staging {
            let id = gl.gen_buffer();
            gl.bind_buffer(BufferTarget::PixelPack, id);
            gl.buffer_data(
                BufferTarget::PixelPack,
                description.total_size(),
                BufferUsageHint::StreamRead,
            );
            gl.bind_buffer(BufferTarget::PixelPack, BufferId::NONE);
            id
        } else {
            BufferId::NONE
        };
        drop(gl);
        drop(context);
        logwise::debuginternal_sync!(
            "created texture {name} as {id}",
            name = logwise::privacy::LogIt(&debug_name),
            id = texture_id.0
        );
        Ok(Texture::assemble(
            description,
            texture_id,
            stencil_id,
            pixel_buffer,
            debug_name,
        ))
    }

    /// Wraps a texture the platform already created, such as the window's
    /// back buffer.
    pub fn from_existing(
        description: TextureDescription,
        texture_id: TextureId,
        debug_name: &str,
    ) -> Texture {
        let stencil_id = if description.has_stencil {
            texture_id
        } else {
            TextureId::NONE
        };
        Texture::assemble(description, texture_id, stencil_id, BufferId::NONE, debug_name)
    }

    fn assemble(
        description: TextureDescription,
        texture_id: TextureId,
        stencil_id: TextureId,
        pixel_buffer: BufferId,
        debug_name: &str,
    ) -> Texture {
        Texture {
            shared: Arc::new(Shared {
                description,
                texture_id,
                stencil_id,
                pixel_buffer,
                pixel_buffer_frame: AtomicU64::new(0),
                discard_next_map: AtomicBool::new(false),
                bound_sampler: wasm_safe_mutex::Mutex::new(None),
                debug_name: debug_name.to_string(),
            }),
        }
    }

    pub fn description(&self) -> &TextureDescription {
        &self.shared.description
    }
    pub fn texture_id(&self) -> TextureId {
        self.shared.texture_id
    }
    /// Equal to [`Self::texture_id`] for packed depth-stencil surfaces.
    pub fn stencil_id(&self) -> TextureId {
        self.shared.stencil_id
    }
    pub fn target(&self) -> TextureTarget {
        self.shared.description.target()
    }
    pub fn width(&self) -> u32 {
        self.shared.description.width
    }
    pub fn height(&self) -> u32 {
        self.shared.description.height
    }
    pub fn mip_levels(&self) -> u32 {
        self.shared.description.mip_levels
    }
    pub fn has_mipmaps(&self) -> bool {
        self.shared.description.mip_levels > 1
    }
    pub fn is_depth_stencil(&self) -> bool {
        self.shared.description.depth_stencil
    }
    pub fn has_stencil(&self) -> bool {
        self.shared.description.has_stencil
    }
    pub fn is_multisample(&self) -> bool {
        self.shared.description.is_multisample()
    }
    pub fn is_renderbuffer(&self) -> bool {
        self.shared.description.is_renderbuffer()
    }
    pub fn usage(&self) -> ResourceUsage {
        self.shared.description.usage
    }
    pub fn debug_name(&self) -> &str {
        &self.shared.debug_name
    }

    pub(crate) fn pixel_buffer(&self) -> BufferId {
        self.shared.pixel_buffer
    }

    /// Frame in which the pixel-pack buffer was last filled.
    pub fn pixel_buffer_frame(&self) -> u64 {
        self.shared.pixel_buffer_frame.load(Ordering::Acquire)
    }

    pub(crate) fn set_pixel_buffer_frame(&self, frame: u64) {
        self.shared.pixel_buffer_frame.store(frame, Ordering::Release);
    }

    /// The next `WriteNoOverwrite` map is upgraded to `WriteDiscard`.
    ///
    /// Used by allocators that recycle a resource and want a rename instead of
    /// a GPU sync point.
    pub fn tag_discard_next_map(&self) {
        self.shared.discard_next_map.store(true, Ordering::Release);
    }

    pub(crate) fn take_discard_next_map(&self) -> bool {
        self.shared.discard_next_map.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn bound_sampler(&self) -> Option<SamplerState> {
        self.shared.bound_sampler.lock_sync().clone()
    }

    pub(crate) fn set_bound_sampler(&self, sampler: Option<SamplerState>) {
        *self.shared.bound_sampler.lock_sync() = sampler;
    }
}

impl PartialEq for Texture {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}
impl Eq for Texture {}

impl Hash for Texture {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.shared).hash(state);
    }
}

impl Debug for Texture {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("name", &self.shared.debug_name)
            .field("id", &self.shared.texture_id)
            .field("target", &self.target())
            .finish()
    }
}
