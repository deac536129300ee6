// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
CPU access to buffers and textures.

Buffers map in place.  Textures can't, so they go through a pixel buffer:

* `Staging` textures own a pixel-pack buffer that copies into them fill.  It
  may be read once the GPU has caught up, which is assumed to take
  [`READBACK_FRAME_DELAY`] frames; a non-blocking read before that reports
  [`Mapped::NotReady`] instead of stalling.
* `Dynamic` textures are written through a pixel-unpack buffer created for
  each map and uploaded into the texture on unmap.

Buffers are mapped at the copy-write target so that no binding the mirror
tracks is disturbed.
*/

use super::CommandList;
use crate::driver::{BufferId, BufferTarget, BufferUsageHint, Driver, TextureId, TextureTarget};
use crate::resources::{Buffer, MapMode, ResourceUsage, Texture, TextureDescription};
use crate::{Error, READBACK_FRAME_DELAY};
use std::ptr::NonNull;

/// Anything a command list can map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GraphicsResource {
    Buffer(Buffer),
    Texture(Texture),
}

impl From<Buffer> for GraphicsResource {
    fn from(buffer: Buffer) -> Self {
        GraphicsResource::Buffer(buffer)
    }
}

impl From<Texture> for GraphicsResource {
    fn from(texture: Texture) -> Self {
        GraphicsResource::Texture(texture)
    }
}

/// A live mapping.  Hand it back to [`CommandList::unmap_subresource`].
#[derive(Debug)]
#[must_use = "a mapping must be unmapped"]
pub struct MappedResource {
    resource: GraphicsResource,
    subresource: u32,
    data: Option<NonNull<u8>>,
    offset: usize,
    length: usize,
    row_pitch: usize,
    slice_pitch: usize,
    /// Upload buffer of a `Dynamic` texture map.
    upload_buffer: BufferId,
}

impl MappedResource {
    pub fn resource(&self) -> &GraphicsResource {
        &self.resource
    }
    pub fn subresource(&self) -> u32 {
        self.subresource
    }
    /// `None` when the driver failed to map.
    pub fn data(&self) -> Option<NonNull<u8>> {
        self.data
    }
    pub fn offset(&self) -> usize {
        self.offset
    }
    pub fn length(&self) -> usize {
        self.length
    }
    /// Zero for buffers.
    pub fn row_pitch(&self) -> usize {
        self.row_pitch
    }
    /// Zero for buffers.
    pub fn slice_pitch(&self) -> usize {
        self.slice_pitch
    }
}

/// Outcome of a map.
#[derive(Debug)]
#[must_use]
pub enum Mapped {
    Ready(MappedResource),
    /// A non-blocking readback whose data hasn't arrived yet.  Nothing was
    /// mapped; try again in a later frame.
    NotReady,
}

impl Mapped {
    pub fn is_ready(&self) -> bool {
        matches!(self, Mapped::Ready(_))
    }
}

const MAP_TARGET: BufferTarget = BufferTarget::CopyWrite;

/// Where an upload of `subresource` lands: target, offset and extent.
fn upload_region(
    description: &TextureDescription,
    subresource: u32,
) -> Result<(TextureTarget, [u32; 3], [u32; 3]), Error> {
    let mips = description.mip_levels.max(1);
    let mip = subresource % mips;
    let slice = subresource / mips;
    let [width, height, depth] = description.mip_size(mip);
    match description.target() {
        TextureTarget::Texture1D => Ok((TextureTarget::Texture1D, [0, 0, 0], [width, 1, 1])),
        TextureTarget::Texture2D => Ok((TextureTarget::Texture2D, [0, 0, 0], [width, height, 1])),
        TextureTarget::Texture2DArray => Ok((
            TextureTarget::Texture2DArray,
            [0, 0, slice],
            [width, height, 1],
        )),
        TextureTarget::Texture3D => Ok((TextureTarget::Texture3D, [0, 0, 0], [width, height, depth])),
        TextureTarget::TextureCubeMap => Ok((
            TextureTarget::CubeMapFace(slice as u8),
            [0, 0, 0],
            [width, height, 1],
        )),
        other => {
            logwise::error_sync!(
                "can't upload into a {target} texture",
                target = logwise::privacy::LogIt(&other)
            );
            Err(Error::UnsupportedTextureTarget(other))
        }
    }
}

impl<D: Driver> CommandList<D> {
    /// Maps one subresource for CPU access.
    ///
    /// `length` of zero maps to the end of the buffer or the whole
    /// subresource.  With `do_not_wait`, writes skip synchronization and
    /// staging reads that aren't ready yet return [`Mapped::NotReady`].
    pub fn map_subresource(
        &mut self,
        resource: &GraphicsResource,
        subresource: u32,
        mode: MapMode,
        do_not_wait: bool,
        offset: usize,
        length: usize,
    ) -> Result<Mapped, Error> {
        #[cfg(debug_assertions)]
        self.device.ensure_context_active();
        match resource {
            GraphicsResource::Buffer(buffer) => {
                Ok(self.map_buffer(buffer, mode, do_not_wait, offset, length))
            }
            GraphicsResource::Texture(texture) => {
                self.map_texture(texture, subresource, mode, do_not_wait, offset, length)
            }
        }
    }

    fn map_buffer(
        &mut self,
        buffer: &Buffer,
        mut mode: MapMode,
        mut do_not_wait: bool,
        offset: usize,
        length: usize,
    ) -> Mapped {
        if mode == MapMode::WriteNoOverwrite && buffer.take_discard_next_map() {
            mode = MapMode::WriteDiscard;
        }
        let length = if length == 0 {
            buffer.size().saturating_sub(offset)
        } else {
            length
        };
        let mut gl = self.device.primary();
        gl.bind_buffer(MAP_TARGET, buffer.buffer_id());
        if mode == MapMode::WriteDiscard {
            //orphan: the GPU keeps the old storage, we get fresh storage
            gl.buffer_data(MAP_TARGET, buffer.size(), buffer.usage_hint());
            do_not_wait = true;
        }
        let data = gl.map_buffer_range(MAP_TARGET, offset, length, mode.access(do_not_wait));
        if data.is_none() {
            logwise::warn_sync!(
                "driver failed to map buffer {name}",
                name = logwise::privacy::LogIt(&buffer.debug_name())
            );
        }
        Mapped::Ready(MappedResource {
            resource: GraphicsResource::Buffer(buffer.clone()),
            subresource: 0,
            data,
            offset,
            length,
            row_pitch: 0,
            slice_pitch: 0,
            upload_buffer: BufferId::NONE,
        })
    }

    fn map_texture(
        &mut self,
        texture: &Texture,
        subresource: u32,
        mut mode: MapMode,
        do_not_wait: bool,
        offset: usize,
        length: usize,
    ) -> Result<Mapped, Error> {
        if mode == MapMode::WriteNoOverwrite && texture.take_discard_next_map() {
            mode = MapMode::WriteDiscard;
        }
        let description = texture.description();
        let mip = subresource % description.mip_levels.max(1);
        let length = if length == 0 {
            description.subresource_size(mip)
        } else {
            length
        };
        let unmappable = || {
            logwise::error_sync!(
                "texture {name} can't be mapped this way",
                name = logwise::privacy::LogIt(&texture.debug_name())
            );
            Error::UnmappableTexture {
                usage: texture.usage(),
                mode,
            }
        };

        let (target, buffer, buffer_offset) = match (mode, texture.usage()) {
            (MapMode::Read, ResourceUsage::Staging) => {
                let ready_at = texture.pixel_buffer_frame() + READBACK_FRAME_DELAY;
                if do_not_wait && self.device.frame_counter() < ready_at {
                    logwise::trace_sync!(
                        "readback of {name} not ready until frame {frame}",
                        name = logwise::privacy::LogIt(&texture.debug_name()),
                        frame = ready_at
                    );
                    return Ok(Mapped::NotReady);
                }
                (
                    BufferTarget::PixelPack,
                    texture.pixel_buffer(),
                    description.buffer_offset(subresource, 0) + offset,
                )
            }
            (MapMode::WriteDiscard, ResourceUsage::Dynamic) => {
                upload_region(description, subresource)?;
                let mut gl = self.device.primary();
                let upload = gl.gen_buffer();
                gl.bind_buffer(BufferTarget::PixelUnpack, upload);
                gl.buffer_data(
                    BufferTarget::PixelUnpack,
                    description.subresource_size(mip),
                    BufferUsageHint::DynamicCopy,
                );
                gl.bind_buffer(BufferTarget::PixelUnpack, BufferId::NONE);
                (BufferTarget::PixelUnpack, upload, offset)
            }
            _ => return Err(unmappable()),
        };

        let mut gl = self.device.primary();
        gl.bind_buffer(target, buffer);
        let data = gl.map_buffer_range(target, buffer_offset, length, mode.access(false));
        gl.bind_buffer(target, BufferId::NONE);
        Ok(Mapped::Ready(MappedResource {
            resource: GraphicsResource::Texture(texture.clone()),
            subresource,
            data,
            offset,
            length,
            row_pitch: description.row_pitch(mip),
            slice_pitch: description.slice_pitch(mip),
            upload_buffer: if target == BufferTarget::PixelUnpack {
                buffer
            } else {
                BufferId::NONE
            },
        }))
    }

    /// Ends a mapping.  A `Dynamic` texture's data is uploaded now.
    pub fn unmap_subresource(&mut self, mapped: MappedResource) -> Result<(), Error> {
        #[cfg(debug_assertions)]
        self.device.ensure_context_active();
        let mut gl = self.device.primary();
        match &mapped.resource {
            GraphicsResource::Buffer(buffer) => {
                gl.bind_buffer(MAP_TARGET, buffer.buffer_id());
                gl.unmap_buffer(MAP_TARGET);
            }
            GraphicsResource::Texture(texture) if mapped.upload_buffer == BufferId::NONE => {
                gl.bind_buffer(BufferTarget::PixelPack, texture.pixel_buffer());
                gl.unmap_buffer(BufferTarget::PixelPack);
                gl.bind_buffer(BufferTarget::PixelPack, BufferId::NONE);
            }
            GraphicsResource::Texture(texture) => {
                let (upload_target, offset, size) =
                    upload_region(texture.description(), mapped.subresource)?;
                let mip = mapped.subresource % texture.mip_levels().max(1);
                gl.bind_buffer(BufferTarget::PixelUnpack, mapped.upload_buffer);
                gl.unmap_buffer(BufferTarget::PixelUnpack);

                self.bound.activate_unit(&mut *gl, 0);
                gl.bind_texture(texture.target(), texture.texture_id());
                gl.tex_sub_image(upload_target, mip, offset, size);
                gl.bind_texture(texture.target(), TextureId::NONE);
                self.bound.bound_textures[0] = None;

                gl.bind_buffer(BufferTarget::PixelUnpack, BufferId::NONE);
                gl.delete_buffer(mapped.upload_buffer);
            }
        }
        Ok(())
    }
}
