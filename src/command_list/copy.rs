// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Texture-to-texture copies.
//!
//! Three paths exist: staging to staging copies pixel buffers directly, GPU to
//! staging reads pixels into the destination's pixel-pack buffer, and GPU to
//! GPU copies from a scratch framebuffer into the bound destination texture.

use super::CommandList;
use crate::Error;
use crate::driver::{
    BufferId, BufferTarget, Driver, Rectangle, TextureId, TextureTarget, Viewport,
};
use crate::framebuffer::{self, FboTexture};
use crate::resources::{ResourceUsage, Texture, TextureDescription};

/// A box within one subresource.  Right, bottom and back are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ResourceRegion {
    pub left: u32,
    pub top: u32,
    pub front: u32,
    pub right: u32,
    pub bottom: u32,
    pub back: u32,
}

impl ResourceRegion {
    /// All of mip level `mip`.
    pub fn full(description: &TextureDescription, mip: u32) -> Self {
        let [right, bottom, back] = description.mip_size(mip);
        ResourceRegion {
            left: 0,
            top: 0,
            front: 0,
            right,
            bottom,
            back,
        }
    }

    fn rectangle(&self) -> Rectangle {
        Rectangle {
            x: self.left as i32,
            y: self.top as i32,
            width: self.right.saturating_sub(self.left) as i32,
            height: self.bottom.saturating_sub(self.top) as i32,
        }
    }
}

impl<D: Driver> CommandList<D> {
    /// Copies every subresource of `source` into the same subresource of
    /// `destination`.
    pub fn copy(&mut self, source: &Texture, destination: &Texture) -> Result<(), Error> {
        let count = source.description().array_size * source.mip_levels().max(1);
        for subresource in 0..count {
            self.copy_region(source, subresource, None, destination, subresource, [0, 0, 0])?;
        }
        Ok(())
    }

    /// Copies `region` of one subresource (all of it when `None`) to
    /// `destination_offset` in another.
    pub fn copy_region(
        &mut self,
        source: &Texture,
        source_subresource: u32,
        region: Option<ResourceRegion>,
        destination: &Texture,
        destination_subresource: u32,
        destination_offset: [u32; 3],
    ) -> Result<(), Error> {
        #[cfg(debug_assertions)]
        self.device.ensure_context_active();
        let source_mip = source_subresource % source.mip_levels().max(1);
        let full = ResourceRegion::full(source.description(), source_mip);
        let region = region.unwrap_or(full);
        let unsupported = || {
            logwise::error_sync!(
                "unsupported copy from {from} into {to}",
                from = logwise::privacy::LogIt(&source.debug_name()),
                to = logwise::privacy::LogIt(&destination.debug_name())
            );
            Error::UnsupportedCopy {
                from: source.usage(),
                to: destination.usage(),
            }
        };

        match (source.usage(), destination.usage()) {
            (ResourceUsage::Staging, ResourceUsage::Staging) => {
                if region != full || destination_offset != [0, 0, 0] {
                    return Err(unsupported());
                }
                self.copy_staging(source, source_subresource, destination, destination_subresource);
                Ok(())
            }
            (ResourceUsage::Staging, _) => Err(unsupported()),
            (_, ResourceUsage::Staging) => {
                if destination_offset != [0, 0, 0] {
                    return Err(unsupported());
                }
                self.read_back(source, source_subresource, region, destination, destination_subresource)
            }
            _ => self.copy_on_gpu(
                source,
                source_subresource,
                region,
                destination,
                destination_subresource,
                destination_offset,
            ),
        }
    }

    fn copy_staging(
        &mut self,
        source: &Texture,
        source_subresource: u32,
        destination: &Texture,
        destination_subresource: u32,
    ) {
        let destination_mip = destination_subresource % destination.mip_levels().max(1);
        let mut gl = self.device.primary();
        gl.bind_buffer(BufferTarget::CopyRead, source.pixel_buffer());
        gl.bind_buffer(BufferTarget::CopyWrite, destination.pixel_buffer());
        gl.copy_buffer_sub_data(
            source.description().buffer_offset(source_subresource, 0),
            destination.description().buffer_offset(destination_subresource, 0),
            destination.description().subresource_size(destination_mip),
        );
        destination.set_pixel_buffer_frame(source.pixel_buffer_frame());
    }

    fn read_back(
        &mut self,
        source: &Texture,
        source_subresource: u32,
        region: ResourceRegion,
        destination: &Texture,
        destination_subresource: u32,
    ) -> Result<(), Error> {
        let mut gl = self.device.primary();
        let scratch = *self
            .copy_framebuffer
            .get_or_insert_with(|| gl.gen_framebuffer());
        let mut attached = FboTexture::from_subresource(source, source_subresource);
        let base_slice = attached.array_slice;
        let [width, height, _] = source.description().mip_size(attached.mip_level);

        gl.viewport_array(0, &[Viewport::new(0.0, 0.0, width as f32, height as f32)]);
        gl.bind_framebuffer(scratch);
        let mut result = Ok(());
        for depth_slice in region.front..region.back.max(region.front + 1) {
            attached.array_slice = base_slice + depth_slice;
            let attachment = match framebuffer::attach_source(&mut *gl, &attached) {
                Ok(attachment) => attachment,
                Err(e) => {
                    result = Err(e);
                    break;
                }
            };
            gl.bind_buffer(BufferTarget::PixelPack, destination.pixel_buffer());
            gl.read_pixels(
                region.rectangle(),
                destination
                    .description()
                    .buffer_offset(destination_subresource, depth_slice - region.front),
            );
            gl.bind_buffer(BufferTarget::PixelPack, BufferId::NONE);
            framebuffer::detach(&mut *gl, attachment);
        }
        destination.set_pixel_buffer_frame(self.device.frame_counter());
        gl.bind_framebuffer(self.bound.bound_framebuffer);
        //the next draw restores the caller's viewports, or the window's
        self.bound.viewports_dirty = true;
        result
    }

    fn copy_on_gpu(
        &mut self,
        source: &Texture,
        source_subresource: u32,
        region: ResourceRegion,
        destination: &Texture,
        destination_subresource: u32,
        destination_offset: [u32; 3],
    ) -> Result<(), Error> {
        let destination_mips = destination.mip_levels().max(1);
        let destination_mip = destination_subresource % destination_mips;
        let destination_slice = destination_subresource / destination_mips;
        let upload_target = match destination.target() {
            TextureTarget::TextureCubeMap => TextureTarget::CubeMapFace(destination_slice as u8),
            target @ (TextureTarget::Texture1D
            | TextureTarget::Texture2D
            | TextureTarget::Texture2DArray
            | TextureTarget::Texture3D) => target,
            other => {
                logwise::error_sync!(
                    "can't copy into a {target} texture",
                    target = logwise::privacy::LogIt(&other)
                );
                return Err(Error::UnsupportedTextureTarget(other));
            }
        };

        let mut gl = self.device.primary();
        let scratch = *self
            .copy_framebuffer
            .get_or_insert_with(|| gl.gen_framebuffer());
        let mut attached = FboTexture::from_subresource(source, source_subresource);
        let base_slice = attached.array_slice;
        let [width, height, _] = source.description().mip_size(attached.mip_level);

        gl.bind_framebuffer(scratch);
        self.bound.activate_unit(&mut *gl, 0);
        gl.viewport_array(0, &[Viewport::new(0.0, 0.0, width as f32, height as f32)]);
        gl.bind_texture(destination.target(), destination.texture_id());
        let mut result = Ok(());
        for depth_slice in region.front..region.back.max(region.front + 1) {
            attached.array_slice = base_slice + depth_slice;
            let attachment = match framebuffer::attach_source(&mut *gl, &attached) {
                Ok(attachment) => attachment,
                Err(e) => {
                    result = Err(e);
                    break;
                }
            };
            let [x, y, z] = destination_offset;
            let layer = match destination.target() {
                TextureTarget::Texture2DArray => destination_slice,
                TextureTarget::Texture3D => z + depth_slice - region.front,
                _ => 0,
            };
            gl.copy_tex_sub_image(upload_target, destination_mip, [x, y, layer], region.rectangle());
            framebuffer::detach(&mut *gl, attachment);
        }
        gl.bind_texture(destination.target(), TextureId::NONE);
        self.bound.bound_textures[0] = None;
        gl.bind_framebuffer(self.bound.bound_framebuffer);
        self.bound.viewports_dirty = true;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceConfig, GraphicsDevice};
    use crate::driver::{Attachment, FramebufferId};
    use crate::imp::{Call, CallLog, RecordingDriver};

    fn list() -> (CommandList<RecordingDriver>, CallLog) {
        let primary = RecordingDriver::new();
        let log = primary.log();
        let device = GraphicsDevice::new(primary, RecordingDriver::new(), DeviceConfig::default());
        device.begin();
        let list = CommandList::new(&device).unwrap();
        log.clear();
        (list, log)
    }

    fn texture(id: u32, usage: ResourceUsage) -> Texture {
        Texture::from_existing(
            TextureDescription::render_target(8, 8).with_usage(usage),
            TextureId(id),
            "copy",
        )
    }

    #[test]
    fn staging_source_into_gpu_texture_is_rejected() {
        let (mut list, log) = list();
        let err = list
            .copy(&texture(1, ResourceUsage::Staging), &texture(2, ResourceUsage::Default))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedCopy {
                from: ResourceUsage::Staging,
                to: ResourceUsage::Default
            }
        ));
        assert!(log.is_empty());
    }

    #[test]
    fn readback_stamps_the_frame_and_restores_framebuffer() {
        let (mut list, log) = list();
        let frame = list.device().frame_counter();
        let source = texture(1, ResourceUsage::Default);
        let destination = texture(2, ResourceUsage::Staging);
        list.copy(&source, &destination).unwrap();
        assert_eq!(destination.pixel_buffer_frame(), frame);

        let calls = log.take();
        let scratch = match calls.iter().find_map(|c| match c {
            Call::GenFramebuffer(id) => Some(*id),
            _ => None,
        }) {
            Some(id) => id,
            None => panic!("no scratch framebuffer"),
        };
        assert!(calls.contains(&Call::BindFramebuffer(scratch)));
        assert!(calls.contains(&Call::FramebufferTexture2D(
            Attachment::Color(0),
            TextureTarget::Texture2D,
            TextureId(1),
            0
        )));
        assert!(calls.contains(&Call::ReadPixels(
            Rectangle {
                x: 0,
                y: 0,
                width: 8,
                height: 8
            },
            0
        )));
        assert_eq!(calls.last(), Some(&Call::BindFramebuffer(FramebufferId::WINDOW)));
        assert!(calls.contains(&Call::BindBuffer(BufferTarget::PixelPack, BufferId::NONE)));
    }

    #[test]
    fn gpu_copy_forgets_unit_zero() {
        let (mut list, log) = list();
        list.copy_region(
            &texture(1, ResourceUsage::Default),
            0,
            Some(ResourceRegion {
                left: 2,
                top: 2,
                front: 0,
                right: 6,
                bottom: 4,
                back: 1,
            }),
            &texture(2, ResourceUsage::Default),
            0,
            [1, 1, 0],
        )
        .unwrap();
        assert!(log.calls().contains(&Call::CopyTexSubImage(
            TextureTarget::Texture2D,
            0,
            [1, 1, 0],
            Rectangle {
                x: 2,
                y: 2,
                width: 4,
                height: 2
            }
        )));
        assert!(list.bound_state().bound_texture(0).is_none());
    }
}
