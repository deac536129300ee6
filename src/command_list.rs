// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The command list: the only way draws reach the primary context.

Setters record what the caller wants in the [`BoundState`] mirror and touch
the driver only where a binding can't wait (index buffers, constant buffers,
render targets, scissors).  Everything else is flushed by the pre-draw pass,
which compares the mirror against the pending pipeline and emits only the
difference.  Drawing the same thing twice therefore costs two draw calls and
nothing else.

A device supports exactly one command list at a time, since two mirrors of one
context would disagree.
*/

mod copy;
mod map;
mod mirror;
mod pre_draw;

pub use copy::ResourceRegion;
pub use map::{GraphicsResource, Mapped, MappedResource};
pub use mirror::BoundState;

use crate::device::GraphicsDevice;
use crate::driver::{
    BufferId, BufferTarget, ClearMask, ColorWriteChannels, Driver, FramebufferId, IndexType,
    Rectangle, Viewport,
};
use crate::framebuffer::FboTexture;
use crate::pipeline::{DescriptorSet, PipelineState};
use crate::resources::{Buffer, SamplerState, Texture};
use crate::{Error, MAX_BOUND_RENDER_TARGETS, MAX_VIEWPORTS};
use mirror::{IndexBufferView, VertexBufferView, bind_constant_buffer};
use std::sync::Arc;

pub struct CommandList<D: Driver> {
    device: Arc<GraphicsDevice<D>>,
    bound: BoundState,
    /// Scratch framebuffer for copies, created on first use.
    copy_framebuffer: Option<FramebufferId>,
}

impl<D: Driver> CommandList<D> {
    /// Creates the device's command list and resets the context to defaults.
    ///
    /// Fails with [`Error::MultipleCommandLists`] while another one is alive.
    pub fn new(device: &Arc<GraphicsDevice<D>>) -> Result<Self, Error> {
        device.claim_command_list()?;
        let mut list = CommandList {
            device: device.clone(),
            bound: BoundState::new(device.default_pipeline()),
            copy_framebuffer: None,
        };
        list.clear_state();
        logwise::info_sync!("command list created");
        Ok(list)
    }

    pub fn device(&self) -> &Arc<GraphicsDevice<D>> {
        &self.device
    }

    pub fn bound_state(&self) -> &BoundState {
        &self.bound
    }

    /// Unbinds shader resources and samplers and restores default
    /// fixed-function state.
    pub fn clear_state(&mut self) {
        let mut gl = self.device.primary();
        self.bound.clear_state(&self.device, &mut *gl);
    }

    /// Pipeline for the next draw.  `None` selects the device default.
    pub fn set_pipeline_state(&mut self, pipeline: Option<&Arc<PipelineState>>) {
        self.bound.pending_pipeline = pipeline
            .unwrap_or_else(|| self.device.default_pipeline())
            .clone();
    }

    /// # Panics
    /// If `slot` is not below [`crate::MAX_VERTEX_BUFFERS`].
    pub fn set_vertex_buffer(&mut self, slot: u32, buffer: Option<&Buffer>, offset: usize, stride: u32) {
        let view = VertexBufferView {
            buffer: buffer.cloned(),
            offset,
            stride,
        };
        let current = &mut self.bound.vertex_buffers[slot as usize];
        if *current != view {
            *current = view;
            self.bound.vertex_buffers_dirty = true;
        }
    }

    pub fn set_index_buffer(&mut self, buffer: Option<&Buffer>, offset: usize, index_type: IndexType) {
        let bound = self.bound.index_buffer.as_ref().map(|view| &view.buffer);
        if bound != buffer {
            let id = buffer.map_or(BufferId::NONE, Buffer::buffer_id);
            self.device.primary().bind_buffer(BufferTarget::ElementArray, id);
        }
        self.bound.index_buffer = buffer.map(|buffer| IndexBufferView {
            buffer: buffer.clone(),
            offset,
            index_type,
        });
    }

    /// Binds a constant buffer at once.
    pub fn set_constant_buffer(&mut self, slot: u32, buffer: Option<&Buffer>) {
        #[cfg(debug_assertions)]
        self.device.ensure_context_active();
        let mut gl = self.device.primary();
        bind_constant_buffer(&mut *gl, &mut self.bound.constant_buffers, slot, buffer);
    }

    pub fn set_shader_resource_view(&mut self, slot: u32, texture: Option<&Texture>) {
        self.bound.shader_resource_views[slot as usize] = texture.cloned();
    }

    pub fn set_sampler_state(&mut self, slot: u32, sampler: Option<&SamplerState>) {
        self.bound.sampler_states[slot as usize] = sampler.cloned();
    }

    /// Replaces descriptor sets `first..first + sets.len()`.
    pub fn set_descriptor_sets(&mut self, first: u32, sets: &[Option<DescriptorSet>]) {
        let first = first as usize;
        self.bound.descriptor_sets[first..first + sets.len()].clone_from_slice(sets);
    }

    pub fn set_stencil_reference(&mut self, reference: i32) {
        self.bound.stencil_reference = reference;
    }

    pub fn set_blend_factor(&mut self, factor: [f32; 4]) {
        self.bound.blend_factor = factor;
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.set_viewports(&[viewport]);
    }

    /// Applied by the next draw.
    ///
    /// # Panics
    /// With more than [`MAX_VIEWPORTS`] viewports.
    pub fn set_viewports(&mut self, viewports: &[Viewport]) {
        assert!(
            viewports.len() <= MAX_VIEWPORTS,
            "{count} viewports exceeds the limit of {MAX_VIEWPORTS}",
            count = viewports.len()
        );
        if self.bound.viewports != viewports {
            self.bound.viewports = viewports.to_vec();
            self.bound.viewports_dirty = true;
        }
    }

    pub fn set_scissor_rectangle(&mut self, rectangle: Rectangle) {
        self.set_scissor_rectangles(&[rectangle]);
    }

    /// Applied at once.
    pub fn set_scissor_rectangles(&mut self, rectangles: &[Rectangle]) {
        if self.bound.scissors != rectangles {
            self.device.primary().scissor_array(0, rectangles);
            self.bound.scissors = rectangles.to_vec();
        }
    }

    /// Binds the framebuffer for `render_targets` and `depth_stencil`,
    /// creating it on first use.
    ///
    /// All targets must match the first one's size.  With neither targets nor
    /// depth buffer, or with only the window's texture, the window is bound.
    pub fn set_render_targets(
        &mut self,
        depth_stencil: Option<&Texture>,
        render_targets: &[&Texture],
    ) -> Result<(), Error> {
        if render_targets.len() > MAX_BOUND_RENDER_TARGETS {
            logwise::error_sync!(
                "{count} render targets bound at once",
                count = render_targets.len()
            );
            return Err(Error::TooManyRenderTargets {
                count: render_targets.len(),
                limit: MAX_BOUND_RENDER_TARGETS,
            });
        }
        if let Some(first) = render_targets.first() {
            let expected = (first.width(), first.height());
            for (index, target) in render_targets.iter().enumerate().skip(1) {
                let actual = (target.width(), target.height());
                if actual != expected {
                    return Err(Error::MismatchedTargetSize {
                        index,
                        expected,
                        actual,
                    });
                }
            }
            if let Some(depth) = depth_stencil {
                let actual = (depth.width(), depth.height());
                if actual != expected {
                    return Err(Error::MismatchedDepthSize { expected, actual });
                }
            }
        }

        let colors: Vec<FboTexture> = render_targets.iter().map(|t| FboTexture::new(t)).collect();
        let depth = depth_stencil.map(FboTexture::new);
        let mut gl = self.device.primary();
        let framebuffer = match self
            .device
            .framebuffers()
            .find_or_create(&mut *gl, depth.as_ref(), &colors)
        {
            Ok(framebuffer) => framebuffer,
            Err(e) => {
                //a failed creation may have left its own framebuffer bound
                if !matches!(e, Error::WindowTargetWithDepth) {
                    gl.bind_framebuffer(self.bound.bound_framebuffer);
                }
                return Err(e);
            }
        };
        self.bound.bind_framebuffer(&mut *gl, framebuffer);
        self.bound.render_targets = render_targets.iter().map(|t| (*t).clone()).collect();
        self.bound.depth_stencil_buffer = depth_stencil.cloned();
        Ok(())
    }

    /// Binds the window's framebuffer.
    pub fn reset_targets(&mut self) {
        let mut gl = self.device.primary();
        self.bound.bind_framebuffer(&mut *gl, FramebufferId::WINDOW);
        self.bound.render_targets.clear();
        self.bound.depth_stencil_buffer = None;
    }

    /// Binds the framebuffer holding `texture` for an out-of-band clear and
    /// returns it.  The caller rebinds the mirror's framebuffer afterwards.
    fn bind_for_clear(&mut self, gl: &mut D, texture: &Texture) -> Result<FramebufferId, Error> {
        let framebuffer = match self
            .device
            .framebuffers()
            .find_or_create_single(gl, &FboTexture::new(texture))
        {
            Ok(framebuffer) => framebuffer,
            Err(e) => {
                gl.bind_framebuffer(self.bound.bound_framebuffer);
                return Err(e);
            }
        };
        if framebuffer != self.bound.bound_framebuffer {
            gl.bind_framebuffer(framebuffer);
        }
        Ok(framebuffer)
    }

    /// Clears `depth_stencil`; `None` leaves that aspect alone.
    ///
    /// Depth writes are switched on around the clear if the current state has
    /// them off.
    pub fn clear_depth_stencil(
        &mut self,
        depth_stencil: &Texture,
        depth: Option<f32>,
        stencil: Option<u8>,
    ) -> Result<(), Error> {
        #[cfg(debug_assertions)]
        self.device.ensure_context_active();
        let device = self.device.clone();
        let mut gl = device.primary();
        let framebuffer = self.bind_for_clear(&mut gl, depth_stencil)?;
        if let Some(depth) = depth {
            gl.clear_depth(depth);
        }
        if let Some(stencil) = stencil {
            gl.clear_stencil(stencil);
        }
        let force_depth_write = depth.is_some() && !self.bound.depth_stencil.depth_write;
        if force_depth_write {
            gl.depth_mask(true);
        }
        gl.clear(ClearMask {
            color: false,
            depth: depth.is_some(),
            stencil: stencil.is_some(),
        });
        if force_depth_write {
            gl.depth_mask(false);
        }
        if framebuffer != self.bound.bound_framebuffer {
            gl.bind_framebuffer(self.bound.bound_framebuffer);
        }
        Ok(())
    }

    /// Clears `render_target` to `color`, ignoring the current write mask.
    pub fn clear_render_target(&mut self, render_target: &Texture, color: [f32; 4]) -> Result<(), Error> {
        #[cfg(debug_assertions)]
        self.device.ensure_context_active();
        let device = self.device.clone();
        let mut gl = device.primary();
        let framebuffer = self.bind_for_clear(&mut gl, render_target)?;
        let blend = self.bound.current_pipeline.blend();
        let masked = blend.write_mask() != ColorWriteChannels::ALL;
        if masked {
            gl.color_mask(ColorWriteChannels::ALL);
        }
        gl.clear_color(color);
        gl.clear(ClearMask {
            color: true,
            depth: false,
            stencil: false,
        });
        if masked {
            blend.restore_color_mask(&mut *gl);
        }
        if framebuffer != self.bound.bound_framebuffer {
            gl.bind_framebuffer(self.bound.bound_framebuffer);
        }
        Ok(())
    }

    pub fn draw(&mut self, vertex_count: u32, start_vertex: u32) {
        #[cfg(debug_assertions)]
        self.device.ensure_context_active();
        let mut gl = self.device.primary();
        self.bound.pre_draw(&self.device, &mut *gl);
        gl.draw_arrays(
            self.bound.current_pipeline.primitive_type(),
            start_vertex,
            vertex_count,
        );
        drop(gl);
        self.device.record_draw(u64::from(vertex_count));
    }

    pub fn draw_instanced(
        &mut self,
        vertex_count_per_instance: u32,
        instance_count: u32,
        start_vertex: u32,
    ) {
        #[cfg(debug_assertions)]
        self.device.ensure_context_active();
        let mut gl = self.device.primary();
        self.bound.pre_draw(&self.device, &mut *gl);
        gl.draw_arrays_instanced(
            self.bound.current_pipeline.primitive_type(),
            start_vertex,
            vertex_count_per_instance,
            instance_count,
        );
        drop(gl);
        self.device
            .record_draw(u64::from(vertex_count_per_instance) * u64::from(instance_count));
    }

    /// Index type and byte offset of `start_index` in the bound index buffer.
    ///
    /// # Panics
    /// Without an index buffer.
    fn index_location(&self, start_index: u32) -> (IndexType, usize) {
        let Some(view) = &self.bound.index_buffer else {
            panic!("indexed draw without an index buffer; call set_index_buffer first");
        };
        let offset = view.offset + start_index as usize * view.index_type.element_size();
        (view.index_type, offset)
    }

    pub fn draw_indexed(&mut self, index_count: u32, start_index: u32, base_vertex: i32) {
        #[cfg(debug_assertions)]
        self.device.ensure_context_active();
        let (index_type, offset) = self.index_location(start_index);
        let mut gl = self.device.primary();
        self.bound.pre_draw(&self.device, &mut *gl);
        gl.draw_elements_base_vertex(
            self.bound.current_pipeline.primitive_type(),
            index_count,
            index_type,
            offset,
            base_vertex,
        );
        drop(gl);
        self.device.record_draw(u64::from(index_count));
    }

    pub fn draw_indexed_instanced(
        &mut self,
        index_count_per_instance: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
    ) {
        #[cfg(debug_assertions)]
        self.device.ensure_context_active();
        let (index_type, offset) = self.index_location(start_index);
        let mut gl = self.device.primary();
        self.bound.pre_draw(&self.device, &mut *gl);
        gl.draw_elements_instanced_base_vertex(
            self.bound.current_pipeline.primitive_type(),
            index_count_per_instance,
            index_type,
            offset,
            instance_count,
            base_vertex,
        );
        drop(gl);
        self.device
            .record_draw(u64::from(index_count_per_instance) * u64::from(instance_count));
    }

    /// Draw arguments are read from `arguments` at `offset`.
    pub fn draw_instanced_indirect(&mut self, arguments: &Buffer, offset: usize) {
        #[cfg(debug_assertions)]
        self.device.ensure_context_active();
        let mut gl = self.device.primary();
        self.bound.pre_draw(&self.device, &mut *gl);
        gl.bind_buffer(BufferTarget::DrawIndirect, arguments.buffer_id());
        gl.draw_arrays_indirect(self.bound.current_pipeline.primitive_type(), offset);
        gl.bind_buffer(BufferTarget::DrawIndirect, BufferId::NONE);
        drop(gl);
        self.device.record_draw(0);
    }

    pub fn draw_indexed_instanced_indirect(&mut self, arguments: &Buffer, offset: usize) {
        #[cfg(debug_assertions)]
        self.device.ensure_context_active();
        let (index_type, _) = self.index_location(0);
        let mut gl = self.device.primary();
        self.bound.pre_draw(&self.device, &mut *gl);
        gl.bind_buffer(BufferTarget::DrawIndirect, arguments.buffer_id());
        gl.draw_elements_indirect(
            self.bound.current_pipeline.primitive_type(),
            index_type,
            offset,
        );
        gl.bind_buffer(BufferTarget::DrawIndirect, BufferId::NONE);
        drop(gl);
        self.device.record_draw(0);
    }

    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        #[cfg(debug_assertions)]
        self.device.ensure_context_active();
        let mut gl = self.device.primary();
        self.bound.pre_draw(&self.device, &mut *gl);
        gl.dispatch_compute(x, y, z);
    }

    pub fn dispatch_indirect(&mut self, arguments: &Buffer, offset: usize) {
        #[cfg(debug_assertions)]
        self.device.ensure_context_active();
        let mut gl = self.device.primary();
        self.bound.pre_draw(&self.device, &mut *gl);
        gl.bind_buffer(BufferTarget::DispatchIndirect, arguments.buffer_id());
        gl.dispatch_compute_indirect(offset);
        gl.bind_buffer(BufferTarget::DispatchIndirect, BufferId::NONE);
    }

    /// Opens a named debug group when profiling is enabled.
    pub fn begin_profile(&mut self, name: &str) {
        if self.device.config().profile_enabled {
            self.device.primary().push_debug_group(name);
        }
    }

    pub fn end_profile(&mut self) {
        if self.device.config().profile_enabled {
            self.device.primary().pop_debug_group();
        }
    }
}

impl<D: Driver> Drop for CommandList<D> {
    fn drop(&mut self) {
        if let Some(framebuffer) = self.copy_framebuffer.take() {
            if self.device.holds_primary() {
                self.device.primary().delete_framebuffer(framebuffer);
            } else {
                logwise::warn_sync!("command list dropped without a context; leaking its copy framebuffer");
            }
        }
        self.device.release_command_list();
    }
}

impl<D: Driver> std::fmt::Debug for CommandList<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandList")
            .field("bound", &self.bound)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceConfig;
    use crate::driver::{
        AttribType, Capability, CompareFunction, Face, PrimitiveType, ProgramId, TextureId,
        TextureTarget,
    };
    use crate::imp::{Call, CallLog, RecordingDriver};
    use crate::pipeline::{EffectBytecode, InputElement, PipelineStateDescription, VertexFormat};
    use crate::resources::{BufferDescription, BufferKind, TextureDescription};
    use crate::state::DepthStencilStateDescription;

    fn device(config: DeviceConfig) -> (Arc<GraphicsDevice<RecordingDriver>>, CallLog) {
        let primary = RecordingDriver::new();
        let log = primary.log();
        let device = GraphicsDevice::new(primary, RecordingDriver::new(), config);
        device.begin();
        (device, log)
    }

    fn vertex_buffer(id: u32) -> Buffer {
        Buffer::from_existing(BufferDescription::new(1024, BufferKind::Vertex), BufferId(id), "vb")
    }

    #[test]
    fn construction_resets_to_defaults() {
        let (device, log) = device(DeviceConfig::default());
        log.clear();
        let list = CommandList::new(&device).unwrap();
        let calls = log.take();
        assert_eq!(calls.first(), Some(&Call::ActiveTexture(0)));
        assert!(calls.contains(&Call::DepthFunc(CompareFunction::LessEqual)));
        assert!(calls.contains(&Call::Enable(Capability::DepthTest)));
        assert!(calls.contains(&Call::Enable(Capability::CullFace)));
        assert!(calls.contains(&Call::Enable(Capability::FramebufferSrgb)));
        //blend starts disabled with all channels written, so nothing to do
        assert!(!calls.iter().any(|c| matches!(c, Call::Disable(Capability::Blend))));
        assert!(!calls.iter().any(|c| matches!(c, Call::ColorMask(_))));
        assert!(matches!(
            CommandList::new(&device),
            Err(Error::MultipleCommandLists)
        ));
        drop(list);
        assert!(CommandList::new(&device).is_ok());
    }

    #[test]
    fn second_identical_draw_is_only_a_draw() {
        let (device, log) = device(DeviceConfig::default());
        let effect = Arc::new(
            EffectBytecode::new(7)
                .with_attribute("POSITION", 0)
                .with_attribute("COLOR", 1),
        );
        let pipeline = device
            .create_pipeline_state(PipelineStateDescription {
                effect: Some(effect),
                input_elements: vec![
                    InputElement::new("POSITION", 0, VertexFormat::Float3, 0),
                    InputElement::new("COLOR", 0, VertexFormat::UByte4Norm, 12),
                ],
                ..Default::default()
            })
            .unwrap();
        let mut list = CommandList::new(&device).unwrap();
        list.set_pipeline_state(Some(&pipeline));
        list.set_vertex_buffer(0, Some(&vertex_buffer(30)), 64, 16);
        log.clear();
        list.draw(3, 0);
        let first = log.take();
        assert!(first.contains(&Call::BindBuffer(BufferTarget::Array, BufferId(30))));
        assert!(first.contains(&Call::EnableVertexAttribArray(0)));
        assert!(first.contains(&Call::VertexAttribPointer {
            index: 1,
            size: 4,
            attrib_type: AttribType::UnsignedByte,
            normalized: true,
            stride: 16,
            offset: 64 + 12,
        }));
        assert_eq!(list.bound_state().enabled_vertex_attribs(), 0b11);

        list.draw(3, 0);
        assert_eq!(
            log.take(),
            vec![Call::DrawArrays(PrimitiveType::TriangleList, 0, 3)]
        );
        assert_eq!(device.frame_draw_calls(), 2);
        assert_eq!(device.frame_triangle_count(), 6);
    }

    #[test]
    fn removing_a_vertex_buffer_disables_its_lanes() {
        let (device, log) = device(DeviceConfig::default());
        let effect = Arc::new(EffectBytecode::new(8).with_attribute("BLENDINDICES", 3));
        let pipeline = device
            .create_pipeline_state(PipelineStateDescription {
                effect: Some(effect),
                input_elements: vec![InputElement::new("BLENDINDICES", 1, VertexFormat::UByte4, 0)],
                ..Default::default()
            })
            .unwrap();
        let mut list = CommandList::new(&device).unwrap();
        list.set_pipeline_state(Some(&pipeline));
        list.set_vertex_buffer(1, Some(&vertex_buffer(31)), 0, 4);
        list.draw(1, 0);
        assert!(log.calls().contains(&Call::VertexAttribIPointer {
            index: 3,
            size: 4,
            attrib_type: AttribType::UnsignedByte,
            stride: 4,
            offset: 0,
        }));
        list.set_vertex_buffer(1, None, 0, 0);
        log.clear();
        list.draw(1, 0);
        assert_eq!(
            log.take(),
            vec![
                Call::DisableVertexAttribArray(3),
                Call::DrawArrays(PrimitiveType::TriangleList, 0, 1),
            ]
        );
    }

    #[test]
    fn textures_bind_with_default_sampler_once() {
        let (device, log) = device(DeviceConfig::default());
        let effect = Arc::new(EffectBytecode::new(9).with_texture_unit(2));
        let pipeline = device
            .create_pipeline_state(PipelineStateDescription {
                effect: Some(effect),
                ..Default::default()
            })
            .unwrap();
        let texture = Texture::from_existing(TextureDescription::new_2d(4, 4), TextureId(21), "t");
        let mut list = CommandList::new(&device).unwrap();
        list.set_pipeline_state(Some(&pipeline));
        list.set_shader_resource_view(2, Some(&texture));
        log.clear();
        list.draw(3, 0);
        let calls = log.take();
        let bind = calls
            .iter()
            .position(|c| *c == Call::BindTexture(TextureTarget::Texture2D, TextureId(21)));
        let activate = calls.iter().position(|c| *c == Call::ActiveTexture(2));
        assert!(activate.is_some() && bind.is_some() && activate < bind);
        assert!(calls.iter().any(|c| matches!(c, Call::TexParameter(..))));
        assert_eq!(list.bound_state().bound_texture(2), Some(&texture));

        list.draw(3, 0);
        assert_eq!(log.take().len(), 1);
    }

    #[test]
    fn clearing_depth_with_writes_off_forces_mask() {
        let (device, log) = device(DeviceConfig::default());
        let pipeline = device
            .create_pipeline_state(PipelineStateDescription {
                depth_stencil: DepthStencilStateDescription::read_only(),
                ..Default::default()
            })
            .unwrap();
        let depth = Texture::from_existing(
            TextureDescription::depth_stencil(16, 16, false),
            TextureId(50),
            "depth",
        );
        let mut list = CommandList::new(&device).unwrap();
        list.set_pipeline_state(Some(&pipeline));
        list.draw(3, 0);
        assert!(!list.bound_state().applied_depth_stencil().depth_write);
        log.clear();
        list.clear_depth_stencil(&depth, Some(1.0), None).unwrap();
        let calls = log.take();
        let clear = calls.iter().position(|c| matches!(c, Call::Clear(_)));
        let on = calls.iter().position(|c| *c == Call::DepthMask(true));
        let off = calls.iter().position(|c| *c == Call::DepthMask(false));
        assert!(on < clear && clear < off);
        assert_eq!(calls.last(), Some(&Call::BindFramebuffer(FramebufferId::WINDOW)));
        assert_eq!(list.bound_state().bound_framebuffer(), FramebufferId::WINDOW);
    }

    #[test]
    fn render_target_sizes_are_validated() {
        let (device, _log) = device(DeviceConfig::default());
        let mut list = CommandList::new(&device).unwrap();
        let a = Texture::from_existing(TextureDescription::render_target(8, 8), TextureId(1), "a");
        let b = Texture::from_existing(TextureDescription::render_target(4, 8), TextureId(2), "b");
        let err = list.set_render_targets(None, &[&a, &b]).unwrap_err();
        assert!(matches!(
            err,
            Error::MismatchedTargetSize {
                index: 1,
                expected: (8, 8),
                actual: (4, 8)
            }
        ));
        let depth = Texture::from_existing(
            TextureDescription::depth_stencil(4, 4, true),
            TextureId(3),
            "d",
        );
        assert!(matches!(
            list.set_render_targets(Some(&depth), &[&a]),
            Err(Error::MismatchedDepthSize { .. })
        ));
        let many: Vec<&Texture> = std::iter::repeat_n(&a, MAX_BOUND_RENDER_TARGETS + 1).collect();
        assert!(matches!(
            list.set_render_targets(None, &many),
            Err(Error::TooManyRenderTargets { count: 17, limit: 16 })
        ));
    }

    #[test]
    fn single_viewport_sets_depth_range() {
        let (device, log) = device(DeviceConfig::default());
        let mut list = CommandList::new(&device).unwrap();
        list.set_viewport(Viewport::new(0.0, 0.0, 32.0, 16.0));
        log.clear();
        list.draw(3, 0);
        let calls = log.take();
        assert!(calls.contains(&Call::DepthRange(0.0, 1.0)));
        assert!(calls.contains(&Call::ViewportArray(
            0,
            vec![Viewport::new(0.0, 0.0, 32.0, 16.0)]
        )));
        list.set_viewport(Viewport::new(0.0, 0.0, 32.0, 16.0));
        list.draw(3, 0);
        assert!(!log.take().iter().any(|c| matches!(c, Call::ViewportArray(..))));
    }

    #[test]
    fn copies_hand_back_the_window_viewport() {
        let (device, log) = device(DeviceConfig {
            window_width: 640,
            window_height: 480,
            ..Default::default()
        });
        let source = Texture::from_existing(TextureDescription::render_target(8, 8), TextureId(70), "source");
        let destination =
            Texture::from_existing(TextureDescription::render_target(8, 8), TextureId(71), "destination");
        let mut list = CommandList::new(&device).unwrap();
        list.copy(&source, &destination).unwrap();
        log.clear();
        list.draw(3, 0);
        assert!(log.take().contains(&Call::ViewportArray(
            0,
            vec![Viewport::new(0.0, 0.0, 640.0, 480.0)]
        )));

        let mine = Viewport::new(0.0, 0.0, 4.0, 4.0);
        list.set_viewport(mine);
        list.draw(3, 0);
        list.copy(&source, &destination).unwrap();
        log.clear();
        list.draw(3, 0);
        assert!(log.take().contains(&Call::ViewportArray(0, vec![mine])));
    }

    #[test]
    fn blend_factor_starts_at_the_context_default() {
        let (device, log) = device(DeviceConfig::default());
        let mut list = CommandList::new(&device).unwrap();
        log.clear();
        list.draw(3, 0);
        assert_eq!(log.count(|c| matches!(c, Call::BlendColor(_))), 0);
        list.set_blend_factor([1.0; 4]);
        list.draw(3, 0);
        list.draw(3, 0);
        assert_eq!(log.take().iter().filter(|c| **c == Call::BlendColor([1.0; 4])).count(), 1);
    }

    #[test]
    fn profile_groups_follow_config() {
        let (device, log) = device(DeviceConfig {
            profile_enabled: true,
            ..Default::default()
        });
        let mut list = CommandList::new(&device).unwrap();
        log.clear();
        list.begin_profile("shadows");
        list.end_profile();
        assert_eq!(
            log.take(),
            vec![Call::PushDebugGroup("shadows".to_string()), Call::PopDebugGroup]
        );

        let (quiet, quiet_log) = self::device(DeviceConfig::default());
        let mut list = CommandList::new(&quiet).unwrap();
        quiet_log.clear();
        list.begin_profile("shadows");
        list.end_profile();
        assert!(quiet_log.is_empty());
    }

    #[test]
    fn creation_on_the_render_thread_is_reconciled() {
        let (device, log) = device(DeviceConfig::default());
        let effect = Arc::new(EffectBytecode::new(10).with_texture_unit(0));
        let pipeline = device
            .create_pipeline_state(PipelineStateDescription {
                effect: Some(effect),
                ..Default::default()
            })
            .unwrap();
        let texture = Texture::from_existing(TextureDescription::new_2d(4, 4), TextureId(60), "t");
        let mut list = CommandList::new(&device).unwrap();
        list.set_pipeline_state(Some(&pipeline));
        list.set_shader_resource_view(0, Some(&texture));
        list.draw(3, 0);

        //allocating on the render thread binds and unbinds on the active unit
        Texture::new(&device, TextureDescription::new_2d(2, 2), "fresh").unwrap();
        log.clear();
        list.draw(3, 0);
        let calls = log.take();
        assert!(calls.contains(&Call::ActiveTexture(0)));
        assert!(calls.contains(&Call::BindTexture(TextureTarget::Texture2D, TextureId(60))));
        assert_eq!(list.bound_state().bound_program(), pipeline.program().unwrap().program_id());
        assert_ne!(list.bound_state().bound_program(), ProgramId::NONE);
    }

    #[test]
    fn stencil_reference_is_flushed_by_the_next_draw() {
        let (device, log) = device(DeviceConfig::default());
        let pipeline = device
            .create_pipeline_state(PipelineStateDescription {
                depth_stencil: DepthStencilStateDescription {
                    stencil_enable: true,
                    ..Default::default()
                },
                ..Default::default()
            })
            .unwrap();
        let mut list = CommandList::new(&device).unwrap();
        list.set_pipeline_state(Some(&pipeline));
        list.draw(3, 0);
        list.set_stencil_reference(5);
        log.clear();
        list.draw(3, 0);
        let calls = log.take();
        assert_eq!(
            calls
                .iter()
                .filter(|c| matches!(c, Call::StencilFuncSeparate(Face::FrontAndBack, _, 5, _)))
                .count(),
            1
        );
        assert_eq!(list.bound_state().applied_depth_stencil().stencil_reference, 5);
    }
}
