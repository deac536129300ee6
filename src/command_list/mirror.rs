// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The command list's record of what the primary context has bound.

use crate::device::GraphicsDevice;
use crate::driver::{
    BufferTarget, BufferId, Capability, ColorWriteChannels, Driver, FramebufferId, IndexType,
    ProgramId, Rectangle, Viewport,
};
use crate::pipeline::{BindingTarget, DescriptorSet, PipelineState};
use crate::resources::{Buffer, SamplerState, Texture};
use crate::state::{AppliedBlend, AppliedDepthStencil, AppliedRasterizer, toggle};
use crate::{
    MAX_CONSTANT_BUFFERS, MAX_DESCRIPTOR_SETS, MAX_TEXTURE_UNITS, MAX_VERTEX_BUFFERS,
};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct VertexBufferView {
    pub(crate) buffer: Option<Buffer>,
    pub(crate) offset: usize,
    /// Zero leaves every attribute reading this slot disabled.
    pub(crate) stride: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct IndexBufferView {
    pub(crate) buffer: Buffer,
    pub(crate) offset: usize,
    pub(crate) index_type: IndexType,
}

/// Everything the command list believes is bound on the primary context.
///
/// Two kinds of entries live here.  Requested entries (`shader_resource_views`,
/// `sampler_states`, `vertex_buffers`, `descriptor_sets`, viewports, the
/// pending pipeline) are what the caller asked for; they reach the driver in
/// the next draw.  Bound entries (`bound_textures`, the applied states, the
/// bound program and framebuffer, the enabled attribute lanes) are what the
/// driver holds right now, and every driver call the command list makes keeps
/// them true.
pub struct BoundState {
    pub(crate) current_pipeline: Arc<PipelineState>,
    pub(crate) pending_pipeline: Arc<PipelineState>,

    pub(crate) blend: AppliedBlend,
    pub(crate) depth_stencil: AppliedDepthStencil,
    pub(crate) rasterizer: AppliedRasterizer,
    pub(crate) stencil_reference: i32,
    pub(crate) blend_factor: [f32; 4],
    pub(crate) framebuffer_srgb: bool,

    pub(crate) bound_textures: Vec<Option<Texture>>,
    pub(crate) shader_resource_views: Vec<Option<Texture>>,
    pub(crate) sampler_states: Vec<Option<SamplerState>>,
    /// `None` when creation on the primary context may have changed it.
    pub(crate) active_texture: Option<u32>,

    pub(crate) vertex_buffers: Vec<VertexBufferView>,
    pub(crate) vertex_buffers_dirty: bool,
    pub(crate) enabled_vertex_attribs: u64,
    pub(crate) index_buffer: Option<IndexBufferView>,
    pub(crate) constant_buffers: Vec<Option<Buffer>>,
    pub(crate) descriptor_sets: Vec<Option<DescriptorSet>>,

    pub(crate) bound_program: ProgramId,
    pub(crate) bound_framebuffer: FramebufferId,
    pub(crate) render_targets: Vec<Texture>,
    pub(crate) depth_stencil_buffer: Option<Texture>,

    pub(crate) viewports: Vec<Viewport>,
    pub(crate) viewports_dirty: bool,
    pub(crate) scissors: Vec<Rectangle>,
}

impl BoundState {
    /// The state of a freshly created context.
    pub(crate) fn new(default_pipeline: &Arc<PipelineState>) -> Self {
        BoundState {
            current_pipeline: default_pipeline.clone(),
            pending_pipeline: default_pipeline.clone(),
            blend: AppliedBlend::baseline(),
            depth_stencil: AppliedDepthStencil::baseline(),
            rasterizer: AppliedRasterizer::baseline(),
            stencil_reference: 0,
            blend_factor: [0.0; 4],
            framebuffer_srgb: false,
            bound_textures: vec![None; MAX_TEXTURE_UNITS],
            shader_resource_views: vec![None; MAX_TEXTURE_UNITS],
            sampler_states: vec![None; MAX_TEXTURE_UNITS],
            active_texture: Some(0),
            vertex_buffers: vec![VertexBufferView::default(); MAX_VERTEX_BUFFERS],
            vertex_buffers_dirty: false,
            enabled_vertex_attribs: 0,
            index_buffer: None,
            constant_buffers: vec![None; MAX_CONSTANT_BUFFERS],
            descriptor_sets: vec![None; MAX_DESCRIPTOR_SETS],
            bound_program: ProgramId::NONE,
            bound_framebuffer: FramebufferId::WINDOW,
            render_targets: Vec::new(),
            depth_stencil_buffer: None,
            viewports: Vec::new(),
            viewports_dirty: false,
            scissors: Vec::new(),
        }
    }

    /// Drops requested resources and puts the fixed-function state back to
    /// the device defaults.
    pub(crate) fn clear_state<D: Driver>(&mut self, device: &GraphicsDevice<D>, driver: &mut D) {
        self.shader_resource_views.fill(None);
        self.sampler_states.fill(None);
        driver.active_texture(0);
        self.active_texture = Some(0);

        let default = device.default_pipeline().clone();
        self.current_pipeline = default.clone();
        self.pending_pipeline = default.clone();

        toggle(driver, Capability::Blend, &mut self.blend.enabled, false);
        if self.blend.color_mask != ColorWriteChannels::ALL {
            driver.color_mask(ColorWriteChannels::ALL);
            self.blend.color_mask = ColorWriteChannels::ALL;
        }
        default
            .depth_stencil()
            .apply(driver, &mut self.depth_stencil, self.stencil_reference);
        default.rasterizer().apply(driver, &mut self.rasterizer);
        toggle(
            driver,
            Capability::FramebufferSrgb,
            &mut self.framebuffer_srgb,
            device.config().srgb_framebuffer,
        );
    }

    /// Makes the active unit's binding unknown after creation ran on the
    /// primary context.
    pub(crate) fn forget_active_unit(&mut self) {
        match self.active_texture {
            Some(unit) => self.bound_textures[unit as usize] = None,
            None => self.bound_textures.fill(None),
        }
        self.active_texture = None;
    }

    pub(crate) fn activate_unit<D: Driver>(&mut self, driver: &mut D, unit: u32) {
        if self.active_texture != Some(unit) {
            driver.active_texture(unit);
            self.active_texture = Some(unit);
        }
    }

    pub(crate) fn bind_framebuffer<D: Driver>(&mut self, driver: &mut D, framebuffer: FramebufferId) {
        if self.bound_framebuffer != framebuffer {
            driver.bind_framebuffer(framebuffer);
            self.bound_framebuffer = framebuffer;
        }
    }

    pub fn bound_program(&self) -> ProgramId {
        self.bound_program
    }

    pub fn bound_framebuffer(&self) -> FramebufferId {
        self.bound_framebuffer
    }

    /// The texture the driver has bound on `unit`, as far as the mirror knows.
    pub fn bound_texture(&self, unit: u32) -> Option<&Texture> {
        self.bound_textures.get(unit as usize)?.as_ref()
    }

    pub fn active_texture(&self) -> Option<u32> {
        self.active_texture
    }

    /// Bit `i` is set when attribute lane `i` is enabled.
    pub fn enabled_vertex_attribs(&self) -> u64 {
        self.enabled_vertex_attribs
    }

    pub fn index_buffer(&self) -> Option<&Buffer> {
        self.index_buffer.as_ref().map(|view| &view.buffer)
    }

    pub fn current_pipeline(&self) -> &Arc<PipelineState> {
        &self.current_pipeline
    }

    pub fn render_targets(&self) -> &[Texture] {
        &self.render_targets
    }

    pub fn depth_stencil_buffer(&self) -> Option<&Texture> {
        self.depth_stencil_buffer.as_ref()
    }

    pub fn applied_blend(&self) -> &AppliedBlend {
        &self.blend
    }

    pub fn applied_depth_stencil(&self) -> &AppliedDepthStencil {
        &self.depth_stencil
    }

    pub fn applied_rasterizer(&self) -> &AppliedRasterizer {
        &self.rasterizer
    }
}

impl std::fmt::Debug for BoundState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundState")
            .field("bound_program", &self.bound_program)
            .field("bound_framebuffer", &self.bound_framebuffer)
            .field("active_texture", &self.active_texture)
            .field("enabled_vertex_attribs", &self.enabled_vertex_attribs)
            .field("blend", &self.blend)
            .field("depth_stencil", &self.depth_stencil)
            .field("rasterizer", &self.rasterizer)
            .finish_non_exhaustive()
    }
}

/// Binds constant buffer `slot` when it differs from what the mirror holds.
pub(crate) fn bind_constant_buffer<D: Driver>(
    driver: &mut D,
    constant_buffers: &mut [Option<Buffer>],
    slot: u32,
    buffer: Option<&Buffer>,
) {
    let current = &mut constant_buffers[slot as usize];
    if current.as_ref() != buffer {
        *current = buffer.cloned();
        let id = buffer.map_or(BufferId::NONE, Buffer::buffer_id);
        driver.bind_buffer_base(BufferTarget::Uniform, slot, id);
    }
}

/// Receives descriptor-set bindings during a draw.
///
/// Borrows the mirror field by field so the descriptor sets being routed can
/// stay borrowed alongside.
pub(crate) struct Binder<'a, D: Driver> {
    pub(crate) driver: &'a mut D,
    pub(crate) shader_resource_views: &'a mut [Option<Texture>],
    pub(crate) sampler_states: &'a mut [Option<SamplerState>],
    pub(crate) constant_buffers: &'a mut [Option<Buffer>],
}

impl<D: Driver> BindingTarget for Binder<'_, D> {
    fn set_shader_resource(&mut self, slot: u32, texture: Option<&Texture>) {
        self.shader_resource_views[slot as usize] = texture.cloned();
    }

    fn set_sampler(&mut self, slot: u32, sampler: Option<&SamplerState>) {
        self.sampler_states[slot as usize] = sampler.cloned();
    }

    fn set_constant_buffer(&mut self, slot: u32, buffer: Option<&Buffer>) {
        bind_constant_buffer(self.driver, self.constant_buffers, slot, buffer);
    }
}
