// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Flushing requested state before a draw.

The order matters and is fixed:

1. program
2. vertex attribute lanes, when the layout or a vertex buffer changed
3. descriptor sets, through the pipeline's resource layout
4. blend, depth-stencil and rasterizer state
5. textures and their sampler parameters, per unit the program samples
6. viewports, when they changed; with none set, the whole window

Each step compares against the mirror and emits only what differs.
*/

use super::mirror::{Binder, BoundState};
use crate::device::GraphicsDevice;
use crate::driver::{BufferTarget, Driver, ProgramId, Viewport};
use crate::pipeline::PipelineState;
use std::sync::Arc;

impl BoundState {
    pub(crate) fn pre_draw<D: Driver>(&mut self, device: &GraphicsDevice<D>, driver: &mut D) {
        if device.take_primary_disturbed() {
            logwise::trace_sync!("primary context was used for creation; forgetting active unit");
            self.forget_active_unit();
        }
        let pipeline = self.pending_pipeline.clone();

        let program = pipeline
            .program()
            .map_or(ProgramId::NONE, |p| p.program_id());
        if program != self.bound_program {
            driver.use_program(program);
            self.bound_program = program;
        }

        self.bind_vertex_attribs(driver, &pipeline);

        let mut binder = Binder {
            driver: &mut *driver,
            shader_resource_views: &mut self.shader_resource_views,
            sampler_states: &mut self.sampler_states,
            constant_buffers: &mut self.constant_buffers,
        };
        pipeline
            .resource_layout()
            .bind(&self.descriptor_sets, &mut binder);

        pipeline
            .blend()
            .apply(driver, &mut self.blend, self.blend_factor);
        pipeline
            .depth_stencil()
            .apply(driver, &mut self.depth_stencil, self.stencil_reference);
        pipeline.rasterizer().apply(driver, &mut self.rasterizer);

        self.bind_textures(device, driver, &pipeline);
        self.flush_viewports(device, driver);

        self.current_pipeline = pipeline;
    }

    fn bind_vertex_attribs<D: Driver>(&mut self, driver: &mut D, pipeline: &PipelineState) {
        //equal layouts share one allocation, so identity is enough
        if !Arc::ptr_eq(
            pipeline.vertex_attribs(),
            self.current_pipeline.vertex_attribs(),
        ) {
            self.vertex_buffers_dirty = true;
        }
        if !self.vertex_buffers_dirty {
            return;
        }
        let mut slot = None;
        for attrib in pipeline.vertex_attribs().iter() {
            let view = &self.vertex_buffers[attrib.slot as usize];
            if slot != Some(attrib.slot) {
                slot = Some(attrib.slot);
                if let Some(buffer) = &view.buffer {
                    driver.bind_buffer(BufferTarget::Array, buffer.buffer_id());
                }
            }
            let lane = 1u64 << attrib.index;
            if view.buffer.is_none() || view.stride == 0 {
                if self.enabled_vertex_attribs & lane != 0 {
                    driver.disable_vertex_attrib_array(attrib.index);
                    self.enabled_vertex_attribs &= !lane;
                }
                continue;
            }
            if self.enabled_vertex_attribs & lane == 0 {
                driver.enable_vertex_attrib_array(attrib.index);
                self.enabled_vertex_attribs |= lane;
            }
            let offset = view.offset + attrib.offset as usize;
            if attrib.is_integer && !attrib.normalized {
                driver.vertex_attrib_i_pointer(
                    attrib.index,
                    attrib.size,
                    attrib.attrib_type,
                    view.stride,
                    offset,
                );
            } else {
                driver.vertex_attrib_pointer(
                    attrib.index,
                    attrib.size,
                    attrib.attrib_type,
                    attrib.normalized,
                    view.stride,
                    offset,
                );
            }
        }
        self.vertex_buffers_dirty = false;
    }

    fn bind_textures<D: Driver>(
        &mut self,
        device: &GraphicsDevice<D>,
        driver: &mut D,
        pipeline: &PipelineState,
    ) {
        for &unit in pipeline.texture_units() {
            let index = unit as usize;
            let Some(texture) = self.shader_resource_views[index].clone() else {
                continue;
            };
            let bound_sampler = texture
                .bound_sampler()
                .unwrap_or_else(|| device.default_sampler().clone());
            let sampler = self.sampler_states[index]
                .clone()
                .unwrap_or_else(|| device.linear_clamp().clone());

            let texture_changed = self.bound_textures[index].as_ref() != Some(&texture);
            let sampler_changed = sampler != bound_sampler;
            if !texture_changed && !sampler_changed {
                continue;
            }
            self.activate_unit(driver, unit);
            if texture_changed {
                driver.bind_texture(texture.target(), texture.texture_id());
            }
            if sampler_changed {
                sampler.apply(driver, texture.has_mipmaps(), &bound_sampler, texture.target());
                texture.set_bound_sampler(Some(sampler));
            }
            self.bound_textures[index] = Some(texture);
        }
    }

    fn flush_viewports<D: Driver>(&mut self, device: &GraphicsDevice<D>, driver: &mut D) {
        if !self.viewports_dirty {
            return;
        }
        match self.viewports.as_slice() {
            [] => {
                let config = device.config();
                let window = Viewport::new(
                    0.0,
                    0.0,
                    config.window_width as f32,
                    config.window_height as f32,
                );
                driver.viewport_array(0, &[window]);
            }
            [single] => {
                driver.depth_range(single.min_depth, single.max_depth);
                driver.viewport_array(0, std::slice::from_ref(single));
            }
            many => driver.viewport_array(0, many),
        }
        self.viewports_dirty = false;
    }
}
