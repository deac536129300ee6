// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Pipeline states: everything a draw needs that doesn't change per draw.

A [`PipelineState`] bundles a linked program, the three fixed-function state
objects, the primitive topology, the resolved vertex-attribute lanes and the
resource layout.  Pipelines are deduplicated by description, and the expensive
pieces inside them are deduplicated again on their own keys:

* programs by (effect id, depth-clamp emulation), since two pipelines that only
  differ in blending link the same program;
* vertex-attribute arrays by content, so pipelines with equal layouts share one
  `Arc` and the command list can skip the attribute walk by pointer compare.

Everything here is reference counted through [`ObjectCache`]; releasing a
pipeline releases what it holds.
*/

pub mod program;
pub mod resource_binder;
pub mod vertex;

pub use program::{CompiledProgram, EffectBytecode, ResourceBinding, ResourceKind};
pub use resource_binder::{BindingTarget, Descriptor, DescriptorSet, ResourceLayout};
pub use vertex::{InputElement, VertexAttrib, VertexFormat};

use crate::cache::ObjectCache;
use crate::{
    Error, MAX_CONSTANT_BUFFERS, MAX_DESCRIPTOR_SETS, MAX_TEXTURE_UNITS, MAX_VERTEX_ATTRIBUTES,
    MAX_VERTEX_BUFFERS,
};
use crate::device::GraphicsDevice;
use crate::driver::{Capabilities, Driver, PrimitiveType};
use crate::state::{
    BlendState, BlendStateDescription, DepthStencilState, DepthStencilStateDescription,
    RasterizerState, RasterizerStateDescription,
};
use std::sync::Arc;

/// Everything that identifies a pipeline.  Equal descriptions share one
/// [`PipelineState`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineStateDescription {
    pub effect: Option<Arc<EffectBytecode>>,
    pub blend: BlendStateDescription,
    pub depth_stencil: DepthStencilStateDescription,
    pub rasterizer: RasterizerStateDescription,
    pub primitive_type: PrimitiveType,
    pub input_elements: Vec<InputElement>,
    /// Whether the pipeline renders with a depth buffer bound.  Without one,
    /// depth and stencil testing are forced off.
    pub has_depth_buffer: bool,
}

impl Default for PipelineStateDescription {
    fn default() -> Self {
        PipelineStateDescription {
            effect: None,
            blend: BlendStateDescription::default(),
            depth_stencil: DepthStencilStateDescription::default(),
            rasterizer: RasterizerStateDescription::default(),
            primitive_type: PrimitiveType::TriangleList,
            input_elements: Vec::new(),
            has_depth_buffer: true,
        }
    }
}

#[derive(Debug)]
pub struct PipelineState {
    program: Option<Arc<CompiledProgram>>,
    blend: BlendState,
    depth_stencil: DepthStencilState,
    rasterizer: RasterizerState,
    primitive_type: PrimitiveType,
    vertex_attribs: Arc<[VertexAttrib]>,
    resource_layout: ResourceLayout,
}

impl PipelineState {
    /// The pipeline with no program and default fixed-function state, as
    /// installed by `clear_state`.
    pub(crate) fn default_for(capabilities: &Capabilities) -> Self {
        let description = PipelineStateDescription::default();
        PipelineState {
            program: None,
            blend: BlendState::new(&description.blend),
            depth_stencil: DepthStencilState::new(
                &description.depth_stencil,
                description.has_depth_buffer,
            ),
            rasterizer: RasterizerState::new(&description.rasterizer, capabilities.has_depth_clamp),
            primitive_type: description.primitive_type,
            vertex_attribs: Arc::from(Vec::new()),
            resource_layout: ResourceLayout::default(),
        }
    }

    pub fn program(&self) -> Option<&Arc<CompiledProgram>> {
        self.program.as_ref()
    }
    pub fn blend(&self) -> &BlendState {
        &self.blend
    }
    pub fn depth_stencil(&self) -> &DepthStencilState {
        &self.depth_stencil
    }
    pub fn rasterizer(&self) -> &RasterizerState {
        &self.rasterizer
    }
    pub fn primitive_type(&self) -> PrimitiveType {
        self.primitive_type
    }
    pub fn vertex_attribs(&self) -> &Arc<[VertexAttrib]> {
        &self.vertex_attribs
    }
    pub fn resource_layout(&self) -> &ResourceLayout {
        &self.resource_layout
    }

    /// Texture units the program samples.  Empty without a program.
    pub fn texture_units(&self) -> &[u32] {
        self.program
            .as_ref()
            .map(|p| p.texture_units())
            .unwrap_or(&[])
    }
}

type ProgramKey = (u64, bool);

/// The three caches behind [`GraphicsDevice::create_pipeline_state`].
#[derive(Debug, Default)]
pub(crate) struct PipelineCaches {
    programs: ObjectCache<ProgramKey, CompiledProgram>,
    vertex_attribs: ObjectCache<Vec<VertexAttrib>, [VertexAttrib]>,
    pipelines: ObjectCache<PipelineStateDescription, PipelineState>,
}

impl PipelineCaches {
    pub(crate) fn instantiate<D: Driver>(
        &self,
        device: &GraphicsDevice<D>,
        description: PipelineStateDescription,
    ) -> Result<Arc<PipelineState>, Error> {
        self.pipelines.instantiate(
            description,
            |description| self.build(device, description).map(Arc::new),
            |lost| self.teardown(device, &lost),
        )
    }

    /// Returns true when this was the last reference and the pipeline's
    /// program and attribute array were released with it.
    pub(crate) fn release<D: Driver>(
        &self,
        device: &GraphicsDevice<D>,
        pipeline: &Arc<PipelineState>,
    ) -> bool {
        let released = self
            .pipelines
            .release(pipeline, |_, dead| self.teardown(device, &dead));
        if !released && !self.pipelines.contains(pipeline) {
            logwise::warn_sync!("released a pipeline state this device never created");
        }
        released
    }

    pub(crate) fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    pub(crate) fn program_count(&self) -> usize {
        self.programs.len()
    }

    /// Forgets everything after the context was lost.
    pub(crate) fn clear(&self) {
        self.pipelines.clear();
        self.programs.clear();
        self.vertex_attribs.clear();
    }

    fn build<D: Driver>(
        &self,
        device: &GraphicsDevice<D>,
        description: &PipelineStateDescription,
    ) -> Result<PipelineState, Error> {
        validate_layout(description)?;
        let capabilities = device.capabilities();
        let rasterizer = RasterizerState::new(&description.rasterizer, capabilities.has_depth_clamp);
        let program = match &description.effect {
            Some(effect) => Some(self.program(device, effect, rasterizer.emulate_depth_clamp())?),
            None => None,
        };
        let attribs = match &description.effect {
            Some(effect) => vertex::resolve(&description.input_elements, effect),
            None => Vec::new(),
        };
        let vertex_attribs = self
            .vertex_attribs
            .instantiate::<std::convert::Infallible>(
                attribs,
                |attribs| Ok(Arc::from(attribs.as_slice())),
                drop,
            )
            .unwrap_or_else(|never| match never {});
        let resource_layout = description
            .effect
            .as_deref()
            .map(ResourceLayout::compile)
            .unwrap_or_default();
        logwise::trace_sync!(
            "built pipeline with {count} vertex attributes",
            count = vertex_attribs.len()
        );
        Ok(PipelineState {
            program,
            blend: BlendState::new(&description.blend),
            depth_stencil: DepthStencilState::new(
                &description.depth_stencil,
                description.has_depth_buffer,
            ),
            rasterizer,
            primitive_type: description.primitive_type,
            vertex_attribs,
            resource_layout,
        })
    }

    fn program<D: Driver>(
        &self,
        device: &GraphicsDevice<D>,
        effect: &Arc<EffectBytecode>,
        emulate_depth_clamp: bool,
    ) -> Result<Arc<CompiledProgram>, Error> {
        self.programs.instantiate(
            (effect.id, emulate_depth_clamp),
            |_| {
                let perf = logwise::perfwarn_begin!("link program");
                let linked = device
                    .use_creation_context()
                    .driver()
                    .create_program(effect, emulate_depth_clamp);
                drop(perf);
                match linked {
                    Ok(program_id) => {
                        logwise::info_sync!(
                            "linked effect {effect} as program {program}",
                            effect = effect.id,
                            program = program_id.0
                        );
                        Ok(Arc::new(CompiledProgram::new(
                            program_id,
                            effect.clone(),
                            emulate_depth_clamp,
                        )))
                    }
                    Err(source) => {
                        logwise::error_sync!(
                            "effect {effect} failed to link: {source}",
                            effect = effect.id,
                            source = logwise::privacy::LogIt(&source)
                        );
                        Err(Error::ProgramCreation {
                            effect: effect.id,
                            source,
                        })
                    }
                }
            },
            |lost| {
                device
                    .use_creation_context()
                    .driver()
                    .delete_program(lost.program_id());
            },
        )
    }

    fn teardown<D: Driver>(&self, device: &GraphicsDevice<D>, pipeline: &PipelineState) {
        if let Some(program) = &pipeline.program {
            self.programs.release(program, |_, dead| {
                device
                    .use_creation_context()
                    .driver()
                    .delete_program(dead.program_id());
            });
        }
        self.vertex_attribs.release(&pipeline.vertex_attribs, |_, _| {});
    }
}

/// Rejects layouts that index past the tables the command list mirrors, so a
/// bad effect fails here instead of at its first draw.
fn validate_layout(description: &PipelineStateDescription) -> Result<(), Error> {
    let Some(effect) = &description.effect else {
        return Ok(());
    };
    let check = |what: &'static str, index: u32, limit: usize| {
        if index as usize >= limit {
            logwise::error_sync!(
                "effect {effect} uses {what} {index}, limit {limit}",
                effect = effect.id,
                what = logwise::privacy::LogIt(&what),
                index = index,
                limit = limit
            );
            return Err(Error::LayoutOutOfRange {
                effect: effect.id,
                what,
                index,
                limit,
            });
        }
        Ok(())
    };
    for element in &description.input_elements {
        check("vertex buffer slot", element.slot, MAX_VERTEX_BUFFERS)?;
    }
    for location in effect.attribute_locations() {
        check("attribute location", location, MAX_VERTEX_ATTRIBUTES)?;
    }
    for &unit in effect.texture_units() {
        check("texture unit", unit, MAX_TEXTURE_UNITS)?;
    }
    for binding in effect.resource_bindings() {
        check("descriptor set", binding.set, MAX_DESCRIPTOR_SETS)?;
        let (what, limit) = match binding.kind {
            ResourceKind::ShaderResource => ("shader resource slot", MAX_TEXTURE_UNITS),
            ResourceKind::Sampler => ("sampler slot", MAX_TEXTURE_UNITS),
            ResourceKind::ConstantBuffer => ("constant buffer slot", MAX_CONSTANT_BUFFERS),
        };
        check(what, binding.slot, limit)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptions_compare_by_content() {
        let effect = Arc::new(EffectBytecode::new(3).with_attribute("POSITION", 0));
        let a = PipelineStateDescription {
            effect: Some(effect.clone()),
            ..Default::default()
        };
        let b = PipelineStateDescription {
            effect: Some(Arc::new(EffectBytecode::new(3).with_attribute("POSITION", 0))),
            ..Default::default()
        };
        assert_eq!(a, b);
        let c = PipelineStateDescription {
            blend: BlendStateDescription::alpha_blend(),
            ..a.clone()
        };
        assert_ne!(a, c);
    }

    #[test]
    fn default_pipeline_has_nothing_to_bind() {
        let pipeline = PipelineState::default_for(&Capabilities::default());
        assert!(pipeline.program().is_none());
        assert!(pipeline.vertex_attribs().is_empty());
        assert!(pipeline.texture_units().is_empty());
        assert!(pipeline.resource_layout().is_empty());
    }
}
