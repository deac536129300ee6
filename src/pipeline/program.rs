// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Compiled programs and the reflection they carry.

Shader compilation happens upstream.  What arrives here is an [`EffectBytecode`]:
an id that identifies the compiled source, plus the reflection the state layer
needs (attribute locations, the texture units the program samples, and where
each descriptor-set entry lands).
*/

use crate::driver::ProgramId;
use std::sync::Arc;

/// What kind of slot a descriptor entry is bound into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    ShaderResource,
    Sampler,
    ConstantBuffer,
}

/// Maps descriptor `set`/`entry` onto a slot of one of the binding tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceBinding {
    pub set: u32,
    pub entry: u32,
    pub kind: ResourceKind,
    pub slot: u32,
}

/// A compiled effect as handed to [`crate::driver::Driver::create_program`].
///
/// Two bytecodes with the same `id` are the same program source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EffectBytecode {
    pub id: u64,
    attributes: Vec<(String, u32)>,
    texture_units: Vec<u32>,
    resource_bindings: Vec<ResourceBinding>,
}

impl EffectBytecode {
    pub fn new(id: u64) -> Self {
        EffectBytecode {
            id,
            attributes: Vec::new(),
            texture_units: Vec::new(),
            resource_bindings: Vec::new(),
        }
    }

    /// Declares a vertex input by semantic name.
    pub fn with_attribute(mut self, semantic: &str, location: u32) -> Self {
        self.attributes.push((semantic.to_string(), location));
        self
    }

    /// Declares a texture unit the program samples from.
    pub fn with_texture_unit(mut self, unit: u32) -> Self {
        if !self.texture_units.contains(&unit) {
            self.texture_units.push(unit);
        }
        self
    }

    pub fn with_binding(mut self, binding: ResourceBinding) -> Self {
        self.resource_bindings.push(binding);
        self
    }

    pub fn attribute_location(&self, semantic: &str) -> Option<u32> {
        self.attributes
            .iter()
            .find(|(name, _)| name == semantic)
            .map(|(_, location)| *location)
    }

    pub fn attribute_locations(&self) -> impl Iterator<Item = u32> + '_ {
        self.attributes.iter().map(|(_, location)| *location)
    }

    pub fn texture_units(&self) -> &[u32] {
        &self.texture_units
    }

    pub fn resource_bindings(&self) -> &[ResourceBinding] {
        &self.resource_bindings
    }
}

/// A linked program, shared between every pipeline built from the same
/// bytecode with the same depth-clamp emulation.
#[derive(Debug)]
pub struct CompiledProgram {
    program_id: ProgramId,
    bytecode: Arc<EffectBytecode>,
    emulate_depth_clamp: bool,
}

impl CompiledProgram {
    pub(crate) fn new(
        program_id: ProgramId,
        bytecode: Arc<EffectBytecode>,
        emulate_depth_clamp: bool,
    ) -> Self {
        CompiledProgram {
            program_id,
            bytecode,
            emulate_depth_clamp,
        }
    }

    pub fn program_id(&self) -> ProgramId {
        self.program_id
    }

    pub fn bytecode(&self) -> &EffectBytecode {
        &self.bytecode
    }

    pub fn emulate_depth_clamp(&self) -> bool {
        self.emulate_depth_clamp
    }

    pub fn texture_units(&self) -> &[u32] {
        self.bytecode.texture_units()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_resolve_by_semantic() {
        let bytecode = EffectBytecode::new(1)
            .with_attribute("POSITION", 0)
            .with_attribute("TEXCOORD0", 3);
        assert_eq!(bytecode.attribute_location("TEXCOORD0"), Some(3));
        assert_eq!(bytecode.attribute_location("NORMAL"), None);
    }

    #[test]
    fn texture_units_are_unique() {
        let bytecode = EffectBytecode::new(1)
            .with_texture_unit(2)
            .with_texture_unit(0)
            .with_texture_unit(2);
        assert_eq!(bytecode.texture_units(), &[2, 0]);
    }
}
