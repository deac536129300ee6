// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Descriptor sets and the layout that routes them into binding slots.

use super::program::{EffectBytecode, ResourceBinding, ResourceKind};
use crate::resources::{Buffer, SamplerState, Texture};
use std::sync::Arc;

/// One descriptor-set entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Descriptor {
    #[default]
    Empty,
    ShaderResource(Texture),
    Sampler(SamplerState),
    ConstantBuffer(Buffer),
}

/// A group of resources bound together.
///
/// Cloning is cheap; clones share entries and compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorSet {
    entries: Arc<[Descriptor]>,
}

impl DescriptorSet {
    pub fn new(entries: Vec<Descriptor>) -> Self {
        DescriptorSet {
            entries: entries.into(),
        }
    }

    pub fn get(&self, entry: u32) -> Option<&Descriptor> {
        self.entries.get(entry as usize)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Receives the bindings a [`ResourceLayout`] produces.
///
/// The command list implements this over its mirror; shader resources and
/// samplers are staged for the next draw, constant buffers are bound at once.
pub trait BindingTarget {
    fn set_shader_resource(&mut self, slot: u32, texture: Option<&Texture>);
    fn set_sampler(&mut self, slot: u32, sampler: Option<&SamplerState>);
    fn set_constant_buffer(&mut self, slot: u32, buffer: Option<&Buffer>);
}

/// Where each descriptor entry of a pipeline lands, sorted by set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResourceLayout {
    bindings: Vec<ResourceBinding>,
}

impl ResourceLayout {
    pub fn compile(bytecode: &EffectBytecode) -> Self {
        let mut bindings = bytecode.resource_bindings().to_vec();
        bindings.sort_by_key(|b| (b.set, b.entry));
        ResourceLayout { bindings }
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Routes `sets` into `target`.  Sets the layout doesn't mention are
    /// ignored; a missing set binds nothing.
    pub fn bind(&self, sets: &[Option<DescriptorSet>], target: &mut impl BindingTarget) {
        for binding in &self.bindings {
            let Some(Some(set)) = sets.get(binding.set as usize) else {
                continue;
            };
            let descriptor = set.get(binding.entry);
            match binding.kind {
                ResourceKind::ShaderResource => {
                    let texture = match descriptor {
                        Some(Descriptor::ShaderResource(t)) => Some(t),
                        _ => None,
                    };
                    target.set_shader_resource(binding.slot, texture);
                }
                ResourceKind::Sampler => {
                    let sampler = match descriptor {
                        Some(Descriptor::Sampler(s)) => Some(s),
                        _ => None,
                    };
                    target.set_sampler(binding.slot, sampler);
                }
                ResourceKind::ConstantBuffer => {
                    let buffer = match descriptor {
                        Some(Descriptor::ConstantBuffer(b)) => Some(b),
                        _ => None,
                    };
                    target.set_constant_buffer(binding.slot, buffer);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{BufferId, TextureId};
    use crate::resources::{BufferDescription, BufferKind, SamplerStateDescription, TextureDescription};

    #[derive(Default)]
    struct Sink {
        srvs: Vec<(u32, Option<Texture>)>,
        samplers: Vec<(u32, Option<SamplerState>)>,
        buffers: Vec<(u32, Option<Buffer>)>,
    }

    impl BindingTarget for Sink {
        fn set_shader_resource(&mut self, slot: u32, texture: Option<&Texture>) {
            self.srvs.push((slot, texture.cloned()));
        }
        fn set_sampler(&mut self, slot: u32, sampler: Option<&SamplerState>) {
            self.samplers.push((slot, sampler.cloned()));
        }
        fn set_constant_buffer(&mut self, slot: u32, buffer: Option<&Buffer>) {
            self.buffers.push((slot, buffer.cloned()));
        }
    }

    #[test]
    fn entries_route_to_declared_slots() {
        let bytecode = EffectBytecode::new(1)
            .with_binding(ResourceBinding {
                set: 1,
                entry: 0,
                kind: ResourceKind::ConstantBuffer,
                slot: 4,
            })
            .with_binding(ResourceBinding {
                set: 0,
                entry: 1,
                kind: ResourceKind::Sampler,
                slot: 2,
            })
            .with_binding(ResourceBinding {
                set: 0,
                entry: 0,
                kind: ResourceKind::ShaderResource,
                slot: 2,
            });
        let layout = ResourceLayout::compile(&bytecode);

        let texture = Texture::from_existing(TextureDescription::new_2d(4, 4), TextureId(3), "t");
        let sampler = SamplerState::new(SamplerStateDescription::point_wrap());
        let buffer = Buffer::from_existing(
            BufferDescription::new(64, BufferKind::Constant),
            BufferId(8),
            "cb",
        );
        let sets = [
            Some(DescriptorSet::new(vec![
                Descriptor::ShaderResource(texture.clone()),
                Descriptor::Sampler(sampler.clone()),
            ])),
            Some(DescriptorSet::new(vec![Descriptor::ConstantBuffer(buffer.clone())])),
        ];
        let mut sink = Sink::default();
        layout.bind(&sets, &mut sink);
        assert_eq!(sink.srvs, vec![(2, Some(texture))]);
        assert_eq!(sink.samplers, vec![(2, Some(sampler))]);
        assert_eq!(sink.buffers, vec![(4, Some(buffer))]);
    }

    #[test]
    fn missing_sets_bind_nothing_and_wrong_kinds_unbind() {
        let bytecode = EffectBytecode::new(1)
            .with_binding(ResourceBinding {
                set: 0,
                entry: 0,
                kind: ResourceKind::ShaderResource,
                slot: 0,
            })
            .with_binding(ResourceBinding {
                set: 3,
                entry: 0,
                kind: ResourceKind::ConstantBuffer,
                slot: 0,
            });
        let layout = ResourceLayout::compile(&bytecode);
        let sets = [Some(DescriptorSet::new(vec![Descriptor::Empty]))];
        let mut sink = Sink::default();
        layout.bind(&sets, &mut sink);
        assert_eq!(sink.srvs, vec![(0, None)]);
        assert!(sink.buffers.is_empty());
    }
}
