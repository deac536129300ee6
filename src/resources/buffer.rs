// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::Error;
use crate::device::GraphicsDevice;
use crate::driver::{BufferId, BufferTarget, BufferUsageHint, Driver, MapAccess};
use crate::resources::texture::ResourceUsage;
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// What a buffer is bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Index,
    Constant,
    /// Arguments for indirect draws and dispatches.
    Argument,
    Raw,
}

impl BufferKind {
    pub fn target(self) -> BufferTarget {
        match self {
            BufferKind::Vertex | BufferKind::Raw => BufferTarget::Array,
            BufferKind::Index => BufferTarget::ElementArray,
            BufferKind::Constant => BufferTarget::Uniform,
            BufferKind::Argument => BufferTarget::DrawIndirect,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferDescription {
    pub size: usize,
    pub kind: BufferKind,
    pub usage: ResourceUsage,
}

impl BufferDescription {
    pub fn new(size: usize, kind: BufferKind) -> Self {
        BufferDescription {
            size,
            kind,
            usage: ResourceUsage::Default,
        }
    }

    pub fn with_usage(mut self, usage: ResourceUsage) -> Self {
        self.usage = usage;
        self
    }

    fn usage_hint(&self) -> BufferUsageHint {
        match self.usage {
            ResourceUsage::Dynamic => BufferUsageHint::DynamicDraw,
            ResourceUsage::Staging => BufferUsageHint::StreamRead,
            ResourceUsage::Default | ResourceUsage::Immutable => BufferUsageHint::StaticDraw,
        }
    }
}

/// How a subresource is mapped for CPU access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapMode {
    Read,
    Write,
    ReadWrite,
    /// Orphans the previous contents.
    WriteDiscard,
    /// Promises not to touch data the GPU may be reading.
    WriteNoOverwrite,
}

impl MapMode {
    pub(crate) fn access(self, unsynchronized: bool) -> MapAccess {
        let (read, write) = match self {
            MapMode::Read => (true, false),
            MapMode::ReadWrite => (true, true),
            MapMode::Write | MapMode::WriteDiscard | MapMode::WriteNoOverwrite => (false, true),
        };
        MapAccess {
            read,
            write,
            invalidate_buffer: self == MapMode::WriteDiscard,
            unsynchronized: unsynchronized && !read,
        }
    }
}

struct Shared {
    description: BufferDescription,
    buffer_id: BufferId,
    discard_next_map: AtomicBool,
    debug_name: String,
}

/// A shared buffer handle, compared by identity.
#[derive(Clone)]
pub struct Buffer {
    shared: Arc<Shared>,
}

impl Buffer {
    /// Allocates the buffer through the device's creation context.
    ///
    /// Allocation goes through the copy-write target so that no binding the
    /// command list tracks is disturbed.
    pub fn new<D: Driver>(
        device: &GraphicsDevice<D>,
        description: BufferDescription,
        debug_name: &str,
    ) -> Result<Buffer, Error> {
        let context = device.use_creation_context();
        let mut gl = context.driver();
        let buffer_id = gl.gen_buffer();
        gl.bind_buffer(BufferTarget::CopyWrite, buffer_id);
        gl.buffer_data(
            BufferTarget::CopyWrite,
            description.size,
            description.usage_hint(),
        );
        gl.bind_buffer(BufferTarget::CopyWrite, BufferId::NONE);
        drop(gl);
        drop(context);
        Ok(Buffer::from_existing(description, buffer_id, debug_name))
    }

    pub fn from_existing(description: BufferDescription, buffer_id: BufferId, debug_name: &str) -> Buffer {
        Buffer {
            shared: Arc::new(Shared {
                description,
                buffer_id,
                discard_next_map: AtomicBool::new(false),
                debug_name: debug_name.to_string(),
            }),
        }
    }

    pub fn description(&self) -> &BufferDescription {
        &self.shared.description
    }
    pub fn buffer_id(&self) -> BufferId {
        self.shared.buffer_id
    }
    pub fn size(&self) -> usize {
        self.shared.description.size
    }
    pub fn target(&self) -> BufferTarget {
        self.shared.description.kind.target()
    }
    pub(crate) fn usage_hint(&self) -> BufferUsageHint {
        self.shared.description.usage_hint()
    }
    pub fn debug_name(&self) -> &str {
        &self.shared.debug_name
    }

    /// The next `WriteNoOverwrite` map is upgraded to `WriteDiscard`.
    pub fn tag_discard_next_map(&self) {
        self.shared.discard_next_map.store(true, Ordering::Release);
    }

    pub(crate) fn take_discard_next_map(&self) -> bool {
        self.shared.discard_next_map.swap(false, Ordering::AcqRel)
    }
}

impl PartialEq for Buffer {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}
impl Eq for Buffer {}

impl Hash for Buffer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.shared).hash(state);
    }
}

impl Debug for Buffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("name", &self.shared.debug_name)
            .field("id", &self.shared.buffer_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_are_never_unsynchronized() {
        assert!(!MapMode::Read.access(true).unsynchronized);
        assert!(!MapMode::ReadWrite.access(true).unsynchronized);
        assert!(MapMode::WriteNoOverwrite.access(true).unsynchronized);
        assert!(!MapMode::WriteNoOverwrite.access(false).unsynchronized);
    }

    #[test]
    fn write_discard_invalidates() {
        let access = MapMode::WriteDiscard.access(true);
        assert!(access.invalidate_buffer && access.write && !access.read);
    }
}
