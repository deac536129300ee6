// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Vertex input layout, resolved against a program's attribute locations.

use super::program::EffectBytecode;
use crate::driver::AttribType;

/// Element formats a vertex buffer may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Float1,
    Float2,
    Float3,
    Float4,
    Half2,
    Half4,
    UByte4,
    UByte4Norm,
    Byte4Norm,
    Short2,
    Short2Norm,
    Short4,
    Short4Norm,
    UShort2Norm,
    UShort4Norm,
    Int1,
    Int2,
    Int3,
    Int4,
    UInt1,
    UInt2,
    UInt3,
    UInt4,
}

impl VertexFormat {
    /// Component count, component type, normalization.
    pub const fn layout(self) -> (u32, AttribType, bool) {
        use AttribType::*;
        match self {
            VertexFormat::Float1 => (1, Float, false),
            VertexFormat::Float2 => (2, Float, false),
            VertexFormat::Float3 => (3, Float, false),
            VertexFormat::Float4 => (4, Float, false),
            VertexFormat::Half2 => (2, HalfFloat, false),
            VertexFormat::Half4 => (4, HalfFloat, false),
            VertexFormat::UByte4 => (4, UnsignedByte, false),
            VertexFormat::UByte4Norm => (4, UnsignedByte, true),
            VertexFormat::Byte4Norm => (4, Byte, true),
            VertexFormat::Short2 => (2, Short, false),
            VertexFormat::Short2Norm => (2, Short, true),
            VertexFormat::Short4 => (4, Short, false),
            VertexFormat::Short4Norm => (4, Short, true),
            VertexFormat::UShort2Norm => (2, UnsignedShort, true),
            VertexFormat::UShort4Norm => (4, UnsignedShort, true),
            VertexFormat::Int1 => (1, Int, false),
            VertexFormat::Int2 => (2, Int, false),
            VertexFormat::Int3 => (3, Int, false),
            VertexFormat::Int4 => (4, Int, false),
            VertexFormat::UInt1 => (1, UnsignedInt, false),
            VertexFormat::UInt2 => (2, UnsignedInt, false),
            VertexFormat::UInt3 => (3, UnsignedInt, false),
            VertexFormat::UInt4 => (4, UnsignedInt, false),
        }
    }
}

/// One element of a vertex buffer, as the renderer describes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputElement {
    pub semantic: String,
    /// Vertex buffer slot the element is read from.
    pub slot: u32,
    pub format: VertexFormat,
    /// Byte offset within one vertex.
    pub offset: u32,
}

impl InputElement {
    pub fn new(semantic: &str, slot: u32, format: VertexFormat, offset: u32) -> Self {
        InputElement {
            semantic: semantic.to_string(),
            slot,
            format,
            offset,
        }
    }
}

/// One attribute lane: where it reads from and how the driver decodes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttrib {
    pub slot: u32,
    pub index: u32,
    pub size: u32,
    pub attrib_type: AttribType,
    pub is_integer: bool,
    pub normalized: bool,
    pub offset: u32,
}

/// Resolves `elements` against the attributes `program` declares.
///
/// Elements the program doesn't read are dropped.
pub fn resolve(elements: &[InputElement], program: &EffectBytecode) -> Vec<VertexAttrib> {
    elements
        .iter()
        .filter_map(|element| {
            let index = program.attribute_location(&element.semantic)?;
            let (size, attrib_type, normalized) = element.format.layout();
            Some(VertexAttrib {
                slot: element.slot,
                index,
                size,
                attrib_type,
                is_integer: !matches!(attrib_type, AttribType::Float | AttribType::HalfFloat),
                normalized,
                offset: element.offset,
            })
        })
        .collect()
}
