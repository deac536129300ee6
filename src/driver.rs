// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The downstream seam: a binding-based, state-machine graphics API.
//!
//! Everything above this module speaks in terms of [`Driver`] calls.  A real
//! backend forwards each call to the native API of its context; the recording
//! backend in [`crate::imp`] logs them so the bound-state mirror can be checked
//! against what the driver actually saw.
//!
//! Each `Driver` value represents one context.  A device owns two: the primary
//! context used by the command list, and the secondary context handed out by
//! [`crate::creation_context`].

use crate::pipeline::program::EffectBytecode;
use std::ptr::NonNull;

/// Native program handle.  `ProgramId::NONE` unbinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

impl ProgramId {
    pub const NONE: ProgramId = ProgramId(0);
}

/// Native texture or renderbuffer handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct TextureId(pub u32);

impl TextureId {
    pub const NONE: TextureId = TextureId(0);
}

/// Native buffer handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct BufferId(pub u32);

impl BufferId {
    pub const NONE: BufferId = BufferId(0);
}

/// Native framebuffer handle.  Handle 0 is the window-provided framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct FramebufferId(pub u32);

impl FramebufferId {
    pub const WINDOW: FramebufferId = FramebufferId(0);
}

/// Toggles driven through `enable`/`disable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Blend,
    SampleAlphaToCoverage,
    DepthTest,
    StencilTest,
    CullFace,
    ScissorTest,
    DepthClamp,
    PolygonOffsetFill,
    FramebufferSrgb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u16)]
pub enum BlendEquation {
    #[default]
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    DstColor,
    OneMinusDstColor,
    SrcAlphaSaturate,
    ConstantColor,
    OneMinusConstantColor,
    Src1Color,
    OneMinusSrc1Color,
    Src1Alpha,
    OneMinusSrc1Alpha,
}

/// Channel mask for color writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorWriteChannels(u8);

impl ColorWriteChannels {
    pub const NONE: ColorWriteChannels = ColorWriteChannels(0);
    pub const RED: ColorWriteChannels = ColorWriteChannels(1);
    pub const GREEN: ColorWriteChannels = ColorWriteChannels(2);
    pub const BLUE: ColorWriteChannels = ColorWriteChannels(4);
    pub const ALPHA: ColorWriteChannels = ColorWriteChannels(8);
    pub const ALL: ColorWriteChannels = ColorWriteChannels(15);

    pub const fn from_bits(bits: u8) -> Self {
        ColorWriteChannels(bits & 15)
    }
    pub const fn bits(self) -> u8 {
        self.0
    }
    pub const fn union(self, other: ColorWriteChannels) -> Self {
        ColorWriteChannels(self.0 | other.0)
    }
    pub const fn red(self) -> bool {
        self.0 & 1 != 0
    }
    pub const fn green(self) -> bool {
        self.0 & 2 != 0
    }
    pub const fn blue(self) -> bool {
        self.0 & 4 != 0
    }
    pub const fn alpha(self) -> bool {
        self.0 & 8 != 0
    }
}

impl Default for ColorWriteChannels {
    fn default() -> Self {
        ColorWriteChannels::ALL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StencilOperation {
    Keep,
    Zero,
    Replace,
    IncrementSaturation,
    DecrementSaturation,
    Invert,
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Face {
    Front,
    Back,
    FrontAndBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrontFace {
    Clockwise,
    CounterClockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PolygonMode {
    Fill,
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveType {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Array,
    ElementArray,
    Uniform,
    PixelPack,
    PixelUnpack,
    CopyRead,
    CopyWrite,
    DrawIndirect,
    DispatchIndirect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsageHint {
    StaticDraw,
    DynamicDraw,
    StreamRead,
    DynamicCopy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    Texture1D,
    Texture2D,
    Texture2DMultisample,
    Texture2DArray,
    Texture3D,
    TextureCubeMap,
    /// One face of a cube map, 0..6 in +X, -X, +Y, -Y, +Z, -Z order.
    CubeMapFace(u8),
    Renderbuffer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attachment {
    Color(u32),
    Depth,
    Stencil,
    DepthStencil,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramebufferStatus {
    Complete,
    IncompleteAttachment,
    MissingAttachment,
    IncompleteMultisample,
    Unsupported,
}

/// Component type of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttribType {
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    HalfFloat,
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexType {
    #[default]
    UnsignedShort,
    UnsignedInt,
}

impl IndexType {
    pub const fn element_size(self) -> usize {
        match self {
            IndexType::UnsignedShort => 2,
            IndexType::UnsignedInt => 4,
        }
    }
}

/// Access flags for `map_buffer_range`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MapAccess {
    pub read: bool,
    pub write: bool,
    pub invalidate_buffer: bool,
    pub unsynchronized: bool,
}

/// Which buffers `clear` touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ClearMask {
    pub color: bool,
    pub depth: bool,
    pub stencil: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFilter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureWrap {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
    ClampToBorder,
    MirrorClampToEdge,
}

/// One `tex_parameter` assignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextureParameter {
    MinFilter(TextureFilter),
    MagFilter(TextureFilter),
    WrapS(TextureWrap),
    WrapT(TextureWrap),
    WrapR(TextureWrap),
    MinLod(f32),
    MaxLod(f32),
    LodBias(f32),
    MaxAnisotropy(f32),
    /// `None` disables depth comparison.
    Compare(Option<CompareFunction>),
    BorderColor([f32; 4]),
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Viewport {
            x,
            y,
            width,
            height,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rectangle {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// What the context can do, queried once at device creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capabilities {
    pub has_depth_clamp: bool,
    pub has_texture_buffers: bool,
    pub has_khronos_debug: bool,
    pub has_timer_queries: bool,
    pub has_multisample_textures: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities {
            has_depth_clamp: true,
            has_texture_buffers: true,
            has_khronos_debug: true,
            has_timer_queries: true,
            has_multisample_textures: true,
        }
    }
}

/// Failure reported by the driver itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum DriverError {
    #[error("program link failed: {0}")]
    ProgramLink(String),
    #[error("out of memory")]
    OutOfMemory,
}

/// A binding-based graphics context.
///
/// Calls have the semantics of their OpenGL namesakes.  Implementations never
/// cache anything; avoiding redundant calls is the caller's job.
pub trait Driver: Send + 'static {
    fn capabilities(&self) -> Capabilities;

    // context
    fn make_current(&mut self);
    fn release_current(&mut self);
    fn flush(&mut self);
    fn finish(&mut self);

    // fixed-function toggles and state
    fn enable(&mut self, capability: Capability);
    fn disable(&mut self, capability: Capability);
    fn blend_equation_separate(&mut self, color: BlendEquation, alpha: BlendEquation);
    fn blend_func_separate(
        &mut self,
        src_color: BlendFactor,
        dst_color: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    );
    fn blend_color(&mut self, color: [f32; 4]);
    fn color_mask(&mut self, mask: ColorWriteChannels);
    fn depth_mask(&mut self, write: bool);
    fn depth_func(&mut self, function: CompareFunction);
    fn stencil_mask(&mut self, mask: u8);
    fn stencil_func_separate(
        &mut self,
        face: Face,
        function: CompareFunction,
        reference: i32,
        read_mask: u8,
    );
    fn stencil_op_separate(
        &mut self,
        face: Face,
        stencil_fail: StencilOperation,
        depth_fail: StencilOperation,
        pass: StencilOperation,
    );
    fn cull_face(&mut self, face: Face);
    fn front_face(&mut self, front_face: FrontFace);
    fn polygon_mode(&mut self, mode: PolygonMode);
    fn polygon_offset(&mut self, factor: f32, units: f32);

    // viewport
    fn viewport_array(&mut self, first: u32, viewports: &[Viewport]);
    fn depth_range(&mut self, min: f32, max: f32);
    fn scissor_array(&mut self, first: u32, rectangles: &[Rectangle]);

    // programs
    fn create_program(
        &mut self,
        bytecode: &EffectBytecode,
        emulate_depth_clamp: bool,
    ) -> Result<ProgramId, DriverError>;
    fn delete_program(&mut self, program: ProgramId);
    fn use_program(&mut self, program: ProgramId);

    // buffers
    fn gen_buffer(&mut self) -> BufferId;
    fn delete_buffer(&mut self, buffer: BufferId);
    fn bind_buffer(&mut self, target: BufferTarget, buffer: BufferId);
    fn bind_buffer_base(&mut self, target: BufferTarget, index: u32, buffer: BufferId);
    fn buffer_data(&mut self, target: BufferTarget, size: usize, usage: BufferUsageHint);
    fn map_buffer_range(
        &mut self,
        target: BufferTarget,
        offset: usize,
        length: usize,
        access: MapAccess,
    ) -> Option<NonNull<u8>>;
    fn unmap_buffer(&mut self, target: BufferTarget);
    /// Copies between the buffers bound at `CopyRead` and `CopyWrite`.
    fn copy_buffer_sub_data(&mut self, read_offset: usize, write_offset: usize, size: usize);

    // vertex input
    fn enable_vertex_attrib_array(&mut self, index: u32);
    fn disable_vertex_attrib_array(&mut self, index: u32);
    fn vertex_attrib_pointer(
        &mut self,
        index: u32,
        size: u32,
        attrib_type: AttribType,
        normalized: bool,
        stride: u32,
        offset: usize,
    );
    fn vertex_attrib_i_pointer(
        &mut self,
        index: u32,
        size: u32,
        attrib_type: AttribType,
        stride: u32,
        offset: usize,
    );

    // textures
    fn gen_texture(&mut self) -> TextureId;
    fn gen_renderbuffer(&mut self) -> TextureId;
    fn delete_texture(&mut self, texture: TextureId);
    fn active_texture(&mut self, unit: u32);
    fn bind_texture(&mut self, target: TextureTarget, texture: TextureId);
    fn tex_storage(&mut self, target: TextureTarget, levels: u32, size: [u32; 3], samples: u32);
    fn tex_parameter(&mut self, target: TextureTarget, parameter: TextureParameter);
    fn tex_sub_image(
        &mut self,
        target: TextureTarget,
        level: u32,
        offset: [u32; 3],
        size: [u32; 3],
    );
    /// Copies from the read framebuffer into the texture bound at `target`.
    fn copy_tex_sub_image(
        &mut self,
        target: TextureTarget,
        level: u32,
        offset: [u32; 3],
        source: Rectangle,
    );

    // framebuffers
    fn gen_framebuffer(&mut self) -> FramebufferId;
    fn delete_framebuffer(&mut self, framebuffer: FramebufferId);
    fn bind_framebuffer(&mut self, framebuffer: FramebufferId);
    fn framebuffer_texture_2d(
        &mut self,
        attachment: Attachment,
        target: TextureTarget,
        texture: TextureId,
        level: u32,
    );
    fn framebuffer_texture_layer(
        &mut self,
        attachment: Attachment,
        texture: TextureId,
        level: u32,
        layer: u32,
    );
    fn framebuffer_renderbuffer(&mut self, attachment: Attachment, renderbuffer: TextureId);
    fn draw_buffers(&mut self, attachments: &[Attachment]);
    fn check_framebuffer_status(&mut self) -> FramebufferStatus;
    /// Reads from the bound framebuffer into the bound pixel-pack buffer.
    fn read_pixels(&mut self, source: Rectangle, buffer_offset: usize);

    // clears
    fn clear_color(&mut self, color: [f32; 4]);
    fn clear_depth(&mut self, depth: f32);
    fn clear_stencil(&mut self, stencil: u8);
    fn clear(&mut self, mask: ClearMask);

    // submission
    fn draw_arrays(&mut self, primitive: PrimitiveType, first: u32, count: u32);
    fn draw_arrays_instanced(
        &mut self,
        primitive: PrimitiveType,
        first: u32,
        count: u32,
        instances: u32,
    );
    fn draw_elements_base_vertex(
        &mut self,
        primitive: PrimitiveType,
        count: u32,
        index_type: IndexType,
        offset: usize,
        base_vertex: i32,
    );
    fn draw_elements_instanced_base_vertex(
        &mut self,
        primitive: PrimitiveType,
        count: u32,
        index_type: IndexType,
        offset: usize,
        instances: u32,
        base_vertex: i32,
    );
    fn draw_arrays_indirect(&mut self, primitive: PrimitiveType, offset: usize);
    fn draw_elements_indirect(&mut self, primitive: PrimitiveType, index_type: IndexType, offset: usize);
    fn dispatch_compute(&mut self, x: u32, y: u32, z: u32);
    fn dispatch_compute_indirect(&mut self, offset: usize);

    // debugging
    fn push_debug_group(&mut self, name: &str);
    fn pop_debug_group(&mut self);
}
