// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::driver::*;
use crate::pipeline::program::EffectBytecode;
use std::ptr::NonNull;
use std::sync::Arc;
use wasm_safe_mutex::Mutex;

/// One recorded driver call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    MakeCurrent,
    ReleaseCurrent,
    Flush,
    Finish,
    Enable(Capability),
    Disable(Capability),
    BlendEquationSeparate(BlendEquation, BlendEquation),
    BlendFuncSeparate(BlendFactor, BlendFactor, BlendFactor, BlendFactor),
    BlendColor([f32; 4]),
    ColorMask(ColorWriteChannels),
    DepthMask(bool),
    DepthFunc(CompareFunction),
    StencilMask(u8),
    StencilFuncSeparate(Face, CompareFunction, i32, u8),
    StencilOpSeparate(Face, StencilOperation, StencilOperation, StencilOperation),
    CullFace(Face),
    FrontFace(FrontFace),
    PolygonMode(PolygonMode),
    PolygonOffset(f32, f32),
    ViewportArray(u32, Vec<Viewport>),
    DepthRange(f32, f32),
    ScissorArray(u32, Vec<Rectangle>),
    /// Effect id, depth clamp emulation.
    CreateProgram(u64, bool),
    DeleteProgram(ProgramId),
    UseProgram(ProgramId),
    GenBuffer(BufferId),
    DeleteBuffer(BufferId),
    BindBuffer(BufferTarget, BufferId),
    BindBufferBase(BufferTarget, u32, BufferId),
    BufferData(BufferTarget, usize, BufferUsageHint),
    MapBufferRange(BufferTarget, usize, usize, MapAccess),
    UnmapBuffer(BufferTarget),
    CopyBufferSubData(usize, usize, usize),
    EnableVertexAttribArray(u32),
    DisableVertexAttribArray(u32),
    VertexAttribPointer {
        index: u32,
        size: u32,
        attrib_type: AttribType,
        normalized: bool,
        stride: u32,
        offset: usize,
    },
    VertexAttribIPointer {
        index: u32,
        size: u32,
        attrib_type: AttribType,
        stride: u32,
        offset: usize,
    },
    GenTexture(TextureId),
    GenRenderbuffer(TextureId),
    DeleteTexture(TextureId),
    ActiveTexture(u32),
    BindTexture(TextureTarget, TextureId),
    TexStorage(TextureTarget, u32, [u32; 3], u32),
    TexParameter(TextureTarget, TextureParameter),
    TexSubImage(TextureTarget, u32, [u32; 3], [u32; 3]),
    CopyTexSubImage(TextureTarget, u32, [u32; 3], Rectangle),
    GenFramebuffer(FramebufferId),
    DeleteFramebuffer(FramebufferId),
    BindFramebuffer(FramebufferId),
    FramebufferTexture2D(Attachment, TextureTarget, TextureId, u32),
    FramebufferTextureLayer(Attachment, TextureId, u32, u32),
    FramebufferRenderbuffer(Attachment, TextureId),
    DrawBuffers(Vec<Attachment>),
    CheckFramebufferStatus,
    ReadPixels(Rectangle, usize),
    ClearColor([f32; 4]),
    ClearDepth(f32),
    ClearStencil(u8),
    Clear(ClearMask),
    DrawArrays(PrimitiveType, u32, u32),
    DrawArraysInstanced(PrimitiveType, u32, u32, u32),
    DrawElementsBaseVertex(PrimitiveType, u32, IndexType, usize, i32),
    DrawElementsInstancedBaseVertex(PrimitiveType, u32, IndexType, usize, u32, i32),
    DrawArraysIndirect(PrimitiveType, usize),
    DrawElementsIndirect(PrimitiveType, IndexType, usize),
    DispatchCompute(u32, u32, u32),
    DispatchComputeIndirect(usize),
    PushDebugGroup(String),
    PopDebugGroup,
}

impl Call {
    /// Whether this call issues work rather than changing state.
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            Call::DrawArrays(..)
                | Call::DrawArraysInstanced(..)
                | Call::DrawElementsBaseVertex(..)
                | Call::DrawElementsInstancedBaseVertex(..)
                | Call::DrawArraysIndirect(..)
                | Call::DrawElementsIndirect(..)
                | Call::DispatchCompute(..)
                | Call::DispatchComputeIndirect(..)
        )
    }
}

/// Shared view of a [`RecordingDriver`]'s calls.
///
/// Cloning shares the log, so a test can keep one while the driver moves into a device.
#[derive(Clone)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl Default for CallLog {
    fn default() -> Self {
        CallLog {
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl std::fmt::Debug for CallLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallLog").field("len", &self.len()).finish()
    }
}

impl CallLog {
    fn push(&self, call: Call) {
        self.calls.lock_sync().push(call);
    }

    /// Copy of everything recorded so far.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock_sync().clone()
    }

    /// Drains the log.
    pub fn take(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.lock_sync())
    }

    pub fn clear(&self) {
        self.calls.lock_sync().clear();
    }

    pub fn len(&self) -> usize {
        self.calls.lock_sync().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.lock_sync().is_empty()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock_sync().iter().filter(|c| predicate(c)).count()
    }

    /// Calls recorded after the most recent draw or dispatch.
    pub fn since_last_draw(&self) -> Vec<Call> {
        let calls = self.calls.lock_sync();
        let start = calls
            .iter()
            .rposition(Call::is_draw)
            .map(|p| p + 1)
            .unwrap_or(0);
        calls[start..].to_vec()
    }
}

/// A [`Driver`] that performs no rendering and records each call.
///
/// Handles are handed out from a counter starting at 1; buffer maps return a
/// dangling pointer that must not be dereferenced.
#[derive(Debug)]
pub struct RecordingDriver {
    log: CallLog,
    capabilities: Capabilities,
    framebuffer_status: FramebufferStatus,
    fail_next_program: Option<String>,
    next_id: u32,
    current: bool,
}

impl RecordingDriver {
    pub fn new() -> Self {
        RecordingDriver {
            log: CallLog::default(),
            capabilities: Capabilities::default(),
            framebuffer_status: FramebufferStatus::Complete,
            fail_next_program: None,
            next_id: 1,
            current: false,
        }
    }

    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        RecordingDriver {
            capabilities,
            ..RecordingDriver::new()
        }
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    /// Status reported by every subsequent `check_framebuffer_status`.
    pub fn set_framebuffer_status(&mut self, status: FramebufferStatus) {
        self.framebuffer_status = status;
    }

    /// The next `create_program` fails with `message`.
    pub fn fail_next_program(&mut self, message: impl Into<String>) {
        self.fail_next_program = Some(message.into());
    }

    pub fn is_current(&self) -> bool {
        self.current
    }

    fn next(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl Default for RecordingDriver {
    fn default() -> Self {
        RecordingDriver::new()
    }
}

impl Driver for RecordingDriver {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn make_current(&mut self) {
        self.current = true;
        self.log.push(Call::MakeCurrent);
    }
    fn release_current(&mut self) {
        self.current = false;
        self.log.push(Call::ReleaseCurrent);
    }
    fn flush(&mut self) {
        self.log.push(Call::Flush);
    }
    fn finish(&mut self) {
        self.log.push(Call::Finish);
    }

    fn enable(&mut self, capability: Capability) {
        self.log.push(Call::Enable(capability));
    }
    fn disable(&mut self, capability: Capability) {
        self.log.push(Call::Disable(capability));
    }
    fn blend_equation_separate(&mut self, color: BlendEquation, alpha: BlendEquation) {
        self.log.push(Call::BlendEquationSeparate(color, alpha));
    }
    fn blend_func_separate(
        &mut self,
        src_color: BlendFactor,
        dst_color: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) {
        self.log.push(Call::BlendFuncSeparate(
            src_color, dst_color, src_alpha, dst_alpha,
        ));
    }
    fn blend_color(&mut self, color: [f32; 4]) {
        self.log.push(Call::BlendColor(color));
    }
    fn color_mask(&mut self, mask: ColorWriteChannels) {
        self.log.push(Call::ColorMask(mask));
    }
    fn depth_mask(&mut self, write: bool) {
        self.log.push(Call::DepthMask(write));
    }
    fn depth_func(&mut self, function: CompareFunction) {
        self.log.push(Call::DepthFunc(function));
    }
    fn stencil_mask(&mut self, mask: u8) {
        self.log.push(Call::StencilMask(mask));
    }
    fn stencil_func_separate(
        &mut self,
        face: Face,
        function: CompareFunction,
        reference: i32,
        read_mask: u8,
    ) {
        self.log
            .push(Call::StencilFuncSeparate(face, function, reference, read_mask));
    }
    fn stencil_op_separate(
        &mut self,
        face: Face,
        stencil_fail: StencilOperation,
        depth_fail: StencilOperation,
        pass: StencilOperation,
    ) {
        self.log
            .push(Call::StencilOpSeparate(face, stencil_fail, depth_fail, pass));
    }
    fn cull_face(&mut self, face: Face) {
        self.log.push(Call::CullFace(face));
    }
    fn front_face(&mut self, front_face: FrontFace) {
        self.log.push(Call::FrontFace(front_face));
    }
    fn polygon_mode(&mut self, mode: PolygonMode) {
        self.log.push(Call::PolygonMode(mode));
    }
    fn polygon_offset(&mut self, factor: f32, units: f32) {
        self.log.push(Call::PolygonOffset(factor, units));
    }

    fn viewport_array(&mut self, first: u32, viewports: &[Viewport]) {
        self.log.push(Call::ViewportArray(first, viewports.to_vec()));
    }
    fn depth_range(&mut self, min: f32, max: f32) {
        self.log.push(Call::DepthRange(min, max));
    }
    fn scissor_array(&mut self, first: u32, rectangles: &[Rectangle]) {
        self.log.push(Call::ScissorArray(first, rectangles.to_vec()));
    }

    fn create_program(
        &mut self,
        bytecode: &EffectBytecode,
        emulate_depth_clamp: bool,
    ) -> Result<ProgramId, DriverError> {
        self.log
            .push(Call::CreateProgram(bytecode.id, emulate_depth_clamp));
        if let Some(message) = self.fail_next_program.take() {
            return Err(DriverError::ProgramLink(message));
        }
        Ok(ProgramId(self.next()))
    }
    fn delete_program(&mut self, program: ProgramId) {
        self.log.push(Call::DeleteProgram(program));
    }
    fn use_program(&mut self, program: ProgramId) {
        self.log.push(Call::UseProgram(program));
    }

    fn gen_buffer(&mut self) -> BufferId {
        let id = BufferId(self.next());
        self.log.push(Call::GenBuffer(id));
        id
    }
    fn delete_buffer(&mut self, buffer: BufferId) {
        self.log.push(Call::DeleteBuffer(buffer));
    }
    fn bind_buffer(&mut self, target: BufferTarget, buffer: BufferId) {
        self.log.push(Call::BindBuffer(target, buffer));
    }
    fn bind_buffer_base(&mut self, target: BufferTarget, index: u32, buffer: BufferId) {
        self.log.push(Call::BindBufferBase(target, index, buffer));
    }
    fn buffer_data(&mut self, target: BufferTarget, size: usize, usage: BufferUsageHint) {
        self.log.push(Call::BufferData(target, size, usage));
    }
    fn map_buffer_range(
        &mut self,
        target: BufferTarget,
        offset: usize,
        length: usize,
        access: MapAccess,
    ) -> Option<NonNull<u8>> {
        self.log
            .push(Call::MapBufferRange(target, offset, length, access));
        Some(NonNull::dangling())
    }
    fn unmap_buffer(&mut self, target: BufferTarget) {
        self.log.push(Call::UnmapBuffer(target));
    }
    fn copy_buffer_sub_data(&mut self, read_offset: usize, write_offset: usize, size: usize) {
        self.log
            .push(Call::CopyBufferSubData(read_offset, write_offset, size));
    }

    fn enable_vertex_attrib_array(&mut self, index: u32) {
        self.log.push(Call::EnableVertexAttribArray(index));
    }
    fn disable_vertex_attrib_array(&mut self, index: u32) {
        self.log.push(Call::DisableVertexAttribArray(index));
    }
    fn vertex_attrib_pointer(
        &mut self,
        index: u32,
        size: u32,
        attrib_type: AttribType,
        normalized: bool,
        stride: u32,
        offset: usize,
    ) {
        self.log.push(Call::VertexAttribPointer {
            index,
            size,
            attrib_type,
            normalized,
            stride,
            offset,
        });
    }
    fn vertex_attrib_i_pointer(
        &mut self,
        index: u32,
        size: u32,
        attrib_type: AttribType,
        stride: u32,
        offset: usize,
    ) {
        self.log.push(Call::VertexAttribIPointer {
            index,
            size,
            attrib_type,
            stride,
            offset,
        });
    }

    fn gen_texture(&mut self) -> TextureId {
        let id = TextureId(self.next());
        self.log.push(Call::GenTexture(id));
        id
    }
    fn gen_renderbuffer(&mut self) -> TextureId {
        let id = TextureId(self.next());
        self.log.push(Call::GenRenderbuffer(id));
        id
    }
    fn delete_texture(&mut self, texture: TextureId) {
        self.log.push(Call::DeleteTexture(texture));
    }
    fn active_texture(&mut self, unit: u32) {
        self.log.push(Call::ActiveTexture(unit));
    }
    fn bind_texture(&mut self, target: TextureTarget, texture: TextureId) {
        self.log.push(Call::BindTexture(target, texture));
    }
    fn tex_storage(&mut self, target: TextureTarget, levels: u32, size: [u32; 3], samples: u32) {
        self.log.push(Call::TexStorage(target, levels, size, samples));
    }
    fn tex_parameter(&mut self, target: TextureTarget, parameter: TextureParameter) {
        self.log.push(Call::TexParameter(target, parameter));
    }
    fn tex_sub_image(
        &mut self,
        target: TextureTarget,
        level: u32,
        offset: [u32; 3],
        size: [u32; 3],
    ) {
        self.log.push(Call::TexSubImage(target, level, offset, size));
    }
    fn copy_tex_sub_image(
        &mut self,
        target: TextureTarget,
        level: u32,
        offset: [u32; 3],
        source: Rectangle,
    ) {
        self.log
            .push(Call::CopyTexSubImage(target, level, offset, source));
    }

    fn gen_framebuffer(&mut self) -> FramebufferId {
        let id = FramebufferId(self.next());
        self.log.push(Call::GenFramebuffer(id));
        id
    }
    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.log.push(Call::DeleteFramebuffer(framebuffer));
    }
    fn bind_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.log.push(Call::BindFramebuffer(framebuffer));
    }
    fn framebuffer_texture_2d(
        &mut self,
        attachment: Attachment,
        target: TextureTarget,
        texture: TextureId,
        level: u32,
    ) {
        self.log
            .push(Call::FramebufferTexture2D(attachment, target, texture, level));
    }
    fn framebuffer_texture_layer(
        &mut self,
        attachment: Attachment,
        texture: TextureId,
        level: u32,
        layer: u32,
    ) {
        self.log
            .push(Call::FramebufferTextureLayer(attachment, texture, level, layer));
    }
    fn framebuffer_renderbuffer(&mut self, attachment: Attachment, renderbuffer: TextureId) {
        self.log
            .push(Call::FramebufferRenderbuffer(attachment, renderbuffer));
    }
    fn draw_buffers(&mut self, attachments: &[Attachment]) {
        self.log.push(Call::DrawBuffers(attachments.to_vec()));
    }
    fn check_framebuffer_status(&mut self) -> FramebufferStatus {
        self.log.push(Call::CheckFramebufferStatus);
        self.framebuffer_status
    }
    fn read_pixels(&mut self, source: Rectangle, buffer_offset: usize) {
        self.log.push(Call::ReadPixels(source, buffer_offset));
    }

    fn clear_color(&mut self, color: [f32; 4]) {
        self.log.push(Call::ClearColor(color));
    }
    fn clear_depth(&mut self, depth: f32) {
        self.log.push(Call::ClearDepth(depth));
    }
    fn clear_stencil(&mut self, stencil: u8) {
        self.log.push(Call::ClearStencil(stencil));
    }
    fn clear(&mut self, mask: ClearMask) {
        self.log.push(Call::Clear(mask));
    }

    fn draw_arrays(&mut self, primitive: PrimitiveType, first: u32, count: u32) {
        self.log.push(Call::DrawArrays(primitive, first, count));
    }
    fn draw_arrays_instanced(
        &mut self,
        primitive: PrimitiveType,
        first: u32,
        count: u32,
        instances: u32,
    ) {
        self.log
            .push(Call::DrawArraysInstanced(primitive, first, count, instances));
    }
    fn draw_elements_base_vertex(
        &mut self,
        primitive: PrimitiveType,
        count: u32,
        index_type: IndexType,
        offset: usize,
        base_vertex: i32,
    ) {
        self.log.push(Call::DrawElementsBaseVertex(
            primitive,
            count,
            index_type,
            offset,
            base_vertex,
        ));
    }
    fn draw_elements_instanced_base_vertex(
        &mut self,
        primitive: PrimitiveType,
        count: u32,
        index_type: IndexType,
        offset: usize,
        instances: u32,
        base_vertex: i32,
    ) {
        self.log.push(Call::DrawElementsInstancedBaseVertex(
            primitive,
            count,
            index_type,
            offset,
            instances,
            base_vertex,
        ));
    }
    fn draw_arrays_indirect(&mut self, primitive: PrimitiveType, offset: usize) {
        self.log.push(Call::DrawArraysIndirect(primitive, offset));
    }
    fn draw_elements_indirect(&mut self, primitive: PrimitiveType, index_type: IndexType, offset: usize) {
        self.log
            .push(Call::DrawElementsIndirect(primitive, index_type, offset));
    }
    fn dispatch_compute(&mut self, x: u32, y: u32, z: u32) {
        self.log.push(Call::DispatchCompute(x, y, z));
    }
    fn dispatch_compute_indirect(&mut self, offset: usize) {
        self.log.push(Call::DispatchComputeIndirect(offset));
    }

    fn push_debug_group(&mut self, name: &str) {
        self.log.push(Call::PushDebugGroup(name.to_string()));
    }
    fn pop_debug_group(&mut self) {
        self.log.push(Call::PopDebugGroup);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_across_kinds() {
        let mut driver = RecordingDriver::new();
        let a = driver.gen_buffer();
        let b = driver.gen_texture();
        let c = driver.gen_framebuffer();
        assert_eq!((a.0, b.0, c.0), (1, 2, 3));
    }

    #[test]
    fn log_is_shared_with_clones() {
        let mut driver = RecordingDriver::new();
        let log = driver.log();
        driver.use_program(ProgramId(4));
        driver.draw_arrays(PrimitiveType::TriangleList, 0, 3);
        driver.enable(Capability::Blend);
        assert_eq!(log.len(), 3);
        assert_eq!(log.since_last_draw(), vec![Call::Enable(Capability::Blend)]);
        assert_eq!(log.count(Call::is_draw), 1);
        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn scripted_program_failure_happens_once() {
        let mut driver = RecordingDriver::new();
        driver.fail_next_program("bad varying");
        let bytecode = EffectBytecode::new(9);
        assert_eq!(
            driver.create_program(&bytecode, false),
            Err(DriverError::ProgramLink("bad varying".to_string()))
        );
        assert!(driver.create_program(&bytecode, false).is_ok());
    }
}
