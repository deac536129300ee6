// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The graphics device: the two contexts and everything shared between frames.

A [`GraphicsDevice`] owns the primary driver used by the command list, the
secondary driver lent out by [`crate::creation_context`], the framebuffer and
pipeline caches, and the per-frame counters.  It is shared as an `Arc` and is
`Sync`; the only state that needs the render thread is the primary context,
which a thread claims with [`GraphicsDevice::begin`].
*/

use crate::Error;
use crate::creation_context::{CREATION_SLOT, CreationContext, SlotGuard};
use crate::driver::{Capabilities, Driver, TextureId};
use crate::framebuffer::FramebufferCache;
use crate::pipeline::{PipelineCaches, PipelineState, PipelineStateDescription};
use crate::resources::{SamplerState, SamplerStateDescription, Texture, TextureDescription};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::ThreadId;

/// Settings fixed at device creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Emit debug groups for `begin_profile`/`end_profile`.
    pub profile_enabled: bool,
    /// Enable sRGB conversion on framebuffer writes in `clear_state`.
    pub srgb_framebuffer: bool,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            profile_enabled: false,
            srgb_framebuffer: true,
            window_width: 1,
            window_height: 1,
        }
    }
}

#[derive(Debug, Default)]
struct ContextOwner {
    thread: Option<ThreadId>,
    depth: u32,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct GraphicsDevice<D: Driver> {
    primary: Mutex<D>,
    secondary: Mutex<D>,
    capabilities: Capabilities,
    config: DeviceConfig,
    framebuffers: FramebufferCache,
    pipelines: PipelineCaches,
    default_pipeline: Arc<PipelineState>,
    default_sampler: SamplerState,
    linear_clamp: SamplerState,
    owner: Mutex<ContextOwner>,
    frame_counter: AtomicU64,
    frame_draw_calls: AtomicU64,
    frame_triangle_count: AtomicU64,
    command_list_created: AtomicBool,
    primary_disturbed: AtomicBool,
    //the creation slot, held while paused
    paused: wasm_safe_mutex::Mutex<Option<SlotGuard>>,
}

impl<D: Driver> GraphicsDevice<D> {
    /// Creates a device over two contexts that share objects.
    ///
    /// Capabilities are queried from `primary`.
    pub fn new(primary: D, secondary: D, config: DeviceConfig) -> Arc<Self> {
        let capabilities = primary.capabilities();
        let window = Texture::from_existing(
            TextureDescription::render_target(config.window_width, config.window_height),
            TextureId::NONE,
            "window",
        );
        logwise::info_sync!(
            "created graphics device, window {width}x{height}, capabilities {caps}",
            width = config.window_width,
            height = config.window_height,
            caps = logwise::privacy::LogIt(&capabilities)
        );
        Arc::new(GraphicsDevice {
            primary: Mutex::new(primary),
            secondary: Mutex::new(secondary),
            capabilities,
            framebuffers: FramebufferCache::new(window),
            pipelines: PipelineCaches::default(),
            default_pipeline: Arc::new(PipelineState::default_for(&capabilities)),
            default_sampler: SamplerState::new(SamplerStateDescription::driver_default()),
            linear_clamp: SamplerState::new(SamplerStateDescription::linear_clamp()),
            config,
            owner: Mutex::new(ContextOwner::default()),
            frame_counter: AtomicU64::new(0),
            frame_draw_calls: AtomicU64::new(0),
            frame_triangle_count: AtomicU64::new(0),
            command_list_created: AtomicBool::new(false),
            primary_disturbed: AtomicBool::new(false),
            paused: wasm_safe_mutex::Mutex::new(None),
        })
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Makes the primary context current on this thread.
    ///
    /// Calls nest; only the outermost one starts a frame.
    ///
    /// # Panics
    /// If another thread currently holds the primary context.
    pub fn begin(&self) {
        let current = std::thread::current().id();
        let mut owner = lock(&self.owner);
        if let Some(thread) = owner.thread {
            assert!(
                thread == current,
                "the primary context is already active on another thread"
            );
        }
        owner.thread = Some(current);
        owner.depth += 1;
        if owner.depth == 1 {
            let frame = self.frame_counter.fetch_add(1, Ordering::AcqRel) + 1;
            self.frame_draw_calls.store(0, Ordering::Relaxed);
            self.frame_triangle_count.store(0, Ordering::Relaxed);
            self.primary().make_current();
            logwise::trace_sync!("begin frame {frame}", frame = frame);
        }
    }

    /// Undoes one [`Self::begin`]; the outermost releases the primary context.
    ///
    /// # Panics
    /// If called more times than `begin`, or from a thread that didn't begin.
    pub fn end(&self) {
        let mut owner = lock(&self.owner);
        assert!(owner.depth > 0, "end was called more times than begin");
        assert!(
            owner.thread == Some(std::thread::current().id()),
            "end was called from a thread that doesn't hold the primary context"
        );
        owner.depth -= 1;
        if owner.depth == 0 {
            owner.thread = None;
            self.primary().release_current();
        }
    }

    /// Whether the calling thread is between `begin` and `end`.
    pub fn holds_primary(&self) -> bool {
        lock(&self.owner).thread == Some(std::thread::current().id())
    }

    /// # Panics
    /// If the calling thread doesn't hold the primary context.
    pub(crate) fn ensure_context_active(&self) {
        assert!(
            self.holds_primary(),
            "no context is active on this thread; call GraphicsDevice::begin first"
        );
    }

    /// A driver usable from the calling thread, blocking while another
    /// thread holds the secondary context.
    pub fn use_creation_context(&self) -> CreationContext<'_, D> {
        CreationContext::acquire(self)
    }

    /// Like [`Self::use_creation_context`], but waits asynchronously.
    pub async fn use_creation_context_async(&self) -> CreationContext<'_, D> {
        CreationContext::acquire_async(self).await
    }

    /// Returns the shared pipeline for `description`, linking its program on
    /// first use.
    pub fn create_pipeline_state(
        &self,
        description: PipelineStateDescription,
    ) -> Result<Arc<PipelineState>, Error> {
        self.pipelines.instantiate(self, description)
    }

    /// Drops one reference taken by [`Self::create_pipeline_state`].
    ///
    /// Returns true when the pipeline was destroyed.
    pub fn release_pipeline_state(&self, pipeline: &Arc<PipelineState>) -> bool {
        self.pipelines.release(self, pipeline)
    }

    /// Live pipelines and programs.
    pub fn cached_pipeline_counts(&self) -> (usize, usize) {
        (self.pipelines.pipeline_count(), self.pipelines.program_count())
    }

    pub fn framebuffers(&self) -> &FramebufferCache {
        &self.framebuffers
    }

    pub fn window_texture(&self) -> &Texture {
        self.framebuffers.window_texture()
    }

    pub fn default_pipeline(&self) -> &Arc<PipelineState> {
        &self.default_pipeline
    }

    /// Parameters every texture starts with.
    pub(crate) fn default_sampler(&self) -> &SamplerState {
        &self.default_sampler
    }

    /// Sampler used for units with a texture but no sampler.
    pub(crate) fn linear_clamp(&self) -> &SamplerState {
        &self.linear_clamp
    }

    /// Forgets every cached object after the contexts were lost.
    ///
    /// The native objects died with the context, so nothing is deleted.
    pub fn on_destroyed(&self) {
        self.framebuffers.on_destroyed();
        self.pipelines.clear();
        logwise::warn_sync!("graphics context destroyed; caches cleared");
    }

    /// Blocks creation on other threads, finishes outstanding work and
    /// releases the primary context.  Does nothing when already paused.
    pub fn pause(&self) {
        if self.is_paused() {
            return;
        }
        let slot = CREATION_SLOT.lock_sync();
        {
            let mut secondary = self.secondary();
            secondary.make_current();
            secondary.finish();
            secondary.release_current();
        }
        self.primary().release_current();
        *self.paused.lock_sync() = Some(slot);
        logwise::info_sync!("graphics device paused");
    }

    /// Undoes [`Self::pause`].  Does nothing when not paused.
    pub fn resume(&self) {
        let slot = self.paused.lock_sync().take();
        let Some(slot) = slot else {
            return;
        };
        self.primary().make_current();
        drop(slot);
        logwise::info_sync!("graphics device resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.paused.lock_sync().is_some()
    }

    /// Number of outermost `begin` calls so far.
    pub fn frame_counter(&self) -> u64 {
        self.frame_counter.load(Ordering::Acquire)
    }

    pub fn frame_draw_calls(&self) -> u64 {
        self.frame_draw_calls.load(Ordering::Relaxed)
    }

    /// Vertices (or indices) submitted this frame.
    pub fn frame_triangle_count(&self) -> u64 {
        self.frame_triangle_count.load(Ordering::Relaxed)
    }

    pub(crate) fn record_draw(&self, vertices: u64) {
        self.frame_draw_calls.fetch_add(1, Ordering::Relaxed);
        self.frame_triangle_count
            .fetch_add(vertices, Ordering::Relaxed);
    }

    pub(crate) fn primary(&self) -> MutexGuard<'_, D> {
        lock(&self.primary)
    }

    pub(crate) fn secondary(&self) -> MutexGuard<'_, D> {
        lock(&self.secondary)
    }

    pub(crate) fn claim_command_list(&self) -> Result<(), Error> {
        if self.command_list_created.swap(true, Ordering::AcqRel) {
            return Err(Error::MultipleCommandLists);
        }
        Ok(())
    }

    pub(crate) fn release_command_list(&self) {
        self.command_list_created.store(false, Ordering::Release);
    }

    pub(crate) fn mark_primary_disturbed(&self) {
        self.primary_disturbed.store(true, Ordering::Release);
    }

    /// Whether creation ran on the primary context since the last call.
    pub(crate) fn take_primary_disturbed(&self) -> bool {
        self.primary_disturbed.swap(false, Ordering::AcqRel)
    }
}

impl<D: Driver> std::fmt::Debug for GraphicsDevice<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsDevice")
            .field("capabilities", &self.capabilities)
            .field("config", &self.config)
            .field("frame_counter", &self.frame_counter())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::ProgramId;
    use crate::imp::{Call, RecordingDriver};
    use crate::pipeline::EffectBytecode;
    use crate::state::BlendStateDescription;

    fn device() -> (Arc<GraphicsDevice<RecordingDriver>>, crate::imp::CallLog, crate::imp::CallLog) {
        let primary = RecordingDriver::new();
        let secondary = RecordingDriver::new();
        let (p, s) = (primary.log(), secondary.log());
        (
            GraphicsDevice::new(primary, secondary, DeviceConfig::default()),
            p,
            s,
        )
    }

    #[test]
    fn begin_nests_and_counts_outermost() {
        let (device, primary, _) = device();
        device.begin();
        device.begin();
        assert_eq!(device.frame_counter(), 1);
        device.end();
        assert!(device.holds_primary());
        device.end();
        assert!(!device.holds_primary());
        assert_eq!(primary.calls(), vec![Call::MakeCurrent, Call::ReleaseCurrent]);
    }

    #[test]
    #[should_panic(expected = "more times than begin")]
    fn end_without_begin_panics() {
        let (device, _, _) = device();
        device.end();
    }

    #[test]
    fn pipelines_share_programs() {
        let (device, _, secondary) = device();
        let effect = Arc::new(EffectBytecode::new(11).with_attribute("POSITION", 0));
        let opaque = PipelineStateDescription {
            effect: Some(effect.clone()),
            ..Default::default()
        };
        let blended = PipelineStateDescription {
            blend: BlendStateDescription::alpha_blend(),
            ..opaque.clone()
        };
        let a = device.create_pipeline_state(opaque.clone()).unwrap();
        let b = device.create_pipeline_state(blended).unwrap();
        let a2 = device.create_pipeline_state(opaque).unwrap();
        assert!(Arc::ptr_eq(&a, &a2));
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(a.program().unwrap(), b.program().unwrap()));
        assert!(Arc::ptr_eq(a.vertex_attribs(), b.vertex_attribs()));
        assert_eq!(device.cached_pipeline_counts(), (2, 1));
        assert_eq!(secondary.count(|c| matches!(c, Call::CreateProgram(11, false))), 1);

        assert!(!device.release_pipeline_state(&a));
        assert!(device.release_pipeline_state(&a2));
        assert!(device.release_pipeline_state(&b));
        assert_eq!(device.cached_pipeline_counts(), (0, 0));
        let program = ProgramId(1);
        assert_eq!(secondary.count(|c| *c == Call::DeleteProgram(program)), 1);
    }

    #[test]
    fn failed_link_is_reported_and_not_cached() {
        let primary = RecordingDriver::new();
        let mut secondary = RecordingDriver::new();
        secondary.fail_next_program("missing varying");
        let device = GraphicsDevice::new(primary, secondary, DeviceConfig::default());
        let description = PipelineStateDescription {
            effect: Some(Arc::new(EffectBytecode::new(4))),
            ..Default::default()
        };
        let err = device.create_pipeline_state(description.clone()).unwrap_err();
        assert!(matches!(err, Error::ProgramCreation { effect: 4, .. }));
        assert_eq!(device.cached_pipeline_counts(), (0, 0));
        assert!(device.create_pipeline_state(description).is_ok());
    }

    #[test]
    fn layouts_past_the_mirrored_tables_are_rejected() {
        use crate::pipeline::{InputElement, ResourceBinding, ResourceKind, VertexFormat};
        let (device, _, secondary) = device();
        let effect = EffectBytecode::new(40).with_attribute("POSITION", 0);
        let binding = |set, kind, slot| ResourceBinding {
            set,
            entry: 0,
            kind,
            slot,
        };
        let cases = [
            (
                PipelineStateDescription {
                    effect: Some(Arc::new(effect.clone())),
                    input_elements: vec![InputElement::new("POSITION", 9, VertexFormat::Float3, 0)],
                    ..Default::default()
                },
                "vertex buffer slot",
            ),
            (
                PipelineStateDescription {
                    effect: Some(Arc::new(effect.clone().with_attribute("TEXCOORD", 64))),
                    ..Default::default()
                },
                "attribute location",
            ),
            (
                PipelineStateDescription {
                    effect: Some(Arc::new(effect.clone().with_texture_unit(64))),
                    ..Default::default()
                },
                "texture unit",
            ),
            (
                PipelineStateDescription {
                    effect: Some(Arc::new(
                        effect.clone().with_binding(binding(0, ResourceKind::ConstantBuffer, 64)),
                    )),
                    ..Default::default()
                },
                "constant buffer slot",
            ),
            (
                PipelineStateDescription {
                    effect: Some(Arc::new(
                        effect.clone().with_binding(binding(32, ResourceKind::Sampler, 0)),
                    )),
                    ..Default::default()
                },
                "descriptor set",
            ),
        ];
        for (description, expected) in cases {
            let err = device.create_pipeline_state(description).unwrap_err();
            assert!(
                matches!(err, Error::LayoutOutOfRange { effect: 40, what, .. } if what == expected),
                "{err}"
            );
        }
        assert_eq!(device.cached_pipeline_counts(), (0, 0));
        assert_eq!(secondary.count(|c| matches!(c, Call::CreateProgram(..))), 0);

        //the last entry of each table is still fine
        let edge = EffectBytecode::new(41)
            .with_attribute("POSITION", 63)
            .with_texture_unit(63)
            .with_binding(binding(31, ResourceKind::ShaderResource, 63));
        let ok = device.create_pipeline_state(PipelineStateDescription {
            effect: Some(Arc::new(edge)),
            input_elements: vec![InputElement::new("POSITION", 7, VertexFormat::Float3, 0)],
            ..Default::default()
        });
        assert!(ok.is_ok());
    }

    #[test]
    fn creation_on_the_render_thread_uses_the_primary() {
        let (device, primary, secondary) = device();
        device.begin();
        {
            let context = device.use_creation_context();
            assert!(context.is_primary());
        }
        assert!(device.take_primary_disturbed());
        assert!(!device.take_primary_disturbed());
        device.end();
        assert!(secondary.is_empty());
        assert_eq!(primary.len(), 2);
    }

    #[test]
    fn nested_creation_on_the_render_thread() {
        let (device, primary, secondary) = device();
        device.begin();
        let outer = device.use_creation_context();
        let inner = device.use_creation_context();
        assert!(inner.is_primary());
        inner.driver().gen_buffer();
        drop(inner);
        outer.driver().gen_buffer();
        drop(outer);
        device.end();
        assert_eq!(primary.count(|c| matches!(c, Call::GenBuffer(_))), 2);
        assert!(secondary.is_empty());
    }

    #[test]
    #[cfg(not(target_arch = "wasm32"))]
    fn linking_while_holding_a_context() {
        let (device, _, secondary) = device();
        std::thread::spawn(move || {
            let held = device.use_creation_context();
            let pipeline = device
                .create_pipeline_state(PipelineStateDescription {
                    effect: Some(Arc::new(EffectBytecode::new(21))),
                    ..Default::default()
                })
                .unwrap();
            assert!(pipeline.program().is_some());
            drop(held);
        })
        .join()
        .unwrap();
        let calls = secondary.take();
        assert_eq!(calls.iter().filter(|c| **c == Call::MakeCurrent).count(), 1);
        assert!(calls.contains(&Call::CreateProgram(21, false)));
        assert_eq!(calls.last(), Some(&Call::ReleaseCurrent));
    }

    #[test]
    fn only_one_command_list_claim() {
        let (device, _, _) = device();
        device.claim_command_list().unwrap();
        assert!(matches!(
            device.claim_command_list(),
            Err(Error::MultipleCommandLists)
        ));
        device.release_command_list();
        assert!(device.claim_command_list().is_ok());
    }
}
