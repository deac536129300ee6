// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Resource creation from threads other than the render thread.
//!
//! These tests share the process-wide creation slot, so they only assert
//! orderings that hold no matter which other test holds it in between.
#![cfg(not(target_arch = "wasm32"))]

use bound_state::driver::{BufferId, BufferTarget, BufferUsageHint};
use bound_state::imp::{Call, CallLog, RecordingDriver};
use bound_state::pipeline::{EffectBytecode, PipelineStateDescription};
use bound_state::resources::{Buffer, BufferDescription, BufferKind};
use bound_state::{DeviceConfig, GraphicsDevice};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

fn device() -> (Arc<GraphicsDevice<RecordingDriver>>, CallLog, CallLog) {
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
fn worker_threads_create_on_the_secondary_context() {
    let (device, primary, secondary) = device();
    device.begin();
    let worker = {
        let device = device.clone();
        std::thread::spawn(move || {
            Buffer::new(
                &device,
                BufferDescription::new(256, BufferKind::Vertex),
                "worker",
            )
            .unwrap()
        })
    };
    let buffer = worker.join().unwrap();
    assert_eq!(buffer.buffer_id(), BufferId(1));
    assert_eq!(
        secondary.take(),
        vec![
            Call::MakeCurrent,
            Call::GenBuffer(BufferId(1)),
            Call::BindBuffer(BufferTarget::CopyWrite, BufferId(1)),
            Call::BufferData(BufferTarget::CopyWrite, 256, BufferUsageHint::StaticDraw),
            Call::BindBuffer(BufferTarget::CopyWrite, BufferId::NONE),
            Call::Flush,
            Call::ReleaseCurrent,
        ]
    );
    //the render thread's context saw nothing but its own begin
    assert_eq!(primary.calls(), vec![Call::MakeCurrent]);
    device.end();
}

#[test]
fn async_acquisition_waits_for_the_holder() {
    let (device, _primary, secondary) = device();
    let (held_tx, held_rx) = std::sync::mpsc::channel();
    let released = Arc::new(AtomicBool::new(false));
    let holder = {
        let device = device.clone();
        let released = released.clone();
        std::thread::spawn(move || {
            let context = device.use_creation_context();
            assert!(!context.is_primary());
            held_tx.send(()).unwrap();
            std::thread::sleep(Duration::from_millis(20));
            released.store(true, Ordering::SeqCst);
        })
    };
    held_rx.recv().unwrap();
    let context = test_executors::spin_on(device.use_creation_context_async());
    assert!(released.load(Ordering::SeqCst));
    assert!(!context.is_primary());
    drop(context);
    holder.join().unwrap();

    let calls = secondary.take();
    assert_eq!(calls.iter().filter(|c| **c == Call::MakeCurrent).count(), 2);
    assert_eq!(calls.iter().filter(|c| **c == Call::ReleaseCurrent).count(), 2);
    //each holder releases before the next makes the context current
    for pair in calls.windows(2) {
        if pair[1] == Call::MakeCurrent {
            assert_eq!(pair[0], Call::ReleaseCurrent);
        }
    }
}

#[test]
fn render_thread_async_acquisition_is_immediate() {
    let (device, primary, secondary) = device();
    device.begin();
    let context = test_executors::spin_on(device.use_creation_context_async());
    assert!(context.is_primary());
    drop(context);
    device.end();
    assert!(secondary.is_empty());
    assert_eq!(primary.calls(), vec![Call::MakeCurrent, Call::ReleaseCurrent]);
}

#[test]
fn pause_blocks_creation_until_resume() {
    let (device, primary, secondary) = device();
    device.begin();
    device.pause();
    assert!(device.is_paused());
    assert_eq!(
        secondary.take(),
        vec![Call::MakeCurrent, Call::Finish, Call::ReleaseCurrent]
    );

    let created = Arc::new(AtomicBool::new(false));
    let worker = {
        let device = device.clone();
        let created = created.clone();
        std::thread::spawn(move || {
            Buffer::new(
                &device,
                BufferDescription::new(16, BufferKind::Index),
                "paused",
            )
            .unwrap();
            created.store(true, Ordering::SeqCst);
        })
    };
    std::thread::sleep(Duration::from_millis(20));
    assert!(!created.load(Ordering::SeqCst));

    device.resume();
    worker.join().unwrap();
    assert!(created.load(Ordering::SeqCst));
    assert!(!device.is_paused());
    assert_eq!(
        primary.calls(),
        vec![Call::MakeCurrent, Call::ReleaseCurrent, Call::MakeCurrent]
    );
    device.end();
}

#[test]
fn creating_inside_a_held_context_shares_it() {
    let (device, _primary, secondary) = device();
    let (done_tx, done_rx) = std::sync::mpsc::channel();
    let worker = {
        let device = device.clone();
        std::thread::spawn(move || {
            let outer = device.use_creation_context();
            let inner = device.use_creation_context();
            assert!(inner.is_nested());
            Buffer::new(
                &device,
                BufferDescription::new(64, BufferKind::Vertex),
                "nested",
            )
            .unwrap();
            let pipeline = device
                .create_pipeline_state(PipelineStateDescription {
                    effect: Some(Arc::new(EffectBytecode::new(31))),
                    ..Default::default()
                })
                .unwrap();
            assert!(pipeline.program().is_some());
            drop(inner);
            drop(outer);
            done_tx.send(()).unwrap();
        })
    };
    done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("creation inside a held context never finished");
    worker.join().unwrap();

    let calls = secondary.take();
    assert_eq!(calls.first(), Some(&Call::MakeCurrent));
    assert_eq!(calls.iter().filter(|c| **c == Call::MakeCurrent).count(), 1);
    assert_eq!(calls.iter().filter(|c| **c == Call::Flush).count(), 1);
    assert_eq!(calls.last(), Some(&Call::ReleaseCurrent));
    assert!(calls.contains(&Call::GenBuffer(BufferId(1))));
    assert!(calls.contains(&Call::CreateProgram(31, false)));
}
