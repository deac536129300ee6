// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Render target sets map to cached framebuffer objects.

#[cfg(target_arch = "wasm32")]
wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_browser);

use bound_state::driver::{FramebufferId, FramebufferStatus, TextureId};
use bound_state::imp::{Call, CallLog, RecordingDriver};
use bound_state::resources::{Texture, TextureDescription};
use bound_state::{CommandList, DeviceConfig, Error, GraphicsDevice};
use std::sync::Arc;

fn device(primary: RecordingDriver) -> (Arc<GraphicsDevice<RecordingDriver>>, CallLog) {
    let log = primary.log();
    let device = GraphicsDevice::new(primary, RecordingDriver::new(), DeviceConfig::default());
    device.begin();
    (device, log)
}

fn color(id: u32) -> Texture {
    Texture::from_existing(TextureDescription::render_target(32, 32), TextureId(id), "color")
}

fn gen_count(log: &CallLog) -> usize {
    log.count(|c| matches!(c, Call::GenFramebuffer(_)))
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn same_targets_reuse_one_framebuffer() {
    let (device, log) = device(RecordingDriver::new());
    let mut list = CommandList::new(&device).unwrap();
    let a = color(100);
    let b = color(101);
    let depth = Texture::from_existing(
        TextureDescription::depth_stencil(32, 32, true),
        TextureId(102),
        "depth",
    );

    list.set_render_targets(Some(&depth), &[&a, &b]).unwrap();
    assert_eq!(gen_count(&log), 1);
    let framebuffer = list.bound_state().bound_framebuffer();
    assert_ne!(framebuffer, FramebufferId::WINDOW);

    log.clear();
    list.set_render_targets(Some(&depth), &[&a, &b]).unwrap();
    assert!(log.is_empty(), "rebinding the bound set is free");

    list.reset_targets();
    assert_eq!(log.take(), vec![Call::BindFramebuffer(FramebufferId::WINDOW)]);
    list.set_render_targets(Some(&depth), &[&a, &b]).unwrap();
    assert_eq!(log.take(), vec![Call::BindFramebuffer(framebuffer)]);

    //order is part of the key
    list.set_render_targets(Some(&depth), &[&b, &a]).unwrap();
    assert_eq!(gen_count(&log), 1);
    assert_ne!(list.bound_state().bound_framebuffer(), framebuffer);
    assert_eq!(device.framebuffers().len(), 3);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn window_target_needs_no_framebuffer() {
    let (device, log) = device(RecordingDriver::new());
    let mut list = CommandList::new(&device).unwrap();
    let window = device.window_texture().clone();
    log.clear();
    list.set_render_targets(None, &[&window]).unwrap();
    assert!(log.is_empty());
    assert_eq!(list.bound_state().bound_framebuffer(), FramebufferId::WINDOW);

    let depth = Texture::from_existing(
        TextureDescription::depth_stencil(1, 1, false),
        TextureId(7),
        "depth",
    );
    assert!(matches!(
        list.set_render_targets(Some(&depth), &[&window]),
        Err(Error::WindowTargetWithDepth)
    ));
    assert!(log.is_empty());
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn incomplete_framebuffers_are_not_cached() {
    let mut primary = RecordingDriver::new();
    primary.set_framebuffer_status(FramebufferStatus::Unsupported);
    let (device, log) = device(primary);
    let mut list = CommandList::new(&device).unwrap();
    log.clear();

    let err = list.set_render_targets(None, &[&color(5)]).unwrap_err();
    assert!(matches!(
        err,
        Error::IncompleteFramebuffer {
            color_count: 1,
            first_color: Some(TextureId(5)),
            depth: None,
            status: FramebufferStatus::Unsupported,
        }
    ));
    let calls = log.take();
    let created = calls.iter().find_map(|c| match c {
        Call::GenFramebuffer(id) => Some(*id),
        _ => None,
    });
    let Some(created) = created else {
        panic!("no framebuffer was generated");
    };
    assert!(calls.contains(&Call::DeleteFramebuffer(created)));
    assert_eq!(calls.last(), Some(&Call::BindFramebuffer(FramebufferId::WINDOW)));
    assert_eq!(device.framebuffers().len(), 1);
    assert_eq!(list.bound_state().bound_framebuffer(), FramebufferId::WINDOW);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn losing_the_context_forgets_framebuffers() {
    let (device, log) = device(RecordingDriver::new());
    let mut list = CommandList::new(&device).unwrap();
    let target = color(60);
    list.set_render_targets(None, &[&target]).unwrap();
    list.reset_targets();
    drop(list);

    device.on_destroyed();
    assert_eq!(device.framebuffers().len(), 1);
    let mut list = CommandList::new(&device).unwrap();
    list.set_render_targets(None, &[&target]).unwrap();
    assert_eq!(gen_count(&log), 2);
    list.reset_targets();
    drop(list);

    log.clear();
    {
        let context = device.use_creation_context();
        device.framebuffers().delete_all(&mut *context.driver());
    }
    assert_eq!(log.count(|c| matches!(c, Call::DeleteFramebuffer(_))), 1);
    assert_eq!(device.framebuffers().len(), 1);
}
