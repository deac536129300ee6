// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Switching pipelines between draws emits only the state that differs.

#[cfg(target_arch = "wasm32")]
wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_browser);

use bound_state::driver::{BlendFactor, Capability, PrimitiveType};
use bound_state::imp::{Call, CallLog, RecordingDriver};
use bound_state::pipeline::{EffectBytecode, PipelineState, PipelineStateDescription};
use bound_state::state::BlendStateDescription;
use bound_state::{CommandList, DeviceConfig, GraphicsDevice};
use std::sync::Arc;

fn device() -> (Arc<GraphicsDevice<RecordingDriver>>, CallLog) {
    let primary = RecordingDriver::new();
    let log = primary.log();
    let device = GraphicsDevice::new(primary, RecordingDriver::new(), DeviceConfig::default());
    device.begin();
    (device, log)
}

fn pipeline(
    device: &GraphicsDevice<RecordingDriver>,
    effect: u64,
    blend: BlendStateDescription,
) -> Arc<PipelineState> {
    device
        .create_pipeline_state(PipelineStateDescription {
            effect: Some(Arc::new(EffectBytecode::new(effect))),
            blend,
            ..Default::default()
        })
        .unwrap()
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn switching_to_alpha_blend_emits_program_and_blend_only() {
    let (device, log) = device();
    let opaque = pipeline(&device, 1, BlendStateDescription::opaque());
    let blended = pipeline(&device, 2, BlendStateDescription::alpha_blend());
    let opaque_program = opaque.program().unwrap().program_id();
    let blended_program = blended.program().unwrap().program_id();

    let mut list = CommandList::new(&device).unwrap();
    list.set_pipeline_state(Some(&opaque));
    list.draw(3, 0);
    assert!(log.calls().contains(&Call::UseProgram(opaque_program)));

    log.clear();
    list.set_pipeline_state(Some(&blended));
    list.draw(3, 0);
    assert_eq!(
        log.take(),
        vec![
            Call::UseProgram(blended_program),
            Call::Enable(Capability::Blend),
            Call::BlendFuncSeparate(
                BlendFactor::One,
                BlendFactor::OneMinusSrcAlpha,
                BlendFactor::One,
                BlendFactor::OneMinusSrcAlpha
            ),
            Call::DrawArrays(PrimitiveType::TriangleList, 0, 3),
        ]
    );

    //the opaque function is written back even with blending off
    list.set_pipeline_state(Some(&opaque));
    list.draw(3, 0);
    assert_eq!(
        log.take(),
        vec![
            Call::UseProgram(opaque_program),
            Call::Disable(Capability::Blend),
            Call::BlendFuncSeparate(
                BlendFactor::One,
                BlendFactor::Zero,
                BlendFactor::One,
                BlendFactor::Zero
            ),
            Call::DrawArrays(PrimitiveType::TriangleList, 0, 3),
        ]
    );
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn blend_only_switch_keeps_the_program() {
    let (device, log) = device();
    let opaque = pipeline(&device, 5, BlendStateDescription::opaque());
    let blended = pipeline(&device, 5, BlendStateDescription::alpha_blend());
    assert!(!Arc::ptr_eq(&opaque, &blended));
    assert!(Arc::ptr_eq(
        opaque.program().unwrap(),
        blended.program().unwrap()
    ));

    let mut list = CommandList::new(&device).unwrap();
    log.clear();
    list.set_pipeline_state(Some(&opaque));
    list.draw(3, 0);
    list.set_pipeline_state(Some(&blended));
    list.draw(3, 0);
    assert_eq!(
        log.since_last_draw(),
        Vec::<Call>::new(),
        "nothing follows the last draw"
    );
    let calls = log.take();
    assert_eq!(calls.iter().filter(|c| matches!(c, Call::UseProgram(_))).count(), 1);
    let first_draw = calls
        .iter()
        .position(|c| matches!(c, Call::DrawArrays(..)))
        .unwrap();
    assert_eq!(
        &calls[first_draw + 1..],
        &[
            Call::Enable(Capability::Blend),
            Call::BlendFuncSeparate(
                BlendFactor::One,
                BlendFactor::OneMinusSrcAlpha,
                BlendFactor::One,
                BlendFactor::OneMinusSrcAlpha
            ),
            Call::DrawArrays(PrimitiveType::TriangleList, 0, 3),
        ]
    );
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn equal_descriptions_share_a_pipeline_and_program() {
    let (device, log) = device();
    let first = pipeline(&device, 3, BlendStateDescription::additive());
    let second = pipeline(&device, 3, BlendStateDescription::additive());
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(
        log.count(|c| matches!(c, Call::CreateProgram(3, _))),
        1
    );

    let mut list = CommandList::new(&device).unwrap();
    list.set_pipeline_state(Some(&first));
    list.draw(3, 0);
    list.set_pipeline_state(Some(&second));
    list.draw(3, 0);
    assert_eq!(log.count(|c| matches!(c, Call::UseProgram(_))), 1);
    assert_eq!(
        log.since_last_draw(),
        Vec::<Call>::new(),
        "nothing follows the last draw"
    );
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn setting_state_without_drawing_emits_nothing() {
    let (device, log) = device();
    let blended = pipeline(&device, 4, BlendStateDescription::non_premultiplied());
    let mut list = CommandList::new(&device).unwrap();
    log.clear();
    list.set_pipeline_state(Some(&blended));
    list.set_stencil_reference(3);
    list.set_blend_factor([0.5; 4]);
    assert!(log.is_empty());

    list.draw(1, 0);
    let calls = log.take();
    assert!(calls.contains(&Call::Enable(Capability::Blend)));
    assert_eq!(
        calls.last(),
        Some(&Call::DrawArrays(PrimitiveType::TriangleList, 0, 1))
    );
}
