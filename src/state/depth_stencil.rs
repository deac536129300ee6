// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::bittricks::u8s_to_u32;
use crate::driver::{Capability, CompareFunction, Driver, Face, StencilOperation};
use crate::state::toggle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilFaceDescription {
    pub fail: StencilOperation,
    pub depth_fail: StencilOperation,
    pub pass: StencilOperation,
    pub function: CompareFunction,
}

impl Default for StencilFaceDescription {
    fn default() -> Self {
        StencilFaceDescription {
            fail: StencilOperation::Keep,
            depth_fail: StencilOperation::Keep,
            pass: StencilOperation::Keep,
            function: CompareFunction::Always,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilStateDescription {
    pub depth_enable: bool,
    pub depth_write_enable: bool,
    pub depth_function: CompareFunction,
    pub stencil_enable: bool,
    pub stencil_read_mask: u8,
    pub stencil_write_mask: u8,
    pub front_face: StencilFaceDescription,
    pub back_face: StencilFaceDescription,
}

impl DepthStencilStateDescription {
    pub fn read_only() -> Self {
        DepthStencilStateDescription {
            depth_write_enable: false,
            ..Default::default()
        }
    }

    pub fn none() -> Self {
        DepthStencilStateDescription {
            depth_enable: false,
            depth_write_enable: false,
            ..Default::default()
        }
    }
}

impl Default for DepthStencilStateDescription {
    fn default() -> Self {
        DepthStencilStateDescription {
            depth_enable: true,
            depth_write_enable: true,
            depth_function: CompareFunction::LessEqual,
            stencil_enable: false,
            stencil_read_mask: 0xFF,
            stencil_write_mask: 0xFF,
            front_face: StencilFaceDescription::default(),
            back_face: StencilFaceDescription::default(),
        }
    }
}

/// Per-face stencil hashes as last applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AppliedStencilFace {
    pub function_hash: u32,
    pub operation_hash: u32,
}

/// What the driver last saw for depth and stencil.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AppliedDepthStencil {
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_function: CompareFunction,
    pub stencil_test: bool,
    pub stencil_write_mask: u8,
    pub stencil_reference: i32,
    pub front: AppliedStencilFace,
    pub back: AppliedStencilFace,
}

impl AppliedDepthStencil {
    /// A fresh context's depth/stencil state.
    pub fn baseline() -> Self {
        let face = StencilFace::new(&StencilFaceDescription::default(), 0xFF);
        AppliedDepthStencil {
            depth_test: false,
            depth_write: true,
            depth_function: CompareFunction::Less,
            stencil_test: false,
            stencil_write_mask: 0xFF,
            stencil_reference: 0,
            front: face.applied(),
            back: face.applied(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StencilFace {
    description: StencilFaceDescription,
    read_mask: u8,
    function_hash: u32,
    operation_hash: u32,
}

impl StencilFace {
    fn new(description: &StencilFaceDescription, read_mask: u8) -> Self {
        StencilFace {
            description: *description,
            read_mask,
            function_hash: u8s_to_u32([description.function as u8, read_mask, 0, 0]),
            operation_hash: u8s_to_u32([
                description.fail as u8,
                description.depth_fail as u8,
                description.pass as u8,
                0,
            ]),
        }
    }

    fn applied(&self) -> AppliedStencilFace {
        AppliedStencilFace {
            function_hash: self.function_hash,
            operation_hash: self.operation_hash,
        }
    }
}

/// Resolved depth/stencil state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthStencilState {
    depth_test: bool,
    depth_write: bool,
    depth_function: CompareFunction,
    stencil_test: bool,
    stencil_write_mask: u8,
    front: StencilFace,
    back: StencilFace,
}

impl DepthStencilState {
    /// Without a depth buffer the depth test is meaningless and stays off.
    pub fn new(description: &DepthStencilStateDescription, has_depth_buffer: bool) -> Self {
        DepthStencilState {
            depth_test: description.depth_enable && has_depth_buffer,
            depth_write: description.depth_write_enable,
            depth_function: description.depth_function,
            stencil_test: description.stencil_enable && has_depth_buffer,
            stencil_write_mask: description.stencil_write_mask,
            front: StencilFace::new(&description.front_face, description.stencil_read_mask),
            back: StencilFace::new(&description.back_face, description.stencil_read_mask),
        }
    }

    pub fn depth_test(&self) -> bool {
        self.depth_test
    }
    pub fn depth_write(&self) -> bool {
        self.depth_write
    }
    pub fn stencil_test(&self) -> bool {
        self.stencil_test
    }

    pub(crate) fn apply<D: Driver>(
        &self,
        driver: &mut D,
        applied: &mut AppliedDepthStencil,
        stencil_reference: i32,
    ) {
        toggle(driver, Capability::DepthTest, &mut applied.depth_test, self.depth_test);
        if self.depth_function != applied.depth_function {
            driver.depth_func(self.depth_function);
            applied.depth_function = self.depth_function;
        }
        if self.depth_write != applied.depth_write {
            driver.depth_mask(self.depth_write);
            applied.depth_write = self.depth_write;
        }
        toggle(
            driver,
            Capability::StencilTest,
            &mut applied.stencil_test,
            self.stencil_test,
        );
        if self.stencil_write_mask != applied.stencil_write_mask {
            driver.stencil_mask(self.stencil_write_mask);
            applied.stencil_write_mask = self.stencil_write_mask;
        }

        let reference_changed = stencil_reference != applied.stencil_reference;
        let front_function = reference_changed || self.front.function_hash != applied.front.function_hash;
        let back_function = reference_changed || self.back.function_hash != applied.back.function_hash;
        let same_function = self.front.function_hash == self.back.function_hash;
        if front_function && back_function && same_function {
            stencil_func(driver, Face::FrontAndBack, &self.front, stencil_reference);
        } else {
            if front_function {
                stencil_func(driver, Face::Front, &self.front, stencil_reference);
            }
            if back_function {
                stencil_func(driver, Face::Back, &self.back, stencil_reference);
            }
        }
        applied.stencil_reference = stencil_reference;
        applied.front.function_hash = self.front.function_hash;
        applied.back.function_hash = self.back.function_hash;

        let front_operation = self.front.operation_hash != applied.front.operation_hash;
        let back_operation = self.back.operation_hash != applied.back.operation_hash;
        if front_operation && back_operation && self.front.operation_hash == self.back.operation_hash {
            stencil_op(driver, Face::FrontAndBack, &self.front);
        } else {
            if front_operation {
                stencil_op(driver, Face::Front, &self.front);
            }
            if back_operation {
                stencil_op(driver, Face::Back, &self.back);
            }
        }
        applied.front.operation_hash = self.front.operation_hash;
        applied.back.operation_hash = self.back.operation_hash;
    }
}

fn stencil_func<D: Driver>(driver: &mut D, face: Face, stencil: &StencilFace, reference: i32) {
    driver.stencil_func_separate(face, stencil.description.function, reference, stencil.read_mask);
}

fn stencil_op<D: Driver>(driver: &mut D, face: Face, stencil: &StencilFace) {
    let d = &stencil.description;
    driver.stencil_op_separate(face, d.fail, d.depth_fail, d.pass);
}

impl Default for DepthStencilState {
    fn default() -> Self {
        DepthStencilState::new(&DepthStencilStateDescription::default(), true)
    }
}
