// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::bittricks::u8s_to_u32;
use crate::driver::{Capability, Driver, Face, FrontFace, PolygonMode};
use crate::state::toggle;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FillMode {
    Solid,
    Wireframe,
}

#[derive(Debug, Clone, Copy)]
pub struct RasterizerStateDescription {
    pub fill_mode: FillMode,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub depth_bias: i32,
    pub slope_scale_depth_bias: f32,
    /// When false, fragments outside the depth range are clamped instead of clipped.
    pub depth_clip_enable: bool,
    pub scissor_test_enable: bool,
}

impl Default for RasterizerStateDescription {
    fn default() -> Self {
        RasterizerStateDescription {
            fill_mode: FillMode::Solid,
            cull_mode: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
            depth_bias: 0,
            slope_scale_depth_bias: 0.0,
            depth_clip_enable: true,
            scissor_test_enable: false,
        }
    }
}

impl RasterizerStateDescription {
    pub fn cull_none() -> Self {
        RasterizerStateDescription {
            cull_mode: CullMode::None,
            ..Default::default()
        }
    }

    pub fn wireframe() -> Self {
        RasterizerStateDescription {
            fill_mode: FillMode::Wireframe,
            cull_mode: CullMode::None,
            ..Default::default()
        }
    }
}

// compared bitwise so descriptions can key a cache
impl PartialEq for RasterizerStateDescription {
    fn eq(&self, other: &Self) -> bool {
        self.fill_mode == other.fill_mode
            && self.cull_mode == other.cull_mode
            && self.front_face == other.front_face
            && self.depth_bias == other.depth_bias
            && self.slope_scale_depth_bias.to_bits() == other.slope_scale_depth_bias.to_bits()
            && self.depth_clip_enable == other.depth_clip_enable
            && self.scissor_test_enable == other.scissor_test_enable
    }
}
impl Eq for RasterizerStateDescription {}

impl Hash for RasterizerStateDescription {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fill_mode.hash(state);
        self.cull_mode.hash(state);
        self.front_face.hash(state);
        self.depth_bias.hash(state);
        self.slope_scale_depth_bias.to_bits().hash(state);
        self.depth_clip_enable.hash(state);
        self.scissor_test_enable.hash(state);
    }
}

/// What the driver last saw for rasterization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppliedRasterizer {
    pub mode_hash: u32,
    pub polygon_mode: PolygonMode,
    pub cull_enabled: bool,
    pub cull_face: Face,
    pub front_face: FrontFace,
    pub depth_clamp: bool,
    pub scissor_test: bool,
    pub polygon_offset_enabled: bool,
    /// (slope factor, constant units)
    pub polygon_offset: (f32, f32),
}

impl AppliedRasterizer {
    /// A fresh context's rasterizer state.
    pub fn baseline() -> Self {
        AppliedRasterizer {
            mode_hash: mode_hash(PolygonMode::Fill, None, FrontFace::CounterClockwise),
            polygon_mode: PolygonMode::Fill,
            cull_enabled: false,
            cull_face: Face::Back,
            front_face: FrontFace::CounterClockwise,
            depth_clamp: false,
            scissor_test: false,
            polygon_offset_enabled: false,
            polygon_offset: (0.0, 0.0),
        }
    }
}

fn mode_hash(polygon_mode: PolygonMode, cull: Option<Face>, front_face: FrontFace) -> u32 {
    let cull = match cull {
        None => 0,
        Some(Face::Front) => 1,
        Some(Face::Back) => 2,
        Some(Face::FrontAndBack) => 3,
    };
    u8s_to_u32([polygon_mode as u8, cull, front_face as u8, 0])
}

/// Resolved rasterizer state.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterizerState {
    polygon_mode: PolygonMode,
    cull: Option<Face>,
    front_face: FrontFace,
    depth_clamp: bool,
    emulate_depth_clamp: bool,
    scissor_test: bool,
    polygon_offset: Option<(f32, f32)>,
    mode_hash: u32,
}

impl RasterizerState {
    /// Without hardware depth clamp the program emulates it instead; see
    /// [`Self::emulate_depth_clamp`].
    pub fn new(description: &RasterizerStateDescription, has_depth_clamp: bool) -> Self {
        let polygon_mode = match description.fill_mode {
            FillMode::Solid => PolygonMode::Fill,
            FillMode::Wireframe => PolygonMode::Line,
        };
        let cull = match description.cull_mode {
            CullMode::None => None,
            CullMode::Front => Some(Face::Front),
            CullMode::Back => Some(Face::Back),
        };
        let wants_clamp = !description.depth_clip_enable;
        let polygon_offset =
            if description.depth_bias != 0 || description.slope_scale_depth_bias != 0.0 {
                Some((
                    description.slope_scale_depth_bias,
                    description.depth_bias as f32,
                ))
            } else {
                None
            };
        RasterizerState {
            polygon_mode,
            cull,
            front_face: description.front_face,
            depth_clamp: wants_clamp && has_depth_clamp,
            emulate_depth_clamp: wants_clamp && !has_depth_clamp,
            scissor_test: description.scissor_test_enable,
            polygon_offset,
            mode_hash: mode_hash(polygon_mode, cull, description.front_face),
        }
    }

    pub fn emulate_depth_clamp(&self) -> bool {
        self.emulate_depth_clamp
    }
    pub fn mode_hash(&self) -> u32 {
        self.mode_hash
    }
    pub fn scissor_test(&self) -> bool {
        self.scissor_test
    }

    pub(crate) fn apply<D: Driver>(&self, driver: &mut D, applied: &mut AppliedRasterizer) {
        if self.mode_hash != applied.mode_hash {
            if self.polygon_mode != applied.polygon_mode {
                driver.polygon_mode(self.polygon_mode);
                applied.polygon_mode = self.polygon_mode;
            }
            toggle(
                driver,
                Capability::CullFace,
                &mut applied.cull_enabled,
                self.cull.is_some(),
            );
            if let Some(face) = self.cull
                && face != applied.cull_face
            {
                driver.cull_face(face);
                applied.cull_face = face;
            }
            if self.front_face != applied.front_face {
                driver.front_face(self.front_face);
                applied.front_face = self.front_face;
            }
            applied.mode_hash = self.mode_hash;
        }
        toggle(
            driver,
            Capability::DepthClamp,
            &mut applied.depth_clamp,
            self.depth_clamp,
        );
        toggle(
            driver,
            Capability::ScissorTest,
            &mut applied.scissor_test,
            self.scissor_test,
        );
        toggle(
            driver,
            Capability::PolygonOffsetFill,
            &mut applied.polygon_offset_enabled,
            self.polygon_offset.is_some(),
        );
        if let Some(offset) = self.polygon_offset
            && offset != applied.polygon_offset
        {
            driver.polygon_offset(offset.0, offset.1);
            applied.polygon_offset = offset;
        }
    }
}

impl Default for RasterizerState {
    fn default() -> Self {
        RasterizerState::new(&RasterizerStateDescription::default(), true)
    }
}
