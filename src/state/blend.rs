// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::bittricks::{u8s_to_u32, u16s_to_u32};
use crate::driver::{BlendEquation, BlendFactor, Capability, ColorWriteChannels, Driver};
use crate::state::toggle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendStateDescription {
    pub alpha_to_coverage: bool,
    pub enabled: bool,
    pub color_source: BlendFactor,
    pub color_destination: BlendFactor,
    pub color_operation: BlendEquation,
    pub alpha_source: BlendFactor,
    pub alpha_destination: BlendFactor,
    pub alpha_operation: BlendEquation,
    pub write_mask: ColorWriteChannels,
}

impl BlendStateDescription {
    /// Blending off, all channels written.
    pub const fn opaque() -> Self {
        BlendStateDescription {
            alpha_to_coverage: false,
            enabled: false,
            color_source: BlendFactor::One,
            color_destination: BlendFactor::Zero,
            color_operation: BlendEquation::Add,
            alpha_source: BlendFactor::One,
            alpha_destination: BlendFactor::Zero,
            alpha_operation: BlendEquation::Add,
            write_mask: ColorWriteChannels::ALL,
        }
    }

    /// Premultiplied alpha.
    pub const fn alpha_blend() -> Self {
        BlendStateDescription {
            enabled: true,
            color_source: BlendFactor::One,
            color_destination: BlendFactor::OneMinusSrcAlpha,
            alpha_source: BlendFactor::One,
            alpha_destination: BlendFactor::OneMinusSrcAlpha,
            ..BlendStateDescription::opaque()
        }
    }

    pub const fn non_premultiplied() -> Self {
        BlendStateDescription {
            enabled: true,
            color_source: BlendFactor::SrcAlpha,
            color_destination: BlendFactor::OneMinusSrcAlpha,
            alpha_source: BlendFactor::SrcAlpha,
            alpha_destination: BlendFactor::OneMinusSrcAlpha,
            ..BlendStateDescription::opaque()
        }
    }

    pub const fn additive() -> Self {
        BlendStateDescription {
            enabled: true,
            color_source: BlendFactor::SrcAlpha,
            color_destination: BlendFactor::One,
            alpha_source: BlendFactor::SrcAlpha,
            alpha_destination: BlendFactor::One,
            ..BlendStateDescription::opaque()
        }
    }
}

impl Default for BlendStateDescription {
    fn default() -> Self {
        BlendStateDescription::opaque()
    }
}

fn equation_hash(color: BlendEquation, alpha: BlendEquation) -> u32 {
    u16s_to_u32(color as u16, alpha as u16)
}

fn function_hash(
    src_color: BlendFactor,
    dst_color: BlendFactor,
    src_alpha: BlendFactor,
    dst_alpha: BlendFactor,
) -> u32 {
    u8s_to_u32([
        src_color as u8,
        dst_color as u8,
        src_alpha as u8,
        dst_alpha as u8,
    ])
}

/// What the driver last saw for blending.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppliedBlend {
    pub enabled: bool,
    pub alpha_to_coverage: bool,
    pub equation_hash: u32,
    pub function_hash: u32,
    pub color_mask: ColorWriteChannels,
    pub blend_factor: [f32; 4],
}

impl AppliedBlend {
    /// A fresh context's blend state.
    pub fn baseline() -> Self {
        AppliedBlend {
            enabled: false,
            alpha_to_coverage: false,
            equation_hash: equation_hash(BlendEquation::Add, BlendEquation::Add),
            function_hash: function_hash(
                BlendFactor::One,
                BlendFactor::Zero,
                BlendFactor::One,
                BlendFactor::Zero,
            ),
            color_mask: ColorWriteChannels::ALL,
            blend_factor: [0.0; 4],
        }
    }
}

/// Resolved blend state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlendState {
    description: BlendStateDescription,
    equation_hash: u32,
    function_hash: u32,
}

impl BlendState {
    pub fn new(description: &BlendStateDescription) -> Self {
        BlendState {
            description: *description,
            equation_hash: equation_hash(description.color_operation, description.alpha_operation),
            function_hash: function_hash(
                description.color_source,
                description.color_destination,
                description.alpha_source,
                description.alpha_destination,
            ),
        }
    }

    pub fn description(&self) -> &BlendStateDescription {
        &self.description
    }
    pub fn is_enabled(&self) -> bool {
        self.description.enabled
    }
    pub fn write_mask(&self) -> ColorWriteChannels {
        self.description.write_mask
    }
    pub fn equation_hash(&self) -> u32 {
        self.equation_hash
    }
    pub fn function_hash(&self) -> u32 {
        self.function_hash
    }

    /// Brings the driver from `applied` to this state.
    ///
    /// Equation and function are written whenever they differ, even with
    /// blending disabled on both sides, so `applied` always holds the real
    /// driver values and a later enable needs no extra calls.
    pub(crate) fn apply<D: Driver>(
        &self,
        driver: &mut D,
        applied: &mut AppliedBlend,
        blend_factor: [f32; 4],
    ) {
        let d = &self.description;
        toggle(driver, Capability::Blend, &mut applied.enabled, d.enabled);
        toggle(
            driver,
            Capability::SampleAlphaToCoverage,
            &mut applied.alpha_to_coverage,
            d.alpha_to_coverage,
        );
        if self.equation_hash != applied.equation_hash {
            driver.blend_equation_separate(d.color_operation, d.alpha_operation);
            applied.equation_hash = self.equation_hash;
        }
        if self.function_hash != applied.function_hash {
            driver.blend_func_separate(
                d.color_source,
                d.color_destination,
                d.alpha_source,
                d.alpha_destination,
            );
            applied.function_hash = self.function_hash;
        }
        if blend_factor != applied.blend_factor {
            driver.blend_color(blend_factor);
            applied.blend_factor = blend_factor;
        }
        if d.write_mask != applied.color_mask {
            self.restore_color_mask(driver);
            applied.color_mask = d.write_mask;
        }
    }

    /// Writes this state's color mask, e.g. after a clear forced all channels on.
    pub(crate) fn restore_color_mask<D: Driver>(&self, driver: &mut D) {
        driver.color_mask(self.description.write_mask);
    }
}

impl Default for BlendState {
    fn default() -> Self {
        BlendState::new(&BlendStateDescription::opaque())
    }
}
