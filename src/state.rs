// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Fixed-function state objects.

Each state is built once from a description, translating it into driver
enumerants and packing the fields that usually change together into integer
hashes.  At draw time `apply` compares those hashes against the mirror's record
of what was last applied and emits only the calls whose values changed,
updating the record as it goes.
*/
pub mod blend;
pub mod depth_stencil;
pub mod rasterizer;

pub use blend::{AppliedBlend, BlendState, BlendStateDescription};
pub use depth_stencil::{
    AppliedDepthStencil, DepthStencilState, DepthStencilStateDescription, StencilFaceDescription,
};
pub use rasterizer::{
    AppliedRasterizer, CullMode, FillMode, RasterizerState, RasterizerStateDescription,
};

use crate::driver::{Capability, Driver};

/// Emits `enable`/`disable` when `wanted` differs from `current`, then records it.
pub(crate) fn toggle<D: Driver>(
    driver: &mut D,
    capability: Capability,
    current: &mut bool,
    wanted: bool,
) {
    if *current != wanted {
        if wanted {
            driver.enable(capability);
        } else {
            driver.disable(capability);
        }
        *current = wanted;
    }
}
