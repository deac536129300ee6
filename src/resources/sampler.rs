use crate::driver::{CompareFunction, Driver, TextureFilter, TextureParameter, TextureTarget, TextureWrap};
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Point,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureAddressMode {
    Wrap,
    Mirror,
    Clamp,
    Border,
    MirrorOnce,
}

impl TextureAddressMode {
    fn wrap(self) -> TextureWrap {
        match self {
            TextureAddressMode::Wrap => TextureWrap::Repeat,
            TextureAddressMode::Mirror => TextureWrap::MirroredRepeat,
            TextureAddressMode::Clamp => TextureWrap::ClampToEdge,
            TextureAddressMode::Border => TextureWrap::ClampToBorder,
            TextureAddressMode::MirrorOnce => TextureWrap::MirrorClampToEdge,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerStateDescription {
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub mip_filter: Filter,
    pub address_u: TextureAddressMode,
    pub address_v: TextureAddressMode,
    pub address_w: TextureAddressMode,
    pub mip_lod_bias: f32,
    pub max_anisotropy: u32,
    pub comparison: Option<CompareFunction>,
    pub border_color: [f32; 4],
    pub min_lod: f32,
    pub max_lod: f32,
}

impl SamplerStateDescription {
    pub fn linear_clamp() -> Self {
        SamplerStateDescription {
            min_filter: Filter::Linear,
            mag_filter: Filter::Linear,
            mip_filter: Filter::Linear,
            address_u: TextureAddressMode::Clamp,
            address_v: TextureAddressMode::Clamp,
            address_w: TextureAddressMode::Clamp,
            mip_lod_bias: 0.0,
            max_anisotropy: 1,
            comparison: None,
            border_color: [0.0; 4],
            min_lod: -f32::MAX,
            max_lod: f32::MAX,
        }
    }

    pub fn point_wrap() -> Self {
        SamplerStateDescription {
            min_filter: Filter::Point,
            mag_filter: Filter::Point,
            mip_filter: Filter::Point,
            address_u: TextureAddressMode::Wrap,
            address_v: TextureAddressMode::Wrap,
            address_w: TextureAddressMode::Wrap,
            ..SamplerStateDescription::linear_clamp()
        }
    }

    /// The parameters a freshly created texture starts with.
    pub fn driver_default() -> Self {
        SamplerStateDescription {
            min_filter: Filter::Point,
            mag_filter: Filter::Linear,
            mip_filter: Filter::Linear,
            address_u: TextureAddressMode::Wrap,
            address_v: TextureAddressMode::Wrap,
            address_w: TextureAddressMode::Wrap,
            min_lod: -1000.0,
            max_lod: 1000.0,
            ..SamplerStateDescription::linear_clamp()
        }
    }

    fn min_filter(&self, has_mipmap: bool) -> TextureFilter {
        match (self.min_filter, has_mipmap, self.mip_filter) {
            (Filter::Point, false, _) => TextureFilter::Nearest,
            (Filter::Linear, false, _) => TextureFilter::Linear,
            (Filter::Point, true, Filter::Point) => TextureFilter::NearestMipmapNearest,
            (Filter::Linear, true, Filter::Point) => TextureFilter::LinearMipmapNearest,
            (Filter::Point, true, Filter::Linear) => TextureFilter::NearestMipmapLinear,
            (Filter::Linear, true, Filter::Linear) => TextureFilter::LinearMipmapLinear,
        }
    }

    fn mag_filter(&self) -> TextureFilter {
        match self.mag_filter {
            Filter::Point => TextureFilter::Nearest,
            Filter::Linear => TextureFilter::Linear,
        }
    }

    fn parameters(&self, has_mipmap: bool) -> [TextureParameter; 11] {
        [
            TextureParameter::MinFilter(self.min_filter(has_mipmap)),
            TextureParameter::MagFilter(self.mag_filter()),
            TextureParameter::WrapS(self.address_u.wrap()),
            TextureParameter::WrapT(self.address_v.wrap()),
            TextureParameter::WrapR(self.address_w.wrap()),
            TextureParameter::MinLod(self.min_lod),
            TextureParameter::MaxLod(self.max_lod),
            TextureParameter::LodBias(self.mip_lod_bias),
            TextureParameter::MaxAnisotropy(self.max_anisotropy as f32),
            TextureParameter::Compare(self.comparison),
            TextureParameter::BorderColor(self.border_color),
        ]
    }
}

/// Sampling parameters, shared and compared by identity.
///
/// The binding model has no separate sampler objects, so applying a sampler
/// means writing texture parameters on whichever texture is bound.
#[derive(Clone)]
pub struct SamplerState {
    description: Arc<SamplerStateDescription>,
}

impl SamplerState {
    pub fn new(description: SamplerStateDescription) -> Self {
        SamplerState {
            description: Arc::new(description),
        }
    }

    pub fn description(&self) -> &SamplerStateDescription {
        &self.description
    }

    /// Writes the parameters that differ from `previous` onto the texture
    /// bound at `target`.
    pub(crate) fn apply<D: Driver>(
        &self,
        driver: &mut D,
        has_mipmap: bool,
        previous: &SamplerState,
        target: TextureTarget,
    ) {
        let old = previous.description.parameters(has_mipmap);
        for (new, old) in self.description.parameters(has_mipmap).into_iter().zip(old) {
            if new != old {
                driver.tex_parameter(target, new);
            }
        }
    }
}

impl PartialEq for SamplerState {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.description, &other.description)
    }
}
impl Eq for SamplerState {}

impl Hash for SamplerState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.description).hash(state);
    }
}

impl Debug for SamplerState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&*self.description, f)
    }
}
