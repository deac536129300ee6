// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Framebuffer objects, keyed by their attachments.

Binding-based APIs render into framebuffer objects rather than taking targets
per pass, so each distinct combination of render targets and depth buffer
needs one.  [`FramebufferCache`] creates them on first use and hands the same
handle back afterwards.

The window's back buffer is special: it belongs to handle
[`FramebufferId::WINDOW`], can't be attached to a user framebuffer, and can't
be combined with a user depth buffer.
*/

use crate::Error;
use crate::driver::{
    Attachment, Driver, FramebufferId, FramebufferStatus, TextureId, TextureTarget,
};
use crate::resources::texture::Texture;
use std::collections::HashMap;
use wasm_safe_mutex::Mutex;

/// One attachable subresource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FboTexture {
    pub texture: Texture,
    pub array_slice: u32,
    pub mip_level: u32,
}

impl FboTexture {
    pub fn new(texture: &Texture) -> Self {
        FboTexture {
            texture: texture.clone(),
            array_slice: 0,
            mip_level: 0,
        }
    }

    /// Subresources are numbered mip-major within each array slice.
    pub fn from_subresource(texture: &Texture, subresource: u32) -> Self {
        let mips = texture.mip_levels().max(1);
        FboTexture {
            texture: texture.clone(),
            array_slice: subresource / mips,
            mip_level: subresource % mips,
        }
    }
}

/// Attachment set identifying a framebuffer.  Color order is significant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FboKey {
    pub depth_stencil: Option<FboTexture>,
    pub colors: Vec<FboTexture>,
}

impl FboKey {
    fn window(window: &Texture) -> Self {
        FboKey {
            depth_stencil: None,
            colors: vec![FboTexture::new(window)],
        }
    }
}

#[derive(Debug)]
pub struct FramebufferCache {
    window: Texture,
    existing: Mutex<HashMap<FboKey, FramebufferId>>,
}

impl FramebufferCache {
    pub fn new(window: Texture) -> Self {
        let mut existing = HashMap::new();
        existing.insert(FboKey::window(&window), FramebufferId::WINDOW);
        FramebufferCache {
            window,
            existing: Mutex::new(existing),
        }
    }

    pub fn window_texture(&self) -> &Texture {
        &self.window
    }

    /// Finds or creates the framebuffer for these attachments.
    ///
    /// Creating one leaves it bound on `driver`.
    pub fn find_or_create<D: Driver>(
        &self,
        driver: &mut D,
        depth_stencil: Option<&FboTexture>,
        colors: &[FboTexture],
    ) -> Result<FramebufferId, Error> {
        let mut existing = self.existing.lock_sync();
        let is_window = colors.len() == 1 && colors[0].texture == self.window;
        if is_window && depth_stencil.is_some() {
            logwise::error_sync!("window framebuffer requested with a user depth buffer");
            return Err(Error::WindowTargetWithDepth);
        }
        if depth_stencil.is_none() && (is_window || colors.is_empty()) {
            return Ok(FramebufferId::WINDOW);
        }
        //lookup borrows; creation copies
        let key = FboKey {
            depth_stencil: depth_stencil.cloned(),
            colors: colors.to_vec(),
        };
        if let Some(id) = existing.get(&key) {
            return Ok(*id);
        }
        let id = generate(driver, &key)?;
        existing.insert(key, id);
        Ok(id)
    }

    /// Framebuffer with `texture` as its only attachment, reusing any existing
    /// framebuffer where it is the depth buffer or the single color target.
    pub fn find_or_create_single<D: Driver>(
        &self,
        driver: &mut D,
        texture: &FboTexture,
    ) -> Result<FramebufferId, Error> {
        if texture.texture == self.window {
            return Ok(FramebufferId::WINDOW);
        }
        let is_depth = texture.texture.is_depth_stencil();
        {
            let existing = self.existing.lock_sync();
            let found = existing.iter().find(|(key, _)| {
                if is_depth {
                    key.depth_stencil.as_ref() == Some(texture)
                } else {
                    key.colors.len() == 1 && key.colors[0] == *texture
                }
            });
            if let Some((_, id)) = found {
                return Ok(*id);
            }
        }
        if is_depth {
            self.find_or_create(driver, Some(texture), &[])
        } else {
            self.find_or_create(driver, None, std::slice::from_ref(texture))
        }
    }

    /// Forgets every framebuffer after the context was lost.  The handles
    /// died with the context, so nothing is deleted.
    pub fn on_destroyed(&self) {
        let mut existing = self.existing.lock_sync();
        existing.clear();
        existing.insert(FboKey::window(&self.window), FramebufferId::WINDOW);
    }

    /// Deletes every framebuffer this cache created.
    pub fn delete_all<D: Driver>(&self, driver: &mut D) {
        let mut existing = self.existing.lock_sync();
        for (_, id) in existing.drain() {
            if id != FramebufferId::WINDOW {
                driver.delete_framebuffer(id);
            }
        }
        existing.insert(FboKey::window(&self.window), FramebufferId::WINDOW);
    }

    /// Cached framebuffers, including the window's.
    pub fn len(&self) -> usize {
        self.existing.lock_sync().len()
    }
}

fn generate<D: Driver>(driver: &mut D, key: &FboKey) -> Result<FramebufferId, Error> {
    let id = driver.gen_framebuffer();
    driver.bind_framebuffer(id);
    if let Err(e) = attach(driver, key) {
        driver.delete_framebuffer(id);
        return Err(e);
    }
    let status = driver.check_framebuffer_status();
    if status != FramebufferStatus::Complete {
        let first_color = key.colors.first().map(|c| c.texture.texture_id());
        let depth = key.depth_stencil.as_ref().map(|d| d.texture.texture_id());
        logwise::error_sync!(
            "framebuffer is incomplete: {status} with {count} color targets",
            status = logwise::privacy::LogIt(&status),
            count = key.colors.len()
        );
        driver.delete_framebuffer(id);
        return Err(Error::IncompleteFramebuffer {
            color_count: key.colors.len(),
            first_color,
            depth,
            status,
        });
    }
    logwise::trace_sync!(
        "created framebuffer {id} with {count} color targets",
        id = id.0,
        count = key.colors.len()
    );
    Ok(id)
}

fn attach<D: Driver>(driver: &mut D, key: &FboKey) -> Result<(), Error> {
    for (i, color) in key.colors.iter().enumerate() {
        attach_color(driver, Attachment::Color(i as u32), color)?;
    }
    let draw_buffers: Vec<Attachment> = (0..key.colors.len() as u32).map(Attachment::Color).collect();
    driver.draw_buffers(&draw_buffers);
    if let Some(depth) = &key.depth_stencil {
        attach_depth_stencil(driver, depth);
    }
    Ok(())
}

fn attach_color<D: Driver>(
    driver: &mut D,
    attachment: Attachment,
    color: &FboTexture,
) -> Result<(), Error> {
    let texture = &color.texture;
    match texture.target() {
        TextureTarget::Renderbuffer => {
            driver.framebuffer_renderbuffer(attachment, texture.texture_id());
        }
        TextureTarget::Texture1D | TextureTarget::Texture2D | TextureTarget::Texture2DMultisample => {
            driver.framebuffer_texture_2d(
                attachment,
                texture.target(),
                texture.texture_id(),
                color.mip_level,
            );
        }
        TextureTarget::TextureCubeMap => {
            driver.framebuffer_texture_2d(
                attachment,
                TextureTarget::CubeMapFace((color.array_slice % 6) as u8),
                texture.texture_id(),
                color.mip_level,
            );
        }
        TextureTarget::Texture2DArray | TextureTarget::Texture3D => {
            driver.framebuffer_texture_layer(
                attachment,
                texture.texture_id(),
                color.mip_level,
                color.array_slice,
            );
        }
        other @ TextureTarget::CubeMapFace(_) => {
            logwise::error_sync!(
                "can't attach {target} to a framebuffer",
                target = logwise::privacy::LogIt(&other)
            );
            return Err(Error::UnsupportedTextureTarget(other));
        }
    }
    Ok(())
}

fn attach_depth_stencil<D: Driver>(driver: &mut D, depth: &FboTexture) -> Attachment {
    let texture = &depth.texture;
    let shared = texture.stencil_id() == texture.texture_id();
    let attachment = if shared {
        Attachment::DepthStencil
    } else {
        Attachment::Depth
    };
    if texture.is_renderbuffer() {
        driver.framebuffer_renderbuffer(attachment, texture.texture_id());
        if texture.has_stencil() && !shared {
            driver.framebuffer_renderbuffer(Attachment::Stencil, texture.stencil_id());
        }
    } else {
        let target = if texture.is_multisample() {
            TextureTarget::Texture2DMultisample
        } else {
            TextureTarget::Texture2D
        };
        driver.framebuffer_texture_2d(attachment, target, texture.texture_id(), depth.mip_level);
    }
    attachment
}

/// Attaches `source` as the only attachment of the framebuffer bound on
/// `driver`, for reading back or copying from it.  Returns the attachment
/// point to pass to [`detach`].
pub(crate) fn attach_source<D: Driver>(
    driver: &mut D,
    source: &FboTexture,
) -> Result<Attachment, Error> {
    if source.texture.is_depth_stencil() {
        Ok(attach_depth_stencil(driver, source))
    } else {
        attach_color(driver, Attachment::Color(0), source)?;
        Ok(Attachment::Color(0))
    }
}

pub(crate) fn detach<D: Driver>(driver: &mut D, attachment: Attachment) {
    driver.framebuffer_texture_2d(attachment, TextureTarget::Texture2D, TextureId::NONE, 0);
}
