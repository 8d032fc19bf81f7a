//! Path-keyed sharing of decoded images.
//!
//! Loading the same file twice should produce one decode and one GPU texture,
//! so [`TextureCache`] keys [`TextureImage`]s by their path string and hands
//! out shared handles. A failed decode leaves no entry behind; the next
//! request for that path tries again, which matters when an asset shows up
//! on disk after the first frame asked for it.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::context::RenderContext;
use crate::errors::Result;
use crate::gpu::texture::{Sampling, TextureImage};

/// Shared store of decoded images, keyed by the path they were loaded from.
#[derive(Debug, Default)]
pub struct TextureCache {
    entries: FxHashMap<String, Rc<TextureImage>>,
}

impl TextureCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieve the image for `path`, decoding and caching it on first use.
    ///
    /// A first retrieval with `keep_data = false` uploads the image with
    /// default sampling and drops the CPU pixels; with `keep_data = true` the
    /// pixels stay available and the caller uploads when it wants to. Later
    /// retrievals return the cached image as-is.
    ///
    /// # Errors
    ///
    /// Decode and upload failures pass through; a decode failure caches
    /// nothing.
    pub fn get(
        &mut self,
        ctx: &RenderContext,
        path: &str,
        keep_data: bool,
    ) -> Result<Rc<TextureImage>> {
        let fresh = !self.entries.contains_key(path);
        let image = self.get_with(path, || {
            TextureImage::from_file(path)
                .inspect_err(|err| log::error!("failed to load texture \"{path}\": {err}"))
        })?;
        if fresh && !keep_data {
            image.upload(ctx, Sampling::default())?;
            image.release_data();
        }
        Ok(image)
    }

    /// Retrieve the image for `path`, producing it through `load` on a miss.
    ///
    /// This is [`get`](Self::get) without the GPU side: the loader runs at
    /// most once per cached path, and its failure is returned without
    /// inserting anything.
    ///
    /// # Errors
    ///
    /// Whatever `load` returns.
    pub fn get_with<F>(&mut self, path: &str, load: F) -> Result<Rc<TextureImage>>
    where
        F: FnOnce() -> Result<TextureImage>,
    {
        if !self.entries.contains_key(path) {
            let image = load()?;
            log::debug!(
                "cached texture \"{path}\" ({}x{}, {} channels{})",
                image.width(),
                image.height(),
                image.channels(),
                if image.is_hdr() { ", hdr" } else { "" },
            );
            self.entries.insert(path.to_owned(), Rc::new(image));
        }
        Ok(Rc::clone(&self.entries[path]))
    }

    /// Drop the entry for `path` and delete its GPU texture, if any.
    ///
    /// Other holders of the shared image keep the CPU-side object, but its
    /// handle is gone.
    pub fn evict(&mut self, ctx: &RenderContext, path: &str) {
        if let Some(image) = self.entries.remove(path) {
            image.release(ctx);
        }
    }

    /// Evict everything. Called once at shutdown while the context is still
    /// current.
    pub fn clear(&mut self, ctx: &RenderContext) {
        for (_, image) in self.entries.drain() {
            image.release(ctx);
        }
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
