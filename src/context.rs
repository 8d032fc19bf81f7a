//! Render Context
//!
//! [`RenderContext`] is the explicit handle to the OpenGL context that every
//! GPU-facing type in this crate holds or receives. There are no hidden
//! globals: the host creates a GL context and surface by whatever means it
//! likes (GTK, SDL, glutin, ...), makes it current, and wraps it once.
//!
//! Cloning a `RenderContext` is cheap (it shares one [`Arc`]); all clones
//! refer to the same underlying context and must stay on the thread the
//! context is current on.

use std::marker::PhantomData;
use std::sync::Arc;

use glow::HasContext;

/// Shared handle to the host's OpenGL context.
///
/// All GPU command submission in this crate goes through a `RenderContext`.
/// The type is neither `Send` nor `Sync`: GL contexts are bound to one
/// thread, and every wrapper that stores a clone of this handle inherits
/// that restriction.
#[derive(Clone)]
pub struct RenderContext {
    gl: Arc<glow::Context>,
    _single_thread: PhantomData<*const ()>,
}

impl RenderContext {
    /// Wrap a freshly created GL context.
    ///
    /// Enables the driver's debug-output channel and routes its messages
    /// into the [`log`] facade (high severity → `error`, medium → `warn`,
    /// low → `debug`, notifications → `trace`).
    ///
    /// # Safety
    ///
    /// `gl` must be a valid OpenGL 4.3+ context that is current on the
    /// calling thread, and it must remain current on this thread whenever
    /// any method of this crate's GPU types is called.
    #[must_use]
    pub unsafe fn new(mut gl: glow::Context) -> Self {
        unsafe {
            gl.enable(glow::DEBUG_OUTPUT);
            gl.debug_message_callback(|_source, _kind, id, severity, message| {
                match severity {
                    glow::DEBUG_SEVERITY_HIGH => log::error!("GL [{id}]: {message}"),
                    glow::DEBUG_SEVERITY_MEDIUM => log::warn!("GL [{id}]: {message}"),
                    glow::DEBUG_SEVERITY_LOW => log::debug!("GL [{id}]: {message}"),
                    _ => log::trace!("GL [{id}]: {message}"),
                }
            });
        }
        Self {
            gl: Arc::new(gl),
            _single_thread: PhantomData,
        }
    }

    /// Wrap a context that is already shared.
    ///
    /// Unlike [`RenderContext::new`], this installs no debug callback (the
    /// shared context cannot be mutated here); the host is expected to have
    /// configured debug output itself if it wants any.
    ///
    /// # Safety
    ///
    /// Same contract as [`RenderContext::new`].
    #[must_use]
    pub unsafe fn from_shared(gl: Arc<glow::Context>) -> Self {
        Self {
            gl,
            _single_thread: PhantomData,
        }
    }

    /// The underlying GL function table.
    #[inline]
    #[must_use]
    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext").finish_non_exhaustive()
    }
}
