//! Error Types
//!
//! This module defines the error types used throughout the renderer.
//!
//! # Overview
//!
//! The main error type [`NimbusError`] covers all failure modes including:
//! - GPU object allocation failures
//! - Shader compilation and linking diagnostics
//! - Buffer layout validation
//! - Shader source loading and image decoding errors
//!
//! # Usage
//!
//! All fallible public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, NimbusError>`.
//!
//! ```rust,ignore
//! use nimbus::errors::{NimbusError, Result};
//!
//! fn build_resources() -> Result<()> {
//!     // Operations that may fail return Result
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for the Nimbus renderer.
///
/// Construction-time shader errors are diagnostic-only: callers log them and
/// keep the render loop alive rather than aborting. Buffer-layout errors are
/// programming errors and fail fast.
#[derive(Error, Debug)]
pub enum NimbusError {
    // ========================================================================
    // GPU Object Errors
    // ========================================================================
    /// The driver refused to allocate a GPU object.
    #[error("Failed to allocate GPU object ({what}): {reason}")]
    ResourceAllocError {
        /// What kind of object was requested
        what: &'static str,
        /// The driver's error string
        reason: String,
    },

    /// A shader stage failed to compile.
    #[error("{stage} shader failed to compile:\n{log}")]
    ShaderCompileError {
        /// Stage kind ("vertex", "fragment", "compute")
        stage: &'static str,
        /// The driver's info log
        log: String,
    },

    /// A shader program failed to link.
    #[error("Shader program failed to link:\n{0}")]
    ProgramLinkError(String),

    /// Vertex data does not divide evenly into elements.
    #[error("Buffer of {len} elements does not divide into {components}-component attributes")]
    InvalidBufferLayout {
        /// Length of the supplied slice
        len: usize,
        /// Requested component count per vertex
        components: i32,
    },

    // ========================================================================
    // Shader Source Errors
    // ========================================================================
    /// A shader source file could not be read.
    #[error("Failed to read shader source {}: {source}", .path.display())]
    SourceReadError {
        /// Path as passed to the loader
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Include expansion revisited a file already on the include stack.
    #[error("Cyclic #include of {}", .0.display())]
    IncludeCycleError(PathBuf),

    // ========================================================================
    // Image & Texture Errors
    // ========================================================================
    /// An image source was unreadable or corrupt.
    #[error("Failed to decode image {path}: {reason}")]
    ImageDecodeError {
        /// Source path or cache key
        path: String,
        /// Decoder diagnostic
        reason: String,
    },
}

/// Alias for `Result<T, NimbusError>`.
pub type Result<T> = std::result::Result<T, NimbusError>;
