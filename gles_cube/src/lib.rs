// Copyright 2018 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Renders a spinning textured cube with OpenGL ES 2.0 into an EGL window surface.

pub mod animation;
mod egl;
pub mod geometry;
pub mod matrix;
pub mod raw;
mod renderer;
mod shader;
mod texture;

use std::fmt;
use std::result;

use base::dynlib::LoadError;
use remain::sorted;
use thiserror::Error as ThisError;

pub use crate::animation::Rotation;
pub use crate::egl::EglContext;
pub use crate::egl::EglOptions;
pub use crate::matrix::Mat4;
pub use crate::raw::egl::Egl;
pub use crate::raw::gles::Gles;
pub use crate::renderer::CubeRenderer;
pub use crate::renderer::Viewport;
pub use crate::shader::Program;
pub use crate::texture::Texture;
pub use crate::texture::TextureImage;

/// An EGL error code as returned by `eglGetError`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EglError(pub i32);

impl EglError {
    /// The symbolic name of the code, if it is a known EGL error.
    pub fn name(self) -> Option<&'static str> {
        use crate::raw::egl::*;
        Some(match self.0 {
            EGL_SUCCESS => "EGL_SUCCESS",
            EGL_NOT_INITIALIZED => "EGL_NOT_INITIALIZED",
            EGL_BAD_ACCESS => "EGL_BAD_ACCESS",
            EGL_BAD_ALLOC => "EGL_BAD_ALLOC",
            EGL_BAD_ATTRIBUTE => "EGL_BAD_ATTRIBUTE",
            EGL_BAD_CONFIG => "EGL_BAD_CONFIG",
            EGL_BAD_CONTEXT => "EGL_BAD_CONTEXT",
            EGL_BAD_CURRENT_SURFACE => "EGL_BAD_CURRENT_SURFACE",
            EGL_BAD_DISPLAY => "EGL_BAD_DISPLAY",
            EGL_BAD_MATCH => "EGL_BAD_MATCH",
            EGL_BAD_NATIVE_PIXMAP => "EGL_BAD_NATIVE_PIXMAP",
            EGL_BAD_NATIVE_WINDOW => "EGL_BAD_NATIVE_WINDOW",
            EGL_BAD_PARAMETER => "EGL_BAD_PARAMETER",
            EGL_BAD_SURFACE => "EGL_BAD_SURFACE",
            EGL_CONTEXT_LOST => "EGL_CONTEXT_LOST",
            _ => return None,
        })
    }
}

impl fmt::Display for EglError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({:#x})", name, self.0),
            None => write!(f, "unknown egl error {:#x}", self.0),
        }
    }
}

/// An error generated while setting up or drawing the cube.
#[sorted]
#[derive(ThisError, Debug)]
pub enum Error {
    #[error("failed to compile {stage} shader: {log}")]
    Compile { stage: &'static str, log: String },
    #[error("glCreateProgram failed")]
    CreateProgram,
    #[error("glCreateShader failed for the {0} stage")]
    CreateShader(&'static str),
    #[error("{call} failed: {code}")]
    Egl { call: &'static str, code: EglError },
    #[error("{call} raised gl error {code:#x}")]
    Gl { call: &'static str, code: u32 },
    #[error("identifier {0:?} contains a nul byte")]
    InvalidName(String),
    #[error("texture of {width}x{height} needs {expected} bytes of rgb data, got {actual}")]
    InvalidTexture {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("failed to link shader program: {0}")]
    Link(String),
    #[error("failed to load library: {0}")]
    Load(LoadError),
    #[error("no egl config matches the requested attributes")]
    NoConfig,
    #[error("uniform {0} is not used by the shader program")]
    UniformNotFound(String),
}

/// The result of an operation in this crate.
pub type Result<T> = result::Result<T, Error>;

impl From<LoadError> for Error {
    fn from(e: LoadError) -> Error {
        Error::Load(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn egl_error_names() {
        assert_eq!(EglError(0x3009).name(), Some("EGL_BAD_MATCH"));
        assert_eq!(EglError(0x3009).to_string(), "EGL_BAD_MATCH (0x3009)");
        assert_eq!(EglError(0x1234).name(), None);
        assert_eq!(EglError(0x1234).to_string(), "unknown egl error 0x1234");
    }

    #[test]
    fn error_display() {
        let e = Error::Egl {
            call: "eglCreateContext",
            code: EglError(0x3005),
        };
        assert_eq!(e.to_string(), "eglCreateContext failed: EGL_BAD_CONFIG (0x3005)");
        let e = Error::Gl {
            call: "glDrawArrays",
            code: 0x502,
        };
        assert_eq!(e.to_string(), "glDrawArrays raised gl error 0x502");
    }
}
