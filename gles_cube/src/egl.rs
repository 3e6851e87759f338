// Copyright 2018 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::ffi::CStr;
use std::mem::transmute;
use std::os::raw::c_char;
use std::os::raw::c_void;
use std::ptr::null;
use std::ptr::null_mut;

use base::debug;
use base::info;
use base::warn;

use crate::raw::egl::*;
use crate::EglError;
use crate::Error;
use crate::Result;

/// Parameters for choosing the framebuffer configuration of an [`EglContext`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EglOptions {
    /// Pixel format of the native window; configs with a matching `EGL_NATIVE_VISUAL_ID` win.
    pub native_visual_id: Option<u32>,
    /// Requested depth buffer size. Zero requests no depth buffer.
    pub depth_bits: u32,
}

/// An OpenGL ES 2 context made current on a window surface.
pub struct EglContext<'e> {
    egl: &'e Egl,
    display: EGLDisplay,
    context: EGLContext,
    surface: EGLSurface,
}

impl<'e> EglContext<'e> {
    /// Initializes EGL on a GBM device and makes a new ES2 context current on `native_window`.
    ///
    /// # Safety
    ///
    /// `native_display` must point to a live `gbm_device` and `native_window` to a `gbm_surface`
    /// allocated from it. Both must outlive the returned context.
    pub unsafe fn new(
        egl: &'e Egl,
        native_display: *mut c_void,
        native_window: *mut c_void,
        options: &EglOptions,
    ) -> Result<EglContext<'e>> {
        let display = platform_display(egl, native_display);
        if display == EGL_NO_DISPLAY {
            return Err(egl_error(egl, "eglGetDisplay"));
        }

        let mut major = 0;
        let mut minor = 0;
        if (egl.eglInitialize)(display, &mut major, &mut minor) == EGL_FALSE {
            return Err(egl_error(egl, "eglInitialize"));
        }
        let mut ctx = EglContext {
            egl,
            display,
            context: EGL_NO_CONTEXT,
            surface: EGL_NO_SURFACE,
        };

        info!(
            "EGL {}.{}: version \"{}\", vendor \"{}\", client apis \"{}\"",
            major,
            minor,
            ctx.query_string(EGL_VERSION),
            ctx.query_string(EGL_VENDOR),
            ctx.query_string(EGL_CLIENT_APIS)
        );
        debug!("EGL extensions: {}", ctx.query_string(EGL_EXTENSIONS));

        if (egl.eglBindAPI)(EGL_OPENGL_ES_API) == EGL_FALSE {
            return Err(egl_error(egl, "eglBindAPI"));
        }

        let config = ctx.choose_config(options)?;

        let context_attribs = [EGL_CONTEXT_CLIENT_VERSION, 2, EGL_NONE];
        ctx.context = (egl.eglCreateContext)(
            display,
            config,
            EGL_NO_CONTEXT,
            context_attribs.as_ptr(),
        );
        if ctx.context == EGL_NO_CONTEXT {
            return Err(egl_error(egl, "eglCreateContext"));
        }

        ctx.surface = (egl.eglCreateWindowSurface)(display, config, native_window, null());
        if ctx.surface == EGL_NO_SURFACE {
            return Err(egl_error(egl, "eglCreateWindowSurface"));
        }

        if (egl.eglMakeCurrent)(display, ctx.surface, ctx.surface, ctx.context) == EGL_FALSE {
            return Err(egl_error(egl, "eglMakeCurrent"));
        }
        Ok(ctx)
    }

    /// Posts the back buffer to the native window.
    pub fn swap_buffers(&self) -> Result<()> {
        // SAFETY:
        // The display and surface are live until drop.
        if unsafe { (self.egl.eglSwapBuffers)(self.display, self.surface) } == EGL_FALSE {
            return Err(egl_error(self.egl, "eglSwapBuffers"));
        }
        Ok(())
    }

    fn query_string(&self, name: EGLint) -> String {
        // SAFETY:
        // The display is initialized; the result is null or a static nul terminated string.
        unsafe {
            let s = (self.egl.eglQueryString)(self.display, name);
            if s.is_null() {
                return String::new();
            }
            CStr::from_ptr(s).to_string_lossy().into_owned()
        }
    }

    fn choose_config(&self, options: &EglOptions) -> Result<EGLConfig> {
        let mut depth_bits = options.depth_bits;
        loop {
            let configs = self.matching_configs(&config_attribs(depth_bits))?;
            if !configs.is_empty() {
                let visuals: Vec<Option<u32>> = configs
                    .iter()
                    .map(|&c| self.config_attrib(c, EGL_NATIVE_VISUAL_ID).map(|v| v as u32))
                    .collect();
                let index = pick_config(&visuals, options.native_visual_id);
                debug!(
                    "{} egl configs match, using #{} (visual {:?}, depth {})",
                    configs.len(),
                    index,
                    visuals[index],
                    self.config_attrib(configs[index], EGL_DEPTH_SIZE).unwrap_or(0)
                );
                return Ok(configs[index]);
            }
            if depth_bits == 0 {
                return Err(Error::NoConfig);
            }
            warn!(
                "no egl config offers {} depth bits, retrying without a depth buffer",
                depth_bits
            );
            depth_bits = 0;
        }
    }

    fn matching_configs(&self, attribs: &[EGLint]) -> Result<Vec<EGLConfig>> {
        let mut count = 0;
        // SAFETY:
        // `attribs` is EGL_NONE terminated; a null config array only queries the count.
        let ok = unsafe {
            (self.egl.eglChooseConfig)(self.display, attribs.as_ptr(), null_mut(), 0, &mut count)
        };
        if ok == EGL_FALSE {
            return Err(egl_error(self.egl, "eglChooseConfig"));
        }
        let mut configs = vec![null_mut(); count.max(0) as usize];
        // SAFETY:
        // `configs` has room for `count` handles.
        let ok = unsafe {
            (self.egl.eglChooseConfig)(
                self.display,
                attribs.as_ptr(),
                configs.as_mut_ptr(),
                count,
                &mut count,
            )
        };
        if ok == EGL_FALSE {
            return Err(egl_error(self.egl, "eglChooseConfig"));
        }
        configs.truncate(count.max(0) as usize);
        Ok(configs)
    }

    fn config_attrib(&self, config: EGLConfig, attribute: EGLint) -> Option<EGLint> {
        let mut value = 0;
        // SAFETY:
        // `config` came from eglChooseConfig on this display.
        let ok =
            unsafe { (self.egl.eglGetConfigAttrib)(self.display, config, attribute, &mut value) };
        if ok == EGL_FALSE {
            None
        } else {
            Some(value)
        }
    }
}

impl<'e> Drop for EglContext<'e> {
    fn drop(&mut self) {
        // SAFETY:
        // Only objects created in `new` are released, each exactly once.
        unsafe {
            (self.egl.eglMakeCurrent)(self.display, EGL_NO_SURFACE, EGL_NO_SURFACE, EGL_NO_CONTEXT);
            if self.surface != EGL_NO_SURFACE {
                (self.egl.eglDestroySurface)(self.display, self.surface);
            }
            if self.context != EGL_NO_CONTEXT {
                (self.egl.eglDestroyContext)(self.display, self.context);
            }
            (self.egl.eglTerminate)(self.display);
        }
    }
}

/// Gets the display for a GBM device, preferring `eglGetPlatformDisplayEXT`.
unsafe fn platform_display(egl: &Egl, native_display: *mut c_void) -> EGLDisplay {
    let name = b"eglGetPlatformDisplayEXT\0";
    let proc_address = (egl.eglGetProcAddress)(name.as_ptr() as *const c_char);
    if proc_address.is_null() {
        debug!("eglGetPlatformDisplayEXT unavailable, falling back to eglGetDisplay");
        return (egl.eglGetDisplay)(native_display);
    }
    let get_platform_display: PFNEGLGETPLATFORMDISPLAYEXTPROC = transmute(proc_address);
    get_platform_display(EGL_PLATFORM_GBM_KHR, native_display, null())
}

fn egl_error(egl: &Egl, call: &'static str) -> Error {
    // SAFETY:
    // eglGetError only reads thread-local state.
    let code = unsafe { (egl.eglGetError)() };
    Error::Egl {
        call,
        code: EglError(code),
    }
}

/// Attribute list for a window-renderable ES2 config with at least one bit per color channel,
/// no alpha and, when `depth_bits` is non-zero, a depth buffer.
fn config_attribs(depth_bits: u32) -> Vec<EGLint> {
    let mut attribs = vec![
        EGL_SURFACE_TYPE,
        EGL_WINDOW_BIT,
        EGL_RED_SIZE,
        1,
        EGL_GREEN_SIZE,
        1,
        EGL_BLUE_SIZE,
        1,
        EGL_ALPHA_SIZE,
        0,
        EGL_RENDERABLE_TYPE,
        EGL_OPENGL_ES2_BIT,
    ];
    if depth_bits > 0 {
        attribs.extend_from_slice(&[EGL_DEPTH_SIZE, depth_bits as EGLint]);
    }
    attribs.push(EGL_NONE);
    attribs
}

/// Index of the first config whose visual matches `wanted`, or 0.
fn pick_config(visuals: &[Option<u32>], wanted: Option<u32>) -> usize {
    wanted
        .and_then(|w| visuals.iter().position(|&v| v == Some(w)))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const XRGB8888: u32 = 0x3432_5258;

    fn value_of(attribs: &[EGLint], key: EGLint) -> Option<EGLint> {
        attribs
            .chunks(2)
            .take_while(|pair| pair[0] != EGL_NONE)
            .find(|pair| pair[0] == key)
            .map(|pair| pair[1])
    }

    #[test]
    fn attribs_without_depth() {
        let attribs = config_attribs(0);
        assert_eq!(attribs.last(), Some(&EGL_NONE));
        assert_eq!(attribs.len() % 2, 1);
        assert_eq!(value_of(&attribs, EGL_DEPTH_SIZE), None);
        assert_eq!(value_of(&attribs, EGL_ALPHA_SIZE), Some(0));
        assert_eq!(value_of(&attribs, EGL_RENDERABLE_TYPE), Some(EGL_OPENGL_ES2_BIT));
        assert_eq!(value_of(&attribs, EGL_SURFACE_TYPE), Some(EGL_WINDOW_BIT));
    }

    #[test]
    fn attribs_with_depth() {
        let attribs = config_attribs(16);
        assert_eq!(value_of(&attribs, EGL_DEPTH_SIZE), Some(16));
        assert_eq!(attribs.last(), Some(&EGL_NONE));
    }

    #[test]
    fn prefers_matching_visual() {
        let visuals = [Some(0x3432_4241), None, Some(XRGB8888)];
        assert_eq!(pick_config(&visuals, Some(XRGB8888)), 2);
    }

    #[test]
    fn falls_back_to_first_config() {
        let visuals = [Some(0x3432_4241), None];
        assert_eq!(pick_config(&visuals, Some(XRGB8888)), 0);
        assert_eq!(pick_config(&visuals, None), 0);
    }
}
