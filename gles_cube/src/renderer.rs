// Copyright 2018 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::ffi::CStr;
use std::os::raw::c_char;
use std::os::raw::c_void;

use base::info;

use crate::animation::Rotation;
use crate::geometry::CUBE_POSITIONS;
use crate::geometry::CUBE_TEX_COORDS;
use crate::geometry::CUBE_VERTEX_COUNT;
use crate::raw::gles::*;
use crate::shader::Program;
use crate::texture::Texture;
use crate::texture::TextureImage;
use crate::Error;
use crate::Result;

const POSITION_ATTRIB: GLuint = 0;
const TEX_COORD_ATTRIB: GLuint = 1;

const VERTEX_SHADER: &str = "\
uniform mat4 modelViewProjection;
attribute vec4 in_position;
attribute vec2 in_texture_coord;
varying vec2 coord;

void main()
{
    gl_Position = modelViewProjection * in_position;
    coord = in_texture_coord;
}
";

const FRAGMENT_SHADER: &str = "\
precision mediump float;
varying vec2 coord;
uniform sampler2D in_texture;

void main()
{
    gl_FragColor = texture2D(in_texture, coord);
}
";

/// Rectangle of the surface the cube is drawn into, in pixels from the bottom left corner.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// A `width` x `height` rectangle centered on a `screen_width` x `screen_height` surface.
    /// Dimensions larger than the screen are clamped to it.
    pub fn centered(screen_width: u32, screen_height: u32, width: u32, height: u32) -> Viewport {
        let width = width.min(screen_width);
        let height = height.min(screen_height);
        Viewport {
            x: ((screen_width - width) / 2) as i32,
            y: ((screen_height - height) / 2) as i32,
            width,
            height,
        }
    }
}

/// Returns the first pending GL error raised since the last check.
pub(crate) fn check_gl(gl: &Gles, call: &'static str) -> Result<()> {
    // SAFETY:
    // No preconditions beyond a current context.
    let code = unsafe { (gl.glGetError)() };
    if code == GL_NO_ERROR {
        Ok(())
    } else {
        Err(Error::Gl { call, code })
    }
}

fn gl_string(gl: &Gles, name: GLenum) -> String {
    // SAFETY:
    // glGetString returns null or a static nul terminated string.
    unsafe {
        let s = (gl.glGetString)(name);
        if s.is_null() {
            return String::from("<unknown>");
        }
        CStr::from_ptr(s as *const c_char)
            .to_string_lossy()
            .into_owned()
    }
}

/// Draws the textured cube into the current EGL surface.
pub struct CubeRenderer<'g> {
    gl: &'g Gles,
    program: Program<'g>,
    _texture: Texture<'g>,
    mvp_location: GLint,
}

impl<'g> CubeRenderer<'g> {
    /// Sets up the viewport, depth testing, the shader program and `image` as the cube texture.
    ///
    /// A context must be current on the calling thread.
    pub fn new(
        gl: &'g Gles,
        viewport: Viewport,
        image: &TextureImage,
    ) -> Result<CubeRenderer<'g>> {
        info!(
            "GL_VENDOR: {}, GL_RENDERER: {}, GL_VERSION: {}",
            gl_string(gl, GL_VENDOR),
            gl_string(gl, GL_RENDERER),
            gl_string(gl, GL_VERSION)
        );

        // SAFETY:
        // Plain state setters with valid enums.
        unsafe {
            (gl.glViewport)(
                viewport.x,
                viewport.y,
                viewport.width as GLsizei,
                viewport.height as GLsizei,
            );
            (gl.glEnable)(GL_DEPTH_TEST);
            (gl.glDepthFunc)(GL_LEQUAL);
        }

        let program = Program::new(
            gl,
            VERTEX_SHADER,
            FRAGMENT_SHADER,
            &[
                (POSITION_ATTRIB, "in_position"),
                (TEX_COORD_ATTRIB, "in_texture_coord"),
            ],
        )?;
        program.use_program();
        let mvp_location = program.uniform_location("modelViewProjection")?;
        let texture_location = program.uniform_location("in_texture")?;

        // SAFETY:
        // Selects unit 0 and points the sampler of the bound program at it.
        unsafe {
            (gl.glActiveTexture)(GL_TEXTURE0);
            (gl.glUniform1i)(texture_location, 0);
        }
        let texture = Texture::upload(gl, image)?;
        check_gl(gl, "CubeRenderer::new")?;

        Ok(CubeRenderer {
            gl,
            program,
            _texture: texture,
            mvp_location,
        })
    }

    /// Fills the color buffer with `rgba` and flushes.
    pub fn clear(&self, rgba: [f32; 4]) {
        // SAFETY:
        // Plain state setters with valid arguments.
        unsafe {
            (self.gl.glClearColor)(rgba[0], rgba[1], rgba[2], rgba[3]);
            (self.gl.glClear)(GL_COLOR_BUFFER_BIT);
            (self.gl.glFlush)();
        }
    }

    /// Draws one frame of the cube at `rotation` over a black background.
    pub fn draw(&self, rotation: &Rotation) -> Result<()> {
        let mvp = rotation.model_view_projection();
        let gl = self.gl;
        self.program.use_program();
        // SAFETY:
        // The attribute pointers reference static arrays holding CUBE_VERTEX_COUNT vertices, so
        // glDrawArrays reads within bounds, and the matrix points at 16 floats.
        unsafe {
            (gl.glClearColor)(0.0, 0.0, 0.0, 1.0);
            (gl.glClear)(GL_COLOR_BUFFER_BIT | GL_DEPTH_BUFFER_BIT);
            (gl.glUniformMatrix4fv)(self.mvp_location, 1, GL_FALSE, mvp.as_array().as_ptr());
            (gl.glVertexAttribPointer)(
                POSITION_ATTRIB,
                3,
                GL_FLOAT,
                GL_FALSE,
                0,
                CUBE_POSITIONS.as_ptr() as *const c_void,
            );
            (gl.glEnableVertexAttribArray)(POSITION_ATTRIB);
            (gl.glVertexAttribPointer)(
                TEX_COORD_ATTRIB,
                2,
                GL_FLOAT,
                GL_FALSE,
                0,
                CUBE_TEX_COORDS.as_ptr() as *const c_void,
            );
            (gl.glEnableVertexAttribArray)(TEX_COORD_ATTRIB);
            (gl.glDrawArrays)(GL_TRIANGLES, 0, CUBE_VERTEX_COUNT as GLsizei);
            (gl.glDisableVertexAttribArray)(POSITION_ATTRIB);
            (gl.glDisableVertexAttribArray)(TEX_COORD_ATTRIB);
        }
        check_gl(gl, "glDrawArrays")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centered_viewport() {
        assert_eq!(
            Viewport::centered(800, 480, 480, 272),
            Viewport {
                x: 160,
                y: 104,
                width: 480,
                height: 272
            }
        );
    }

    #[test]
    fn viewport_fills_exact_screen() {
        assert_eq!(
            Viewport::centered(480, 272, 480, 272),
            Viewport {
                x: 0,
                y: 0,
                width: 480,
                height: 272
            }
        );
    }

    #[test]
    fn oversized_viewport_is_clamped() {
        assert_eq!(
            Viewport::centered(320, 240, 480, 272),
            Viewport {
                x: 0,
                y: 0,
                width: 320,
                height: 240
            }
        );
        assert_eq!(Viewport::centered(640, 200, 480, 272).x, 80);
    }

    #[test]
    fn shaders_declare_bound_names() {
        for name in &["in_position", "in_texture_coord", "modelViewProjection"] {
            assert!(VERTEX_SHADER.contains(name), "{}", name);
        }
        assert!(FRAGMENT_SHADER.contains("in_texture"));
        assert!(FRAGMENT_SHADER.starts_with("precision mediump float;"));
    }
}
