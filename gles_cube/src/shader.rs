// Copyright 2018 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::ffi::CString;
use std::os::raw::c_char;

use base::debug;

use crate::raw::gles::*;
use crate::Error;
use crate::Result;

/// Owns a shader object until it is attached and linked.
struct Shader<'g> {
    gl: &'g Gles,
    id: GLuint,
}

impl<'g> Shader<'g> {
    fn compile(gl: &'g Gles, kind: GLenum, source: &str) -> Result<Shader<'g>> {
        let stage = stage_name(kind);
        // SAFETY:
        // `kind` is one of the two shader stage enums.
        let id = unsafe { (gl.glCreateShader)(kind) };
        if id == 0 {
            return Err(Error::CreateShader(stage));
        }
        let shader = Shader { gl, id };
        let ptr = source.as_ptr() as *const GLchar;
        let len = source.len() as GLint;
        let mut status = 0;
        // SAFETY:
        // A single string is passed with an explicit length, so it needs no nul terminator.
        unsafe {
            (gl.glShaderSource)(id, 1, &ptr, &len);
            (gl.glCompileShader)(id);
            (gl.glGetShaderiv)(id, GL_COMPILE_STATUS, &mut status);
        }
        if status == 0 {
            let log = info_log(gl.glGetShaderiv, gl.glGetShaderInfoLog, id);
            return Err(Error::Compile { stage, log });
        }
        debug!("compiled {} shader {}", stage, id);
        Ok(shader)
    }
}

impl<'g> Drop for Shader<'g> {
    fn drop(&mut self) {
        // SAFETY:
        // Deleting an attached shader only flags it; the program keeps its own reference.
        unsafe { (self.gl.glDeleteShader)(self.id) };
    }
}

/// A linked GLSL ES program.
pub struct Program<'g> {
    gl: &'g Gles,
    id: GLuint,
}

impl<'g> Program<'g> {
    /// Compiles and links `vertex` and `fragment`, binding each `(index, name)` pair of
    /// `attributes` to its vertex attribute index before the link.
    pub fn new(
        gl: &'g Gles,
        vertex: &str,
        fragment: &str,
        attributes: &[(GLuint, &str)],
    ) -> Result<Program<'g>> {
        let vs = Shader::compile(gl, GL_VERTEX_SHADER, vertex)?;
        let fs = Shader::compile(gl, GL_FRAGMENT_SHADER, fragment)?;

        // SAFETY:
        // No preconditions beyond a current context.
        let id = unsafe { (gl.glCreateProgram)() };
        if id == 0 {
            return Err(Error::CreateProgram);
        }
        let program = Program { gl, id };

        // SAFETY:
        // Both shaders and the program are live objects of the current context.
        unsafe {
            (gl.glAttachShader)(id, vs.id);
            (gl.glAttachShader)(id, fs.id);
        }
        for &(index, name) in attributes {
            let name = c_string(name)?;
            // SAFETY:
            // `name` is nul terminated and outlives the call.
            unsafe { (gl.glBindAttribLocation)(id, index, name.as_ptr()) };
        }

        let mut status = 0;
        // SAFETY:
        // `status` receives a single integer.
        unsafe {
            (gl.glLinkProgram)(id);
            (gl.glGetProgramiv)(id, GL_LINK_STATUS, &mut status);
        }
        if status == 0 {
            return Err(Error::Link(info_log(
                gl.glGetProgramiv,
                gl.glGetProgramInfoLog,
                id,
            )));
        }
        debug!("linked program {}", id);
        Ok(program)
    }

    pub fn use_program(&self) {
        // SAFETY:
        // `id` names a successfully linked program.
        unsafe { (self.gl.glUseProgram)(self.id) };
    }

    /// Looks up an active uniform, failing if the linker optimised it away or it never existed.
    pub fn uniform_location(&self, name: &str) -> Result<GLint> {
        let c_name = c_string(name)?;
        // SAFETY:
        // `c_name` is nul terminated and outlives the call.
        let location = unsafe { (self.gl.glGetUniformLocation)(self.id, c_name.as_ptr()) };
        if location < 0 {
            return Err(Error::UniformNotFound(name.to_owned()));
        }
        Ok(location)
    }
}

impl<'g> Drop for Program<'g> {
    fn drop(&mut self) {
        // SAFETY:
        // Deletes the program created in `new`.
        unsafe { (self.gl.glDeleteProgram)(self.id) };
    }
}

fn stage_name(kind: GLenum) -> &'static str {
    match kind {
        GL_VERTEX_SHADER => "vertex",
        GL_FRAGMENT_SHADER => "fragment",
        _ => "unknown",
    }
}

fn c_string(name: &str) -> Result<CString> {
    CString::new(name).map_err(|_| Error::InvalidName(name.to_owned()))
}

type GetIv = unsafe extern "C" fn(GLuint, GLenum, *mut GLint);
type GetInfoLog = unsafe extern "C" fn(GLuint, GLsizei, *mut GLsizei, *mut GLchar);

/// Reads the info log of a shader or program object.
fn info_log(get_iv: GetIv, get_log: GetInfoLog, id: GLuint) -> String {
    let mut len = 0;
    // SAFETY:
    // `len` receives a single integer.
    unsafe { get_iv(id, GL_INFO_LOG_LENGTH, &mut len) };
    if len <= 0 {
        return String::new();
    }
    let mut buf = vec![0u8; len as usize];
    let mut written = 0;
    // SAFETY:
    // `buf` has room for `len` bytes, including the terminator GL writes.
    unsafe { get_log(id, len, &mut written, buf.as_mut_ptr() as *mut c_char) };
    buf.truncate(written.clamp(0, len) as usize);
    trim_log(&buf)
}

fn trim_log(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).trim_end().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names() {
        assert_eq!(stage_name(GL_VERTEX_SHADER), "vertex");
        assert_eq!(stage_name(GL_FRAGMENT_SHADER), "fragment");
        assert_eq!(stage_name(0), "unknown");
    }

    #[test]
    fn trims_driver_log() {
        assert_eq!(
            trim_log(b"0:3(1): error: syntax error\n\0garbage"),
            "0:3(1): error: syntax error"
        );
        assert_eq!(trim_log(b""), "");
    }

    #[test]
    fn rejects_interior_nul() {
        assert!(matches!(c_string("in_\0position"), Err(Error::InvalidName(_))));
        assert_eq!(c_string("in_position").unwrap().as_bytes(), b"in_position");
    }
}
