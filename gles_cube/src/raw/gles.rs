// Copyright 2018 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

// Transcribed from GLES2/gl2.h.

use std::os::raw::c_char;
use std::os::raw::c_void;

pub type GLenum = u32;
pub type GLboolean = u8;
pub type GLbitfield = u32;
pub type GLint = i32;
pub type GLuint = u32;
pub type GLsizei = i32;
pub type GLfloat = f32;
pub type GLchar = c_char;
pub type GLubyte = u8;

pub const GL_FALSE: GLboolean = 0;
pub const GL_TRUE: GLboolean = 1;
pub const GL_NO_ERROR: GLenum = 0;

pub const GL_TRIANGLES: GLenum = 0x0004;
pub const GL_DEPTH_BUFFER_BIT: GLbitfield = 0x0000_0100;
pub const GL_COLOR_BUFFER_BIT: GLbitfield = 0x0000_4000;
pub const GL_LEQUAL: GLenum = 0x0203;
pub const GL_DEPTH_TEST: GLenum = 0x0B71;
pub const GL_UNPACK_ALIGNMENT: GLenum = 0x0CF5;
pub const GL_TEXTURE_2D: GLenum = 0x0DE1;
pub const GL_UNSIGNED_BYTE: GLenum = 0x1401;
pub const GL_FLOAT: GLenum = 0x1406;
pub const GL_RGB: GLenum = 0x1907;
pub const GL_VENDOR: GLenum = 0x1F00;
pub const GL_RENDERER: GLenum = 0x1F01;
pub const GL_VERSION: GLenum = 0x1F02;
pub const GL_NEAREST: GLint = 0x2600;
pub const GL_TEXTURE_MAG_FILTER: GLenum = 0x2800;
pub const GL_TEXTURE_MIN_FILTER: GLenum = 0x2801;
pub const GL_TEXTURE_WRAP_S: GLenum = 0x2802;
pub const GL_TEXTURE_WRAP_T: GLenum = 0x2803;
pub const GL_CLAMP_TO_EDGE: GLint = 0x812F;
pub const GL_TEXTURE0: GLenum = 0x84C0;
pub const GL_FRAGMENT_SHADER: GLenum = 0x8B30;
pub const GL_VERTEX_SHADER: GLenum = 0x8B31;
pub const GL_COMPILE_STATUS: GLenum = 0x8B81;
pub const GL_LINK_STATUS: GLenum = 0x8B82;
pub const GL_INFO_LOG_LENGTH: GLenum = 0x8B84;

base::dynamic_library! {
    /// Entry points of libGLESv2.
    pub struct Gles("libGLESv2.so.2") {
        fn glGetError() -> GLenum;
        fn glGetString(name: GLenum) -> *const GLubyte;
        fn glCreateShader(type_: GLenum) -> GLuint;
        fn glShaderSource(
            shader: GLuint,
            count: GLsizei,
            string: *const *const GLchar,
            length: *const GLint,
        );
        fn glCompileShader(shader: GLuint);
        fn glGetShaderiv(shader: GLuint, pname: GLenum, params: *mut GLint);
        fn glGetShaderInfoLog(
            shader: GLuint,
            buf_size: GLsizei,
            length: *mut GLsizei,
            info_log: *mut GLchar,
        );
        fn glDeleteShader(shader: GLuint);
        fn glCreateProgram() -> GLuint;
        fn glAttachShader(program: GLuint, shader: GLuint);
        fn glBindAttribLocation(program: GLuint, index: GLuint, name: *const GLchar);
        fn glLinkProgram(program: GLuint);
        fn glGetProgramiv(program: GLuint, pname: GLenum, params: *mut GLint);
        fn glGetProgramInfoLog(
            program: GLuint,
            buf_size: GLsizei,
            length: *mut GLsizei,
            info_log: *mut GLchar,
        );
        fn glUseProgram(program: GLuint);
        fn glDeleteProgram(program: GLuint);
        fn glGetUniformLocation(program: GLuint, name: *const GLchar) -> GLint;
        fn glUniform1i(location: GLint, v0: GLint);
        fn glUniformMatrix4fv(
            location: GLint,
            count: GLsizei,
            transpose: GLboolean,
            value: *const GLfloat,
        );
        fn glGenTextures(n: GLsizei, textures: *mut GLuint);
        fn glDeleteTextures(n: GLsizei, textures: *const GLuint);
        fn glBindTexture(target: GLenum, texture: GLuint);
        fn glActiveTexture(texture: GLenum);
        fn glTexImage2D(
            target: GLenum,
            level: GLint,
            internalformat: GLint,
            width: GLsizei,
            height: GLsizei,
            border: GLint,
            format: GLenum,
            type_: GLenum,
            pixels: *const c_void,
        );
        fn glTexParameteri(target: GLenum, pname: GLenum, param: GLint);
        fn glPixelStorei(pname: GLenum, param: GLint);
        fn glClearColor(red: GLfloat, green: GLfloat, blue: GLfloat, alpha: GLfloat);
        fn glClear(mask: GLbitfield);
        fn glViewport(x: GLint, y: GLint, width: GLsizei, height: GLsizei);
        fn glEnable(cap: GLenum);
        fn glDepthFunc(func: GLenum);
        fn glVertexAttribPointer(
            index: GLuint,
            size: GLint,
            type_: GLenum,
            normalized: GLboolean,
            stride: GLsizei,
            pointer: *const c_void,
        );
        fn glEnableVertexAttribArray(index: GLuint);
        fn glDisableVertexAttribArray(index: GLuint);
        fn glDrawArrays(mode: GLenum, first: GLint, count: GLsizei);
        fn glFlush();
    }
}
