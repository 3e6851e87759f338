// Copyright 2018 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Hand-written bindings for the parts of EGL 1.4 and OpenGL ES 2.0 used to draw the cube.

#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(dead_code)]

pub mod egl;
pub mod gles;
