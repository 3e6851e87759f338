// Copyright 2018 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! 4x4 matrices laid out the way `glUniformMatrix4fv` expects them with `transpose` unset.

use std::ops::Mul;

/// A 4x4 matrix of `f32` stored in column-major order, so element (row, col) lives at
/// `col * 4 + row`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Mat4([f32; 16]);

impl Mat4 {
    #[rustfmt::skip]
    pub const IDENTITY: Mat4 = Mat4([
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
        0.0, 0.0, 0.0, 1.0,
    ]);

    pub fn identity() -> Mat4 {
        Mat4::IDENTITY
    }

    /// Builds a matrix from sixteen column-major elements.
    pub fn from_cols_array(elements: [f32; 16]) -> Mat4 {
        Mat4(elements)
    }

    /// Rotation of `degrees` around the X axis.
    pub fn rotation_x(degrees: f32) -> Mat4 {
        let (s, c) = sin_cos(degrees);
        let mut m = Mat4::IDENTITY;
        m.0[5] = c;
        m.0[6] = s;
        m.0[9] = -s;
        m.0[10] = c;
        m
    }

    /// Rotation of `degrees` around the Y axis.
    pub fn rotation_y(degrees: f32) -> Mat4 {
        let (s, c) = sin_cos(degrees);
        let mut m = Mat4::IDENTITY;
        m.0[0] = c;
        m.0[2] = -s;
        m.0[8] = s;
        m.0[10] = c;
        m
    }

    /// Rotation of `degrees` around the Z axis.
    pub fn rotation_z(degrees: f32) -> Mat4 {
        let (s, c) = sin_cos(degrees);
        let mut m = Mat4::IDENTITY;
        m.0[0] = c;
        m.0[1] = s;
        m.0[4] = -s;
        m.0[5] = c;
        m
    }

    pub fn scale(x: f32, y: f32, z: f32) -> Mat4 {
        let mut m = Mat4::IDENTITY;
        m.0[0] = x;
        m.0[5] = y;
        m.0[10] = z;
        m
    }

    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.0[col * 4 + row]
    }

    /// Multiplies the column vector `v` by this matrix.
    pub fn transform(&self, v: [f32; 4]) -> [f32; 4] {
        let mut out = [0.0; 4];
        for (row, o) in out.iter_mut().enumerate() {
            *o = (0..4).map(|col| self.get(row, col) * v[col]).sum();
        }
        out
    }

    pub fn as_array(&self) -> &[f32; 16] {
        &self.0
    }
}

impl Default for Mat4 {
    fn default() -> Mat4 {
        Mat4::IDENTITY
    }
}

impl Mul for Mat4 {
    type Output = Mat4;

    fn mul(self, rhs: Mat4) -> Mat4 {
        let mut out = [0.0; 16];
        for col in 0..4 {
            for row in 0..4 {
                out[col * 4 + row] = (0..4).map(|k| self.get(row, k) * rhs.get(k, col)).sum();
            }
        }
        Mat4(out)
    }
}

// Computed in f64 and narrowed so whole-degree angles land on exact values where possible.
fn sin_cos(degrees: f32) -> (f32, f32) {
    let (s, c) = f64::from(degrees).to_radians().sin_cos();
    (s as f32, c as f32)
}
