// Copyright 2018 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::matrix::Mat4;

/// Degrees added to each axis per frame.
const STEP: (u32, u32, u32) = (3, 1, 2);

/// Uniform scale applied so the cube fits inside clip space at any orientation.
const CUBE_SCALE: f32 = 0.5;

/// Orientation of the cube in whole degrees around each axis.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Rotation {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Rotation {
    pub fn new(x: u32, y: u32, z: u32) -> Rotation {
        Rotation {
            x: x % 360,
            y: y % 360,
            z: z % 360,
        }
    }

    /// Steps the animation by one frame.
    pub fn advance(&mut self) {
        self.x = (self.x + STEP.0) % 360;
        self.y = (self.y + STEP.1) % 360;
        self.z = (self.z + STEP.2) % 360;
    }

    pub fn model_view_projection(&self) -> Mat4 {
        Mat4::rotation_x(self.x as f32)
            * Mat4::rotation_y(self.y as f32)
            * Mat4::rotation_z(self.z as f32)
            * Mat4::scale(CUBE_SCALE, CUBE_SCALE, CUBE_SCALE)
    }
}
