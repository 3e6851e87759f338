// Copyright 2018 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Vertex data for a cube spanning -1..1 on every axis, drawn as 12 independent triangles.

/// Number of vertices submitted per frame.
pub const CUBE_VERTEX_COUNT: usize = 36;

/// Object-space positions, three floats per vertex.
#[rustfmt::skip]
pub const CUBE_POSITIONS: [f32; CUBE_VERTEX_COUNT * 3] = [
    // x = -1
    -1.0, -1.0,  1.0,
    -1.0, -1.0, -1.0,
    -1.0,  1.0, -1.0,
    -1.0,  1.0, -1.0,
    -1.0,  1.0,  1.0,
    -1.0, -1.0,  1.0,
    // y = 1
    -1.0,  1.0,  1.0,
    -1.0,  1.0, -1.0,
     1.0,  1.0, -1.0,
     1.0,  1.0, -1.0,
     1.0,  1.0,  1.0,
    -1.0,  1.0,  1.0,
    // x = 1
     1.0,  1.0,  1.0,
     1.0,  1.0, -1.0,
     1.0, -1.0, -1.0,
     1.0, -1.0, -1.0,
     1.0, -1.0,  1.0,
     1.0,  1.0,  1.0,
    // y = -1
     1.0, -1.0,  1.0,
     1.0, -1.0, -1.0,
    -1.0, -1.0, -1.0,
    -1.0, -1.0, -1.0,
    -1.0, -1.0,  1.0,
     1.0, -1.0,  1.0,
    // z = 1
    -1.0, -1.0,  1.0,
    -1.0,  1.0,  1.0,
     1.0,  1.0,  1.0,
     1.0,  1.0,  1.0,
     1.0, -1.0,  1.0,
    -1.0, -1.0,  1.0,
    // z = -1
    -1.0,  1.0, -1.0,
     1.0,  1.0, -1.0,
     1.0, -1.0, -1.0,
     1.0, -1.0, -1.0,
    -1.0, -1.0, -1.0,
    -1.0,  1.0, -1.0,
];

/// Texture coordinates for one face; every face shows the whole texture.
#[rustfmt::skip]
const FACE_TEX_COORDS: [f32; 12] = [
    0.0, 0.0,
    0.0, 1.0,
    1.0, 1.0,
    1.0, 1.0,
    1.0, 0.0,
    0.0, 0.0,
];

/// Texture coordinates, two floats per vertex, matching [`CUBE_POSITIONS`].
pub const CUBE_TEX_COORDS: [f32; CUBE_VERTEX_COUNT * 2] = face_tex_coords();

const fn face_tex_coords() -> [f32; CUBE_VERTEX_COUNT * 2] {
    let mut out = [0.0; CUBE_VERTEX_COUNT * 2];
    let mut i = 0;
    while i < out.len() {
        out[i] = FACE_TEX_COORDS[i % FACE_TEX_COORDS.len()];
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(i: usize) -> [f32; 3] {
        [
            CUBE_POSITIONS[i * 3],
            CUBE_POSITIONS[i * 3 + 1],
            CUBE_POSITIONS[i * 3 + 2],
        ]
    }

    #[test]
    fn corners_only() {
        assert!(CUBE_POSITIONS.iter().all(|&c| c == 1.0 || c == -1.0));
        assert!(CUBE_TEX_COORDS.iter().all(|&c| c == 0.0 || c == 1.0));
    }

    #[test]
    fn each_face_is_planar() {
        let mut planes = Vec::new();
        for face in 0..6 {
            let verts: Vec<[f32; 3]> = (face * 6..face * 6 + 6).map(vertex).collect();
            let axis = (0..3)
                .find(|&a| verts.iter().all(|v| v[a] == verts[0][a]))
                .expect("face is not axis aligned");
            planes.push((axis, verts[0][axis]));
        }
        planes.sort_by(|a, b| a.partial_cmp(b).unwrap());
        planes.dedup();
        assert_eq!(planes.len(), 6, "faces are not distinct: {:?}", planes);
    }

    #[test]
    fn triangles_are_not_degenerate() {
        for t in 0..CUBE_VERTEX_COUNT / 3 {
            let (a, b, c) = (vertex(t * 3), vertex(t * 3 + 1), vertex(t * 3 + 2));
            assert!(a != b && b != c && a != c, "triangle {} is degenerate", t);
        }
    }

    #[test]
    fn faces_share_texture_mapping() {
        for face in 1..6 {
            assert_eq!(
                &CUBE_TEX_COORDS[face * 12..face * 12 + 12],
                &CUBE_TEX_COORDS[..12]
            );
        }
        assert_eq!(&CUBE_TEX_COORDS[..12], &FACE_TEX_COORDS);
    }
}
