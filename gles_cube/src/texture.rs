// Copyright 2018 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::os::raw::c_void;

use crate::raw::gles::*;
use crate::Error;
use crate::Result;

const BYTES_PER_PIXEL: usize = 3;
const DEFAULT_SIZE: u32 = 64;
const DEFAULT_CELL: u32 = 8;

/// Tightly packed RGB8 pixel data, top row first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl TextureImage {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<TextureImage> {
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(Error::InvalidTexture {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(TextureImage {
            width,
            height,
            pixels,
        })
    }

    /// A `size` x `size` checkerboard of `cell` pixel squares alternating between `a` and `b`,
    /// starting with `a` in the top left corner.
    pub fn checkerboard(size: u32, cell: u32, a: [u8; 3], b: [u8; 3]) -> Result<TextureImage> {
        TextureImage::new(size, size, checker_pixels(size, cell, a, b))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Color of the pixel at (`x`, `y`), or `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let p = &self.pixels[offset..offset + BYTES_PER_PIXEL];
        Some([p[0], p[1], p[2]])
    }
}

impl Default for TextureImage {
    /// The built-in 64x64 orange and navy checkerboard.
    fn default() -> TextureImage {
        TextureImage {
            width: DEFAULT_SIZE,
            height: DEFAULT_SIZE,
            pixels: checker_pixels(
                DEFAULT_SIZE,
                DEFAULT_CELL,
                [0xf0, 0x8c, 0x1e],
                [0x20, 0x30, 0x70],
            ),
        }
    }
}

fn checker_pixels(size: u32, cell: u32, a: [u8; 3], b: [u8; 3]) -> Vec<u8> {
    let cell = cell.max(1);
    let mut pixels = Vec::with_capacity(size as usize * size as usize * BYTES_PER_PIXEL);
    for y in 0..size {
        for x in 0..size {
            let color = if (x / cell + y / cell) % 2 == 0 { a } else { b };
            pixels.extend_from_slice(&color);
        }
    }
    pixels
}

/// A 2D texture object holding an uploaded [`TextureImage`].
pub struct Texture<'g> {
    gl: &'g Gles,
    id: GLuint,
}

impl<'g> Texture<'g> {
    /// Uploads `image` into a new texture left bound to `GL_TEXTURE_2D` on the active unit.
    pub fn upload(gl: &'g Gles, image: &TextureImage) -> Result<Texture<'g>> {
        let mut id = 0;
        // SAFETY:
        // Writes exactly one name into `id`.
        unsafe { (gl.glGenTextures)(1, &mut id) };
        let texture = Texture { gl, id };
        // SAFETY:
        // The pixel buffer holds width * height tightly packed RGB8 texels, matching the unpack
        // alignment of 1 and the format/type given, and outlives the call.
        unsafe {
            (gl.glBindTexture)(GL_TEXTURE_2D, id);
            (gl.glPixelStorei)(GL_UNPACK_ALIGNMENT, 1);
            (gl.glTexImage2D)(
                GL_TEXTURE_2D,
                0,
                GL_RGB as GLint,
                image.width as GLsizei,
                image.height as GLsizei,
                0,
                GL_RGB,
                GL_UNSIGNED_BYTE,
                image.pixels.as_ptr() as *const c_void,
            );
            (gl.glTexParameteri)(GL_TEXTURE_2D, GL_TEXTURE_MAG_FILTER, GL_NEAREST);
            (gl.glTexParameteri)(GL_TEXTURE_2D, GL_TEXTURE_MIN_FILTER, GL_NEAREST);
            (gl.glTexParameteri)(GL_TEXTURE_2D, GL_TEXTURE_WRAP_S, GL_CLAMP_TO_EDGE);
            (gl.glTexParameteri)(GL_TEXTURE_2D, GL_TEXTURE_WRAP_T, GL_CLAMP_TO_EDGE);
        }
        crate::renderer::check_gl(gl, "glTexImage2D")?;
        Ok(texture)
    }
}

impl<'g> Drop for Texture<'g> {
    fn drop(&mut self) {
        // SAFETY:
        // Deletes the one name generated in `upload`.
        unsafe { (self.gl.glDeleteTextures)(1, &self.id) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: [u8; 3] = [0xff, 0xff, 0xff];
    const BLACK: [u8; 3] = [0, 0, 0];

    #[test]
    fn rejects_short_buffer() {
        match TextureImage::new(2, 2, vec![0; 11]) {
            Err(Error::InvalidTexture {
                expected, actual, ..
            }) => {
                assert_eq!(expected, 12);
                assert_eq!(actual, 11);
            }
            r => panic!("unexpected result: {:?}", r),
        }
    }

    #[test]
    fn rejects_empty() {
        assert!(TextureImage::new(0, 4, Vec::new()).is_err());
    }

    #[test]
    fn checkerboard_cells() {
        let image = TextureImage::checkerboard(8, 2, WHITE, BLACK).unwrap();
        assert_eq!(image.pixels().len(), 8 * 8 * 3);
        assert_eq!(image.pixel(0, 0), Some(WHITE));
        assert_eq!(image.pixel(1, 1), Some(WHITE));
        assert_eq!(image.pixel(2, 0), Some(BLACK));
        assert_eq!(image.pixel(0, 2), Some(BLACK));
        assert_eq!(image.pixel(3, 3), Some(WHITE));
        assert_eq!(image.pixel(8, 0), None);
    }

    #[test]
    fn zero_cell_is_single_pixel() {
        let image = TextureImage::checkerboard(2, 0, WHITE, BLACK).unwrap();
        assert_eq!(image.pixel(0, 0), Some(WHITE));
        assert_eq!(image.pixel(1, 0), Some(BLACK));
        assert_eq!(image.pixel(1, 1), Some(WHITE));
    }

    #[test]
    fn default_pattern() {
        let image = TextureImage::default();
        assert_eq!((image.width(), image.height()), (64, 64));
        assert_eq!(image.pixels().len(), 64 * 64 * 3);
        assert_ne!(image.pixel(0, 0), image.pixel(8, 0));
        assert_eq!(image.pixel(0, 0), image.pixel(63, 63));
    }
}
