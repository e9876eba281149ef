//! Recursive exponential blur for glyph bitmaps
//!
//! Each pass is a one-pole IIR filter run forward then backward along one axis;
//! the full blur alternates vertical and horizontal passes twice. Fixed point
//! keeps the result identical across platforms.

const APREC: i32 = 16;
const ZPREC: i32 = 7;

/// Filter coefficient for a blur radius, in `APREC` fixed point
fn coefficient(blur: f32) -> i32 {
    let sigma = blur * 0.577_35;
    ((1 << APREC) as f32 * (1.0 - (-2.3 / (sigma + 1.0)).exp())) as i32
}

/// Blur the `width` x `height` area at the start of `pixels` in place
///
/// Radii below 1 leave the bitmap untouched. The outermost row and column on
/// every side are forced to zero.
pub fn blur(pixels: &mut [u8], width: usize, height: usize, stride: usize, blur: f32) {
    if blur < 1.0 || width == 0 || height == 0 {
        return;
    }
    if pixels.len() < (height - 1) * stride + width {
        return;
    }
    let alpha = coefficient(blur);
    blur_vertical(pixels, width, height, stride, alpha);
    blur_horizontal(pixels, width, height, stride, alpha);
    blur_vertical(pixels, width, height, stride, alpha);
    blur_horizontal(pixels, width, height, stride, alpha);
}

#[inline]
fn step(z: &mut i32, px: &mut u8, alpha: i32) {
    *z += (alpha * (((*px as i32) << ZPREC) - *z)) >> APREC;
    *px = (*z >> ZPREC) as u8;
}

fn blur_horizontal(pixels: &mut [u8], width: usize, height: usize, stride: usize, alpha: i32) {
    for row in pixels.chunks_mut(stride).take(height) {
        let row = &mut row[..width];
        let mut z = 0;
        for px in row.iter_mut().skip(1) {
            step(&mut z, px, alpha);
        }
        row[width - 1] = 0;
        z = 0;
        for px in row[..width - 1].iter_mut().rev() {
            step(&mut z, px, alpha);
        }
        row[0] = 0;
    }
}

fn blur_vertical(pixels: &mut [u8], width: usize, height: usize, stride: usize, alpha: i32) {
    for x in 0..width {
        let mut z = 0;
        for y in 1..height {
            step(&mut z, &mut pixels[y * stride + x], alpha);
        }
        pixels[(height - 1) * stride + x] = 0;
        z = 0;
        for y in (0..height - 1).rev() {
            step(&mut z, &mut pixels[y * stride + x], alpha);
        }
        pixels[x] = 0;
    }
}
