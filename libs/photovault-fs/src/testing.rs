//! Image fixtures for unit tests

use std::io::Cursor;

use image::{ImageFormat, Rgb, RgbImage};

fn pattern(width: u32, height: u32, seed: u8) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x as u8).wrapping_mul(seed),
            (y as u8).wrapping_add(seed),
            seed,
        ])
    })
}

fn encode(width: u32, height: u32, seed: u8, format: ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    pattern(width, height, seed).write_to(&mut out, format).unwrap();
    out.into_inner()
}

/// JPEG bytes whose content varies with `seed`
pub fn jpeg_fixture(width: u32, height: u32, seed: u8) -> Vec<u8> {
    encode(width, height, seed, ImageFormat::Jpeg)
}

pub fn png_fixture(width: u32, height: u32, seed: u8) -> Vec<u8> {
    encode(width, height, seed, ImageFormat::Png)
}
