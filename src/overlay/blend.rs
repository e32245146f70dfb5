use anyhow::{ensure, Result};
use image::{imageops, RgbImage};
use rayon::prelude::*;

/// `alpha * base + (1 - alpha) * top`, rounded and saturated per channel.
pub fn blend(base: &RgbImage, top: &RgbImage, alpha: f32) -> Result<RgbImage> {
    ensure!(
        base.dimensions() == top.dimensions(),
        "Image and mask dimensions do not match: {:?} vs {:?}",
        base.dimensions(),
        top.dimensions()
    );

    let beta = 1.0 - alpha;
    let mut out = base.clone();
    let samples: &mut [u8] = &mut out;
    samples
        .par_iter_mut()
        .zip(top.as_raw().par_iter())
        .for_each(|(b, &t)| {
            let v = alpha * f32::from(*b) + beta * f32::from(t);
            *b = v.round().clamp(0.0, 255.0) as u8;
        });

    Ok(out)
}

/// Place two equally sized images next to each other.
pub fn side_by_side(left: &RgbImage, right: &RgbImage) -> Result<RgbImage> {
    ensure!(
        left.dimensions() == right.dimensions(),
        "Side-by-side halves differ in size: {:?} vs {:?}",
        left.dimensions(),
        right.dimensions()
    );

    let (width, height) = left.dimensions();
    let mut canvas = RgbImage::new(width * 2, height);
    imageops::replace(&mut canvas, left, 0, 0);
    imageops::replace(&mut canvas, right, i64::from(width), 0);
    Ok(canvas)
}
