pub mod blend;
pub mod color;
pub mod text;

use std::time::Duration;

use anyhow::Result;
use image::{Rgb, RgbImage};

pub use color::{swap_red_blue, ColorLut};

/// Weight of the camera frame when the color mask is laid over it.
pub const OVERLAY_ALPHA: f32 = 0.5;

const WATERMARK_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const WATERMARK_MARGIN: i32 = 10;
const WATERMARK_SIZE: f32 = 20.0;

pub fn watermark_text(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    format!("Time: {:.3}s, FPS: {:.3}img/s.", secs, 1.0 / secs)
}

/// Frame on the left, frame with the color mask blended in on the right, timing stamped
/// in the lower left corner.
pub fn compose(frame: &RgbImage, color_mask: &RgbImage, elapsed: Duration) -> Result<RgbImage> {
    let overlaid = blend::blend(frame, color_mask, OVERLAY_ALPHA)?;
    let mut composite = blend::side_by_side(frame, &overlaid)?;

    let baseline = i32::try_from(composite.height())? - WATERMARK_MARGIN;
    text::draw_text(
        &mut composite,
        WATERMARK_MARGIN,
        baseline,
        WATERMARK_SIZE,
        &watermark_text(elapsed),
        WATERMARK_COLOR,
    )?;

    Ok(composite)
}
