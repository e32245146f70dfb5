use ab_glyph::{Font, FontRef, PxScale, ScaleFont};
use anyhow::Result;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;

static DEJAVU_SANS: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

/// Draw `text` in DejaVu Sans with its baseline at `(x, baseline)`, `size` pixels tall.
///
/// Glyphs are antialiased against the existing pixels and clipped to the image.
pub fn draw_text(
    image: &mut RgbImage,
    x: i32,
    baseline: i32,
    size: f32,
    text: &str,
    color: Rgb<u8>,
) -> Result<()> {
    let font = FontRef::try_from_slice(DEJAVU_SANS)?;
    let scale = PxScale::from(size);
    let ascent = font.as_scaled(scale).ascent().round() as i32;

    draw_text_mut(image, color, x, baseline - ascent, scale, &font, text);
    Ok(())
}
