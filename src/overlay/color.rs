use image::{Rgb, RgbImage};
use rayon::prelude::*;

use crate::bundle::DataConfig;
use crate::mask::Mask;

const UNMAPPED: Rgb<u8> = Rgb([0, 0, 0]);

/// Class index to display color.
///
/// Built by walking `label_remap` in ascending raw-label order, so when several raw labels
/// collapse onto one class the color of the highest raw label wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorLut {
    colors: Vec<Rgb<u8>>,
}

impl ColorLut {
    pub fn from_data(data: &DataConfig) -> Self {
        let size = data
            .label_remap
            .values()
            .max()
            .map_or(0, |&max| max as usize + 1);
        let mut colors = vec![UNMAPPED; size];

        for (raw, &class) in &data.label_remap {
            if let Some(&[b, g, r]) = data.color_map.get(raw) {
                colors[class as usize] = Rgb([r, g, b]);
            }
        }

        Self { colors }
    }

    pub fn color(&self, class: u32) -> Rgb<u8> {
        self.colors
            .get(class as usize)
            .copied()
            .unwrap_or(UNMAPPED)
    }

    /// Render a mask as an RGB image of the same size.
    pub fn colorize(&self, mask: &Mask) -> RgbImage {
        let (width, height) = mask.dimensions();
        let classes = mask.classes();
        let mut out = RgbImage::new(width, height);
        if width == 0 {
            return out;
        }

        let samples: &mut [u8] = &mut out;
        samples
            .par_chunks_exact_mut(width as usize * 3)
            .enumerate()
            .for_each(|(y, row)| {
                for (pixel, &class) in row.chunks_exact_mut(3).zip(classes.row(y)) {
                    pixel.copy_from_slice(&self.color(class).0);
                }
            });

        out
    }
}

/// Swap the first and third channel: RGB to BGR and back.
pub fn swap_red_blue(image: &RgbImage) -> RgbImage {
    let mut out = image.clone();
    let samples: &mut [u8] = &mut out;
    samples
        .par_chunks_exact_mut(3)
        .for_each(|pixel| pixel.swap(0, 2));
    out
}
