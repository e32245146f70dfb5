use image::RgbImage;

use crate::errors::Result;
use crate::traits::{DisplayControl, FrameDisplay};

pub const WINDOW_TITLE: &str = "video";

/// Used with `--headless` or when built without the `display` feature.
#[derive(Debug, Default)]
pub struct HeadlessDisplay;

impl FrameDisplay for HeadlessDisplay {
    fn show(&mut self, _composite: &RgbImage) -> Result<DisplayControl> {
        Ok(DisplayControl::Continue)
    }
}

/// `0RGB` words as expected by window framebuffers.
pub fn to_framebuffer(image: &RgbImage, buffer: &mut Vec<u32>) {
    buffer.clear();
    buffer.extend(
        image
            .pixels()
            .map(|p| (u32::from(p[0]) << 16) | (u32::from(p[1]) << 8) | u32::from(p[2])),
    );
}

#[cfg(feature = "display")]
pub use window::WindowDisplay;

#[cfg(feature = "display")]
mod window {
    use image::RgbImage;
    use minifb::{Key, KeyRepeat, ScaleMode, Window, WindowOptions};
    use tracing::{debug, info};

    use super::{to_framebuffer, WINDOW_TITLE};
    use crate::errors::{Result, SegError};
    use crate::traits::{DisplayControl, FrameDisplay};

    /// Resizable preview window. Escape or closing the window stops the run.
    #[derive(Default)]
    pub struct WindowDisplay {
        window: Option<Window>,
        size: (usize, usize),
        buffer: Vec<u32>,
    }

    impl WindowDisplay {
        pub fn new() -> Self {
            Self::default()
        }

        fn window_for(&mut self, width: usize, height: usize) -> Result<&mut Window> {
            // minifb cannot change the framebuffer size of an open window
            if self.window.is_none() || self.size != (width, height) {
                debug!(width, height, "Creating preview window");
                let window = Window::new(
                    WINDOW_TITLE,
                    width,
                    height,
                    WindowOptions {
                        resize: true,
                        scale_mode: ScaleMode::AspectRatioStretch,
                        ..WindowOptions::default()
                    },
                )
                .map_err(|e| SegError::Display {
                    operation: "window creation".to_string(),
                    source: Box::new(e),
                })?;
                self.window = Some(window);
                self.size = (width, height);
            }

            self.window.as_mut().ok_or_else(|| SegError::Display {
                operation: "window lookup".to_string(),
                source: "preview window missing".into(),
            })
        }
    }

    impl FrameDisplay for WindowDisplay {
        fn show(&mut self, composite: &RgbImage) -> Result<DisplayControl> {
            let (width, height) = (composite.width() as usize, composite.height() as usize);
            let mut buffer = std::mem::take(&mut self.buffer);
            to_framebuffer(composite, &mut buffer);

            let window = self.window_for(width, height)?;
            window
                .update_with_buffer(&buffer, width, height)
                .map_err(|e| SegError::Display {
                    operation: "window update".to_string(),
                    source: Box::new(e),
                })?;

            let stop = !window.is_open()
                || window.is_key_down(Key::Escape)
                || window.is_key_pressed(Key::Escape, KeyRepeat::No);
            self.buffer = buffer;

            if stop {
                info!("Stop requested from the preview window");
                Ok(DisplayControl::Stop)
            } else {
                Ok(DisplayControl::Continue)
            }
        }
    }
}
