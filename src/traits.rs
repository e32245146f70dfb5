use std::time::Duration;

use crate::errors::Result;
use crate::mask::Mask;
use image::RgbImage;

/// One model execution.
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub mask: Mask,
    /// Wall-clock time of the execution itself, without pre- or post-processing.
    pub elapsed: Duration,
}

/// Frame-level segmentation.
///
/// The pipeline only depends on this trait, so the loop can be driven by the frozen graph
/// in production and by a canned mask in tests.
pub trait SegmentationModel {
    /// Predict a class index per pixel.
    ///
    /// `frame` is already in the channel order the graph was trained on (blue-green-red for
    /// graphs exported from OpenCV pipelines). The returned mask has the frame's dimensions.
    fn segment(&self, frame: &RgbImage) -> Result<Segmentation>;
}

/// A finite, ordered sequence of decoded frames.
pub trait FrameSource {
    /// Next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;

    /// Estimated number of frames, if the container reports one.
    fn len_hint(&self) -> Option<u64> {
        None
    }
}

/// What the viewer asked for after a frame was shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayControl {
    Continue,
    Stop,
}

/// Somewhere to show composites as they are produced.
pub trait FrameDisplay {
    fn show(&mut self, composite: &RgbImage) -> Result<DisplayControl>;
}
