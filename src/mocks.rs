use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;
use parking_lot::Mutex;

use crate::errors::{Result, SegError};
use crate::mask::Mask;
use crate::traits::{DisplayControl, FrameDisplay, FrameSource, Segmentation, SegmentationModel};

fn canned(mask: &Mask) -> Segmentation {
    let start = Instant::now();
    let mask = mask.clone();
    Segmentation {
        mask,
        elapsed: start.elapsed(),
    }
}

/// Test double that always answers with the same mask.
#[derive(Debug, Clone)]
pub struct MockSegmentationModel {
    mask: Mask,
    seen: Arc<Mutex<Vec<RgbImage>>>,
}

impl MockSegmentationModel {
    pub fn new(mask: Mask) -> Self {
        Self {
            mask,
            seen: Arc::default(),
        }
    }

    /// Frames handed to the model, in call order.
    pub fn seen_frames(&self) -> Arc<Mutex<Vec<RgbImage>>> {
        Arc::clone(&self.seen)
    }
}

impl SegmentationModel for MockSegmentationModel {
    fn segment(&self, frame: &RgbImage) -> Result<Segmentation> {
        self.seen.lock().push(frame.clone());
        Ok(canned(&self.mask))
    }
}

/// Succeeds like [`MockSegmentationModel`] except on one call.
#[derive(Debug)]
pub struct FailingModel {
    fail_on: usize,
    calls: AtomicUsize,
    mask: Mask,
}

impl FailingModel {
    /// Fails on the `fail_on`-th call, counting from zero.
    pub const fn on_call(fail_on: usize, mask: Mask) -> Self {
        Self {
            fail_on,
            calls: AtomicUsize::new(0),
            mask,
        }
    }
}

impl SegmentationModel for FailingModel {
    fn segment(&self, _frame: &RgbImage) -> Result<Segmentation> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == self.fail_on {
            return Err(SegError::Inference {
                operation: "graph execution".to_string(),
                source: "injected failure".into(),
            });
        }
        Ok(canned(&self.mask))
    }
}

/// In-memory frames.
#[derive(Debug, Default)]
pub struct VecFrameSource {
    frames: VecDeque<RgbImage>,
    total: u64,
}

impl VecFrameSource {
    pub fn new(frames: Vec<RgbImage>) -> Self {
        Self {
            total: frames.len() as u64,
            frames: frames.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for VecFrameSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        Ok(self.frames.pop_front())
    }

    fn len_hint(&self) -> Option<u64> {
        Some(self.total)
    }
}

/// Display that requests a stop after a fixed number of frames.
#[derive(Debug, Default)]
pub struct ScriptedDisplay {
    stop_after: Option<usize>,
    shown: usize,
}

impl ScriptedDisplay {
    pub const fn never_stop() -> Self {
        Self {
            stop_after: None,
            shown: 0,
        }
    }

    pub const fn stop_after(frames: usize) -> Self {
        Self {
            stop_after: Some(frames),
            shown: 0,
        }
    }

    pub const fn shown(&self) -> usize {
        self.shown
    }
}

impl FrameDisplay for ScriptedDisplay {
    fn show(&mut self, _composite: &RgbImage) -> Result<DisplayControl> {
        self.shown += 1;
        match self.stop_after {
            Some(limit) if self.shown >= limit => Ok(DisplayControl::Stop),
            _ => Ok(DisplayControl::Continue),
        }
    }
}
