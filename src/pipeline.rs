use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use image::{ImageFormat, RgbImage};
use indicatif::{style::TemplateError, ProgressBar, ProgressStyle};
use tracing::{debug, info};

use crate::errors::{Result, SegError};
use crate::overlay::{self, swap_red_blue, ColorLut};
use crate::traits::{DisplayControl, FrameDisplay, FrameSource, Segmentation, SegmentationModel};

/// Delete `dir` if it exists and create it again, empty.
pub fn recreate_dir(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => debug!("Removed previous output in {}", dir.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            return Err(SegError::OutputDir {
                path: dir.to_path_buf(),
                operation: "removing previous contents".to_string(),
                source: e,
            })
        }
    }

    fs::create_dir_all(dir).map_err(|e| SegError::OutputDir {
        path: dir.to_path_buf(),
        operation: "creation".to_string(),
        source: e,
    })
}

/// Writes `mask_<i>.jpg` and `full_<i>.jpg` into one output directory.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dir: PathBuf,
}

impl ArtifactWriter {
    /// Wipes `dir` and returns a writer for it.
    pub fn prepare(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        recreate_dir(&dir)?;
        info!("Writing predictions to {}", dir.display());
        Ok(Self { dir })
    }

    pub fn mask_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("mask_{index}.jpg"))
    }

    pub fn full_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("full_{index}.jpg"))
    }

    pub fn write(&self, prediction: &FramePrediction) -> Result<()> {
        let index = prediction.index;
        for (image, path) in [
            (&prediction.color_mask, self.mask_path(index)),
            (&prediction.composite, self.full_path(index)),
        ] {
            image
                .save_with_format(&path, ImageFormat::Jpeg)
                .map_err(|e| SegError::frame(index, &format!("writing {}", path.display()), e))?;
        }
        Ok(())
    }
}

/// Everything produced for one frame.
#[derive(Debug, Clone)]
pub struct FramePrediction {
    pub index: u64,
    pub elapsed: Duration,
    pub color_mask: RgbImage,
    pub composite: RgbImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub frames: u64,
    pub stopped_early: bool,
    pub inference_time: Duration,
}

impl RunSummary {
    pub fn mean_elapsed(&self) -> Option<Duration> {
        u32::try_from(self.frames)
            .ok()
            .filter(|&n| n > 0)
            .map(|n| self.inference_time / n)
    }
}

/// Runs the model over every frame of a source, one frame at a time.
pub struct VideoSegmenter<M: SegmentationModel> {
    model: M,
    lut: ColorLut,
    writer: ArtifactWriter,
}

impl<M: SegmentationModel> VideoSegmenter<M> {
    pub const fn new(model: M, lut: ColorLut, writer: ArtifactWriter) -> Self {
        Self { model, lut, writer }
    }

    pub fn writer(&self) -> &ArtifactWriter {
        &self.writer
    }

    /// Inference and rendering for a single frame; nothing is written.
    pub fn predict_frame(&self, index: u64, frame: &RgbImage) -> Result<FramePrediction> {
        let model_input = swap_red_blue(frame);

        let Segmentation { mask, elapsed } = self
            .model
            .segment(&model_input)
            .map_err(|e| SegError::frame(index, "inference", e))?;
        info!(
            "Prediction for frame {index}. Elapsed: {:.3}s",
            elapsed.as_secs_f64()
        );

        if mask.dimensions() != frame.dimensions() {
            return Err(SegError::frame(
                index,
                "mask validation",
                format!(
                    "mask is {:?}, frame is {:?}",
                    mask.dimensions(),
                    frame.dimensions()
                ),
            ));
        }

        let color_mask = self.lut.colorize(&mask);
        let composite = overlay::compose(frame, &color_mask, elapsed)
            .map_err(|e| SegError::frame(index, "compositing", e))?;

        Ok(FramePrediction {
            index,
            elapsed,
            color_mask,
            composite,
        })
    }

    /// Process frames until the source ends or the display asks to stop.
    ///
    /// A failing frame aborts the whole run; the frames before it are already on disk.
    pub fn run<S, D>(&self, source: &mut S, display: &mut D) -> Result<RunSummary>
    where
        S: FrameSource + ?Sized,
        D: FrameDisplay + ?Sized,
    {
        let progress_bar = progress_bar(source.len_hint())?;
        let mut summary = RunSummary::default();

        while let Some(frame) = source.next_frame()? {
            let index = summary.frames;
            let prediction = self.predict_frame(index, &frame)?;
            self.writer.write(&prediction)?;

            summary.frames += 1;
            summary.inference_time += prediction.elapsed;
            progress_bar.inc(1);

            if display.show(&prediction.composite)? == DisplayControl::Stop {
                summary.stopped_early = true;
                break;
            }
        }

        progress_bar.finish();
        match summary.mean_elapsed() {
            Some(mean) => info!(
                frames = summary.frames,
                stopped_early = summary.stopped_early,
                "Processed {} frames, mean inference {:.3}s",
                summary.frames,
                mean.as_secs_f64()
            ),
            None => info!("No frames were processed"),
        }

        Ok(summary)
    }
}

fn progress_bar(len: Option<u64>) -> Result<ProgressBar> {
    let template_err = |e: TemplateError| SegError::Display {
        operation: "progress bar template".to_string(),
        source: Box::new(e),
    };

    let progress_bar = match len {
        Some(len) => ProgressBar::new(len).with_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec} {eta})",
            )
            .map_err(template_err)?
            .progress_chars("#>-"),
        ),
        None => ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {pos} frames ({per_sec})")
                .map_err(template_err)?,
        ),
    };
    Ok(progress_bar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::Mask;
    use crate::mocks::{FailingModel, MockSegmentationModel, ScriptedDisplay, VecFrameSource};
    use image::Rgb;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn lut() -> ColorLut {
        ColorLut::from_data(&crate::bundle::DataConfig {
            name: None,
            label_map: BTreeMap::new(),
            label_remap: [(0, 0), (1, 1)].into_iter().collect(),
            color_map: [(0, [0, 0, 0]), (1, [0, 0, 255])].into_iter().collect(),
        })
    }

    fn frames(count: usize) -> VecFrameSource {
        VecFrameSource::new(
            (0..count)
                .map(|i| RgbImage::from_pixel(16, 12, Rgb([i as u8, 0, 0])))
                .collect(),
        )
    }

    #[test]
    fn test_recreate_dir_wipes_contents() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("out");
        fs::create_dir_all(out.join("nested")).unwrap();
        fs::write(out.join("mask_99.jpg"), b"old").unwrap();

        recreate_dir(&out)?;
        assert!(out.is_dir());
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
        Ok(())
    }

    #[test]
    fn test_recreate_dir_creates_missing_parents() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("a/b/c");
        recreate_dir(&out)?;
        assert!(out.is_dir());
        Ok(())
    }

    #[test]
    fn test_model_sees_bgr() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let model = MockSegmentationModel::new(Mask::filled(2, 2, 0));
        let seen = model.seen_frames();
        let segmenter =
            VideoSegmenter::new(model, lut(), ArtifactWriter::prepare(temp_dir.path())?);

        let frame = RgbImage::from_pixel(2, 2, Rgb([10, 20, 30]));
        segmenter.predict_frame(0, &frame)?;

        let seen = seen.lock();
        assert_eq!(seen[0].get_pixel(0, 0), &Rgb([30, 20, 10]));
        Ok(())
    }

    #[test]
    fn test_composite_is_double_width() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let segmenter = VideoSegmenter::new(
            MockSegmentationModel::new(Mask::from_fn(16, 40, |x, _| u32::from(x >= 8))),
            lut(),
            ArtifactWriter::prepare(temp_dir.path())?,
        );

        let frame = RgbImage::from_pixel(16, 40, Rgb([100, 100, 100]));
        let prediction = segmenter.predict_frame(0, &frame)?;

        assert_eq!(prediction.composite.dimensions(), (32, 40));
        assert_eq!(prediction.color_mask.dimensions(), (16, 40));
        assert_eq!(prediction.color_mask.get_pixel(12, 0), &Rgb([255, 0, 0]));
        // right half, class 1 region, top row is clear of the watermark
        assert_eq!(prediction.composite.get_pixel(16 + 12, 0), &Rgb([178, 50, 50]));
        Ok(())
    }

    #[test]
    fn test_mask_size_mismatch_is_frame_error() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let segmenter = VideoSegmenter::new(
            MockSegmentationModel::new(Mask::filled(3, 3, 0)),
            lut(),
            ArtifactWriter::prepare(temp_dir.path())?,
        );

        let err = segmenter
            .predict_frame(4, &RgbImage::new(5, 5))
            .unwrap_err();
        assert!(matches!(err, SegError::Frame { index: 4, .. }));
        Ok(())
    }

    #[test]
    fn test_run_writes_every_frame() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let segmenter = VideoSegmenter::new(
            MockSegmentationModel::new(Mask::filled(16, 12, 1)),
            lut(),
            ArtifactWriter::prepare(temp_dir.path().join("log"))?,
        );

        let summary = segmenter.run(&mut frames(3), &mut ScriptedDisplay::never_stop())?;
        assert_eq!(summary.frames, 3);
        assert!(!summary.stopped_early);

        let writer = segmenter.writer();
        for i in 0..3 {
            assert!(writer.mask_path(i).is_file());
            assert!(writer.full_path(i).is_file());
        }
        assert!(!writer.mask_path(3).exists());

        let full = image::open(writer.full_path(2)).unwrap();
        assert_eq!((full.width(), full.height()), (32, 12));
        Ok(())
    }

    #[test]
    fn test_stop_key_ends_run_after_writing_frame() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let segmenter = VideoSegmenter::new(
            MockSegmentationModel::new(Mask::filled(16, 12, 0)),
            lut(),
            ArtifactWriter::prepare(temp_dir.path())?,
        );

        let mut source = frames(5);
        let mut display = ScriptedDisplay::stop_after(2);
        let summary = segmenter.run(&mut source, &mut display)?;

        assert_eq!(summary.frames, 2);
        assert!(summary.stopped_early);
        assert_eq!(display.shown(), 2);
        assert!(segmenter.writer().full_path(1).is_file());
        assert!(!segmenter.writer().full_path(2).exists());
        assert_eq!(source.remaining(), 3);
        Ok(())
    }

    #[test]
    fn test_failing_frame_aborts_run() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let segmenter = VideoSegmenter::new(
            FailingModel::on_call(1, Mask::filled(16, 12, 0)),
            lut(),
            ArtifactWriter::prepare(temp_dir.path())?,
        );

        let err = segmenter
            .run(&mut frames(4), &mut ScriptedDisplay::never_stop())
            .unwrap_err();
        assert!(matches!(err, SegError::Frame { index: 1, .. }));
        assert!(segmenter.writer().full_path(0).is_file());
        assert!(!segmenter.writer().mask_path(1).exists());
        Ok(())
    }

    #[test]
    fn test_progress_templates_parse() -> Result<()> {
        assert_eq!(progress_bar(Some(7))?.length(), Some(7));
        assert_eq!(progress_bar(None)?.length(), None);
        Ok(())
    }

    #[test]
    fn test_mean_elapsed() {
        let summary = RunSummary {
            frames: 4,
            stopped_early: false,
            inference_time: Duration::from_millis(100),
        };
        assert_eq!(summary.mean_elapsed(), Some(Duration::from_millis(25)));
        assert_eq!(RunSummary::default().mean_elapsed(), None);
    }
}
