pub mod bundle;
pub mod config;
pub mod display;
pub mod errors;
pub mod mask;
pub mod model;
pub mod overlay;
pub mod pipeline;
pub mod traits;
pub mod video;

pub mod mocks;

use std::path::PathBuf;

use tracing::info;
#[cfg(not(feature = "display"))]
use tracing::warn;

pub use bundle::ModelBundle;
pub use config::{Config, ModelVariant};
pub use errors::{Result, SegError};
pub use mask::Mask;
pub use model::{EngineOptions, FrozenGraph};
pub use pipeline::{ArtifactWriter, RunSummary, VideoSegmenter};
pub use traits::*;

use display::HeadlessDisplay;
use overlay::ColorLut;
use video::VideoReader;

/// Inputs validated before anything heavy is loaded or anything is written.
#[derive(Debug, Clone)]
pub struct Startup {
    pub bundle: ModelBundle,
    pub graph_path: PathBuf,
    pub video_path: PathBuf,
}

/// Descriptor files, graph file presence and the video argument, in that order.
///
/// Nothing on disk is modified, so a failure here leaves a previous output directory intact.
pub fn prepare(config: &Config) -> Result<Startup> {
    info!(
        video = %config.video,
        log = %config.log.display(),
        path = %config.path.display(),
        model = config.model.stem(),
        verbose = config.verbose,
        "Interface"
    );

    let bundle = ModelBundle::load(&config.path)?;
    let graph_path = bundle.graph_path(config.model)?;
    let video_path = config.video_path().ok_or(SegError::WebcamUnsupported)?;

    Ok(Startup {
        bundle,
        graph_path,
        video_path,
    })
}

pub fn engine_options(config: &Config) -> EngineOptions {
    EngineOptions {
        optimize: !config.no_optimize,
    }
}

/// The whole tool: validate, open the video, plan the graph for its frame size, wipe the
/// output directory, process the video.
pub fn run(config: &Config) -> Result<RunSummary> {
    let startup = prepare(config)?;

    let mut source = VideoReader::open(&startup.video_path)?;
    let engine = FrozenGraph::load(
        &startup.graph_path,
        &startup.bundle,
        source.dimensions(),
        engine_options(config),
    )?;
    let lut = ColorLut::from_data(&startup.bundle.data);
    let writer = ArtifactWriter::prepare(&config.log)?;

    let mut display = open_display(config.headless);

    VideoSegmenter::new(engine, lut, writer).run(&mut source, display.as_mut())
}

#[cfg(feature = "display")]
fn open_display(headless: bool) -> Box<dyn FrameDisplay> {
    if headless {
        Box::new(HeadlessDisplay)
    } else {
        Box::new(display::WindowDisplay::new())
    }
}

#[cfg(not(feature = "display"))]
fn open_display(headless: bool) -> Box<dyn FrameDisplay> {
    if !headless {
        warn!("Built without the `display` feature; running headless");
    }
    Box::new(HeadlessDisplay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;
    use tempfile::TempDir;

    fn config(model_dir: &std::path::Path, log: &std::path::Path, video: &str) -> Config {
        Config::parse_from([
            "pb-video-seg",
            "-p",
            model_dir.to_str().unwrap(),
            "-l",
            log.to_str().unwrap(),
            "-v",
            video,
            "--headless",
        ])
    }

    #[test]
    fn test_prepare_success() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        bundle::tests::write_bundle(temp_dir.path());
        fs::write(temp_dir.path().join("frozen_nchw.pb"), b"graph").unwrap();

        let startup = prepare(&config(temp_dir.path(), &temp_dir.path().join("log"), "in.mp4"))?;
        assert_eq!(startup.graph_path, temp_dir.path().join("frozen_nchw.pb"));
        assert_eq!(startup.video_path, PathBuf::from("in.mp4"));
        Ok(())
    }

    #[test]
    fn test_run_stops_at_missing_graph_without_touching_output() {
        let temp_dir = TempDir::new().unwrap();
        bundle::tests::write_bundle(temp_dir.path());
        let log = temp_dir.path().join("log");
        fs::create_dir_all(&log).unwrap();
        fs::write(log.join("full_0.jpg"), b"previous run").unwrap();

        let err = run(&config(temp_dir.path(), &log, "in.mp4")).unwrap_err();
        assert!(matches!(err, SegError::ModelNotFound { .. }));
        assert!(log.join("full_0.jpg").is_file());
    }

    #[test]
    fn test_webcam_request_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        bundle::tests::write_bundle(temp_dir.path());
        fs::write(temp_dir.path().join("frozen_nchw.pb"), b"graph").unwrap();
        let log = temp_dir.path().join("log");

        let err = run(&config(temp_dir.path(), &log, "")).unwrap_err();
        assert!(matches!(err, SegError::WebcamUnsupported));
        assert!(!log.exists());
    }

    #[test]
    fn test_missing_video_fails_before_graph_and_output() {
        let temp_dir = TempDir::new().unwrap();
        bundle::tests::write_bundle(temp_dir.path());
        // not a GraphDef: the video must fail first
        fs::write(temp_dir.path().join("frozen_nchw.pb"), b"graph").unwrap();
        let log = temp_dir.path().join("log");
        fs::create_dir_all(&log).unwrap();
        fs::write(log.join("mask_0.jpg"), b"previous run").unwrap();

        let video = temp_dir.path().join("missing.mp4");
        let err = run(&config(temp_dir.path(), &log, video.to_str().unwrap())).unwrap_err();
        assert!(matches!(err, SegError::Video { .. }));
        assert!(log.join("mask_0.jpg").is_file());
    }

    #[test]
    fn test_engine_options_follow_flag() {
        let mut cfg = Config::parse_from(["pb-video-seg", "-p", "m"]);
        assert!(engine_options(&cfg).optimize);
        cfg.no_optimize = true;
        assert!(!engine_options(&cfg).optimize);
    }
}
