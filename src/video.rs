//! Video file decoding.
//!
//! Frames are decoded with ffmpeg, converted to packed RGB24 and handed out one at a time;
//! nothing is read ahead of the consumer.

use std::path::Path;

use ffmpeg_next as ffmpeg;
use image::RgbImage;
use tracing::{debug, info};

use crate::errors::{Result, SegError};
use crate::traits::FrameSource;

pub struct VideoReader {
    input_ctx: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Video,
    video_stream_index: usize,
    scaler: ffmpeg::software::scaling::Context,
    frame_count: u64,
    expected_frames: Option<u64>,
    draining: bool,
}

impl VideoReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        ffmpeg::init().map_err(|e| video_err("ffmpeg initialization", e))?;

        let input_ctx = ffmpeg::format::input(&path)
            .map_err(|e| video_err(&format!("opening {}", path.display()), e))?;

        let video_stream = input_ctx
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| SegError::Video {
                operation: format!("finding a video stream in {}", path.display()),
                source: "no video stream".into(),
            })?;
        let video_stream_index = video_stream.index();
        let expected_frames = u64::try_from(video_stream.frames()).ok().filter(|&n| n > 0);
        let fps = f64::from(video_stream.avg_frame_rate());

        let decoder = ffmpeg::codec::context::Context::from_parameters(video_stream.parameters())
            .map_err(|e| video_err("codec context creation", e))?
            .decoder()
            .video()
            .map_err(|e| video_err("video decoder creation", e))?;

        let (width, height) = (decoder.width(), decoder.height());
        let scaler = ffmpeg::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg::format::Pixel::RGB24,
            width,
            height,
            ffmpeg::software::scaling::Flags::BILINEAR,
        )
        .map_err(|e| video_err("scaler creation", e))?;

        info!(
            width,
            height,
            fps = format_args!("{fps:.2}"),
            frames = ?expected_frames,
            "Opened video {}",
            path.display()
        );

        Ok(Self {
            input_ctx,
            decoder,
            video_stream_index,
            scaler,
            frame_count: 0,
            expected_frames,
            draining: false,
        })
    }

    /// Decoded frame size (width, height); frames are handed out at this size.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.decoder.width(), self.decoder.height())
    }

    fn receive(&mut self) -> Result<Option<RgbImage>> {
        let mut decoded = ffmpeg::frame::Video::empty();
        match self.decoder.receive_frame(&mut decoded) {
            Ok(()) => {}
            Err(ffmpeg::Error::Eof) => return Ok(None),
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => {
                return Ok(None)
            }
            Err(e) => return Err(video_err("frame decoding", e)),
        }

        let mut rgb_frame = ffmpeg::frame::Video::empty();
        self.scaler
            .run(&decoded, &mut rgb_frame)
            .map_err(|e| video_err("pixel format conversion", e))?;

        let image = packed_rgb(&rgb_frame)?;
        self.frame_count += 1;
        if self.frame_count % 100 == 0 {
            debug!("Decoded {} frames", self.frame_count);
        }
        Ok(Some(image))
    }
}

impl FrameSource for VideoReader {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        loop {
            if let Some(image) = self.receive()? {
                return Ok(Some(image));
            }
            if self.draining {
                info!("End of video reached. Total frames: {}", self.frame_count);
                return Ok(None);
            }

            let index = self.video_stream_index;
            let packet = self
                .input_ctx
                .packets()
                .find(|(stream, _)| stream.index() == index)
                .map(|(_, packet)| packet);

            match packet {
                Some(packet) => self
                    .decoder
                    .send_packet(&packet)
                    .map_err(|e| video_err("sending packet to decoder", e))?,
                None => {
                    self.decoder
                        .send_eof()
                        .map_err(|e| video_err("flushing decoder", e))?;
                    self.draining = true;
                }
            }
        }
    }

    fn len_hint(&self) -> Option<u64> {
        self.expected_frames
    }
}

/// Copy an RGB24 frame into a tightly packed buffer, dropping the row padding.
fn packed_rgb(frame: &ffmpeg::frame::Video) -> Result<RgbImage> {
    let (width, height) = (frame.width(), frame.height());
    let stride = frame.stride(0);
    let row_bytes = width as usize * 3;
    let data = frame.data(0);

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in data.chunks(stride.max(row_bytes)).take(height as usize) {
        match row.get(..row_bytes) {
            Some(row) => pixels.extend_from_slice(row),
            None => break,
        }
    }

    RgbImage::from_raw(width, height, pixels).ok_or_else(|| SegError::Video {
        operation: "frame buffer creation".to_string(),
        source: format!("{width}x{height} frame has a short pixel buffer").into(),
    })
}

fn video_err(operation: &str, source: ffmpeg::Error) -> SegError {
    SegError::Video {
        operation: operation.to_string(),
        source: Box::new(source),
    }
}
