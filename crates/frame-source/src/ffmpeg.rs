//! Container video decoded through FFmpeg
//!
//! Enabled by the `ffmpeg` feature. Any container and codec the linked
//! libavformat/libavcodec understand can be played (MP4, AVI, MKV...).

use std::path::{Path, PathBuf};
use std::time::Instant;

use ffmpeg_next as ffmpeg;
use ffmpeg::util::format::pixel::Pixel;
use image::RgbImage;
use tracing::debug;

use crate::frame::VideoFrame;
use crate::source::{stamp, FrameSource};
use crate::SourceError;

/// The best video stream of a container file
pub struct FfmpegSource {
    path: PathBuf,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    frame_count: Option<u64>,
    fps: Option<f64>,
    drained: bool,
    position: u64,
    opened: Instant,
}

impl FfmpegSource {
    /// Open `path` and its best video stream
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let open_err = |e: ffmpeg::Error| SourceError::Open(format!("{}: {}", path.display(), e));

        ffmpeg::init().map_err(open_err)?;
        let input = ffmpeg::format::input(&path).map_err(open_err)?;
        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| SourceError::Open(format!("{}: no video stream", path.display())))?;

        let stream_index = stream.index();
        let frame_count = u64::try_from(stream.frames()).ok().filter(|&n| n > 0);
        let rate = stream.avg_frame_rate();
        let fps = (rate.numerator() > 0 && rate.denominator() > 0).then(|| f64::from(rate));

        let decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .and_then(|context| context.decoder().video())
            .map_err(open_err)?;

        debug!(
            "Opened {} stream {} ({}x{}, {:?} fps)",
            path.display(),
            stream_index,
            decoder.width(),
            decoder.height(),
            fps
        );

        Ok(Self {
            path,
            input,
            stream_index,
            decoder,
            frame_count,
            fps,
            drained: false,
            position: 0,
            opened: Instant::now(),
        })
    }

    /// Pull one decoded picture, feeding packets until the decoder yields
    fn next_decoded(&mut self) -> Result<Option<ffmpeg::frame::Video>, SourceError> {
        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return Ok(Some(decoded));
            }
            if self.drained {
                return Ok(None);
            }

            match self.input.packets().next() {
                Some((stream, packet)) => {
                    if stream.index() != self.stream_index {
                        continue;
                    }
                    self.decoder
                        .send_packet(&packet)
                        .map_err(|e| SourceError::Decode(e.to_string()))?;
                }
                None => {
                    self.decoder
                        .send_eof()
                        .map_err(|e| SourceError::Read(e.to_string()))?;
                    self.drained = true;
                }
            }
        }
    }
}

impl FrameSource for FfmpegSource {
    fn read_frame(&mut self) -> Result<Option<VideoFrame>, SourceError> {
        let Some(decoded) = self.next_decoded()? else {
            return Ok(None);
        };

        let mut rgb = ffmpeg::frame::Video::empty();
        decoded
            .converter(Pixel::RGB24)
            .and_then(|mut scaler| scaler.run(&decoded, &mut rgb))
            .map_err(|e| SourceError::Decode(e.to_string()))?;

        let image = frame_to_image(&rgb)?;
        let sequence = self.position;
        self.position += 1;
        Ok(Some(stamp(VideoFrame::new(image, 0, sequence), self.opened, sequence)))
    }

    fn rewind(&mut self) -> Result<(), SourceError> {
        match self.input.seek(0, ..) {
            Ok(()) => {
                self.decoder.flush();
                self.drained = false;
                self.position = 0;
            }
            Err(e) => {
                // Some containers cannot seek; start over from the file
                debug!("Seek failed on {} ({}), reopening", self.path.display(), e);
                let opened = self.opened;
                *self = Self::open(&self.path)?;
                self.opened = opened;
            }
        }
        Ok(())
    }

    fn frame_count(&self) -> Option<u64> {
        self.frame_count
    }

    fn fps(&self) -> Option<f64> {
        self.fps
    }

    fn describe(&self) -> String {
        format!("video {} ({}x{})", self.path.display(), self.decoder.width(), self.decoder.height())
    }
}

/// Copy a packed RGB24 frame into an image, dropping row padding
fn frame_to_image(frame: &ffmpeg::frame::Video) -> Result<RgbImage, SourceError> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = width as usize * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let line = data
            .get(start..start + row_bytes)
            .ok_or_else(|| SourceError::Decode("frame row out of bounds".to_string()))?;
        pixels.extend_from_slice(line);
    }

    RgbImage::from_raw(width, height, pixels)
        .ok_or_else(|| SourceError::Decode("frame buffer size mismatch".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Raw Motion-JPEG stream, which libavformat demuxes without a container
    fn write_clip(path: &Path, shades: &[u8]) {
        let mut clip = Vec::new();
        for &shade in shades {
            let frame = VideoFrame::new(RgbImage::from_pixel(64, 32, Rgb([shade; 3])), 0, 0);
            clip.extend_from_slice(&frame.encode_jpeg(90).unwrap());
        }
        std::fs::write(path, clip).unwrap();
    }

    #[test]
    fn test_decodes_and_rewinds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mjpeg");
        write_clip(&path, &[20, 230, 20]);

        let mut source = FfmpegSource::open(&path).unwrap();
        let mut first_pass = Vec::new();
        while let Some(frame) = source.read_frame().unwrap() {
            assert_eq!((frame.width(), frame.height()), (64, 32));
            first_pass.push(frame.sequence);
        }
        assert_eq!(first_pass, vec![0, 1, 2]);

        source.rewind().unwrap();
        let frame = source.read_frame().unwrap().unwrap();
        assert_eq!(frame.sequence, 0);
        assert!(frame.get_pixel(10, 10).unwrap()[0] < 60);
    }

    #[test]
    fn test_non_video_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.mp4");
        std::fs::write(&path, b"not a video container").unwrap();

        assert!(matches!(FfmpegSource::open(&path), Err(SourceError::Open(_))));
    }

    #[test]
    fn test_missing_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FfmpegSource::open(dir.path().join("missing.avi")).is_err());
    }
}
