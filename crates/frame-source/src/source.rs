//! Seekable frame sources
//!
//! Every source is finite and rewindable: `read_frame` returns `Ok(None)` at the
//! end of the stream and `rewind` restarts it from the first frame. Looping
//! playback is the caller's decision.

use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::Instant;

use image::ImageFormat;
use tracing::{debug, info, warn};

use crate::frame::VideoFrame;
use crate::SourceError;

/// A finite, rewindable stream of frames
pub trait FrameSource: Send {
    /// Read the next frame, `Ok(None)` at end of stream
    fn read_frame(&mut self) -> Result<Option<VideoFrame>, SourceError>;

    /// Restart from the first frame
    fn rewind(&mut self) -> Result<(), SourceError>;

    /// Number of frames per pass, when known
    fn frame_count(&self) -> Option<u64>;

    /// Nominal playback rate, when the container records one
    fn fps(&self) -> Option<f64> {
        None
    }

    /// Human readable description for logs
    fn describe(&self) -> String;
}

/// Open a source from a local path.
///
/// Directories become image sequences, `.mjpeg`/`.mjpg` files become
/// Motion-JPEG clips and image files are decoded as still images. Anything
/// else is treated as a video container and needs the `ffmpeg` feature.
pub fn open_source(path: impl AsRef<Path>) -> Result<Box<dyn FrameSource>, SourceError> {
    let path = path.as_ref();
    let meta = fs::metadata(path)
        .map_err(|e| SourceError::Open(format!("{}: {}", path.display(), e)))?;

    let source: Box<dyn FrameSource> = if meta.is_dir() {
        Box::new(ImageSequenceSource::open(path)?)
    } else if is_mjpeg_path(path) {
        Box::new(MjpegSource::open(path)?)
    } else if ImageFormat::from_path(path).is_ok() {
        Box::new(StillImageSource::open(path)?)
    } else {
        open_container(path)?
    };

    info!("Opened frame source {}", source.describe());
    Ok(source)
}

#[cfg(feature = "ffmpeg")]
fn open_container(path: &Path) -> Result<Box<dyn FrameSource>, SourceError> {
    Ok(Box::new(crate::ffmpeg::FfmpegSource::open(path)?))
}

#[cfg(not(feature = "ffmpeg"))]
fn open_container(path: &Path) -> Result<Box<dyn FrameSource>, SourceError> {
    Err(SourceError::Open(format!(
        "{}: video containers require the ffmpeg feature",
        path.display()
    )))
}

fn is_mjpeg_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("mjpeg") || e.eq_ignore_ascii_case("mjpg"))
        .unwrap_or(false)
}

/// Stamp a frame with its position in the stream
pub(crate) fn stamp(mut frame: VideoFrame, opened: Instant, sequence: u64) -> VideoFrame {
    frame.sequence = sequence;
    frame.timestamp_ns = opened.elapsed().as_nanos() as u64;
    frame
}

/// A single decoded image, yielded once per pass
pub struct StillImageSource {
    frame: VideoFrame,
    served: bool,
    opened: Instant,
    label: String,
}

impl StillImageSource {
    /// Decode an image file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let frame = VideoFrame::decode(&bytes)
            .map_err(|e| SourceError::Open(format!("{}: {}", path.display(), e)))?;
        Ok(Self::with_label(frame, path.display().to_string()))
    }

    /// Wrap an already decoded frame
    pub fn from_frame(frame: VideoFrame) -> Self {
        Self::with_label(frame, "in-memory image".to_string())
    }

    fn with_label(frame: VideoFrame, label: String) -> Self {
        Self {
            frame,
            served: false,
            opened: Instant::now(),
            label,
        }
    }
}

impl FrameSource for StillImageSource {
    fn read_frame(&mut self) -> Result<Option<VideoFrame>, SourceError> {
        if self.served {
            return Ok(None);
        }
        self.served = true;
        Ok(Some(stamp(self.frame.clone(), self.opened, 0)))
    }

    fn rewind(&mut self) -> Result<(), SourceError> {
        self.served = false;
        Ok(())
    }

    fn frame_count(&self) -> Option<u64> {
        Some(1)
    }

    fn describe(&self) -> String {
        format!(
            "still image {} ({}x{})",
            self.label,
            self.frame.width(),
            self.frame.height()
        )
    }
}

/// A directory of image files played back in file-name order
pub struct ImageSequenceSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    position: usize,
    opened: Instant,
}

impl ImageSequenceSource {
    /// Index every image file in `dir`
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, SourceError> {
        let dir = dir.as_ref().to_path_buf();
        let mut files = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_file() && ImageFormat::from_path(&path).is_ok() {
                files.push(path);
            }
        }
        files.sort();

        if files.is_empty() {
            return Err(SourceError::Open(format!(
                "{}: no image files found",
                dir.display()
            )));
        }

        debug!("Indexed {} frames in {}", files.len(), dir.display());
        Ok(Self {
            dir,
            files,
            position: 0,
            opened: Instant::now(),
        })
    }
}

impl FrameSource for ImageSequenceSource {
    fn read_frame(&mut self) -> Result<Option<VideoFrame>, SourceError> {
        let Some(path) = self.files.get(self.position) else {
            return Ok(None);
        };
        let sequence = self.position as u64;
        self.position += 1;

        let bytes = fs::read(path).map_err(|e| SourceError::Read(format!("{}: {}", path.display(), e)))?;
        let frame = VideoFrame::decode(&bytes)
            .map_err(|e| SourceError::Decode(format!("{}: {}", path.display(), e)))?;
        Ok(Some(stamp(frame, self.opened, sequence)))
    }

    fn rewind(&mut self) -> Result<(), SourceError> {
        self.position = 0;
        Ok(())
    }

    fn frame_count(&self) -> Option<u64> {
        Some(self.files.len() as u64)
    }

    fn describe(&self) -> String {
        format!("image sequence {} ({} frames)", self.dir.display(), self.files.len())
    }
}

/// A Motion-JPEG clip: JPEG images stored back to back
pub struct MjpegSource {
    data: Vec<u8>,
    frames: Vec<Range<usize>>,
    position: usize,
    opened: Instant,
    label: String,
}

impl MjpegSource {
    /// Read and index an MJPEG file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        Self::from_bytes(data, path.display().to_string())
    }

    /// Index an in-memory MJPEG clip
    pub fn from_bytes(data: Vec<u8>, label: impl Into<String>) -> Result<Self, SourceError> {
        let label = label.into();
        let frames = index_jpeg_frames(&data);
        if frames.is_empty() {
            return Err(SourceError::Open(format!("{}: no JPEG frames found", label)));
        }

        debug!("Indexed {} MJPEG frames in {}", frames.len(), label);
        Ok(Self {
            data,
            frames,
            position: 0,
            opened: Instant::now(),
            label,
        })
    }
}

impl FrameSource for MjpegSource {
    fn read_frame(&mut self) -> Result<Option<VideoFrame>, SourceError> {
        let Some(range) = self.frames.get(self.position).cloned() else {
            return Ok(None);
        };
        let sequence = self.position as u64;
        self.position += 1;

        let frame = VideoFrame::decode(&self.data[range])?;
        Ok(Some(stamp(frame, self.opened, sequence)))
    }

    fn rewind(&mut self) -> Result<(), SourceError> {
        self.position = 0;
        Ok(())
    }

    fn frame_count(&self) -> Option<u64> {
        Some(self.frames.len() as u64)
    }

    fn describe(&self) -> String {
        format!("mjpeg clip {} ({} frames)", self.label, self.frames.len())
    }
}

/// Locate the byte ranges of concatenated JPEG images.
///
/// Each image is walked segment by segment, so SOI/EOI pairs nested inside
/// APPn payloads (EXIF thumbnails) do not end the outer image.
fn index_jpeg_frames(data: &[u8]) -> Vec<Range<usize>> {
    let mut frames = Vec::new();
    let mut from = 0;

    while let Some(start) = find_soi(data, from) {
        match jpeg_end(data, start) {
            Some(end) => {
                frames.push(start..end);
                from = end;
            }
            None => {
                warn!("Ignoring truncated JPEG frame at byte offset {}", start);
                from = start + 2;
            }
        }
    }
    frames
}

fn find_soi(data: &[u8], from: usize) -> Option<usize> {
    data.get(from..)?
        .windows(2)
        .position(|w| w == [0xFF, 0xD8])
        .map(|p| p + from)
}

/// Exclusive end of the image whose SOI is at `start`, `None` if malformed or cut off
fn jpeg_end(data: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 2;
    loop {
        if *data.get(i)? != 0xFF {
            return None;
        }
        while *data.get(i + 1)? == 0xFF {
            i += 1;
        }
        let marker = *data.get(i + 1)?;
        i += 2;

        match marker {
            0xD9 => return Some(i),
            0x01 | 0xD0..=0xD7 => {}
            _ => {
                let len = u16::from_be_bytes([*data.get(i)?, *data.get(i + 1)?]) as usize;
                if len < 2 {
                    return None;
                }
                i += len;
                if marker == 0xDA {
                    i = skip_entropy_coded(data, i)?;
                }
            }
        }
    }
}

/// Offset of the first real marker after scan data
fn skip_entropy_coded(data: &[u8], mut i: usize) -> Option<usize> {
    loop {
        if *data.get(i)? != 0xFF {
            i += 1;
            continue;
        }
        match *data.get(i + 1)? {
            // Stuffed zero and restart markers belong to the scan
            0x00 | 0xD0..=0xD7 => i += 2,
            0xFF => i += 1,
            _ => return Some(i),
        }
    }
}

/// Already decoded frames held in memory
pub struct MemorySource {
    frames: Vec<VideoFrame>,
    position: usize,
}

impl MemorySource {
    pub fn new(frames: Vec<VideoFrame>) -> Self {
        Self {
            frames,
            position: 0,
        }
    }
}

impl FrameSource for MemorySource {
    fn read_frame(&mut self) -> Result<Option<VideoFrame>, SourceError> {
        let Some(frame) = self.frames.get(self.position) else {
            return Ok(None);
        };
        let mut frame = frame.clone();
        frame.sequence = self.position as u64;
        self.position += 1;
        Ok(Some(frame))
    }

    fn rewind(&mut self) -> Result<(), SourceError> {
        self.position = 0;
        Ok(())
    }

    fn frame_count(&self) -> Option<u64> {
        Some(self.frames.len() as u64)
    }

    fn describe(&self) -> String {
        format!("in-memory clip ({} frames)", self.frames.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid(width: u32, height: u32, value: u8) -> VideoFrame {
        VideoFrame::new(RgbImage::from_pixel(width, height, Rgb([value; 3])), 0, 0)
    }

    #[test]
    fn test_still_image_yields_once_per_pass() {
        let mut source = StillImageSource::from_frame(solid(8, 8, 10));

        assert!(source.read_frame().unwrap().is_some());
        assert!(source.read_frame().unwrap().is_none());

        source.rewind().unwrap();
        assert!(source.read_frame().unwrap().is_some());
    }

    #[test]
    fn test_memory_source_rewinds_to_first_frame() {
        let mut source = MemorySource::new(vec![solid(4, 4, 1), solid(4, 4, 2)]);

        assert_eq!(source.read_frame().unwrap().unwrap().sequence, 0);
        assert_eq!(source.read_frame().unwrap().unwrap().sequence, 1);
        assert!(source.read_frame().unwrap().is_none());

        source.rewind().unwrap();
        let frame = source.read_frame().unwrap().unwrap();
        assert_eq!(frame.sequence, 0);
        assert_eq!(frame.get_pixel(0, 0), Some([1, 1, 1]));
    }

    #[test]
    fn test_index_jpeg_frames() {
        let data = [
            0x00, // leading junk
            0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x04, 0xAA, 0xBB, 0xFF, 0xD9, // frame 1
            0xFF, 0xD8, 0xFF, 0xDA, 0x00, 0x02, 0x12, 0xFF, 0x00, 0xFF, 0xD3, 0x34, 0xFF, 0xD9, // frame 2
            0xFF, 0xD8, 0xFF, 0xE1, 0x00, // truncated
        ];
        let frames = index_jpeg_frames(&data);
        assert_eq!(frames, vec![1..11, 11..25]);
    }

    /// Insert an APP1 segment carrying a complete thumbnail JPEG after the SOI
    fn with_exif_thumbnail(jpeg: &[u8], thumbnail: &[u8]) -> Vec<u8> {
        let mut payload = b"Exif\0\0".to_vec();
        payload.extend_from_slice(thumbnail);
        let len = (payload.len() + 2) as u16;

        let mut out = jpeg[..2].to_vec();
        out.extend_from_slice(&[0xFF, 0xE1]);
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(&payload);
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    #[test]
    fn test_nested_thumbnail_does_not_split_frame() {
        let thumbnail = solid(8, 8, 0).encode_jpeg(50).unwrap();
        let first = with_exif_thumbnail(&solid(32, 16, 240).encode_jpeg(90).unwrap(), &thumbnail);
        let second = solid(32, 16, 10).encode_jpeg(90).unwrap();

        let mut clip = first.clone();
        clip.extend_from_slice(&second);
        assert_eq!(
            index_jpeg_frames(&clip),
            vec![0..first.len(), first.len()..first.len() + second.len()]
        );

        let mut source = MjpegSource::from_bytes(clip, "exif").unwrap();
        let frame = source.read_frame().unwrap().unwrap();
        assert_eq!((frame.width(), frame.height()), (32, 16));
        assert!(frame.get_pixel(0, 0).unwrap()[0] > 220);
        assert_eq!(source.read_frame().unwrap().unwrap().width(), 32);
        assert!(source.read_frame().unwrap().is_none());
    }

    #[test]
    fn test_mjpeg_source_decodes_each_frame() {
        let mut clip = Vec::new();
        clip.extend(solid(16, 8, 0).encode_jpeg(90).unwrap());
        clip.extend(solid(16, 8, 255).encode_jpeg(90).unwrap());

        let mut source = MjpegSource::from_bytes(clip, "test").unwrap();
        assert_eq!(source.frame_count(), Some(2));

        let first = source.read_frame().unwrap().unwrap();
        let second = source.read_frame().unwrap().unwrap();
        assert!(source.read_frame().unwrap().is_none());

        assert!(first.get_pixel(0, 0).unwrap()[0] < 20);
        assert!(second.get_pixel(0, 0).unwrap()[0] > 235);
        assert_eq!(second.sequence, 1);
    }

    #[test]
    fn test_mjpeg_without_frames_is_rejected() {
        let err = MjpegSource::from_bytes(vec![1, 2, 3], "empty").err().unwrap();
        assert!(matches!(err, SourceError::Open(_)));
    }

    #[test]
    fn test_open_source_by_path_kind() {
        let dir = tempfile::tempdir().unwrap();
        let frames_dir = dir.path().join("frames");
        fs::create_dir(&frames_dir).unwrap();
        for i in 0..3 {
            solid(8, 8, i * 50)
                .image
                .save(frames_dir.join(format!("frame_{:03}.png", i)))
                .unwrap();
        }
        fs::write(frames_dir.join("notes.txt"), "not a frame").unwrap();

        let sequence = open_source(&frames_dir).unwrap();
        assert_eq!(sequence.frame_count(), Some(3));

        let still_path = dir.path().join("lot.png");
        solid(8, 8, 0).image.save(&still_path).unwrap();
        let still = open_source(&still_path).unwrap();
        assert_eq!(still.frame_count(), Some(1));

        let clip_path = dir.path().join("clip.mjpeg");
        fs::write(&clip_path, solid(8, 8, 0).encode_jpeg(80).unwrap()).unwrap();
        let clip = open_source(&clip_path).unwrap();
        assert_eq!(clip.frame_count(), Some(1));

        assert!(open_source(dir.path().join("missing.png")).is_err());
    }

    #[cfg(feature = "ffmpeg")]
    #[test]
    fn test_unknown_extension_goes_to_ffmpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("carPark.mp4");
        fs::write(&path, b"not a video").unwrap();

        let err = open_source(&path).err().unwrap();
        assert!(matches!(err, SourceError::Open(ref msg) if !msg.contains("require")));
    }

    #[cfg(not(feature = "ffmpeg"))]
    #[test]
    fn test_container_needs_ffmpeg_feature() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("carPark.mp4");
        fs::write(&path, b"\x00\x00\x00\x18ftypmp42").unwrap();

        let err = open_source(&path).err().unwrap();
        assert!(matches!(err, SourceError::Open(ref msg) if msg.contains("ffmpeg")));
    }

    #[test]
    fn test_sequence_plays_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        solid(4, 4, 200).image.save(dir.path().join("b.png")).unwrap();
        solid(4, 4, 100).image.save(dir.path().join("a.png")).unwrap();

        let mut source = ImageSequenceSource::open(dir.path()).unwrap();
        assert_eq!(source.read_frame().unwrap().unwrap().get_pixel(0, 0), Some([100; 3]));
        assert_eq!(source.read_frame().unwrap().unwrap().get_pixel(0, 0), Some([200; 3]));
        assert!(source.read_frame().unwrap().is_none());
    }
}
