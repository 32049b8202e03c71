//! The single occupancy pipeline shared by streaming and single-frame callers

use frame_source::VideoFrame;
use image::RgbImage;
use tracing::debug;

use crate::annotate::FrameAnnotator;
use crate::classifier::{Classification, SpaceClassifier};
use crate::event::DetectionEvent;
use crate::preprocess::preprocess;
use crate::region::Region;
use crate::{OccupancyConfig, OccupancyError};

/// Classification plus the annotated frame
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub classification: Classification,
    pub annotated: RgbImage,
}

/// Preprocess, classify and annotate
#[derive(Debug, Clone)]
pub struct OccupancyPipeline {
    config: OccupancyConfig,
    classifier: SpaceClassifier,
    annotator: FrameAnnotator,
}

impl OccupancyPipeline {
    pub fn new(config: OccupancyConfig) -> Self {
        Self {
            classifier: SpaceClassifier::new(&config),
            annotator: FrameAnnotator::new(&config),
            config,
        }
    }

    /// Run all three stages on one frame
    pub fn run(&self, frame: &VideoFrame, regions: &[Region]) -> PipelineOutput {
        let map = preprocess(frame);
        let classification = self.classifier.classify(&map, regions);
        debug!(
            "Frame {}: {}/{} spaces free",
            frame.sequence, classification.free_count, classification.total_count
        );
        let annotated = self.annotator.annotate(frame, &classification);

        PipelineOutput {
            classification,
            annotated,
        }
    }

    /// Run the pipeline and package the result for viewers
    pub fn process(&self, frame: &VideoFrame, regions: &[Region]) -> Result<DetectionEvent, OccupancyError> {
        let output = self.run(frame, regions);
        DetectionEvent::new(&output.annotated, &output.classification, self.config.jpeg_quality)
    }

    /// Decode an encoded image and process it
    pub fn process_bytes(&self, bytes: &[u8], regions: &[Region]) -> Result<DetectionEvent, OccupancyError> {
        let frame = VideoFrame::decode(bytes)?;
        self.process(&frame, regions)
    }
}

impl Default for OccupancyPipeline {
    fn default() -> Self {
        Self::new(OccupancyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn lot_frame() -> VideoFrame {
        // Bright, flat lot with a textured "car" in the second space
        let mut image = RgbImage::from_pixel(400, 200, Rgb([210, 210, 210]));
        for y in 100..148 {
            for x in 200..307 {
                if (x / 4 + y / 4) % 2 == 0 {
                    image.put_pixel(x, y, Rgb([15, 15, 15]));
                }
            }
        }
        VideoFrame::new(image, 0, 7)
    }

    #[test]
    fn test_flat_space_free_textured_space_occupied() {
        let pipeline = OccupancyPipeline::default();
        let regions = [Region::new(20, 100), Region::new(200, 100)];
        let output = pipeline.run(&lot_frame(), &regions);

        let spaces = &output.classification.spaces;
        assert_eq!(spaces[0].signal, 0);
        assert!(spaces[0].free);
        assert!(spaces[1].signal >= 900, "signal {}", spaces[1].signal);
        assert!(!spaces[1].free);
        assert_eq!(output.classification.free_count, 1);
        assert_eq!(output.annotated.dimensions(), (400, 200));
    }

    #[test]
    fn test_process_packages_counts() {
        let pipeline = OccupancyPipeline::default();
        let event = pipeline
            .process(&lot_frame(), &[Region::new(20, 100), Region::new(200, 100)])
            .unwrap();

        assert_eq!(event.free_spaces, 1);
        assert_eq!(event.total_spaces, 2);
        assert_eq!(event.occupied_spaces, 1);
        assert!(!event.image.is_empty());
    }

    #[test]
    fn test_empty_region_list() {
        let event = OccupancyPipeline::default().process(&lot_frame(), &[]).unwrap();
        assert_eq!((event.free_spaces, event.total_spaces, event.occupied_spaces), (0, 0, 0));
    }

    #[test]
    fn test_process_bytes_matches_process() {
        let pipeline = OccupancyPipeline::default();
        let frame = lot_frame();
        let png = {
            let mut buf = std::io::Cursor::new(Vec::new());
            frame.image.write_to(&mut buf, image::ImageFormat::Png).unwrap();
            buf.into_inner()
        };
        let regions = [Region::new(20, 100), Region::new(200, 100)];

        let from_bytes = pipeline.process_bytes(&png, &regions).unwrap();
        let direct = pipeline.process(&frame, &regions).unwrap();
        assert_eq!(from_bytes, direct);
    }

    #[test]
    fn test_regions_at_integer_limits_are_survivable() {
        let pipeline = OccupancyPipeline::default();
        let frame = lot_frame();
        let regions = [
            Region::new(0, i32::MAX),
            Region::new(i32::MAX - 50, 10),
            Region::new(i32::MIN, i32::MIN),
            Region::new(i32::MAX, i32::MAX),
        ];

        let output = pipeline.run(&frame, &regions);
        assert_eq!(output.classification.total_count, 4);
        assert!(output.classification.spaces.iter().all(|s| s.signal == 0 && s.free));
        assert_eq!(output.annotated.dimensions(), (400, 200));

        let event = pipeline.process(&frame, &regions).unwrap();
        assert_eq!(event.free_spaces, 4);
    }

    #[test]
    fn test_undecodable_input_is_a_decode_failure() {
        let err = OccupancyPipeline::default()
            .process_bytes(b"\x00\x01garbage", &[Region::new(0, 0)])
            .unwrap_err();
        assert!(matches!(err, OccupancyError::Decode(_)));
    }
}
