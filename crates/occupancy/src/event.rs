//! Result events published to viewers

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use frame_source::frame::encode_jpeg;
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::classifier::Classification;
use crate::OccupancyError;

/// One cycle's output.
///
/// The field names are the wire contract consumed by existing viewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionEvent {
    /// Annotated frame, JPEG encoded, base64 (standard alphabet)
    pub image: String,
    pub free_spaces: usize,
    pub total_spaces: usize,
    pub occupied_spaces: usize,
}

impl DetectionEvent {
    /// Encode the annotated frame and package the counts
    pub fn new(annotated: &RgbImage, classification: &Classification, jpeg_quality: u8) -> Result<Self, OccupancyError> {
        let jpeg = encode_jpeg(annotated, jpeg_quality)?;
        Ok(Self {
            image: STANDARD.encode(jpeg),
            free_spaces: classification.free_count,
            total_spaces: classification.total_count,
            occupied_spaces: classification.occupied_count(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_event_fields_and_wire_names() {
        let image = RgbImage::from_pixel(40, 20, Rgb([10, 20, 30]));
        let classification = Classification {
            spaces: vec![],
            free_count: 3,
            total_count: 5,
        };
        let event = DetectionEvent::new(&image, &classification, 80).unwrap();

        assert_eq!(event.free_spaces, 3);
        assert_eq!(event.total_spaces, 5);
        assert_eq!(event.occupied_spaces, 2);
        assert_eq!(&STANDARD.decode(&event.image).unwrap()[..2], &[0xFF, 0xD8]);

        let json = serde_json::to_value(&event).unwrap();
        let mut keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(keys, ["free_spaces", "image", "occupied_spaces", "total_spaces"]);
    }
}
