use crate::config::OperationPolicy;
use crate::error::InspectError;
use image::io::Reader as ImageReader;
use std::io::Cursor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Decodes image dimensions and applies the minimum-dimension gate
#[derive(Debug, Clone, Copy)]
pub struct ImageInspector {
    min_dimension: u32,
}

impl ImageInspector {
    pub fn new(min_dimension: u32) -> Self {
        Self { min_dimension }
    }

    /// Reads width and height from the image header without decoding pixels
    pub fn dimensions(bytes: &[u8]) -> Result<Dimensions, InspectError> {
        let (width, height) = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| InspectError::Corrupted(e.to_string()))?
            .into_dimensions()
            .map_err(|e| InspectError::Corrupted(e.to_string()))?;

        Ok(Dimensions { width, height })
    }

    pub fn inspect(&self, bytes: &[u8], policy: OperationPolicy) -> Result<Dimensions, InspectError> {
        let dims = match Self::dimensions(bytes) {
            Ok(dims) => dims,
            Err(e) if policy.require_decodable => return Err(e),
            Err(e) => {
                tracing::debug!("Image dimensions unavailable, recording 0x0: {}", e);
                return Ok(Dimensions::default());
            }
        };

        if policy.enforce_min_dimension
            && (dims.width < self.min_dimension || dims.height < self.min_dimension)
        {
            return Err(InspectError::TooSmall {
                width: dims.width,
                height: dims.height,
                min: self.min_dimension,
            });
        }

        Ok(dims)
    }
}
