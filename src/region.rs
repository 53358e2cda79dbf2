use geo_types::{coord, Rect};
use serde::{Deserialize, Serialize};

use crate::ocr::TextLine;

/// A candidate region as emitted by a [`RegionDetector`](crate::models::RegionDetector).
///
/// `bbox == None` stands for the whole image.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionCandidate {
    pub bbox: Option<Rect<f32>>,
    pub label: String,
    pub score: f32,
}

impl RegionCandidate {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, label: &str, score: f32) -> Self {
        Self {
            bbox: Some(Rect::new(coord! { x: x1, y: y1 }, coord! { x: x2, y: y2 })),
            label: label.to_string(),
            score,
        }
    }

    pub fn whole_image(label: &str, score: f32) -> Self {
        Self {
            bbox: None,
            label: label.to_string(),
            score,
        }
    }

    /// Integer box for an image of `width` x `height`; coordinates are truncated.
    pub fn resolve_bbox(&self, width: u32, height: u32) -> [i32; 4] {
        match self.bbox {
            Some(rect) => [
                rect.min().x as i32,
                rect.min().y as i32,
                rect.max().x as i32,
                rect.max().y as i32,
            ],
            None => [0, 0, width as i32, height as i32],
        }
    }
}

/// A labeled region of a document image.
///
/// Only `type`, `bbox`, `score` and `img_idx` are serialized; the text, the cropped pixels
/// and the raw recognizer output live for the duration of one pipeline call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    #[serde(rename = "type")]
    pub region_type: String,
    pub bbox: [i32; 4],
    pub score: f32,
    pub img_idx: usize,
    #[serde(skip)]
    pub text: String,
    #[serde(skip)]
    pub img: Option<image::DynamicImage>,
    #[serde(skip)]
    pub ocr: Vec<TextLine>,
}

impl Region {
    pub fn new(region_type: &str, bbox: [i32; 4], score: f32, img_idx: usize) -> Self {
        Self {
            region_type: region_type.to_lowercase(),
            bbox,
            score,
            img_idx,
            text: String::new(),
            img: None,
            ocr: vec![],
        }
    }

    pub fn rect(&self) -> Rect<f32> {
        let [x1, y1, x2, y2] = self.bbox;
        Rect::new(
            coord! { x: x1 as f32, y: y1 as f32 },
            coord! { x: x2 as f32, y: y2 as f32 },
        )
    }

    pub fn width(&self) -> u32 {
        self.bbox[2].saturating_sub(self.bbox[0]).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        self.bbox[3].saturating_sub(self.bbox[1]).max(0) as u32
    }

    /// The exact sub-rectangle of `img` delimited by `bbox`, clamped to the image bounds.
    pub fn crop_from_image(&self, img: &image::DynamicImage) -> image::DynamicImage {
        let x1 = self.bbox[0].max(0) as u32;
        let y1 = self.bbox[1].max(0) as u32;
        let x2 = (self.bbox[2].max(0) as u32).min(img.width());
        let y2 = (self.bbox[3].max(0) as u32).min(img.height());

        img.crop_imm(x1, y1, x2.saturating_sub(x1), y2.saturating_sub(y1))
    }

    pub fn descriptor(&self) -> RegionDescriptor<'_> {
        RegionDescriptor {
            region_type: &self.region_type,
            bbox: self.bbox,
            score: self.score,
        }
    }
}

/// The caller-facing JSON shape of a region: `{"type", "bbox", "score"}`.
#[derive(Debug, Clone, Serialize)]
pub struct RegionDescriptor<'a> {
    #[serde(rename = "type")]
    pub region_type: &'a str,
    pub bbox: [i32; 4],
    pub score: f32,
}

/// Serializes regions to the output JSON array, in detection order.
pub fn regions_to_json(regions: &[Region]) -> crate::Result<String> {
    let descriptors: Vec<_> = regions.iter().map(Region::descriptor).collect();
    Ok(serde_json::to_string(&descriptors)?)
}
