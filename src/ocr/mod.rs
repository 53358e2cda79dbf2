//! Text recognition: recognized line types, the [`TextRecognizer`] capability and
//! recognizer output normalization.

#[cfg(feature = "ocr")]
pub mod tesseract;
#[cfg(feature = "ocr")]
mod tsv;

use std::time::Duration;

use geo_types::{coord, Rect};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Inline markup emitted by recognizers trained on table-structure data (e.g. `<b>`).
pub const STYLE_TOKENS: [&str; 14] = [
    "<strike>",
    "</strike>",
    "<sup>",
    "</sub>",
    "<b>",
    "</b>",
    "<sub>",
    "</sup>",
    "<overline>",
    "</overline>",
    "<underline>",
    "</underline>",
    "<i>",
    "</i>",
];

/// Four-point polygon, clockwise from the top-left corner.
pub type Quad = [[f32; 2]; 4];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordBox {
    pub text: String,
    pub region: Quad,
}

/// One recognized line of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    pub confidence: f32,
    pub text_region: Quad,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<WordBox>>,
}

impl TextLine {
    pub fn new(text: &str, confidence: f32, text_region: Quad) -> Self {
        Self {
            text: text.to_string(),
            confidence,
            text_region,
            words: None,
        }
    }

    /// Axis-aligned rectangle spanned by the first (top-left) and third (bottom-right) points.
    pub fn rect(&self) -> Rect<f32> {
        let [tl, _, br, _] = self.text_region;
        Rect::new(coord! { x: tl[0], y: tl[1] }, coord! { x: br[0], y: br[1] })
    }
}

/// Builds an axis-aligned [`Quad`] from its corners.
pub fn quad(x1: f32, y1: f32, x2: f32, y2: f32) -> Quad {
    [[x1, y1], [x2, y1], [x2, y2], [x1, y2]]
}

/// Output of one recognizer call over a full image.
#[derive(Debug, Clone, Default)]
pub struct Recognition {
    pub lines: Vec<TextLine>,
    pub det: Duration,
    pub rec: Duration,
}

/// A text recognition backend.
pub trait TextRecognizer: Send {
    fn recognize(&mut self, img: &image::DynamicImage) -> Result<Recognition>;
}

impl<T: TextRecognizer + ?Sized> TextRecognizer for Box<T> {
    fn recognize(&mut self, img: &image::DynamicImage) -> Result<Recognition> {
        (**self).recognize(img)
    }
}

pub fn strip_style_tokens(text: &str) -> String {
    STYLE_TOKENS
        .iter()
        .fold(text.to_string(), |acc, token| acc.replace(token, ""))
}

/// Removes [`STYLE_TOKENS`] from every line and word of `lines`.
pub fn normalize_lines(lines: &mut [TextLine]) {
    for line in lines.iter_mut() {
        line.text = strip_style_tokens(&line.text);
        if let Some(words) = line.words.as_mut() {
            for word in words.iter_mut() {
                word.text = strip_style_tokens(&word.text);
            }
        }
    }
}
