//! Rendering of detected regions.
//!
//! The canonical visualization is a composite canvas twice the page width: the page with
//! region boxes and labels on the left, the region contents laid out on a white page on the
//! right. [`Visualizer::render`] keeps only the annotated left half.

use std::path::Path;

use ab_glyph::FontVec;
use image::{imageops, DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::{Error, Region, Result};

const PALETTE: [Rgb<u8>; 6] = [
    Rgb([255, 56, 56]),
    Rgb([56, 120, 255]),
    Rgb([30, 170, 60]),
    Rgb([255, 157, 20]),
    Rgb([160, 60, 220]),
    Rgb([0, 180, 190]),
];

const TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

const LABEL_TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

const BACKGROUND_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

const SYSTEM_FONT_PATHS: [&str; 4] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

#[derive(Debug)]
pub struct Visualizer {
    /// Labels are only drawn when a font is available.
    pub font: Option<FontVec>,
    pub font_scale: f32,
    pub bbox_thickness: i32,
}

impl Default for Visualizer {
    fn default() -> Self {
        Self {
            font: None,
            font_scale: 16.0,
            bbox_thickness: 2,
        }
    }
}

impl Visualizer {
    pub fn with_font_path(font_path: impl AsRef<Path>) -> Result<Self> {
        let font_path = font_path.as_ref();
        let font_data = std::fs::read(font_path).map_err(|err| Error::Font {
            path: font_path.to_path_buf(),
            reason: err.to_string(),
        })?;
        let font = FontVec::try_from_vec(font_data).map_err(|err| Error::Font {
            path: font_path.to_path_buf(),
            reason: err.to_string(),
        })?;

        tracing::debug!("loaded visualization font {}", font_path.display());

        Ok(Self {
            font: Some(font),
            ..Default::default()
        })
    }

    /// Loads the first readable font from the usual system locations.
    ///
    /// Falls back to a font-less visualizer, which draws boxes but no labels.
    pub fn with_system_font() -> Self {
        for path in SYSTEM_FONT_PATHS {
            let Ok(font_data) = std::fs::read(path) else {
                continue;
            };
            if let Ok(font) = FontVec::try_from_vec(font_data) {
                tracing::debug!("loaded system font {path}");
                return Self {
                    font: Some(font),
                    ..Default::default()
                };
            }
        }

        tracing::warn!("no system font found, region labels will not be drawn; set vis_font_path");
        Self::default()
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// The side-by-side canvas, `2 * width` wide.
    pub fn draw_composite(&self, img: &DynamicImage, regions: &[Region]) -> RgbImage {
        let original = img.to_rgb8();
        let (width, height) = original.dimensions();

        let mut canvas = RgbImage::from_pixel(width * 2, height, BACKGROUND_COLOR);
        imageops::overlay(&mut canvas, &original, 0, 0);

        for region in regions {
            let color = label_color(&region.region_type);
            self.draw_box(&mut canvas, region, color, 0);
            self.draw_label(&mut canvas, region, color);

            self.draw_box(&mut canvas, region, color, width as i32);
            self.draw_content(&mut canvas, region, width as i32);
        }

        canvas
    }

    /// Annotated copy of `img` at its original size, or `None` when there is nothing to draw.
    pub fn render(&self, img: &DynamicImage, regions: &[Region]) -> Option<RgbImage> {
        if regions.is_empty() {
            return None;
        }

        let composite = self.draw_composite(img, regions);
        let (width, height) = composite.dimensions();
        let midpoint = width / 2;

        Some(imageops::crop_imm(&composite, 0, 0, midpoint, height).to_image())
    }

    fn draw_box(&self, canvas: &mut RgbImage, region: &Region, color: Rgb<u8>, x_offset: i32) {
        // clipped to the page so neither copy leaks into the other half
        let page_width = (canvas.width() / 2) as i32;
        let page_height = canvas.height() as i32;
        let [x1, y1, x2, y2] = region.bbox;
        let (x1, x2) = (x1.clamp(0, page_width), x2.clamp(0, page_width));
        let (y1, y2) = (y1.clamp(0, page_height), y2.clamp(0, page_height));
        if x2 <= x1 || y2 <= y1 {
            return;
        }
        let (w, h) = ((x2 - x1) as u32, (y2 - y1) as u32);

        for t in 0..self.bbox_thickness.max(1) {
            let rect = Rect::at(x1 + x_offset + t, y1 + t).of_size(
                w.saturating_sub(2 * t as u32).max(1),
                h.saturating_sub(2 * t as u32).max(1),
            );
            draw_hollow_rect_mut(canvas, rect, color);
        }
    }

    fn draw_label(&self, canvas: &mut RgbImage, region: &Region, color: Rgb<u8>) {
        let Some(font) = &self.font else { return };

        let label = format!("{} {:.2}", region.region_type, region.score);
        let (tw, th) = text_size(self.font_scale, font, &label);
        if tw == 0 || th == 0 {
            return;
        }

        let page_width = (canvas.width() / 2) as i32;
        let x = region.bbox[0].clamp(0, (page_width - tw as i32 - 4).max(0));
        let y = region.bbox[1].saturating_sub(th as i32 + 2).max(0);
        draw_filled_rect_mut(canvas, Rect::at(x, y).of_size(tw + 4, th + 2), color);
        draw_text_mut(canvas, LABEL_TEXT_COLOR, x + 2, y, self.font_scale, font, &label);
    }

    fn draw_content(&self, canvas: &mut RgbImage, region: &Region, x_offset: i32) {
        let Some(font) = &self.font else { return };

        let content = if region.text.is_empty() {
            region.region_type.as_str()
        } else {
            region.text.as_str()
        };

        let page_width = (canvas.width() / 2) as i32;
        let line_height = self.font_scale.ceil() as i32 + 2;
        let [x1, y1, _, y2] = region.bbox;
        let x = x1.clamp(0, page_width) + x_offset + 2;
        let top = y1.max(0);
        for (i, line) in content.lines().enumerate() {
            let y = top.saturating_add(2 + i as i32 * line_height);
            if y.saturating_add(line_height) > y2 {
                break;
            }
            draw_text_mut(canvas, TEXT_COLOR, x, y, self.font_scale, font, line);
        }
    }
}

fn label_color(label: &str) -> Rgb<u8> {
    let hash = label.bytes().fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
    PALETTE[hash % PALETTE.len()]
}
