//! Association of recognized text lines with layout regions.

use geo_types::Rect;
use itertools::Itertools;

use crate::ocr::TextLine;
use crate::region::Region;

/// Whether two axis-aligned rectangles overlap.
///
/// Rectangles that only share an edge do not intersect.
pub fn has_intersection(rect1: &Rect<f32>, rect2: &Rect<f32>) -> bool {
    let (min1, max1) = (rect1.min(), rect1.max());
    let (min2, max2) = (rect2.min(), rect2.max());

    if min1.x >= max2.x || max1.x <= min2.x {
        return false;
    }
    if min1.y >= max2.y || max1.y <= min2.y {
        return false;
    }
    true
}

/// The lines of `text_lines` whose boxes intersect `bbox`, in their original order.
pub fn filter_text<'a>(text_lines: &'a [TextLine], bbox: &Rect<f32>) -> Vec<&'a TextLine> {
    text_lines
        .iter()
        .filter(|line| has_intersection(bbox, &line.rect()))
        .collect()
}

/// Attaches intersecting lines to every region, filling `text` and the transient `ocr` list.
pub fn attach_text(regions: &mut [Region], text_lines: &[TextLine]) {
    for region in regions.iter_mut() {
        let matched = filter_text(text_lines, &region.rect());
        region.text = matched.iter().map(|line| line.text.as_str()).join("\n");
        region.ocr = matched.into_iter().cloned().collect();
    }
}
