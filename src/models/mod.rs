//! Layout detection backends.

mod detectron2;

pub use detectron2::{load_label_dict, Detectron2Model, Detectron2PretrainedModel};

use crate::{RegionCandidate, Result};

/// A layout detector producing candidate regions for a full page image.
///
/// Implementations emit candidates in the order the pipeline should report them, and must be
/// movable to another thread so a pipeline can be handed to a worker.
pub trait RegionDetector: Send {
    fn detect(&self, img: &image::DynamicImage) -> Result<Vec<RegionCandidate>>;
}

impl<T: RegionDetector + ?Sized> RegionDetector for Box<T> {
    fn detect(&self, img: &image::DynamicImage) -> Result<Vec<RegionCandidate>> {
        (**self).detect(img)
    }
}
