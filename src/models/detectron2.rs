use std::path::Path;

use image::imageops;
use ndarray::{Array, ArrayBase, Dim, OwnedRepr};
use ort::{Session, SessionBuilder, SessionOutputs};

use super::RegionDetector;
use crate::error::{Error, Result};
use crate::{utils::vec_to_bbox, RegionCandidate};

/// A Detectron2 layout model exported to ONNX.
pub struct Detectron2Model {
    model_name: String,
    model: ort::Session,
    confidence_threshold: f32,
    label_map: Vec<(i64, String)>,
    confidence_score_index: usize,
}

#[allow(non_camel_case_types)]
pub enum Detectron2PretrainedModel {
    FASTER_RCNN_R_50_FPN_3X,
    MASK_RCNN_X_101_32X8D_FPN_3x,
}

impl Detectron2PretrainedModel {
    pub fn hf_repo(&self) -> &str {
        match self {
            Self::FASTER_RCNN_R_50_FPN_3X => "unstructuredio/detectron2_faster_rcnn_R_50_FPN_3x",
            Self::MASK_RCNN_X_101_32X8D_FPN_3x => {
                "unstructuredio/detectron2_mask_rcnn_X_101_32x8d_FPN_3x"
            }
        }
    }

    pub fn hf_filename(&self) -> &str {
        "model.onnx"
    }

    /// PubLayNet labels.
    pub fn label_map(&self) -> Vec<(i64, String)> {
        ["Text", "Title", "List", "Table", "Figure"]
            .iter()
            .enumerate()
            .map(|(i, l)| (i as i64, l.to_string()))
            .collect()
    }

    pub fn confidence_score_index(&self) -> usize {
        match self {
            Self::FASTER_RCNN_R_50_FPN_3X => 2,
            Self::MASK_RCNN_X_101_32X8D_FPN_3x => 3,
        }
    }
}

/// Reads a label dictionary: one label per line, the line number is the class id.
pub fn load_label_dict(path: impl AsRef<Path>) -> Result<Vec<(i64, String)>> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_label_dict(&content))
}

fn parse_label_dict(content: &str) -> Vec<(i64, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .enumerate()
        .map(|(i, l)| (i as i64, l.to_string()))
        .collect()
}

/// Session builder with the execution provider selected by `use_gpu`.
pub(crate) fn session_builder(use_gpu: bool) -> Result<SessionBuilder> {
    let builder = Session::builder()?;
    if !use_gpu {
        return Ok(builder);
    }

    #[cfg(feature = "cuda")]
    {
        Ok(builder.with_execution_providers([ort::CUDAExecutionProvider::default().build()])?)
    }
    #[cfg(not(feature = "cuda"))]
    {
        tracing::warn!("use_gpu requested but built without the `cuda` feature, running on CPU");
        Ok(builder)
    }
}

impl Detectron2Model {
    pub const REQUIRED_WIDTH: u32 = 800;
    pub const REQUIRED_HEIGHT: u32 = 1035;
    pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.8;

    /// Downloads a pretrained model from Hugging Face.
    pub fn pretrained(p_model: Detectron2PretrainedModel, use_gpu: bool) -> Result<Self> {
        let api = hf_hub::api::sync::Api::new()?;
        let filename = api
            .model(p_model.hf_repo().to_string())
            .get(p_model.hf_filename())?;

        let model = session_builder(use_gpu)?.commit_from_file(filename)?;

        Ok(Self {
            model_name: p_model.hf_repo().to_string(),
            model,
            label_map: p_model.label_map(),
            confidence_threshold: Self::DEFAULT_CONFIDENCE_THRESHOLD,
            confidence_score_index: p_model.confidence_score_index(),
        })
    }

    /// Loads `model.onnx` from `model_dir` with labels from `dict_path`.
    pub fn from_model_dir(
        model_dir: impl AsRef<Path>,
        dict_path: impl AsRef<Path>,
        confidence_threshold: f32,
        use_gpu: bool,
    ) -> Result<Self> {
        let model_dir = model_dir.as_ref();
        let label_map = load_label_dict(dict_path)?;
        if label_map.is_empty() {
            return Err(Error::Config("layout label dictionary is empty".to_string()));
        }

        let model = session_builder(use_gpu)?.commit_from_file(model_dir.join("model.onnx"))?;

        Ok(Self {
            model_name: model_dir.display().to_string(),
            model,
            label_map,
            confidence_threshold,
            confidence_score_index: 2,
        })
    }

    pub fn new_from_file(
        file_path: &str,
        model_name: &str,
        label_map: &[(i64, &str)],
        confidence_threshold: f32,
        confidence_score_index: usize,
        session_builder: SessionBuilder,
    ) -> Result<Self> {
        let model = session_builder.commit_from_file(file_path)?;

        Ok(Self {
            model_name: model_name.to_string(),
            model,
            label_map: label_map.iter().map(|(i, l)| (*i, l.to_string())).collect(),
            confidence_threshold,
            confidence_score_index,
        })
    }

    pub fn name(&self) -> &str {
        &self.model_name
    }

    pub fn predict(&self, img: &image::DynamicImage) -> Result<Vec<RegionCandidate>> {
        let (img_width, img_height, input) = self.preprocess(img);

        let outputs = self.model.run(ort::inputs!["x.1" => input]?)?;
        self.postprocess(&outputs, img_width, img_height)
    }

    fn preprocess(
        &self,
        img: &image::DynamicImage,
    ) -> (u32, u32, ArrayBase<OwnedRepr<f32>, Dim<[usize; 3]>>) {
        let (img_width, img_height) = (img.width(), img.height());
        let img = img.resize_exact(
            Self::REQUIRED_WIDTH,
            Self::REQUIRED_HEIGHT,
            imageops::FilterType::Triangle,
        );
        let img_rgb8 = img.into_rgb8();

        let mut input = Array::zeros((
            3,
            Self::REQUIRED_HEIGHT as usize,
            Self::REQUIRED_WIDTH as usize,
        ));

        for (x, y, pixel) in img_rgb8.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            let [r, g, b] = pixel.0;
            input[[0, y, x]] = r as f32;
            input[[1, y, x]] = g as f32;
            input[[2, y, x]] = b as f32;
        }

        (img_width, img_height, input)
    }

    fn postprocess(
        &self,
        outputs: &SessionOutputs<'_, '_>,
        img_width: u32,
        img_height: u32,
    ) -> Result<Vec<RegionCandidate>> {
        let bboxes = &outputs[0].try_extract_tensor::<f32>()?;
        let labels = &outputs[1].try_extract_tensor::<i64>()?;
        let confidence_scores =
            &outputs[self.confidence_score_index].try_extract_tensor::<f32>()?;

        let width_conversion = img_width as f32 / Self::REQUIRED_WIDTH as f32;
        let height_conversion = img_height as f32 / Self::REQUIRED_HEIGHT as f32;

        let mut candidates = vec![];

        for (bbox, (label, confidence_score)) in bboxes
            .rows()
            .into_iter()
            .zip(labels.iter().zip(confidence_scores))
        {
            if !above_threshold(*confidence_score, self.confidence_threshold) {
                continue;
            }

            let [x1, y1, x2, y2] = vec_to_bbox(bbox.iter().copied().collect());

            let detected_label = self
                .label_map
                .iter()
                .find(|(l_i, _)| l_i == label)
                .map(|(_, l)| l.as_str())
                .ok_or_else(|| Error::Model(format!("{}: unknown class id {label}", self.model_name)))?;

            candidates.push(RegionCandidate::new(
                x1 * width_conversion,
                y1 * height_conversion,
                x2 * width_conversion,
                y2 * height_conversion,
                detected_label,
                *confidence_score,
            ));
        }

        candidates.sort_by(|a, b| {
            let a_y = a.bbox.map(|r| r.max().y).unwrap_or_default();
            let b_y = b.bbox.map(|r| r.max().y).unwrap_or_default();
            a_y.total_cmp(&b_y)
        });

        tracing::debug!(
            model = %self.model_name,
            regions = candidates.len(),
            "layout prediction finished"
        );

        Ok(candidates)
    }
}

impl RegionDetector for Detectron2Model {
    fn detect(&self, img: &image::DynamicImage) -> Result<Vec<RegionCandidate>> {
        self.predict(img)
    }
}

/// Strictly above `threshold`; NaN scores never pass.
fn above_threshold(score: f32, threshold: f32) -> bool {
    score > threshold
}
