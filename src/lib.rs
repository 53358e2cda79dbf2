//! # Overview
//!
//! Document layout analysis: a [`StructureSystem`] runs a layout detector and an optional
//! text recognizer over a page image, assembles labeled [`Region`]s, renders them onto the
//! page and round-trips the result through a stable on-disk format ([`ResultPersister`]).
//!
//! Detectors and recognizers are capabilities ([`models::RegionDetector`],
//! [`ocr::TextRecognizer`]). A Detectron2 ONNX detector runs through onnxruntime (bindings
//! via [ort](https://github.com/pykeio/ort)); a Tesseract recognizer is available with the
//! `ocr` feature.

mod config;
mod error;
pub mod models;
pub mod ocr;
mod persist;
mod pipeline;
pub mod reconcile;
mod region;
mod utils;
pub mod visualize;

pub use config::StructureConfig;
pub use error::{Error, Phase, Result};
pub use persist::ResultPersister;
pub use pipeline::{Analysis, AnalysisOutput, PipelineResult, StructureSystem, TimingStats};
pub use region::{regions_to_json, Region, RegionCandidate, RegionDescriptor};

// re-exports
pub use geo_types;
pub use image;
pub use ort;
