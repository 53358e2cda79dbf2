use std::time::Instant;

use tesseract::{Tesseract, TesseractError};

use super::{tsv, Recognition, TextRecognizer};
use crate::Result;

/// A [`TextRecognizer`] backed by a Tesseract engine.
pub struct TesseractAgent {
    arguments: TesseractInitArguments,
    inner: Option<Tesseract>,
    return_word_box: bool,
}

// SAFETY: the engine handle is owned exclusively by the agent and only used through
// `&mut self`, so moving it to another thread never shares it.
unsafe impl Send for TesseractAgent {}

pub enum TesseractInitArguments {
    DataPath { data_path: String, lang: String },
    Generic { data_path: Option<String>, lang: Option<String> },
}

impl TesseractInitArguments {
    fn init(&self) -> Result<Tesseract> {
        let tesseract = match self {
            // data_path is tessdata, which includes the traineddata files
            TesseractInitArguments::DataPath { data_path, lang } => Tesseract::new_with_oem(
                Some(data_path.as_str()),
                Some(lang.as_str()),
                tesseract::OcrEngineMode::Default,
            ),
            TesseractInitArguments::Generic { data_path, lang } => {
                Tesseract::new(data_path.as_deref(), lang.as_deref())
            }
        };
        Ok(tesseract.map_err(TesseractError::from)?)
    }
}

impl TesseractAgent {
    pub fn new() -> Result<Self> {
        Self::with_arguments(TesseractInitArguments::Generic {
            data_path: None,
            lang: Some("eng".to_string()),
        })
    }

    pub fn new_with_lang(lang: &[&str]) -> Result<Self> {
        Self::with_arguments(TesseractInitArguments::Generic {
            data_path: None,
            lang: Some(lang.join("+")),
        })
    }

    pub fn new_data_path(data_path: &str, lang: &[&str]) -> Result<Self> {
        Self::with_arguments(TesseractInitArguments::DataPath {
            data_path: data_path.to_string(),
            lang: lang.join("+"),
        })
    }

    fn with_arguments(arguments: TesseractInitArguments) -> Result<Self> {
        let inner = arguments.init()?;
        Ok(Self {
            arguments,
            inner: Some(inner),
            return_word_box: false,
        })
    }

    /// Also report word-level boxes for every recognized line.
    pub fn with_word_boxes(mut self, return_word_box: bool) -> Self {
        self.return_word_box = return_word_box;
        self
    }

    fn take_engine(&mut self) -> Result<Tesseract> {
        match self.inner.take() {
            Some(inner) => Ok(inner),
            None => self.arguments.init(),
        }
    }
}

impl TextRecognizer for TesseractAgent {
    fn recognize(&mut self, img: &image::DynamicImage) -> Result<Recognition> {
        let img = img.to_rgba8();
        let (width, height) = img.dimensions();
        let bytes_per_line = 4 * width;
        let frame_data = img.into_raw();

        let start = Instant::now();
        // a failed call consumes the engine; the next call re-initializes it
        let inner = self
            .take_engine()?
            .set_frame(
                &frame_data,
                width as i32,
                height as i32,
                4,
                bytes_per_line as i32,
            )
            .map_err(TesseractError::from)?;
        let det = start.elapsed();

        let start = Instant::now();
        let mut inner = inner.recognize().map_err(TesseractError::from)?;
        let tsv = inner.get_tsv_text(0).map_err(TesseractError::from)?;
        self.inner = Some(inner);

        let lines = tsv::parse_tsv(&tsv, self.return_word_box)?;
        let rec = start.elapsed();

        tracing::debug!(lines = lines.len(), "tesseract recognition finished");

        Ok(Recognition { lines, det, rec })
    }
}
