//! On-disk representation of pipeline results.
//!
//! Layout under the persister root:
//!
//! ```text
//! <root>/<image_name>/res_<img_idx>.txt   one JSON region per line
//! <root>/<image_name>/show_<img_idx>.jpg  annotated image
//! ```

use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, RgbImage};

use crate::{Error, Region, Result};

#[derive(Debug, Clone)]
pub struct ResultPersister {
    root: PathBuf,
}

impl ResultPersister {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn folder(&self, image_name: &str) -> PathBuf {
        self.root.join(image_name)
    }

    pub fn result_path(&self, image_name: &str, img_idx: usize) -> PathBuf {
        self.folder(image_name).join(format!("res_{img_idx}.txt"))
    }

    pub fn image_path(&self, image_name: &str, img_idx: usize) -> PathBuf {
        self.folder(image_name).join(format!("show_{img_idx}.jpg"))
    }

    /// Writes `regions` as JSON lines to `res_<img_idx>.txt`.
    pub fn save(&self, regions: &[Region], image_name: &str, img_idx: usize) -> Result<PathBuf> {
        fs::create_dir_all(self.folder(image_name))?;

        let path = self.result_path(image_name, img_idx);
        let mut writer = BufWriter::new(fs::File::create(&path)?);
        for region in regions {
            serde_json::to_writer(&mut writer, region)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;

        Ok(path)
    }

    /// Writes the annotated image to `show_<img_idx>.jpg`.
    pub fn save_image(&self, img: &RgbImage, image_name: &str, img_idx: usize) -> Result<PathBuf> {
        fs::create_dir_all(self.folder(image_name))?;

        let path = self.image_path(image_name, img_idx);
        img.save_with_format(&path, ImageFormat::Jpeg)?;
        tracing::info!("result save to {}", path.display());

        Ok(path)
    }

    /// Reads back the regions and, if present, the annotated image.
    pub fn load(
        &self,
        image_name: &str,
        img_idx: usize,
    ) -> Result<(Vec<Region>, Option<DynamicImage>)> {
        let path = self.result_path(image_name, img_idx);
        if !path.exists() {
            return Err(Error::NotFound(path));
        }

        let reader = BufReader::new(fs::File::open(&path)?);
        let mut regions = vec![];
        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            regions.push(serde_json::from_str(line)?);
        }

        let image_path = self.image_path(image_name, img_idx);
        let img = if image_path.exists() {
            Some(image::open(&image_path)?)
        } else {
            None
        };

        Ok((regions, img))
    }
}
