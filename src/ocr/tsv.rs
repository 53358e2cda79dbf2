use itertools::Itertools;
use serde::Deserialize;

use super::{quad, TextLine, WordBox};
use crate::Result;

const LEVEL_LINE: u32 = 4;
const LEVEL_WORD: u32 = 5;

#[derive(Debug, Deserialize)]
struct TsvRow {
    level: u32,
    #[allow(dead_code)]
    page_num: u32,
    block_num: u32,
    par_num: u32,
    line_num: u32,
    #[allow(dead_code)]
    word_num: u32,
    left: f32,
    top: f32,
    width: f32,
    height: f32,
    conf: f32,
    #[serde(default)]
    text: String,
}

impl TsvRow {
    fn line_key(&self) -> (u32, u32, u32) {
        (self.block_num, self.par_num, self.line_num)
    }

    fn quad(&self) -> super::Quad {
        quad(self.left, self.top, self.left + self.width, self.top + self.height)
    }
}

/// Parses Tesseract TSV output (no header row) into text lines.
pub(crate) fn parse_tsv(tsv: &str, return_word_box: bool) -> Result<Vec<TextLine>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .quoting(false)
        .flexible(true)
        .from_reader(tsv.as_bytes());

    let rows: Vec<TsvRow> = reader.deserialize().collect::<Result<_, csv::Error>>()?;

    let mut lines = vec![];
    for (_, group) in &rows
        .iter()
        .filter(|r| r.level == LEVEL_LINE || r.level == LEVEL_WORD)
        .group_by(|r| r.line_key())
    {
        let group: Vec<&TsvRow> = group.collect();
        let Some(line_row) = group.iter().find(|r| r.level == LEVEL_LINE) else {
            continue;
        };
        let words: Vec<&&TsvRow> = group
            .iter()
            .filter(|r| r.level == LEVEL_WORD && !r.text.trim().is_empty())
            .collect();
        if words.is_empty() {
            continue;
        }

        let text = words.iter().map(|w| w.text.trim()).join(" ");
        let confidence =
            words.iter().map(|w| w.conf.max(0.0)).sum::<f32>() / words.len() as f32 / 100.0;

        let mut line = TextLine::new(&text, confidence, line_row.quad());
        if return_word_box {
            line.words = Some(
                words
                    .iter()
                    .map(|w| WordBox {
                        text: w.text.trim().to_string(),
                        region: w.quad(),
                    })
                    .collect(),
            );
        }
        lines.push(line);
    }

    Ok(lines)
}
