use std::path::Path;

use ndarray::Array2;
use tracing::debug;

use crate::error::{BkmeansError, Result};

/// Loads a whitespace-delimited numeric text file into a `rows x dims` matrix.
///
/// Tokens that do not parse as `f64` are skipped and lines left without any
/// number are dropped. Every kept row must have the width of the first kept row.
pub fn load_dataset<P: AsRef<Path>>(path: P) -> Result<Array2<f64>> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(BkmeansError::MissingFile {
            path: path.to_path_buf(),
        });
    }
    let text = std::fs::read_to_string(path)?;
    let data = parse_rows(&text)?.ok_or_else(|| BkmeansError::EmptyDataset {
        path: path.to_path_buf(),
    })?;
    debug!(
        path = %path.display(),
        rows = data.nrows(),
        dims = data.ncols(),
        "dataset loaded"
    );
    Ok(data)
}

/// Parses numeric rows from text. `Ok(None)` when no line holds a number.
pub fn parse_rows(text: &str) -> Result<Option<Array2<f64>>> {
    let mut values = Vec::new();
    let mut width = None;
    let mut rows = 0;

    for (line_no, line) in text.lines().enumerate() {
        let row: Vec<f64> = line
            .split_whitespace()
            .filter_map(|token| token.parse::<f64>().ok())
            .collect();
        if row.is_empty() {
            continue;
        }
        match width {
            None => width = Some(row.len()),
            Some(expected) if expected != row.len() => {
                return Err(BkmeansError::RaggedRows {
                    line: line_no + 1,
                    expected,
                    found: row.len(),
                });
            }
            Some(_) => {}
        }
        values.extend(row);
        rows += 1;
    }

    let Some(dims) = width else {
        return Ok(None);
    };
    let data = Array2::from_shape_vec((rows, dims), values)
        .map_err(|e| BkmeansError::InvalidConfig(format!("dataset shape: {e}")))?;
    Ok(Some(data))
}
