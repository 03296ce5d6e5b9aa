//! Mapping file loader
//!
//! Strips `#` comment lines and splits the file into one block per source.
//! Blocks are separated by one or more blank lines.

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("failed to read mapping file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Read a mapping file and return its source blocks in file order
pub fn load_mapping_blocks(path: impl AsRef<Path>) -> Result<Vec<String>, LoaderError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| LoaderError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let blocks = split_blocks(&text);
    log::debug!("Loaded {} mapping blocks from {}", blocks.len(), path.display());
    Ok(blocks)
}

/// Split mapping text into blocks, dropping comments
pub fn split_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        let line = line.trim_end();

        if line.trim_start().starts_with('#') {
            continue;
        }

        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(current.join("\n"));
                current.clear();
            }
            continue;
        }

        current.push(line);
    }

    if !current.is_empty() {
        blocks.push(current.join("\n"));
    }

    blocks
}
