//! Reading corpora from disk
//!
//! Files ending in `.gz` are decompressed on the fly.

use crate::conllx::{FormatError, HeaderKind, parse};
use crate::tree::Corpus;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error while loading a corpus file
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: FormatError,
    },
}

/// Read a whole file as UTF-8, decompressing `.gz` files
pub fn read_text(path: &Path) -> Result<String, CorpusError> {
    let io_err = |source| CorpusError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_err)?;
    let mut reader: Box<dyn Read> = if path.extension().is_some_and(|ext| ext == "gz") {
        Box::new(MultiGzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    let mut text = String::new();
    reader.read_to_string(&mut text).map_err(io_err)?;
    Ok(text)
}

/// Load and parse a corpus file
pub fn load_corpus(path: impl AsRef<Path>, header: HeaderKind) -> Result<Corpus, CorpusError> {
    let path = path.as_ref();
    let text = read_text(path)?;
    let corpus = parse(&text, header).map_err(|source| CorpusError::Format {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), sentences = corpus.len(), "loaded corpus");
    Ok(corpus)
}
