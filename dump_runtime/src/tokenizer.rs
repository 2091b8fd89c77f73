//! Extraction of `##Key:payload` dump markers from game log lines.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use rayon::prelude::*;
use regex::Regex;
use thiserror::Error;

use crate::{DumpKey, DumpToken, MARKER_PREFIX};

static MARKER_PATTERN: OnceLock<Regex> = OnceLock::new();

/// `##(EmpireID|...):` followed by optional whitespace and the payload.
fn marker_pattern() -> &'static Regex {
    MARKER_PATTERN.get_or_init(|| {
        let names: Vec<&str> = DumpKey::ALL.iter().map(|key| key.as_str()).collect();
        let pattern = format!(
            r"{}({}):\s*(.*)",
            regex::escape(MARKER_PREFIX),
            names.join("|")
        );
        Regex::new(&pattern).expect("dump marker pattern should compile")
    })
}

/// Extracts the first recognized dump marker from a single log line.
///
/// Returns `None` for ordinary log lines and for `##` markers whose name is
/// not a [`DumpKey`]; neither case is an error. The payload is everything
/// after the marker colon and the whitespace directly following it, up to
/// the end of the line.
pub fn extract_token(line: &str) -> Option<DumpToken> {
    let captures = marker_pattern().captures(line)?;
    let key = captures.get(1)?.as_str().parse::<DumpKey>().ok()?;
    let payload = captures.get(2).map_or("", |m| m.as_str());
    Some(DumpToken::new(key, payload))
}

#[derive(Debug, Error)]
pub enum TokenizeError {
    #[error("failed to open log {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read log {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Iterator over the dump tokens of a line-oriented reader.
///
/// Lines are decoded lossily so a stray non-UTF-8 byte in unrelated log
/// output does not abort the stream.
#[derive(Debug)]
pub struct LogTokenizer<R> {
    reader: R,
    buffer: Vec<u8>,
    lines_read: u64,
}

impl<R: BufRead> LogTokenizer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(256),
            lines_read: 0,
        }
    }

    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }
}

impl<R: BufRead> Iterator for LogTokenizer<R> {
    type Item = io::Result<DumpToken>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buffer.clear();
            match self.reader.read_until(b'\n', &mut self.buffer) {
                Ok(0) => return None,
                Ok(_) => {
                    self.lines_read += 1;
                    let line = String::from_utf8_lossy(&self.buffer);
                    let line = line.trim_end_matches(['\n', '\r']);
                    if let Some(token) = extract_token(line) {
                        return Some(Ok(token));
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

pub fn tokenize_str(text: &str) -> Vec<DumpToken> {
    text.lines().filter_map(extract_token).collect()
}

pub fn tokenize_file(path: &Path) -> Result<Vec<DumpToken>, TokenizeError> {
    let file = File::open(path).map_err(|source| TokenizeError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut tokenizer = LogTokenizer::new(BufReader::new(file));
    let tokens = tokenizer
        .by_ref()
        .collect::<io::Result<Vec<_>>>()
        .map_err(|source| TokenizeError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    tracing::debug!(
        target: "empire_dump::tokenizer",
        path = %path.display(),
        lines = tokenizer.lines_read(),
        tokens = tokens.len(),
        "log.tokenized"
    );
    Ok(tokens)
}

/// Tokenizes several logs in parallel, keeping the input order.
pub fn tokenize_files(paths: &[PathBuf]) -> Vec<Result<Vec<DumpToken>, TokenizeError>> {
    paths.par_iter().map(|path| tokenize_file(path)).collect()
}
