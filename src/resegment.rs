//! Rebuild orthographic words from clitic-segmented tokens
//!
//! A token ending in the join marker (`w+`) is a proclitic and attaches to
//! the token after it; a token starting with the join marker (`+hm`) is an
//! enclitic and attaches to the token before it. Tokens made only of join
//! markers (`+`, `++`) are ordinary tokens.

use crate::tree::JOIN_MARKER;
use thiserror::Error;

/// Clitic sequence that cannot be turned into words
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SegmentationError {
    #[error("{token:?} is followed by {next:?}: enclitic after proclitic")]
    EncliticAfterProclitic { token: String, next: String },

    #[error("proclitic cannot be the final token: {token:?}")]
    ProcliticAtEnd { token: String },

    #[error("first token cannot be an enclitic: {token:?}")]
    EncliticAtStart { token: String },
}

fn only_markers(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c == JOIN_MARKER)
}

pub fn is_proclitic(token: &str) -> bool {
    token.ends_with(JOIN_MARKER) && !only_markers(token)
}

pub fn is_enclitic(token: &str) -> bool {
    token.starts_with(JOIN_MARKER) && !only_markers(token)
}

fn strip_markers(token: &str) -> impl Iterator<Item = char> + '_ {
    token.chars().filter(|&c| c != JOIN_MARKER)
}

/// Merge clitics into the words they belong to
///
/// ```
/// use conllx_eval::resegment::resegment;
///
/// assert_eq!(resegment(&["a+", "b", "c+", "d"]).unwrap(), vec!["ab", "cd"]);
/// assert_eq!(resegment(&["a", "+b", "+c"]).unwrap(), vec!["abc"]);
/// ```
pub fn resegment<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<String>, SegmentationError> {
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, token) in tokens.iter().enumerate() {
        let token = token.as_ref();
        let next: Option<&str> = tokens.get(i + 1).map(|t| t.as_ref());

        if is_proclitic(token) {
            current.extend(strip_markers(token));
            match next {
                None => {
                    return Err(SegmentationError::ProcliticAtEnd {
                        token: token.to_string(),
                    });
                }
                Some(next) if is_enclitic(next) => {
                    return Err(SegmentationError::EncliticAfterProclitic {
                        token: token.to_string(),
                        next: next.to_string(),
                    });
                }
                // The word stays open for its host
                Some(_) => continue,
            }
        }

        if is_enclitic(token) {
            if i == 0 {
                return Err(SegmentationError::EncliticAtStart {
                    token: token.to_string(),
                });
            }
            current.extend(strip_markers(token));
        } else {
            current.push_str(token);
        }

        if !next.is_some_and(is_enclitic) {
            words.push(std::mem::take(&mut current));
        }
    }

    Ok(words)
}
