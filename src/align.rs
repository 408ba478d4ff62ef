//! Align two trees that may disagree on tokenization
//!
//! The decision of which tokens correspond is made by an
//! [`AlignmentOracle`] over the two sentences' surface forms. The aligner
//! then inserts null tokens wherever one side has no counterpart, so both
//! trees end up the same length and position `k` of one tree corresponds
//! to position `k` of the other.

use crate::tree::{JOIN_MARKER, Token, Tree};
use thiserror::Error;

/// One step of an alignment: an index into each sentence, or `None` when
/// that side has no corresponding token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pairing {
    pub left: Option<usize>,
    pub right: Option<usize>,
}

impl Pairing {
    pub fn both(left: usize, right: usize) -> Self {
        Self {
            left: Some(left),
            right: Some(right),
        }
    }

    pub fn left_only(left: usize) -> Self {
        Self {
            left: Some(left),
            right: None,
        }
    }

    pub fn right_only(right: usize) -> Self {
        Self {
            left: None,
            right: Some(right),
        }
    }
}

impl From<(Option<usize>, Option<usize>)> for Pairing {
    fn from((left, right): (Option<usize>, Option<usize>)) -> Self {
        Self { left, right }
    }
}

/// Ordered pairings covering every token of both sentences exactly once
pub type AlignmentDecision = Vec<Pairing>;

/// Failure reported by an oracle implementation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("alignment oracle failed: {0}")]
pub struct OracleError(pub String);

/// Error during tree alignment
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AlignError {
    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error("invalid alignment decision: {0}")]
    InvalidDecision(String),
}

/// Decides which tokens of two sentences correspond
///
/// Sentences are the tokens' forms with join markers stripped, joined by
/// single spaces. Splitting a sentence on `' '` gives exactly one entry
/// per token, so the indices in the returned pairings are token indices.
pub trait AlignmentOracle: Send + Sync {
    fn align(&self, left: &str, right: &str) -> Result<AlignmentDecision, OracleError>;
}

impl<O: AlignmentOracle + ?Sized> AlignmentOracle for &O {
    fn align(&self, left: &str, right: &str) -> Result<AlignmentDecision, OracleError> {
        (**self).align(left, right)
    }
}

impl<O: AlignmentOracle + ?Sized> AlignmentOracle for Box<O> {
    fn align(&self, left: &str, right: &str) -> Result<AlignmentDecision, OracleError> {
        (**self).align(left, right)
    }
}

/// Two trees of equal length, synchronised position by position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedTreePair {
    pub left: Tree,
    pub right: Tree,
}

impl AlignedTreePair {
    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Positionally corresponding tokens
    pub fn pairs(&self) -> impl Iterator<Item = (&Token, &Token)> {
        self.left.tokens.iter().zip(&self.right.tokens)
    }
}

/// Oracle view of a tree: bare forms joined by single spaces
///
/// Whitespace inside a form would split it into several oracle tokens, so
/// it is replaced with `_` here.
pub fn oracle_sentence(tree: &Tree) -> String {
    tree.forms()
        .map(|form| {
            form.chars()
                .filter(|&c| c != JOIN_MARKER)
                .map(|c| if c.is_whitespace() { '_' } else { c })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Align two trees, inserting null tokens where either side is unmatched
///
/// The inputs are left untouched; the result holds fresh copies.
pub fn align_trees<O: AlignmentOracle + ?Sized>(
    left: &Tree,
    right: &Tree,
    oracle: &O,
) -> Result<AlignedTreePair, AlignError> {
    // An empty sentence has no oracle view distinct from a single empty form
    let decision = if left.is_empty() || right.is_empty() {
        (0..left.len())
            .map(Pairing::left_only)
            .chain((0..right.len()).map(Pairing::right_only))
            .collect()
    } else {
        oracle.align(&oracle_sentence(left), &oracle_sentence(right))?
    };
    apply_decision(left, right, &decision)
}

/// Insert null tokens as dictated by an alignment decision
pub fn apply_decision(
    left: &Tree,
    right: &Tree,
    decision: &[Pairing],
) -> Result<AlignedTreePair, AlignError> {
    validate_decision(decision, left.len(), right.len())?;

    let mut left = left.clone();
    let mut right = right.clone();

    // Positions index the growing trees, so earlier insertions are already
    // accounted for when a later one is applied
    for (position, pairing) in decision.iter().enumerate() {
        if pairing.left.is_none() {
            left.insert_null(position);
        }
        if pairing.right.is_none() {
            right.insert_null(position);
        }
    }

    debug_assert_eq!(left.len(), right.len());
    Ok(AlignedTreePair { left, right })
}

/// Check the decision covers `0..left_len` and `0..right_len` in order,
/// each index exactly once, with no empty pairing
pub fn validate_decision(
    decision: &[Pairing],
    left_len: usize,
    right_len: usize,
) -> Result<(), AlignError> {
    let mut next_left = 0;
    let mut next_right = 0;

    for (step, pairing) in decision.iter().enumerate() {
        if pairing.left.is_none() && pairing.right.is_none() {
            return Err(AlignError::InvalidDecision(format!(
                "pairing {} has neither side",
                step
            )));
        }
        if let Some(i) = pairing.left {
            if i != next_left {
                return Err(AlignError::InvalidDecision(format!(
                    "pairing {} uses left index {}, expected {}",
                    step, i, next_left
                )));
            }
            next_left += 1;
        }
        if let Some(j) = pairing.right {
            if j != next_right {
                return Err(AlignError::InvalidDecision(format!(
                    "pairing {} uses right index {}, expected {}",
                    step, j, next_right
                )));
            }
            next_right += 1;
        }
    }

    if next_left != left_len || next_right != right_len {
        return Err(AlignError::InvalidDecision(format!(
            "covers {} of {} left and {} of {} right tokens",
            next_left, left_len, next_right, right_len
        )));
    }
    Ok(())
}

/// Baseline oracle: exact-match longest common subsequence
///
/// Identical tokens are anchored by an LCS over the two token lists. The
/// unmatched tokens between two anchors are paired up front to back, and
/// whatever is left over on the longer side is unpaired.
#[derive(Debug, Clone, Copy, Default)]
pub struct LcsOracle;

impl LcsOracle {
    fn tokens(sentence: &str) -> Vec<&str> {
        sentence.split(' ').collect()
    }

    pub fn align_tokens(left: &[&str], right: &[&str]) -> AlignmentDecision {
        let (n, m) = (left.len(), right.len());

        // lcs[i][j]: LCS length of left[i..] and right[j..]
        let mut lcs = vec![vec![0u32; m + 1]; n + 1];
        for i in (0..n).rev() {
            for j in (0..m).rev() {
                lcs[i][j] = if left[i] == right[j] {
                    lcs[i + 1][j + 1] + 1
                } else {
                    lcs[i + 1][j].max(lcs[i][j + 1])
                };
            }
        }

        let mut anchors = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < n && j < m {
            if left[i] == right[j] {
                anchors.push((i, j));
                i += 1;
                j += 1;
            } else if lcs[i + 1][j] >= lcs[i][j + 1] {
                i += 1;
            } else {
                j += 1;
            }
        }
        anchors.push((n, m));

        let mut decision = Vec::with_capacity(n.max(m));
        let (mut i, mut j) = (0, 0);
        for (ai, aj) in anchors {
            while i < ai && j < aj {
                decision.push(Pairing::both(i, j));
                i += 1;
                j += 1;
            }
            decision.extend((i..ai).map(Pairing::left_only));
            decision.extend((j..aj).map(Pairing::right_only));
            if ai < n && aj < m {
                decision.push(Pairing::both(ai, aj));
            }
            i = ai + 1;
            j = aj + 1;
        }
        decision
    }
}

impl AlignmentOracle for LcsOracle {
    fn align(&self, left: &str, right: &str) -> Result<AlignmentDecision, OracleError> {
        Ok(Self::align_tokens(&Self::tokens(left), &Self::tokens(right)))
    }
}
