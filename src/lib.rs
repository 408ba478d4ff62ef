//! conllx-eval: compare parsed dependency trees against a gold treebank
//!
//! Gold and parsed corpora may tokenize the same sentences differently.
//! Each sentence pair is aligned by inserting null tokens, then scored for
//! tokenization, POS tags, attachment and word accuracy.

// Core modules
pub mod align; // Tree alignment with an injected oracle
pub mod conllx; // CoNLL-X / CATiB parsing and writing
pub mod corpus; // Loading corpus files (plain or gzip)
pub mod report; // Results table
pub mod resegment; // Clitic tokens back to words
pub mod score; // Metrics over aligned trees
pub mod tree; // Token, Tree and Corpus

// Python bindings
#[cfg(feature = "pyo3")]
pub mod python;

// Re-exports for convenience
pub use align::{
    AlignError, AlignedTreePair, AlignmentDecision, AlignmentOracle, LcsOracle, OracleError,
    Pairing, align_trees,
};
pub use conllx::{FormatError, HeaderKind, TreeReader, parse, write_corpus};
pub use corpus::{CorpusError, load_corpus};
pub use resegment::{SegmentationError, resegment};
pub use score::{EvalConfig, Evaluator, FormNormalizer, MetricsReport, ScoreError, Statistics};
pub use tree::{Corpus, Token, Tree};
