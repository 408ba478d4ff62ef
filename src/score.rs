//! Agreement metrics between a gold and a parsed corpus
//!
//! Each sentence pair is aligned, then compared position by position.
//! Per-sentence results are plain counts, summed over the corpus (and over
//! several corpora) before any ratio is taken, so rounding only happens
//! when a [`MetricsReport`] is printed.

use crate::align::{AlignError, AlignedTreePair, AlignmentOracle, align_trees};
use crate::conllx::HeaderKind;
use crate::resegment::resegment;
use crate::tree::{Corpus, Tree};
use rayon::prelude::*;
use std::borrow::Cow;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use thiserror::Error;

/// Error during scoring
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScoreError {
    #[error("gold corpus has {gold} sentences but parsed corpus has {parsed}")]
    Mismatch { gold: usize, parsed: usize },

    #[error("sentence {sentence}: {source}")]
    Align {
        sentence: usize,
        #[source]
        source: AlignError,
    },
}

/// Evaluation settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalConfig {
    /// Column layout of both input corpora
    pub header: HeaderKind,
    /// Score sentence pairs on the rayon thread pool
    pub parallel: bool,
    /// Compute word accuracy over resegmented clitics
    pub word_accuracy: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            header: HeaderKind::default(),
            parallel: true,
            word_accuracy: true,
        }
    }
}

/// Stateless FORM rewrite applied to both corpora before alignment,
/// e.g. a transliteration or spelling normalisation table lookup
pub type FormNormalizer = fn(&str) -> String;

/// Field-wise `+`, `+=` and `Sum` for count structs
macro_rules! impl_counts {
    ($ty:ident { $($field:ident),+ $(,)? }) => {
        impl AddAssign for $ty {
            fn add_assign(&mut self, other: Self) {
                $(self.$field += other.$field;)+
            }
        }

        impl Add for $ty {
            type Output = Self;

            fn add(mut self, other: Self) -> Self {
                self += other;
                self
            }
        }

        impl Sum for $ty {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                iter.fold(Self::default(), Add::add)
            }
        }
    };
}

/// Denominators
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeCounts {
    /// Real gold tokens
    pub ref_tokens: usize,
    /// Real parsed tokens
    pub pred_tokens: usize,
    /// Positions after alignment
    pub aligned_tokens: usize,
    /// Gold words after resegmentation
    pub ref_words: usize,
}

impl_counts!(TreeCounts {
    ref_tokens,
    pred_tokens,
    aligned_tokens,
    ref_words
});

/// Numerators
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeMatches {
    pub tokenization: usize,
    pub pos: usize,
    pub uas: usize,
    pub label: usize,
    pub las: usize,
    pub words: usize,
}

impl_counts!(TreeMatches {
    tokenization,
    pos,
    uas,
    label,
    las,
    words
});

/// Number of sentences where every gold token matches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PerfectTrees {
    pub uas: usize,
    pub label: usize,
    pub las: usize,
}

impl_counts!(PerfectTrees { uas, label, las });

/// Null tokens inserted by the aligner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlignmentNumbers {
    /// Nulls on the gold side: tokens only the parser produced
    pub insertions: usize,
    /// Nulls on the parsed side: gold tokens the parser missed
    pub deletions: usize,
}

impl_counts!(AlignmentNumbers {
    insertions,
    deletions
});

/// Everything counted over one or more sentence pairs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    pub sentences: usize,
    pub counts: TreeCounts,
    pub matches: TreeMatches,
    pub perfect: PerfectTrees,
    pub alignment: AlignmentNumbers,
    /// Sentences left out of word accuracy because their clitics could not
    /// be resegmented
    pub segmentation_failures: usize,
}

impl_counts!(Statistics {
    sentences,
    counts,
    matches,
    perfect,
    alignment,
    segmentation_failures
});

impl Statistics {
    pub fn report(&self) -> MetricsReport {
        let precision = percent(self.matches.tokenization, self.counts.pred_tokens);
        let recall = percent(self.matches.tokenization, self.counts.ref_tokens);
        let ref_tokens = self.counts.ref_tokens;

        MetricsReport {
            tokenization_f_score: f_score(precision, recall),
            tokenization_precision: precision,
            tokenization_recall: recall,
            word_accuracy: percent(self.matches.words, self.counts.ref_words),
            pos: percent(self.matches.pos, ref_tokens),
            uas: percent(self.matches.uas, ref_tokens),
            label: percent(self.matches.label, ref_tokens),
            las: percent(self.matches.las, ref_tokens),
            pp_uas: percent(self.perfect.uas, self.sentences),
            pp_label: percent(self.perfect.label, self.sentences),
            pp_las: percent(self.perfect.las, self.sentences),
            sentences: self.sentences,
            insertions: self.alignment.insertions,
            deletions: self.alignment.deletions,
            segmentation_failures: self.segmentation_failures,
        }
    }
}

/// `100 * part / whole`, or `0` for an empty whole
fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        100.0 * part as f64 / whole as f64
    }
}

/// Harmonic mean, or `0` when both inputs are zero
fn f_score(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// Final metrics, all percentages in `[0, 100]`, unrounded
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricsReport {
    pub tokenization_f_score: f64,
    pub tokenization_precision: f64,
    pub tokenization_recall: f64,
    pub word_accuracy: f64,
    pub pos: f64,
    pub uas: f64,
    pub label: f64,
    pub las: f64,
    pub pp_uas: f64,
    pub pp_label: f64,
    pub pp_las: f64,
    pub sentences: usize,
    pub insertions: usize,
    pub deletions: usize,
    pub segmentation_failures: usize,
}

impl MetricsReport {
    /// Names of the percentage metrics, in report order
    pub const METRIC_NAMES: [&'static str; 11] = [
        "tokenization_f_score",
        "tokenization_precision",
        "tokenization_recall",
        "word_accuracy",
        "pos",
        "uas",
        "label",
        "las",
        "pp_uas",
        "pp_label",
        "pp_las",
    ];

    /// Names of the count fields, in report order
    pub const COUNT_NAMES: [&'static str; 4] =
        ["sentences", "insertions", "deletions", "segmentation_failures"];

    /// Percentage metrics paired with their names
    pub fn metrics(&self) -> [(&'static str, f64); 11] {
        let values = [
            self.tokenization_f_score,
            self.tokenization_precision,
            self.tokenization_recall,
            self.word_accuracy,
            self.pos,
            self.uas,
            self.label,
            self.las,
            self.pp_uas,
            self.pp_label,
            self.pp_las,
        ];
        std::array::from_fn(|i| (Self::METRIC_NAMES[i], values[i]))
    }

    /// Count fields paired with their names
    pub fn counts(&self) -> [(&'static str, usize); 4] {
        let values = [
            self.sentences,
            self.insertions,
            self.deletions,
            self.segmentation_failures,
        ];
        std::array::from_fn(|i| (Self::COUNT_NAMES[i], values[i]))
    }

    /// Look up a percentage metric by name
    pub fn get(&self, name: &str) -> Option<f64> {
        self.metrics()
            .into_iter()
            .find(|(metric, _)| *metric == name)
            .map(|(_, value)| value)
    }
}

/// Count matches on an aligned pair
///
/// Tokenization compares forms at every position where neither side is a
/// null. The remaining columns are compared wherever the gold side is real.
pub fn tree_statistics(aligned: &AlignedTreePair) -> Statistics {
    let mut matches = TreeMatches::default();
    let mut all_heads = true;
    let mut all_labels = true;

    for (gold, parsed) in aligned.pairs() {
        if !gold.is_null() && !parsed.is_null() && gold.form == parsed.form {
            matches.tokenization += 1;
        }
        if gold.is_null() {
            continue;
        }

        let head = gold.head == parsed.head;
        let label = gold.deprel == parsed.deprel;
        matches.pos += usize::from(gold.upos == parsed.upos);
        matches.uas += usize::from(head);
        matches.label += usize::from(label);
        matches.las += usize::from(head && label);
        all_heads &= head;
        all_labels &= label;
    }

    let insertions = aligned.left.null_token_count();
    let deletions = aligned.right.null_token_count();

    Statistics {
        sentences: 1,
        counts: TreeCounts {
            ref_tokens: aligned.len() - insertions,
            pred_tokens: aligned.len() - deletions,
            aligned_tokens: aligned.len(),
            ref_words: 0,
        },
        matches,
        perfect: PerfectTrees {
            uas: usize::from(all_heads),
            label: usize::from(all_labels),
            las: usize::from(all_heads && all_labels),
        },
        alignment: AlignmentNumbers {
            insertions,
            deletions,
        },
        segmentation_failures: 0,
    }
}

/// Scores gold/parsed corpora with an injected alignment oracle
#[derive(Debug, Clone)]
pub struct Evaluator<O> {
    oracle: O,
    config: EvalConfig,
    normalizer: Option<FormNormalizer>,
}

impl<O: AlignmentOracle> Evaluator<O> {
    pub fn new(oracle: O, config: EvalConfig) -> Self {
        Self {
            oracle,
            config,
            normalizer: None,
        }
    }

    /// Rewrite every real FORM with `normalizer` before comparing
    pub fn with_normalizer(mut self, normalizer: FormNormalizer) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Metrics for one gold/parsed corpus pair
    pub fn score(&self, gold: &Corpus, parsed: &Corpus) -> Result<MetricsReport, ScoreError> {
        Ok(self.statistics(gold, parsed)?.report())
    }

    /// Summed counts for one gold/parsed corpus pair
    pub fn statistics(&self, gold: &Corpus, parsed: &Corpus) -> Result<Statistics, ScoreError> {
        check_lengths(gold, parsed)?;

        let stats = if self.config.parallel {
            gold.trees
                .par_iter()
                .zip(parsed.trees.par_iter())
                .enumerate()
                .map(|(i, (g, p))| self.sentence_statistics(i, g, p))
                .try_reduce(Statistics::default, |a, b| Ok(a + b))?
        } else {
            gold.iter()
                .zip(parsed.iter())
                .enumerate()
                .map(|(i, (g, p))| self.sentence_statistics(i, g, p))
                .sum::<Result<Statistics, ScoreError>>()?
        };

        tracing::debug!(
            sentences = stats.sentences,
            ref_tokens = stats.counts.ref_tokens,
            pred_tokens = stats.counts.pred_tokens,
            "scored corpus pair"
        );
        Ok(stats)
    }

    /// Align every sentence pair, e.g. to write the aligned corpora out
    pub fn align_corpora(
        &self,
        gold: &Corpus,
        parsed: &Corpus,
    ) -> Result<Vec<AlignedTreePair>, ScoreError> {
        check_lengths(gold, parsed)?;
        gold.iter()
            .zip(parsed.iter())
            .enumerate()
            .map(|(i, (g, p))| self.align(i, &self.normalize(g), &self.normalize(p)))
            .collect()
    }

    fn align(
        &self,
        sentence: usize,
        gold: &Tree,
        parsed: &Tree,
    ) -> Result<AlignedTreePair, ScoreError> {
        align_trees(gold, parsed, &self.oracle)
            .map_err(|source| ScoreError::Align { sentence, source })
    }

    /// The tree with its forms normalised, or the tree itself
    fn normalize<'t>(&self, tree: &'t Tree) -> Cow<'t, Tree> {
        let Some(normalizer) = self.normalizer else {
            return Cow::Borrowed(tree);
        };
        let mut tree = tree.clone();
        for token in tree.tokens.iter_mut().filter(|token| !token.is_null()) {
            token.form = normalizer(&token.form);
        }
        Cow::Owned(tree)
    }

    /// Counts for one sentence pair
    pub fn sentence_statistics(
        &self,
        sentence: usize,
        gold: &Tree,
        parsed: &Tree,
    ) -> Result<Statistics, ScoreError> {
        let gold = self.normalize(gold);
        let parsed = self.normalize(parsed);
        let aligned = self.align(sentence, &gold, &parsed)?;
        let mut stats = tree_statistics(&aligned);

        if self.config.word_accuracy {
            match self.word_matches(sentence, &gold, &parsed)? {
                Some((matches, ref_words)) => {
                    stats.matches.words = matches;
                    stats.counts.ref_words = ref_words;
                }
                None => stats.segmentation_failures = 1,
            }
        }

        tracing::debug!(
            sentence,
            aligned = stats.counts.aligned_tokens,
            insertions = stats.alignment.insertions,
            deletions = stats.alignment.deletions,
            "aligned sentence pair"
        );
        Ok(stats)
    }

    /// Matching words and gold word count after clitic resegmentation
    ///
    /// `None` when either side has an invalid clitic sequence; the
    /// sentence then takes no part in word accuracy.
    fn word_matches(
        &self,
        sentence: usize,
        gold: &Tree,
        parsed: &Tree,
    ) -> Result<Option<(usize, usize)>, ScoreError> {
        let gold_forms: Vec<&str> = gold.forms().collect();
        let parsed_forms: Vec<&str> = parsed.forms().collect();

        let words = resegment(&gold_forms).and_then(|g| Ok((g, resegment(&parsed_forms)?)));
        let (gold_words, parsed_words) = match words {
            Ok(words) => words,
            Err(e) => {
                tracing::warn!(sentence, error = %e, "skipping sentence for word accuracy");
                return Ok(None);
            }
        };

        let gold_tree = Tree::from_forms(&gold_words);
        let parsed_tree = Tree::from_forms(&parsed_words);
        let aligned = self.align(sentence, &gold_tree, &parsed_tree)?;
        let matches = aligned
            .pairs()
            .filter(|(g, p)| !g.is_null() && !p.is_null() && g.form == p.form)
            .count();

        Ok(Some((matches, gold_words.len())))
    }
}

fn check_lengths(gold: &Corpus, parsed: &Corpus) -> Result<(), ScoreError> {
    if gold.len() != parsed.len() {
        return Err(ScoreError::Mismatch {
            gold: gold.len(),
            parsed: parsed.len(),
        });
    }
    Ok(())
}
