//! CoNLL-X file parsing
//!
//! Parses tab-separated dependency annotation into [`Tree`]s. Two column
//! layouts are understood: the 10-column CoNLL-X/CoNLL-U layout and the
//! 6-column CATiB layout (ID, FORM, UPOS, HEAD, DEPREL, FEATS). CATiB rows
//! are normalised into the 10-column shape so the rest of the crate sees a
//! single token layout.
//!
//! A sentence is a maximal run of data rows, ended by a blank line or by a
//! comment line. Lines starting with `#` that precede a run are kept as that
//! sentence's comments.

use crate::tree::{Corpus, EMPTY, Token, Tree};
use atoi::FromRadix10SignedChecked;
use std::io::{BufRead, Lines};
use std::str::FromStr;
use thiserror::Error;

/// Error during CoNLL-X parsing
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("line {line_num}: expected {expected} tab-separated fields, found {found}")]
    ColumnCount {
        line_num: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line_num}: {column} is not an integer: {value:?}")]
    NotAnInteger {
        line_num: usize,
        column: &'static str,
        value: String,
    },

    #[error("line {line_num}: expected ID {expected}, found {found}")]
    UnexpectedId {
        line_num: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line_num}: HEAD {head} is outside the sentence (1..={len} or 0)")]
    HeadOutOfRange {
        line_num: usize,
        head: i64,
        len: usize,
    },

    #[error("line {line_num}: comments are not followed by a dependency tree")]
    OrphanedComments { line_num: usize },

    #[error("line {line_num}: {message}")]
    Io { line_num: usize, message: String },

    #[error("unknown header kind {0:?} (expected \"conllx\" or \"catib\")")]
    UnknownHeader(String),
}

/// Column layout of a data file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HeaderKind {
    /// ID FORM LEMMA UPOS XPOS FEATS HEAD DEPREL DEPS MISC
    #[default]
    Conllx,
    /// ID FORM UPOS HEAD DEPREL FEATS
    Catib,
}

impl HeaderKind {
    pub fn column_count(self) -> usize {
        match self {
            HeaderKind::Conllx => 10,
            HeaderKind::Catib => 6,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            HeaderKind::Conllx => "conllx",
            HeaderKind::Catib => "catib",
        }
    }
}

impl FromStr for HeaderKind {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "conllx" | "conllu" => Ok(HeaderKind::Conllx),
            "catib" => Ok(HeaderKind::Catib),
            _ => Err(FormatError::UnknownHeader(s.to_string())),
        }
    }
}

impl std::fmt::Display for HeaderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// CoNLL-X reader that iterates over sentences
pub struct TreeReader<R: BufRead> {
    lines: Lines<R>,
    line_num: usize,
    header: HeaderKind,
    /// Comment line that ended the previous tree and opens the next one
    pending: Option<(usize, String)>,
}

impl<R: BufRead> TreeReader<R> {
    pub fn new(reader: R, header: HeaderKind) -> Self {
        Self {
            lines: reader.lines(),
            line_num: 0,
            header,
            pending: None,
        }
    }
}

impl<'a> TreeReader<&'a [u8]> {
    /// Create a reader over in-memory text
    pub fn from_string(text: &'a str, header: HeaderKind) -> Self {
        Self::new(strip_bom(text).as_bytes(), header)
    }
}

impl<R: BufRead> Iterator for TreeReader<R> {
    type Item = Result<Tree, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut rows: Vec<(usize, String)> = Vec::new();
        let mut tree = Tree::new();
        let mut first_comment_line = None;

        // Read lines until a blank line, a comment after data rows, or EOF
        loop {
            let (line_num, raw) = match self.pending.take() {
                Some(pending) => pending,
                None => {
                    let Some(line) = self.lines.next() else {
                        break;
                    };
                    self.line_num += 1;
                    match line {
                        Ok(line) => (self.line_num, line),
                        Err(e) => {
                            return Some(Err(FormatError::Io {
                                line_num: self.line_num,
                                message: e.to_string(),
                            }));
                        }
                    }
                }
            };
            let line = strip_bom(raw.trim_end());

            if line.trim().is_empty() {
                if rows.is_empty() && tree.comments.is_empty() {
                    // Skip runs of blank lines between sentences
                    continue;
                }
                break;
            }

            if line.starts_with('#') {
                if !rows.is_empty() {
                    // Comments before a data run belong to the next tree
                    self.pending = Some((line_num, line.to_string()));
                    break;
                }
                first_comment_line.get_or_insert(line_num);
                parse_comment(line, &mut tree);
                continue;
            }

            rows.push((line_num, line.to_string()));
        }

        if rows.is_empty() {
            return first_comment_line
                .map(|line_num| Err(FormatError::OrphanedComments { line_num }));
        }

        Some(parse_tree(tree, &rows, self.header))
    }
}

/// Parse a whole corpus from text
pub fn parse(text: &str, header: HeaderKind) -> Result<Corpus, FormatError> {
    TreeReader::from_string(text, header).collect()
}

/// Parse a whole corpus from text, naming the column layout
pub fn parse_with_header(text: &str, header: &str) -> Result<Corpus, FormatError> {
    parse(text, header.parse()?)
}

fn strip_bom(s: &str) -> &str {
    s.strip_prefix('\u{feff}').unwrap_or(s)
}

/// Keep a comment line, picking out the sentence text fields
fn parse_comment(line: &str, tree: &mut Tree) {
    if let Some((key, value)) = comment_field(line) {
        let value = value.to_string();
        match key {
            "text" => tree.sentence_text = Some(value),
            "treeTokens" | "sentenceText" => tree.tree_tokens = Some(value),
            _ => {}
        }
    }
    tree.comments.push(line.to_string());
}

/// `# key = value` as trimmed `(key, value)`
fn comment_field(line: &str) -> Option<(&str, &str)> {
    let body = line.strip_prefix('#')?.trim();
    let (key, value) = body.split_once('=')?;
    Some((key.trim(), value.trim()))
}

fn is_tree_tokens_comment(line: &str) -> bool {
    matches!(comment_field(line), Some(("treeTokens" | "sentenceText", _)))
}

/// Turn the accumulated rows into tokens and validate their numbering
fn parse_tree(
    mut tree: Tree,
    rows: &[(usize, String)],
    header: HeaderKind,
) -> Result<Tree, FormatError> {
    tree.tokens.reserve(rows.len());
    for (line_num, line) in rows {
        let token = parse_line(line, *line_num, header)?;
        let expected = tree.tokens.len() + 1;
        if token.id != expected {
            return Err(FormatError::UnexpectedId {
                line_num: *line_num,
                expected,
                found: token.id,
            });
        }
        tree.tokens.push(token);
    }

    let len = tree.tokens.len();
    for (token, (line_num, _)) in tree.tokens.iter().zip(rows) {
        if !(0..=len as i64).contains(&token.head) {
            return Err(FormatError::HeadOutOfRange {
                line_num: *line_num,
                head: token.head,
                len,
            });
        }
    }

    Ok(tree)
}

/// Split a row on tabs
fn split_fields(line: &str) -> Vec<&str> {
    let mut fields = Vec::with_capacity(10);
    let mut start = 0;
    for pos in memchr::memchr_iter(b'\t', line.as_bytes()) {
        fields.push(&line[start..pos]);
        start = pos + 1;
    }
    fields.push(&line[start..]);
    fields
}

/// Parse a single data row into a Token
fn parse_line(line: &str, line_num: usize, header: HeaderKind) -> Result<Token, FormatError> {
    let fields = split_fields(line);

    if fields.len() != header.column_count() {
        return Err(FormatError::ColumnCount {
            line_num,
            expected: header.column_count(),
            found: fields.len(),
        });
    }

    match header {
        HeaderKind::Conllx => {
            let id = parse_id(fields[0], line_num)?;
            let head = parse_head(fields[6], line_num)?;
            Ok(Token {
                id,
                form: fields[1].to_string(),
                lemma: fields[2].to_string(),
                upos: fields[3].to_string(),
                xpos: fields[4].to_string(),
                feats: fields[5].to_string(),
                head,
                deprel: fields[7].to_string(),
                deps: fields[8].to_string(),
                misc: fields[9].to_string(),
            })
        }
        HeaderKind::Catib => {
            let id = parse_id(fields[0], line_num)?;
            let head = parse_head(fields[3], line_num)?;
            Ok(Token {
                id,
                form: fields[1].to_string(),
                lemma: EMPTY.to_string(),
                upos: fields[2].to_string(),
                xpos: EMPTY.to_string(),
                feats: fields[5].to_string(),
                head,
                deprel: fields[4].to_string(),
                deps: EMPTY.to_string(),
                misc: EMPTY.to_string(),
            })
        }
    }
}

/// Parse a whole field as a signed integer
fn parse_int(s: &str, line_num: usize, column: &'static str) -> Result<i64, FormatError> {
    let not_an_integer = || FormatError::NotAnInteger {
        line_num,
        column,
        value: s.to_string(),
    };
    let (value, used) = i64::from_radix_10_signed_checked(s.as_bytes());
    match value {
        Some(v) if used == s.len() && !s.is_empty() => Ok(v),
        _ => Err(not_an_integer()),
    }
}

/// Parse ID field (a positive integer)
fn parse_id(s: &str, line_num: usize) -> Result<usize, FormatError> {
    let id = parse_int(s, line_num, "ID")?;
    usize::try_from(id).map_err(|_| FormatError::NotAnInteger {
        line_num,
        column: "ID",
        value: s.to_string(),
    })
}

/// Parse HEAD field (0 for the root)
fn parse_head(s: &str, line_num: usize) -> Result<i64, FormatError> {
    parse_int(s, line_num, "HEAD")
}

/// Serialise trees as 10-column CoNLL-X
///
/// With `tree_tokens`, a `# treeTokens = ...` line listing the forms is
/// written after each tree's comments, replacing any token list the tree
/// was read with.
pub fn write_corpus<W: std::io::Write>(
    out: &mut W,
    trees: &[Tree],
    tree_tokens: bool,
) -> std::io::Result<()> {
    for tree in trees {
        for comment in &tree.comments {
            if tree_tokens && is_tree_tokens_comment(comment) {
                continue;
            }
            writeln!(out, "{}", comment)?;
        }
        if tree_tokens {
            writeln!(out, "# treeTokens = {}", tree.form_line())?;
        }
        for token in &tree.tokens {
            writeln!(out, "{}", token.columns().join("\t"))?;
        }
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &str = "# text = The dog runs.
1\tThe\tthe\tDET\tDT\t_\t2\tdet\t_\t_
2\tdog\tdog\tNOUN\tNN\t_\t3\tnsubj\t_\t_
3\truns\trun\tVERB\tVBZ\t_\t0\troot\t_\tSpaceAfter=No
4\t.\t.\tPUNCT\t.\t_\t3\tpunct\t_\t_

";

    #[test]
    fn test_parse_simple_sentence() {
        let corpus = parse(SIMPLE, HeaderKind::Conllx).unwrap();
        assert_eq!(corpus.len(), 1);

        let tree = &corpus.trees[0];
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.sentence_text, Some("The dog runs.".to_string()));
        assert_eq!(tree.comments, vec!["# text = The dog runs.".to_string()]);

        assert_eq!(tree.tokens[0].form, "The");
        assert_eq!(tree.tokens[0].lemma, "the");
        assert_eq!(tree.tokens[0].upos, "DET");
        assert_eq!(tree.tokens[0].xpos, "DT");
        assert_eq!(tree.tokens[0].head, 2);
        assert_eq!(tree.tokens[0].deprel, "det");
        assert_eq!(tree.tokens[2].head, 0);
        assert_eq!(tree.tokens[2].misc, "SpaceAfter=No");
    }

    #[test]
    fn test_parse_multiple_sentences_and_blank_runs() {
        let text = "1\ta\t_\tX\t_\t_\t0\troot\t_\t_\n\n\n\n\
                    # sent_id = 2\n\
                    1\tb\t_\tX\t_\t_\t2\tdep\t_\t_\n\
                    2\tc\t_\tX\t_\t_\t0\troot\t_\t_";
        let corpus = parse(text, HeaderKind::Conllx).unwrap();
        assert_eq!(corpus.len(), 2);
        assert!(corpus.trees[0].comments.is_empty());
        assert_eq!(corpus.trees[1].comments, vec!["# sent_id = 2".to_string()]);
        assert_eq!(corpus.trees[1].len(), 2);
    }

    #[test]
    fn test_comment_after_rows_starts_new_tree() {
        let text = "# sent_id = 1\n\
                    1\ta\t_\tX\t_\t_\t0\troot\t_\t_\n\
                    # sent_id = 2\n\
                    # text = b\n\
                    1\tb\t_\tX\t_\t_\t0\troot\t_\t_\n\n";
        let corpus = parse(text, HeaderKind::Conllx).unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.trees[0].comments, vec!["# sent_id = 1".to_string()]);
        assert_eq!(corpus.trees[0].forms().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(
            corpus.trees[1].comments,
            vec!["# sent_id = 2".to_string(), "# text = b".to_string()]
        );
        assert_eq!(corpus.trees[1].sentence_text.as_deref(), Some("b"));
        assert_eq!(corpus.trees[1].forms().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn test_comment_after_rows_then_end_of_input() {
        let text = "1\ta\t_\tX\t_\t_\t0\troot\t_\t_\n# dangling\n";
        let mut reader = TreeReader::from_string(text, HeaderKind::Conllx);
        assert_eq!(reader.next().unwrap().unwrap().len(), 1);
        assert_eq!(
            reader.next().unwrap(),
            Err(FormatError::OrphanedComments { line_num: 2 })
        );
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_parse_catib_normalises_columns() {
        let text = "1\tw+\tPRT\t2\tMOD\t_\n2\tktb\tVRB\t0\t---\tgen=m\n\n";
        let corpus = parse(text, HeaderKind::Catib).unwrap();
        let tree = &corpus.trees[0];

        assert_eq!(tree.tokens[0].form, "w+");
        assert_eq!(tree.tokens[0].lemma, "_");
        assert_eq!(tree.tokens[0].upos, "PRT");
        assert_eq!(tree.tokens[0].xpos, "_");
        assert_eq!(tree.tokens[0].head, 2);
        assert_eq!(tree.tokens[0].deprel, "MOD");
        assert_eq!(tree.tokens[1].feats, "gen=m");
        assert_eq!(tree.tokens[1].deps, "_");
        assert_eq!(tree.tokens[1].misc, "_");
    }

    #[test]
    fn test_bom_and_crlf() {
        let text = "\u{feff}# text = x\r\n1\tx\t_\tX\t_\t_\t0\troot\t_\t_\r\n\r\n";
        let corpus = parse(text, HeaderKind::Conllx).unwrap();
        assert_eq!(corpus.trees[0].comments, vec!["# text = x".to_string()]);
        assert_eq!(corpus.trees[0].tokens[0].misc, "_");
    }

    #[test]
    fn test_tree_tokens_comment() {
        let text = "# treeTokens = w+ ktb\n1\tw+\tPRT\t2\tMOD\t_\n2\tktb\tVRB\t0\t---\t_\n";
        let corpus = parse(text, HeaderKind::Catib).unwrap();
        assert_eq!(corpus.trees[0].tree_tokens.as_deref(), Some("w+ ktb"));
    }

    #[test]
    fn test_wrong_column_count() {
        let err = parse(SIMPLE, HeaderKind::Catib).unwrap_err();
        assert_eq!(
            err,
            FormatError::ColumnCount {
                line_num: 2,
                expected: 6,
                found: 10
            }
        );
    }

    #[test]
    fn test_non_integer_id_and_head() {
        let err = parse("1-2\tab\t_\tX\t_\t_\t0\troot\t_\t_\n", HeaderKind::Conllx).unwrap_err();
        assert!(matches!(err, FormatError::NotAnInteger { column: "ID", .. }));

        let err = parse("1\ta\t_\tX\t_\t_\t2x\troot\t_\t_\n", HeaderKind::Conllx).unwrap_err();
        assert!(matches!(
            err,
            FormatError::NotAnInteger {
                line_num: 1,
                column: "HEAD",
                ..
            }
        ));

        let err = parse("1\ta\t_\tX\t_\t_\t\troot\t_\t_\n", HeaderKind::Conllx).unwrap_err();
        assert!(matches!(err, FormatError::NotAnInteger { column: "HEAD", .. }));
    }

    #[test]
    fn test_ids_must_be_sequential() {
        let text = "1\ta\t_\tX\t_\t_\t0\troot\t_\t_\n3\tb\t_\tX\t_\t_\t1\tdep\t_\t_\n";
        let err = parse(text, HeaderKind::Conllx).unwrap_err();
        assert_eq!(
            err,
            FormatError::UnexpectedId {
                line_num: 2,
                expected: 2,
                found: 3
            }
        );
    }

    #[test]
    fn test_head_out_of_range() {
        let text = "1\ta\t_\tX\t_\t_\t0\troot\t_\t_\n2\tb\t_\tX\t_\t_\t5\tdep\t_\t_\n";
        let err = parse(text, HeaderKind::Conllx).unwrap_err();
        assert_eq!(
            err,
            FormatError::HeadOutOfRange {
                line_num: 2,
                head: 5,
                len: 2
            }
        );
    }

    #[test]
    fn test_orphaned_comments() {
        let text = "1\ta\t_\tX\t_\t_\t0\troot\t_\t_\n\n# text = nothing\n\n";
        let mut reader = TreeReader::from_string(text, HeaderKind::Conllx);
        assert!(reader.next().unwrap().is_ok());
        assert_eq!(
            reader.next().unwrap(),
            Err(FormatError::OrphanedComments { line_num: 3 })
        );

        // Trailing comment block at end of input
        let err = parse("# dangling", HeaderKind::Conllx).unwrap_err();
        assert_eq!(err, FormatError::OrphanedComments { line_num: 1 });
    }

    #[test]
    fn test_empty_input() {
        assert!(parse("", HeaderKind::Conllx).unwrap().is_empty());
        assert!(parse("\n\n", HeaderKind::Conllx).unwrap().is_empty());
    }

    #[test]
    fn test_header_kind_from_str() {
        assert_eq!("conllx".parse::<HeaderKind>().unwrap(), HeaderKind::Conllx);
        assert_eq!("CoNLLU".parse::<HeaderKind>().unwrap(), HeaderKind::Conllx);
        assert_eq!("catib".parse::<HeaderKind>().unwrap(), HeaderKind::Catib);
        assert_eq!(
            "penn".parse::<HeaderKind>(),
            Err(FormatError::UnknownHeader("penn".to_string()))
        );
        assert!(parse_with_header(SIMPLE, "penn").is_err());
    }

    #[test]
    fn test_write_corpus() {
        let corpus = parse(SIMPLE, HeaderKind::Conllx).unwrap();
        let mut out = Vec::new();
        write_corpus(&mut out, &corpus.trees, true).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("# text = The dog runs.\n# treeTokens = The dog runs .\n"));
        assert!(text.contains("3\truns\trun\tVERB\tVBZ\t_\t0\troot\t_\tSpaceAfter=No\n"));
        assert!(text.ends_with("\n\n"));

        // Written text reads back to the same trees (the extra comment aside)
        let reread = parse(&text, HeaderKind::Conllx).unwrap();
        assert_eq!(reread.trees[0].tokens, corpus.trees[0].tokens);
    }

    #[test]
    fn test_write_corpus_replaces_stale_tree_tokens() {
        let text = "# sent_id = 7\n\
                    # treeTokens = wktb\n\
                    1\tw+\t_\tX\t_\t_\t2\tcc\t_\t_\n\
                    2\tktb\t_\tX\t_\t_\t0\troot\t_\t_\n\n";
        let corpus = parse(text, HeaderKind::Conllx).unwrap();

        let mut out = Vec::new();
        write_corpus(&mut out, &corpus.trees, true).unwrap();
        let written = String::from_utf8(out).unwrap();
        assert_eq!(written.matches("# treeTokens").count(), 1);
        assert!(written.starts_with("# sent_id = 7\n# treeTokens = w+ ktb\n"));

        // Without a fresh token list the original comment is kept
        let mut out = Vec::new();
        write_corpus(&mut out, &corpus.trees, false).unwrap();
        let written = String::from_utf8(out).unwrap();
        assert!(written.contains("# treeTokens = wktb\n"));
    }
}
