//! Tree data structures for treebank comparison
//!
//! A [`Corpus`] owns an ordered list of [`Tree`]s, and every tree owns an
//! ordered list of [`Token`]s in the canonical 10-column CoNLL-X layout.
//! Ids are 1-based and contiguous; heads point at ids of the same tree,
//! with `0` for the root.

/// Form of a placeholder token inserted during alignment
pub const NULL_FORM: &str = "tok";

/// Head of a placeholder token inserted during alignment
pub const NULL_HEAD: i64 = -1;

/// Value of an empty annotation column
pub const EMPTY: &str = "_";

/// Join marker separating clitics from their host word
pub const JOIN_MARKER: char = '+';

/// One row of a dependency tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub id: usize,
    pub form: String,
    pub lemma: String,
    pub upos: String,
    pub xpos: String,
    pub feats: String,
    pub head: i64,
    pub deprel: String,
    pub deps: String,
    pub misc: String,
}

impl Token {
    /// Create a token with the given form and head; all other columns empty
    pub fn new(id: usize, form: &str, head: i64) -> Self {
        Self {
            id,
            form: form.to_string(),
            lemma: EMPTY.to_string(),
            upos: EMPTY.to_string(),
            xpos: EMPTY.to_string(),
            feats: EMPTY.to_string(),
            head,
            deprel: EMPTY.to_string(),
            deps: EMPTY.to_string(),
            misc: EMPTY.to_string(),
        }
    }

    /// Placeholder standing in for a token that only exists on the other side
    ///
    /// The id is provisional; the aligner renumbers every token after an
    /// insertion.
    pub fn null() -> Self {
        Self::new(0, NULL_FORM, NULL_HEAD)
    }

    /// Builder-style setters used by tests and the 6-column reader
    pub fn with_upos(mut self, upos: &str) -> Self {
        self.upos = upos.to_string();
        self
    }

    pub fn with_deprel(mut self, deprel: &str) -> Self {
        self.deprel = deprel.to_string();
        self
    }

    /// Whether this token was inserted by the aligner
    pub fn is_null(&self) -> bool {
        self.form == NULL_FORM
    }

    /// Form with every join marker removed
    pub fn bare_form(&self) -> String {
        self.form.replace(JOIN_MARKER, "")
    }

    /// The ten columns in canonical order
    pub fn columns(&self) -> [String; 10] {
        [
            self.id.to_string(),
            self.form.clone(),
            self.lemma.clone(),
            self.upos.clone(),
            self.xpos.clone(),
            self.feats.clone(),
            self.head.to_string(),
            self.deprel.clone(),
            self.deps.clone(),
            self.misc.clone(),
        ]
    }
}

/// A dependency tree (sentence)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    pub tokens: Vec<Token>,
    /// Raw comment lines preceding (or interleaved with) the rows
    pub comments: Vec<String>,
    /// Value of a `# text = ...` comment
    pub sentence_text: Option<String>,
    /// Value of a `# treeTokens = ...` or `# sentenceText = ...` comment
    pub tree_tokens: Option<String>,
}

impl Tree {
    /// Create a new empty tree
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            ..Self::default()
        }
    }

    /// Flat tree over bare forms, every token attached to the root
    ///
    /// Used for word-level comparison where only FORM matters.
    pub fn from_forms<S: AsRef<str>>(forms: &[S]) -> Self {
        let tokens = forms
            .iter()
            .enumerate()
            .map(|(i, form)| Token::new(i + 1, form.as_ref(), 0))
            .collect();
        Self::from_tokens(tokens)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Get a token by its 1-based id
    pub fn token(&self, id: usize) -> Option<&Token> {
        id.checked_sub(1).and_then(|i| self.tokens.get(i))
    }

    pub fn forms(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(|t| t.form.as_str())
    }

    /// Number of tokens that were not inserted by the aligner
    pub fn real_token_count(&self) -> usize {
        self.tokens.iter().filter(|t| !t.is_null()).count()
    }

    /// Number of placeholder tokens
    pub fn null_token_count(&self) -> usize {
        self.tokens.len() - self.real_token_count()
    }

    /// Insert a placeholder at 0-based `position` and renumber
    ///
    /// Ids become `1..=n` again. Heads at or past the new token's id move
    /// up by one so they keep pointing at the same governor; heads before
    /// it, root heads and null heads are untouched.
    pub fn insert_null(&mut self, position: usize) {
        let position = position.min(self.tokens.len());
        self.tokens.insert(position, Token::null());

        let inserted_id = (position + 1) as i64;
        for (i, token) in self.tokens.iter_mut().enumerate() {
            token.id = i + 1;
            if i != position && token.head >= inserted_id {
                token.head += 1;
            }
        }
    }

    /// Check that ids run `1..=n` and every real head is `0` or a valid id
    ///
    /// Returns the 1-based id of the first offending token.
    pub fn check_numbering(&self) -> Result<(), usize> {
        let n = self.tokens.len() as i64;
        for (i, token) in self.tokens.iter().enumerate() {
            if token.id != i + 1 {
                return Err(i + 1);
            }
            if !token.is_null() && !(0..=n).contains(&token.head) {
                return Err(i + 1);
            }
        }
        Ok(())
    }

    /// Forms joined by single spaces
    pub fn form_line(&self) -> String {
        self.forms().collect::<Vec<_>>().join(" ")
    }
}

/// All trees read from one source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    pub trees: Vec<Tree>,
}

impl Corpus {
    pub fn new(trees: Vec<Tree>) -> Self {
        Self { trees }
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Tree> {
        self.trees.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tree> {
        self.trees.iter()
    }

    /// Total number of tokens across all trees
    pub fn token_count(&self) -> usize {
        self.trees.iter().map(Tree::len).sum()
    }
}

impl FromIterator<Tree> for Corpus {
    fn from_iter<I: IntoIterator<Item = Tree>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Corpus {
    type Item = &'a Tree;
    type IntoIter = std::slice::Iter<'a, Tree>;

    fn into_iter(self) -> Self::IntoIter {
        self.trees.iter()
    }
}
