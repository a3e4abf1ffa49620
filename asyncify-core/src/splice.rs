//! Text regeneration by span-anchored insertions
//!
//! The rewrite only ever adds tokens (`await`, `async`, parentheses), so the
//! output is the original text with insertions at byte offsets. Everything
//! the rewrite does not touch, comments and line numbers included, is kept
//! byte for byte.

/// One insertion into the original text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insertion {
    pub offset: usize,
    pub text: &'static str,
}

/// Ordered collection of insertions for one file
#[derive(Debug, Default)]
pub struct Splice {
    insertions: Vec<Insertion>,
}

impl Splice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, offset: usize, text: &'static str) {
        self.insertions.push(Insertion { offset, text });
    }

    /// Apply all insertions to `source`
    ///
    /// Insertions at the same offset keep the order they were recorded in.
    pub fn apply(mut self, source: &str) -> String {
        // Stable sort keeps recording order for equal offsets
        self.insertions.sort_by_key(|i| i.offset);

        let extra: usize = self.insertions.iter().map(|i| i.text.len()).sum();
        let mut out = String::with_capacity(source.len() + extra);
        let mut cursor = 0;
        for insertion in &self.insertions {
            let offset = insertion.offset.min(source.len());
            out.push_str(&source[cursor..offset]);
            out.push_str(insertion.text);
            cursor = offset;
        }
        out.push_str(&source[cursor..]);
        out
    }
}
