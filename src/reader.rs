use std::io;
use std::mem;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::sentence::AnnotatedSentence;
use crate::token::{Dialect, ParseError};

static FOUNDRY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(foundry\s*=\s*).*").expect("invalid foundry pattern"));

static FILENAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(filename\s*=\s* .[^/]*/[^/]+/[^/]+/).*").expect("invalid filename pattern")
});

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("cannot read line: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Rewrites provenance fields of comment lines to name our foundry.
#[derive(Clone, Debug)]
pub struct MetadataRewriter {
    foundry: String,
    morpho: String,
}

impl MetadataRewriter {
    pub fn new(foundry: impl Into<String>) -> Self {
        let foundry = foundry.into();
        let morpho = format!("{}/morpho.xml", foundry);
        MetadataRewriter { foundry, morpho }
    }

    /// Rewrite `foundry = ...` and `filename = .../a/b/...` values.
    ///
    /// Everything up to and including the matched key is kept verbatim.
    pub fn rewrite(&self, line: &str) -> String {
        let line = FOUNDRY_RE.replace_all(line, |caps: &regex::Captures| {
            format!("{}{}", &caps[1], self.foundry)
        });
        FILENAME_RE
            .replace_all(&line, |caps: &regex::Captures| {
                format!("{}{}", &caps[1], self.morpho)
            })
            .into_owned()
    }
}

/// Lines of the sentence that is currently being read.
#[derive(Debug, Default)]
struct Buffers {
    metadata: Vec<String>,
    tokens: Vec<String>,
}

/// Groups lines into sentences.
///
/// Comment lines become sentence metadata, other non-blank lines are
/// parsed as tokens of the configured dialect, and blank lines end a
/// sentence.
#[derive(Clone, Debug)]
pub struct SentenceReader {
    comment_prefix: String,
    dialect: Dialect,
    rewriter: MetadataRewriter,
    separator: Option<String>,
}

impl SentenceReader {
    pub fn new(dialect: Dialect, comment_prefix: impl Into<String>, foundry: &str) -> Self {
        SentenceReader {
            comment_prefix: comment_prefix.into(),
            dialect,
            rewriter: MetadataRewriter::new(foundry),
            separator: None,
        }
    }

    /// Also end sentences on lines that contain `separator`.
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = Some(separator.into());
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Lazily read the sentences of a line source.
    pub fn sentences<L>(&self, lines: L) -> Sentences<L>
    where
        L: Iterator<Item = io::Result<String>>,
    {
        Sentences {
            buffers: Buffers::default(),
            exhausted: false,
            lines,
            reader: self.clone(),
        }
    }

    /// Read at most `chunk_size` sentences, all sentences if
    /// `chunk_size` is 0.
    ///
    /// Returns the sentences and their number.
    pub fn read_chunk<L>(
        &self,
        lines: &mut L,
        chunk_size: usize,
    ) -> Result<(Vec<AnnotatedSentence>, usize), ReadError>
    where
        L: Iterator<Item = io::Result<String>>,
    {
        let mut buffers = Buffers::default();
        let mut sentences = Vec::new();

        while chunk_size == 0 || sentences.len() < chunk_size {
            let line = match lines.next() {
                Some(line) => line?,
                None => {
                    sentences.extend(self.flush(&mut buffers)?);
                    break;
                }
            };

            if let Some(sentence) = self.push_line(&mut buffers, &line)? {
                sentences.push(sentence);
            }
        }

        let n_sents = sentences.len();
        Ok((sentences, n_sents))
    }

    fn push_line(
        &self,
        buffers: &mut Buffers,
        line: &str,
    ) -> Result<Option<AnnotatedSentence>, ParseError> {
        let line = line.trim_end_matches(|c: char| c == '\n' || c == '\r');
        let is_comment = line.starts_with(&self.comment_prefix);

        if is_comment {
            buffers.metadata.push(self.rewriter.rewrite(line));
        }

        // A separator ends the sentence, even on a comment line.
        if self.at_separator(line) {
            return self.flush(buffers);
        }

        if is_comment {
            Ok(None)
        } else if line.split_whitespace().next().is_some() {
            buffers.tokens.push(line.to_owned());
            Ok(None)
        } else {
            self.flush(buffers)
        }
    }

    fn at_separator(&self, line: &str) -> bool {
        self.separator
            .as_ref()
            .map(|sep| line.contains(sep.as_str()))
            .unwrap_or(false)
    }

    /// Whether `line` only ends a sentence, without contributing to one.
    ///
    /// Between sentences, such lines are skipped.
    pub(crate) fn is_boundary(&self, line: &str) -> bool {
        !line.starts_with(&self.comment_prefix)
            && (line.split_whitespace().next().is_none() || self.at_separator(line))
    }

    fn flush(&self, buffers: &mut Buffers) -> Result<Option<AnnotatedSentence>, ParseError> {
        if buffers.tokens.is_empty() && buffers.metadata.is_empty() {
            return Ok(None);
        }

        let metadata = mem::take(&mut buffers.metadata);
        let tokens = mem::take(&mut buffers.tokens)
            .iter()
            .enumerate()
            .map(|(position, line)| self.dialect.parse(line, position))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(AnnotatedSentence::new(metadata, tokens)))
    }
}

/// Iterator over the sentences of a line source.
pub struct Sentences<L> {
    buffers: Buffers,
    exhausted: bool,
    lines: L,
    reader: SentenceReader,
}

impl<L> Iterator for Sentences<L>
where
    L: Iterator<Item = io::Result<String>>,
{
    type Item = Result<AnnotatedSentence, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        let Sentences {
            buffers,
            exhausted,
            lines,
            reader,
        } = self;

        while !*exhausted {
            let result = match lines.next() {
                Some(Ok(line)) => reader.push_line(buffers, &line),
                Some(Err(err)) => return Some(Err(err.into())),
                None => {
                    *exhausted = true;
                    reader.flush(buffers)
                }
            };

            match result {
                Ok(Some(sentence)) => return Some(Ok(sentence)),
                Ok(None) => continue,
                Err(err) => return Some(Err(err.into())),
            }
        }

        None
    }
}

#[cfg(test)]
pub(crate) fn lines(text: &str) -> impl Iterator<Item = io::Result<String>> + '_ {
    text.lines().map(|line| Ok::<_, io::Error>(line.to_owned()))
}
