use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{bail, Context, Result};
use thiserror::Error;

/// Coarse word classes used for lemma lookup.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CoarsePos {
    Adj,
    Noun,
    Adv,
    Verb,
    Unknown,
}

impl CoarsePos {
    /// Map a fine-grained STTS tag to its coarse class.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "ADJA" | "ADJD" => CoarsePos::Adj,
            "NA" | "NE" | "NN" => CoarsePos::Noun,
            "ADV" | "PAV" | "PROAV" | "PAVREL" | "PWAV" | "PWAVREL" => CoarsePos::Adv,
            "VAFIN" | "VAIMP" | "VAINF" | "VAPP" | "VMFIN" | "VMINF" | "VMPP" | "VVFIN"
            | "VVIMP" | "VVINF" | "VVIZU" | "VVPP" => CoarsePos::Verb,
            _ => CoarsePos::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CoarsePos::Adj => "ADJ",
            CoarsePos::Noun => "N",
            CoarsePos::Adv => "ADV",
            CoarsePos::Verb => "V",
            CoarsePos::Unknown => "UNK",
        }
    }

    fn from_class(class: &str) -> Option<Self> {
        match class {
            "ADJ" => Some(CoarsePos::Adj),
            "N" => Some(CoarsePos::Noun),
            "ADV" => Some(CoarsePos::Adv),
            "V" => Some(CoarsePos::Verb),
            _ => None,
        }
    }
}

impl fmt::Display for CoarsePos {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum LemmatizeError {
    #[error("word class {0} is not supported")]
    UnsupportedPos(CoarsePos),

    #[error("no lemma for `{word}` ({pos})")]
    UnknownWord { word: String, pos: CoarsePos },
}

/// A secondary lemmatizer.
pub trait Lemmatize: Send + Sync {
    fn find_lemma(&self, word: &str, pos: CoarsePos) -> Result<String, LemmatizeError>;
}

/// Pick the lemma for a token: the secondary lemmatizer's lemma when it
/// has one, the pipeline's lemma otherwise.
pub fn lemma_or<'a>(
    lemmatizer: Option<&dyn Lemmatize>,
    word: &str,
    tag: &str,
    pipeline_lemma: &'a str,
) -> std::borrow::Cow<'a, str> {
    match lemmatizer.map(|lemmatizer| lemmatizer.find_lemma(word, CoarsePos::from_tag(tag))) {
        Some(Ok(lemma)) => lemma.into(),
        Some(Err(err)) => {
            log::trace!("Keeping pipeline lemma: {}", err);
            pipeline_lemma.into()
        }
        None => pipeline_lemma.into(),
    }
}

/// Lexicon-based lemmatizer.
///
/// The lexicon is a tab-separated file with the columns form, coarse
/// word class (`ADJ`, `N`, `ADV`, or `V`), and lemma. Lookups first try
/// the form as is and then its lowercased variant.
#[derive(Debug, Default)]
pub struct LexiconLemmatizer {
    entries: HashMap<(CoarsePos, String), String>,
}

impl LexiconLemmatizer {
    pub fn from_buf_read<R>(read: R) -> Result<Self>
    where
        R: BufRead,
    {
        let mut entries = HashMap::new();

        for (idx, line) in read.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let fields: Vec<_> = line.split('\t').collect();
            if fields.len() != 3 {
                bail!(
                    "Lexicon line {} has {} columns, expected 3",
                    idx + 1,
                    fields.len()
                );
            }

            let pos = match CoarsePos::from_class(fields[1]) {
                Some(pos) => pos,
                None => bail!("Unknown word class `{}` on line {}", fields[1], idx + 1),
            };

            entries.insert((pos, fields[0].to_owned()), fields[2].to_owned());
        }

        Ok(LexiconLemmatizer { entries })
    }

    pub fn load<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let f = File::open(path)
            .with_context(|| format!("Cannot open lexicon: {}", path.to_string_lossy()))?;
        let lemmatizer = Self::from_buf_read(BufReader::new(f))
            .with_context(|| format!("Cannot read lexicon: {}", path.to_string_lossy()))?;

        log::info!("Loaded lemmatizer lexicon: {} entries", lemmatizer.len());

        Ok(lemmatizer)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Lemmatize for LexiconLemmatizer {
    fn find_lemma(&self, word: &str, pos: CoarsePos) -> Result<String, LemmatizeError> {
        if pos == CoarsePos::Unknown {
            return Err(LemmatizeError::UnsupportedPos(pos));
        }

        self.entries
            .get(&(pos, word.to_owned()))
            .or_else(|| self.entries.get(&(pos, word.to_lowercase())))
            .cloned()
            .ok_or_else(|| LemmatizeError::UnknownWord {
                word: word.to_owned(),
                pos,
            })
    }
}
