use std::io;
use std::iter::Peekable;

use crate::reader::{ReadError, SentenceReader};
use crate::sentence::AnnotatedSentence;

/// A batch of sentences read in one pass.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Chunk {
    pub sentences: Vec<AnnotatedSentence>,

    /// Whether more sentences follow this chunk.
    pub has_next: bool,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    /// Reconstruct CoNLL-U text: metadata and token lines of every
    /// sentence, each sentence followed by a blank line.
    pub fn to_conllu_text(&self) -> String {
        let mut text = String::new();
        for sentence in &self.sentences {
            for line in sentence.conll_lines() {
                text.push_str(&line);
                text.push('\n');
            }
            text.push('\n');
        }
        text
    }

    /// Sentence texts with their part-of-speech tags.
    pub fn text_and_tags(&self) -> TextChunk {
        let mut text_chunk = TextChunk::default();
        for sentence in &self.sentences {
            if !sentence.metadata.is_empty() {
                text_chunk.metadata.push(sentence.metadata.join("\n"));
            }
            text_chunk.sentences.push(sentence.sentence());
            text_chunk.tags.push(
                sentence
                    .pos_tags(false)
                    .into_iter()
                    .map(ToOwned::to_owned)
                    .collect(),
            );
        }
        text_chunk
    }
}

/// Plain text view of a chunk.
///
/// `sentences` and `tags` are parallel. `metadata` only holds entries
/// for sentences that had comment lines.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TextChunk {
    pub sentences: Vec<String>,
    pub tags: Vec<Vec<String>>,
    pub metadata: Vec<String>,
}

/// Reads chunks of at most `chunk_size` sentences.
///
/// After a chunk, blank lines are skipped and the next line is peeked,
/// so that `has_next` is only set when another sentence follows. On a
/// line source that is read as it is produced, a chunk is therefore
/// returned once the first line of the next sentence (or the end of
/// input) is available. A `chunk_size` of 0 reads the whole input as a
/// single chunk.
pub struct ChunkReader<L>
where
    L: Iterator<Item = io::Result<String>>,
{
    reader: SentenceReader,
    lines: Peekable<L>,
    chunk_size: usize,
    finished: bool,
}

impl<L> ChunkReader<L>
where
    L: Iterator<Item = io::Result<String>>,
{
    pub fn new(reader: &SentenceReader, lines: L, chunk_size: usize) -> Self {
        ChunkReader {
            reader: reader.clone(),
            lines: lines.peekable(),
            chunk_size,
            finished: false,
        }
    }

    /// Read the next chunk.
    ///
    /// Once the input is exhausted, this returns empty chunks with
    /// `has_next` unset.
    pub fn next_chunk(&mut self) -> Result<Chunk, ReadError> {
        let (sentences, _) = self.reader.read_chunk(&mut self.lines, self.chunk_size)?;

        Ok(Chunk {
            sentences,
            has_next: self.skip_boundaries(),
        })
    }

    /// Skip lines that separate sentences, returning whether any line
    /// remains.
    fn skip_boundaries(&mut self) -> bool {
        loop {
            let boundary = match self.lines.peek() {
                Some(Ok(line)) => self.reader.is_boundary(line),
                Some(Err(_)) => return true,
                None => return false,
            };

            if !boundary {
                return true;
            }

            self.lines.next();
        }
    }
}

impl<L> Iterator for ChunkReader<L>
where
    L: Iterator<Item = io::Result<String>>,
{
    type Item = Result<Chunk, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.next_chunk() {
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
            Ok(chunk) => {
                self.finished = !chunk.has_next;
                if chunk.is_empty() {
                    None
                } else {
                    Some(Ok(chunk))
                }
            }
        }
    }
}
