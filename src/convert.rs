use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::chunks::{Chunk, ChunkReader};
use crate::reader::SentenceReader;
use crate::token::Dialect;

/// Lines of a corpus.
pub type Lines = Box<dyn Iterator<Item = io::Result<String>>>;

/// Open the lines of `input`, or of standard input when no file or `-`
/// is given.
pub fn open_lines(input: Option<&str>) -> Result<Lines> {
    match input {
        None | Some("-") => Ok(Box::new(io::stdin().lock().lines())),
        Some(path) => {
            let f = File::open(path).with_context(|| format!("Cannot open input: {}", path))?;
            Ok(Box::new(BufReader::new(f).lines()))
        }
    }
}

/// Output format of corpus conversion.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OutputFormat {
    /// Canonical CoNLL-U.
    Conllu,

    /// The native CoNLL09 column layout.
    Conll09,

    /// One sentence per line.
    Text,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "conllu" => Ok(OutputFormat::Conllu),
            "conll09" => Ok(OutputFormat::Conll09),
            "text" => Ok(OutputFormat::Text),
            _ => bail!("Unknown output format: {}", s),
        }
    }
}

/// Convert a corpus, returning the number of sentences written.
///
/// In the text format, the part-of-speech tags of each sentence are
/// written to `tags` when it is given.
pub fn convert<L, W>(
    reader: &SentenceReader,
    lines: L,
    chunk_size: usize,
    format: OutputFormat,
    writer: W,
    tags: Option<&mut dyn Write>,
) -> Result<usize>
where
    L: Iterator<Item = io::Result<String>>,
    W: Write,
{
    match format {
        OutputFormat::Conllu => write_conllu(reader, lines, chunk_size, writer),
        OutputFormat::Conll09 => write_conll09(reader, lines, writer),
        OutputFormat::Text => write_text(reader, lines, chunk_size, writer, tags),
    }
}

fn write_conllu<L, W>(
    reader: &SentenceReader,
    lines: L,
    chunk_size: usize,
    mut writer: W,
) -> Result<usize>
where
    L: Iterator<Item = io::Result<String>>,
    W: Write,
{
    let mut n_sents = 0;
    for chunk in ChunkReader::new(reader, lines, chunk_size) {
        let chunk = chunk?;
        writer.write_all(chunk.to_conllu_text().as_bytes())?;
        n_sents += chunk.len();
        log::debug!("Wrote {} sentences", n_sents);
    }
    writer.flush()?;

    Ok(n_sents)
}

fn write_conll09<L, W>(reader: &SentenceReader, lines: L, mut writer: W) -> Result<usize>
where
    L: Iterator<Item = io::Result<String>>,
    W: Write,
{
    if reader.dialect() != Dialect::Conll09 {
        bail!(
            "CoNLL09 output requires {} input, got {}",
            Dialect::Conll09,
            reader.dialect()
        );
    }

    let mut n_sents = 0;
    for sentence in reader.sentences(lines) {
        let sentence = sentence?;
        for line in &sentence.metadata {
            writeln!(writer, "{}", line)?;
        }
        for token in &sentence.tokens {
            writeln!(writer, "{}", token.conll09_line())?;
        }
        writeln!(writer)?;
        n_sents += 1;
    }
    writer.flush()?;

    Ok(n_sents)
}

fn write_text<L, W>(
    reader: &SentenceReader,
    mut lines: L,
    chunk_size: usize,
    mut writer: W,
    mut tags: Option<&mut dyn Write>,
) -> Result<usize>
where
    L: Iterator<Item = io::Result<String>>,
    W: Write,
{
    let mut n_sents = 0;
    loop {
        let (sentences, n_read) = reader.read_chunk(&mut lines, chunk_size)?;
        let chunk = Chunk {
            sentences,
            has_next: chunk_size > 0 && n_read == chunk_size,
        };

        let text = chunk.text_and_tags();
        for (sentence, sentence_tags) in text.sentences.iter().zip(&text.tags) {
            writeln!(writer, "{}", sentence)?;
            if let Some(tags) = tags.as_mut() {
                writeln!(tags, "{}", sentence_tags.join(" "))?;
            }
        }
        n_sents += n_read;

        if !chunk.has_next {
            break;
        }
    }

    writer.flush()?;
    if let Some(tags) = tags.as_mut() {
        tags.flush()?;
    }

    Ok(n_sents)
}
