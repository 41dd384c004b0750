use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::annotator::{bounded, Annotate, AnnotateError, AnnotatedToken, Bounded, Components};
use crate::chunks::{Chunk, ChunkReader};
use crate::config::Config;
use crate::lemmatizer::Lemmatize;
use crate::render::render_sentence;

/// Input that is annotated in place of a sentence that cannot be annotated.
const PLACEHOLDER_TEXT: &str = "ERROR";

/// Number of characters of a failing sentence that are logged.
const PREVIEW_CHARS: usize = 100;

/// Limits and modes of the annotation pipeline.
#[derive(Clone, Debug)]
pub struct Settings {
    pub parse_timeout: Duration,
    pub max_sentence_length: usize,
    pub batch_size: usize,
    pub use_dependencies: bool,
}

impl Settings {
    pub fn from_config(config: &Config) -> Self {
        Settings {
            parse_timeout: config.parse_timeout(),
            max_sentence_length: config.max_sentence_length,
            batch_size: config.batch_size,
            use_dependencies: config.use_dependencies,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings::from_config(&Config::default())
    }
}

/// How the annotation of a sentence with dependencies ended.
#[derive(Debug)]
pub enum ParseOutcome {
    Parsed,
    TooLong { tokens: usize },
    TimedOut,
    Failed(AnnotateError),
}

impl ParseOutcome {
    pub fn dependency_success(&self) -> bool {
        matches!(self, ParseOutcome::Parsed)
    }

    fn warning(&self) -> Option<String> {
        match self {
            ParseOutcome::Parsed => None,
            ParseOutcome::TooLong { tokens } => Some(format!(
                "Sentence too long ({} tokens), annotated without dependencies",
                tokens
            )),
            ParseOutcome::TimedOut => {
                Some("Parsing timed out, annotated without dependencies".to_owned())
            }
            ParseOutcome::Failed(err) => Some(format!(
                "Parsing failed ({}), annotated without dependencies",
                err
            )),
        }
    }
}

/// Counters of one annotation run.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RunStats {
    pub sentences: usize,
    pub too_long: usize,
    pub timed_out: usize,
    pub failed: usize,
    pub batch_failures: usize,
    pub placeholders: usize,
}

impl RunStats {
    /// Sentences that were annotated without dependencies.
    pub fn warnings(&self) -> usize {
        self.too_long + self.timed_out + self.failed
    }

    fn record(&mut self, outcome: &ParseOutcome) {
        match outcome {
            ParseOutcome::Parsed => (),
            ParseOutcome::TooLong { .. } => self.too_long += 1,
            ParseOutcome::TimedOut => self.timed_out += 1,
            ParseOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Logging and statistics context of a single run.
pub struct RunContext {
    corpus_name: String,
    started: Instant,
    stats: RunStats,
}

impl RunContext {
    pub fn new(corpus_name: impl Into<String>) -> Self {
        RunContext {
            corpus_name: corpus_name.into(),
            started: Instant::now(),
            stats: RunStats::default(),
        }
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    fn log_progress(&self) {
        let elapsed = self.started.elapsed().as_secs_f64();
        log::info!(
            "{}: processed {} sentences in {:.2}s ({:.2} sents/sec)",
            self.corpus_name,
            self.stats.sentences,
            elapsed,
            sentences_per_second(self.stats.sentences, elapsed)
        );
    }

    fn log_summary(&self) {
        let elapsed = self.started.elapsed().as_secs_f64();
        let stats = &self.stats;

        log::info!("=== Processing Complete ===");
        log::info!("Corpus: {}", self.corpus_name);
        log::info!("Total sentences: {}", stats.sentences);
        log::info!("Total time: {:.2}s", elapsed);
        log::info!(
            "Average speed: {:.2} sents/sec",
            sentences_per_second(stats.sentences, elapsed)
        );
        log::info!(
            "Sentences annotated without dependencies: {} (too long: {}, timed out: {}, failed: {})",
            stats.warnings(),
            stats.too_long,
            stats.timed_out,
            stats.failed
        );

        if stats.batch_failures > 0 || stats.placeholders > 0 {
            log::warn!(
                "Failed batches: {}, placeholder sentences: {}",
                stats.batch_failures,
                stats.placeholders
            );
        }
    }
}

fn sentences_per_second(sentences: usize, elapsed: f64) -> f64 {
    if elapsed > 0.0 {
        sentences as f64 / elapsed
    } else {
        0.0
    }
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

/// Annotates chunks of sentences and renders them as CoNLL-U.
///
/// Every input sentence yields exactly one CoNLL-U block. Sentences
/// that cannot be parsed within the limits are annotated without
/// dependencies, sentences that cannot be annotated at all get a
/// placeholder annotation.
pub struct Pipeline {
    annotator: Arc<dyn Annotate>,
    lemmatizer: Option<Arc<dyn Lemmatize>>,
    settings: Settings,
    context: RunContext,
}

impl Pipeline {
    pub fn new(
        annotator: Arc<dyn Annotate>,
        lemmatizer: Option<Arc<dyn Lemmatize>>,
        settings: Settings,
        context: RunContext,
    ) -> Self {
        Pipeline {
            annotator,
            lemmatizer,
            settings,
            context,
        }
    }

    pub fn stats(&self) -> &RunStats {
        self.context.stats()
    }

    /// Annotate a sentence with dependencies, falling back to shallow
    /// annotation.
    pub async fn safe_parse(&mut self, text: &str) -> (Vec<AnnotatedToken>, ParseOutcome) {
        let n_tokens = text.split_whitespace().count();
        let outcome = if n_tokens > self.settings.max_sentence_length {
            ParseOutcome::TooLong { tokens: n_tokens }
        } else {
            match bounded(
                self.settings.parse_timeout,
                self.annotator.annotate(text, Components::Full),
            )
            .await
            {
                Bounded::Completed(Ok(tokens)) => return (tokens, ParseOutcome::Parsed),
                Bounded::Completed(Err(err)) => ParseOutcome::Failed(err),
                Bounded::TimedOut => ParseOutcome::TimedOut,
            }
        };

        self.context.stats.record(&outcome);
        if let Some(warning) = outcome.warning() {
            log::warn!("{}: {}", warning, preview(text));
        }

        let tokens = match self.annotator.annotate(text, Components::Shallow).await {
            Ok(tokens) => tokens,
            Err(err) => {
                log::error!("Shallow annotation failed: {}", err);
                log::error!("Sentence preview: {}...", preview(text));
                self.context.stats.placeholders += 1;
                vec![AnnotatedToken::new(PLACEHOLDER_TEXT)]
            }
        };

        (tokens, outcome)
    }

    /// Annotate and render every sentence of a chunk, in order.
    pub async fn annotate_chunk(&mut self, chunk: &Chunk) -> Vec<String> {
        let blocks = if self.settings.use_dependencies {
            self.annotate_with_dependencies(chunk).await
        } else {
            self.annotate_batched(chunk).await
        };

        self.context.stats.sentences += chunk.len();

        blocks
    }

    async fn annotate_with_dependencies(&mut self, chunk: &Chunk) -> Vec<String> {
        let mut blocks = Vec::with_capacity(chunk.len());
        for sentence in &chunk.sentences {
            let (tokens, outcome) = self.safe_parse(&sentence.sentence()).await;
            blocks.push(render_sentence(
                sentence,
                &tokens,
                outcome.dependency_success(),
                self.lemmatizer.as_deref(),
            ));
        }
        blocks
    }

    async fn annotate_batched(&mut self, chunk: &Chunk) -> Vec<String> {
        let texts: Vec<String> = chunk.sentences.iter().map(|s| s.sentence()).collect();

        let annotations = match self
            .annotator
            .annotate_batch(&texts, self.settings.batch_size, Components::Shallow)
            .await
        {
            Ok(annotations) if annotations.len() == texts.len() => annotations,
            Ok(annotations) => {
                let err = AnnotateError::BatchLength {
                    expected: texts.len(),
                    actual: annotations.len(),
                };
                self.sentence_fallback(&texts, err).await
            }
            Err(err) => self.sentence_fallback(&texts, err).await,
        };

        chunk
            .sentences
            .iter()
            .zip(&annotations)
            .map(|(sentence, tokens)| {
                render_sentence(sentence, tokens, false, self.lemmatizer.as_deref())
            })
            .collect()
    }

    async fn sentence_fallback(
        &mut self,
        texts: &[String],
        err: AnnotateError,
    ) -> Vec<Vec<AnnotatedToken>> {
        log::error!("Batch processing failed: {}", err);
        log::info!("Falling back to sentence-by-sentence processing");
        self.context.stats.batch_failures += 1;

        let mut annotations = Vec::with_capacity(texts.len());
        for text in texts {
            let tokens = match self.annotator.annotate(text, Components::Shallow).await {
                Ok(tokens) => tokens,
                Err(err) => {
                    log::error!("Failed to process sentence: {}", err);
                    log::error!("Sentence preview: {}...", preview(text));
                    self.placeholder().await
                }
            };
            annotations.push(tokens);
        }
        annotations
    }

    async fn placeholder(&mut self) -> Vec<AnnotatedToken> {
        self.context.stats.placeholders += 1;
        match self
            .annotator
            .annotate(PLACEHOLDER_TEXT, Components::Shallow)
            .await
        {
            Ok(tokens) => tokens,
            Err(_) => vec![AnnotatedToken::new(PLACEHOLDER_TEXT)],
        }
    }

    /// Annotate all chunks and write the CoNLL-U blocks to `writer`.
    pub async fn run<L, W>(&mut self, chunks: ChunkReader<L>, mut writer: W) -> Result<RunStats>
    where
        L: Iterator<Item = io::Result<String>>,
        W: Write,
    {
        for chunk in chunks {
            let chunk = chunk.context("Cannot read input chunk")?;

            for block in self.annotate_chunk(&chunk).await {
                writer.write_all(block.as_bytes())?;
                writer.write_all(b"\n\n")?;
            }
            writer.flush()?;

            self.context.log_progress();
        }

        self.context.log_summary();

        Ok(self.context.stats.clone())
    }
}
