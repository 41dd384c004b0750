use std::collections::BTreeMap;
use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;

/// Annotation components that an annotator should run.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Components {
    /// Tagging, morphology, lemmatization, and dependency parsing.
    Full,

    /// Full minus dependency parsing and named entity recognition.
    Shallow,
}

/// A token as annotated by an external pipeline.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AnnotatedToken {
    pub text: String,
    pub lemma: String,

    /// Coarse (universal) part-of-speech.
    pub pos: String,

    /// Fine-grained part-of-speech tag.
    pub tag: String,

    pub morph: BTreeMap<String, String>,

    /// Index of the governor in the annotated sentence, `None` for the
    /// root or when no parse is available.
    pub head: Option<usize>,

    pub dep: String,
}

impl AnnotatedToken {
    /// Construct a token that only has a surface form.
    pub fn new(text: impl Into<String>) -> Self {
        AnnotatedToken {
            text: text.into(),
            ..AnnotatedToken::default()
        }
    }
}

#[derive(Debug, Error)]
pub enum AnnotateError {
    #[error("annotation request failed: {0}")]
    Request(String),

    #[error("annotator responded with status {0}")]
    Status(u16),

    #[error("cannot read annotations: {0}")]
    Format(String),

    #[error("expected {expected} annotated sentences, got {actual}")]
    BatchLength { expected: usize, actual: usize },

    #[error("{0}")]
    Failed(String),
}

/// An external annotation pipeline.
///
/// Implementations receive pre-tokenized text (tokens separated by
/// whitespace) and must not retokenize it. Annotation futures should
/// yield regularly, since an annotation that exceeds its time budget is
/// cancelled by dropping its future.
#[async_trait]
pub trait Annotate: Send + Sync {
    /// Human-readable description of the annotator.
    fn description(&self) -> String;

    /// Annotate a single sentence.
    async fn annotate(
        &self,
        text: &str,
        components: Components,
    ) -> Result<Vec<AnnotatedToken>, AnnotateError>;

    /// Annotate sentences in batches of `batch_size`.
    ///
    /// The result contains one annotated sentence per input sentence,
    /// in input order.
    async fn annotate_batch(
        &self,
        texts: &[String],
        _batch_size: usize,
        components: Components,
    ) -> Result<Vec<Vec<AnnotatedToken>>, AnnotateError> {
        let mut annotations = Vec::with_capacity(texts.len());
        for text in texts {
            annotations.push(self.annotate(text, components).await?);
        }
        Ok(annotations)
    }
}

/// Result of a call with a time budget.
#[derive(Debug, Eq, PartialEq)]
pub enum Bounded<T> {
    Completed(T),
    TimedOut,
}

/// Run `future` for at most `budget`.
///
/// When the budget is exhausted the future is dropped, which cancels
/// it. The timer is owned by this call and never outlives it.
///
/// A future that blocks instead of yielding cannot be interrupted. Its
/// value is discarded when it completes after the budget.
pub async fn bounded<F, T>(budget: Duration, future: F) -> Bounded<T>
where
    F: Future<Output = T>,
{
    let started = Instant::now();
    match async_std::future::timeout(budget, future).await {
        Ok(value) if started.elapsed() <= budget => Bounded::Completed(value),
        _ => Bounded::TimedOut,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_std::task;

    use super::{bounded, Annotate, Bounded, Components};
    use crate::testing::ScriptedAnnotator;

    #[async_std::test]
    async fn bounded_completes_within_budget() {
        let result = bounded(Duration::from_millis(500), async { 42 }).await;
        assert_eq!(result, Bounded::Completed(42));
    }

    #[async_std::test]
    async fn bounded_times_out() {
        let result = bounded(Duration::from_millis(10), async {
            task::sleep(Duration::from_secs(5)).await;
            42
        })
        .await;
        assert_eq!(result, Bounded::TimedOut);
    }

    #[async_std::test]
    async fn bounded_discards_late_blocking_result() {
        let result = bounded(Duration::from_millis(20), async {
            std::thread::sleep(Duration::from_millis(100));
            42
        })
        .await;
        assert_eq!(result, Bounded::TimedOut);
    }

    #[async_std::test]
    async fn batch_annotation_keeps_order() {
        let annotator = ScriptedAnnotator::default();
        let texts = vec!["Der Hund".to_owned(), "bellt".to_owned()];
        let annotations = annotator
            .annotate_batch(&texts, 1, Components::Shallow)
            .await
            .unwrap();

        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations[0][1].text, "Hund");
        assert_eq!(annotations[1][0].text, "bellt");
    }
}
