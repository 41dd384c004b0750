use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_std::task;
use async_trait::async_trait;

use crate::annotator::{Annotate, AnnotateError, AnnotatedToken, Components};

/// In-memory annotator with scripted failures.
///
/// Every word is tagged as a singular nominative noun. Full annotation
/// attaches all words to the first word, which is the root.
#[derive(Default)]
pub struct ScriptedAnnotator {
    /// Sentences whose full annotation never finishes in time.
    pub slow: HashSet<String>,

    /// Sentences whose full annotation blocks the thread past any budget.
    pub blocking: HashSet<String>,

    /// Sentences whose full annotation fails.
    pub failing_full: HashSet<String>,

    /// Sentences that cannot be annotated at all.
    pub failing: HashSet<String>,

    /// Fail every batch call.
    pub fail_batch: bool,

    pub calls: Mutex<Vec<(String, Components)>>,
}

impl ScriptedAnnotator {
    pub fn calls(&self) -> Vec<(String, Components)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Annotate for ScriptedAnnotator {
    fn description(&self) -> String {
        "scripted".to_owned()
    }

    async fn annotate(
        &self,
        text: &str,
        components: Components,
    ) -> Result<Vec<AnnotatedToken>, AnnotateError> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_owned(), components));

        if self.failing.contains(text) {
            return Err(AnnotateError::Failed(format!("cannot annotate `{}`", text)));
        }

        if components == Components::Full {
            if self.failing_full.contains(text) {
                return Err(AnnotateError::Failed("parser crashed".to_owned()));
            }
            if self.slow.contains(text) {
                task::sleep(Duration::from_secs(10)).await;
            }
            if self.blocking.contains(text) {
                std::thread::sleep(Duration::from_millis(300));
            }
        }

        let morph: BTreeMap<_, _> = vec![
            ("Number".to_owned(), "Sing".to_owned()),
            ("Case".to_owned(), "Nom".to_owned()),
        ]
        .into_iter()
        .collect();

        Ok(text
            .split_whitespace()
            .enumerate()
            .map(|(idx, word)| {
                let (head, dep) = match (components, idx) {
                    (Components::Full, 0) => (None, "ROOT"),
                    (Components::Full, _) => (Some(0), "nk"),
                    (Components::Shallow, _) => (None, ""),
                };
                AnnotatedToken {
                    text: word.to_owned(),
                    lemma: word.to_lowercase(),
                    pos: "NOUN".to_owned(),
                    tag: "NN".to_owned(),
                    morph: morph.clone(),
                    head,
                    dep: dep.to_owned(),
                }
            })
            .collect())
    }

    async fn annotate_batch(
        &self,
        texts: &[String],
        _batch_size: usize,
        components: Components,
    ) -> Result<Vec<Vec<AnnotatedToken>>, AnnotateError> {
        if self.fail_batch {
            return Err(AnnotateError::Failed("batch failed".to_owned()));
        }

        let mut annotations = Vec::with_capacity(texts.len());
        for text in texts {
            annotations.push(self.annotate(text, components).await?);
        }
        Ok(annotations)
    }
}
