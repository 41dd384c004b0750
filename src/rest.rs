use async_trait::async_trait;
use conllu::io::{ReadSentence, Reader};
use surf::{Client, Url};
use udgraph::graph::{Node, Sentence};

use crate::annotator::{Annotate, AnnotateError, AnnotatedToken, Components};

/// Form sent for sentences without tokens.
const EMPTY_SENTENCE_FORM: &str = "_EMPTY_";

/// Annotator that sends sentences to a CoNLL-U parser server.
///
/// Sentences are posted as pre-tokenized CoNLL-U, one token per line
/// and sentences separated by a blank line. The server answers with
/// the annotated CoNLL-U. Shallow requests are marked with the query
/// `parse=false`.
pub struct RestAnnotator {
    client: Client,
    url: Url,
}

impl RestAnnotator {
    pub fn new(url: &str) -> anyhow::Result<Self> {
        Ok(RestAnnotator {
            client: Client::new(),
            url: Url::parse(url)?,
        })
    }

    async fn request<S>(
        &self,
        texts: &[S],
        components: Components,
    ) -> Result<Vec<Vec<AnnotatedToken>>, AnnotateError>
    where
        S: AsRef<str> + Sync,
    {
        let mut url = self.url.clone();
        if components == Components::Shallow {
            url.query_pairs_mut().append_pair("parse", "false");
        }

        let mut response = self
            .client
            .post(url)
            .body(request_body(texts))
            .await
            .map_err(|err| AnnotateError::Request(err.to_string()))?;

        if !response.status().is_success() {
            return Err(AnnotateError::Status(response.status() as u16));
        }

        let body = response
            .body_string()
            .await
            .map_err(|err| AnnotateError::Request(err.to_string()))?;

        let annotations = read_annotations(&body)?;
        if annotations.len() != texts.len() {
            return Err(AnnotateError::BatchLength {
                expected: texts.len(),
                actual: annotations.len(),
            });
        }

        Ok(annotations)
    }
}

#[async_trait]
impl Annotate for RestAnnotator {
    fn description(&self) -> String {
        format!("CoNLL-U parser server at {}", self.url)
    }

    async fn annotate(
        &self,
        text: &str,
        components: Components,
    ) -> Result<Vec<AnnotatedToken>, AnnotateError> {
        let mut annotations = self.request(&[text], components).await?;
        Ok(annotations.remove(0))
    }

    async fn annotate_batch(
        &self,
        texts: &[String],
        batch_size: usize,
        components: Components,
    ) -> Result<Vec<Vec<AnnotatedToken>>, AnnotateError> {
        let mut annotations = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size.max(1)) {
            annotations.extend(self.request(batch, components).await?);
        }
        Ok(annotations)
    }
}

/// Encode pre-tokenized sentences as CoNLL-U with empty annotations.
fn request_body<S>(texts: &[S]) -> String
where
    S: AsRef<str>,
{
    let mut body = String::new();
    for text in texts {
        let mut forms = text.as_ref().split_whitespace().peekable();
        if forms.peek().is_none() {
            push_token_line(&mut body, 1, EMPTY_SENTENCE_FORM);
        }
        for (idx, form) in forms.enumerate() {
            push_token_line(&mut body, idx + 1, form);
        }
        body.push('\n');
    }
    body
}

fn push_token_line(body: &mut String, id: usize, form: &str) {
    body.push_str(&id.to_string());
    body.push('\t');
    body.push_str(form);
    body.push_str("\t_\t_\t_\t_\t_\t_\t_\t_\n");
}

/// Read the sentences of a CoNLL-U response.
fn read_annotations(conllu: &str) -> Result<Vec<Vec<AnnotatedToken>>, AnnotateError> {
    Reader::new(conllu.as_bytes())
        .sentences()
        .map(|sentence| {
            sentence
                .map(|sentence| sentence_annotations(&sentence))
                .map_err(|err| AnnotateError::Format(err.to_string()))
        })
        .collect()
}

fn sentence_annotations(sentence: &Sentence) -> Vec<AnnotatedToken> {
    let dep_graph = sentence.dep_graph();

    sentence
        .iter()
        .filter_map(Node::token)
        .enumerate()
        .map(|(idx, token)| {
            // Node 0 is the artificial root.
            let triple = dep_graph.head(idx + 1);
            let head = triple
                .as_ref()
                .map(|triple| triple.head())
                .filter(|&head| head > 0)
                .map(|head| head - 1);
            let dep = triple
                .as_ref()
                .and_then(|triple| triple.relation())
                .unwrap_or_default()
                .to_owned();

            AnnotatedToken {
                text: token.form().to_owned(),
                lemma: token.lemma().unwrap_or_default().to_owned(),
                pos: token.upos().unwrap_or_default().to_owned(),
                tag: token.xpos().unwrap_or_default().to_owned(),
                morph: token
                    .features()
                    .iter()
                    .map(|(feature, value)| (feature.clone(), value.clone()))
                    .collect(),
                head,
                dep,
            }
        })
        .collect()
}
