//! CoNLL-U rendering of annotated sentences.

use std::collections::BTreeMap;

use crate::annotator::AnnotatedToken;
use crate::lemmatizer::{lemma_or, Lemmatize};
use crate::sentence::AnnotatedSentence;
use crate::token::EMPTY;

/// Relation that marks the root in annotators that attach the root to
/// itself.
const ROOT_RELATION: &str = "ROOT";

/// Format morphological features as `Feature=Value|Feature2=Value2`,
/// sorted by feature name.
pub fn morph_features(morph: &BTreeMap<String, String>) -> String {
    if morph.is_empty() {
        return EMPTY.to_owned();
    }

    morph
        .iter()
        .map(|(feature, value)| format!("{}={}", feature, value))
        .collect::<Vec<_>>()
        .join("|")
}

/// 1-based heads and relations of the tokens of a sentence.
///
/// The head of a root token is 0. A governor that is not part of the
/// sentence is also attached to 0.
pub fn dependencies(tokens: &[AnnotatedToken]) -> Vec<(usize, String)> {
    tokens
        .iter()
        .map(|token| {
            let head = if token.dep == ROOT_RELATION {
                0
            } else {
                token
                    .head
                    .filter(|&governor| governor < tokens.len())
                    .map(|governor| governor + 1)
                    .unwrap_or(0)
            };

            (head, field(&token.dep).to_owned())
        })
        .collect()
}

/// Render a sentence's metadata followed by its annotated tokens.
///
/// Heads and relations are only filled in when `with_dependencies` is
/// set.
pub fn render_sentence(
    sentence: &AnnotatedSentence,
    tokens: &[AnnotatedToken],
    with_dependencies: bool,
    lemmatizer: Option<&dyn Lemmatize>,
) -> String {
    let heads = if with_dependencies {
        Some(dependencies(tokens))
    } else {
        None
    };

    let mut lines = sentence.metadata.clone();

    for (idx, token) in tokens.iter().enumerate() {
        let (head, deprel) = match &heads {
            Some(heads) => (heads[idx].0.to_string(), heads[idx].1.clone()),
            None => (EMPTY.to_owned(), EMPTY.to_owned()),
        };

        let id = (idx + 1).to_string();
        let lemma = lemma_or(lemmatizer, &token.text, &token.tag, &token.lemma);
        let features = morph_features(&token.morph);

        let columns: [&str; 10] = [
            &id,
            field(&token.text),
            field(&lemma),
            field(&token.pos),
            field(&token.tag),
            &features,
            &head,
            &deprel,
            EMPTY,
            EMPTY,
        ];
        lines.push(columns.join("\t"));
    }

    lines.join("\n")
}

fn field(value: &str) -> &str {
    if value.is_empty() {
        EMPTY
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{dependencies, morph_features, render_sentence};
    use crate::annotator::AnnotatedToken;
    use crate::lemmatizer::LexiconLemmatizer;
    use crate::sentence::AnnotatedSentence;

    fn token(text: &str, head: Option<usize>, dep: &str) -> AnnotatedToken {
        AnnotatedToken {
            text: text.to_owned(),
            lemma: text.to_lowercase(),
            pos: "NOUN".to_owned(),
            tag: "NN".to_owned(),
            head,
            dep: dep.to_owned(),
            ..AnnotatedToken::default()
        }
    }

    #[test]
    fn features_are_sorted() {
        let morph: BTreeMap<_, _> = vec![
            ("Number".to_owned(), "Sing".to_owned()),
            ("Case".to_owned(), "Nom".to_owned()),
            ("Gender".to_owned(), "Masc".to_owned()),
        ]
        .into_iter()
        .collect();

        assert_eq!(morph_features(&morph), "Case=Nom|Gender=Masc|Number=Sing");
        assert_eq!(morph_features(&BTreeMap::new()), "_");
    }

    #[test]
    fn heads_are_one_based() {
        let tokens = vec![
            token("Der", Some(1), "nk"),
            token("Hund", Some(2), "sb"),
            token("bellt", Some(2), "ROOT"),
        ];
        assert_eq!(
            dependencies(&tokens),
            vec![(2, "nk".to_owned()), (3, "sb".to_owned()), (0, "ROOT".to_owned())]
        );
    }

    #[test]
    fn unmatched_governor_is_attached_to_root() {
        let tokens = vec![token("Hund", None, "root"), token("bellt", Some(7), "")];
        assert_eq!(
            dependencies(&tokens),
            vec![(0, "root".to_owned()), (0, "_".to_owned())]
        );
    }

    #[test]
    fn renders_metadata_and_tokens() {
        let sentence = AnnotatedSentence::new(vec!["# text_id = 1".to_owned()], vec![]);
        let tokens = vec![token("Hund", Some(1), "sb"), token("bellt", None, "ROOT")];

        assert_eq!(
            render_sentence(&sentence, &tokens, true, None),
            "# text_id = 1\n\
             1\tHund\thund\tNOUN\tNN\t_\t2\tsb\t_\t_\n\
             2\tbellt\tbellt\tNOUN\tNN\t_\t0\tROOT\t_\t_"
        );
    }

    #[test]
    fn without_dependencies_heads_are_empty() {
        let sentence = AnnotatedSentence::default();
        let tokens = vec![token("Hund", Some(1), "sb"), token("bellt", None, "ROOT")];

        assert_eq!(
            render_sentence(&sentence, &tokens, false, None),
            "1\tHund\thund\tNOUN\tNN\t_\t_\t_\t_\t_\n\
             2\tbellt\tbellt\tNOUN\tNN\t_\t_\t_\t_\t_"
        );
    }

    #[test]
    fn lemmatizer_overrides_lemma() {
        let lemmatizer = LexiconLemmatizer::from_buf_read("Hunde\tN\tHund\n".as_bytes()).unwrap();
        let sentence = AnnotatedSentence::default();
        let tokens = vec![token("Hunde", None, "")];

        assert_eq!(
            render_sentence(&sentence, &tokens, false, Some(&lemmatizer)),
            "1\tHunde\tHund\tNOUN\tNN\t_\t_\t_\t_\t_"
        );
    }
}
