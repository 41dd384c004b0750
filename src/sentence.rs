use crate::token::Token;

/// A sentence read from a corpus: its tokens and the comment lines
/// that preceded or interleaved them.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AnnotatedSentence {
    pub metadata: Vec<String>,
    pub tokens: Vec<Token>,
}

impl AnnotatedSentence {
    pub fn new(metadata: Vec<String>, tokens: Vec<Token>) -> Self {
        AnnotatedSentence { metadata, tokens }
    }

    pub fn words(&self) -> Vec<&str> {
        self.tokens.iter().map(Token::word).collect()
    }

    /// The sentence text, tokens joined by a single space.
    pub fn sentence(&self) -> String {
        self.words().join(" ")
    }

    pub fn pos_tags(&self, universal: bool) -> Vec<&str> {
        self.tokens
            .iter()
            .map(|token| {
                if universal {
                    token.pos_universal()
                } else {
                    token.pos_tag()
                }
            })
            .collect()
    }

    /// Render metadata and tokens as CoNLL-U lines.
    pub fn conll_lines(&self) -> Vec<String> {
        self.metadata
            .iter()
            .cloned()
            .chain(self.tokens.iter().map(Token::conll_line))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::AnnotatedSentence;
    use crate::token::Dialect;

    fn sentence() -> AnnotatedSentence {
        let tokens = vec!["Der ART der", "Hund NN Hund", "bellt VVFIN bellen"]
            .into_iter()
            .enumerate()
            .map(|(idx, line)| Dialect::RnnTagger.parse(line, idx).unwrap())
            .collect();
        AnnotatedSentence::new(vec!["# text = Der Hund bellt".to_owned()], tokens)
    }

    #[test]
    fn sentence_text_and_tags() {
        let sentence = sentence();
        assert_eq!(sentence.words(), vec!["Der", "Hund", "bellt"]);
        assert_eq!(sentence.sentence(), "Der Hund bellt");
        assert_eq!(sentence.pos_tags(false), vec!["ART", "NN", "VVFIN"]);
        assert_eq!(sentence.pos_tags(true), vec!["_", "_", "_"]);
    }

    #[test]
    fn conll_lines_start_with_metadata() {
        let lines = sentence().conll_lines();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "# text = Der Hund bellt");
        assert_eq!(lines[2], "2\tHund\tHund\t_\tNN\t_\t_\t_\t_\t_");
    }
}
