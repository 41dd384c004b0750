use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Placeholder for absent CoNLL fields.
pub const EMPTY: &str = "_";

/// Errors that occur while parsing a token line.
///
/// These are never recovered from: a corpus with malformed lines is
/// rejected as a whole.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ParseError {
    #[error("{dialect} line has no field {index}: {line}")]
    MissingField {
        dialect: Dialect,
        index: usize,
        line: String,
    },

    #[error("malformed tag `{tag}` in line: {line}")]
    MalformedTag { tag: String, line: String },

    #[error("unknown token type: {0}")]
    UnknownDialect(String),
}

/// Column layouts of the supported input corpora.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Dialect {
    /// CoNLL 2009 with semantic role labels.
    Conll09,

    /// RNNTagger output: `FORM XPOS.FEATS LEMMA`.
    RnnTagger,

    /// CoNLL-U, possibly with an automatic score in the last column.
    Conllup,

    /// Minimal `FORM XPOS` layout.
    TigerNew,
}

impl Dialect {
    /// Parse a raw line into a token at the given 0-based position.
    pub fn parse(self, raw_line: &str, position: usize) -> Result<Token, ParseError> {
        let fields = Fields::new(self, raw_line);
        match self {
            Dialect::Conll09 => parse_conll09(&fields, position),
            Dialect::RnnTagger => parse_rnn_tagger(&fields, position),
            Dialect::Conllup => parse_conllup(&fields, position),
            Dialect::TigerNew => parse_tiger_new(&fields, position),
        }
    }

    /// The type tag under which the dialect is selected.
    pub fn name(self) -> &'static str {
        match self {
            Dialect::Conll09 => "CoNLL09_Token",
            Dialect::RnnTagger => "RNNTagger_Token",
            Dialect::Conllup => "CoNLLUP_Token",
            Dialect::TigerNew => "TigerNew_Token",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CoNLL09_Token" | "conll09" => Ok(Dialect::Conll09),
            "RNNTagger_Token" | "rnntagger" => Ok(Dialect::RnnTagger),
            "CoNLLUP_Token" | "conllup" => Ok(Dialect::Conllup),
            "TigerNew_Token" | "tiger" => Ok(Dialect::TigerNew),
            other => Err(ParseError::UnknownDialect(other.to_owned())),
        }
    }
}

/// Semantic role labeling fields of the CoNLL09 dialect.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SrlFields {
    pub is_pred: bool,
    pub pred_sense: Option<String>,
    pub pred_sense_id: String,
    pub labels: Vec<String>,
}

/// A token in canonical CoNLL-U shape, whatever dialect it was read from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Token {
    id: String,
    position: usize,
    word: String,
    lemma: String,
    pos_universal: String,
    pos_tag: String,
    detail_tag: String,
    head: String,
    dep_tag: String,
    blank: String,
    auto_score: String,
    srl: Option<SrlFields>,
}

impl Token {
    /// Construct a token with only a form and all other columns empty.
    fn new(id: String, position: usize, word: &str) -> Self {
        Token {
            id,
            position,
            word: word.to_owned(),
            lemma: EMPTY.to_owned(),
            pos_universal: EMPTY.to_owned(),
            pos_tag: EMPTY.to_owned(),
            detail_tag: EMPTY.to_owned(),
            head: EMPTY.to_owned(),
            dep_tag: EMPTY.to_owned(),
            blank: EMPTY.to_owned(),
            auto_score: EMPTY.to_owned(),
            srl: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// 0-based position in the sentence.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn word(&self) -> &str {
        &self.word
    }

    pub fn lemma(&self) -> &str {
        &self.lemma
    }

    pub fn pos_universal(&self) -> &str {
        &self.pos_universal
    }

    pub fn pos_tag(&self) -> &str {
        &self.pos_tag
    }

    /// Morphological features.
    pub fn detail_tag(&self) -> &str {
        &self.detail_tag
    }

    pub fn head(&self) -> &str {
        &self.head
    }

    pub fn dep_tag(&self) -> &str {
        &self.dep_tag
    }

    pub fn srl(&self) -> Option<&SrlFields> {
        self.srl.as_ref()
    }

    /// The ten CoNLL-U columns of this token.
    pub fn info(&self) -> [&str; 10] {
        [
            &self.id,
            &self.word,
            &self.lemma,
            &self.pos_universal,
            &self.pos_tag,
            &self.detail_tag,
            &self.head,
            &self.dep_tag,
            &self.blank,
            &self.auto_score,
        ]
    }

    /// Render the token as a tab-separated CoNLL-U line.
    pub fn conll_line(&self) -> String {
        self.info().join("\t")
    }

    /// Render the token in the CoNLL09 column layout.
    ///
    /// Tokens from other dialects have no predicate information and are
    /// rendered as non-predicates.
    pub fn conll09_line(&self) -> String {
        let (is_pred, sense) = match self.srl.as_ref() {
            Some(SrlFields {
                is_pred: true,
                pred_sense: Some(sense),
                ..
            }) => ("Y", sense.as_str()),
            _ => (EMPTY, EMPTY),
        };

        let mut columns: Vec<&str> = vec![
            &self.id,
            &self.word,
            &self.lemma,
            &self.lemma,
            &self.pos_tag,
            &self.pos_tag,
            EMPTY,
            &self.detail_tag,
            &self.head,
            &self.head,
            &self.dep_tag,
            &self.dep_tag,
            is_pred,
            sense,
        ];
        if let Some(srl) = &self.srl {
            columns.extend(srl.labels.iter().map(String::as_str));
        }

        columns.join("\t")
    }
}

/// Whitespace-separated fields of a raw line.
struct Fields<'a> {
    dialect: Dialect,
    line: &'a str,
    fields: Vec<&'a str>,
}

impl<'a> Fields<'a> {
    fn new(dialect: Dialect, line: &'a str) -> Self {
        Fields {
            dialect,
            line,
            fields: line.split_whitespace().collect(),
        }
    }

    fn get(&self, index: usize) -> Result<&'a str, ParseError> {
        self.fields
            .get(index)
            .copied()
            .ok_or_else(|| ParseError::MissingField {
                dialect: self.dialect,
                index,
                line: self.line.trim_end().to_owned(),
            })
    }

    fn rest(&self, from: usize) -> &[&'a str] {
        self.fields.get(from..).unwrap_or(&[])
    }
}

fn parse_tiger_new(fields: &Fields, position: usize) -> Result<Token, ParseError> {
    let mut token = Token::new((position + 1).to_string(), position, fields.get(0)?);
    token.pos_tag = fields.get(1)?.to_owned();
    Ok(token)
}

fn parse_rnn_tagger(fields: &Fields, position: usize) -> Result<Token, ParseError> {
    let mut token = Token::new((position + 1).to_string(), position, fields.get(0)?);
    let tag = fields.get(1)?;
    token.lemma = fields.get(2)?.to_owned();

    // 'NN.Gen.Sg.Fem'
    if tag != EMPTY && tag.contains('.') {
        let mut parts = tag.split('.');
        token.pos_tag = parts.next().unwrap_or(EMPTY).to_owned();
        token.detail_tag = parts.collect::<Vec<_>>().join("|");
    } else {
        token.pos_tag = tag.to_owned();
    }

    Ok(token)
}

fn parse_conllup(fields: &Fields, position: usize) -> Result<Token, ParseError> {
    let mut token = Token::new(fields.get(0)?.to_owned(), position, fields.get(1)?);
    token.lemma = fields.get(2)?.to_owned();
    token.pos_universal = fields.get(3)?.to_owned();
    token.pos_tag = conllup_xpos(fields.get(4)?, fields.line)?;
    token.detail_tag = fields.get(5)?.to_owned();
    token.head = fields.get(6)?.to_owned();
    token.dep_tag = fields.get(7)?.to_owned();
    token.blank = fields.get(8)?.to_owned();
    token.auto_score = fields.get(9)?.to_owned();
    Ok(token)
}

/// Reduce a `XPOS=NE|Case=Nom|...` tag to the value of its first pair.
fn conllup_xpos(tag: &str, line: &str) -> Result<String, ParseError> {
    if tag == EMPTY || !tag.contains('|') {
        return Ok(tag.to_owned());
    }

    let first = tag.split('|').next().unwrap_or(tag);
    match first.split('=').nth(1) {
        Some(value) => Ok(value.to_owned()),
        None => Err(ParseError::MalformedTag {
            tag: tag.to_owned(),
            line: line.trim_end().to_owned(),
        }),
    }
}

fn parse_conll09(fields: &Fields, position: usize) -> Result<Token, ParseError> {
    let mut token = Token::new(fields.get(0)?.to_owned(), position, fields.get(1)?);
    token.lemma = fields.get(2)?.to_owned();
    token.pos_tag = fields.get(4)?.to_owned();
    token.head = fields.get(8)?.to_owned();
    token.dep_tag = fields.get(10)?.to_owned();

    let is_pred = fields.get(12)? == "Y";
    let labels = fields.rest(14).iter().map(|&l| l.to_owned()).collect();
    let srl = if is_pred {
        let sense = fields
            .get(13)?
            .trim_matches(|c: char| c == '[' || c == ']')
            .to_owned();
        SrlFields {
            is_pred,
            pred_sense_id: format!("{}##{}", position, sense),
            pred_sense: Some(sense),
            labels,
        }
    } else {
        SrlFields {
            labels,
            ..SrlFields::default()
        }
    };
    token.srl = Some(srl);

    Ok(token)
}
