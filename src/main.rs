use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};

mod annotator;
use annotator::Annotate;

mod chunks;
use chunks::ChunkReader;

mod config;
use config::{chunk_size_from, Config};

mod convert;
use convert::{convert, open_lines, OutputFormat};

mod lemmatizer;
use lemmatizer::{Lemmatize, LexiconLemmatizer};

mod pipeline;
use pipeline::{Pipeline, RunContext, Settings};

mod reader;
use reader::SentenceReader;

mod render;

mod rest;
use rest::RestAnnotator;

mod sentence;

#[cfg(test)]
mod testing;

mod token;
use token::Dialect;

mod util;
use util::{init_logging, log_file_path};

static COMMENT_STR: &str = "COMMENT_STR";
static CONFIG: &str = "CONFIG";
static CORPUS_NAME: &str = "CORPUS_NAME";
static CHUNK_SIZE: &str = "CHUNK_SIZE";
static FORMAT: &str = "FORMAT";
static FOUNDRY: &str = "FOUNDRY";
static INPUT: &str = "INPUT";
static LEXICON: &str = "LEXICON";
static LOG_DIR: &str = "LOG_DIR";
static SEPARATOR: &str = "SEPARATOR";
static TAGS: &str = "TAGS";
static TOKEN_TYPE: &str = "TOKEN_TYPE";
static URL: &str = "URL";

fn reader_args<'a, 'b>(app: App<'a, 'b>) -> App<'a, 'b> {
    app.arg(
        Arg::with_name(TOKEN_TYPE)
            .long("token-type")
            .short("t")
            .takes_value(true)
            .help("Token type of the input: CoNLL09_Token, RNNTagger_Token, CoNLLUP_Token, or TigerNew_Token"),
    )
    .arg(
        Arg::with_name(COMMENT_STR)
            .long("comment-str")
            .takes_value(true)
            .help("Prefix of metadata lines"),
    )
    .arg(
        Arg::with_name(FOUNDRY)
            .long("foundry")
            .takes_value(true)
            .help("Foundry that metadata is rewritten to"),
    )
    .arg(Arg::with_name(INPUT).help("Input corpus (default: standard input)"))
}

fn app() -> App<'static, 'static> {
    App::new("conll-annotate")
        .about("Convert and annotate CoNLL corpora")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(reader_args(
            SubCommand::with_name("annotate")
                .about("Annotate a corpus and write CoNLL-U to standard output")
                .arg(
                    Arg::with_name(CONFIG)
                        .long("config")
                        .short("c")
                        .takes_value(true)
                        .help("Configuration file"),
                )
                .arg(
                    Arg::with_name(CORPUS_NAME)
                        .long("corpus-name")
                        .takes_value(true)
                        .help("Corpus name used in logs"),
                )
                .arg(
                    Arg::with_name(URL)
                        .long("url")
                        .takes_value(true)
                        .help("URL of the CoNLL-U parser server"),
                )
                .arg(
                    Arg::with_name(LEXICON)
                        .long("lexicon")
                        .takes_value(true)
                        .help("Lexicon of the secondary lemmatizer"),
                )
                .arg(
                    Arg::with_name(LOG_DIR)
                        .long("log-dir")
                        .takes_value(true)
                        .help("Directory for the log file"),
                ),
        ))
        .subcommand(reader_args(
            SubCommand::with_name("convert")
                .about("Convert a corpus to CoNLL-U, CoNLL09, or plain text")
                .arg(
                    Arg::with_name(FORMAT)
                        .long("format")
                        .short("f")
                        .takes_value(true)
                        .possible_values(&["conllu", "conll09", "text"])
                        .default_value("conllu"),
                )
                .arg(
                    Arg::with_name(CHUNK_SIZE)
                        .long("chunk-size")
                        .takes_value(true)
                        .allow_hyphen_values(true)
                        .help("Sentences per chunk, 0 or below reads all sentences at once"),
                )
                .arg(
                    Arg::with_name(SEPARATOR)
                        .long("separator")
                        .takes_value(true)
                        .help("Lines containing this string end a sentence"),
                )
                .arg(
                    Arg::with_name(TAGS)
                        .long("tags")
                        .takes_value(true)
                        .help("Write part-of-speech tags to this file (text format)"),
                ),
        ))
}

fn apply_reader_args(config: &mut Config, matches: &ArgMatches) {
    if let Some(token_type) = matches.value_of(TOKEN_TYPE) {
        config.token_type = token_type.to_owned();
    }
    if let Some(comment_str) = matches.value_of(COMMENT_STR) {
        config.comment_str = comment_str.to_owned();
    }
    if let Some(foundry) = matches.value_of(FOUNDRY) {
        config.foundry = foundry.to_owned();
    }
}

fn load_lemmatizer(config: &Config) -> Result<Option<Arc<dyn Lemmatize>>> {
    if !config.use_lemmatizer {
        return Ok(None);
    }

    match &config.lexicon {
        Some(lexicon) => {
            let lemmatizer: Arc<dyn Lemmatize> = Arc::new(LexiconLemmatizer::load(lexicon)?);
            Ok(Some(lemmatizer))
        }
        None => {
            log::warn!("No lemmatizer lexicon configured, using annotator lemmas");
            Ok(None)
        }
    }
}

async fn annotate(matches: &ArgMatches<'_>) -> Result<()> {
    let mut config = match matches.value_of(CONFIG) {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    apply_reader_args(&mut config, matches);
    if let Some(corpus_name) = matches.value_of(CORPUS_NAME) {
        config.corpus_name = corpus_name.to_owned();
    }
    if let Some(url) = matches.value_of(URL) {
        config.annotator_url = url.to_owned();
    }
    if let Some(lexicon) = matches.value_of(LEXICON) {
        config.lexicon = Some(lexicon.to_owned());
    }
    if let Some(log_dir) = matches.value_of(LOG_DIR) {
        config.log_dir = Some(log_dir.to_owned());
    }

    let log_file: Option<PathBuf> = config
        .log_dir
        .as_ref()
        .map(|log_dir| log_file_path(log_dir, &config.corpus_name));
    init_logging(log_file.as_deref())?;

    config.apply_env()?;
    config.validate()?;

    log::info!("Annotating corpus {}", config.corpus_name);
    log::info!(
        "Chunk size: {}, batch size: {}, processes: {}",
        config.chunk_size,
        config.batch_size,
        config.n_process
    );
    log::info!(
        "Parse timeout: {}s, max sentence length: {}",
        config.parse_timeout,
        config.max_sentence_length
    );
    log::info!(
        "Dependencies: {}, lemmatizer: {}",
        config.use_dependencies,
        config.use_lemmatizer
    );

    let annotator: Arc<dyn Annotate> = Arc::new(RestAnnotator::new(&config.annotator_url)?);
    log::info!("Annotator: {}", annotator.description());

    let lemmatizer = load_lemmatizer(&config)?;

    let reader = SentenceReader::new(config.dialect()?, &config.comment_str, &config.foundry);
    let chunks = ChunkReader::new(&reader, open_lines(matches.value_of(INPUT))?, config.chunk_size);

    let mut pipeline = Pipeline::new(
        annotator,
        lemmatizer,
        Settings::from_config(&config),
        RunContext::new(config.corpus_name.clone()),
    );

    let stdout = io::stdout();
    pipeline.run(chunks, BufWriter::new(stdout.lock())).await?;

    Ok(())
}

fn convert_corpus(matches: &ArgMatches) -> Result<()> {
    init_logging(None)?;

    let mut config = Config::default();
    apply_reader_args(&mut config, matches);
    if let Some(chunk_size) = matches.value_of(CHUNK_SIZE) {
        config.chunk_size = chunk_size_from(
            chunk_size
                .parse()
                .with_context(|| format!("Invalid chunk size: {}", chunk_size))?,
        );
    }

    let dialect: Dialect = config.dialect()?;
    let mut reader = SentenceReader::new(dialect, &config.comment_str, &config.foundry);
    if let Some(separator) = matches.value_of(SEPARATOR) {
        reader = reader.with_separator(separator);
    }

    let format: OutputFormat = matches.value_of(FORMAT).unwrap_or("conllu").parse()?;

    let mut tags = match matches.value_of(TAGS) {
        Some(path) => Some(BufWriter::new(
            File::create(path).with_context(|| format!("Cannot create tag file: {}", path))?,
        )),
        None => None,
    };

    let stdout = io::stdout();
    let n_sents = convert(
        &reader,
        open_lines(matches.value_of(INPUT))?,
        config.chunk_size,
        format,
        BufWriter::new(stdout.lock()),
        tags.as_mut().map(|tags| tags as &mut dyn Write),
    )?;

    log::info!("Converted {} sentences", n_sents);

    Ok(())
}

#[async_std::main]
async fn main() -> Result<()> {
    let matches = app().get_matches();

    match matches.subcommand() {
        ("annotate", Some(matches)) => annotate(matches).await,
        ("convert", Some(matches)) => convert_corpus(matches),
        _ => unreachable!(),
    }
}
