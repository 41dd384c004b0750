use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Deserializer};

use crate::token::Dialect;

/// Prefix of environment variables that override the configuration.
pub const ENV_PREFIX: &str = "ANNOTATE_";

/// Annotation run configuration.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Corpus name, used in log messages and the log file name.
    pub corpus_name: String,

    /// Token type (dialect) of the input corpus.
    pub token_type: String,

    /// Prefix of comment (metadata) lines.
    pub comment_str: String,

    /// Foundry that metadata lines are rewritten to.
    pub foundry: String,

    /// Sentences per chunk. Values of 0 or below read the whole input
    /// as one chunk.
    #[serde(deserialize_with = "deserialize_chunk_size")]
    pub chunk_size: usize,

    /// Sentences per annotator call when dependency parsing is off.
    pub batch_size: usize,

    /// Number of annotation processes. Only 1 is supported.
    pub n_process: usize,

    /// Time budget for parsing a sentence, in seconds.
    pub parse_timeout: f64,

    /// Sentences with more tokens are not parsed.
    pub max_sentence_length: usize,

    /// Annotate dependency relations.
    pub use_dependencies: bool,

    /// Override lemmas with the lexicon lemmatizer.
    pub use_lemmatizer: bool,

    /// Lemmatizer lexicon.
    pub lexicon: Option<String>,

    /// URL of the CoNLL-U parser server.
    pub annotator_url: String,

    /// Directory for the run's log file.
    pub log_dir: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            corpus_name: "Corpus".to_owned(),
            token_type: Dialect::Conllup.name().to_owned(),
            comment_str: "#".to_owned(),
            foundry: "spacy".to_owned(),
            chunk_size: 20000,
            batch_size: 2000,
            n_process: 1,
            parse_timeout: 0.5,
            max_sentence_length: 500,
            use_dependencies: true,
            use_lemmatizer: true,
            lexicon: None,
            annotator_url: "http://localhost:7689/".to_owned(),
            log_dir: None,
        }
    }
}

impl Config {
    /// Read a configuration file.
    ///
    /// Relative paths in the configuration are resolved against the
    /// directory of the configuration file.
    pub fn read<P, R>(config_path: P, mut read: R) -> Result<Self>
    where
        P: AsRef<Path>,
        R: Read,
    {
        let mut toml = String::new();
        read.read_to_string(&mut toml)?;

        let mut config: Config = toml::from_str(&toml)?;

        if let Some(lexicon) = config.lexicon.as_mut() {
            *lexicon = canonicalize_path(config_path.as_ref(), lexicon)?;
        }

        if let Some(log_dir) = config.log_dir.as_mut() {
            *log_dir = canonicalize_path(config_path.as_ref(), log_dir)?;
        }

        Ok(config)
    }

    /// Read the configuration file at `path`.
    pub fn from_file<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let f = File::open(path)
            .with_context(|| format!("Cannot open configuration: {}", path.to_string_lossy()))?;
        Self::read(path, f)
            .with_context(|| format!("Cannot read configuration: {}", path.to_string_lossy()))
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides looked up by variable name.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut chunk_size = self.chunk_size as i64;
        override_value(&lookup, "CHUNK_SIZE", &mut chunk_size)?;
        self.chunk_size = chunk_size_from(chunk_size);

        override_value(&lookup, "BATCH_SIZE", &mut self.batch_size)?;
        override_value(&lookup, "N_PROCESS", &mut self.n_process)?;
        override_value(&lookup, "PARSE_TIMEOUT", &mut self.parse_timeout)?;
        override_value(&lookup, "MAX_SENTENCE_LENGTH", &mut self.max_sentence_length)?;
        override_flag(&lookup, "USE_DEPENDENCIES", &mut self.use_dependencies)?;
        override_flag(&lookup, "USE_LEMMATIZER", &mut self.use_lemmatizer)?;
        Ok(())
    }

    /// Check the configuration and normalize unsupported settings.
    pub fn validate(&mut self) -> Result<()> {
        self.dialect()?;

        if self.comment_str.is_empty() {
            bail!("The comment prefix cannot be empty");
        }

        match Duration::try_from_secs_f64(self.parse_timeout) {
            Ok(timeout) if !timeout.is_zero() => (),
            _ => bail!(
                "The parse timeout must be a positive number of seconds, was {}",
                self.parse_timeout
            ),
        }

        if self.batch_size == 0 {
            bail!("The batch size must be at least 1");
        }

        if self.n_process != 1 {
            log::warn!(
                "Running with {} processes is not supported, using 1",
                self.n_process
            );
            self.n_process = 1;
        }

        Ok(())
    }

    pub fn dialect(&self) -> Result<Dialect> {
        Ok(self.token_type.parse()?)
    }

    pub fn parse_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.parse_timeout)
    }
}

/// Chunk size for a possibly non-positive setting.
pub fn chunk_size_from(value: i64) -> usize {
    if value <= 0 {
        0
    } else {
        value as usize
    }
}

fn deserialize_chunk_size<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(chunk_size_from(i64::deserialize(deserializer)?))
}

fn override_value<F, T>(lookup: &F, name: &str, value: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let key = format!("{}{}", ENV_PREFIX, name);
    if let Some(raw) = lookup(&key) {
        *value = raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {}", key, raw))?;
        log::info!("Using {} environment variable: {}", key, raw);
    }

    Ok(())
}

fn override_flag<F>(lookup: &F, name: &str, value: &mut bool) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let key = format!("{}{}", ENV_PREFIX, name);
    if let Some(raw) = lookup(&key) {
        *value = parse_flag(&raw).ok_or_else(|| anyhow!("Invalid value for {}: {}", key, raw))?;
        log::info!("Using {} environment variable: {}", key, raw);
    }

    Ok(())
}

/// Parse a boolean flag such as `True`, `false`, `1`, or `no`.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Canonicalize a (relative) filename.
///
/// The configuration file can contain file names relative to the configuration
/// file directory. However, the program can be run in a different directory
/// than the configuration. This function gives the absolute path of a file
/// name that is relative to a configuration file directory.
fn canonicalize_path(config_path: &Path, filename: &str) -> Result<String> {
    if filename.is_empty() {
        return Ok(filename.to_owned());
    }

    let path = Path::new(&filename);

    // Don't touch absolute paths.
    if path.is_absolute() {
        return Ok(filename.to_owned());
    }

    let abs_config_path = config_path.canonicalize()?;
    Ok(abs_config_path
        .parent()
        .ok_or_else(|| {
            anyhow!(
                "Cannot get parent path of the configuration file: {}",
                abs_config_path.to_string_lossy()
            )
        })?
        .join(path)
        .to_str()
        .ok_or_else(|| {
            anyhow!(
                "Cannot cannot convert parent path to string: {}",
                abs_config_path.to_string_lossy()
            )
        })?
        .to_owned())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;
    use std::time::Duration;

    use super::{parse_flag, Config};
    use crate::token::Dialect;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.chunk_size, 20000);
        assert_eq!(config.batch_size, 2000);
        assert_eq!(config.n_process, 1);
        assert_eq!(config.parse_timeout(), Duration::from_millis(500));
        assert_eq!(config.max_sentence_length, 500);
        assert!(config.use_dependencies);
        assert!(config.use_lemmatizer);
        assert_eq!(config.dialect().unwrap(), Dialect::Conllup);
    }

    #[test]
    fn reads_toml_with_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("annotate.toml");
        fs::write(
            &config_path,
            "corpus_name = \"zca18\"\n\
             token_type = \"RNNTagger_Token\"\n\
             chunk_size = 10\n\
             lexicon = \"lexicon.tsv\"\n",
        )
        .unwrap();

        let config = Config::from_file(&config_path).unwrap();
        assert_eq!(config.corpus_name, "zca18");
        assert_eq!(config.dialect().unwrap(), Dialect::RnnTagger);
        assert_eq!(config.chunk_size, 10);
        assert_eq!(config.batch_size, 2000);

        let lexicon = dir.path().canonicalize().unwrap().join("lexicon.tsv");
        assert_eq!(config.lexicon.as_deref(), lexicon.to_str());
    }

    #[test]
    fn rejects_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("annotate.toml");
        fs::write(&config_path, "chunk_sise = 10\n").unwrap();
        assert!(Config::from_file(&config_path).is_err());
    }

    #[test]
    fn environment_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(lookup(&[
                ("ANNOTATE_CHUNK_SIZE", "100"),
                ("ANNOTATE_PARSE_TIMEOUT", "2.5"),
                ("ANNOTATE_USE_DEPENDENCIES", "False"),
                ("ANNOTATE_USE_LEMMATIZER", "0"),
            ]))
            .unwrap();

        assert_eq!(config.chunk_size, 100);
        assert_eq!(config.parse_timeout(), Duration::from_millis(2500));
        assert!(!config.use_dependencies);
        assert!(!config.use_lemmatizer);
        assert_eq!(config.batch_size, 2000);
    }

    #[test]
    fn negative_chunk_size_reads_everything() {
        let mut config = Config::default();
        config
            .apply_overrides(lookup(&[("ANNOTATE_CHUNK_SIZE", "-1")]))
            .unwrap();
        assert_eq!(config.chunk_size, 0);

        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("annotate.toml");
        fs::write(&config_path, "chunk_size = -5\n").unwrap();
        assert_eq!(Config::from_file(&config_path).unwrap().chunk_size, 0);
    }

    #[test]
    fn overflowing_timeout_is_rejected() {
        let mut config = Config::default();
        config
            .apply_overrides(lookup(&[("ANNOTATE_PARSE_TIMEOUT", "1e30")]))
            .unwrap();
        assert!(config.validate().is_err());

        let mut config = Config {
            parse_timeout: f64::NAN,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_overrides_are_errors() {
        let mut config = Config::default();
        assert!(config
            .apply_overrides(lookup(&[("ANNOTATE_BATCH_SIZE", "many")]))
            .is_err());
        assert!(config
            .apply_overrides(lookup(&[("ANNOTATE_USE_DEPENDENCIES", "maybe")]))
            .is_err());
    }

    #[test]
    fn validation_clamps_process_count() {
        let mut config = Config {
            n_process: 4,
            ..Config::default()
        };
        config.validate().unwrap();
        assert_eq!(config.n_process, 1);
    }

    #[test]
    fn validation_rejects_bad_settings() {
        let mut config = Config {
            parse_timeout: 0.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let mut config = Config {
            token_type: "Foo_Token".to_owned(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn flags() {
        assert_eq!(parse_flag("True"), Some(true));
        assert_eq!(parse_flag("no"), Some(false));
        assert_eq!(parse_flag(""), None);
    }
}
