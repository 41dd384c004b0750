use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};

/// Writer that copies everything to standard error and a log file.
pub struct TeeWriter {
    file: File,
}

impl TeeWriter {
    pub fn new(file: File) -> Self {
        TeeWriter { file }
    }
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

/// Path of the log file of a corpus run.
pub fn log_file_path(log_dir: impl AsRef<Path>, corpus_name: &str) -> PathBuf {
    log_dir.as_ref().join(format!("Parse_{}.log", corpus_name))
}

/// Initialize logging with `info` as the default level.
///
/// Records are written to standard error as `LEVEL: message`. When
/// `log_file` is given, records are also appended to that file.
pub fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.format(|buf, record| writeln!(buf, "{}: {}", record.level(), record.args()));

    if let Some(log_file) = log_file {
        if let Some(dir) = log_file.parent() {
            fs::create_dir_all(dir).with_context(|| {
                format!("Cannot create log directory: {}", dir.to_string_lossy())
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .with_context(|| format!("Cannot open log file: {}", log_file.to_string_lossy()))?;
        builder.target(Target::Pipe(Box::new(TeeWriter::new(file))));
    }

    builder.try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs::{self, OpenOptions};
    use std::io::Write;
    use std::path::Path;

    use super::{log_file_path, TeeWriter};

    #[test]
    fn log_file_is_named_after_corpus() {
        assert_eq!(
            log_file_path("/var/log/annotate", "zca18"),
            Path::new("/var/log/annotate/Parse_zca18.log")
        );
    }

    #[test]
    fn tee_writes_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tee.log");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .unwrap();

        let mut tee = TeeWriter::new(file);
        writeln!(tee, "INFO: started").unwrap();
        tee.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "INFO: started\n");
    }
}
