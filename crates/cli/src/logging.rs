//! Run log: every record goes to stdout and to a per-run file that is
//! attached to the summary mail.
//!
//! Line format: `LEVEL   YYYY-MM-DD HH:MM:SS          target:line message`.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::NaiveDateTime;
use env_logger::{Builder, Env, Target, WriteStyle};
use log::LevelFilter;

/// Crates whose records honour the configured level. Everything else
/// (HTTP stack, TLS) is held at `warn` unless `RUST_LOG` says otherwise.
pub const JOB_TARGETS: &[&str] = &[
    "uocc_skid",
    "uocc_cli",
    "uocc_recon",
    "uocc_config",
    "uocc_services",
    "uocc_io",
];

/// `<stem>_<YYYYmmdd-HHMMSS>.txt`
pub fn log_file_name(stem: &str, started: NaiveDateTime) -> String {
    format!("{stem}_{}.txt", started.format("%Y%m%d-%H%M%S"))
}

pub fn format_line(level: log::Level, at: NaiveDateTime, target: &str, line: Option<u32>, message: &str) -> String {
    let line = line.map(|l| l.to_string()).unwrap_or_default();
    format!(
        "{:<7} {} {:>15}:{:>5} {}",
        level.as_str(),
        at.format("%Y-%m-%d %H:%M:%S"),
        target,
        line,
        message
    )
}

/// The per-run log file. Cloning shares the same handle.
#[derive(Clone, Debug)]
pub struct RunLog {
    path: PathBuf,
    file: Arc<Mutex<Option<File>>>,
}

impl RunLog {
    pub fn create(dir: &Path, stem: &str, started: NaiveDateTime) -> io::Result<Self> {
        let path = dir.join(log_file_name(stem, started));
        let file = File::create(&path)?;
        Ok(Self {
            path,
            file: Arc::new(Mutex::new(Some(file))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writer that copies everything to stdout and, while attached, the file.
    pub fn tee(&self) -> TeeWriter {
        TeeWriter { log: self.clone() }
    }

    pub fn flush(&self) -> io::Result<()> {
        match self.file.lock() {
            Ok(mut guard) => match guard.as_mut() {
                Some(file) => file.flush(),
                None => Ok(()),
            },
            Err(_) => Err(io::Error::other("log file lock poisoned")),
        }
    }

    /// Flush and close the file. Later records reach stdout only.
    pub fn detach(&self) -> io::Result<()> {
        let file = match self.file.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => return Err(io::Error::other("log file lock poisoned")),
        };
        match file {
            Some(mut file) => {
                file.flush()?;
                file.sync_all()
            }
            None => Ok(()),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.file.lock().map(|g| g.is_some()).unwrap_or(false)
    }
}

pub struct TeeWriter {
    log: RunLog,
}

impl TeeWriter {
    fn write_file(&self, buf: &[u8]) -> io::Result<()> {
        let mut guard = self
            .log
            .file
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))?;
        if let Some(file) = guard.as_mut() {
            file.write_all(buf)?;
        }
        Ok(())
    }
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stdout().lock().write_all(buf)?;
        self.write_file(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()?;
        self.log.flush()
    }
}

/// Install the process logger. `RUST_LOG`, when set, overrides `level`.
pub fn init(level: LevelFilter, log: &RunLog) -> Result<(), log::SetLoggerError> {
    let mut builder = Builder::new();
    builder.filter_level(level.min(LevelFilter::Warn));
    for target in JOB_TARGETS {
        builder.filter_module(target, level);
    }
    builder
        .parse_env(Env::default())
        .write_style(WriteStyle::Never)
        .format(|buf, record| {
            let now = chrono::Local::now().naive_local();
            writeln!(
                buf,
                "{}",
                format_line(record.level(), now, record.target(), record.line(), &record.args().to_string())
            )
        })
        .target(Target::Pipe(Box::new(log.tee())))
        .try_init()
}
