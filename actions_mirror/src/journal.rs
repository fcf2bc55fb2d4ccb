use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// The file name GitHub API responses are appended to, inside the configured log directory.
pub const JOURNAL_FILE_NAME: &str = "github-api-responses.log";

/// An append-only record of every GitHub API response the monitor decoded.
///
/// It's saved as a CI artifact so that after the fact you can see exactly what GitHub told us and
/// when. Writing to it is best effort; callers log failures and move on.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    path: Option<PathBuf>,
}

impl Journal {
    pub fn new(log_dir: &Path) -> Self {
        Self {
            path: Some(log_dir.join(JOURNAL_FILE_NAME)),
        }
    }

    /// A journal that drops everything. Used by the one-shot commands and tests.
    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append the response `body` for the GET request to `endpoint`.
    ///
    /// Bodies that are valid JSON are pretty printed; anything else is written as is. This is plain
    /// blocking file I/O, run inline on the monitor's single thread between requests.
    pub fn record(&self, endpoint: &str, body: &str) -> io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let pretty = serde_json::from_str::<serde_json::Value>(body)
            .and_then(|value| serde_json::to_string_pretty(&value))
            .unwrap_or_else(|_| body.to_string());

        let entry = format!(
            "\n[{}] GET {}\n{}\n{}\n",
            Utc::now().format("%Y-%m-%d %H:%M:%S"),
            endpoint,
            pretty,
            "-".repeat(80)
        );

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(entry.as_bytes())
    }
}
