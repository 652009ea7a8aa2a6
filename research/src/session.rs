use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

const SLUG_MAX_CHARS: usize = 50;
const FILENAME_MAX_CHARS: usize = 200;

/// A discrete, timestamped research finding. Notes are append-only: nothing
/// in this crate edits or deletes one after it is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub title: String,
    pub content: String,
    #[serde(rename = "type", default = "default_note_type")]
    pub note_type: String,
    #[serde(default)]
    pub source: String,
    pub created_at: DateTime<Local>,
}

fn default_note_type() -> String {
    "finding".to_string()
}

impl Note {
    pub fn new(title: String, content: String, note_type: String, source: String) -> Self {
        Self {
            title,
            content,
            note_type,
            source,
            created_at: Local::now(),
        }
    }
}

/// One research run's persistent scope:
///
/// ```text
/// <base>/<YYYYMMDD_HHMMSS>_<topic-slug>/
///   pdfs/<filename>
///   notes/<YYYYMMDD_HHMMSS>_<title-prefix>.json
///   report.md
///   metadata.json
/// ```
///
/// Every path handed out by a `Session` resolves inside its root. The handle
/// is threaded explicitly through each tool, there is no process-wide
/// "active session" pointer.
#[derive(Debug)]
pub struct Session {
    root: PathBuf,
    topic: String,
    created_at: DateTime<Local>,
}

impl Session {
    pub fn create(topic: &str, base_dir: &Path) -> Result<Self> {
        Self::create_at(topic, base_dir, Local::now())
    }

    fn create_at(topic: &str, base_dir: &Path, now: DateTime<Local>) -> Result<Self> {
        let slug = slugify(topic, SLUG_MAX_CHARS);
        let name = format!("{}_{}", now.format("%Y%m%d_%H%M%S"), slug);
        let root = base_dir.join(name);

        // Re-creating an existing session is a no-op, not an error.
        fs::create_dir_all(root.join("pdfs"))?;
        fs::create_dir_all(root.join("notes"))?;

        Ok(Self {
            root,
            topic: topic.to_string(),
            created_at: now,
        })
    }

    /// Attach to an existing session root, e.g. for a follow-up turn.
    pub fn open(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::NotFound(format!("session {}", root.display())));
        }

        fs::create_dir_all(root.join("pdfs"))?;
        fs::create_dir_all(root.join("notes"))?;

        let topic = fs::read_to_string(root.join("metadata.json"))
            .ok()
            .and_then(|raw| serde_json::from_str::<serde_json::Value>(&raw).ok())
            .and_then(|meta| meta.get("topic").and_then(|t| t.as_str()).map(String::from))
            .unwrap_or_default();

        Ok(Self {
            root: root.to_path_buf(),
            topic,
            created_at: Local::now(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    fn pdfs_dir(&self) -> PathBuf {
        self.root.join("pdfs")
    }

    fn notes_dir(&self) -> PathBuf {
        self.root.join("notes")
    }

    pub fn write_metadata(&self, model: &str) -> Result<()> {
        let meta = serde_json::json!({
            "topic": self.topic,
            "model": model,
            "created_at": self.created_at,
        });
        fs::write(
            self.root.join("metadata.json"),
            serde_json::to_string_pretty(&meta)?,
        )?;
        Ok(())
    }

    /// Stores a downloaded document, overwriting any previous download of the
    /// same URL. Returns the filename, not a path: further reads go back
    /// through the session.
    pub fn save_paper(&self, url: &str, bytes: &[u8]) -> Result<String> {
        let filename = filename_for_url(url);
        fs::write(self.pdfs_dir().join(&filename), bytes)?;
        Ok(filename)
    }

    /// Filenames come from the model at runtime and are untrusted: anything
    /// that could resolve outside `pdfs/` is treated as absent.
    pub fn read_paper(&self, filename: &str) -> Result<Vec<u8>> {
        if filename.contains(['/', '\\']) {
            return Err(Error::NotFound(format!("paper {filename}")));
        }
        let path = self.pdfs_dir().join(filename);
        if !path.is_file() {
            return Err(Error::NotFound(format!("paper {filename}")));
        }
        Ok(fs::read(path)?)
    }

    pub fn list_papers(&self) -> Result<Vec<String>> {
        let mut papers = Vec::new();
        for entry in fs::read_dir(self.pdfs_dir())? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                papers.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(papers)
    }

    /// Writes a note as `YYYYMMDD_HHMMSS_<title-prefix>.json`. Two notes
    /// saved in the same second with the same derived name get a monotonic
    /// `_2`, `_3`, ... suffix rather than clobbering each other.
    pub fn save_note(&self, note: &Note) -> Result<String> {
        let base = format!(
            "{}_{}",
            note.created_at.format("%Y%m%d_%H%M%S"),
            slugify(&note.title, SLUG_MAX_CHARS),
        );

        let dir = self.notes_dir();
        let mut filename = format!("{base}.json");
        let mut counter = 1u32;
        while dir.join(&filename).exists() {
            counter += 1;
            filename = format!("{base}_{counter}.json");
        }

        fs::write(dir.join(&filename), serde_json::to_string_pretty(note)?)?;
        Ok(filename)
    }

    /// Notes in filesystem enumeration order. Callers that need chronology
    /// sort on `created_at`, not on this ordering. Files that do not parse
    /// as notes are skipped with a warning.
    pub fn list_notes(&self) -> Result<Vec<Note>> {
        let dir = self.notes_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut notes = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match serde_json::from_str::<Note>(&fs::read_to_string(&path)?) {
                Ok(note) => notes.push(note),
                Err(err) => {
                    tracing::warn!(file = %path.display(), error = %err, "skipping malformed note");
                }
            }
        }
        Ok(notes)
    }

    /// Always overwrites `report.md` at the session root.
    pub fn write_report(&self, body: &str, title: &str) -> Result<PathBuf> {
        let path = self.root.join("report.md");
        let contents = format!(
            "# {title}\n\n*Generated: {}*\n\n{body}",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn read_report(&self) -> Option<String> {
        fs::read_to_string(self.root.join("report.md")).ok()
    }

    pub fn write_completion(&self, stats: &serde_json::Value) -> Result<()> {
        let completion = serde_json::json!({
            "completed_at": Local::now(),
            "stats": stats,
        });
        fs::write(
            self.root.join("completion.json"),
            serde_json::to_string_pretty(&completion)?,
        )?;
        Ok(())
    }
}

/// Filesystem-safe slug: keep alphanumerics, hyphens and underscores,
/// collapse whitespace runs to single underscores, bound the length.
pub fn slugify(text: &str, max_chars: usize) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();

    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .take(max_chars)
        .collect()
}

/// Deterministic filename for a downloaded document: the URL's last path
/// segment when it already names a PDF, otherwise `<host>_<hash>.pdf` from a
/// stable hash of the full URL. Never random, so retries land on the same
/// file.
pub fn filename_for_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let segment = without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("");

    let sanitized: String = segment
        .chars()
        .map(|c| {
            if matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') {
                '_'
            } else {
                c
            }
        })
        .take(FILENAME_MAX_CHARS)
        .collect();

    if sanitized.len() > 4 && sanitized.to_ascii_lowercase().ends_with(".pdf") {
        return sanitized;
    }

    let digest = Sha256::digest(url.as_bytes());
    let hash: String = digest.iter().take(4).map(|b| format!("{b:02x}")).collect();

    let host: String = url
        .split("//")
        .nth(1)
        .and_then(|rest| rest.split('/').next())
        .unwrap_or("download")
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '.' { c } else { '_' })
        .collect();

    format!("{host}_{hash}.pdf")
}
