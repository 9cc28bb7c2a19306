//! On-disk storage for attachment files.
//!
//! Files are written as `{stem}-{millis}{ext}` under the upload directory and
//! referenced from attachment records as `/uploads/{file}`. A name already
//! taken in the same millisecond gets a `-{n}` suffix before the extension.

use anyhow::{Result, anyhow};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// URL prefix under which stored files are referenced.
pub const PUBLIC_PREFIX: &str = "/uploads/";

const MAX_NAME_ATTEMPTS: u32 = 1000;

#[derive(Debug, Clone)]
pub struct UploadDir {
    root: PathBuf,
}

impl UploadDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `data` under a unique name derived from `original_name`.
    /// Returns the public path recorded on the attachment.
    pub fn save(&self, original_name: &str, data: &[u8]) -> Result<String> {
        std::fs::create_dir_all(&self.root)?;
        let timestamp = crate::db::now_ms();
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let file_name = stored_file_name(original_name, timestamp, attempt);
            let mut file = match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.root.join(&file_name))
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            };
            file.write_all(data)?;
            return Ok(format!("{}{}", PUBLIC_PREFIX, file_name));
        }
        Err(anyhow!(
            "No free file name for {} in {}",
            original_name,
            self.root.display()
        ))
    }

    pub fn read(&self, public_path: &str) -> Result<Vec<u8>> {
        let path = self.resolve(public_path)?;
        Ok(std::fs::read(path)?)
    }

    /// Remove a stored file. Missing files are not an error.
    pub fn remove(&self, public_path: &str) -> Result<()> {
        let path = self.resolve(public_path)?;
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Map a public path back to a file inside the upload directory.
    fn resolve(&self, public_path: &str) -> Result<PathBuf> {
        let file_name = public_path
            .strip_prefix(PUBLIC_PREFIX)
            .unwrap_or(public_path);
        if file_name.is_empty()
            || file_name.contains('/')
            || file_name.contains('\\')
            || file_name == ".."
        {
            return Err(anyhow!("Invalid upload path: {}", public_path));
        }
        Ok(self.root.join(file_name))
    }
}

/// Build the stored file name: sanitized stem, timestamp, a collision suffix
/// when `attempt > 0`, original extension.
pub fn stored_file_name(original_name: &str, timestamp_ms: i64, attempt: u32) -> String {
    let base = Path::new(original_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload");
    let (stem, ext) = match base.rfind('.') {
        Some(idx) if idx > 0 => (&base[..idx], &base[idx..]),
        _ => (base, ""),
    };

    let safe = |s: &str| -> String {
        s.chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    };

    let stem = safe(stem);
    let stem = if stem.is_empty() { "upload".to_string() } else { stem };
    if attempt == 0 {
        format!("{}-{}{}", stem, timestamp_ms, safe(ext))
    } else {
        format!("{}-{}-{}{}", stem, timestamp_ms, attempt, safe(ext))
    }
}

/// Guess a MIME type from a file name, for uploads that arrive without one.
pub fn guess_mimetype(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    match ext.as_deref() {
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        Some("md") => "text/markdown",
        Some("html") | Some("htm") => "text/html",
        Some("csv") => "text/csv",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}
