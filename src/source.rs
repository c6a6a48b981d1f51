use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use time::OffsetDateTime;

use crate::encoding::{self, EncodingSource, EncodingStrategy};

/// A readable and writable text file, seen by the fixer as a whole.
pub trait ScriptSource {
    /// File name, used for classification and in location labels.
    fn name(&self) -> &str;

    fn path(&self) -> &Path;

    fn read_text(&mut self) -> Result<String>;

    /// Replaces the whole file content.
    fn write_text(&mut self, text: &str) -> Result<()>;
}

/// Text that is already in memory. Writes replace the held text.
#[derive(Debug, Clone)]
pub struct MemorySource {
    path: PathBuf,
    name: String,
    text: String,
    writes: usize,
}

impl MemorySource {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let path = path.into();
        let name = file_name(&path);
        Self {
            path,
            name,
            text: text.into(),
            writes: 0,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl ScriptSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn read_text(&mut self) -> Result<String> {
        Ok(self.text.clone())
    }

    fn write_text(&mut self, text: &str) -> Result<()> {
        self.text = text.to_string();
        self.writes += 1;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct ReadEncoding {
    encoding: &'static Encoding,
    had_bom: bool,
}

/// A file on disk, opened only when read. Writes go back in the encoding the
/// file was read with.
#[derive(Debug)]
pub struct DiskSource<'a> {
    path: PathBuf,
    name: String,
    strategy: &'a EncodingStrategy,
    no_backup: bool,
    read_as: Option<ReadEncoding>,
}

impl<'a> DiskSource<'a> {
    pub fn new(path: impl Into<PathBuf>, strategy: &'a EncodingStrategy, no_backup: bool) -> Self {
        let path = path.into();
        let name = file_name(&path);
        Self {
            path,
            name,
            strategy,
            no_backup,
            read_as: None,
        }
    }
}

impl ScriptSource for DiskSource<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn read_text(&mut self) -> Result<String> {
        let bytes =
            fs::read(&self.path).with_context(|| format!("failed to read {}", self.path.display()))?;
        let decoded = self.strategy.decode(&bytes);
        if decoded.had_errors {
            eprintln!(
                "warning: decoding errors encountered for {} ({} via {}); continuing",
                self.path.display(),
                decoded.encoding.name(),
                decoded.source
            );
        }
        self.read_as = Some(ReadEncoding {
            encoding: decoded.encoding,
            had_bom: decoded.source == EncodingSource::Bom,
        });
        Ok(decoded.text)
    }

    fn write_text(&mut self, text: &str) -> Result<()> {
        let read_as = self.read_as.unwrap_or(ReadEncoding {
            encoding: encoding_rs::UTF_8,
            had_bom: false,
        });
        let encoded = encoding::encode(read_as.encoding, read_as.had_bom, text);
        if encoded.lossy {
            eprintln!(
                "warning: encoding fallback occurred when writing {}; output may be lossy",
                self.path.display()
            );
        }
        let backup = create_backup_if_needed(&self.path, self.no_backup)?;
        write_via_temp(&self.path, &encoded.bytes)
            .with_context(|| format!("writing {}", self.path.display()))?;
        if let Some(bak) = backup {
            eprintln!(
                "backup saved: {} -> {}",
                self.path.display(),
                bak.display()
            );
        }
        eprintln!("applied {}", self.path.display());
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn create_backup_if_needed(path: &Path, no_backup: bool) -> Result<Option<PathBuf>> {
    if no_backup || !path.exists() {
        return Ok(None);
    }

    let mut attempt = 0usize;
    loop {
        let candidate = backup_candidate(path, attempt);
        if !candidate.exists() {
            fs::copy(path, &candidate)
                .with_context(|| format!("creating backup {}", candidate.display()))?;
            return Ok(Some(candidate));
        }
        attempt += 1;
    }
}

fn backup_candidate(path: &Path, index: usize) -> PathBuf {
    let name = file_name(path);
    let suffix = if index == 0 {
        ".bak".to_string()
    } else {
        format!(".bak{index}")
    };
    path.with_file_name(format!("{name}{suffix}"))
}

fn write_via_temp(path: &Path, data: &[u8]) -> Result<()> {
    let base_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let unique = format!(
        ".layerfix-tmp-{}-{}",
        std::process::id(),
        OffsetDateTime::now_utc().unix_timestamp_nanos()
    );
    let temp_path = base_dir.join(unique);
    {
        let mut file = fs::File::create(&temp_path)
            .with_context(|| format!("creating temp file {}", temp_path.display()))?;
        file.write_all(data)
            .with_context(|| format!("writing temp file {}", temp_path.display()))?;
        file.sync_all()
            .with_context(|| format!("syncing temp file {}", temp_path.display()))?;
    }
    fs::rename(&temp_path, path).or_else(|err| {
        let _ = fs::remove_file(&temp_path);
        Err(err).with_context(|| format!("replacing {}", path.display()))
    })?;
    Ok(())
}
