//! Directory-backed key repository
//!
//! Every document is one `<name>.json` file. Writes land in a hidden
//! temporary file first and are hard-linked into place, so readers never
//! see a partial document and concurrent writers never replace each other. Files that cannot be read are skipped when they hold a
//! key and fail the read when they hold a revocation: dropping a revocation
//! would silently re-enable a key.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use ringfence_core::KeyRepository;
use ringfence_domain::{DataProtectionError, Result};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::io_failure;

const EXTENSION: &str = "json";
const REVOCATION_PREFIX: &str = "revocation";
const MAX_PUBLISH_ATTEMPTS: usize = 8;

#[derive(Debug, Clone)]
pub struct FileSystemKeyRepository {
    directory: PathBuf,
}

impl FileSystemKeyRepository {
    /// Open `directory`, creating it if needed.
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory)
            .map_err(|e| io_failure("create_dir", &directory, e))?;
        info!(path = %directory.display(), "key_repository.file_system.opened");
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Paths of every stored document.
    fn document_paths(&self) -> Result<Vec<PathBuf>> {
        let entries =
            fs::read_dir(&self.directory).map_err(|e| io_failure("read_dir", &self.directory, e))?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| io_failure("read_dir", &self.directory, e))?.path();
            let hidden = file_name(&path).starts_with('.');
            let is_document = path.extension().is_some_and(|ext| ext == EXTENSION);
            if path.is_file() && is_document && !hidden {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Parse one document, deciding from its name whether a failure is fatal.
    fn read_document(path: &Path) -> Result<Option<Value>> {
        let parsed = fs::read(path)
            .map_err(|e| io_failure("read", path, e))
            .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).map_err(Into::into));

        match parsed {
            Ok(value) => Ok(Some(value)),
            Err(err) if file_name(path).starts_with(REVOCATION_PREFIX) => {
                Err(DataProtectionError::corruption(format!(
                    "revocation file {} is unreadable: {err}",
                    path.display()
                )))
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "key_repository.file_system.skipped_unreadable");
                Ok(None)
            }
        }
    }

    /// Link the finished temporary file under a name derived from
    /// `friendly_name`. Linking never replaces an existing file, so a taken
    /// name falls back to a suffixed one instead of overwriting it.
    fn publish(&self, temp: &Path, friendly_name: &str) -> Result<PathBuf> {
        let stem = sanitize(friendly_name);
        let mut target = self.directory.join(format!("{stem}.{EXTENSION}"));
        for _ in 0..MAX_PUBLISH_ATTEMPTS {
            match fs::hard_link(temp, &target) {
                Ok(()) => return Ok(target),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!(path = %target.display(), "key_repository.file_system.name_taken");
                    target = self
                        .directory
                        .join(format!("{stem}-{}.{EXTENSION}", Uuid::new_v4().simple()));
                }
                Err(e) => return Err(io_failure("link", &target, e)),
            }
        }
        Err(DataProtectionError::storage(
            "link",
            format!("no free file name for '{friendly_name}'"),
        ))
    }
}

impl KeyRepository for FileSystemKeyRepository {
    fn get_all_elements(&self) -> Result<Vec<Value>> {
        let mut elements = Vec::new();
        for path in self.document_paths()? {
            if let Some(value) = Self::read_document(&path)? {
                elements.push(value);
            }
        }
        debug!(count = elements.len(), "key_repository.file_system.read");
        Ok(elements)
    }

    fn store_element(&self, element: Value, friendly_name: &str) -> Result<()> {
        let temp = self.directory.join(format!(".{}.tmp", Uuid::new_v4().simple()));
        let bytes = serde_json::to_vec_pretty(&element)?;

        let published = fs::File::create(&temp)
            .and_then(|mut file| {
                file.write_all(&bytes)?;
                file.sync_all()
            })
            .map_err(|e| io_failure("write", &temp, e))
            .and_then(|()| self.publish(&temp, friendly_name));

        if let Err(e) = fs::remove_file(&temp) {
            debug!(path = %temp.display(), error = %e, "key_repository.file_system.temp_left_behind");
        }
        let target = published?;

        info!(path = %target.display(), "key_repository.file_system.stored");
        Ok(())
    }

    fn supports_deletion(&self) -> bool {
        true
    }

    fn delete_elements(&self, selector: &mut dyn FnMut(&Value) -> bool) -> Result<usize> {
        let mut removed = 0;
        for path in self.document_paths()? {
            let Some(value) = Self::read_document(&path)? else {
                continue;
            };
            if selector(&value) {
                fs::remove_file(&path).map_err(|e| io_failure("remove", &path, e))?;
                removed += 1;
            }
        }
        info!(removed, "key_repository.file_system.deleted");
        Ok(removed)
    }
}

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|name| name.to_str()).unwrap_or_default()
}

/// Restrict a friendly name to characters safe in file names everywhere.
fn sanitize(friendly_name: &str) -> String {
    let cleaned: String = friendly_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_') { c } else { '-' })
        .collect();
    if cleaned.is_empty() {
        Uuid::new_v4().simple().to_string()
    } else {
        cleaned
    }
}
