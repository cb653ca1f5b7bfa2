use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::errors::{AppError, AppResult};
use crate::identity::IdentityRecord;

const STORE_VERSION: u32 = 1;

/// Load/save contract for the whole identity table.
pub trait IdentityPersistence: Send + Sync {
    /// A missing table is an empty table.
    fn load(&self) -> AppResult<Vec<IdentityRecord>>;

    /// Replaces the durable table with `records`. Either all of it lands or none of it.
    fn save(&self, records: &[IdentityRecord]) -> AppResult<()>;

    fn location(&self) -> PathBuf;
}

#[derive(Serialize, Deserialize)]
struct IdentityDocument {
    version: u32,
    identities: Vec<IdentityRecord>,
}

#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IdentityPersistence for JsonFilePersistence {
    fn load(&self) -> AppResult<Vec<IdentityRecord>> {
        read_identity_table(&self.path)
    }

    fn save(&self, records: &[IdentityRecord]) -> AppResult<()> {
        write_identity_table(&self.path, records)
    }

    fn location(&self) -> PathBuf {
        self.path.clone()
    }
}

pub fn read_identity_table(path: &Path) -> AppResult<Vec<IdentityRecord>> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(AppError::StoreRead {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let document: IdentityDocument =
        serde_json::from_slice(&data).map_err(|err| AppError::InvalidStore {
            path: path.to_path_buf(),
            message: format!("invalid identity table contents: {err}"),
        })?;
    if document.version != STORE_VERSION {
        return Err(AppError::InvalidStore {
            path: path.to_path_buf(),
            message: format!(
                "unsupported identity table version {} (expected {STORE_VERSION})",
                document.version
            ),
        });
    }
    Ok(document.identities)
}

/// Writes through a temporary sibling file, syncs it and renames it over `path`.
pub fn write_identity_table(path: &Path, records: &[IdentityRecord]) -> AppResult<()> {
    let write_err = |source: io::Error| AppError::StoreWrite {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(write_err)?;

    let document = IdentityDocument {
        version: STORE_VERSION,
        identities: records.to_vec(),
    };
    let serialized = serde_json::to_vec_pretty(&document)?;

    let tmp = stage_table(parent, &serialized).map_err(write_err)?;
    tmp.persist(path).map_err(|err| write_err(err.error))?;
    Ok(())
}

/// Writes `contents` into a private, synced temporary file inside `dir`.
fn stage_table(dir: &Path, contents: &[u8]) -> io::Result<NamedTempFile> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let file = tmp.as_file_mut();
        {
            let mut writer = BufWriter::new(&mut *file);
            writer.write_all(contents)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))?;
        }

        file.sync_all()?;
    }
    Ok(tmp)
}
