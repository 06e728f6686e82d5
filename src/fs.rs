//! File-system contract of the facade

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use log::{debug, trace};
use tempfile::NamedTempFile;

use crate::error::{LocksmithError, LocksmithResult};

/// Read an input file, classifying failures as not found or not readable
pub(crate) fn read_input(path: &Path) -> LocksmithResult<Vec<u8>> {
    if path.as_os_str().is_empty() {
        return Err(LocksmithError::invalid_arguments("missing input path"));
    }
    if !path.exists() {
        return Err(LocksmithError::FileNotFound(path.to_path_buf()));
    }
    if path.is_dir() {
        return Err(LocksmithError::FileNotReadable(path.to_path_buf()));
    }

    match fs::read(path) {
        Ok(data) => {
            trace!("Read {} bytes from {}", data.len(), path.display());
            Ok(data)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(LocksmithError::FileNotFound(path.to_path_buf()))
        }
        Err(e) => {
            debug!("Reading {} failed: {}", path.display(), e);
            Err(LocksmithError::FileNotReadable(path.to_path_buf()))
        }
    }
}

/// Create the output's parent directory when it is missing
pub(crate) fn prepare_output(path: &Path) -> LocksmithResult<()> {
    if path.as_os_str().is_empty() {
        return Err(LocksmithError::invalid_arguments("missing output path"));
    }
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            debug!("Creating output directory {}", parent.display());
            fs::create_dir_all(parent).map_err(|e| LocksmithError::directory_creation(parent, e))
        }
        _ => Ok(()),
    }
}

/// Replace `path` atomically with `data` and confirm the file exists
pub(crate) fn write_output(path: &Path, data: &[u8]) -> LocksmithResult<()> {
    prepare_output(path)?;
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let failed = |e: io::Error| LocksmithError::WriteFailed(format!("{}: {}", path.display(), e));
    let mut temp = NamedTempFile::new_in(directory).map_err(failed)?;
    temp.write_all(data).map_err(failed)?;
    temp.as_file().sync_all().map_err(failed)?;
    temp.persist(path).map_err(|e| failed(e.error))?;

    if !path.exists() {
        return Err(LocksmithError::WriteFailed(
            "Output file was not created after write operation".to_string(),
        ));
    }
    trace!("Wrote {} bytes to {}", data.len(), path.display());
    Ok(())
}
