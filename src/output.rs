use crate::error::{ExportError, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Writes `bytes` to `path` all-or-nothing.
///
/// The bytes go to a temporary file next to `path` which is then renamed over
/// it, so a failure never leaves a truncated PDF behind. A replaced file
/// keeps its permissions; a new one gets the same mode `File::create` would
/// give it.
pub fn persist(path: &Path, bytes: &[u8]) -> Result<u64> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut builder = tempfile::Builder::new();
    builder.prefix(".report-pdf");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        // Narrowed by the process umask when the file is created.
        builder.permissions(fs::Permissions::from_mode(0o666));
    }

    let mut file = builder
        .tempfile_in(dir)
        .map_err(|err| ExportError::write_failed(path, err))?;
    if let Ok(existing) = fs::metadata(path) {
        file.as_file()
            .set_permissions(existing.permissions())
            .map_err(|err| ExportError::write_failed(path, err))?;
    }
    file.write_all(bytes)
        .and_then(|_| file.as_file().sync_all())
        .map_err(|err| ExportError::write_failed(path, err))?;
    file.persist(path)
        .map_err(|err| ExportError::write_failed(path, err.error))?;

    Ok(bytes.len() as u64)
}
