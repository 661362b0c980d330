//! Write-then-rename persistence shared by every store file.

use std::io::{BufWriter, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use super::error::{SerializeError, StateError};

/// Serialize `value` into a temporary file next to `destination`, then
/// rename it over `destination`.
///
/// The temporary file lives in the same directory so the rename stays on one
/// filesystem. If `serialize` fails the temporary file is removed on drop and
/// `destination` keeps its previous content.
pub fn atomic_write<T, F>(destination: &Path, value: &T, serialize: F) -> Result<(), StateError>
where
    T: ?Sized,
    F: FnOnce(&T, &mut dyn Write) -> Result<(), SerializeError>,
{
    let dir = match destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let temp = NamedTempFile::new_in(dir).map_err(|e| StateError::io(dir, e))?;

    let mut writer = BufWriter::new(temp);
    serialize(value, &mut writer).map_err(|source| StateError::Serialize {
        path: destination.to_path_buf(),
        source,
    })?;
    let temp = writer
        .into_inner()
        .map_err(|e| StateError::io(destination, e.into_error()))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| StateError::io(temp.path(), e))?;

    temp.persist(destination)
        .map_err(|e| StateError::io(destination, e.error))?;
    tracing::debug!("Wrote {}", destination.display());
    Ok(())
}

/// Serializer for pretty JSON with a trailing newline.
pub fn pretty_json<T: serde::Serialize + ?Sized>(
    value: &T,
    out: &mut dyn Write,
) -> Result<(), SerializeError> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    out.write_all(b"\n")?;
    Ok(())
}
