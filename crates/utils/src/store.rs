use std::{fs, path::Path};

use eyre::{Result, WrapErr};
use serde::{de::DeserializeOwned, Serialize};

/// Write the trace document to `path`.
///
/// The content goes to a sibling temporary file first and is then renamed over the
/// target, so readers never observe a partially written document.
pub fn write_trace(path: &Path, document: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .wrap_err_with(|| format!("failed to create {}", parent.display()))?;
    }

    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    let staging = Path::new(&staging);

    trace!("writing trace: {:?}", path);
    fs::write(staging, document)
        .wrap_err_with(|| format!("failed to write {}", staging.display()))?;
    fs::rename(staging, path).wrap_err_with(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

/// Load a JSON file. Returns `Ok(None)` if the file does not exist.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    trace!("loading json: {:?}", path);
    if !path.exists() {
        return Ok(None);
    }

    let content =
        fs::read_to_string(path).wrap_err_with(|| format!("failed to read {}", path.display()))?;
    let data = serde_json::from_str(&content)
        .wrap_err_with(|| format!("{} is not a valid document", path.display()))?;
    Ok(Some(data))
}

/// Save `data` as pretty JSON, creating parent directories as needed.
pub fn save_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(data)?;
    write_trace(path, &content)
}
