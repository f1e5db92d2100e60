// utils.rs
// Description: File helpers shared by dataset and checkpoint persistence.
// History:
// - 2026-10-18: Atomic write via temp file and rename.

use std::path::Path;

use crate::error::Result;

/// Writes `s_content` next to `path` first, then renames over it.
pub fn write_file_atomic(path: &Path, s_content: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }

    let mut s_tmp = path.as_os_str().to_owned();
    s_tmp.push(".tmp");
    let tmp_path = Path::new(&s_tmp);

    std::fs::write(tmp_path, s_content)?;
    std::fs::rename(tmp_path, path)?;
    Ok(())
}
