use anyhow::{Context, Result};
use jwalk::WalkDir;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Zips every file under `source_dir`, deflated, with entry names relative
/// to `source_dir` and `/`-separated. Entries are written in sorted order.
pub fn create_zip_archive(source_dir: &Path, zip_path: &Path) -> Result<PathBuf> {
    tracing::info!("Creating archive {:?} from {:?}", zip_path, source_dir);

    if let Some(parent) = zip_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    let file = File::create(zip_path)
        .with_context(|| format!("Failed to create archive: {:?}", zip_path))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(source_dir).sort(true) {
        let entry = entry.with_context(|| format!("Failed to walk {:?}", source_dir))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path
            .strip_prefix(source_dir)
            .with_context(|| format!("Failed to get relative path from {:?}", path))?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let content = fs::read(&path).with_context(|| format!("Failed to read {:?}", path))?;
        zip.start_file(name.as_str(), options)
            .with_context(|| format!("Failed to add {} to archive", name))?;
        zip.write_all(&content)
            .with_context(|| format!("Failed to write {} to archive", name))?;
    }

    let mut writer = zip.finish().context("Failed to finish archive")?;
    writer.flush().context("Failed to flush archive")?;

    let size = fs::metadata(zip_path).map(|m| m.len()).unwrap_or(0);
    tracing::info!("Archive created: {:?} ({} bytes)", zip_path, size);

    Ok(zip_path.to_path_buf())
}
