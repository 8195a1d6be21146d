use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::html_parser::ResourceType;
use crate::mirror::MirrorSnapshot;

/// Writes a mirrored page into its project directory.
#[derive(Clone)]
pub struct FileManager {
    base_dir: PathBuf,
}

impl FileManager {
    pub fn new(base_dir: &Path) -> Result<Self> {
        let base_dir = base_dir.to_path_buf();
        fs::create_dir_all(&base_dir)
            .with_context(|| format!("Failed to create base directory: {:?}", base_dir))?;

        Ok(Self { base_dir })
    }

    /// Creates the fixed category subfolders, even when some stay empty.
    pub fn create_project_structure(&self) -> Result<()> {
        for resource_type in [
            ResourceType::Stylesheet,
            ResourceType::Script,
            ResourceType::Image,
            ResourceType::Font,
        ] {
            let dir = self.base_dir.join(resource_type.subfolder());
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create directory: {:?}", dir))?;
        }
        Ok(())
    }

    pub fn create_directories_for_path(&self, local_path: &str) -> Result<PathBuf> {
        let path = self.resolve(local_path);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }

        Ok(path)
    }

    pub fn save_file(&self, local_path: &str, content: &[u8]) -> Result<PathBuf> {
        let file_path = self.create_directories_for_path(local_path)?;

        let mut file = fs::File::create(&file_path)
            .with_context(|| format!("Failed to create file: {:?}", file_path))?;

        file.write_all(content)
            .with_context(|| format!("Failed to write to file: {:?}", file_path))?;

        Ok(file_path)
    }

    /// Persists every file of the snapshot. Returns the paths written, in
    /// snapshot order.
    pub fn write_snapshot(&self, snapshot: &MirrorSnapshot) -> Result<Vec<PathBuf>> {
        self.create_project_structure()?;

        let mut written = Vec::with_capacity(snapshot.files.len());
        for (local_path, content) in &snapshot.files {
            let path = self.save_file(local_path, content)?;
            tracing::debug!("Saved {:?}", path);
            written.push(path);
        }
        Ok(written)
    }

    pub fn get_relative_path(&self, file_path: &Path) -> Result<PathBuf> {
        file_path
            .strip_prefix(&self.base_dir)
            .map(|p| p.to_path_buf())
            .with_context(|| format!("Failed to get relative path from {:?}", file_path))
    }

    pub fn file_exists(&self, local_path: &str) -> bool {
        self.resolve(local_path).exists()
    }

    fn resolve(&self, local_path: &str) -> PathBuf {
        let mut path = self.base_dir.clone();
        for segment in local_path.split('/').filter(|s| !s.is_empty() && *s != "..") {
            path.push(segment);
        }
        path
    }
}
