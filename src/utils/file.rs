use std::path::{Path, PathBuf};

use crate::errors::{AppError, Result};

/// A file someone wants to add, either already on disk or described by size.
#[derive(Debug, Clone)]
pub enum FileCandidate {
    Bytes(u64),
    Path(PathBuf),
}

impl FileCandidate {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        FileCandidate::Path(path.as_ref().to_path_buf())
    }

    /// Size of the candidate in bytes.
    pub async fn size(&self) -> Result<u64> {
        match self {
            FileCandidate::Bytes(bytes) => Ok(*bytes),
            FileCandidate::Path(path) => {
                let metadata = tokio::fs::metadata(path).await?;
                if !metadata.is_file() {
                    return Err(AppError::Validation(format!(
                        "{} is not a regular file",
                        path.display()
                    )));
                }
                Ok(metadata.len())
            }
        }
    }
}

impl From<u64> for FileCandidate {
    fn from(bytes: u64) -> Self {
        FileCandidate::Bytes(bytes)
    }
}

/// Sum the sizes of every regular file below `root`.
///
/// A missing root counts as empty. Symlinks are not followed.
pub async fn directory_size(root: &Path) -> Result<u64> {
    let mut total = 0u64;
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                total += entry.metadata().await?.len();
            }
        }
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_candidate_size_from_bytes_and_path() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("upload.bin");
        tokio::fs::write(&path, vec![0u8; 2048]).await.unwrap();

        assert_eq!(FileCandidate::from(512u64).size().await.unwrap(), 512);
        assert_eq!(FileCandidate::from_path(&path).size().await.unwrap(), 2048);
    }

    #[tokio::test]
    async fn test_candidate_size_rejects_directory() {
        let temp_dir = tempdir().unwrap();
        let result = FileCandidate::from_path(temp_dir.path()).size().await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_directory_size_walks_nested_dirs() {
        let temp_dir = tempdir().unwrap();
        let nested = temp_dir.path().join("a/b");
        tokio::fs::create_dir_all(&nested).await.unwrap();
        tokio::fs::write(temp_dir.path().join("top.txt"), b"hello").await.unwrap();
        tokio::fs::write(nested.join("deep.txt"), vec![1u8; 100]).await.unwrap();

        assert_eq!(directory_size(temp_dir.path()).await.unwrap(), 105);
    }

    #[tokio::test]
    async fn test_directory_size_missing_root_is_empty() {
        let temp_dir = tempdir().unwrap();
        let missing = temp_dir.path().join("nope");
        assert_eq!(directory_size(&missing).await.unwrap(), 0);
    }
}
