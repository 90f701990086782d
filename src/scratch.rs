use std::fs;
use std::path::{Path, PathBuf};

use tempfile::{Builder, TempDir};

use crate::error::FetchError;

/// Working directory for raw downloads. Removed when dropped, whichever way
/// the fetch ends.
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    pub fn new(root: Option<&Path>) -> Result<Self, FetchError> {
        let mut builder = Builder::new();
        builder.prefix("kira-sra-");
        let dir = match root {
            Some(root) => {
                fs::create_dir_all(root).map_err(|err| FetchError::io(root, err))?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .map_err(|err| FetchError::Filesystem(format!("create scratch dir: {err}")))?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Staging area for renamed single-end files.
    pub fn single_dir(&self) -> PathBuf {
        self.join("single")
    }

    /// Staging area for renamed paired-end files.
    pub fn paired_dir(&self) -> PathBuf {
        self.join("paired")
    }

    pub fn contains(&self, name: &str) -> bool {
        self.join(name).is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new(Some(root.path())).unwrap();
        let path = scratch.path().to_path_buf();
        fs::write(scratch.join("SRR1.fastq"), b"@r\nA\n+\nI\n").unwrap();
        assert!(scratch.contains("SRR1.fastq"));
        drop(scratch);
        assert!(!path.exists());
    }
}
