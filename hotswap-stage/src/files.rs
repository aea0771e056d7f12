//! File access collaborator.
//!
//! The stager never touches the filesystem directly; it goes through
//! [`FileAccess`] so hosts can serve files from an archive, a VFS, or memory.
//! [`DiskFiles`] is the plain-disk implementation rooted at the project root.

use std::io::{self, ErrorKind};
use std::path::{Component, Path, PathBuf};

use hotswap_core::ReloadPath;

/// Synchronous file operations keyed by [`ReloadPath`].
pub trait FileAccess: Send {
    /// `Ok(None)` when the file does not exist.
    fn read_file(&self, path: &ReloadPath) -> io::Result<Option<Vec<u8>>>;

    fn write_file(&self, path: &ReloadPath, contents: &[u8]) -> io::Result<()>;

    fn path_exists(&self, path: &ReloadPath) -> bool;
}

/// Files on disk under `root`.
#[derive(Debug, Clone)]
pub struct DiskFiles {
    root: PathBuf,
}

impl DiskFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Absolute location of `path`.
    pub fn resolve(&self, path: &ReloadPath) -> PathBuf {
        path.as_str()
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |acc, part| acc.join(part))
    }

    /// Map an absolute path reported by a watcher back to a [`ReloadPath`].
    ///
    /// `None` for paths outside the root.
    pub fn reload_path_for(&self, absolute: &Path) -> Option<ReloadPath> {
        let relative = absolute.strip_prefix(&self.root).ok()?;
        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
                Component::CurDir => {}
                _ => return None,
            }
        }
        if parts.is_empty() {
            return None;
        }
        Some(ReloadPath::from(parts.join("/")))
    }
}

impl FileAccess for DiskFiles {
    fn read_file(&self, path: &ReloadPath) -> io::Result<Option<Vec<u8>>> {
        match std::fs::read(self.resolve(path)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Write flow: create parent dirs → `<name>.hotswap.tmp` sibling → `rename`.
    fn write_file(&self, path: &ReloadPath, contents: &[u8]) -> io::Result<()> {
        let target = self.resolve(path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file_name = target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| io::Error::new(ErrorKind::InvalidInput, "path has no file name"))?;
        let tmp = target.with_file_name(format!("{file_name}.hotswap.tmp"));
        std::fs::write(&tmp, contents)?;
        if let Err(err) = std::fs::rename(&tmp, &target) {
            let _ = std::fs::remove_file(&tmp);
            return Err(err);
        }
        Ok(())
    }

    fn path_exists(&self, path: &ReloadPath) -> bool {
        self.resolve(path).is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_reads_as_none() {
        let root = TempDir::new().unwrap();
        let files = DiskFiles::new(root.path());
        let read = files.read_file(&ReloadPath::from("app/none.rb")).unwrap();
        assert!(read.is_none());
        assert!(!files.path_exists(&ReloadPath::from("app/none.rb")));
    }

    #[test]
    fn write_creates_parents_and_cleans_tmp() {
        let root = TempDir::new().unwrap();
        let files = DiskFiles::new(root.path());
        let path = ReloadPath::from("app/mailbox-processed/mailbox-7.rb");

        files.write_file(&path, b"puts 7").unwrap();

        assert_eq!(files.read_file(&path).unwrap(), Some(b"puts 7".to_vec()));
        let tmp = root
            .path()
            .join("app/mailbox-processed/mailbox-7.rb.hotswap.tmp");
        assert!(!tmp.exists(), "tmp file should be removed after atomic rename");
    }

    #[test]
    fn reload_path_for_strips_root() {
        let root = TempDir::new().unwrap();
        let files = DiskFiles::new(root.path());
        let abs = root.path().join("app").join("lib").join("a.rb");
        assert_eq!(
            files.reload_path_for(&abs),
            Some(ReloadPath::from("app/lib/a.rb"))
        );
        assert_eq!(files.reload_path_for(Path::new("/elsewhere/a.rb")), None);
        assert_eq!(files.reload_path_for(root.path()), None);
    }
}
