//! Per-project state locations under `~/.hotswap`.
//!
//! ```text
//! ~/.hotswap/
//!   projects/
//!     <project>/
//!       daemon.sock
//!       boot.txt
//! ```
//!
//! `<project>` is the watched root's directory name.

use std::path::{Path, PathBuf};

pub const DAEMON_SOCKET: &str = "daemon.sock";
pub const BOOT_MARKER: &str = "boot.txt";

/// Used when the root has no usable directory name (e.g. `/`).
const FALLBACK_PROJECT: &str = "default";

pub fn hotswap_root(home: &Path) -> PathBuf {
    home.join(".hotswap")
}

pub fn projects_root(home: &Path) -> PathBuf {
    hotswap_root(home).join("projects")
}

pub fn project_name(root: &Path) -> String {
    root.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_PROJECT.to_string())
}

pub fn state_dir_at(home: &Path, project: &str) -> PathBuf {
    projects_root(home).join(project)
}

pub fn socket_path_at(home: &Path, project: &str) -> PathBuf {
    state_dir_at(home, project).join(DAEMON_SOCKET)
}

pub fn boot_marker_path_at(home: &Path, project: &str) -> PathBuf {
    state_dir_at(home, project).join(BOOT_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn state_paths_are_scoped_by_project() {
        let home = Path::new("/home/dev");
        let project = project_name(Path::new("/work/mygame"));
        assert_eq!(project, "mygame");
        assert_eq!(
            socket_path_at(home, &project),
            PathBuf::from("/home/dev/.hotswap/projects/mygame/daemon.sock")
        );
        assert_eq!(
            boot_marker_path_at(home, &project),
            PathBuf::from("/home/dev/.hotswap/projects/mygame/boot.txt")
        );
    }

    #[rstest]
    #[case("/work/mygame", "mygame")]
    #[case("/work/mygame/", "mygame")]
    #[case("relative/demo", "demo")]
    #[case("/", "default")]
    fn project_name_uses_root_directory_name(#[case] root: &str, #[case] expected: &str) {
        assert_eq!(project_name(Path::new(root)), expected);
    }
}
