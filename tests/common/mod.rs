//! Shared helpers for integration tests: a temporary project and a fake
//! `global` executable that replays canned cross-reference output.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct TestProject {
    pub dir: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn add_file(&self, path: &str, content: &str) -> PathBuf {
        let file_path = self.dir.path().join(path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        fs::write(&file_path, content).expect("Failed to write file");
        file_path
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Header the fake `global` reports definitions in
    pub fn header(&self) -> PathBuf {
        self.path().join("include").join("nfs.h")
    }

    /// Install a fake `global` script and return its path.
    ///
    /// The script records its arguments (one per line) in `args.log` and its
    /// physical working directory in `cwd.log`, then prints canned output
    /// for the flag set it was called with.
    #[cfg(unix)]
    pub fn fake_global(&self) -> PathBuf {
        let root = self.path().display().to_string();
        let header = self.header().display().to_string();
        let script = format!(
            r#"#!/bin/sh
printf '%s\n' "$@" > "{root}/args.log"
pwd -P > "{root}/cwd.log"
case "$*" in
  *--version*)
    echo "global (GNU GLOBAL) 6.6.10"
    ;;
  *-xaf*)
    echo "nfs_fh 19 {header} struct nfs_fh {{"
    echo "nfs_lookup 42 {header} int nfs_lookup(struct nfs_fh *fh);"
    echo "NFS_OK 7 {header} enum nfs_stat {{ NFS_OK = 0 }};"
    echo "nfs_count 3 {header} int nfs_count;"
    ;;
  *-xra*)
    echo "nfs_fh 5 {root}/src/main.c static struct nfs_fh *fh;"
    echo "nfs_fh 12 {root}/my%20dir/a.c nfs_fh *other;"
    echo "garbage"
    ;;
  *-xa*)
    echo "nfs_fh 19 {header} struct nfs_fh {{"
    echo "nfs_fh 2 {header} #define FH handle"
    ;;
  *-c*)
    echo "nfs_fh"
    echo ""
    echo "nfs_fh3"
    ;;
esac
"#
        );

        self.write_script("global", &script)
    }

    /// Write an executable shell script under `bin/` and return its path
    #[cfg(unix)]
    pub fn write_script(&self, name: &str, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = self.path().join("bin").join(name);
        fs::create_dir_all(path.parent().unwrap()).expect("Failed to create bin dir");
        fs::write(&path, script).expect("Failed to write script");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .expect("Failed to make script executable");
        path
    }

    /// Arguments the fake `global` received on its last run
    pub fn recorded_args(&self) -> Vec<String> {
        fs::read_to_string(self.path().join("args.log"))
            .expect("fake global did not run")
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Working directory of the fake `global` on its last run
    pub fn recorded_cwd(&self) -> PathBuf {
        PathBuf::from(
            fs::read_to_string(self.path().join("cwd.log"))
                .expect("fake global did not run")
                .trim_end(),
        )
    }
}

pub mod sample_code {
    /// `nfs_fh` spans columns 7..13 of line 0
    pub const C_SOURCE: &str = "struct nfs_fh *fh;\nint main(void) { return 0; }\n";
}
