#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use marktask::config::{Config, CONFIG_FILE};
use tempfile::TempDir;

/// A board root in a temp directory
pub struct TestBoard {
    dir: TempDir,
}

impl TestBoard {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_file(&self, rel_path: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(&path, contents).expect("write file");
        path
    }

    pub fn read_file(&self, rel_path: &str) -> String {
        fs::read_to_string(self.dir.path().join(rel_path)).expect("read file")
    }

    pub fn exists(&self, rel_path: &str) -> bool {
        self.dir.path().join(rel_path).exists()
    }

    pub fn write_config(&self, contents: &str) -> PathBuf {
        self.write_file(CONFIG_FILE, contents)
    }

    pub fn config(&self) -> Config {
        Config::load_from_root(self.dir.path())
    }
}
