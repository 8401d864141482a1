use std::path::{Path, PathBuf};

pub trait StorageManager: Send + Sync {
    fn write(&self, ident: &str, data: &[u8]) -> std::io::Result<()>;
    fn read(&self, ident: &str) -> std::io::Result<Vec<u8>>;
    fn exists(&self, ident: &str) -> bool;
    fn delete(&self, ident: &str) -> std::io::Result<()>;
    fn list(&self) -> Vec<String>;
}

#[derive(Clone)]
pub struct BackendLocal {
    pub base_dir: PathBuf,
}

impl BackendLocal {
    pub fn new(storage_dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(storage_dir)?;
        Ok(BackendLocal {
            base_dir: storage_dir.to_path_buf(),
        })
    }
}

impl StorageManager for BackendLocal {
    fn exists(&self, ident: &str) -> bool {
        self.base_dir.join(ident).is_file()
    }

    fn read(&self, ident: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.base_dir.join(ident))
    }

    fn write(&self, ident: &str, data: &[u8]) -> std::io::Result<()> {
        let path = self.base_dir.join(ident);
        let temp_path = self.base_dir.join(format!("{ident}.tmp"));

        std::fs::write(&temp_path, data)?;

        std::fs::rename(&temp_path, &path)
    }

    fn delete(&self, ident: &str) -> std::io::Result<()> {
        std::fs::remove_file(self.base_dir.join(ident))
    }

    fn list(&self) -> Vec<String> {
        std::fs::read_dir(&self.base_dir)
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok())
                    .filter_map(|entry| {
                        let path = entry.path();
                        if path.is_file() {
                            path.file_name()
                                .and_then(|name| name.to_str())
                                .map(|s| s.to_string())
                        } else {
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}
