//! Flat in-memory filesystem.
//!
//! Files are a name plus bytes; directories are names only. Nothing is
//! persisted: the filesystem lives as long as the object that owns it.

use thiserror::Error;

pub const MAX_FILES: usize = 64;
pub const MAX_DIRS: usize = 16;
/// Longest accepted name in bytes.
pub const MAX_NAME_LEN: usize = 24;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FsError {
    #[error("invalid name {0:?}")]
    InvalidName(String),

    #[error("name {0:?} is longer than {max} bytes", max = MAX_NAME_LEN)]
    NameTooLong(String),

    #[error("no room for {0:?}")]
    Full(String),

    #[error("{0:?} already exists")]
    Exists(String),

    #[error("{0:?} doesn't exist")]
    NotFound(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    name: String,
    content: Vec<u8>,
}

impl File {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct Vfs {
    files: Vec<File>,
    dirs: Vec<String>,
}

fn check_name(name: &str) -> Result<(), FsError> {
    if name.is_empty() || name.contains('/') || name.chars().any(char::is_whitespace) {
        return Err(FsError::InvalidName(name.to_string()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(FsError::NameTooLong(name.to_string()));
    }
    Ok(())
}

impl Vfs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a file, replacing the content of an existing one.
    pub fn create(&mut self, name: &str, content: impl Into<Vec<u8>>) -> Result<(), FsError> {
        check_name(name)?;
        let content = content.into();
        if let Some(file) = self.files.iter_mut().find(|f| f.name == name) {
            file.content = content;
            return Ok(());
        }
        if self.files.len() >= MAX_FILES {
            return Err(FsError::Full(name.to_string()));
        }
        self.files.push(File {
            name: name.to_string(),
            content,
        });
        Ok(())
    }

    pub fn mkdir(&mut self, name: &str) -> Result<(), FsError> {
        check_name(name)?;
        if self.dirs.iter().any(|d| d == name) {
            return Err(FsError::Exists(name.to_string()));
        }
        if self.dirs.len() >= MAX_DIRS {
            return Err(FsError::Full(name.to_string()));
        }
        self.dirs.push(name.to_string());
        Ok(())
    }

    pub fn open(&self, name: &str) -> Option<&File> {
        self.files.iter().find(|f| f.name == name)
    }

    pub fn remove(&mut self, name: &str) -> Result<File, FsError> {
        let pos = self
            .files
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;
        Ok(self.files.remove(pos))
    }

    /// Files in creation order.
    pub fn files(&self) -> &[File] {
        &self.files
    }

    pub fn dirs(&self) -> &[String] {
        &self.dirs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_open_and_overwrite() {
        let mut vfs = Vfs::new();
        vfs.create("notes", "first").unwrap();
        assert_eq!(vfs.open("notes").unwrap().content(), b"first");
        vfs.create("notes", "second").unwrap();
        assert_eq!(vfs.open("notes").unwrap().content(), b"second");
        assert_eq!(vfs.files().len(), 1);
        assert!(vfs.open("missing").is_none());
    }

    #[test]
    fn names_are_validated() {
        let mut vfs = Vfs::new();
        assert_eq!(vfs.create("", "x"), Err(FsError::InvalidName(String::new())));
        assert!(matches!(vfs.create("a b", "x"), Err(FsError::InvalidName(_))));
        assert!(matches!(vfs.create("a/b", "x"), Err(FsError::InvalidName(_))));
        let long = "x".repeat(MAX_NAME_LEN + 1);
        assert!(matches!(vfs.create(&long, "x"), Err(FsError::NameTooLong(_))));
        assert!(vfs.create(&"y".repeat(MAX_NAME_LEN), "x").is_ok());
    }

    #[test]
    fn capacity_limits() {
        let mut vfs = Vfs::new();
        for i in 0..MAX_FILES {
            vfs.create(&format!("f{i}"), vec![i as u8]).unwrap();
        }
        assert!(matches!(vfs.create("one-more", "x"), Err(FsError::Full(_))));
        // Overwriting an existing file still works when full.
        vfs.create("f0", "new").unwrap();

        for i in 0..MAX_DIRS {
            vfs.mkdir(&format!("d{i}")).unwrap();
        }
        assert!(matches!(vfs.mkdir("extra"), Err(FsError::Full(_))));
    }

    #[test]
    fn duplicate_directory_is_rejected() {
        let mut vfs = Vfs::new();
        vfs.mkdir("bin").unwrap();
        assert_eq!(vfs.mkdir("bin"), Err(FsError::Exists("bin".into())));
        assert_eq!(vfs.dirs(), &["bin".to_string()]);
    }

    #[test]
    fn remove_returns_the_file() {
        let mut vfs = Vfs::new();
        vfs.create("a", "1").unwrap();
        vfs.create("b", "2").unwrap();
        let removed = vfs.remove("a").unwrap();
        assert_eq!(removed.name(), "a");
        assert_eq!(vfs.files()[0].name(), "b");
        assert_eq!(vfs.remove("a"), Err(FsError::NotFound("a".into())));
    }
}
