//! Filesystem port for file I/O operations.

use std::path::Path;

/// Provides filesystem access for the engine's file-producing actions
/// and its checkpoint files.
///
/// Abstracting the filesystem allows the engine and checkpoint tests to
/// run against an in-memory implementation without touching the disk.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or is not valid UTF-8.
    fn read_to_string(
        &self,
        path: &Path,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;

    /// Writes the given contents to a file, creating or overwriting it.
    ///
    /// Parent directories are created as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails (permissions, disk full, etc.).
    fn write(
        &self,
        path: &Path,
        contents: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Returns `true` if the path exists on the filesystem.
    fn exists(&self, path: &Path) -> bool;

    /// Creates a directory and any missing parents.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    fn create_dir_all(
        &self,
        path: &Path,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Removes a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be removed.
    fn remove_file(&self, path: &Path)
        -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Renames a file, replacing the destination if it exists.
    ///
    /// On a local filesystem this is atomic, which the checkpoint store
    /// relies on for its write-to-temp-then-rename discipline.
    ///
    /// # Errors
    ///
    /// Returns an error if the rename fails.
    fn rename(
        &self,
        from: &Path,
        to: &Path,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
