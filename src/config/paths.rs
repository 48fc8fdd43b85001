//! Where settings and books live, resolved with the `dirs` crate.
//!
//! ```text
//! <config_dir>/read-along/settings.toml
//! <data_dir>/read-along/books/        library searched for bare book names
//! ```

use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub settings_file: PathBuf,
    /// Library directory searched by [`AppPaths::resolve_book`].
    pub books_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "read-along";

    /// Platform directories, or the current directory where the platform
    /// has none.
    pub fn new() -> Self {
        let base = |dir: Option<PathBuf>| {
            dir.unwrap_or_else(|| PathBuf::from("."))
                .join(Self::APP_NAME)
        };
        Self::from_dirs(base(dirs::config_dir()), base(dirs::data_dir()))
    }

    /// Paths under explicit config and data directories.
    pub fn from_dirs(config_dir: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            settings_file: config_dir.join("settings.toml"),
            books_dir: data_dir.join("books"),
            config_dir,
        }
    }

    /// Find a book given on the command line.
    ///
    /// An existing path is used as is.  Otherwise a bare name is looked up
    /// in the library, trying `.json` and `.txt` when it has no extension.
    pub fn resolve_book(&self, given: &Path) -> PathBuf {
        if given.exists() || given.components().count() > 1 {
            return given.to_path_buf();
        }
        let in_library = self.books_dir.join(given);
        if in_library.exists() || given.extension().is_some() {
            return in_library;
        }
        ["json", "txt"]
            .iter()
            .map(|ext| in_library.with_extension(ext))
            .find(|candidate| candidate.exists())
            .unwrap_or_else(|| given.to_path_buf())
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn platform_paths_end_in_app_name() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.ends_with("read-along"));
        assert!(paths.settings_file.starts_with(&paths.config_dir));
        assert!(paths.books_dir.ends_with("books"));
    }

    #[test]
    fn bare_name_is_found_in_library() {
        let dir = tempdir().expect("temp dir");
        let paths = AppPaths::from_dirs(dir.path().join("cfg"), dir.path().join("data"));
        std::fs::create_dir_all(&paths.books_dir).expect("mkdir");
        std::fs::write(paths.books_dir.join("cuentos.json"), "{}").expect("write");

        assert_eq!(
            paths.resolve_book(Path::new("cuentos")),
            paths.books_dir.join("cuentos.json")
        );
    }

    #[test]
    fn existing_and_nested_paths_are_kept() {
        let dir = tempdir().expect("temp dir");
        let paths = AppPaths::from_dirs(dir.path().join("cfg"), dir.path().join("data"));
        let file = dir.path().join("book.txt");
        std::fs::write(&file, "x").expect("write");

        assert_eq!(paths.resolve_book(&file), file);
        assert_eq!(
            paths.resolve_book(Path::new("some/where.txt")),
            PathBuf::from("some/where.txt")
        );
        assert_eq!(
            paths.resolve_book(Path::new("missing")),
            PathBuf::from("missing")
        );
    }
}
