use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio::fs::File;

pub async fn is_regular_file(path: &PathBuf) -> Result<bool> {
    Ok(File::open(path).await?.metadata().await?.is_file())
}

/// Derives the object key for a file from its path relative to the walk
/// root. Keys always use `/` as the separator, regardless of platform.
pub fn key_from_file_path(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let key = relative.to_string_lossy().to_string();

    if cfg!(windows) {
        convert_windows_directory_char_to_slash(&key)
    } else {
        key
    }
}

pub fn convert_windows_directory_char_to_slash(key: &str) -> String {
    key.replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn is_regular_file_for_file_and_dir() {
        init_dummy_tracing_subscriber();

        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("data1");
        let mut file = std::fs::File::create(&file_path).unwrap();
        file.write_all(b"data").unwrap();

        assert!(is_regular_file(&file_path).await.unwrap());
    }

    #[tokio::test]
    async fn is_regular_file_not_found() {
        init_dummy_tracing_subscriber();

        let result = is_regular_file(&PathBuf::from("./not_found_file_6329313")).await;
        assert!(result.is_err());
    }

    #[test]
    fn key_from_file_path_strips_root() {
        init_dummy_tracing_subscriber();

        assert_eq!(
            key_from_file_path(
                Path::new("/source/dir1/data1"),
                Path::new("/source")
            ),
            "dir1/data1"
        );

        assert_eq!(
            key_from_file_path(Path::new("/source/data1"), Path::new("/source/")),
            "data1"
        );
    }

    #[test]
    fn convert_windows_directory_char() {
        init_dummy_tracing_subscriber();

        assert_eq!(
            convert_windows_directory_char_to_slash(r"dir1\dir2\data1"),
            "dir1/dir2/data1"
        );
    }

    fn init_dummy_tracing_subscriber() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("dummy=trace")
            .try_init();
    }
}
