use std::path::Path;

const SOURCE_DIR_NOT_FOUND: &str = "source directory not found.";
const SOURCE_NOT_A_DIRECTORY: &str = "source must be a directory.";
const SOURCE_DIR_NOT_READABLE: &str = "source directory is not readable.";

pub fn check_source_dir(source: &str) -> Result<String, String> {
    let path = Path::new(source);

    let metadata = match path.metadata() {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SOURCE_DIR_NOT_FOUND.to_string());
        }
        Err(_) => return Err(SOURCE_DIR_NOT_READABLE.to_string()),
    };

    if !metadata.is_dir() {
        return Err(SOURCE_NOT_A_DIRECTORY.to_string());
    }

    if std::fs::read_dir(path).is_err() {
        return Err(SOURCE_DIR_NOT_READABLE.to_string());
    }

    Ok(source.to_string())
}
