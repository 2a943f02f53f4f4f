pub mod human_bytes;
pub mod regex;
pub mod source_dir;
pub mod target_url;
pub mod url;
