//! Data file locations
//!
//! The layout file lives in the platform data directory by default. For
//! development with `cargo run`, a `layout.json` in the working directory
//! takes precedence so the repo's own file is used directly.

use std::path::PathBuf;

/// Application name used for the data directory
const APP_NAME: &str = "mixer-gw";

/// Default location of the layout file
pub fn default_layout_path() -> PathBuf {
    #[cfg(debug_assertions)]
    {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let cwd_layout = cwd.join("layout.json");
        if cwd_layout.exists() {
            return cwd_layout;
        }
    }

    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
        .join("layout.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_path_ends_with_file_name() {
        let path = default_layout_path();
        assert_eq!(path.file_name().unwrap(), "layout.json");
    }
}
