//! Template discovery in a directory tree

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};

/// File extensions treated as templates
pub const TEMPLATE_EXTENSIONS: &[&str] = &["yaml", "yml", "tpl"];

/// Recursively collect template files under `dir`, sorted by path
pub fn find_templates(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut templates = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).display().to_string();
            match e.io_error() {
                Some(io) => Error::io(path, io),
                None => Error::parse(e.to_string()),
            }
        })?;

        if entry.file_type().is_file() && is_template(entry.path()) {
            templates.push(entry.into_path());
        }
    }

    log::debug!("found {} templates in {}", templates.len(), dir.display());
    Ok(templates)
}

fn is_template(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| TEMPLATE_EXTENSIONS.contains(&ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_finds_templates_recursively() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("b.yaml"), "").unwrap();
        fs::write(dir.path().join("a.tpl"), "").unwrap();
        fs::write(dir.path().join("nested/c.yml"), "").unwrap();
        fs::write(dir.path().join("README.md"), "").unwrap();
        fs::write(dir.path().join("values.json"), "").unwrap();

        let found: Vec<_> = find_templates(dir.path())
            .unwrap()
            .into_iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            found,
            vec![
                PathBuf::from("a.tpl"),
                PathBuf::from("b.yaml"),
                PathBuf::from("nested/c.yml"),
            ]
        );
    }

    #[test]
    fn test_missing_dir_is_io_error() {
        let err = find_templates(Path::new("/no/such/template/dir")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Io);
    }
}
