//! Input file validation, run before any trial starts.

use std::path::{Path, PathBuf};

use crate::error::{Result, TunerError};

/// Source extensions accepted as input, compared case-insensitively.
pub const SOURCE_EXTENSIONS: [&str; 4] = ["c", "cpp", "cc", "cxx"];

/// Checks that every input exists and is a C or C++ source file.
///
/// All problems are collected and returned together.
pub fn validate_inputs(inputs: &[PathBuf]) -> Result<()> {
    if inputs.is_empty() {
        return Err(TunerError::InvalidInput(vec![
            "No input files given".to_string(),
        ]));
    }

    let problems: Vec<String> = inputs.iter().filter_map(|p| check_input(p)).collect();
    if problems.is_empty() {
        Ok(())
    } else {
        Err(TunerError::InvalidInput(problems))
    }
}

fn check_input(path: &Path) -> Option<String> {
    if !path.exists() {
        return Some(format!("File not found: {}", path.display()));
    }
    if !path.is_file() {
        return Some(format!("Not a regular file: {}", path.display()));
    }
    if !is_source_file(path) {
        return Some(format!(
            "Invalid file type: {} (expected .c, .cpp, .cc or .cxx)",
            path.display()
        ));
    }
    None
}

/// Whether the path has an accepted source extension.
pub fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SOURCE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Splits a comma-separated input list, dropping empty entries.
pub fn split_input_list(list: &str) -> Vec<PathBuf> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_accepts_sources() {
        let temp = TempDir::new().unwrap();
        let mut inputs = Vec::new();
        for name in ["a.c", "b.cpp", "c.cc", "d.CXX"] {
            let path = temp.path().join(name);
            fs::write(&path, "int main(void) { return 0; }").unwrap();
            inputs.push(path);
        }
        assert!(validate_inputs(&inputs).is_ok());
    }

    #[test]
    fn test_collects_every_problem() {
        let temp = TempDir::new().unwrap();
        let text = temp.path().join("notes.txt");
        fs::write(&text, "hello").unwrap();
        let missing = temp.path().join("missing.c");

        let err = validate_inputs(&[missing, text]).unwrap_err();
        match err {
            TunerError::InvalidInput(problems) => {
                assert_eq!(problems.len(), 2);
                assert!(problems[0].starts_with("File not found"));
                assert!(problems[1].starts_with("Invalid file type"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_list_is_invalid() {
        assert!(matches!(
            validate_inputs(&[]),
            Err(TunerError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_split_input_list() {
        assert_eq!(
            split_input_list("a.c, b.cpp,,src/c.cc "),
            vec![
                PathBuf::from("a.c"),
                PathBuf::from("b.cpp"),
                PathBuf::from("src/c.cc")
            ]
        );
    }
}
