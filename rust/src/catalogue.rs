//! Static inputs of a run: subjects, classes with their demand, teachers
//! with their qualifications.
//!
//! Catalogues are read from TOML or JSON; the format follows the file
//! extension (`.json` is JSON, anything else is TOML).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::{Class, Subject, Teacher};

/// Errors raised while reading a catalogue file.
#[derive(Error, Debug)]
pub enum CatalogueError {
    #[error("Failed to read catalogue {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse TOML catalogue: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Failed to parse JSON catalogue: {0}")]
    Json(#[from] serde_json::Error),
}

/// Class, teacher and subject catalogues for one run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Catalogue {
    pub subjects: Vec<Subject>,
    pub classes: Vec<Class>,
    pub teachers: Vec<Teacher>,
}

impl Catalogue {
    /// Load a catalogue file, picking the format from its extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CatalogueError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| CatalogueError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, CatalogueError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json_str(content: &str) -> Result<Self, CatalogueError> {
        Ok(serde_json::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimeSlot;

    const SAMPLE: &str = r#"
        [[subjects]]
        code = "MATH"
        name = "Mathematics"

        [[subjects]]
        code = "ART"

        [[classes]]
        id = "7A"
        grade = 7
        demands = [
            { subject = "MATH", hours = 4 },
            { subject = "ART", hours = 1 },
        ]

        [[teachers]]
        id = "t-rivera"
        name = "Rivera"
        qualifications = [{ subject = "MATH", classes = ["7A"] }]
        unavailable = [{ day = 0, period = 0 }]
    "#;

    #[test]
    fn test_parse_toml() {
        let catalogue = Catalogue::from_toml_str(SAMPLE).unwrap();
        assert_eq!(catalogue.subjects.len(), 2);
        assert_eq!(catalogue.subjects[1].name, "");
        let hours: u32 = catalogue.classes[0].demands.iter().map(|d| d.hours).sum();
        assert_eq!(hours, 5);
        assert_eq!(catalogue.teachers[0].unavailable, vec![TimeSlot::new(0, 0)]);
    }

    #[test]
    fn test_parse_json() {
        let json = r#"{
            "subjects": [{ "code": "MATH" }],
            "classes": [{ "id": "7A", "demands": [{ "subject": "MATH", "hours": 2 }] }],
            "teachers": [{ "id": "t1", "qualifications": [{ "subject": "MATH", "classes": ["7A"] }] }]
        }"#;
        let catalogue = Catalogue::from_json_str(json).unwrap();
        assert_eq!(catalogue.classes[0].grade, 0);
        assert!(catalogue.teachers[0].unavailable.is_empty());
    }

    #[test]
    fn test_from_file_picks_format_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("school.toml");
        fs::write(&toml_path, SAMPLE).unwrap();
        assert_eq!(Catalogue::from_file(&toml_path).unwrap().classes.len(), 1);

        let json_path = dir.path().join("school.json");
        fs::write(&json_path, SAMPLE).unwrap();
        assert!(matches!(
            Catalogue::from_file(&json_path),
            Err(CatalogueError::Json(_))
        ));

        assert!(matches!(
            Catalogue::from_file(dir.path().join("missing.toml")),
            Err(CatalogueError::Io { .. })
        ));
    }
}
