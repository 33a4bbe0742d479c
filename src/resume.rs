//! Structured résumé data model
//!
//! Résumés arrive from the structuring collaborator as JSON with a set
//! of well-known sections plus arbitrary extras. The well-known
//! sections are typed; everything else is kept as a [`SectionValue`]
//! tagged by shape so the chunker can dispatch on it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A stored résumé as returned by the document store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CvDocument {
    /// Content-hash identifier assigned by the document store
    pub cv_id: String,

    /// Upload metadata (filename etc.)
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,

    /// Structured content extracted from the résumé
    #[serde(default)]
    pub structured_sections: StructuredResume,
}

/// Structured sections of a résumé. All sections are optional; the
/// chunker drops whatever is missing or empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuredResume {
    #[serde(default)]
    pub summary: Option<Summary>,

    /// Contact details; never indexed
    #[serde(default)]
    pub contact: Option<Value>,

    #[serde(default)]
    pub skills: Option<Skills>,

    #[serde(default)]
    pub experience: Vec<ExperienceEntry>,

    #[serde(default)]
    pub projects: Vec<ProjectEntry>,

    #[serde(default)]
    pub education: Vec<EducationEntry>,

    #[serde(default)]
    pub leadership: Vec<LeadershipEntry>,

    #[serde(default)]
    pub certifications: Vec<CertificationEntry>,

    #[serde(default)]
    pub publications: Vec<Value>,

    #[serde(default)]
    pub awards: Vec<Value>,

    /// Sections the structuring model emitted beyond the known set,
    /// keyed by section name
    #[serde(flatten)]
    pub additional_sections: BTreeMap<String, SectionValue>,
}

/// Free-text professional summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default)]
    pub text: Option<String>,
}

/// Skill lists grouped by category
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Skills {
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub frameworks: Vec<String>,
    #[serde(default)]
    pub cloud: Vec<String>,
    #[serde(default)]
    pub devops: Vec<String>,
    #[serde(default)]
    pub databases: Vec<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub other: Vec<String>,
}

impl Skills {
    /// Category names paired with their entries, in declaration order
    pub fn categories(&self) -> [(&'static str, &[String]); 7] {
        [
            ("languages", &self.languages),
            ("frameworks", &self.frameworks),
            ("cloud", &self.cloud),
            ("devops", &self.devops),
            ("databases", &self.databases),
            ("tools", &self.tools),
            ("other", &self.other),
        ]
    }
}

/// One position held
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExperienceEntry {
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub bullets: Vec<String>,
}

/// One project
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub bullets: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EducationEntry {
    #[serde(default)]
    pub institution: String,
    #[serde(default)]
    pub degree: String,
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub gpa: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadershipEntry {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CertificationEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub issuer: String,
    #[serde(default)]
    pub date: String,
}

/// Shape of an unknown section. Deserialisation tries the variants in
/// order, so plain strings and lists win over the catch-all.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SectionValue {
    Text(String),
    Items(Vec<Value>),
    Other(Value),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_full_document() {
        let doc: CvDocument = serde_json::from_value(serde_json::json!({
            "cv_id": "abc123",
            "metadata": {"filename": "resume.pdf"},
            "structured_sections": {
                "summary": {"text": "Backend engineer."},
                "skills": {"languages": ["Go", "Rust"], "tools": ["Docker"]},
                "experience": [
                    {"company": "Acme", "title": "SWE", "bullets": ["Led X"]}
                ],
                "projects": [
                    {"name": "P", "bullets": [], "description": "A tool"}
                ],
                "education": [
                    {"institution": "MIT", "degree": "BSc", "field": "CS", "gpa": "3.9"}
                ],
                "interests": ["chess", "running"]
            }
        }))
        .unwrap();

        assert_eq!(doc.cv_id, "abc123");
        let sections = &doc.structured_sections;
        assert_eq!(sections.summary.as_ref().unwrap().text.as_deref(), Some("Backend engineer."));
        assert_eq!(sections.experience.len(), 1);
        assert_eq!(sections.experience[0].bullets, vec!["Led X"]);
        assert_eq!(sections.projects[0].description, "A tool");
        assert!(matches!(
            sections.additional_sections.get("interests"),
            Some(SectionValue::Items(items)) if items.len() == 2
        ));
    }

    #[test]
    fn test_missing_sections_default_empty() {
        let doc: CvDocument =
            serde_json::from_value(serde_json::json!({"cv_id": "x"})).unwrap();
        assert!(doc.structured_sections.experience.is_empty());
        assert!(doc.structured_sections.summary.is_none());
    }

    #[test]
    fn test_section_value_shapes() {
        let text: SectionValue = serde_json::from_value(serde_json::json!("plain")).unwrap();
        assert!(matches!(text, SectionValue::Text(_)));

        let items: SectionValue = serde_json::from_value(serde_json::json!(["a", "b"])).unwrap();
        assert!(matches!(items, SectionValue::Items(_)));

        let other: SectionValue =
            serde_json::from_value(serde_json::json!({"nested": true})).unwrap();
        assert!(matches!(other, SectionValue::Other(_)));
    }
}
