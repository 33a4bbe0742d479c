//! Structured résumé chunking
//!
//! Converts a [`StructuredResume`] into the flat list of
//! semantically-typed [`Chunk`]s that get embedded and indexed.
//! Experience and project bullets become one chunk each, because a
//! single accomplishment is the discriminative unit of a résumé;
//! summary and skills stay atomic because they are already concise.
//!
//! Chunking is a pure function of its input: equal résumés produce
//! equal chunk lists in the same order. Malformed or empty
//! sub-objects are dropped, never errors.

use crate::resume::{
    CertificationEntry, EducationEntry, ExperienceEntry, LeadershipEntry, ProjectEntry,
    SectionValue, Skills, StructuredResume, Summary,
};
use serde_json::Value;
use std::collections::BTreeMap;

/// One indexable passage of a résumé
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub cv_id: String,
    pub section: String,
    /// Trimmed, non-empty text
    pub text: String,
    /// Scalar-or-stringifiable extras; sanitised at the store boundary
    pub metadata: BTreeMap<String, Value>,
}

impl Chunk {
    fn new(cv_id: &str, section: &str, text: String) -> Self {
        Self {
            cv_id: cv_id.to_string(),
            section: section.to_string(),
            text,
            metadata: BTreeMap::new(),
        }
    }

    fn with(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }
}

/// Chunk a structured résumé. Bullet-bearing sections come first,
/// then the atomic and object sections in a fixed order, so output
/// order is stable across runs.
pub fn chunk_resume(cv_id: &str, resume: &StructuredResume) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    chunks.extend(chunk_experience(cv_id, &resume.experience));
    chunks.extend(chunk_projects(cv_id, &resume.projects));

    if let Some(summary) = &resume.summary {
        chunks.extend(chunk_summary(cv_id, summary));
    }
    if let Some(skills) = &resume.skills {
        chunks.extend(chunk_skills(cv_id, skills));
    }

    chunks.extend(chunk_education(cv_id, &resume.education));
    chunks.extend(chunk_leadership(cv_id, &resume.leadership));
    chunks.extend(chunk_certifications(cv_id, &resume.certifications));
    chunks.extend(chunk_object_list(cv_id, "publications", &resume.publications));
    chunks.extend(chunk_object_list(cv_id, "awards", &resume.awards));

    for (name, value) in &resume.additional_sections {
        chunks.extend(chunk_section_value(cv_id, name, value));
    }

    chunks
}

/// One chunk per experience bullet, prefixed with the company for
/// context. Entries without bullets produce nothing.
fn chunk_experience(cv_id: &str, entries: &[ExperienceEntry]) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    for (exp_index, entry) in entries.iter().enumerate() {
        for (bullet_index, bullet) in entry.bullets.iter().enumerate() {
            let bullet = bullet.trim();
            if bullet.is_empty() {
                continue;
            }
            chunks.push(
                Chunk::new(cv_id, "experience", format!("{} - {}", entry.company, bullet))
                    .with("type", "experience_bullet".into())
                    .with("company", entry.company.clone().into())
                    .with("title", entry.title.clone().into())
                    .with("location", entry.location.clone().into())
                    .with("start_date", entry.start_date.clone().into())
                    .with("end_date", entry.end_date.clone().into())
                    .with("exp_index", exp_index.into())
                    .with("bullet_index", bullet_index.into()),
            );
        }
    }

    chunks
}

/// One chunk per project bullet; a bullet-less project falls back to
/// a single description chunk when one exists.
fn chunk_projects(cv_id: &str, entries: &[ProjectEntry]) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    for (proj_index, project) in entries.iter().enumerate() {
        let technologies = Value::from(project.technologies.clone());

        let has_bullets = project.bullets.iter().any(|b| !b.trim().is_empty());

        if has_bullets {
            for (bullet_index, bullet) in project.bullets.iter().enumerate() {
                let bullet = bullet.trim();
                if bullet.is_empty() {
                    continue;
                }
                chunks.push(
                    Chunk::new(cv_id, "projects", format!("{} - {}", project.name, bullet))
                        .with("type", "project_bullet".into())
                        .with("project_name", project.name.clone().into())
                        .with("proj_index", proj_index.into())
                        .with("bullet_index", bullet_index.into())
                        .with("technologies", technologies.clone())
                        .with("link", project.link.clone().into()),
                );
            }
            continue;
        }

        let description = project.description.trim();
        if !description.is_empty() {
            chunks.push(
                Chunk::new(cv_id, "projects", format!("{} - {}", project.name, description))
                    .with("type", "project_description".into())
                    .with("project_name", project.name.clone().into())
                    .with("proj_index", proj_index.into())
                    .with("technologies", technologies),
            );
        }
    }

    chunks
}

fn chunk_summary(cv_id: &str, summary: &Summary) -> Vec<Chunk> {
    let Some(text) = summary.text.as_deref() else {
        return Vec::new();
    };
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    vec![Chunk::new(cv_id, "summary", text.to_string()).with("type", "summary".into())]
}

/// All non-empty skill categories flattened into one comma-joined
/// chunk; the metadata records which categories contributed.
fn chunk_skills(cv_id: &str, skills: &Skills) -> Vec<Chunk> {
    let mut values: Vec<&str> = Vec::new();
    let mut present: Vec<&str> = Vec::new();

    for (category, items) in skills.categories() {
        let non_empty: Vec<&str> = items
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if non_empty.is_empty() {
            continue;
        }
        present.push(category);
        values.extend(non_empty);
    }

    if values.is_empty() {
        return Vec::new();
    }

    vec![
        Chunk::new(cv_id, "skills", values.join(", "))
            .with("type", "skills".into())
            .with("categories", Value::from(present)),
    ]
}

fn chunk_education(cv_id: &str, entries: &[EducationEntry]) -> Vec<Chunk> {
    entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let gpa = if entry.gpa.trim().is_empty() {
                String::new()
            } else {
                format!("GPA: {}", entry.gpa.trim())
            };
            let text = join_parts(&[&entry.institution, &entry.degree, &entry.field, &gpa])?;
            Some(
                Chunk::new(cv_id, "education", text)
                    .with("type", "object".into())
                    .with("index", index.into())
                    .with("institution", entry.institution.clone().into())
                    .with("degree", entry.degree.clone().into())
                    .with("field", entry.field.clone().into())
                    .with("gpa", entry.gpa.clone().into()),
            )
        })
        .collect()
}

fn chunk_leadership(cv_id: &str, entries: &[LeadershipEntry]) -> Vec<Chunk> {
    entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let text = join_parts(&[&entry.role, &entry.organization, &entry.description])?;
            Some(
                Chunk::new(cv_id, "leadership", text)
                    .with("type", "object".into())
                    .with("index", index.into())
                    .with("role", entry.role.clone().into())
                    .with("organization", entry.organization.clone().into()),
            )
        })
        .collect()
}

fn chunk_certifications(cv_id: &str, entries: &[CertificationEntry]) -> Vec<Chunk> {
    entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let issuer = if entry.issuer.trim().is_empty() {
                String::new()
            } else {
                format!("by {}", entry.issuer.trim())
            };
            let text = join_parts(&[&entry.name, &issuer, &entry.date])?;
            Some(
                Chunk::new(cv_id, "certifications", text)
                    .with("type", "object".into())
                    .with("index", index.into())
                    .with("name", entry.name.clone().into())
                    .with("issuer", entry.issuer.clone().into()),
            )
        })
        .collect()
}

/// Generic list-of-object sections (publications, awards, ...): one
/// chunk per object, its text the joined string fields. Items of any
/// other shape are stringified through the same uniform branch.
fn chunk_object_list(cv_id: &str, section: &str, items: &[Value]) -> Vec<Chunk> {
    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let text = flatten_value(item)?;
            Some(
                Chunk::new(cv_id, section, text)
                    .with("type", "object".into())
                    .with("index", index.into()),
            )
        })
        .collect()
}

/// Unknown sections dispatch on shape: strings chunk directly, lists
/// chunk per non-blank element, anything else is stringified.
fn chunk_section_value(cv_id: &str, section: &str, value: &SectionValue) -> Vec<Chunk> {
    match value {
        SectionValue::Text(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Vec::new();
            }
            vec![Chunk::new(cv_id, section, text.to_string()).with("type", "string".into())]
        }
        SectionValue::Items(items) => items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| {
                let (text, kind) = match item {
                    Value::String(s) => (Some(s.trim().to_string()).filter(|t| !t.is_empty()), "list_item"),
                    other => (flatten_value(other), "object"),
                };
                text.map(|text| {
                    Chunk::new(cv_id, section, text)
                        .with("type", kind.into())
                        .with("index", index.into())
                })
            })
            .collect(),
        SectionValue::Other(other) => match flatten_value(other) {
            Some(text) => {
                vec![Chunk::new(cv_id, section, text).with("type", "string".into())]
            }
            None => Vec::new(),
        },
    }
}

/// Join non-blank parts with " - "; None when nothing remains
fn join_parts(parts: &[&String]) -> Option<String> {
    let kept: Vec<&str> = parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect();
    if kept.is_empty() {
        None
    } else {
        Some(kept.join(" - "))
    }
}

/// Uniform fallback stringification for arbitrary JSON values
fn flatten_value(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Object(map) => {
            let parts: Vec<String> = map
                .values()
                .filter_map(|v| match v {
                    Value::String(s) => {
                        let s = s.trim();
                        (!s.is_empty()).then(|| s.to_string())
                    }
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect();
            parts.join(" - ")
        }
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
