/// The fixed exam and course directory, parsed once at startup.
///
/// The data ships inside the binary as `data/catalog.json`. Derived chip options for the
/// course filter panel are computed here once and never recomputed per query.
use std::collections::{BTreeSet, HashSet};

use serde::Deserialize;

use crate::error::AppError;
use crate::model::{CourseRecord, ExamRecord, IitSection, TopIit};

const CATALOG_JSON: &str = include_str!("../data/catalog.json");

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogDocument {
    exams: Vec<ExamRecord>,
    courses: Vec<CourseRecord>,
    #[serde(default)]
    top_iits: Vec<TopIit>,
    #[serde(default)]
    iit_sections: Vec<IitSection>,
}

#[derive(Debug)]
pub struct Catalog {
    exams: Vec<ExamRecord>,
    courses: Vec<CourseRecord>,
    top_iits: Vec<TopIit>,
    iit_sections: Vec<IitSection>,
    skill_options: Vec<String>,
    career_options: Vec<String>,
}

impl Catalog {
    /// Parse the bundled catalog.
    pub fn load() -> Result<Self, AppError> {
        Self::from_json(CATALOG_JSON)
    }

    pub fn from_json(content: &str) -> Result<Self, AppError> {
        let doc: CatalogDocument = serde_json::from_str(content)
            .map_err(|e| AppError::Catalog(format!("malformed catalog: {e}")))?;

        if doc.exams.is_empty() {
            return Err(AppError::Catalog("catalog contains no exams".to_string()));
        }
        ensure_unique("exam", doc.exams.iter().map(|e| e.id.as_str()))?;
        ensure_unique("course", doc.courses.iter().map(|c| c.id.as_str()))?;
        for section in &doc.iit_sections {
            if let Some(exam_id) = &section.exam_id {
                if !doc.exams.iter().any(|e| &e.id == exam_id) {
                    return Err(AppError::Catalog(format!(
                        "IIT section '{}' links unknown exam '{exam_id}'",
                        section.id
                    )));
                }
            }
        }

        let skill_options = distinct_sorted(doc.courses.iter().flat_map(|c| &c.required_skills));
        let career_options = distinct_sorted(doc.courses.iter().flat_map(|c| &c.career_options));

        Ok(Self {
            exams: doc.exams,
            courses: doc.courses,
            top_iits: doc.top_iits,
            iit_sections: doc.iit_sections,
            skill_options,
            career_options,
        })
    }

    pub fn exams(&self) -> &[ExamRecord] {
        &self.exams
    }

    pub fn courses(&self) -> &[CourseRecord] {
        &self.courses
    }

    pub fn top_iits(&self) -> &[TopIit] {
        &self.top_iits
    }

    pub fn iit_sections(&self) -> &[IitSection] {
        &self.iit_sections
    }

    /// Every distinct skill tag across all courses, sorted.
    pub fn skill_options(&self) -> &[String] {
        &self.skill_options
    }

    /// Every distinct career tag across all courses, sorted.
    pub fn career_options(&self) -> &[String] {
        &self.career_options
    }

    pub fn exam(&self, id: &str) -> Option<&ExamRecord> {
        self.exams.iter().find(|e| e.id.eq_ignore_ascii_case(id))
    }
}

fn ensure_unique<'a>(kind: &str, ids: impl Iterator<Item = &'a str>) -> Result<(), AppError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(AppError::Catalog(format!("duplicate {kind} id: {id}")));
        }
    }
    Ok(())
}

fn distinct_sorted<'a>(tags: impl Iterator<Item = &'a String>) -> Vec<String> {
    tags.cloned().collect::<BTreeSet<_>>().into_iter().collect()
}
