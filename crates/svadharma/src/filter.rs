/// Pure filtering over the catalog.
///
/// Every function returns borrowed references in catalog order and never touches the
/// records themselves.
use crate::model::{CourseRecord, ExamRecord, IitSection, StreamFilter};

/// Exams passing both the stream selector and the text query.
///
/// The query is a case-insensitive substring match over name, category, eligibility and
/// description. A blank query matches everything.
pub fn filter_exams<'a>(
    exams: &'a [ExamRecord],
    query: &str,
    stream: StreamFilter,
) -> Vec<&'a ExamRecord> {
    let needle = active_needle(query);
    exams
        .iter()
        .filter(|e| stream.admits(e.stream))
        .filter(|e| match &needle {
            None => true,
            Some(q) => {
                contains_ci(&e.name, q)
                    || contains_ci(e.category.as_str(), q)
                    || contains_ci(&e.eligibility, q)
                    || contains_ci(&e.description, q)
            }
        })
        .collect()
}

/// Courses matching the text query (title or overview) that list every selected skill and
/// every selected career. Empty selections do not filter.
pub fn filter_courses<'a>(
    courses: &'a [CourseRecord],
    query: &str,
    skills: &[String],
    careers: &[String],
) -> Vec<&'a CourseRecord> {
    let needle = active_needle(query);
    courses
        .iter()
        .filter(|c| match &needle {
            None => true,
            Some(q) => contains_ci(&c.title, q) || contains_ci(&c.overview, q),
        })
        .filter(|c| skills.iter().all(|s| c.required_skills.contains(s)))
        .filter(|c| careers.iter().all(|s| c.career_options.contains(s)))
        .collect()
}

/// IIT guide sections whose name or keyword text contains the query.
pub fn filter_iit_sections<'a>(sections: &'a [IitSection], query: &str) -> Vec<&'a IitSection> {
    let needle = query.to_lowercase();
    sections
        .iter()
        .filter(|s| needle.is_empty() || contains_ci(&s.name, &needle) || contains_ci(&s.text, &needle))
        .collect()
}

/// Flip membership of `tag`: remove it if selected, otherwise append it.
pub fn toggle_tag(selected: &mut Vec<String>, tag: &str) {
    if let Some(pos) = selected.iter().position(|t| t == tag) {
        selected.remove(pos);
    } else {
        selected.push(tag.to_string());
    }
}

/// Lowercased query, or `None` when the query is blank and the text predicate is off.
fn active_needle(query: &str) -> Option<String> {
    if query.trim().is_empty() {
        None
    } else {
        Some(query.to_lowercase())
    }
}

/// `needle` must already be lowercase.
fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::model::Stream;

    fn exam_ids<'a>(exams: &[&'a ExamRecord]) -> Vec<&'a str> {
        exams.iter().map(|e| e.id.as_str()).collect()
    }

    fn course_ids<'a>(courses: &[&'a CourseRecord]) -> Vec<&'a str> {
        courses.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn test_all_without_query_is_whole_catalog() {
        let catalog = Catalog::load().unwrap();
        let result = filter_exams(catalog.exams(), "", StreamFilter::All);
        assert_eq!(result.len(), catalog.exams().len());
        let blank = filter_exams(catalog.exams(), "   ", StreamFilter::All);
        assert_eq!(blank.len(), catalog.exams().len());
    }

    #[test]
    fn test_science_filter_membership() {
        let catalog = Catalog::load().unwrap();
        let result = filter_exams(catalog.exams(), "", StreamFilter::Only(Stream::Science));
        for exam in catalog.exams() {
            let expected = matches!(
                exam.stream,
                Stream::Pcm | Stream::Pcb | Stream::Science | Stream::Any
            );
            let present = result.iter().any(|e| e.id == exam.id);
            assert_eq!(present, expected, "exam {}", exam.id);
        }
    }

    #[test]
    fn test_concrete_stream_membership() {
        let catalog = Catalog::load().unwrap();
        for stream in [Stream::Pcm, Stream::Pcb, Stream::Commerce, Stream::Humanities, Stream::Any] {
            let result = filter_exams(catalog.exams(), "", StreamFilter::Only(stream));
            for exam in catalog.exams() {
                let expected = exam.stream == stream || exam.stream == Stream::Any;
                let present = result.iter().any(|e| e.id == exam.id);
                assert_eq!(present, expected, "exam {} under {:?}", exam.id, stream);
            }
        }
    }

    #[test]
    fn test_pcb_keeps_neet_and_open_exams_in_order() {
        let catalog = Catalog::load().unwrap();
        let result = filter_exams(catalog.exams(), "", StreamFilter::Only(Stream::Pcb));
        let names: Vec<&str> = result.iter().map(|e| e.name.as_str()).collect();

        assert!(names.contains(&"NEET UG"));
        assert!(names.contains(&"CUET UG"));
        assert!(!names.contains(&"JEE Main"));

        let cuet = names.iter().position(|n| *n == "CUET UG").unwrap();
        let neet = names.iter().position(|n| *n == "NEET UG").unwrap();
        assert!(cuet < neet, "catalog order must be preserved");

        let expected: Vec<&str> = catalog
            .exams()
            .iter()
            .filter(|e| e.stream == Stream::Pcb || e.stream == Stream::Any)
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_text_query_matches_any_field_case_insensitively() {
        let catalog = Catalog::load().unwrap();

        let by_name = filter_exams(catalog.exams(), "neet", StreamFilter::All);
        assert_eq!(exam_ids(&by_name), vec!["neet"]);

        let by_category = filter_exams(catalog.exams(), "LAW", StreamFilter::All);
        assert_eq!(exam_ids(&by_category), vec!["clat"]);

        let by_eligibility = filter_exams(catalog.exams(), "75% aggregate", StreamFilter::All);
        assert_eq!(exam_ids(&by_eligibility), vec!["bitsat"]);

        let by_description = filter_exams(catalog.exams(), "nlus", StreamFilter::All);
        assert_eq!(exam_ids(&by_description), vec!["clat"]);

        assert!(filter_exams(catalog.exams(), "astrophysics olympiad", StreamFilter::All).is_empty());
    }

    #[test]
    fn test_query_and_stream_combine() {
        let catalog = Catalog::load().unwrap();
        let result = filter_exams(catalog.exams(), "engineering", StreamFilter::Only(Stream::Pcb));
        assert!(result
            .iter()
            .all(|e| e.stream == Stream::Pcb || e.stream == Stream::Any));
        assert!(result.iter().all(|e| e.id != "jee-main"));
    }

    #[test]
    fn test_filtering_is_repeatable_and_non_mutating() {
        let catalog = Catalog::load().unwrap();
        let before = catalog.exams().to_vec();
        let first: Vec<ExamRecord> = filter_exams(catalog.exams(), "iit", StreamFilter::Only(Stream::Pcm))
            .into_iter()
            .cloned()
            .collect();
        let second: Vec<ExamRecord> = filter_exams(catalog.exams(), "iit", StreamFilter::Only(Stream::Pcm))
            .into_iter()
            .cloned()
            .collect();
        assert_eq!(first, second);
        assert_eq!(catalog.exams(), before.as_slice());
    }

    #[test]
    fn test_skill_filter_requires_every_selected_skill() {
        let catalog = Catalog::load().unwrap();

        let coding = vec!["Coding/Scripting".to_string()];
        let result = filter_courses(catalog.courses(), "", &coding, &[]);
        assert_eq!(course_ids(&result), vec!["btech"]);

        let mixed = vec!["Coding/Scripting".to_string(), "Patient Care".to_string()];
        assert!(filter_courses(catalog.courses(), "", &mixed, &[]).is_empty());

        let all = filter_courses(catalog.courses(), "", &[], &[]);
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn test_skill_subset_property() {
        let catalog = Catalog::load().unwrap();
        for course in catalog.courses() {
            let subset: Vec<String> = course.required_skills.iter().take(2).cloned().collect();
            let result = filter_courses(catalog.courses(), "", &subset, &[]);
            for candidate in catalog.courses() {
                let expected = subset.iter().all(|s| candidate.required_skills.contains(s));
                let present = result.iter().any(|c| c.id == candidate.id);
                assert_eq!(present, expected);
            }
        }
    }

    #[test]
    fn test_course_text_and_career_filters() {
        let catalog = Catalog::load().unwrap();

        let research = filter_courses(catalog.courses(), "RESEARCH", &[], &[]);
        assert_eq!(course_ids(&research), vec!["bs-ms"]);

        let physician = vec!["Physician".to_string()];
        let result = filter_courses(catalog.courses(), "", &[], &physician);
        assert_eq!(course_ids(&result), vec!["mbbs"]);

        let conflicting = filter_courses(catalog.courses(), "engineering", &[], &physician);
        assert!(conflicting.is_empty());
    }

    #[test]
    fn test_toggle_tag_keeps_insertion_order() {
        let mut selected = Vec::new();
        toggle_tag(&mut selected, "Physics Knowledge");
        toggle_tag(&mut selected, "Coding/Scripting");
        toggle_tag(&mut selected, "Leadership");
        assert_eq!(selected, vec!["Physics Knowledge", "Coding/Scripting", "Leadership"]);

        toggle_tag(&mut selected, "Coding/Scripting");
        assert_eq!(selected, vec!["Physics Knowledge", "Leadership"]);

        toggle_tag(&mut selected, "Coding/Scripting");
        assert_eq!(selected, vec!["Physics Knowledge", "Leadership", "Coding/Scripting"]);
    }

    #[test]
    fn test_iit_sections_filter() {
        let catalog = Catalog::load().unwrap();
        assert_eq!(filter_iit_sections(catalog.iit_sections(), "").len(), 5);

        let design = filter_iit_sections(catalog.iit_sections(), "B.Des");
        assert_eq!(design.len(), 1);
        assert_eq!(design[0].id, "uceed-section");

        let pcm = filter_iit_sections(catalog.iit_sections(), "pcm");
        let pcm_ids: Vec<&str> = pcm.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(pcm_ids, vec!["jee-advanced-section", "iat-section"]);
    }
}
