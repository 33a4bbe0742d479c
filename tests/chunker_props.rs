//! Property-based tests for the chunker invariants

use cvmatch::chunker::chunk_resume;
use cvmatch::resume::{ExperienceEntry, ProjectEntry, StructuredResume, Summary};
use proptest::prelude::*;

fn arb_bullets() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[ a-zA-Z0-9]{0,40}", 0..6)
}

proptest! {
    /// Every produced chunk has non-blank trimmed text and a section
    #[test]
    fn chunks_are_non_blank(
        company in "[a-zA-Z ]{0,20}",
        bullets in arb_bullets(),
        summary in "[ a-zA-Z]{0,40}",
    ) {
        let resume = StructuredResume {
            summary: Some(Summary { text: Some(summary) }),
            experience: vec![ExperienceEntry {
                company,
                bullets,
                ..Default::default()
            }],
            ..Default::default()
        };

        for chunk in chunk_resume("cv1", &resume) {
            prop_assert!(!chunk.text.trim().is_empty());
            prop_assert!(!chunk.section.is_empty());
            prop_assert_eq!(chunk.cv_id.as_str(), "cv1");
        }
    }

    /// Experience chunks count exactly the non-blank bullets
    #[test]
    fn experience_chunk_count_matches_bullets(bullets in arb_bullets()) {
        let expected = bullets.iter().filter(|b| !b.trim().is_empty()).count();
        let resume = StructuredResume {
            experience: vec![ExperienceEntry {
                company: "Acme".to_string(),
                bullets,
                ..Default::default()
            }],
            ..Default::default()
        };

        let chunks = chunk_resume("cv1", &resume);
        prop_assert_eq!(chunks.len(), expected);
    }

    /// A project yields one chunk per non-blank bullet, or one
    /// description chunk when it has no usable bullets
    #[test]
    fn project_chunk_count_matches_bullets(
        bullets in arb_bullets(),
        description in "[ a-zA-Z]{0,30}",
    ) {
        let bullet_count = bullets.iter().filter(|b| !b.trim().is_empty()).count();
        let expected = if bullet_count > 0 {
            bullet_count
        } else if description.trim().is_empty() {
            0
        } else {
            1
        };

        let resume = StructuredResume {
            projects: vec![ProjectEntry {
                name: "P".to_string(),
                description,
                bullets,
                ..Default::default()
            }],
            ..Default::default()
        };

        let chunks = chunk_resume("cv1", &resume);
        prop_assert_eq!(chunks.len(), expected);
    }

    /// Chunking is deterministic and order-stable
    #[test]
    fn chunking_is_deterministic(
        bullets in arb_bullets(),
        summary in "[ a-zA-Z]{0,40}",
    ) {
        let resume = StructuredResume {
            summary: Some(Summary { text: Some(summary) }),
            experience: vec![ExperienceEntry {
                company: "Acme".to_string(),
                bullets,
                ..Default::default()
            }],
            ..Default::default()
        };

        prop_assert_eq!(chunk_resume("cv1", &resume), chunk_resume("cv1", &resume));
    }
}
