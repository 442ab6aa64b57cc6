//! Merging extraction results into a playbook
//!
//! Ratings move a key point's score by a fixed delta (helpful +1, harmful -3,
//! neutral -1). Key points that fall to [`PRUNE_THRESHOLD`] or below are forgotten.

use std::collections::HashSet;

use crate::playbook::{generate_name, ExtractionResult, KeyPoint, Playbook};

/// Key points at or below this score are removed after every merge
pub const PRUNE_THRESHOLD: i64 = -5;

/// Apply an extraction result to a playbook, returning the updated playbook
pub fn apply(mut playbook: Playbook, result: &ExtractionResult) -> Playbook {
    let mut names: HashSet<String> = playbook.key_points.iter().map(|kp| kp.name.clone()).collect();

    for text in &result.new_key_points {
        if text.trim().is_empty() || playbook.contains_text(text) {
            continue;
        }
        let taken: HashSet<&str> = names.iter().map(String::as_str).collect();
        let name = generate_name(&taken);
        names.insert(name.clone());
        playbook.key_points.push(KeyPoint::new(name, text.clone()));
    }

    for evaluation in &result.evaluations {
        match playbook.get_mut(&evaluation.name) {
            Some(key_point) => {
                key_point.score = key_point.score.saturating_add(evaluation.delta());
            }
            None => tracing::debug!("Ignoring evaluation for unknown key point {}", evaluation.name),
        }
    }

    let before = playbook.key_points.len();
    playbook.key_points.retain(|kp| kp.score > PRUNE_THRESHOLD);
    let pruned = before - playbook.key_points.len();
    if pruned > 0 {
        tracing::info!("Pruned {} key point(s) at or below score {}", pruned, PRUNE_THRESHOLD);
    }

    playbook
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playbook::{Evaluation, Rating};

    fn evaluations(pairs: &[(&str, Rating)]) -> ExtractionResult {
        ExtractionResult {
            new_key_points: Vec::new(),
            evaluations: pairs
                .iter()
                .map(|(name, rating)| Evaluation::new(*name, *rating))
                .collect(),
        }
    }

    fn additions(texts: &[&str]) -> ExtractionResult {
        ExtractionResult {
            new_key_points: texts.iter().map(|t| t.to_string()).collect(),
            evaluations: Vec::new(),
        }
    }

    fn assert_unique_names(playbook: &Playbook) {
        let names: HashSet<&str> = playbook.key_points.iter().map(|kp| kp.name.as_str()).collect();
        assert_eq!(names.len(), playbook.key_points.len());
    }

    #[test]
    fn test_empty_result_is_identity() {
        let playbook = Playbook::with_key_points(vec![
            KeyPoint::new("kpt_001", "a").with_score(3),
            KeyPoint::new("custom", "b").with_score(-4),
        ]);
        let updated = apply(playbook.clone(), &ExtractionResult::empty());
        assert_eq!(updated, playbook);
    }

    #[test]
    fn test_empty_result_still_prunes_low_scores() {
        let playbook = Playbook::with_key_points(vec![
            KeyPoint::new("kpt_001", "keep"),
            KeyPoint::new("kpt_002", "stale").with_score(-7),
        ]);
        let updated = apply(playbook, &ExtractionResult::empty());
        assert_eq!(updated.key_points.len(), 1);
        assert_eq!(updated.key_points[0].name, "kpt_001");
    }

    #[test]
    fn test_new_key_points_appended_in_order() {
        let playbook = Playbook::with_key_points(vec![KeyPoint::new("kpt_002", "existing")]);
        let updated = apply(playbook, &additions(&["first", "second"]));

        let names: Vec<&str> = updated.key_points.iter().map(|kp| kp.name.as_str()).collect();
        assert_eq!(names, vec!["kpt_002", "kpt_003", "kpt_004"]);
        assert_eq!(updated.key_points[2].text, "second");
        assert_eq!(updated.key_points[2].score, 0);
    }

    #[test]
    fn test_duplicate_and_empty_texts_skipped() {
        let playbook = Playbook::with_key_points(vec![KeyPoint::new("kpt_001", "known").with_score(-2)]);
        let updated = apply(playbook, &additions(&["known", "", "   ", "fresh", "fresh"]));

        assert_eq!(updated.key_points.len(), 2);
        assert_eq!(updated.key_points[0].score, -2);
        assert_eq!(updated.key_points[1], KeyPoint::new("kpt_002", "fresh"));
    }

    #[test]
    fn test_dedup_is_by_text_not_name() {
        let playbook = Playbook::with_key_points(vec![KeyPoint::new("kpt_001", "lesson")]);
        let updated = apply(playbook, &additions(&["kpt_001"]));
        assert_eq!(updated.key_points.len(), 2);
        assert_eq!(updated.key_points[1].name, "kpt_002");
    }

    #[test]
    fn test_rating_deltas_applied() {
        let playbook = Playbook::with_key_points(vec![
            KeyPoint::new("kpt_001", "a"),
            KeyPoint::new("kpt_002", "b"),
            KeyPoint::new("kpt_003", "c"),
        ]);
        let updated = apply(
            playbook,
            &evaluations(&[
                ("kpt_001", Rating::Helpful),
                ("kpt_002", Rating::Harmful),
                ("kpt_003", Rating::Neutral),
                ("kpt_404", Rating::Helpful),
            ]),
        );

        let scores: Vec<i64> = updated.key_points.iter().map(|kp| kp.score).collect();
        assert_eq!(scores, vec![1, -3, -1]);
    }

    #[test]
    fn test_unrecognized_rating_is_zero_delta() {
        let playbook = Playbook::with_key_points(vec![KeyPoint::new("kpt_001", "a").with_score(2)]);
        let result = ExtractionResult {
            new_key_points: Vec::new(),
            evaluations: vec![Evaluation {
                name: "kpt_001".into(),
                rating: "meh".into(),
            }],
        };
        let updated = apply(playbook, &result);
        assert_eq!(updated.key_points[0].score, 2);
    }

    #[test]
    fn test_two_harmful_ratings_prune_from_zero() {
        let playbook = Playbook::with_key_points(vec![KeyPoint::new("kpt_001", "wrong")]);
        let harmful = evaluations(&[("kpt_001", Rating::Harmful)]);

        let once = apply(playbook, &harmful);
        assert_eq!(once.key_points[0].score, -3);

        let twice = apply(once, &harmful);
        assert!(twice.is_empty());
    }

    #[test]
    fn test_scores_saturate_at_extremes() {
        let playbook = Playbook::with_key_points(vec![
            KeyPoint::new("kpt_001", "hand edited low").with_score(i64::MIN + 1),
            KeyPoint::new("kpt_002", "hand edited high").with_score(i64::MAX),
        ]);
        let result = evaluations(&[("kpt_001", Rating::Harmful), ("kpt_002", Rating::Helpful)]);

        let updated = apply(playbook, &result);
        assert_eq!(
            updated.key_points,
            vec![KeyPoint::new("kpt_002", "hand edited high").with_score(i64::MAX)]
        );
    }

    #[test]
    fn test_add_after_largest_name() {
        let max = format!("kpt_{}", u64::MAX);
        let playbook = Playbook::with_key_points(vec![KeyPoint::new(max.clone(), "odd")]);

        let updated = apply(playbook, &additions(&["fresh"]));
        assert_eq!(updated.key_points[0].name, max);
        assert_eq!(updated.key_points[1].name, "kpt_001");
    }

    #[test]
    fn test_prune_boundary() {
        let playbook = Playbook::with_key_points(vec![
            KeyPoint::new("kpt_001", "survives").with_score(-4),
            KeyPoint::new("kpt_002", "pruned").with_score(-5),
        ]);
        let updated = apply(playbook, &ExtractionResult::empty());
        assert_eq!(updated.key_points.len(), 1);
        assert_eq!(updated.key_points[0].text, "survives");
    }

    #[test]
    fn test_new_key_point_can_be_rated_in_same_result() {
        let result = ExtractionResult {
            new_key_points: vec!["fresh".into()],
            evaluations: vec![Evaluation::new("kpt_001", Rating::Helpful)],
        };
        let updated = apply(Playbook::new(), &result);
        assert_eq!(updated.get("kpt_001").map(|kp| kp.score), Some(1));
    }

    #[test]
    fn test_names_stay_unique_across_merges() {
        let mut playbook = Playbook::with_key_points(vec![
            KeyPoint::new("lesson", "custom name"),
            KeyPoint::new("kpt_010", "high"),
        ]);
        for round in 0..5 {
            let text = format!("lesson {}", round);
            playbook = apply(playbook, &additions(&[text.as_str(), "shared"]));
            assert_unique_names(&playbook);
        }
        playbook = apply(
            playbook,
            &evaluations(&[("kpt_010", Rating::Harmful), ("kpt_010", Rating::Harmful)]),
        );
        playbook = apply(playbook, &additions(&["after prune"]));
        assert_unique_names(&playbook);
        assert_eq!(playbook.key_points.len(), 8);
    }
}
