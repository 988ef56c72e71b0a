use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::canon::canonical_key;
use crate::matcher::ListMatcher;
use crate::model::{ListDescriptor, ModeGroup, SessionRecord};

/// Completion of one list, 0–100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListProgress {
    pub identifier: String,
    pub label: String,
    pub percent: u8,
}

/// Best percentage per mode among the sessions that belong to `list`.
///
/// Each session is recorded under its canonical mode and under the canonical
/// key of its raw mode, so partially migrated data still lines up.
#[must_use]
pub fn best_by_mode(list: &ListDescriptor, sessions: &[SessionRecord]) -> HashMap<String, f64> {
    let matcher = ListMatcher::new(list);
    let mut best: HashMap<String, f64> = HashMap::new();

    for session in sessions.iter().filter(|s| matcher.matches_record(s)) {
        let Some(pct) = session.percentage() else {
            continue;
        };
        let raw_key = canonical_key(session.mode.as_deref().unwrap_or_default());
        for mode in [session.canonical_mode(), raw_key] {
            if mode.is_empty() {
                continue;
            }
            best.entry(mode)
                .and_modify(|current| *current = current.max(pct))
                .or_insert(pct);
        }
    }
    best
}

/// One percentage per list, in the order the lists were given.
///
/// The percentage is the mean over every mode in `group`; a mode with no
/// qualifying session counts as 0.
#[must_use]
pub fn compute_percentages(
    lists: &[ListDescriptor],
    sessions: &[SessionRecord],
    group: &ModeGroup,
) -> Vec<ListProgress> {
    lists
        .iter()
        .map(|list| {
            let best = best_by_mode(list, sessions);
            ListProgress {
                identifier: list.identifier().to_owned(),
                label: list.display_label().to_owned(),
                percent: mean_percent(&best, group),
            }
        })
        .collect()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn mean_percent(best: &HashMap<String, f64>, group: &ModeGroup) -> u8 {
    let modes = group.modes();
    if modes.is_empty() {
        return 0;
    }
    let sum: f64 = modes
        .iter()
        .map(|mode| best.get(mode).copied().unwrap_or(0.0))
        .sum();
    (sum / modes.len() as f64).round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn animals() -> ListDescriptor {
        ListDescriptor::new("Animals.json", "Animals").unwrap()
    }

    #[test]
    fn end_to_end_scenario() {
        let sessions = vec![
            SessionRecord::new("meaning", "Animals.json").with_score(8.0, 10.0),
            SessionRecord::new("listening", "animals").with_correct(10.0, 10.0),
        ];
        let result = compute_percentages(&[animals()], &sessions, &ModeGroup::general());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].identifier, "Animals.json");
        assert_eq!(result[0].label, "Animals");
        assert_eq!(result[0].percent, 30);
    }

    #[test]
    fn untried_modes_count_as_zero() {
        let group = ModeGroup::new("abcd", ["a", "b", "c", "d"]);
        let list = ListDescriptor::new("list", "List").unwrap();
        let sessions = vec![SessionRecord::new("a", "list").with_score(80.0, 100.0)];
        // "a" is not in the canonical table, so it only lands under its raw key.
        let result = compute_percentages(&[list], &sessions, &group);
        assert_eq!(result[0].percent, 20);
    }

    #[test]
    fn best_attempt_wins_in_either_order() {
        let list = animals();
        let low = SessionRecord::new("meaning", "Animals").with_accuracy(0.4);
        let high = SessionRecord::new("meaning", "Animals").with_accuracy(0.7);

        for order in [vec![low.clone(), high.clone()], vec![high, low]] {
            let best = best_by_mode(&list, &order);
            assert_eq!(best.get("meaning").copied(), Some(70.0));
        }
    }

    #[test]
    fn anonymous_sessions_do_not_contaminate() {
        let lists = [animals(), ListDescriptor::new("Fruits.json", "Fruits").unwrap()];
        let baseline = vec![SessionRecord::new("meaning", "Animals").with_score(10.0, 10.0)];
        let mut with_anonymous = baseline.clone();
        with_anonymous.push(SessionRecord {
            mode: Some("listening".into()),
            score: Some(10.0),
            total: Some(10.0),
            ..SessionRecord::default()
        });

        let group = ModeGroup::general();
        assert_eq!(
            compute_percentages(&lists, &baseline, &group),
            compute_percentages(&lists, &with_anonymous, &group)
        );
    }

    #[test]
    fn unscored_and_foreign_sessions_are_skipped() {
        let sessions = vec![
            SessionRecord::new("meaning", "Animals"),
            SessionRecord::new("listening", "Fruits").with_score(10.0, 10.0),
        ];
        let result = compute_percentages(&[animals()], &sessions, &ModeGroup::general());
        assert_eq!(result[0].percent, 0);
    }

    #[test]
    fn full_marks_everywhere_is_one_hundred() {
        let sessions: Vec<_> = ModeGroup::general()
            .modes()
            .iter()
            .map(|mode| SessionRecord::new(mode.as_str(), "Animals").with_accuracy(1.0))
            .collect();
        let result = compute_percentages(&[animals()], &sessions, &ModeGroup::general());
        assert_eq!(result[0].percent, 100);
    }

    #[test]
    fn raw_spellings_feed_canonical_modes() {
        let sessions = vec![SessionRecord::new("Picture Choice", "Animals").with_accuracy(0.9)];
        let best = best_by_mode(&animals(), &sessions);
        assert_eq!(best.get("multi_choice").copied(), Some(90.0));
        assert_eq!(best.get("picture_choice").copied(), Some(90.0));
    }
}
