//! Heuristic priority ranking.
//!
//! The score is additive: +10 for "urgent", +5 for a question mark, plus a
//! recency term `min(5, age_days * -0.5)` that is capped above and unbounded
//! below. "Now" is always passed in; nothing here reads the wall clock.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::domain::message::Message;

pub const MILLIS_PER_DAY: f64 = 86_400_000.0;

const URGENT_KEYWORD: &str = "urgent";
const URGENT_BONUS: f64 = 10.0;
const QUESTION_BONUS: f64 = 5.0;
const RECENCY_PER_DAY: f64 = -0.5;
const RECENCY_CAP: f64 = 5.0;

/// Source of "now" for ranking.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.0
    }
}

pub fn score(message: &Message, now_millis: i64) -> f64 {
    let mut haystack = message.text.to_lowercase();
    if let Some(subject) = &message.subject {
        haystack.push_str(&subject.to_lowercase());
    }

    let mut total = 0.0;
    if haystack.contains(URGENT_KEYWORD) {
        total += URGENT_BONUS;
    }
    if haystack.contains('?') {
        total += QUESTION_BONUS;
    }

    // in f64: the i64 difference overflows for far-apart timestamps
    let age_days = (now_millis as f64 - message.timestamp_millis as f64) / MILLIS_PER_DAY;
    total + (age_days * RECENCY_PER_DAY).min(RECENCY_CAP)
}

/// Copy and sort descending by score. Equal scores keep their input order.
pub fn prioritize(messages: &[Message], now_millis: i64) -> Vec<Message> {
    let mut scored: Vec<(f64, &Message)> = messages
        .iter()
        .map(|m| (score(m, now_millis), m))
        .collect();

    // sort_by is stable
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    scored.into_iter().map(|(_, m)| m.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::Source;

    const NOW: i64 = 1_760_000_000_000;
    const DAY: i64 = 86_400_000;

    fn msg(id: &str, text: &str, age_millis: i64) -> Message {
        Message::new(id, Source::Gmail, "alice", None, text, NOW - age_millis)
    }

    fn ids(list: &[Message]) -> Vec<&str> {
        list.iter().map(|m| m.id.as_str()).collect()
    }

    fn sample() -> Vec<Message> {
        vec![
            msg("a", "lunch on friday", 3 * DAY),
            msg("b", "URGENT: Need ARR figure before 3pm", 2 * DAY),
            msg("c", "can you review the deck?", DAY),
            msg("d", "lunch on friday", 3 * DAY),
            Message::new(
                "e",
                Source::Slack,
                "U123",
                Some("Urgent question?".to_string()),
                "ping",
                NOW - 40 * DAY,
            ),
            msg("f", "fyi", 0),
            msg("g", "fyi", 0),
        ]
    }

    #[test]
    fn urgent_keyword_adds_at_least_ten() {
        let with = msg("1", "URGENT: Need ARR figure before 3pm", DAY);
        let without = msg("2", "Need ARR figure before 3pm", DAY);
        assert!(score(&with, NOW) - score(&without, NOW) >= 10.0);
    }

    #[test]
    fn question_mark_adds_exactly_five() {
        let with = msg("1", "are we still on for 3pm?", DAY);
        let without = msg("2", "are we still on for 3pm", DAY);
        assert_eq!(score(&with, NOW) - score(&without, NOW), 5.0);
    }

    #[test]
    fn keywords_match_in_subject_case_insensitively() {
        let m = Message::new(
            "1",
            Source::Gmail,
            "alice",
            Some("uRgEnT".to_string()),
            "body",
            NOW,
        );
        assert_eq!(score(&m, NOW), 10.0);
    }

    #[test]
    fn recency_term_is_zero_now_and_linear_with_age() {
        assert_eq!(score(&msg("1", "hi", 0), NOW), 0.0);
        assert_eq!(score(&msg("1", "hi", 2 * DAY), NOW), -1.0);
        assert_eq!(score(&msg("1", "hi", 10 * DAY), NOW), -5.0);
    }

    #[test]
    fn old_messages_are_not_floored() {
        assert_eq!(score(&msg("1", "hi", 100 * DAY), NOW), -50.0);
    }

    #[test]
    fn future_messages_are_capped_at_five() {
        assert_eq!(score(&msg("1", "hi", -2 * DAY), NOW), 1.0);
        assert_eq!(score(&msg("1", "hi", -365 * DAY), NOW), 5.0);
    }

    #[test]
    fn extreme_timestamps_stay_finite() {
        let ancient = Message::new("old", Source::Gmail, "a", None, "hi", i64::MIN);
        let far_future = Message::new("new", Source::Gmail, "a", None, "hi", i64::MAX);

        let old_score = score(&ancient, NOW);
        assert!(old_score.is_finite());
        assert!(old_score < 0.0);
        assert_eq!(score(&far_future, NOW), 5.0);
        assert!(score(&ancient, i64::MAX).is_finite());

        let ranked = prioritize(&[ancient, far_future], NOW);
        assert_eq!(ids(&ranked), vec!["new", "old"]);
    }

    #[test]
    fn score_never_increases_with_age() {
        let mut prev = f64::INFINITY;
        for hours in (0..24 * 60).step_by(7) {
            let s = score(&msg("1", "urgent?", hours * 3_600_000), NOW);
            assert!(s <= prev, "score rose at {hours}h: {s} > {prev}");
            prev = s;
        }
    }

    #[test]
    fn prioritize_is_a_permutation() {
        let input = sample();
        let out = prioritize(&input, NOW);
        assert_eq!(out.len(), input.len());
        let mut a = ids(&input);
        let mut b = ids(&out);
        a.sort();
        b.sort();
        assert_eq!(a, b);
    }

    #[test]
    fn prioritize_orders_by_descending_score() {
        let out = prioritize(&sample(), NOW);
        for pair in out.windows(2) {
            assert!(score(&pair[0], NOW) >= score(&pair[1], NOW));
        }
        assert_eq!(out[0].id, "b");
    }

    #[test]
    fn prioritize_is_stable_for_equal_scores() {
        let out = prioritize(&sample(), NOW);
        let order = ids(&out);
        let pos = |id: &str| order.iter().position(|x| *x == id).unwrap();
        assert!(pos("a") < pos("d"));
        assert!(pos("f") < pos("g"));

        let reversed: Vec<Message> = sample().into_iter().rev().collect();
        let order = prioritize(&reversed, NOW);
        let order = ids(&order);
        let pos = |id: &str| order.iter().position(|x| *x == id).unwrap();
        assert!(pos("d") < pos("a"));
        assert!(pos("g") < pos("f"));
    }

    #[test]
    fn prioritize_leaves_input_untouched() {
        let input = sample();
        let before = input.clone();
        let _ = prioritize(&input, NOW);
        assert_eq!(input, before);
    }

    #[test]
    fn prioritize_is_idempotent_for_fixed_now() {
        let once = prioritize(&sample(), NOW);
        let twice = prioritize(&once, NOW);
        assert_eq!(once, twice);
    }

    #[test]
    fn prioritize_empty() {
        assert!(prioritize(&[], NOW).is_empty());
    }

    #[test]
    fn fixed_clock_reports_its_instant() {
        assert_eq!(FixedClock(NOW).now_millis(), NOW);
        assert!(SystemClock.now_millis() > 0);
    }
}
