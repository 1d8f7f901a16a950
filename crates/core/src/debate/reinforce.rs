//! Reinforce stage (spec §4.7 point 5, §9 open question (c)): folds a
//! finished debate's outcome into the user's `AutonomyProfile`. The step
//! size is capped at ±0.05 by `AutonomyProfile::apply_reinforcement`
//! itself, so this module only has to decide sign and magnitude intent.

use ac_domain::entities::{AutonomyProfile, ReinforcementEvent, ReinforcementFlags, VerifierResult};
use chrono::NaiveDate;

/// Builds the event that will be logged and folded into the profile.
/// `all_steps_succeeded` is `false` whenever any executed step failed or
/// the debate was rejected outright.
pub fn build_event(
    user_id: impl Into<String>,
    verdict: VerifierResult,
    all_steps_succeeded: bool,
    reasoning: impl Into<String>,
) -> ReinforcementEvent {
    let score = match (verdict, all_steps_succeeded) {
        (VerifierResult::Approve, true) => 0.05,
        (VerifierResult::Approve, false) => -0.02,
        (VerifierResult::Revise, _) => 0.0,
        (VerifierResult::Reject, _) => -0.05,
    };
    let flags = ReinforcementFlags {
        task_succeeded: all_steps_succeeded,
        concise: false,
        helpful: matches!(verdict, VerifierResult::Approve),
        emotionally_aligned: false,
    };
    ReinforcementEvent::new(user_id, score, flags, reasoning)
}

/// Applies `event` to `profile`, splitting its score evenly between
/// engagement and initiative (spec has no separate weighting for the two
/// axes, so a completed autonomous action moves both the same amount).
pub fn apply(profile: &mut AutonomyProfile, event: &ReinforcementEvent, today: NaiveDate) {
    profile.apply_reinforcement(event.score, event.score, today);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_approval_yields_positive_score() {
        let ev = build_event("u1", VerifierResult::Approve, true, "all steps ok");
        assert!(ev.score > 0.0);
    }

    #[test]
    fn rejection_yields_negative_score() {
        let ev = build_event("u1", VerifierResult::Reject, false, "denied pattern");
        assert!(ev.score < 0.0);
    }

    #[test]
    fn apply_moves_both_axes_together() {
        let mut profile = AutonomyProfile::new("u1", chrono::Utc::now().date_naive());
        let before_e = profile.engagement_score;
        let before_i = profile.initiative_level;
        let ev = build_event("u1", VerifierResult::Approve, true, "ok");
        apply(&mut profile, &ev, chrono::Utc::now().date_naive());
        assert!(profile.engagement_score > before_e);
        assert!(profile.initiative_level > before_i);
    }
}
