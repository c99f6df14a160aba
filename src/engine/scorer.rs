//! Candidate scoring. Pure: no I/O, no randomness, no shared state.

use crate::config::ScoringWeights;
use crate::types::{Candidate, TaskDescriptor};

/// Result of scoring one candidate against one task.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBreakdown {
    /// Final score in 0..=100.
    pub score: i32,
    /// Short human-readable trace of the components used.
    pub reason: String,
    /// Count of required skills the candidate has.
    pub overlap: usize,
}

/// Score a candidate against a task's requirements.
///
/// Components: skill overlap (capped), experience (capped years), a
/// developer-type match, a seniority bonus, and a workload penalty. A
/// candidate with zero skill overlap is penalized unless their developer
/// type matches and they have substantial experience, in which case an
/// experience floor keeps them selectable.
pub fn score_candidate(
    weights: &ScoringWeights,
    task: &TaskDescriptor,
    candidate: &Candidate,
) -> ScoreBreakdown {
    let required: Vec<String> = task
        .required_skills
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();

    let overlap = required
        .iter()
        .filter(|s| candidate.skills.iter().any(|c| c == *s))
        .count();

    let skill_score = weights
        .skill_cap
        .min(overlap as f64 * weights.skill_per_overlap);

    let capped_exp = candidate
        .experience
        .max(0.0)
        .min(weights.experience_cap_years);
    let mut exp_score = (capped_exp / weights.experience_cap_years) * weights.experience_weight;

    let required_dev = task.effective_developer_type();
    let dev_score = match (required_dev, candidate.developer_type) {
        (Some(req), Some(have)) if req == have => weights.dev_type_match,
        _ => 0.0,
    };

    let seniority_bonus = if candidate.experience >= 8.0 {
        weights.senior_bonus
    } else if candidate.experience >= 5.0 {
        weights.mid_bonus
    } else {
        0.0
    };

    let mut no_overlap_allowed = false;
    if !required.is_empty() && overlap == 0 {
        if dev_score > 0.0 && candidate.experience >= 5.0 {
            // Allowed despite no skill match.
            no_overlap_allowed = true;
            exp_score = exp_score.max(weights.no_overlap_floor);
        } else {
            exp_score = (exp_score - weights.no_overlap_penalty).max(0.0);
        }
    }

    let base = (skill_score + exp_score + dev_score + seniority_bonus).clamp(0.0, 100.0);

    let load_penalty = weights
        .load_penalty_cap
        .min(candidate.current_load.max(0) as f64 * weights.load_penalty_per_task);

    let score = (base - load_penalty).max(0.0).round() as i32;

    let mut reason = format!(
        "skills overlap {}/{}; exp {}yr (+{} bonus); devType match: {}",
        overlap,
        required.len(),
        candidate.experience,
        seniority_bonus,
        if dev_score > 0.0 { "yes" } else { "no" },
    );
    if no_overlap_allowed {
        reason.push_str("; no skill overlap but devType+exp match -> allowed");
    }
    if load_penalty > 0.0 {
        reason.push_str(&format!("; load penalty {}", load_penalty));
    }

    ScoreBreakdown {
        score,
        reason,
        overlap,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeveloperType;

    fn candidate(skills: &[&str], experience: f64, dev: Option<DeveloperType>, load: i32) -> Candidate {
        Candidate {
            id: "c1".to_string(),
            identity_id: None,
            name: "Test".to_string(),
            email: None,
            skills: skills.iter().map(|s| s.to_string()).collect(),
            experience,
            developer_type: dev,
            current_load: load,
        }
    }

    fn task(required: &[&str], dev: Option<DeveloperType>) -> TaskDescriptor {
        TaskDescriptor {
            task_id: "t1".to_string(),
            title: "Test".to_string(),
            web_desc: String::new(),
            mobile_desc: String::new(),
            design_desc: String::new(),
            tags: vec![],
            priority: Default::default(),
            deadline: None,
            hours: 0,
            required_developer_type: dev,
            required_skills: required.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn score_is_deterministic() {
        let w = ScoringWeights::default();
        let t = task(&["react", "api"], Some(DeveloperType::Web));
        let c = candidate(&["react", "api", "rust"], 6.0, Some(DeveloperType::Web), 1);

        let a = score_candidate(&w, &t, &c);
        let b = score_candidate(&w, &t, &c);
        assert_eq!(a, b);
    }

    #[test]
    fn full_match_components_add_up() {
        let w = ScoringWeights::default();
        let t = task(&["react", "api"], Some(DeveloperType::Web));
        let c = candidate(&["react", "api"], 6.0, Some(DeveloperType::Web), 0);

        // skill 30 + exp 7.5 + dev 15 + bonus 3 = 55.5 -> 56
        let breakdown = score_candidate(&w, &t, &c);
        assert_eq!(breakdown.score, 56);
        assert_eq!(breakdown.overlap, 2);
    }

    #[test]
    fn skill_component_is_capped() {
        let w = ScoringWeights::default();
        let t = task(&["a", "b", "c", "d", "e", "f"], None);
        let c = candidate(&["a", "b", "c", "d", "e", "f"], 0.0, None, 0);

        // 6 overlaps would be 90 uncapped; cap holds it at 60.
        assert_eq!(score_candidate(&w, &t, &c).score, 60);
    }

    #[test]
    fn score_stays_in_range_for_extreme_inputs() {
        let w = ScoringWeights::default();
        let t = task(&["a", "b", "c", "d", "e", "f", "g", "h"], Some(DeveloperType::Web));
        let best = candidate(
            &["a", "b", "c", "d", "e", "f", "g", "h"],
            40.0,
            Some(DeveloperType::Web),
            0,
        );
        let worst = candidate(&[], 0.0, None, 50);

        let high = score_candidate(&w, &t, &best).score;
        let low = score_candidate(&w, &t, &worst).score;
        assert!((0..=100).contains(&high));
        assert!((0..=100).contains(&low));
        assert_eq!(low, 0);
    }

    #[test]
    fn no_overlap_with_dev_match_and_experience_keeps_floor() {
        let w = ScoringWeights::default();
        let t = task(&["react"], Some(DeveloperType::Web));
        let c = candidate(&["cobol"], 6.0, Some(DeveloperType::Web), 0);

        // exp floor 18 + dev 15 + bonus 3 = 36
        let breakdown = score_candidate(&w, &t, &c);
        assert_eq!(breakdown.score, 36);
        assert!(breakdown.reason.contains("allowed"));
    }

    #[test]
    fn no_overlap_without_dev_match_is_penalized() {
        let w = ScoringWeights::default();
        let t = task(&["react"], Some(DeveloperType::Web));
        let c = candidate(&[], 10.0, Some(DeveloperType::Mobile), 0);

        // exp 12.5 - 10 = 2.5, bonus 5 -> 7.5 -> 8
        assert_eq!(score_candidate(&w, &t, &c).score, 8);
    }

    #[test]
    fn workload_penalty_is_capped() {
        let w = ScoringWeights::default();
        let t = task(&["react", "api"], Some(DeveloperType::Web));
        let idle = candidate(&["react", "api"], 10.0, Some(DeveloperType::Web), 0);
        let slammed = candidate(&["react", "api"], 10.0, Some(DeveloperType::Web), 12);

        let idle_score = score_candidate(&w, &t, &idle).score;
        let slammed_score = score_candidate(&w, &t, &slammed).score;
        // 12 tasks would be -60 uncapped; the cap limits it to -20.
        assert_eq!(idle_score - slammed_score, 20);
    }

    #[test]
    fn skill_matching_is_case_insensitive_on_task_side() {
        let w = ScoringWeights::default();
        let t = task(&["React", " API "], None);
        let c = candidate(&["react", "api"], 0.0, None, 0);

        assert_eq!(score_candidate(&w, &t, &c).overlap, 2);
    }
}
