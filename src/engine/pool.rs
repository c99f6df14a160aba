//! Candidate pool loading.
//!
//! Builds a normalized, deduplicated candidate list with workload computed
//! at load time. Rebuilt fresh on every engine invocation so current_load
//! tracks assignments as they land; nothing here is cached.

use crate::db::Database;
use crate::types::{split_skills, Candidate};
use anyhow::Result;
use std::collections::HashMap;
use tracing::debug;

/// Load eligible candidates from the directory, capped at `limit`.
///
/// Member records are read first, then bare identities. When the same
/// underlying identity appears through both representations, the
/// higher-experience one is kept. Capping keeps the highest-experience
/// candidates; this bounds downstream cost and is not a ranking guarantee.
pub fn load_candidates(db: &Database, limit: usize) -> Result<Vec<Candidate>> {
    let mut by_key: HashMap<String, Candidate> = HashMap::new();

    for member in db.list_active_members(limit)? {
        let identity = match &member.identity_id {
            Some(id) => db.get_identity(id)?,
            None => None,
        };

        let (name, email) = match &identity {
            Some(identity) => (identity.name.clone(), identity.email.clone()),
            None => (member.role.clone(), None),
        };
        let name = if name.trim().is_empty() {
            member.id.clone()
        } else {
            name
        };

        let skills = if member.skills.trim().is_empty() {
            identity
                .as_ref()
                .map(|i| split_skills(&i.skills))
                .unwrap_or_default()
        } else {
            split_skills(&member.skills)
        };

        let load_key = member.identity_id.as_deref().unwrap_or(&member.id);
        let current_load = db.count_assigned_to(load_key)? as i32;

        let candidate = Candidate {
            id: member.id.clone(),
            identity_id: member.identity_id.clone(),
            name,
            email,
            skills,
            experience: member.experience.max(0.0),
            developer_type: member
                .developer_type
                .or(identity.as_ref().and_then(|i| i.developer_type)),
            current_load,
        };

        insert_preferring_experience(&mut by_key, candidate);
    }

    for identity in db.list_active_identities(limit)? {
        let current_load = db.count_assigned_to(&identity.id)? as i32;
        let candidate = Candidate {
            id: identity.id.clone(),
            identity_id: Some(identity.id.clone()),
            name: identity.name.clone(),
            email: identity.email.clone(),
            skills: split_skills(&identity.skills),
            experience: identity.experience.max(0.0),
            developer_type: identity.developer_type,
            current_load,
        };

        insert_preferring_experience(&mut by_key, candidate);
    }

    let mut candidates: Vec<Candidate> = by_key.into_values().collect();
    candidates.sort_by(|a, b| {
        b.experience
            .partial_cmp(&a.experience)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    candidates.truncate(limit);

    debug!(count = candidates.len(), "loaded candidate pool");
    Ok(candidates)
}

/// Dedup by underlying identity, keeping the higher-experience record.
fn insert_preferring_experience(by_key: &mut HashMap<String, Candidate>, candidate: Candidate) {
    let key = candidate
        .identity_id
        .clone()
        .unwrap_or_else(|| candidate.id.clone());

    match by_key.get(&key) {
        Some(existing) if existing.experience >= candidate.experience => {}
        _ => {
            by_key.insert(key, candidate);
        }
    }
}
