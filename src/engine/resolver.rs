//! Identity resolution: map a chosen candidate reference back to a
//! canonical identity record.
//!
//! Strategies run in strict order behind one interface; the pipeline stops
//! at the first hit and records every attempted step in the diagnostic
//! trail regardless of outcome. Exhausting the chain is an expected result,
//! not an error.

use crate::db::Database;
use crate::types::{Candidate, Identity};
use anyhow::Result;
use tracing::{debug, warn};

/// Inputs shared by every strategy.
pub struct ResolveContext<'a> {
    pub db: &'a Database,
    pub chosen_id: Option<&'a str>,
    pub chosen_name: Option<&'a str>,
    pub candidates: &'a [Candidate],
}

/// One lookup strategy in the chain.
pub trait ResolveStrategy {
    fn name(&self) -> &'static str;

    /// `Ok(None)` means "no match here, try the next strategy".
    fn try_resolve(&self, ctx: &ResolveContext) -> Result<Option<Identity>>;
}

/// The candidate entry matching the chosen id carries an embedded identity
/// reference.
struct CandidateIdentityRef;

impl ResolveStrategy for CandidateIdentityRef {
    fn name(&self) -> &'static str {
        "candidate identity ref"
    }

    fn try_resolve(&self, ctx: &ResolveContext) -> Result<Option<Identity>> {
        let Some(chosen_id) = ctx.chosen_id else {
            return Ok(None);
        };
        for candidate in ctx.candidates {
            if candidate.id == chosen_id {
                if let Some(identity_id) = &candidate.identity_id {
                    return ctx.db.get_identity(identity_id);
                }
            }
        }
        Ok(None)
    }
}

/// Candidate ids and identity ids share a namespace in some deployments.
struct DirectIdentity;

impl ResolveStrategy for DirectIdentity {
    fn name(&self) -> &'static str {
        "direct identity lookup"
    }

    fn try_resolve(&self, ctx: &ResolveContext) -> Result<Option<Identity>> {
        match ctx.chosen_id {
            Some(id) => ctx.db.get_identity(id),
            None => Ok(None),
        }
    }
}

/// A member record by the chosen id, following its identity reference.
struct MemberIdentity;

impl ResolveStrategy for MemberIdentity {
    fn name(&self) -> &'static str {
        "member record lookup"
    }

    fn try_resolve(&self, ctx: &ResolveContext) -> Result<Option<Identity>> {
        let Some(id) = ctx.chosen_id else {
            return Ok(None);
        };
        let Some(member) = ctx.db.get_member(id)? else {
            return Ok(None);
        };
        match &member.identity_id {
            Some(identity_id) => ctx.db.get_identity(identity_id),
            None => Ok(None),
        }
    }
}

/// Defensive re-scan: any candidate entry with an identity reference that
/// resolves.
struct CandidateRescan;

impl ResolveStrategy for CandidateRescan {
    fn name(&self) -> &'static str {
        "candidate list re-scan"
    }

    fn try_resolve(&self, ctx: &ResolveContext) -> Result<Option<Identity>> {
        for candidate in ctx.candidates {
            if let Some(identity_id) = &candidate.identity_id {
                if let Some(identity) = ctx.db.get_identity(identity_id)? {
                    return Ok(Some(identity));
                }
            }
        }
        Ok(None)
    }
}

/// Exact case-insensitive match of the chosen name against identity name
/// or email.
struct ExactNameEmail;

impl ResolveStrategy for ExactNameEmail {
    fn name(&self) -> &'static str {
        "exact name/email match"
    }

    fn try_resolve(&self, ctx: &ResolveContext) -> Result<Option<Identity>> {
        match ctx.chosen_name {
            Some(name) if !name.trim().is_empty() => ctx.db.find_identity_exact(name),
            _ => Ok(None),
        }
    }
}

/// Fuzzy fallback: any name token of length >= 2 contained in an identity
/// name or email.
struct FuzzyName;

impl ResolveStrategy for FuzzyName {
    fn name(&self) -> &'static str {
        "fuzzy name match"
    }

    fn try_resolve(&self, ctx: &ResolveContext) -> Result<Option<Identity>> {
        let Some(name) = ctx.chosen_name else {
            return Ok(None);
        };
        for token in name
            .split(|c: char| c.is_whitespace() || matches!(c, ',' | '_' | '-' | '.'))
            .map(str::trim)
            .filter(|t| t.len() >= 2)
        {
            if let Some(identity) = ctx.db.find_identity_containing(token)? {
                return Ok(Some(identity));
            }
        }
        Ok(None)
    }
}

fn strategies() -> Vec<Box<dyn ResolveStrategy>> {
    vec![
        Box::new(CandidateIdentityRef),
        Box::new(DirectIdentity),
        Box::new(MemberIdentity),
        Box::new(CandidateRescan),
        Box::new(ExactNameEmail),
        Box::new(FuzzyName),
    ]
}

/// Run the strategy chain. Returns the first identity found plus the full
/// diagnostic trail of every step attempted.
pub fn resolve(
    db: &Database,
    chosen_id: Option<&str>,
    chosen_name: Option<&str>,
    candidates: &[Candidate],
) -> (Option<Identity>, Vec<String>) {
    let ctx = ResolveContext {
        db,
        chosen_id,
        chosen_name,
        candidates,
    };

    let mut diagnostics = Vec::new();
    diagnostics.push(format!(
        "resolving chosen id={:?} name={:?}",
        chosen_id, chosen_name
    ));

    for strategy in strategies() {
        match strategy.try_resolve(&ctx) {
            Ok(Some(identity)) => {
                diagnostics.push(format!("{}: resolved {}", strategy.name(), identity.id));
                debug!(strategy = strategy.name(), identity_id = %identity.id, "identity resolved");
                return (Some(identity), diagnostics);
            }
            Ok(None) => {
                diagnostics.push(format!("{}: no match", strategy.name()));
            }
            Err(e) => {
                // A failing lookup must not abort the chain.
                warn!(strategy = strategy.name(), error = %e, "resolution step failed");
                diagnostics.push(format!("{}: error ({})", strategy.name(), e));
            }
        }
    }

    diagnostics.push("no resolution found".to_string());
    (None, diagnostics)
}
