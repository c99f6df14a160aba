//! Assignment operations: the automated path, the batch path, and the
//! manual path. These are the only writers of a task's assignment fields.

use crate::config::EngineConfig;
use crate::db::tasks::AssignmentWrite;
use crate::db::{now_ms, Database};
use crate::engine::advisor::{is_member_of, Advisor, HttpAdvisor, RawAdvice};
use crate::engine::fallback::choose_fallback;
use crate::engine::pool::load_candidates;
use crate::engine::resolver;
use crate::engine::scorer::{score_candidate, ScoreBreakdown};
use crate::error::{EngineError, EngineResult};
use crate::types::{Actor, BatchChoice, Candidate, Choice, Identity, Task, TaskDescriptor};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Result of the automated assignment path.
#[derive(Debug)]
pub struct AutoAssignOutcome {
    /// The resolved assignee, when resolution succeeded.
    pub assignee: Option<Identity>,
    /// The selection that was made (possibly a no-op choice).
    pub choice: Choice,
    /// Trail of every selection and resolution step attempted.
    pub diagnostics: Vec<String>,
}

/// The assignment engine. Holds configuration, the optional external
/// advisor, and a seedable RNG for tie-breaks; all cross-call state
/// (workload, prior assignments) is re-derived from the store on every
/// invocation.
pub struct AssignmentEngine {
    db: Database,
    config: EngineConfig,
    advisor: Option<Box<dyn Advisor>>,
    rng: StdRng,
}

impl AssignmentEngine {
    /// Build an engine. The external advisor is wired in only when the
    /// configuration carries an API key.
    pub fn new(db: Database, config: EngineConfig) -> Self {
        let advisor: Option<Box<dyn Advisor>> = if config.advisor.is_configured() {
            Some(Box::new(HttpAdvisor::new(config.advisor.clone())))
        } else {
            None
        };
        Self {
            db,
            config,
            advisor,
            rng: StdRng::from_entropy(),
        }
    }

    /// Replace the advisor (tests inject scripted implementations).
    pub fn with_advisor(mut self, advisor: Box<dyn Advisor>) -> Self {
        self.advisor = Some(advisor);
        self
    }

    /// Seed the tie-break RNG for reproducible selection.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Load the current candidate pool.
    pub fn load_candidates(&self) -> EngineResult<Vec<Candidate>> {
        Ok(load_candidates(&self.db, self.config.candidate_limit)?)
    }

    /// Score one candidate against one task.
    pub fn score(&self, task: &TaskDescriptor, candidate: &Candidate) -> ScoreBreakdown {
        score_candidate(&self.config.weights, task, candidate)
    }

    /// Automated assignment, run once at task creation.
    ///
    /// Skips tasks that already have an assignee or a prior suggestion.
    /// Never fails because of the external service; an unresolvable choice
    /// leaves the task unassigned with its suggestion metadata persisted.
    pub async fn auto_assign(&mut self, task_id: &str) -> EngineResult<AutoAssignOutcome> {
        let mut task = self
            .db
            .get_task(task_id)?
            .ok_or_else(|| EngineError::task_not_found(task_id))?;

        if task.assignee.is_some() || task.ai_suggested {
            debug!(task_id, "auto-assign skipped: already assigned or suggested");
            return Ok(AutoAssignOutcome {
                assignee: None,
                choice: Choice::none("auto-assign skipped"),
                diagnostics: vec![
                    "auto-assign skipped: task already has an assignee or suggestion".to_string(),
                ],
            });
        }

        let descriptor = TaskDescriptor::from_task(&task);
        let candidates = load_candidates(&self.db, self.config.candidate_limit)?;

        if candidates.is_empty() {
            info!(task_id, "auto-assign found no candidates");
            return Ok(AutoAssignOutcome {
                assignee: None,
                choice: Choice::none("no candidates"),
                diagnostics: vec!["no candidates available".to_string()],
            });
        }

        let mut diagnostics = Vec::new();

        let advised = match &self.advisor {
            Some(advisor) => Some(advisor.advise_one(&descriptor, &candidates).await),
            None => None,
        };
        let choice = match advised {
            Some(Ok(choice)) => {
                diagnostics.push(format!(
                    "advisor selected {:?} (confidence {})",
                    choice.member_id, choice.confidence
                ));
                choice
            }
            Some(Err(e)) => {
                warn!(task_id, error = %e, "advisor failed; using deterministic fallback");
                diagnostics.push(format!("advisor failed: {}; using fallback", e));
                self.fallback_choice(&descriptor, &candidates, &HashMap::new())
            }
            // The single-task path applies no batch diversity adjustment.
            None => self.fallback_choice(&descriptor, &candidates, &HashMap::new()),
        };

        let (identity, resolve_diags) = resolver::resolve(
            &self.db,
            choice.member_id.as_deref(),
            choice.member_name.as_deref(),
            &candidates,
        );
        diagnostics.extend(resolve_diags);

        task.ai_suggested = true;
        task.ai_confidence = Some(choice.confidence.clamp(0, 100));
        task.ai_reason = if choice.reason.is_empty() {
            diagnostics.first().cloned().unwrap_or_default()
        } else {
            choice.reason.clone()
        };
        task.ai_meta = json!({
            "chosen": &choice,
            "diagnostics": &diagnostics,
        });

        if let Some(identity) = &identity {
            task.assignee = Some(identity.id.clone());
            task.assigned_by = task.created_by.clone();
            task.assigned_at = Some(now_ms());
            task.assignment_locked = true;
        }

        self.persist_task(&task)?;

        if let Some(identity) = &identity {
            info!(task_id, assignee = %identity.id, confidence = choice.confidence, "auto-assigned");
            self.notify_assignee(&identity.id, &task);
        } else {
            info!(task_id, "auto-assign did not resolve an identity; suggestion persisted");
        }

        Ok(AutoAssignOutcome {
            assignee: identity,
            choice,
            diagnostics,
        })
    }

    /// Batch auto-assign: suggestions for up to the configured batch limit,
    /// processed in input order with one request-scoped diversity map.
    /// Returns suggestions only; no task is written.
    pub async fn batch_auto_assign(
        &mut self,
        tasks: &[TaskDescriptor],
    ) -> EngineResult<Vec<BatchChoice>> {
        if tasks.is_empty() {
            return Err(EngineError::invalid_value(
                "tasks",
                "Provide a non-empty tasks array",
            ));
        }
        if tasks.len() > self.config.max_batch_size {
            return Err(EngineError::batch_too_large(
                tasks.len(),
                self.config.max_batch_size,
            ));
        }

        let candidates = load_candidates(&self.db, self.config.candidate_limit)?;
        if candidates.is_empty() {
            return Ok(tasks
                .iter()
                .map(|t| BatchChoice {
                    task_id: t.task_id.clone(),
                    member_id: None,
                    member_name: None,
                    confidence: 0,
                    reason: "no candidates available".to_string(),
                })
                .collect());
        }

        let mut run_counts: HashMap<String, i32> = HashMap::new();

        let advice_by_task = match &self.advisor {
            Some(advisor) => match advisor.advise_batch(tasks, &candidates).await {
                Ok(items) => {
                    let mut by_task: HashMap<String, RawAdvice> = HashMap::new();
                    for item in items {
                        if let Some(task_id) = &item.task_id {
                            by_task.entry(task_id.clone()).or_insert(item);
                        }
                    }
                    Some(by_task)
                }
                Err(e) => {
                    // The whole call degrades; every task goes through the
                    // deterministic selector.
                    warn!(error = %e, "batch advisor failed; falling back for all tasks");
                    None
                }
            },
            None => None,
        };

        let candidate_ids: HashSet<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
        let mut out = Vec::with_capacity(tasks.len());

        for task in tasks {
            let advice = advice_by_task
                .as_ref()
                .and_then(|m| m.get(&task.task_id));

            let choice = match advice {
                Some(advice) if is_member_of(advice, &candidate_ids) => {
                    let member_name = advice.member_name.clone().or_else(|| {
                        candidates
                            .iter()
                            .find(|c| Some(c.id.as_str()) == advice.member_id.as_deref())
                            .map(|c| c.name.clone())
                    });
                    Choice {
                        member_id: advice.member_id.clone(),
                        member_name,
                        confidence: advice.confidence,
                        reason: advice.reason.clone(),
                    }
                }
                Some(advice) => {
                    warn!(
                        task_id = %task.task_id,
                        member_id = ?advice.member_id,
                        "advisor returned a member outside the candidate set"
                    );
                    let mut fallback = self.fallback_choice(task, &candidates, &run_counts);
                    fallback.reason = format!(
                        "{} [advisor returned invalid memberId {}]",
                        fallback.reason,
                        advice.member_id.as_deref().unwrap_or("<none>")
                    );
                    fallback
                }
                None if advice_by_task.is_some() => {
                    debug!(task_id = %task.task_id, "advisor omitted task; using fallback");
                    self.fallback_choice(task, &candidates, &run_counts)
                }
                None => self.fallback_choice(task, &candidates, &run_counts),
            };

            if let Some(member_id) = &choice.member_id {
                *run_counts.entry(member_id.clone()).or_insert(0) += 1;
            }

            out.push(BatchChoice {
                task_id: task.task_id.clone(),
                member_id: choice.member_id,
                member_name: choice.member_name,
                confidence: choice.confidence,
                reason: choice.reason,
            });
        }

        Ok(out)
    }

    /// Manual assignment by an actor, with permission and lock checks.
    pub fn assign(
        &self,
        task_id: &str,
        candidate_id: &str,
        actor: &Actor,
        force: bool,
    ) -> EngineResult<Task> {
        let task = self
            .db
            .get_task(task_id)?
            .ok_or_else(|| EngineError::task_not_found(task_id))?;

        let allowed = actor.is_staff
            || task.created_by.as_deref() == Some(actor.id.as_str())
            || task.created_by.is_none();
        if !allowed {
            return Err(EngineError::permission_denied(
                "Not allowed. Only staff or the task creator may assign tasks.",
            ));
        }

        let locked = task.assignment_locked || task.ai_suggested;
        if locked && !(actor.is_staff && force) {
            return Err(EngineError::assignment_locked(task_id));
        }

        if candidate_id.trim().is_empty() {
            return Err(EngineError::missing_field("candidate_id"));
        }

        // Identity-first lookup, then member record -> identity.
        let identity = match self.db.get_identity(candidate_id)? {
            Some(identity) => Some(identity),
            None => match self.db.get_member(candidate_id)? {
                Some(member) => match member.identity_id.as_deref() {
                    Some(identity_id) => self.db.get_identity(identity_id)?,
                    None => None,
                },
                None => None,
            },
        };
        let identity = identity.ok_or_else(|| EngineError::identity_not_found(candidate_id))?;

        let force_cleared = actor.is_staff && force && locked;
        let write = AssignmentWrite {
            assignee: Some(identity.id.clone()),
            assigned_by: Some(actor.id.clone()),
            assigned_at: Some(now_ms()),
            ai_suggested: if force_cleared { false } else { task.ai_suggested },
            ai_confidence: if force_cleared { None } else { task.ai_confidence },
            ai_reason: if force_cleared {
                String::new()
            } else {
                task.ai_reason.clone()
            },
            ai_meta: if force_cleared {
                json!({})
            } else {
                task.ai_meta.clone()
            },
            assignment_locked: if force_cleared {
                false
            } else {
                task.assignment_locked
            },
        };

        if let Err(first) = self.db.update_assignment_fields(task_id, &write) {
            warn!(task_id, error = %first, "assignment write failed; retrying once");
            self.db
                .update_assignment_fields(task_id, &write)
                .map_err(|e| EngineError::persistence(task_id, candidate_id, e))?;
        }

        info!(task_id, assignee = %identity.id, actor = %actor.id, force, "task assigned");

        let fresh = self
            .db
            .get_task(task_id)?
            .ok_or_else(|| EngineError::task_not_found(task_id))?;

        self.notify_assignee(&identity.id, &fresh);

        Ok(fresh)
    }

    fn fallback_choice(
        &mut self,
        task: &TaskDescriptor,
        candidates: &[Candidate],
        run_counts: &HashMap<String, i32>,
    ) -> Choice {
        choose_fallback(
            &self.config.weights,
            task,
            candidates,
            run_counts,
            &mut self.rng,
        )
    }

    /// Persist an auto-assign result: normal save first, one direct
    /// field-level retry, then surface the failure.
    fn persist_task(&self, task: &Task) -> EngineResult<()> {
        if let Err(first) = self.db.save_task(task) {
            warn!(task_id = %task.id, error = %first, "task save failed; retrying field-level write");
            let write = AssignmentWrite {
                assignee: task.assignee.clone(),
                assigned_by: task.assigned_by.clone(),
                assigned_at: task.assigned_at,
                ai_suggested: task.ai_suggested,
                ai_confidence: task.ai_confidence,
                ai_reason: task.ai_reason.clone(),
                ai_meta: task.ai_meta.clone(),
                assignment_locked: task.assignment_locked,
            };
            self.db.update_assignment_fields(&task.id, &write).map_err(|e| {
                EngineError::persistence(
                    &task.id,
                    task.assignee.as_deref().unwrap_or("<unassigned>"),
                    e,
                )
            })?;
        }
        Ok(())
    }

    /// Best-effort notification; a failure here never fails the assignment.
    fn notify_assignee(&self, recipient_id: &str, task: &Task) {
        let verb = format!("You have been assigned to task: {}", task.title);
        if let Err(e) = self
            .db
            .create_notification(recipient_id, &verb, Some(&task.id))
        {
            warn!(task_id = %task.id, recipient_id, error = %e, "failed to record notification");
        }
    }
}
