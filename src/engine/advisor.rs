//! External advisor: asks a hosted text-completion service to rank
//! candidates for one or many tasks.
//!
//! The service output is untrusted. Every returned member id is checked
//! against the candidate set supplied for the call, and any network,
//! timeout, or parse failure is reported as an [`AdvisorError`] so the
//! caller can degrade to deterministic fallback selection. Nothing in this
//! module writes state.

use crate::config::AdvisorConfig;
use crate::types::{Candidate, Choice, TaskDescriptor};
use async_trait::async_trait;
use regex_lite::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Hard cap on tasks per advisory call.
pub const MAX_ADVISOR_BATCH: usize = 25;

#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("advisor request failed: {0}")]
    Http(String),

    #[error("advisor request timed out")]
    Timeout,

    #[error("advisor returned status {0}")]
    Status(u16),

    #[error("advisor response was not parseable JSON")]
    Unparseable,

    #[error("advisor returned an invalid selection: {0}")]
    InvalidSelection(String),

    #[error("batch of {0} exceeds the advisor batch limit")]
    BatchTooLarge(usize),
}

/// One raw item from a batch advisory response, before validation.
#[derive(Debug, Clone)]
pub struct RawAdvice {
    pub task_id: Option<String>,
    pub member_id: Option<String>,
    pub member_name: Option<String>,
    pub confidence: i32,
    pub reason: String,
}

/// Advisory seam. Production uses [`HttpAdvisor`]; tests inject scripted
/// implementations.
#[async_trait]
pub trait Advisor: Send + Sync {
    /// Pick a candidate for a single task. The returned choice is already
    /// validated against the candidate set.
    async fn advise_one(
        &self,
        task: &TaskDescriptor,
        candidates: &[Candidate],
    ) -> Result<Choice, AdvisorError>;

    /// Rank candidates for up to [`MAX_ADVISOR_BATCH`] tasks. Items are
    /// returned raw; the caller validates each against the candidate set.
    async fn advise_batch(
        &self,
        tasks: &[TaskDescriptor],
        candidates: &[Candidate],
    ) -> Result<Vec<RawAdvice>, AdvisorError>;
}

/// The compact candidate view sent to the service. Internal-only fields
/// (identity references, workload) never leave the process.
#[derive(Serialize)]
struct CandidateSummary<'a> {
    id: &'a str,
    name: &'a str,
    skills: &'a [String],
    experience: f64,
    developer_type: Option<&'a str>,
}

impl<'a> CandidateSummary<'a> {
    fn from_candidate(c: &'a Candidate) -> Self {
        Self {
            id: &c.id,
            name: &c.name,
            skills: &c.skills,
            experience: c.experience,
            developer_type: c.developer_type.map(|d| d.as_str()),
        }
    }
}

/// Parse JSON out of free text: direct parse first, then the first
/// bracketed or braced substring.
pub fn extract_json(text: &str) -> Option<Value> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str(text) {
        return Some(value);
    }
    let re = Regex::new(r"(\[[\s\S]*\]|\{[\s\S]*\})").expect("valid pattern");
    let captured = re.find(text)?;
    serde_json::from_str(captured.as_str()).ok()
}

fn value_to_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_to_i32(value: Option<&Value>) -> i32 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0).round() as i32,
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Read one advice object, tolerating camelCase and snake_case keys.
pub fn parse_advice_item(item: &Value) -> RawAdvice {
    RawAdvice {
        task_id: value_to_string(item.get("taskId").or_else(|| item.get("task_id"))),
        member_id: value_to_string(
            item.get("memberId")
                .or_else(|| item.get("member_id"))
                .or_else(|| item.get("id")),
        ),
        member_name: value_to_string(
            item.get("memberName").or_else(|| item.get("member_name")),
        ),
        confidence: value_to_i32(item.get("confidence").or_else(|| item.get("score")))
            .clamp(0, 100),
        reason: value_to_string(item.get("reason").or_else(|| item.get("explanation")))
            .unwrap_or_default(),
    }
}

/// Membership check: the advised member id must be one of the candidate
/// ids supplied for the call.
pub fn is_member_of(advice: &RawAdvice, candidate_ids: &HashSet<&str>) -> bool {
    advice
        .member_id
        .as_deref()
        .is_some_and(|id| candidate_ids.contains(id))
}

/// Advisor backed by an OpenAI-style chat-completions endpoint.
pub struct HttpAdvisor {
    client: reqwest::Client,
    config: AdvisorConfig,
}

impl HttpAdvisor {
    pub fn new(config: AdvisorConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    async fn complete(&self, system_msg: &str, user_msg: &str) -> Result<String, AdvisorError> {
        let api_key = self.config.api_key.as_deref().unwrap_or_default();

        let request_body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": system_msg },
                { "role": "user", "content": user_msg },
            ],
            "temperature": 0.0,
            "max_tokens": self.config.max_tokens,
        });

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AdvisorError::Timeout
                } else {
                    AdvisorError::Http(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(AdvisorError::Status(response.status().as_u16()));
        }

        let response_json: Value = response
            .json()
            .await
            .map_err(|e| AdvisorError::Http(e.to_string()))?;

        let content = response_json
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .ok_or(AdvisorError::Unparseable)?;

        Ok(content.to_string())
    }
}

const SYSTEM_MSG: &str = "You are an assistant that returns ONLY valid JSON. No additional explanation.";

fn batch_user_msg(tasks: &[TaskDescriptor], candidates: &[Candidate]) -> String {
    let payload = json!({
        "tasks": tasks.iter().map(|t| {
            json!({
                "taskId": t.task_id,
                "title": t.title,
                "web_desc": t.web_desc,
                "mobile_desc": t.mobile_desc,
                "design_desc": t.design_desc,
                "tags": t.tags,
                "priority": t.priority.as_str(),
                "deadline": t.deadline.map(|d| d.to_string()).unwrap_or_default(),
                "hours": t.hours,
                "required_developer_type": t.effective_developer_type().map(|d| d.as_str()),
                "required_skills": t.required_skills,
            })
        }).collect::<Vec<_>>(),
        "candidates": candidates.iter().map(CandidateSummary::from_candidate).collect::<Vec<_>>(),
    });

    format!(
        "You are given a list of tasks and a list of candidate members. \
         For each task you MUST select exactly one candidate `memberId` from the provided `candidates` array. \
         Do NOT invent ids or names; the `memberId` must be one of the ids present in the 'candidates' list. \
         Return a JSON array (one element per task) with shape:\n\
         {{ \"taskId\": <id>, \"memberId\": <candidate.id - from payload>, \"memberName\": <string>, \"confidence\": <0-100>, \"reason\": <short explanation> }}\n\n\
         Selection rules (apply in order):\n\
         1) Prefer candidates where `developer_type` matches task.required_developer_type.\n\
         2) Prefer candidates that match the most required skills (skill overlap).\n\
         3) Use years of experience as tie-breaker (higher is better).\n\
         4) If a candidate has zero skill overlap but matches developer_type and has >=5 years experience, you MAY still select them; state this in 'reason'.\n\n\
         Important constraints:\n\
         - memberId MUST be one of the candidate ids supplied for this request.\n\
         - Confidence is 0-100 and must reflect your relative certainty.\n\
         - Keep 'reason' short (one sentence).\n\n\
         Input payload:\n{}",
        payload
    )
}

fn single_user_msg(task: &TaskDescriptor, candidates: &[Candidate]) -> String {
    let payload = json!({
        "task": {
            "taskId": task.task_id,
            "title": task.title,
            "desc": task.web_desc,
            "required_developer_type": task.effective_developer_type().map(|d| d.as_str()),
            "required_skills": task.required_skills,
            "priority": task.priority.as_str(),
        },
        "candidates": candidates.iter().map(CandidateSummary::from_candidate).collect::<Vec<_>>(),
    });

    format!(
        "Given one task and a list of candidate members (with id, name, skills, experience, developer_type), \
         choose the most suitable member and return JSON: \
         {{\"memberId\": <id|null>, \"memberName\": <string|null>, \"confidence\": <0-100>, \"reason\": <short explanation> }}\n\n\
         Important: You MUST choose a memberId that exists in the provided 'candidates' list. \
         Do not invent IDs. If no clear match exists, choose the candidate with the highest experience. \
         If a candidate has no skill overlap but does match developer_type and has >=5 years experience, you MAY choose them; state this explicitly.\n\n\
         Input:\n{}",
        payload
    )
}

#[async_trait]
impl Advisor for HttpAdvisor {
    async fn advise_one(
        &self,
        task: &TaskDescriptor,
        candidates: &[Candidate],
    ) -> Result<Choice, AdvisorError> {
        let raw = self
            .complete(SYSTEM_MSG, &single_user_msg(task, candidates))
            .await?;
        debug!(task_id = %task.task_id, "advisor single-task response received");

        let parsed = extract_json(&raw).ok_or(AdvisorError::Unparseable)?;

        // Accept a bare object or a one-element array.
        let obj = match parsed {
            Value::Array(items) => items.into_iter().next().ok_or(AdvisorError::Unparseable)?,
            obj @ Value::Object(_) => obj,
            _ => return Err(AdvisorError::Unparseable),
        };
        let advice = parse_advice_item(&obj);

        let candidate_ids: HashSet<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
        if !is_member_of(&advice, &candidate_ids) {
            return Err(AdvisorError::InvalidSelection(format!(
                "memberId {:?} is not in the candidate set",
                advice.member_id
            )));
        }

        let member_name = advice.member_name.or_else(|| {
            candidates
                .iter()
                .find(|c| Some(c.id.as_str()) == advice.member_id.as_deref())
                .map(|c| c.name.clone())
        });

        Ok(Choice {
            member_id: advice.member_id,
            member_name,
            confidence: advice.confidence,
            reason: advice.reason,
        })
    }

    async fn advise_batch(
        &self,
        tasks: &[TaskDescriptor],
        candidates: &[Candidate],
    ) -> Result<Vec<RawAdvice>, AdvisorError> {
        if tasks.len() > MAX_ADVISOR_BATCH {
            return Err(AdvisorError::BatchTooLarge(tasks.len()));
        }

        let raw = self
            .complete(SYSTEM_MSG, &batch_user_msg(tasks, candidates))
            .await?;

        let parsed = extract_json(&raw).ok_or(AdvisorError::Unparseable)?;
        let items = match parsed {
            Value::Array(items) => items,
            obj @ Value::Object(_) => vec![obj],
            _ => return Err(AdvisorError::Unparseable),
        };

        let advice: Vec<RawAdvice> = items
            .iter()
            .filter(|item| item.is_object())
            .map(parse_advice_item)
            .collect();

        if advice.is_empty() {
            warn!("advisor batch response contained no usable items");
            return Err(AdvisorError::Unparseable);
        }

        Ok(advice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_parses_clean_payloads() {
        let value = extract_json(r#"{"memberId": "a", "confidence": 90}"#).unwrap();
        assert_eq!(value["memberId"], "a");

        let value = extract_json(r#"[{"taskId": 1}]"#).unwrap();
        assert!(value.is_array());
    }

    #[test]
    fn extract_json_recovers_embedded_payloads() {
        let text = "Sure! Here is the result:\n```json\n[{\"taskId\": \"t1\", \"memberId\": 7}]\n```\nDone.";
        let value = extract_json(text).unwrap();
        assert_eq!(value[0]["memberId"], 7);
    }

    #[test]
    fn extract_json_rejects_garbage() {
        assert!(extract_json("").is_none());
        assert!(extract_json("no json here at all").is_none());
    }

    #[test]
    fn advice_items_coerce_numeric_ids_and_snake_case_keys() {
        let item = serde_json::json!({
            "task_id": 12,
            "member_id": 34,
            "member_name": "Ada",
            "score": "88",
            "explanation": "best overlap"
        });
        let advice = parse_advice_item(&item);
        assert_eq!(advice.task_id.as_deref(), Some("12"));
        assert_eq!(advice.member_id.as_deref(), Some("34"));
        assert_eq!(advice.confidence, 88);
        assert_eq!(advice.reason, "best overlap");
    }

    #[test]
    fn confidence_is_clamped() {
        let item = serde_json::json!({ "memberId": "a", "confidence": 250 });
        assert_eq!(parse_advice_item(&item).confidence, 100);
    }

    #[test]
    fn membership_check_requires_supplied_id() {
        let ids: HashSet<&str> = ["a", "b"].into_iter().collect();
        let mut advice = parse_advice_item(&serde_json::json!({ "memberId": "a" }));
        assert!(is_member_of(&advice, &ids));

        advice.member_id = Some("ghost".to_string());
        assert!(!is_member_of(&advice, &ids));

        advice.member_id = None;
        assert!(!is_member_of(&advice, &ids));
    }
}
