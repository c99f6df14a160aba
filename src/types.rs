//! Core types for the assignment engine.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    /// Parse a priority string. Returns Medium for unrecognized values.
    pub fn parse(s: &str) -> Priority {
        match s.to_lowercase().as_str() {
            "high" => Priority::High,
            "low" => Priority::Low,
            _ => Priority::Medium,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

/// Coarse skill-domain tag used as a hard-ish matching signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeveloperType {
    Web,
    Mobile,
    Uiux,
    Other,
}

impl DeveloperType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeveloperType::Web => "web",
            DeveloperType::Mobile => "mobile",
            DeveloperType::Uiux => "uiux",
            DeveloperType::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<DeveloperType> {
        match s.trim().to_lowercase().as_str() {
            "web" => Some(DeveloperType::Web),
            "mobile" => Some(DeveloperType::Mobile),
            "uiux" | "ui/ux" | "design" => Some(DeveloperType::Uiux),
            "other" => Some(DeveloperType::Other),
            _ => None,
        }
    }
}

/// A unit of work, as stored in the task store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub web_desc: String,
    pub mobile_desc: String,
    pub design_desc: String,
    pub priority: Priority,
    pub deadline: Option<NaiveDate>,
    pub hours: u32,
    pub tags: Vec<String>,
    pub required_skills: Vec<String>,
    pub required_developer_type: Option<DeveloperType>,
    pub created_by: Option<String>,

    // Assignment & AI metadata. Only auto_assign and assign write these.
    pub assignee: Option<String>,
    pub assigned_by: Option<String>,
    pub assigned_at: Option<i64>,
    pub ai_suggested: bool,
    /// 0..=100 when set.
    pub ai_confidence: Option<i32>,
    pub ai_reason: String,
    /// Opaque diagnostic blob: `{chosen, diagnostics}`.
    pub ai_meta: serde_json::Value,
    pub assignment_locked: bool,

    pub created_at: i64,
    pub updated_at: i64,
}

/// Input for creating a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskInput {
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub web_desc: String,
    #[serde(default)]
    pub mobile_desc: String,
    #[serde(default)]
    pub design_desc: String,
    pub priority: Option<Priority>,
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub hours: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub required_skills: Vec<String>,
    pub required_developer_type: Option<DeveloperType>,
    pub created_by: Option<String>,
}

/// The matching-relevant view of a task, used by the batch path and as the
/// advisor payload. Carries no internal-only fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDescriptor {
    #[serde(rename = "taskId")]
    pub task_id: String,
    pub title: String,
    #[serde(default)]
    pub web_desc: String,
    #[serde(default)]
    pub mobile_desc: String,
    #[serde(default)]
    pub design_desc: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub priority: Priority,
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub hours: u32,
    pub required_developer_type: Option<DeveloperType>,
    #[serde(default)]
    pub required_skills: Vec<String>,
}

impl TaskDescriptor {
    pub fn from_task(task: &Task) -> Self {
        Self {
            task_id: task.id.clone(),
            title: task.title.clone(),
            web_desc: task.web_desc.clone(),
            mobile_desc: task.mobile_desc.clone(),
            design_desc: task.design_desc.clone(),
            tags: task.tags.clone(),
            priority: task.priority,
            deadline: task.deadline,
            hours: task.hours,
            required_developer_type: task.required_developer_type,
            required_skills: task.required_skills.clone(),
        }
    }

    /// The effective developer-type requirement: the explicit field when
    /// present, otherwise inferred from tags and populated descriptors.
    pub fn effective_developer_type(&self) -> Option<DeveloperType> {
        if self.required_developer_type.is_some() {
            return self.required_developer_type;
        }
        infer_developer_type(&self.tags, &self.web_desc, &self.mobile_desc, &self.design_desc)
    }
}

/// Infer a developer-type requirement from tags and delivery surfaces.
pub fn infer_developer_type(
    tags: &[String],
    web_desc: &str,
    mobile_desc: &str,
    design_desc: &str,
) -> Option<DeveloperType> {
    for tag in tags {
        let t = tag.to_lowercase();
        if t.contains("mobile") {
            return Some(DeveloperType::Mobile);
        }
        if t.contains("ui") || t.contains("ux") {
            return Some(DeveloperType::Uiux);
        }
        if t.contains("web") || t.contains("backend") || t.contains("frontend") {
            return Some(DeveloperType::Web);
        }
    }
    // A single populated delivery surface implies the requirement.
    match (
        !web_desc.trim().is_empty(),
        !mobile_desc.trim().is_empty(),
        !design_desc.trim().is_empty(),
    ) {
        (true, false, false) => Some(DeveloperType::Web),
        (false, true, false) => Some(DeveloperType::Mobile),
        (false, false, true) => Some(DeveloperType::Uiux),
        _ => None,
    }
}

/// A normalized, matching-ready view of a person. Populated exclusively by
/// the candidate pool loader; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    /// Underlying identity id when this record is a proxy over the
    /// identity store.
    pub identity_id: Option<String>,
    pub name: String,
    pub email: Option<String>,
    /// Lowercase skill tokens.
    pub skills: Vec<String>,
    pub experience: f64,
    pub developer_type: Option<DeveloperType>,
    /// Tasks currently assigned to the resolved identity, computed at load
    /// time.
    pub current_load: i32,
}

/// A canonical identity record from the directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    /// Raw comma-separated skill list as entered in the directory.
    pub skills: String,
    pub experience: f64,
    pub developer_type: Option<DeveloperType>,
    pub is_active: bool,
    pub is_staff: bool,
    pub created_at: i64,
}

/// A secondary member record referencing an identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub identity_id: Option<String>,
    pub role: String,
    pub skills: String,
    pub experience: f64,
    pub developer_type: Option<DeveloperType>,
    pub is_active: bool,
    pub created_at: i64,
}

/// The caller of a manual assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub is_staff: bool,
}

/// A selection made for one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    #[serde(rename = "memberId")]
    pub member_id: Option<String>,
    #[serde(rename = "memberName")]
    pub member_name: Option<String>,
    pub confidence: i32,
    pub reason: String,
}

impl Choice {
    /// The no-op choice returned when there is nothing to choose from.
    pub fn none(reason: impl Into<String>) -> Self {
        Self {
            member_id: None,
            member_name: None,
            confidence: 0,
            reason: reason.into(),
        }
    }
}

/// One element of a batch auto-assign response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchChoice {
    #[serde(rename = "taskId")]
    pub task_id: String,
    #[serde(rename = "memberId")]
    pub member_id: Option<String>,
    #[serde(rename = "memberName")]
    pub member_name: Option<String>,
    pub confidence: i32,
    pub reason: String,
}

/// Split a comma-separated skill string into normalized lowercase tokens.
pub fn split_skills(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_parse_is_lenient() {
        assert_eq!(Priority::parse("High"), Priority::High);
        assert_eq!(Priority::parse("LOW"), Priority::Low);
        assert_eq!(Priority::parse("whatever"), Priority::Medium);
    }

    #[test]
    fn split_skills_normalizes_tokens() {
        assert_eq!(
            split_skills(" React, API ,,rust "),
            vec!["react", "api", "rust"]
        );
        assert!(split_skills("").is_empty());
    }

    #[test]
    fn developer_type_inferred_from_tags() {
        let tags = vec!["mobile-app".to_string()];
        assert_eq!(
            infer_developer_type(&tags, "", "", ""),
            Some(DeveloperType::Mobile)
        );

        let tags = vec!["ux-polish".to_string()];
        assert_eq!(
            infer_developer_type(&tags, "", "", ""),
            Some(DeveloperType::Uiux)
        );
    }

    #[test]
    fn developer_type_inferred_from_single_surface() {
        assert_eq!(
            infer_developer_type(&[], "build the dashboard", "", ""),
            Some(DeveloperType::Web)
        );
        assert_eq!(infer_developer_type(&[], "web", "mobile", ""), None);
    }
}
