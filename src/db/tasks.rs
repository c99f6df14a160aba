//! Task store: CRUD and assignment-field writes.

use super::{now_ms, Database};
use crate::types::{DeveloperType, Priority, Task, TaskInput};
use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use rusqlite::{params, Row};
use serde_json::Value;
use uuid::Uuid;

/// Bound on the ai_meta scan when collecting suggestion-referenced tasks.
const SUGGESTED_SCAN_LIMIT: i64 = 1000;

/// Final state of a task's assignment columns, written as one unit.
#[derive(Debug, Clone)]
pub struct AssignmentWrite {
    pub assignee: Option<String>,
    pub assigned_by: Option<String>,
    pub assigned_at: Option<i64>,
    pub ai_suggested: bool,
    pub ai_confidence: Option<i32>,
    pub ai_reason: String,
    pub ai_meta: Value,
    pub assignment_locked: bool,
}

pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let priority: String = row.get("priority")?;
    let deadline: Option<String> = row.get("deadline")?;
    let tags_json: String = row.get("tags")?;
    let required_skills_json: String = row.get("required_skills")?;
    let required_developer_type: Option<String> = row.get("required_developer_type")?;
    let ai_meta_json: String = row.get("ai_meta")?;

    Ok(Task {
        id: row.get("id")?,
        title: row.get("title")?,
        web_desc: row.get("web_desc")?,
        mobile_desc: row.get("mobile_desc")?,
        design_desc: row.get("design_desc")?,
        priority: Priority::parse(&priority),
        deadline: deadline
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
        hours: row.get::<_, i64>("hours")? as u32,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        required_skills: serde_json::from_str(&required_skills_json).unwrap_or_default(),
        required_developer_type: required_developer_type
            .as_deref()
            .and_then(DeveloperType::parse),
        created_by: row.get("created_by")?,
        assignee: row.get("assignee")?,
        assigned_by: row.get("assigned_by")?,
        assigned_at: row.get("assigned_at")?,
        ai_suggested: row.get::<_, i64>("ai_suggested")? != 0,
        ai_confidence: row.get("ai_confidence")?,
        ai_reason: row.get("ai_reason")?,
        ai_meta: serde_json::from_str(&ai_meta_json).unwrap_or(Value::Null),
        assignment_locked: row.get::<_, i64>("assignment_locked")? != 0,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Pull the member reference out of a suggestion blob, tolerating both
/// camelCase and snake_case keys and numeric ids.
fn suggested_member_id(meta: &Value) -> Option<String> {
    let chosen = meta.get("chosen")?;
    let mid = chosen
        .get("memberId")
        .or_else(|| chosen.get("member_id"))?;
    match mid {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl Database {
    /// Create a new task. Required skills are normalized to lowercase
    /// tokens on the way in.
    pub fn create_task(&self, input: TaskInput) -> Result<Task> {
        if input.title.trim().is_empty() {
            return Err(anyhow!("Task title cannot be empty"));
        }
        let task_id = input.id.unwrap_or_else(|| Uuid::now_v7().to_string());
        let now = now_ms();

        let required_skills: Vec<String> = input
            .required_skills
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        let task = Task {
            id: task_id,
            title: input.title,
            web_desc: input.web_desc,
            mobile_desc: input.mobile_desc,
            design_desc: input.design_desc,
            priority: input.priority.unwrap_or_default(),
            deadline: input.deadline,
            hours: input.hours,
            tags: input.tags,
            required_skills,
            required_developer_type: input.required_developer_type,
            created_by: input.created_by,
            assignee: None,
            assigned_by: None,
            assigned_at: None,
            ai_suggested: false,
            ai_confidence: None,
            ai_reason: String::new(),
            ai_meta: Value::Object(Default::default()),
            assignment_locked: false,
            created_at: now,
            updated_at: now,
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks (id, title, web_desc, mobile_desc, design_desc, priority,
                                    deadline, hours, tags, required_skills, required_developer_type,
                                    created_by, ai_reason, ai_meta, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, '', '{}', ?13, ?14)",
                params![
                    &task.id,
                    &task.title,
                    &task.web_desc,
                    &task.mobile_desc,
                    &task.design_desc,
                    task.priority.as_str(),
                    task.deadline.map(|d| d.to_string()),
                    task.hours as i64,
                    serde_json::to_string(&task.tags)?,
                    serde_json::to_string(&task.required_skills)?,
                    task.required_developer_type.map(|d| d.as_str()),
                    &task.created_by,
                    task.created_at,
                    task.updated_at,
                ],
            )?;
            Ok(())
        })?;

        Ok(task)
    }

    /// Get a task by id.
    pub fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM tasks WHERE id = ?1")?;
            match stmt.query_row(params![task_id], parse_task_row) {
                Ok(task) => Ok(Some(task)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Persist a full task row (the normal save path).
    pub fn save_task(&self, task: &Task) -> Result<()> {
        let now = now_ms();
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE tasks SET
                    title = ?2, web_desc = ?3, mobile_desc = ?4, design_desc = ?5,
                    priority = ?6, deadline = ?7, hours = ?8, tags = ?9,
                    required_skills = ?10, required_developer_type = ?11,
                    created_by = ?12, assignee = ?13, assigned_by = ?14,
                    assigned_at = ?15, ai_suggested = ?16, ai_confidence = ?17,
                    ai_reason = ?18, ai_meta = ?19, assignment_locked = ?20,
                    updated_at = ?21
                 WHERE id = ?1",
                params![
                    &task.id,
                    &task.title,
                    &task.web_desc,
                    &task.mobile_desc,
                    &task.design_desc,
                    task.priority.as_str(),
                    task.deadline.map(|d| d.to_string()),
                    task.hours as i64,
                    serde_json::to_string(&task.tags)?,
                    serde_json::to_string(&task.required_skills)?,
                    task.required_developer_type.map(|d| d.as_str()),
                    &task.created_by,
                    &task.assignee,
                    &task.assigned_by,
                    task.assigned_at,
                    task.ai_suggested as i64,
                    task.ai_confidence,
                    &task.ai_reason,
                    serde_json::to_string(&task.ai_meta)?,
                    task.assignment_locked as i64,
                    now,
                ],
            )?;
            if updated == 0 {
                return Err(anyhow!("Task {} not found", task.id));
            }
            Ok(())
        })
    }

    /// Direct field-level write of the assignment columns only. Retry path
    /// for when the full save fails; also the manual-assign write.
    pub fn update_assignment_fields(&self, task_id: &str, write: &AssignmentWrite) -> Result<()> {
        let now = now_ms();
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE tasks SET
                    assignee = ?2, assigned_by = ?3, assigned_at = ?4,
                    ai_suggested = ?5, ai_confidence = ?6, ai_reason = ?7,
                    ai_meta = ?8, assignment_locked = ?9, updated_at = ?10
                 WHERE id = ?1",
                params![
                    task_id,
                    &write.assignee,
                    &write.assigned_by,
                    write.assigned_at,
                    write.ai_suggested as i64,
                    write.ai_confidence,
                    &write.ai_reason,
                    serde_json::to_string(&write.ai_meta)?,
                    write.assignment_locked as i64,
                    now,
                ],
            )?;
            if updated == 0 {
                return Err(anyhow!("Task {} not found", task_id));
            }
            Ok(())
        })
    }

    /// Count tasks currently assigned to an identity.
    pub fn count_assigned_to(&self, identity_id: &str) -> Result<i64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM tasks WHERE assignee = ?1",
                params![identity_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    /// Count tasks created by an identity.
    pub fn count_tasks_created_by(&self, identity_id: &str) -> Result<i64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM tasks WHERE created_by = ?1",
                params![identity_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    /// Tasks visible to an identity: created by it, assigned to it, or
    /// AI-suggested with a suggestion blob referencing its member record.
    pub fn list_tasks_for_identity(&self, identity_id: &str) -> Result<Vec<Task>> {
        let member = self.member_for_identity(identity_id)?;

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM tasks WHERE created_by = ?1 OR assignee = ?1
                 ORDER BY created_at DESC",
            )?;
            let mut tasks: Vec<Task> = stmt
                .query_map(params![identity_id], parse_task_row)?
                .filter_map(|r| r.ok())
                .collect();

            // Suggested-but-unresolved tasks reference a member id inside
            // ai_meta rather than the identity itself.
            if let Some(member) = &member {
                let mut stmt = conn.prepare(
                    "SELECT * FROM tasks WHERE ai_suggested = 1
                     AND (created_by IS NULL OR created_by != ?1)
                     AND (assignee IS NULL OR assignee != ?1)
                     ORDER BY created_at DESC LIMIT ?2",
                )?;
                let suggested: Vec<Task> = stmt
                    .query_map(params![identity_id, SUGGESTED_SCAN_LIMIT], parse_task_row)?
                    .filter_map(|r| r.ok())
                    .collect();

                for task in suggested {
                    if suggested_member_id(&task.ai_meta).as_deref() == Some(member.id.as_str()) {
                        tasks.push(task);
                    }
                }
            }

            Ok(tasks)
        })
    }
}
