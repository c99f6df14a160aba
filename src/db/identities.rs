//! Directory access: identity and member records.

use super::{now_ms, Database};
use crate::types::{DeveloperType, Identity, Member};
use anyhow::{anyhow, Result};
use rusqlite::{params, Row};
use uuid::Uuid;

fn parse_identity_row(row: &Row) -> rusqlite::Result<Identity> {
    let developer_type: Option<String> = row.get("developer_type")?;
    Ok(Identity {
        id: row.get("id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        skills: row.get("skills")?,
        experience: row.get("experience")?,
        developer_type: developer_type.as_deref().and_then(DeveloperType::parse),
        is_active: row.get::<_, i64>("is_active")? != 0,
        is_staff: row.get::<_, i64>("is_staff")? != 0,
        created_at: row.get("created_at")?,
    })
}

fn parse_member_row(row: &Row) -> rusqlite::Result<Member> {
    let developer_type: Option<String> = row.get("developer_type")?;
    Ok(Member {
        id: row.get("id")?,
        identity_id: row.get("identity_id")?,
        role: row.get("role")?,
        skills: row.get("skills")?,
        experience: row.get("experience")?,
        developer_type: developer_type.as_deref().and_then(DeveloperType::parse),
        is_active: row.get::<_, i64>("is_active")? != 0,
        created_at: row.get("created_at")?,
    })
}

impl Database {
    /// Create an identity record.
    #[allow(clippy::too_many_arguments)]
    pub fn create_identity(
        &self,
        id: Option<String>,
        name: &str,
        email: Option<&str>,
        skills: &str,
        experience: f64,
        developer_type: Option<DeveloperType>,
        is_staff: bool,
    ) -> Result<Identity> {
        if name.trim().is_empty() {
            return Err(anyhow!("Identity name cannot be empty"));
        }
        let id = id.unwrap_or_else(|| Uuid::now_v7().to_string());
        let now = now_ms();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO identities (id, name, email, skills, experience, developer_type, is_active, is_staff, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?8)",
                params![
                    &id,
                    name,
                    email,
                    skills,
                    experience,
                    developer_type.map(|d| d.as_str()),
                    is_staff as i64,
                    now
                ],
            )?;

            Ok(Identity {
                id: id.clone(),
                name: name.to_string(),
                email: email.map(String::from),
                skills: skills.to_string(),
                experience,
                developer_type,
                is_active: true,
                is_staff,
                created_at: now,
            })
        })
    }

    /// Get an identity by id.
    pub fn get_identity(&self, identity_id: &str) -> Result<Option<Identity>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM identities WHERE id = ?1")?;
            match stmt.query_row(params![identity_id], parse_identity_row) {
                Ok(identity) => Ok(Some(identity)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Exact case-insensitive match on identity name or email.
    pub fn find_identity_exact(&self, needle: &str) -> Result<Option<Identity>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM identities
                 WHERE name = ?1 COLLATE NOCASE OR email = ?1 COLLATE NOCASE
                 ORDER BY id LIMIT 1",
            )?;
            match stmt.query_row(params![needle.trim()], parse_identity_row) {
                Ok(identity) => Ok(Some(identity)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// First identity whose name or email contains the fragment
    /// (case-insensitive).
    pub fn find_identity_containing(&self, fragment: &str) -> Result<Option<Identity>> {
        let pattern = format!("%{}%", fragment.to_lowercase());
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM identities
                 WHERE LOWER(name) LIKE ?1 OR LOWER(COALESCE(email, '')) LIKE ?1
                 ORDER BY id LIMIT 1",
            )?;
            match stmt.query_row(params![pattern], parse_identity_row) {
                Ok(identity) => Ok(Some(identity)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// List active identities, most experienced first.
    pub fn list_active_identities(&self, limit: usize) -> Result<Vec<Identity>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM identities WHERE is_active = 1
                 ORDER BY experience DESC, id ASC LIMIT ?1",
            )?;
            let identities = stmt
                .query_map(params![limit as i64], parse_identity_row)?
                .filter_map(|r| r.ok())
                .collect();
            Ok(identities)
        })
    }

    /// Create a member record.
    pub fn create_member(
        &self,
        id: Option<String>,
        identity_id: Option<&str>,
        role: &str,
        skills: &str,
        experience: f64,
        developer_type: Option<DeveloperType>,
    ) -> Result<Member> {
        let id = id.unwrap_or_else(|| Uuid::now_v7().to_string());
        let now = now_ms();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO members (id, identity_id, role, skills, experience, developer_type, is_active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)",
                params![
                    &id,
                    identity_id,
                    role,
                    skills,
                    experience,
                    developer_type.map(|d| d.as_str()),
                    now
                ],
            )?;

            Ok(Member {
                id: id.clone(),
                identity_id: identity_id.map(String::from),
                role: role.to_string(),
                skills: skills.to_string(),
                experience,
                developer_type,
                is_active: true,
                created_at: now,
            })
        })
    }

    /// Get a member by id.
    pub fn get_member(&self, member_id: &str) -> Result<Option<Member>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM members WHERE id = ?1")?;
            match stmt.query_row(params![member_id], parse_member_row) {
                Ok(member) => Ok(Some(member)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// List active members, most experienced first.
    pub fn list_active_members(&self, limit: usize) -> Result<Vec<Member>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM members WHERE is_active = 1
                 ORDER BY experience DESC, id ASC LIMIT ?1",
            )?;
            let members = stmt
                .query_map(params![limit as i64], parse_member_row)?
                .filter_map(|r| r.ok())
                .collect();
            Ok(members)
        })
    }

    /// Find the member record backing an identity, if any.
    pub fn member_for_identity(&self, identity_id: &str) -> Result<Option<Member>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM members WHERE identity_id = ?1 ORDER BY created_at LIMIT 1",
            )?;
            match stmt.query_row(params![identity_id], parse_member_row) {
                Ok(member) => Ok(Some(member)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }
}
