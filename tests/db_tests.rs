//! Integration tests for the store layer.
//!
//! These verify the task, directory, and notification operations using an
//! in-memory SQLite database.

use chrono::NaiveDate;
use serde_json::json;
use task_assign_engine::db::tasks::AssignmentWrite;
use task_assign_engine::db::Database;
use task_assign_engine::types::{DeveloperType, Priority, TaskInput};

/// Helper to create a fresh in-memory database for testing.
fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

mod task_tests {
    use super::*;

    #[test]
    fn create_and_read_round_trips_all_fields() {
        let db = setup_db();

        let task = db
            .create_task(TaskInput {
                title: "Ship the thing".to_string(),
                web_desc: "web part".to_string(),
                mobile_desc: "mobile part".to_string(),
                design_desc: "design part".to_string(),
                priority: Some(Priority::High),
                deadline: Some(NaiveDate::from_ymd_opt(2026, 9, 1).unwrap()),
                hours: 12,
                tags: vec!["frontend".to_string()],
                required_skills: vec![" React ".to_string(), "API".to_string()],
                required_developer_type: Some(DeveloperType::Web),
                created_by: Some("creator".to_string()),
                ..Default::default()
            })
            .expect("Failed to create task");

        let read = db.get_task(&task.id).unwrap().unwrap();
        assert_eq!(read.title, "Ship the thing");
        assert_eq!(read.priority, Priority::High);
        assert_eq!(read.deadline, Some(NaiveDate::from_ymd_opt(2026, 9, 1).unwrap()));
        assert_eq!(read.hours, 12);
        // Required skills are normalized on the way in.
        assert_eq!(read.required_skills, vec!["react", "api"]);
        assert_eq!(read.required_developer_type, Some(DeveloperType::Web));
        assert!(!read.ai_suggested);
        assert!(!read.assignment_locked);
        assert!(read.assignee.is_none());
    }

    #[test]
    fn empty_title_is_rejected() {
        let db = setup_db();
        let result = db.create_task(TaskInput {
            title: "   ".to_string(),
            ..Default::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn get_task_returns_none_for_unknown_id() {
        let db = setup_db();
        assert!(db.get_task("missing").unwrap().is_none());
    }

    #[test]
    fn assignment_fields_round_trip_exactly() {
        let db = setup_db();
        let task = db
            .create_task(TaskInput {
                title: "t".to_string(),
                ..Default::default()
            })
            .unwrap();

        let meta = json!({
            "chosen": {"memberId": "m-1", "confidence": 83},
            "diagnostics": ["step one", "step two"],
        });
        let write = AssignmentWrite {
            assignee: Some("id-1".to_string()),
            assigned_by: Some("creator".to_string()),
            assigned_at: Some(1_700_000_000_000),
            ai_suggested: true,
            ai_confidence: Some(83),
            ai_reason: "best overlap".to_string(),
            ai_meta: meta.clone(),
            assignment_locked: true,
        };
        db.update_assignment_fields(&task.id, &write).unwrap();

        let read = db.get_task(&task.id).unwrap().unwrap();
        assert_eq!(read.assignee.as_deref(), Some("id-1"));
        assert_eq!(read.assigned_at, Some(1_700_000_000_000));
        assert!(read.ai_suggested);
        assert_eq!(read.ai_confidence, Some(83));
        assert_eq!(read.ai_reason, "best overlap");
        assert_eq!(read.ai_meta, meta);
        assert!(read.assignment_locked);
    }

    #[test]
    fn updating_a_missing_task_fails() {
        let db = setup_db();
        let write = AssignmentWrite {
            assignee: None,
            assigned_by: None,
            assigned_at: None,
            ai_suggested: false,
            ai_confidence: None,
            ai_reason: String::new(),
            ai_meta: json!({}),
            assignment_locked: false,
        };
        assert!(db.update_assignment_fields("missing", &write).is_err());
    }

    #[test]
    fn save_task_persists_mutations() {
        let db = setup_db();
        let mut task = db
            .create_task(TaskInput {
                title: "t".to_string(),
                ..Default::default()
            })
            .unwrap();

        task.ai_suggested = true;
        task.ai_confidence = Some(41);
        task.assignee = Some("id-9".to_string());
        db.save_task(&task).unwrap();

        let read = db.get_task(&task.id).unwrap().unwrap();
        assert!(read.ai_suggested);
        assert_eq!(read.ai_confidence, Some(41));
        assert_eq!(read.assignee.as_deref(), Some("id-9"));
        assert!(read.updated_at >= task.updated_at);
    }

    #[test]
    fn count_assigned_tracks_assignees() {
        let db = setup_db();
        for i in 0..3 {
            let task = db
                .create_task(TaskInput {
                    title: format!("t{}", i),
                    ..Default::default()
                })
                .unwrap();
            let write = AssignmentWrite {
                assignee: Some("id-busy".to_string()),
                assigned_by: None,
                assigned_at: None,
                ai_suggested: false,
                ai_confidence: None,
                ai_reason: String::new(),
                ai_meta: json!({}),
                assignment_locked: false,
            };
            db.update_assignment_fields(&task.id, &write).unwrap();
        }

        assert_eq!(db.count_assigned_to("id-busy").unwrap(), 3);
        assert_eq!(db.count_assigned_to("id-idle").unwrap(), 0);
    }

    #[test]
    fn visible_tasks_include_suggestion_references() {
        let db = setup_db();
        db.create_identity(Some("id-1".to_string()), "Ada", None, "", 5.0, None, false)
            .unwrap();
        db.create_member(Some("m-1".to_string()), Some("id-1"), "dev", "", 5.0, None)
            .unwrap();

        // Created by the identity.
        db.create_task(TaskInput {
            title: "created".to_string(),
            created_by: Some("id-1".to_string()),
            ..Default::default()
        })
        .unwrap();

        // Assigned to the identity.
        let assigned = db
            .create_task(TaskInput {
                title: "assigned".to_string(),
                ..Default::default()
            })
            .unwrap();
        db.update_assignment_fields(
            &assigned.id,
            &AssignmentWrite {
                assignee: Some("id-1".to_string()),
                assigned_by: None,
                assigned_at: None,
                ai_suggested: false,
                ai_confidence: None,
                ai_reason: String::new(),
                ai_meta: json!({}),
                assignment_locked: false,
            },
        )
        .unwrap();

        // Suggested-but-unresolved, referencing the member record in ai_meta.
        let suggested = db
            .create_task(TaskInput {
                title: "suggested".to_string(),
                ..Default::default()
            })
            .unwrap();
        db.update_assignment_fields(
            &suggested.id,
            &AssignmentWrite {
                assignee: None,
                assigned_by: None,
                assigned_at: None,
                ai_suggested: true,
                ai_confidence: Some(50),
                ai_reason: "r".to_string(),
                ai_meta: json!({"chosen": {"memberId": "m-1"}, "diagnostics": []}),
                assignment_locked: false,
            },
        )
        .unwrap();

        // Unrelated task.
        db.create_task(TaskInput {
            title: "unrelated".to_string(),
            ..Default::default()
        })
        .unwrap();

        let visible = db.list_tasks_for_identity("id-1").unwrap();
        let mut titles: Vec<&str> = visible.iter().map(|t| t.title.as_str()).collect();
        titles.sort();
        assert_eq!(titles, vec!["assigned", "created", "suggested"]);
    }

    #[test]
    fn created_count_is_per_identity() {
        let db = setup_db();
        db.create_task(TaskInput {
            title: "a".to_string(),
            created_by: Some("id-1".to_string()),
            ..Default::default()
        })
        .unwrap();
        db.create_task(TaskInput {
            title: "b".to_string(),
            created_by: Some("id-1".to_string()),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(db.count_tasks_created_by("id-1").unwrap(), 2);
        assert_eq!(db.count_tasks_created_by("id-2").unwrap(), 0);
    }
}

mod directory_tests {
    use super::*;

    #[test]
    fn identity_lookup_by_name_is_case_insensitive() {
        let db = setup_db();
        db.create_identity(
            Some("id-1".to_string()),
            "Grace Hopper",
            Some("grace@example.com"),
            "",
            10.0,
            None,
            false,
        )
        .unwrap();

        assert!(db.find_identity_exact("grace hopper").unwrap().is_some());
        assert!(db.find_identity_exact("GRACE@EXAMPLE.COM").unwrap().is_some());
        assert!(db.find_identity_exact("grace").unwrap().is_none());
    }

    #[test]
    fn identity_fragment_search_matches_name_and_email() {
        let db = setup_db();
        db.create_identity(
            Some("id-1".to_string()),
            "Grace Hopper",
            Some("grace@example.com"),
            "",
            10.0,
            None,
            false,
        )
        .unwrap();

        assert!(db.find_identity_containing("hopper").unwrap().is_some());
        assert!(db.find_identity_containing("example.com").unwrap().is_some());
        assert!(db.find_identity_containing("turing").unwrap().is_none());
    }

    #[test]
    fn active_listings_are_ordered_by_experience() {
        let db = setup_db();
        db.create_identity(Some("id-a".to_string()), "A", None, "", 2.0, None, false)
            .unwrap();
        db.create_identity(Some("id-b".to_string()), "B", None, "", 9.0, None, false)
            .unwrap();
        db.create_identity(Some("id-c".to_string()), "C", None, "", 5.0, None, false)
            .unwrap();

        let identities = db.list_active_identities(2).unwrap();
        let ids: Vec<&str> = identities.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["id-b", "id-c"]);
    }

    #[test]
    fn member_for_identity_finds_the_backing_record() {
        let db = setup_db();
        db.create_identity(Some("id-1".to_string()), "Ada", None, "", 5.0, None, false)
            .unwrap();
        db.create_member(Some("m-1".to_string()), Some("id-1"), "dev", "", 5.0, None)
            .unwrap();

        let member = db.member_for_identity("id-1").unwrap().unwrap();
        assert_eq!(member.id, "m-1");
        assert!(db.member_for_identity("id-2").unwrap().is_none());
    }
}

mod notification_tests {
    use super::*;

    #[test]
    fn notifications_round_trip_newest_first() {
        let db = setup_db();
        db.create_notification("id-1", "first", Some("t-1")).unwrap();
        db.create_notification("id-1", "second", None).unwrap();
        db.create_notification("id-2", "other", None).unwrap();

        let list = db.list_notifications_for("id-1").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].verb, "second");
        assert_eq!(list[1].task_id.as_deref(), Some("t-1"));
    }
}

mod storage_tests {
    use super::*;

    #[test]
    fn on_disk_database_opens_and_migrates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.db");

        let db = Database::open(&path).expect("Failed to open on-disk database");
        db.create_task(TaskInput {
            title: "persisted".to_string(),
            ..Default::default()
        })
        .unwrap();

        // Reopening runs migrations idempotently and sees the data.
        drop(db);
        let db = Database::open(&path).unwrap();
        assert_eq!(db.count_tasks_created_by("nobody").unwrap(), 0);
    }
}
