//! Integration tests for goal bucketing and dashboard aggregation, pinned to
//! a fixed clock so window boundaries are deterministic.

use chrono::{TimeZone, Utc};
use taskboard::auth::AuthUser;
use taskboard::db::users::new_user;
use taskboard::db::Database;
use taskboard::service::lifecycle::CreateTaskInput;
use taskboard::service::{GoalAggregator, TaskLifecycle};
use uuid::Uuid;

fn setup() -> (Database, TaskLifecycle, GoalAggregator) {
    let db = Database::open_in_memory().expect("Failed to create in-memory database");
    let lifecycle = TaskLifecycle::new(db.clone());
    let goals = GoalAggregator::new(db.clone());
    (db, lifecycle, goals)
}

fn seed_user(db: &Database, name: &str, is_admin: bool) -> String {
    let id = Uuid::new_v4().to_string();
    db.insert_user(&new_user(
        &id,
        name,
        &format!("{}@example.com", name),
        is_admin,
    ))
    .expect("Failed to insert user");
    id
}

fn caller(user_id: &str, is_admin: bool) -> AuthUser {
    AuthUser {
        user_id: user_id.to_string(),
        email: None,
        is_admin,
    }
}

/// Epoch milliseconds for a UTC calendar date at midnight.
fn date_ms(year: i32, month: u32, day: u32) -> i64 {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .unwrap()
        .timestamp_millis()
}

fn goal_input(title: &str, end_date: Option<i64>) -> CreateTaskInput {
    CreateTaskInput {
        title: title.to_string(),
        end_date,
        is_goal: true,
        ..Default::default()
    }
}

mod bucketing_tests {
    use super::*;

    // Pinned clock: Monday 2024-01-01 00:00:00 UTC.
    fn pinned_now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn due_within_seven_days_is_weekly() {
        let (db, lifecycle, goals) = setup();
        let admin = seed_user(&db, "root", true);
        lifecycle
            .create(&admin, goal_input("soon", Some(date_ms(2024, 1, 3))))
            .unwrap();

        let buckets = goals
            .get_goals_at(&caller(&admin, true), None, pinned_now())
            .unwrap();
        assert_eq!(buckets.weekly_goals.len(), 1);
        assert!(buckets.monthly_goals.is_empty());
        assert!(buckets.expired_goals.is_empty());

        let view = &buckets.weekly_goals[0];
        assert!(!view.is_expired);
        // Two days out is beyond the 48-hour near-due horizon.
        assert!(!view.is_near_due);
    }

    #[test]
    fn due_in_the_past_is_expired_and_flagged() {
        let (db, lifecycle, goals) = setup();
        let admin = seed_user(&db, "root", true);
        lifecycle
            .create(&admin, goal_input("late", Some(date_ms(2023, 12, 31))))
            .unwrap();

        let buckets = goals
            .get_goals_at(&caller(&admin, true), None, pinned_now())
            .unwrap();
        assert_eq!(buckets.expired_goals.len(), 1);
        assert!(buckets.weekly_goals.is_empty());
        assert!(buckets.monthly_goals.is_empty());
        assert!(buckets.expired_goals[0].is_expired);
    }

    #[test]
    fn due_later_in_the_month_is_monthly() {
        let (db, lifecycle, goals) = setup();
        let admin = seed_user(&db, "root", true);
        lifecycle
            .create(&admin, goal_input("mid-month", Some(date_ms(2024, 1, 20))))
            .unwrap();

        let buckets = goals
            .get_goals_at(&caller(&admin, true), None, pinned_now())
            .unwrap();
        assert_eq!(buckets.monthly_goals.len(), 1);
        assert!(buckets.weekly_goals.is_empty());
    }

    #[test]
    fn due_beyond_month_end_is_later() {
        let (db, lifecycle, goals) = setup();
        let admin = seed_user(&db, "root", true);
        lifecycle
            .create(&admin, goal_input("next month", Some(date_ms(2024, 2, 15))))
            .unwrap();

        let buckets = goals
            .get_goals_at(&caller(&admin, true), None, pinned_now())
            .unwrap();
        assert_eq!(buckets.later_goals.len(), 1);
        assert!(buckets.weekly_goals.is_empty());
        assert!(buckets.monthly_goals.is_empty());
    }

    #[test]
    fn near_due_within_48_hours() {
        let (db, lifecycle, goals) = setup();
        let admin = seed_user(&db, "root", true);
        let now = pinned_now();
        lifecycle
            .create(
                &admin,
                goal_input("tomorrow", Some(now.timestamp_millis() + 24 * 60 * 60 * 1000)),
            )
            .unwrap();

        let buckets = goals
            .get_goals_at(&caller(&admin, true), None, now)
            .unwrap();
        assert_eq!(buckets.weekly_goals.len(), 1);
        assert!(buckets.weekly_goals[0].is_near_due);
    }

    #[test]
    fn completed_goals_are_excluded() {
        let (db, lifecycle, goals) = setup();
        let admin = seed_user(&db, "root", true);
        let mut input = goal_input("done", Some(date_ms(2024, 1, 3)));
        input.stage = Some("completed".to_string());
        lifecycle.create(&admin, input).unwrap();

        let buckets = goals
            .get_goals_at(&caller(&admin, true), None, pinned_now())
            .unwrap();
        assert!(buckets.weekly_goals.is_empty());
        assert!(buckets.monthly_goals.is_empty());
        assert!(buckets.expired_goals.is_empty());
        assert!(buckets.later_goals.is_empty());
    }

    #[test]
    fn buckets_partition_the_open_goals() {
        let (db, lifecycle, goals) = setup();
        let admin = seed_user(&db, "root", true);

        lifecycle
            .create(&admin, goal_input("a", Some(date_ms(2023, 12, 1))))
            .unwrap();
        lifecycle
            .create(&admin, goal_input("b", Some(date_ms(2024, 1, 5))))
            .unwrap();
        lifecycle
            .create(&admin, goal_input("c", Some(date_ms(2024, 1, 25))))
            .unwrap();
        lifecycle
            .create(&admin, goal_input("d", Some(date_ms(2024, 6, 1))))
            .unwrap();
        // No explicit dates: falls back to updatedAt, which is well after the
        // pinned 2024 clock, so this one lands in later.
        lifecycle.create(&admin, goal_input("e", None)).unwrap();

        let buckets = goals
            .get_goals_at(&caller(&admin, true), None, pinned_now())
            .unwrap();
        let total = buckets.weekly_goals.len()
            + buckets.monthly_goals.len()
            + buckets.expired_goals.len()
            + buckets.later_goals.len();
        assert_eq!(total, 5);
        assert_eq!(buckets.expired_goals.len(), 1);
        assert_eq!(buckets.weekly_goals.len(), 1);
        assert_eq!(buckets.monthly_goals.len(), 1);
        assert_eq!(buckets.later_goals.len(), 2);
    }

    #[test]
    fn non_goal_tasks_do_not_appear() {
        let (db, lifecycle, goals) = setup();
        let admin = seed_user(&db, "root", true);
        let mut input = goal_input("plain", Some(date_ms(2024, 1, 3)));
        input.is_goal = false;
        lifecycle.create(&admin, input).unwrap();

        let buckets = goals
            .get_goals_at(&caller(&admin, true), None, pinned_now())
            .unwrap();
        assert!(buckets.weekly_goals.is_empty());
    }

    #[test]
    fn non_admin_only_sees_own_goals() {
        let (db, lifecycle, goals) = setup();
        let me = seed_user(&db, "me", false);
        let other = seed_user(&db, "other", false);

        lifecycle
            .create(&other, goal_input("theirs", Some(date_ms(2024, 1, 3))))
            .unwrap();
        lifecycle
            .create(&me, goal_input("mine", Some(date_ms(2024, 1, 3))))
            .unwrap();

        let buckets = goals
            .get_goals_at(&caller(&me, false), None, pinned_now())
            .unwrap();
        assert_eq!(buckets.weekly_goals.len(), 1);
        assert_eq!(buckets.weekly_goals[0].title, "mine");

        // A member filter for someone else intersects with the caller's own
        // scope, so nothing matches.
        let buckets = goals
            .get_goals_at(&caller(&me, false), Some(other.as_str()), pinned_now())
            .unwrap();
        assert!(buckets.weekly_goals.is_empty());
    }

    #[test]
    fn malformed_member_filter_is_silently_ignored() {
        let (db, lifecycle, goals) = setup();
        let admin = seed_user(&db, "root", true);
        lifecycle
            .create(&admin, goal_input("g", Some(date_ms(2024, 1, 3))))
            .unwrap();

        let buckets = goals
            .get_goals_at(&caller(&admin, true), Some("not-a-uuid"), pinned_now())
            .unwrap();
        assert_eq!(buckets.weekly_goals.len(), 1);
    }
}

mod dashboard_tests {
    use super::*;

    fn pinned_now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn plain_task(title: &str, stage: &str, priority: &str) -> CreateTaskInput {
        CreateTaskInput {
            title: title.to_string(),
            stage: Some(stage.to_string()),
            priority: Some(priority.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn counts_by_stage_and_priority_chart() {
        let (db, lifecycle, goals) = setup();
        let admin = seed_user(&db, "root", true);

        lifecycle.create(&admin, plain_task("a", "todo", "high")).unwrap();
        lifecycle.create(&admin, plain_task("b", "todo", "medium")).unwrap();
        lifecycle
            .create(&admin, plain_task("c", "in progress", "high"))
            .unwrap();

        let summary = goals
            .dashboard_statistics_at(&caller(&admin, true), pinned_now())
            .unwrap();
        assert_eq!(summary.total_tasks, 3);
        assert_eq!(summary.tasks.get("todo"), Some(&2));
        assert_eq!(summary.tasks.get("in progress"), Some(&1));

        let high = summary.graph_data.iter().find(|p| p.name == "high").unwrap();
        assert_eq!(high.total, 2);
        let medium = summary
            .graph_data
            .iter()
            .find(|p| p.name == "medium")
            .unwrap();
        assert_eq!(medium.total, 1);
    }

    #[test]
    fn last_10_is_capped() {
        let (db, lifecycle, goals) = setup();
        let admin = seed_user(&db, "root", true);
        for i in 0..12 {
            lifecycle
                .create(&admin, plain_task(&format!("t{}", i), "todo", "medium"))
                .unwrap();
        }

        let summary = goals
            .dashboard_statistics_at(&caller(&admin, true), pinned_now())
            .unwrap();
        assert_eq!(summary.total_tasks, 12);
        assert_eq!(summary.last_10_task.len(), 10);
    }

    #[test]
    fn trashed_tasks_are_excluded() {
        let (db, lifecycle, goals) = setup();
        let admin = seed_user(&db, "root", true);
        let task = lifecycle
            .create(&admin, plain_task("gone", "todo", "medium"))
            .unwrap();
        lifecycle.trash(&task.id).unwrap();

        let summary = goals
            .dashboard_statistics_at(&caller(&admin, true), pinned_now())
            .unwrap();
        assert_eq!(summary.total_tasks, 0);
    }

    #[test]
    fn non_admin_sees_only_own_tasks_and_no_user_list() {
        let (db, lifecycle, goals) = setup();
        let me = seed_user(&db, "me", false);
        let other = seed_user(&db, "other", false);

        lifecycle.create(&other, plain_task("theirs", "todo", "high")).unwrap();
        lifecycle.create(&me, plain_task("mine", "todo", "high")).unwrap();

        let summary = goals
            .dashboard_statistics_at(&caller(&me, false), pinned_now())
            .unwrap();
        assert_eq!(summary.total_tasks, 1);
        assert_eq!(summary.last_10_task[0].title, "mine");
        assert!(summary.users.is_empty());
    }

    #[test]
    fn admin_gets_recent_active_users() {
        let (db, lifecycle, goals) = setup();
        let admin = seed_user(&db, "root", true);
        seed_user(&db, "alice", false);
        seed_user(&db, "bob", false);
        lifecycle.create(&admin, plain_task("t", "todo", "medium")).unwrap();

        let summary = goals
            .dashboard_statistics_at(&caller(&admin, true), pinned_now())
            .unwrap();
        assert_eq!(summary.users.len(), 3);
    }

    #[test]
    fn goal_previews_use_the_same_windows() {
        let (db, lifecycle, goals) = setup();
        let admin = seed_user(&db, "root", true);
        lifecycle
            .create(&admin, goal_input("this week", Some(date_ms(2024, 1, 4))))
            .unwrap();
        lifecycle
            .create(&admin, goal_input("this month", Some(date_ms(2024, 1, 20))))
            .unwrap();

        let summary = goals
            .dashboard_statistics_at(&caller(&admin, true), pinned_now())
            .unwrap();
        assert_eq!(summary.weekly_goals.len(), 1);
        assert_eq!(summary.weekly_goals[0].title, "this week");
        assert_eq!(summary.monthly_goals.len(), 1);
        assert_eq!(summary.monthly_goals[0].title, "this month");
    }
}
