use chrono::{Duration, Utc};
use std::sync::Arc;
use timeledger::stores::memory::{InMemoryBackend, InMemoryRoster, RecordingChannel};
use timeledger::{AppSettings, LedgerCore, ReportStatus, RosterUser, SubmitEntryPayload};

struct Harness {
    core: Arc<LedgerCore>,
    channel: Arc<RecordingChannel>,
    settings: AppSettings,
}

fn harness(roster: Vec<RosterUser>) -> Harness {
    let backend = Arc::new(InMemoryBackend::new());
    let parent = backend.add_container("Timesheets");
    let settings = AppSettings {
        parent_container_id: parent,
        ..AppSettings::default()
    };
    let channel = Arc::new(RecordingChannel::new());
    // Every day counts as a business day so the sweep never short-circuits
    // on whatever weekday the test happens to run.
    let core = LedgerCore::with_calendar(
        settings.clone(),
        backend.clone(),
        backend,
        Arc::new(InMemoryRoster::new(roster, 2)),
        channel.clone(),
        Arc::new(|_| true),
    )
    .expect("core construction");
    Harness {
        core,
        channel,
        settings,
    }
}

fn user(email: &str, name: &str) -> RosterUser {
    RosterUser {
        email: email.to_string(),
        display_name: Some(name.to_string()),
    }
}

#[tokio::test]
async fn submit_then_reconcile_flags_short_and_silent_users() {
    let hx = harness(vec![
        user("alice@example.com", "Alice"),
        user("bob@example.com", "Bob"),
        user("carol@example.com", "Carol"),
    ]);
    let now = Utc::now();
    let today = hx.settings.local_date(now);

    // Alice logs a full day across two submissions, Bob a short one, Carol
    // never submits.
    for (email, hours) in [("alice@example.com", 5.0), ("alice@example.com", 3.0)] {
        hx.core
            .submit_entry(SubmitEntryPayload {
                date: today,
                project: "Apollo".to_string(),
                description: "Build work".to_string(),
                hours,
                user_email: email.to_string(),
                user_name: None,
            })
            .await
            .expect("alice submit");
    }
    hx.core
        .submit_entry(SubmitEntryPayload {
            date: today,
            project: "Apollo".to_string(),
            description: "Review".to_string(),
            hours: 6.0,
            user_email: "bob@example.com".to_string(),
            user_name: None,
        })
        .await
        .expect("bob submit");

    let report = hx
        .core
        .scheduler()
        .run_once(now)
        .await
        .expect("reconciliation");

    assert_eq!(report.lines.len(), 2);
    let bob = report
        .lines
        .iter()
        .find(|line| line.email == "bob@example.com")
        .expect("bob flagged");
    assert_eq!(bob.status, ReportStatus::Incomplete);
    assert_eq!(bob.hours_logged, Some(6.0));
    let carol = report
        .lines
        .iter()
        .find(|line| line.email == "carol@example.com")
        .expect("carol flagged");
    assert_eq!(carol.status, ReportStatus::Missing);

    let posts = hx.channel.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].sections[0].title, "Missing");
}

#[tokio::test]
async fn backdated_submission_raises_a_detached_alert() {
    let hx = harness(vec![user("alice@example.com", "Alice")]);
    let now = Utc::now();
    let yesterday = hx.settings.local_date(now) - Duration::days(1);

    let ack = hx
        .core
        .submit_entry(SubmitEntryPayload {
            date: yesterday,
            project: "Apollo".to_string(),
            description: "Late entry".to_string(),
            hours: 2.0,
            user_email: "alice@example.com".to_string(),
            user_name: Some("Alice".to_string()),
        })
        .await
        .expect("submit");
    assert!(ack.backdated);

    // The alert is fire-and-forget; give the spawned task a moment to land.
    let mut posts = hx.channel.posts();
    for _ in 0..100 {
        if !posts.is_empty() {
            break;
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
        posts = hx.channel.posts();
    }
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].header, "Back-dated timesheet entry");
    assert_eq!(posts[0].sections[0].title, "Alice");
}

#[tokio::test]
async fn repeat_submissions_reuse_the_same_ledger() {
    let hx = harness(vec![user("alice@example.com", "Alice")]);
    let now = Utc::now();
    let today = hx.settings.local_date(now);

    let first = hx
        .core
        .submit_entry(SubmitEntryPayload {
            date: today,
            project: "Apollo".to_string(),
            description: "Morning".to_string(),
            hours: 4.0,
            user_email: "alice@example.com".to_string(),
            user_name: None,
        })
        .await
        .expect("first submit");
    let second = hx
        .core
        .submit_entry(SubmitEntryPayload {
            date: today,
            project: "Apollo".to_string(),
            description: "Afternoon".to_string(),
            hours: 4.0,
            user_email: "alice@example.com".to_string(),
            user_name: None,
        })
        .await
        .expect("second submit");

    assert_eq!(first.ledger_id, second.ledger_id);
}

#[test]
fn tracing_initializes_into_a_log_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    timeledger::init_tracing(dir.path()).expect("init tracing");
    assert!(dir.path().join("logs").is_dir());
}
