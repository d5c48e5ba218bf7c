//! Notification counts
//!
//! A pure projection over the latest request and session snapshots. It
//! stores nothing and never fails: absent inputs count as empty.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::{Request, RequestStatus, Session};

/// Badge counts shown by clients
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NotificationCounts {
    /// Pending requests waiting in the inbox
    pub requests: usize,
    /// Open sessions that are unscheduled or start soon
    pub sessions: usize,
    /// Unread chat messages; not tracked, always zero
    pub chat: usize,
}

/// Default horizon for an "upcoming" session
pub fn default_upcoming_window() -> Duration {
    Duration::hours(24)
}

/// Counts with the default 24 hour window
pub fn aggregate(
    inbox: Option<&[Request]>,
    sessions: Option<&[Session]>,
    now: DateTime<Utc>,
) -> NotificationCounts {
    aggregate_within(inbox, sessions, now, default_upcoming_window())
}

/// Counts with an explicit upcoming window.
///
/// A session counts when it is not done and either has no start time yet or
/// starts no later than `now + window`. Sessions whose start has already
/// passed without being completed still count.
pub fn aggregate_within(
    inbox: Option<&[Request]>,
    sessions: Option<&[Session]>,
    now: DateTime<Utc>,
    window: Duration,
) -> NotificationCounts {
    let inbox = inbox.unwrap_or_default();
    let sessions = sessions.unwrap_or_default();
    let horizon = now.checked_add_signed(window.max(Duration::zero()));

    let requests = inbox
        .iter()
        .filter(|r| r.status == RequestStatus::Pending)
        .count();

    let sessions = sessions
        .iter()
        .filter(|s| !s.is_done())
        .filter(|s| match (s.start_at, horizon) {
            (None, _) => true,
            (Some(_), None) => true,
            (Some(start), Some(horizon)) => start <= horizon,
        })
        .count();

    NotificationCounts {
        requests,
        sessions,
        chat: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionStatus;
    use uuid::Uuid;

    fn request(status: RequestStatus) -> Request {
        Request {
            id: Uuid::new_v4(),
            from_user_id: Uuid::new_v4(),
            to_user_id: Uuid::new_v4(),
            course_code: "CS101".to_string(),
            minutes: 60,
            note: None,
            status,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    fn session(status: SessionStatus, start_at: Option<DateTime<Utc>>) -> Session {
        Session {
            id: Uuid::new_v4(),
            request_id: Uuid::new_v4(),
            teacher_id: Uuid::new_v4(),
            learner_id: Uuid::new_v4(),
            course_code: "CS101".to_string(),
            minutes: 60,
            status,
            start_at,
            end_at: start_at.and_then(|s| s.checked_add_signed(Duration::minutes(60))),
            completed_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn counts_only_pending_requests() {
        let inbox = vec![
            request(RequestStatus::Pending),
            request(RequestStatus::Pending),
            request(RequestStatus::Declined),
        ];
        let counts = aggregate(Some(&inbox), None, Utc::now());
        assert_eq!(counts.requests, 2);
        assert_eq!(counts.sessions, 0);
        assert_eq!(counts.chat, 0);
    }

    #[test]
    fn unscheduled_sessions_are_upcoming() {
        let sessions = vec![session(SessionStatus::Scheduled, None)];
        let counts = aggregate(None, Some(&sessions), Utc::now());
        assert_eq!(counts.sessions, 1);
    }

    #[test]
    fn sessions_beyond_the_window_are_excluded() {
        let now = Utc::now();
        let sessions = vec![
            session(SessionStatus::Scheduled, Some(now + Duration::hours(30))),
            session(SessionStatus::Scheduled, Some(now + Duration::hours(2))),
            session(SessionStatus::Scheduled, Some(now - Duration::hours(1))),
        ];
        let counts = aggregate(None, Some(&sessions), now);
        assert_eq!(counts.sessions, 2);
    }

    #[test]
    fn done_sessions_are_never_counted() {
        let now = Utc::now();
        let sessions = vec![
            session(SessionStatus::Done, None),
            session(SessionStatus::Done, Some(now + Duration::hours(1))),
        ];
        assert_eq!(aggregate(None, Some(&sessions), now).sessions, 0);
    }

    #[test]
    fn missing_inputs_are_empty() {
        assert_eq!(
            aggregate(None, None, Utc::now()),
            NotificationCounts::default()
        );
    }

    #[test]
    fn window_is_configurable() {
        let now = Utc::now();
        let sessions = vec![session(
            SessionStatus::Scheduled,
            Some(now + Duration::hours(30)),
        )];
        let counts = aggregate_within(None, Some(&sessions), now, Duration::hours(48));
        assert_eq!(counts.sessions, 1);
    }

    #[test]
    fn extreme_times_do_not_panic() {
        let sessions = vec![session(
            SessionStatus::Scheduled,
            Some(DateTime::<Utc>::MAX_UTC),
        )];
        let counts = aggregate_within(
            None,
            Some(&sessions),
            DateTime::<Utc>::MAX_UTC,
            Duration::hours(24),
        );
        assert_eq!(counts.sessions, 1);
    }
}
