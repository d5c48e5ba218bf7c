//! Request model and its state machine

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    error::{ExchangeError, ExchangeResult},
    models::Actor,
    policy::ExchangePolicy,
};

/// Lifecycle of a tutoring request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "request_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Declined,
    Cancelled,
    Expired,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Accepted => "ACCEPTED",
            RequestStatus::Declined => "DECLINED",
            RequestStatus::Cancelled => "CANCELLED",
            RequestStatus::Expired => "EXPIRED",
        }
    }

    /// Every state other than PENDING is a sink
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub id: Uuid,
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub course_code: String,
    pub minutes: i32,
    pub note: Option<String>,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// New request creation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRequest {
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub course_code: String,
    pub minutes: Option<i32>,
    pub note: Option<String>,
}

/// A validated request ready to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct ValidRequest {
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub course_code: String,
    pub minutes: i32,
    pub note: Option<String>,
}

impl NewRequest {
    /// Check the side-effect-free preconditions of a send
    pub fn validate(&self, policy: &ExchangePolicy) -> ExchangeResult<ValidRequest> {
        if self.from_user_id == self.to_user_id {
            return Err(ExchangeError::SelfRequest);
        }

        let course_code = self.course_code.trim();
        if course_code.is_empty() {
            return Err(ExchangeError::Validation(
                "course code is required".to_string(),
            ));
        }

        let minutes = policy.resolve_minutes(self.minutes)?;

        let note = self
            .note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        Ok(ValidRequest {
            from_user_id: self.from_user_id,
            to_user_id: self.to_user_id,
            course_code: course_code.to_string(),
            minutes,
            note,
        })
    }
}

/// Ways a pending request can be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Recipient agrees to teach
    Accept,
    /// Recipient refuses
    Decline,
    /// Sender withdraws
    Cancel,
    /// System retires a stale request
    Expire,
}

impl Resolution {
    pub fn target_status(&self) -> RequestStatus {
        match self {
            Resolution::Accept => RequestStatus::Accepted,
            Resolution::Decline => RequestStatus::Declined,
            Resolution::Cancel => RequestStatus::Cancelled,
            Resolution::Expire => RequestStatus::Expired,
        }
    }

    /// Whether the sender's reserved token goes back
    pub fn refunds_sender(&self) -> bool {
        !matches!(self, Resolution::Accept)
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Resolution::Accept => "accept",
            Resolution::Decline => "decline",
            Resolution::Cancel => "cancel",
            Resolution::Expire => "expire",
        }
    }
}

impl Request {
    /// Check that `actor` may apply `resolution` to this request.
    ///
    /// Authorization is checked before state, so a stranger learns nothing
    /// about the request's status.
    pub fn check_resolution(&self, resolution: Resolution, actor: Actor) -> ExchangeResult<()> {
        let allowed = match (resolution, actor) {
            (Resolution::Accept | Resolution::Decline, Actor::User(id)) => id == self.to_user_id,
            (Resolution::Cancel, Actor::User(id)) => id == self.from_user_id,
            (Resolution::Expire, Actor::System) => true,
            _ => false,
        };

        if !allowed {
            let party = match resolution {
                Resolution::Accept | Resolution::Decline => "the recipient",
                Resolution::Cancel => "the sender",
                Resolution::Expire => "the system",
            };
            return Err(ExchangeError::NotAuthorized(format!(
                "only {} can {} request {}",
                party,
                resolution.verb(),
                self.id
            )));
        }

        if self.status.is_terminal() {
            return Err(ExchangeError::AlreadyResolved {
                id: self.id,
                status: self.status,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> Request {
        Request {
            id: Uuid::new_v4(),
            from_user_id: Uuid::new_v4(),
            to_user_id: Uuid::new_v4(),
            course_code: "CS101".to_string(),
            minutes: 60,
            note: None,
            status: RequestStatus::Pending,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    #[test]
    fn recipient_may_accept_and_decline() {
        let request = pending();
        let recipient = Actor::User(request.to_user_id);
        assert!(request.check_resolution(Resolution::Accept, recipient).is_ok());
        assert!(request.check_resolution(Resolution::Decline, recipient).is_ok());
    }

    #[test]
    fn sender_cannot_accept_own_request() {
        let request = pending();
        let err = request
            .check_resolution(Resolution::Accept, Actor::User(request.from_user_id))
            .unwrap_err();
        assert!(matches!(err, ExchangeError::NotAuthorized(_)));
    }

    #[test]
    fn only_sender_may_cancel() {
        let request = pending();
        assert!(
            request
                .check_resolution(Resolution::Cancel, Actor::User(request.from_user_id))
                .is_ok()
        );
        assert!(matches!(
            request.check_resolution(Resolution::Cancel, Actor::User(request.to_user_id)),
            Err(ExchangeError::NotAuthorized(_))
        ));
    }

    #[test]
    fn only_system_may_expire() {
        let request = pending();
        assert!(request.check_resolution(Resolution::Expire, Actor::System).is_ok());
        assert!(matches!(
            request.check_resolution(Resolution::Expire, Actor::User(request.to_user_id)),
            Err(ExchangeError::NotAuthorized(_))
        ));
        assert!(matches!(
            request.check_resolution(Resolution::Accept, Actor::System),
            Err(ExchangeError::NotAuthorized(_))
        ));
    }

    #[test]
    fn terminal_states_are_sinks() {
        for status in [
            RequestStatus::Accepted,
            RequestStatus::Declined,
            RequestStatus::Cancelled,
            RequestStatus::Expired,
        ] {
            let request = Request {
                status,
                ..pending()
            };
            let err = request
                .check_resolution(Resolution::Decline, Actor::User(request.to_user_id))
                .unwrap_err();
            assert!(
                matches!(err, ExchangeError::AlreadyResolved { status: s, .. } if s == status)
            );
        }
    }

    #[test]
    fn stranger_is_not_authorized_even_when_resolved() {
        let request = Request {
            status: RequestStatus::Accepted,
            ..pending()
        };
        let err = request
            .check_resolution(Resolution::Accept, Actor::User(Uuid::new_v4()))
            .unwrap_err();
        assert!(matches!(err, ExchangeError::NotAuthorized(_)));
    }

    #[test]
    fn only_acceptance_keeps_the_token() {
        assert!(!Resolution::Accept.refunds_sender());
        assert!(Resolution::Decline.refunds_sender());
        assert!(Resolution::Cancel.refunds_sender());
        assert!(Resolution::Expire.refunds_sender());
    }

    #[test]
    fn validate_rejects_self_request() {
        let user = Uuid::new_v4();
        let new = NewRequest {
            from_user_id: user,
            to_user_id: user,
            course_code: "CS101".to_string(),
            minutes: Some(60),
            note: None,
        };
        assert!(matches!(
            new.validate(&ExchangePolicy::default()),
            Err(ExchangeError::SelfRequest)
        ));
    }

    #[test]
    fn validate_normalises_fields() {
        let new = NewRequest {
            from_user_id: Uuid::new_v4(),
            to_user_id: Uuid::new_v4(),
            course_code: "  MATH 200 ".to_string(),
            minutes: None,
            note: Some("   ".to_string()),
        };
        let valid = new.validate(&ExchangePolicy::default()).unwrap();
        assert_eq!(valid.course_code, "MATH 200");
        assert_eq!(valid.minutes, 60);
        assert_eq!(valid.note, None);
    }

    #[test]
    fn validate_rejects_blank_course_and_bad_minutes() {
        let base = NewRequest {
            from_user_id: Uuid::new_v4(),
            to_user_id: Uuid::new_v4(),
            course_code: " ".to_string(),
            minutes: Some(60),
            note: None,
        };
        let policy = ExchangePolicy::default();
        assert!(base.validate(&policy).unwrap_err().is_validation());

        let zero = NewRequest {
            course_code: "CS101".to_string(),
            minutes: Some(0),
            ..base
        };
        assert!(zero.validate(&policy).unwrap_err().is_validation());
    }

    #[test]
    fn status_serialises_uppercase() {
        assert_eq!(
            serde_json::to_string(&RequestStatus::Pending).unwrap(),
            "\"PENDING\""
        );
        assert_eq!(RequestStatus::Cancelled.to_string(), "CANCELLED");
    }
}
