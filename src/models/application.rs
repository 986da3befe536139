use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{ValidationError, filled, timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Draft,
    InReview,
    Approved,
    Rejected,
    Cancelled,
}

impl ApplicationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "draft",
            ApplicationStatus::InReview => "in_review",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Cancelled => "cancelled",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "Draft",
            ApplicationStatus::InReview => "In review",
            ApplicationStatus::Approved => "Approved",
            ApplicationStatus::Rejected => "Rejected",
            ApplicationStatus::Cancelled => "Cancelled",
        }
    }

    /// Still waiting on a decision.
    pub fn is_active(self) -> bool {
        matches!(self, ApplicationStatus::Draft | ApplicationStatus::InReview)
    }

    pub fn can_cancel(self) -> bool {
        self.is_active()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Normal, Priority::High];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Normal => "Normal",
            Priority::High => "High",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: Uuid,
    pub user_id: Uuid,
    pub program_id: Uuid,
    pub status: ApplicationStatus,
    #[serde(default, with = "timestamp::option")]
    pub submitted_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub notes: Option<String>,
}

/// The "New Application" form as posted by the browser.
#[derive(Debug, Default, Deserialize)]
pub struct NewApplicationForm {
    pub program_id: Option<String>,
    pub priority: Option<Priority>,
    pub notes: Option<String>,
    /// Present when the user chose "Submit" rather than "Save draft".
    pub submit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewApplication {
    pub user_id: Uuid,
    pub program_id: Uuid,
    pub status: ApplicationStatus,
    #[serde(with = "timestamp::option")]
    pub submitted_at: Option<OffsetDateTime>,
    pub priority: Priority,
    pub notes: Option<String>,
}

impl NewApplicationForm {
    pub fn validate(&self, user_id: Uuid, now: OffsetDateTime) -> Result<NewApplication, ValidationError> {
        let program_id = filled(self.program_id.as_deref())
            .and_then(|id| Uuid::parse_str(&id).ok())
            .ok_or_else(|| ValidationError::new("program_id", "Please select a program"))?;

        let submitted = self.submit.is_some();
        Ok(NewApplication {
            user_id,
            program_id,
            status: if submitted {
                ApplicationStatus::InReview
            } else {
                ApplicationStatus::Draft
            },
            submitted_at: submitted.then_some(now),
            priority: self.priority.unwrap_or_default(),
            notes: filled(self.notes.as_deref()),
        })
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn missing_program_is_rejected() {
        let form = NewApplicationForm {
            program_id: Some(String::new()),
            ..Default::default()
        };
        let err = form
            .validate(Uuid::new_v4(), datetime!(2026-10-15 10:00 UTC))
            .unwrap_err();
        assert_eq!(err.message, "Please select a program");

        let form = NewApplicationForm::default();
        assert!(form.validate(Uuid::new_v4(), datetime!(2026-10-15 10:00 UTC)).is_err());
    }

    #[test]
    fn submit_moves_straight_to_review() {
        let program_id = Uuid::new_v4();
        let now = datetime!(2026-10-15 10:00 UTC);
        let form = NewApplicationForm {
            program_id: Some(program_id.to_string()),
            priority: Some(Priority::High),
            notes: Some("  ".to_owned()),
            submit: Some("1".to_owned()),
        };

        let app = form.validate(Uuid::new_v4(), now).unwrap();
        assert_eq!(app.program_id, program_id);
        assert_eq!(app.status, ApplicationStatus::InReview);
        assert_eq!(app.submitted_at, Some(now));
        assert_eq!(app.notes, None);
    }

    #[test]
    fn drafts_have_no_submission_date() {
        let form = NewApplicationForm {
            program_id: Some(Uuid::new_v4().to_string()),
            ..Default::default()
        };
        let app = form.validate(Uuid::new_v4(), datetime!(2026-10-15 10:00 UTC)).unwrap();
        assert_eq!(app.status, ApplicationStatus::Draft);
        assert_eq!(app.submitted_at, None);
        assert_eq!(app.priority, Priority::Normal);
    }

    #[test]
    fn only_pending_applications_can_be_cancelled() {
        assert!(ApplicationStatus::Draft.can_cancel());
        assert!(ApplicationStatus::InReview.can_cancel());
        assert!(!ApplicationStatus::Approved.can_cancel());
        assert!(!ApplicationStatus::Cancelled.can_cancel());
    }
}
