//! Backend rows as the dashboard reads and writes them.

mod application;
mod appointment;
mod chat;
mod consultation;
mod destination;
mod notification;
mod payment;
mod profile;
mod program;

use std::fmt;

pub use application::{Application, ApplicationStatus, NewApplication, NewApplicationForm, Priority};
pub use appointment::{
    Appointment, AppointmentSlot, AppointmentStatus, BookingForm, BookingWindow, NewAppointment,
    NewSlot, Service, ServiceFields, ServiceForm, SlotForm, add_months,
};
pub use chat::{Chat, ChatMessage, NewChatMessage, SenderRole};
pub use consultation::{
    ConsultationDraft, ConsultationParams, ConsultationRecord, ConsultationResult, MatchedProgram,
    NewConsultation, ProgramMatch, WizardStep,
};
pub use destination::{DESTINATIONS, Destination, DestinationStats};
pub use notification::{Notification, NotificationKind};
pub use payment::{Payment, PaymentStatus, PaymentTotals};
pub use profile::{
    ProfileForm, ProfilePatch, Role, TRACKED_FIELDS, UserProfile, completion_percentage,
};
pub use program::{Program, ProgramFields, ProgramForm, StudyLevel};

/// A required field check that failed before anything was sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Trimmed, non-empty form text.
pub(crate) fn filled(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Optional numeric form field; blank is `None`.
pub(crate) fn number<T: std::str::FromStr>(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<T>, ValidationError> {
    filled(value)
        .map(|v| {
            v.parse()
                .map_err(|_| ValidationError::new(field, format!("{field} must be a number")))
        })
        .transpose()
}

pub(crate) fn checked(value: Option<&str>) -> bool {
    matches!(value, Some("on" | "true" | "1" | "yes"))
}

/// `YYYY-MM-DD` dates as the backend stores them.
pub mod date {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

    const FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

    pub fn parse(text: &str) -> Result<Date, time::error::Parse> {
        // timestamps are accepted and truncated to their date
        Date::parse(text.get(..10).unwrap_or(text), FORMAT)
    }

    pub fn display(date: Date) -> String {
        date.format(FORMAT).unwrap_or_default()
    }

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&display(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse(&text).map_err(de::Error::custom)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(date: &Option<Date>, serializer: S) -> Result<S::Ok, S::Error> {
            match date {
                Some(date) => serializer.serialize_some(&display(*date)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Date>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(text) if !text.trim().is_empty() => parse(&text).map(Some).map_err(de::Error::custom),
                _ => Ok(None),
            }
        }
    }
}

/// Timestamps as `timestamptz` text.
pub mod timestamp {
    use time::{OffsetDateTime, format_description::well_known::Rfc3339};

    pub use time::serde::rfc3339::{deserialize, option, serialize};

    pub fn display(at: OffsetDateTime) -> String {
        format!(
            "{} {:02}:{:02}",
            super::date::display(at.date()),
            at.hour(),
            at.minute()
        )
    }

    pub fn to_text(at: OffsetDateTime) -> String {
        at.format(&Rfc3339).unwrap_or_default()
    }
}

/// Money amounts as shown in tables.
pub struct Money<'a>(pub f64, pub &'a str);

impl fmt::Display for Money<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {:.2}", self.1, self.0)
    }
}
