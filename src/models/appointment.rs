use serde::{Deserialize, Serialize};
use time::{
    Date, Month, OffsetDateTime, PrimitiveDateTime,
    format_description::BorrowedFormatItem, macros::format_description,
};
use uuid::Uuid;

use super::{ValidationError, filled, number, timestamp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentSlot {
    pub id: Uuid,
    pub service_id: Uuid,
    #[serde(with = "timestamp")]
    pub starts_at: OffsetDateTime,
    pub max_bookings: u32,
    #[serde(default)]
    pub current_bookings: u32,
}

impl AppointmentSlot {
    pub fn remaining(&self) -> u32 {
        self.max_bookings.saturating_sub(self.current_bookings)
    }

    pub fn is_available(&self) -> bool {
        self.remaining() > 0
    }

    pub fn date(&self) -> Date {
        self.starts_at.date()
    }

    /// Open, inside the booking window and not yet started.
    pub fn is_bookable(&self, window: BookingWindow, now: OffsetDateTime) -> bool {
        self.starts_at > now && window.contains(self.date()) && self.is_available()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn label(self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "Scheduled",
            AppointmentStatus::Completed => "Completed",
            AppointmentStatus::Cancelled => "Cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub slot_id: Uuid,
    pub service_id: Uuid,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, with = "timestamp::option")]
    pub created_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAppointment {
    pub user_id: Uuid,
    pub slot_id: Uuid,
    pub service_id: Uuid,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
}

/// `date` moved forward by whole calendar months, the day clamped to the target month's end.
pub fn add_months(date: Date, months: u32) -> Date {
    let index = date.year() * 12 + (date.month() as i32 - 1) + months as i32;
    let year = index.div_euclid(12);
    let month = Month::try_from((index.rem_euclid(12) + 1) as u8).unwrap_or(Month::December);

    let mut day = date.day();
    loop {
        match Date::from_calendar_date(year, month, day) {
            Ok(date) => return date,
            Err(_) if day > 28 => day -= 1,
            Err(_) => return date,
        }
    }
}

/// Dates a slot may be booked on: from today up to, not including, two months ahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingWindow {
    pub start: Date,
    pub end: Date,
}

impl BookingWindow {
    pub const MONTHS_AHEAD: u32 = 2;

    pub fn from_today(today: Date) -> Self {
        Self {
            start: today,
            end: add_months(today, Self::MONTHS_AHEAD),
        }
    }

    pub fn contains(&self, date: Date) -> bool {
        date >= self.start && date < self.end
    }

    pub fn is_disabled(&self, date: Date) -> bool {
        !self.contains(date)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct BookingForm {
    pub slot_id: Option<String>,
    pub notes: Option<String>,
}

impl BookingForm {
    /// Picks the chosen slot out of `slots` and checks it can still be booked at `now`.
    pub fn validate<'a>(
        &self,
        slots: &'a [AppointmentSlot],
        now: OffsetDateTime,
    ) -> Result<&'a AppointmentSlot, ValidationError> {
        let window = BookingWindow::from_today(now.date());
        let slot_id = filled(self.slot_id.as_deref())
            .and_then(|id| Uuid::parse_str(&id).ok())
            .ok_or_else(|| ValidationError::new("slot_id", "Please choose a time slot"))?;

        let slot = slots
            .iter()
            .find(|slot| slot.id == slot_id)
            .ok_or_else(|| ValidationError::new("slot_id", "That time slot no longer exists"))?;

        if slot.starts_at <= now {
            return Err(ValidationError::new("slot_id", "That time slot has already started"));
        }
        if window.is_disabled(slot.date()) {
            return Err(ValidationError::new(
                "slot_id",
                "Appointments can only be booked within the next two months",
            ));
        }
        if !slot.is_available() {
            return Err(ValidationError::new("slot_id", "That time slot is fully booked"));
        }
        Ok(slot)
    }
}

/// Admin form for a bookable service.
#[derive(Debug, Default, Deserialize)]
pub struct ServiceForm {
    pub name: Option<String>,
    pub duration_minutes: Option<String>,
    pub price: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceFields {
    pub name: String,
    pub duration_minutes: Option<u32>,
    pub price: Option<f64>,
    pub description: Option<String>,
}

impl ServiceForm {
    pub fn validate(&self) -> Result<ServiceFields, ValidationError> {
        let name = filled(self.name.as_deref())
            .ok_or_else(|| ValidationError::new("name", "Service name is required"))?;
        Ok(ServiceFields {
            name,
            duration_minutes: number("duration_minutes", self.duration_minutes.as_deref())?,
            price: number("price", self.price.as_deref())?,
            description: filled(self.description.as_deref()),
        })
    }
}

/// Admin form for opening a slot. `starts_at` comes from a `datetime-local` input.
#[derive(Debug, Default, Deserialize)]
pub struct SlotForm {
    pub service_id: Option<String>,
    pub starts_at: Option<String>,
    pub max_bookings: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSlot {
    pub service_id: Uuid,
    #[serde(with = "timestamp")]
    pub starts_at: OffsetDateTime,
    pub max_bookings: u32,
    pub current_bookings: u32,
}

const LOCAL_DATETIME: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]");

impl SlotForm {
    pub fn validate(&self) -> Result<NewSlot, ValidationError> {
        let service_id = filled(self.service_id.as_deref())
            .and_then(|id| Uuid::parse_str(&id).ok())
            .ok_or_else(|| ValidationError::new("service_id", "Please select a service"))?;
        let starts_at = filled(self.starts_at.as_deref())
            .and_then(|at| PrimitiveDateTime::parse(&at, LOCAL_DATETIME).ok())
            .ok_or_else(|| ValidationError::new("starts_at", "Please pick a start time"))?
            .assume_utc();
        let max_bookings = number("max_bookings", self.max_bookings.as_deref())?.unwrap_or(1);
        if max_bookings == 0 {
            return Err(ValidationError::new("max_bookings", "A slot needs room for at least one booking"));
        }
        Ok(NewSlot {
            service_id,
            starts_at,
            max_bookings,
            current_bookings: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use time::macros::{date, datetime};

    use super::*;

    fn slot(starts_at: OffsetDateTime, max: u32, current: u32) -> AppointmentSlot {
        AppointmentSlot {
            id: Uuid::new_v4(),
            service_id: Uuid::new_v4(),
            starts_at,
            max_bookings: max,
            current_bookings: current,
        }
    }

    #[test]
    fn add_months_clamps_to_month_end() {
        assert_eq!(add_months(date!(2026 - 10 - 15), 2), date!(2026 - 12 - 15));
        assert_eq!(add_months(date!(2026 - 11 - 20), 2), date!(2027 - 01 - 20));
        assert_eq!(add_months(date!(2026 - 12 - 31), 2), date!(2027 - 02 - 28));
        assert_eq!(add_months(date!(2027 - 12 - 31), 2), date!(2028 - 02 - 29));
    }

    #[test]
    fn booking_window_bounds() {
        let window = BookingWindow::from_today(date!(2026 - 10 - 15));

        assert!(window.is_disabled(date!(2026 - 10 - 14)));
        assert!(!window.is_disabled(date!(2026 - 10 - 15)));
        assert!(!window.is_disabled(date!(2026 - 12 - 14)));
        assert!(window.is_disabled(date!(2026 - 12 - 15)));
        assert!(window.is_disabled(date!(2027 - 01 - 01)));
    }

    #[test]
    fn availability_follows_capacity() {
        let at = datetime!(2026-10-20 9:00 UTC);
        assert!(slot(at, 3, 2).is_available());
        assert!(!slot(at, 3, 3).is_available());
        assert_eq!(slot(at, 1, 5).remaining(), 0);
    }

    #[test]
    fn booking_form_checks_slot() {
        let now = datetime!(2026-10-15 11:30 UTC);
        let open = slot(datetime!(2026-10-20 9:00 UTC), 2, 0);
        let full = slot(datetime!(2026-10-21 9:00 UTC), 2, 2);
        let far = slot(datetime!(2027-03-01 9:00 UTC), 2, 0);
        let started = slot(datetime!(2026-10-15 9:00 UTC), 2, 0);
        let later_today = slot(datetime!(2026-10-15 16:00 UTC), 2, 0);
        let slots = vec![open.clone(), full.clone(), far.clone(), started.clone(), later_today.clone()];

        let form = |id: &Uuid| BookingForm {
            slot_id: Some(id.to_string()),
            notes: None,
        };

        assert_eq!(form(&open.id).validate(&slots, now).unwrap().id, open.id);
        assert_eq!(form(&later_today.id).validate(&slots, now).unwrap().id, later_today.id);
        assert!(form(&full.id).validate(&slots, now).is_err());
        assert!(form(&far.id).validate(&slots, now).is_err());
        assert_eq!(
            form(&started.id).validate(&slots, now).unwrap_err().message,
            "That time slot has already started"
        );
        assert_eq!(
            BookingForm::default().validate(&slots, now).unwrap_err().message,
            "Please choose a time slot"
        );

        let window = BookingWindow::from_today(now.date());
        assert!(!started.is_bookable(window, now));
        assert!(later_today.is_bookable(window, now));
    }

    #[test]
    fn slot_form_reads_local_datetime() {
        let service = Uuid::new_v4();
        let form = SlotForm {
            service_id: Some(service.to_string()),
            starts_at: Some("2026-11-02T14:30".to_owned()),
            max_bookings: Some("4".to_owned()),
        };
        let slot = form.validate().unwrap();
        assert_eq!(slot.starts_at, datetime!(2026-11-02 14:30 UTC));
        assert_eq!(slot.max_bookings, 4);
        assert_eq!(slot.current_bookings, 0);

        let form = SlotForm {
            max_bookings: Some("0".to_owned()),
            ..form
        };
        assert_eq!(form.validate().unwrap_err().field, "max_bookings");
        assert_eq!(SlotForm::default().validate().unwrap_err().field, "service_id");
    }

    #[test]
    fn service_form_requires_name() {
        assert_eq!(ServiceForm::default().validate().unwrap_err().message, "Service name is required");
        let form = ServiceForm {
            name: Some("Visa review".to_owned()),
            price: Some("abc".to_owned()),
            ..Default::default()
        };
        assert_eq!(form.validate().unwrap_err().field, "price");
    }
}
