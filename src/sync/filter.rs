//! Pure views over fetched rows plus whatever the user picked in the page controls.
//!
//! Every filter deserializes from the page's query string, so a blank control and a
//! missing one mean the same thing.

use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{Deserialize, Deserializer};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::models::{
    Application, ApplicationStatus, Appointment, AppointmentSlot, AppointmentStatus,
    Notification, NotificationKind, Payment, PaymentStatus, Program, Service, StudyLevel, checked,
};

/// What a list renders: rows, or the explicit "nothing matched" branch.
#[derive(Debug, Clone, PartialEq)]
pub enum Filtered<T> {
    Rows(Vec<T>),
    NoResults,
}

impl<T> Filtered<T> {
    pub fn from_vec(rows: Vec<T>) -> Self {
        if rows.is_empty() {
            Filtered::NoResults
        } else {
            Filtered::Rows(rows)
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Filtered::Rows(rows) => rows.len(),
            Filtered::NoResults => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Filtered::NoResults)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        match self {
            Filtered::Rows(rows) => rows.iter(),
            Filtered::NoResults => Default::default(),
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            Filtered::Rows(rows) => rows,
            Filtered::NoResults => Vec::new(),
        }
    }
}

impl<T> FromIterator<T> for Filtered<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

/// Case-insensitive substring match against any of `haystacks`. Blank needles match all.
pub fn matches_search<'a>(needle: &str, haystacks: impl IntoIterator<Item = &'a str>) -> bool {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    haystacks
        .into_iter()
        .any(|hay| hay.to_lowercase().contains(&needle))
}

/// Blank and unrecognised values both read as "not set", so a stale link still renders
/// with the default filter.
fn known_or_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let Some(text) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    match text.parse() {
        Ok(value) => Ok(Some(value)),
        Err(err) => {
            debug!("ignoring filter value: {err}");
            Ok(None)
        }
    }
}

fn checkbox<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(checked(Option::<String>::deserialize(deserializer)?.as_deref()))
}

macro_rules! choice {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("unknown {} {other:?}", stringify!($name))),
                }
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                Ok(known_or_none(deserializer)?.unwrap_or_default())
            }
        }
    };
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProgramSort {
    #[default]
    FeaturedFirst,
    Name,
    Deadline,
    Tuition,
}

choice!(ProgramSort {
    FeaturedFirst => "featured",
    Name => "name",
    Deadline => "deadline",
    Tuition => "tuition",
});

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProgramFilter {
    pub search: String,
    #[serde(deserialize_with = "known_or_none")]
    pub level: Option<StudyLevel>,
    #[serde(deserialize_with = "known_or_none")]
    pub country: Option<String>,
    #[serde(deserialize_with = "checkbox")]
    pub featured_only: bool,
    pub sort: ProgramSort,
}

impl ProgramFilter {
    pub fn keeps(&self, program: &Program) -> bool {
        matches_search(
            &self.search,
            [
                program.name.as_str(),
                program.university.as_str(),
                program.field.as_str(),
            ],
        ) && self.level.is_none_or(|level| program.level == level)
            && self
                .country
                .as_deref()
                .is_none_or(|country| program.country.eq_ignore_ascii_case(country))
            && (!self.featured_only || program.featured)
    }

    pub fn apply(&self, programs: &[Program]) -> Filtered<Program> {
        let mut rows: Vec<Program> = programs
            .iter()
            .filter(|program| self.keeps(program))
            .cloned()
            .collect();

        match self.sort {
            ProgramSort::FeaturedFirst => {
                rows.sort_by(|a, b| b.featured.cmp(&a.featured).then_with(|| a.name.cmp(&b.name)))
            }
            ProgramSort::Name => rows.sort_by(|a, b| a.name.cmp(&b.name)),
            ProgramSort::Deadline => rows.sort_by(|a, b| match (a.deadline, b.deadline) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }),
            ProgramSort::Tuition => rows.sort_by(|a, b| a.tuition_floor().total_cmp(&b.tuition_floor())),
        }
        Filtered::from_vec(rows)
    }
}

/// An application next to the program it is for.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationRow {
    pub application: Application,
    pub program: Option<Program>,
}

impl ApplicationRow {
    pub fn join(applications: Vec<Application>, programs: &[Program]) -> Vec<Self> {
        applications
            .into_iter()
            .map(|application| Self {
                program: programs
                    .iter()
                    .find(|p| p.id == application.program_id)
                    .cloned(),
                application,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApplicationTab {
    #[default]
    All,
    Active,
    Approved,
    Rejected,
    Cancelled,
}

choice!(ApplicationTab {
    All => "all",
    Active => "active",
    Approved => "approved",
    Rejected => "rejected",
    Cancelled => "cancelled",
});

impl ApplicationTab {
    pub fn label(self) -> &'static str {
        match self {
            ApplicationTab::All => "All",
            ApplicationTab::Active => "Active",
            ApplicationTab::Approved => "Approved",
            ApplicationTab::Rejected => "Rejected",
            ApplicationTab::Cancelled => "Cancelled",
        }
    }

    pub fn keeps(self, status: ApplicationStatus) -> bool {
        match self {
            ApplicationTab::All => true,
            ApplicationTab::Active => status.is_active(),
            ApplicationTab::Approved => status == ApplicationStatus::Approved,
            ApplicationTab::Rejected => status == ApplicationStatus::Rejected,
            ApplicationTab::Cancelled => status == ApplicationStatus::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ApplicationFilter {
    pub search: String,
    pub tab: ApplicationTab,
}

impl ApplicationFilter {
    pub fn apply(&self, rows: &[ApplicationRow]) -> Filtered<ApplicationRow> {
        rows.iter()
            .filter(|row| self.tab.keeps(row.application.status))
            .filter(|row| {
                let program = row.program.as_ref();
                matches_search(
                    &self.search,
                    [
                        program.map_or("", |p| p.name.as_str()),
                        program.map_or("", |p| p.university.as_str()),
                    ],
                )
            })
            .cloned()
            .collect()
    }
}

/// An appointment with its slot and service, when those still exist.
#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentRow {
    pub appointment: Appointment,
    pub slot: Option<AppointmentSlot>,
    pub service: Option<Service>,
}

impl AppointmentRow {
    pub fn join(
        appointments: Vec<Appointment>,
        slots: &[AppointmentSlot],
        services: &[Service],
    ) -> Vec<Self> {
        appointments
            .into_iter()
            .map(|appointment| Self {
                slot: slots.iter().find(|s| s.id == appointment.slot_id).cloned(),
                service: services
                    .iter()
                    .find(|s| s.id == appointment.service_id)
                    .cloned(),
                appointment,
            })
            .collect()
    }

    pub fn starts_at(&self) -> Option<OffsetDateTime> {
        self.slot.as_ref().map(|slot| slot.starts_at)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AppointmentTab {
    #[default]
    Upcoming,
    Past,
    Cancelled,
}

choice!(AppointmentTab {
    Upcoming => "upcoming",
    Past => "past",
    Cancelled => "cancelled",
});

impl AppointmentTab {
    pub fn label(self) -> &'static str {
        match self {
            AppointmentTab::Upcoming => "Upcoming",
            AppointmentTab::Past => "Past",
            AppointmentTab::Cancelled => "Cancelled",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppointmentFilter {
    pub tab: AppointmentTab,
}

impl AppointmentFilter {
    pub fn keeps(&self, row: &AppointmentRow, now: OffsetDateTime) -> bool {
        let status = row.appointment.status;
        // rows whose slot vanished count as upcoming until the backend says otherwise
        let ahead = row.starts_at().is_none_or(|at| at >= now);
        match self.tab {
            AppointmentTab::Upcoming => status == AppointmentStatus::Scheduled && ahead,
            AppointmentTab::Past => match status {
                AppointmentStatus::Completed => true,
                AppointmentStatus::Scheduled => !ahead,
                AppointmentStatus::Cancelled => false,
            },
            AppointmentTab::Cancelled => status == AppointmentStatus::Cancelled,
        }
    }

    pub fn apply(&self, rows: &[AppointmentRow], now: OffsetDateTime) -> Filtered<AppointmentRow> {
        let mut rows: Vec<AppointmentRow> = rows
            .iter()
            .filter(|row| self.keeps(row, now))
            .cloned()
            .collect();
        match self.tab {
            AppointmentTab::Upcoming => rows.sort_by_key(|row| row.starts_at()),
            AppointmentTab::Past | AppointmentTab::Cancelled => {
                rows.sort_by_key(|row| std::cmp::Reverse(row.starts_at()))
            }
        }
        Filtered::from_vec(rows)
    }
}

fn kind_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeSet<NotificationKind>, D::Error> {
    let text = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
    Ok(text
        .split(',')
        .filter_map(|part| {
            NotificationKind::ALL
                .into_iter()
                .find(|kind| kind.as_str() == part.trim())
        })
        .collect())
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct NotificationFilter {
    /// Empty means every kind.
    #[serde(deserialize_with = "kind_list")]
    pub kinds: BTreeSet<NotificationKind>,
    #[serde(deserialize_with = "checkbox")]
    pub unread_only: bool,
}

impl NotificationFilter {
    pub fn keeps(&self, notification: &Notification) -> bool {
        (self.kinds.is_empty() || self.kinds.contains(&notification.kind))
            && (!self.unread_only || !notification.read)
    }

    pub fn apply(&self, notifications: &[Notification]) -> Filtered<Notification> {
        notifications
            .iter()
            .filter(|n| self.keeps(n))
            .cloned()
            .collect()
    }

    /// The `kinds` query value with `kind` switched on or off.
    pub fn toggled(&self, kind: NotificationKind) -> String {
        let mut kinds = self.kinds.clone();
        if !kinds.remove(&kind) {
            kinds.insert(kind);
        }
        join_kinds(&kinds)
    }

    /// The `kinds` query value as it stands.
    pub fn kinds_param(&self) -> String {
        join_kinds(&self.kinds)
    }
}

fn join_kinds(kinds: &BTreeSet<NotificationKind>) -> String {
    kinds
        .iter()
        .map(|kind| kind.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn unread_count(notifications: &[Notification]) -> usize {
    notifications.iter().filter(|n| !n.read).count()
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PaymentFilter {
    #[serde(deserialize_with = "known_or_none")]
    pub status: Option<PaymentStatus>,
}

impl PaymentFilter {
    pub fn apply(&self, payments: &[Payment]) -> Filtered<Payment> {
        payments
            .iter()
            .filter(|p| self.status.is_none_or(|status| p.status == status))
            .cloned()
            .collect()
    }
}

/// Applications still waiting on a decision, for the overview cards.
pub fn active_applications(applications: &[Application]) -> usize {
    applications
        .iter()
        .filter(|a| a.status.is_active())
        .count()
}

pub fn find_program(programs: &[Program], id: Uuid) -> Option<&Program> {
    programs.iter().find(|p| p.id == id)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::{date, datetime};

    use crate::models::Priority;

    use super::*;

    fn program(name: &str, university: &str, field: &str) -> Program {
        serde_json::from_value(json!({
            "id": Uuid::new_v4(),
            "name": name,
            "university": university,
            "country": "uk",
            "level": "master",
            "field": field,
        }))
        .unwrap()
    }

    fn catalogue() -> Vec<Program> {
        let mut nursing = program("BSc Nursing", "Monash University", "Health");
        nursing.country = "au".to_owned();
        nursing.level = StudyLevel::Bachelor;
        nursing.tuition_min = Some(30000.0);
        nursing.deadline = Some(date!(2027 - 03 - 01));

        let mut data = program("MSc Data Science", "University of Leeds", "Computing");
        data.featured = true;
        data.tuition_min = Some(24000.0);
        data.deadline = Some(date!(2027 - 01 - 15));

        let law = program("LLM International Law", "King's College London", "Law");

        vec![nursing, data, law]
    }

    fn names(filtered: &Filtered<Program>) -> Vec<&str> {
        filtered.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn blank_search_matches_everything() {
        assert!(matches_search("", ["anything"]));
        assert!(matches_search("   ", ["anything"]));
        assert!(matches_search("LEEDS", ["University of Leeds"]));
        assert!(!matches_search("oxford", ["University of Leeds"]));
    }

    #[test]
    fn empty_filter_keeps_all_programs_featured_first() {
        let programs = catalogue();
        let filtered = ProgramFilter::default().apply(&programs);
        assert_eq!(filtered.len(), programs.len());
        assert_eq!(names(&filtered)[0], "MSc Data Science");
    }

    #[test]
    fn search_covers_name_university_and_field() {
        let programs = catalogue();
        let search = |text: &str| ProgramFilter {
            search: text.to_owned(),
            ..Default::default()
        };

        assert_eq!(names(&search("nursing").apply(&programs)), ["BSc Nursing"]);
        assert_eq!(names(&search("king's").apply(&programs)), ["LLM International Law"]);
        assert_eq!(names(&search("computing").apply(&programs)), ["MSc Data Science"]);
        assert_eq!(search("astrophysics").apply(&programs), Filtered::NoResults);
    }

    #[test]
    fn category_filters_combine() {
        let programs = catalogue();
        let filter = ProgramFilter {
            country: Some("UK".to_owned()),
            featured_only: true,
            ..Default::default()
        };
        assert_eq!(names(&filter.apply(&programs)), ["MSc Data Science"]);

        let filter = ProgramFilter {
            level: Some(StudyLevel::Phd),
            ..Default::default()
        };
        assert!(filter.apply(&programs).is_empty());
    }

    #[test]
    fn deadline_sort_puts_missing_last() {
        let programs = catalogue();
        let filter = ProgramFilter {
            sort: ProgramSort::Deadline,
            ..Default::default()
        };
        assert_eq!(
            names(&filter.apply(&programs)),
            ["MSc Data Science", "BSc Nursing", "LLM International Law"]
        );

        let filter = ProgramFilter {
            sort: ProgramSort::Tuition,
            ..Default::default()
        };
        assert_eq!(names(&filter.apply(&programs))[2], "LLM International Law");
    }

    #[test]
    fn filters_read_blank_query_controls_as_unset() {
        let filter: ProgramFilter = serde_json::from_value(json!({
            "search": "law",
            "level": "",
            "country": " ",
            "featured_only": "on",
            "sort": ""
        }))
        .unwrap();
        assert_eq!(filter.level, None);
        assert_eq!(filter.country, None);
        assert!(filter.featured_only);
        assert_eq!(filter.sort, ProgramSort::FeaturedFirst);

        let filter: NotificationFilter =
            serde_json::from_value(json!({ "kinds": "payment,bogus,message" })).unwrap();
        assert_eq!(
            filter.kinds,
            BTreeSet::from([NotificationKind::Payment, NotificationKind::Message])
        );
    }

    #[test]
    fn unknown_query_values_fall_back_to_defaults() {
        let filter: ApplicationFilter =
            serde_json::from_value(json!({ "tab": "bogus", "search": "leeds" })).unwrap();
        assert_eq!(filter.tab, ApplicationTab::default());
        assert_eq!(filter.search, "leeds");

        let filter: ProgramFilter =
            serde_json::from_value(json!({ "sort": "price", "level": "postdoc", "country": "uk" }))
                .unwrap();
        assert_eq!(filter.sort, ProgramSort::FeaturedFirst);
        assert_eq!(filter.level, None);
        assert_eq!(filter.country.as_deref(), Some("uk"));
    }

    fn application(program_id: Uuid, status: ApplicationStatus) -> Application {
        Application {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            program_id,
            status,
            submitted_at: None,
            priority: Priority::Normal,
            notes: None,
        }
    }

    #[test]
    fn application_tabs_and_search() {
        let programs = catalogue();
        let rows = ApplicationRow::join(
            vec![
                application(programs[0].id, ApplicationStatus::Draft),
                application(programs[1].id, ApplicationStatus::InReview),
                application(programs[2].id, ApplicationStatus::Rejected),
            ],
            &programs,
        );

        let tab = |tab| ApplicationFilter {
            search: String::new(),
            tab,
        };
        assert_eq!(tab(ApplicationTab::All).apply(&rows).len(), 3);
        assert_eq!(tab(ApplicationTab::Active).apply(&rows).len(), 2);
        assert_eq!(tab(ApplicationTab::Rejected).apply(&rows).len(), 1);
        assert_eq!(tab(ApplicationTab::Approved).apply(&rows), Filtered::NoResults);

        let filter = ApplicationFilter {
            search: "leeds".to_owned(),
            tab: ApplicationTab::Active,
        };
        let found = filter.apply(&rows);
        assert_eq!(found.len(), 1);
        assert_eq!(
            found.iter().next().unwrap().application.status,
            ApplicationStatus::InReview
        );
    }

    #[test]
    fn appointment_tabs_follow_the_clock() {
        let now = datetime!(2026-10-15 12:00 UTC);
        let slot = |at| AppointmentSlot {
            id: Uuid::new_v4(),
            service_id: Uuid::nil(),
            starts_at: at,
            max_bookings: 1,
            current_bookings: 1,
        };
        let row = |slot: &AppointmentSlot, status| AppointmentRow {
            appointment: Appointment {
                id: Uuid::new_v4(),
                user_id: Uuid::nil(),
                slot_id: slot.id,
                service_id: Uuid::nil(),
                status,
                notes: None,
                created_at: None,
            },
            slot: Some(slot.clone()),
            service: None,
        };

        let tomorrow = slot(datetime!(2026-10-16 9:00 UTC));
        let yesterday = slot(datetime!(2026-10-14 9:00 UTC));
        let rows = vec![
            row(&tomorrow, AppointmentStatus::Scheduled),
            row(&yesterday, AppointmentStatus::Scheduled),
            row(&tomorrow, AppointmentStatus::Cancelled),
        ];

        let tab = |tab| AppointmentFilter { tab };
        assert_eq!(tab(AppointmentTab::Upcoming).apply(&rows, now).len(), 1);
        assert_eq!(tab(AppointmentTab::Past).apply(&rows, now).len(), 1);
        assert_eq!(tab(AppointmentTab::Cancelled).apply(&rows, now).len(), 1);
    }

    #[test]
    fn notification_kinds_and_unread() {
        let notification = |kind, read| Notification {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            kind,
            title: "t".to_owned(),
            body: None,
            read,
            created_at: None,
        };
        let list = vec![
            notification(NotificationKind::Payment, false),
            notification(NotificationKind::Payment, true),
            notification(NotificationKind::Message, false),
        ];

        assert_eq!(NotificationFilter::default().apply(&list).len(), 3);
        assert_eq!(unread_count(&list), 2);

        let filter = NotificationFilter {
            kinds: BTreeSet::from([NotificationKind::Payment]),
            unread_only: true,
        };
        assert_eq!(filter.apply(&list).len(), 1);
        assert_eq!(filter.toggled(NotificationKind::Message), "payment,message");
        assert_eq!(filter.toggled(NotificationKind::Payment), "");

        let filter = NotificationFilter {
            kinds: BTreeSet::from([NotificationKind::System]),
            unread_only: false,
        };
        assert_eq!(filter.apply(&list), Filtered::NoResults);
    }
}
