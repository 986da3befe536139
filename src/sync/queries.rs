use serde_json::json;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    gateway::Query,
    models::{
        Application, Appointment, AppointmentSlot, Chat, ChatMessage, ConsultationRecord,
        DestinationStats, Notification, Payment, Program, Service, UserProfile, timestamp,
    },
};

use super::{Call, One, Rows};

/// Tag for one user's rows of `table`.
pub fn user_tag(table: &str, user_id: Uuid) -> String {
    format!("{table}:{user_id}")
}

pub fn programs() -> Rows<Program> {
    Rows::new("programs", Query::table("programs").order("name", true))
}

/// Programs whose name, university or field contain `search`; all of them when blank.
pub fn programs_matching(search: &str) -> Rows<Program> {
    Rows::new(
        "programs",
        Query::table("programs")
            .search(&["name", "university", "field"], search)
            .order("name", true),
    )
}

pub fn featured_programs(limit: usize) -> Rows<Program> {
    Rows::new(
        "featured programs",
        Query::table("programs")
            .eq("featured", true)
            .order("deadline", true)
            .limit(limit),
    )
}

pub fn programs_in(country: &str) -> Rows<Program> {
    Rows::new(
        "programs",
        Query::table("programs")
            .eq("country", country)
            .order("name", true),
    )
}

pub fn programs_by_id(ids: &[Uuid]) -> Rows<Program> {
    Rows::new(
        "programs",
        Query::table("programs").any_of("id", ids.iter().map(Uuid::to_string)),
    )
}

pub fn program(id: Uuid) -> One<Program> {
    One::new("program", Query::table("programs").eq("id", id.to_string()))
}

pub fn applications(user_id: Uuid) -> Rows<Application> {
    Rows::new(
        "applications",
        Query::table("applications")
            .eq("user_id", user_id.to_string())
            .order("created_at", false),
    )
    .tag(user_tag("applications", user_id))
}

pub fn appointments(user_id: Uuid) -> Rows<Appointment> {
    Rows::new(
        "appointments",
        Query::table("appointments")
            .eq("user_id", user_id.to_string())
            .order("created_at", false),
    )
    .tag(user_tag("appointments", user_id))
}

/// Slots that have not started yet.
pub fn upcoming_slots(now: OffsetDateTime) -> Rows<AppointmentSlot> {
    Rows::new(
        "appointment slots",
        Query::table("appointment_slots")
            .gt("starts_at", timestamp::to_text(now))
            .order("starts_at", true),
    )
    .live()
}

pub fn slots_by_id(ids: &[Uuid]) -> Rows<AppointmentSlot> {
    Rows::new(
        "appointment slots",
        Query::table("appointment_slots").any_of("id", ids.iter().map(Uuid::to_string)),
    )
    .live()
}

pub fn services() -> Rows<Service> {
    Rows::new("services", Query::table("services").order("name", true))
}

pub fn profile(user_id: Uuid) -> One<UserProfile> {
    One::new(
        "your profile",
        Query::table("profiles").eq("id", user_id.to_string()),
    )
    .tag(user_tag("profiles", user_id))
}

pub fn payments(user_id: Uuid) -> Rows<Payment> {
    Rows::new(
        "payments",
        Query::table("payments")
            .eq("user_id", user_id.to_string())
            .order("created_at", false),
    )
    .tag(user_tag("payments", user_id))
}

pub fn notifications(user_id: Uuid) -> Rows<Notification> {
    Rows::new(
        "notifications",
        Query::table("notifications")
            .eq("user_id", user_id.to_string())
            .order("created_at", false),
    )
    .tag(user_tag("notifications", user_id))
}

pub fn chats(user_id: Uuid) -> Rows<Chat> {
    Rows::new(
        "conversations",
        Query::table("chats")
            .eq("client_id", user_id.to_string())
            .order("last_message_at", false),
    )
    .tag(user_tag("chats", user_id))
}

/// Every conversation, for advisors.
pub fn all_chats() -> Rows<Chat> {
    Rows::new(
        "conversations",
        Query::table("chats").order("last_message_at", false),
    )
}

pub fn chat(chat_id: Uuid) -> One<Chat> {
    One::new("conversation", Query::table("chats").eq("id", chat_id.to_string()))
}

/// Latest messages of a chat, newest first.
pub fn recent_messages(chat_id: Uuid, limit: usize) -> Rows<ChatMessage> {
    Rows::new(
        "messages",
        Query::table("messages")
            .eq("chat_id", chat_id.to_string())
            .order("created_at", false)
            .limit(limit),
    )
    .live()
}

pub fn consultations(user_id: Uuid) -> Rows<ConsultationRecord> {
    Rows::new(
        "consultations",
        Query::table("consultations")
            .eq("user_id", user_id.to_string())
            .order("created_at", false),
    )
    .tag(user_tag("consultations", user_id))
}

pub fn consultation(id: Uuid) -> One<ConsultationRecord> {
    One::new(
        "consultation",
        Query::table("consultations").eq("id", id.to_string()),
    )
}

pub fn destination_stats() -> Call<Vec<DestinationStats>> {
    Call::new("destination statistics", "destination_stats", json!({})).tag("programs")
}
