use std::sync::Arc;

use axum::{
    Form, debug_handler,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde_json::json;
use time::OffsetDateTime;
use tower_sessions::Session;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    AppResult, AppState,
    gateway::{self, Gateway},
    include_res,
    models::{
        Appointment, AppointmentSlot, AppointmentStatus, BookingForm, BookingWindow,
        NewAppointment, Service, date, filled, timestamp,
    },
    res,
    session::CurrentUser,
    sync::{
        Fetch, Loader, QueryCache, Resource,
        filter::{AppointmentFilter, AppointmentRow, AppointmentTab, Filtered},
        queries,
    },
    toast::{self, Toast},
};

use super::{as_user, refused, shell};

const BACK: &str = "/dashboard/appointments";

fn tabs(filter: &AppointmentFilter) -> String {
    AppointmentTab::ALL
        .iter()
        .map(|tab| {
            let class = if *tab == filter.tab { r#" class="active""# } else { "" };
            format!(r#"<a href="{BACK}?tab={}"{class}>{}</a>"#, tab.as_str(), tab.label())
        })
        .collect()
}

fn service_name(service: Option<&Service>) -> String {
    service
        .map(|s| res::escape(&s.name))
        .unwrap_or_else(|| "Consultation".to_owned())
}

fn row(row: &AppointmentRow) -> String {
    let appointment = &row.appointment;
    let cancel = if appointment.status == AppointmentStatus::Scheduled {
        format!(
            r#"<form method="post" action="{BACK}/{}/cancel"><button class="link">Cancel</button></form>"#,
            appointment.id
        )
    } else {
        String::new()
    };
    format!(
        r#"<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{cancel}</td></tr>"#,
        service_name(row.service.as_ref()),
        row.starts_at().map(timestamp::display).unwrap_or_else(|| "-".to_owned()),
        appointment.status.label(),
        res::or_dash(appointment.notes.as_deref()),
    )
}

/// Bookable slots, grouped under their date.
fn slot_choices(
    slots: &[AppointmentSlot],
    services: &[Service],
    window: BookingWindow,
    now: OffsetDateTime,
) -> String {
    let open: Vec<&AppointmentSlot> = slots
        .iter()
        .filter(|slot| slot.is_bookable(window, now))
        .collect();
    if open.is_empty() {
        return res::empty("No open slots in the next two months.");
    }

    let mut html = String::new();
    let mut day = None;
    for slot in open {
        if day != Some(slot.date()) {
            if day.is_some() {
                html.push_str("</fieldset>");
            }
            day = Some(slot.date());
            html.push_str(&format!("<fieldset><legend>{}</legend>", date::display(slot.date())));
        }
        let service = services.iter().find(|s| s.id == slot.service_id);
        html.push_str(&format!(
            r#"<label><input type="radio" name="slot_id" value="{}"> {:02}:{:02} {} <span class="muted">({} left)</span></label>"#,
            slot.id,
            slot.starts_at.hour(),
            slot.starts_at.minute(),
            service_name(service),
            slot.remaining(),
        ));
    }
    html.push_str("</fieldset>");
    html
}

#[debug_handler(state = AppState)]
pub(crate) async fn appointments(
    user: CurrentUser,
    Query(filter): Query<AppointmentFilter>,
    State(gateway): State<Arc<dyn Gateway>>,
    State(cache): State<Arc<QueryCache>>,
    session: Session,
) -> AppResult<Response> {
    let now = OffsetDateTime::now_utc();
    let window = BookingWindow::from_today(now.date());

    let gateway = as_user(&gateway, &user);
    let mut toasts = toast::take(&session).await?;
    let mut loader = Loader::new(&*gateway, &cache, &mut toasts);

    let appointments = Resource::mount(queries::appointments(user.id), &mut loader).await;
    let services = Resource::mount(queries::services(), &mut loader).await;
    let open = Resource::mount(queries::upcoming_slots(now), &mut loader).await;

    let slot_ids: Vec<Uuid> = appointments.data.iter().map(|a| a.slot_id).collect();
    let booked = match slot_ids.is_empty() {
        true => Vec::new(),
        false => Resource::mount(queries::slots_by_id(&slot_ids), &mut loader)
            .await
            .into_data(),
    };

    let rows = AppointmentRow::join(appointments.into_data(), &booked, &services.data);
    let table = match filter.apply(&rows, now) {
        Filtered::Rows(rows) => format!(
            "<table><thead><tr><th>Service</th><th>When</th><th>Status</th><th>Notes</th><th></th></tr></thead><tbody>{}</tbody></table>",
            rows.iter().map(row).collect::<String>()
        ),
        Filtered::NoResults => res::empty("No appointments here."),
    };

    let content = include_res!(str, "/pages/dashboard/appointments.html")
        .replace("{tabs}", &tabs(&filter))
        .replace("{table}", &table)
        .replace("{action}", BACK)
        .replace("{slots}", &slot_choices(&open.data, &services.data, window, now))
        .replace("{from}", &date::display(window.start))
        .replace("{until}", &date::display(window.end));

    Ok(res::page("Appointments", Some(&user), &toasts, &shell(BACK, &content)).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn book_appointment(
    user: CurrentUser,
    State(gateway): State<Arc<dyn Gateway>>,
    State(cache): State<Arc<QueryCache>>,
    session: Session,
    Form(form): Form<BookingForm>,
) -> AppResult<Response> {
    let now = OffsetDateTime::now_utc();
    let gateway = as_user(&gateway, &user);

    let slots = match queries::upcoming_slots(now).fetch(&*gateway).await {
        Ok(slots) => slots,
        Err(err) => return refused(&session, "Appointment not booked", err, BACK).await,
    };
    let slot = match form.validate(&slots, now) {
        Ok(slot) => slot,
        Err(err) => return refused(&session, "Appointment not booked", err, BACK).await,
    };

    let booking = NewAppointment {
        user_id: user.id,
        slot_id: slot.id,
        service_id: slot.service_id,
        status: AppointmentStatus::Scheduled,
        notes: filled(form.notes.as_deref()),
    };
    let stored: Appointment = match gateway::insert(&*gateway, "appointments", &booking).await {
        Ok(stored) => stored,
        Err(err) => return refused(&session, "Appointment not booked", err, BACK).await,
    };
    cache.invalidate(&queries::user_tag("appointments", user.id));
    info!("u/{} booked slot {} as {}", user.id, slot.id, stored.id);

    // the booking stands even if the counter update is refused
    let counter = gateway::Query::table("appointment_slots").eq("id", slot.id.to_string());
    let bumped = json!({ "current_bookings": slot.current_bookings + 1 });
    if let Err(err) = gateway::update(&*gateway, &counter, &bumped).await {
        warn!("slot {} booked but its count was not updated: {err}", slot.id);
        return toast::redirect(
            &session,
            Toast::destructive(
                "Appointment booked, but the slot could not be updated",
                "Your booking is saved. An advisor will confirm the time.",
            ),
            BACK,
        )
        .await;
    }

    let when = format!("Appointment booked for {}", timestamp::display(slot.starts_at));
    toast::redirect(&session, Toast::success(when), BACK).await
}

#[debug_handler(state = AppState)]
pub(crate) async fn cancel_appointment(
    user: CurrentUser,
    Path(id): Path<Uuid>,
    State(gateway): State<Arc<dyn Gateway>>,
    State(cache): State<Arc<QueryCache>>,
    session: Session,
) -> AppResult<Response> {
    let query = gateway::Query::table("appointments")
        .eq("id", id.to_string())
        .eq("user_id", user.id.to_string())
        .eq("status", "scheduled");

    let gateway = as_user(&gateway, &user);
    match gateway::update(&*gateway, &query, &json!({ "status": AppointmentStatus::Cancelled })).await {
        Ok(_) => {}
        Err(err) if err.is_not_found() => {
            return refused(
                &session,
                "Appointment not cancelled",
                "This appointment is no longer scheduled",
                BACK,
            )
            .await;
        }
        Err(err) => return refused(&session, "Appointment not cancelled", err, BACK).await,
    }

    info!("u/{} cancelled appointment {id}", user.id);
    cache.invalidate(&queries::user_tag("appointments", user.id));
    toast::redirect(&session, Toast::success("Appointment cancelled"), BACK).await
}
