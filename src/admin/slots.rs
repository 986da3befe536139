use std::sync::Arc;

use axum::{
    Form, debug_handler,
    extract::State,
    response::{IntoResponse, Response},
};
use time::OffsetDateTime;
use tower_sessions::Session;
use tracing::info;

use crate::{
    AppResult, AppState,
    dashboard::{as_user, refused},
    gateway::{self, Gateway},
    include_res,
    models::{AppointmentSlot, Service, SlotForm, timestamp},
    res,
    session::Admin,
    sync::{Loader, QueryCache, Resource, queries},
    toast::{self, Toast},
};

use super::shell;

const BACK: &str = "/admin/slots";

fn row(slot: &AppointmentSlot, services: &[Service]) -> String {
    let service = services
        .iter()
        .find(|s| s.id == slot.service_id)
        .map(|s| res::escape(&s.name))
        .unwrap_or_else(|| "-".to_owned());
    format!(
        "<tr><td>{}</td><td>{service}</td><td>{} / {}</td></tr>",
        timestamp::display(slot.starts_at),
        slot.current_bookings,
        slot.max_bookings,
    )
}

#[debug_handler(state = AppState)]
pub(crate) async fn slots(
    Admin(user): Admin,
    State(gateway): State<Arc<dyn Gateway>>,
    State(cache): State<Arc<QueryCache>>,
    session: Session,
) -> AppResult<Response> {
    let gateway = as_user(&gateway, &user);
    let mut toasts = toast::take(&session).await?;
    let mut loader = Loader::new(&*gateway, &cache, &mut toasts);

    let now = OffsetDateTime::now_utc();
    let slots = Resource::mount(queries::upcoming_slots(now), &mut loader).await;
    let services = Resource::mount(queries::services(), &mut loader).await;

    let table = match slots.data.as_slice() {
        [] => res::empty("No upcoming slots."),
        rows => format!(
            "<table><thead><tr><th>Starts</th><th>Service</th><th>Booked</th></tr></thead><tbody>{}</tbody></table>",
            rows.iter().map(|slot| row(slot, &services.data)).collect::<String>()
        ),
    };
    let ids: Vec<String> = services.data.iter().map(|s| s.id.to_string()).collect();
    let choices = res::options(
        None,
        ids.iter()
            .zip(&services.data)
            .map(|(id, service)| (id.as_str(), service.name.as_str())),
    );
    let content = include_res!(str, "/pages/admin/slots.html")
        .replace("{action}", BACK)
        .replace("{services}", &choices)
        .replace("{table}", &table);
    Ok(res::page("Manage slots", Some(&user), &toasts, &shell(BACK, &content)).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn create(
    Admin(user): Admin,
    State(gateway): State<Arc<dyn Gateway>>,
    session: Session,
    Form(form): Form<SlotForm>,
) -> AppResult<Response> {
    let slot = match form.validate() {
        Ok(slot) => slot,
        Err(err) => return refused(&session, "Slot not saved", err, BACK).await,
    };

    let gateway = as_user(&gateway, &user);
    let stored: AppointmentSlot = match gateway::insert(&*gateway, "appointment_slots", &slot).await {
        Ok(stored) => stored,
        Err(err) => return refused(&session, "Slot not saved", err, BACK).await,
    };

    info!("u/{} opened slot {}", user.id, stored.id);
    let title = format!("Slot opened for {}", timestamp::display(stored.starts_at));
    toast::redirect(&session, Toast::success(title), BACK).await
}
