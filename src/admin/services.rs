use std::sync::Arc;

use axum::{
    Form, debug_handler,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use tracing::info;
use uuid::Uuid;

use crate::{
    AppResult, AppState,
    dashboard::{as_user, refused},
    gateway::{self, Gateway},
    include_res,
    models::{Money, Service, ServiceForm},
    res,
    session::Admin,
    sync::{Loader, QueryCache, Resource, queries},
    toast::{self, Toast},
};

use super::shell;

const BACK: &str = "/admin/services";

fn row(service: &Service) -> String {
    format!(
        r#"<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td><form method="post" action="{BACK}/{}/delete"><button class="link danger">Delete</button></form></td></tr>"#,
        res::escape(&service.name),
        service.duration_minutes.map(|m| format!("{m} min")).unwrap_or_else(|| "-".to_owned()),
        service.price.map(|p| Money(p, "USD").to_string()).unwrap_or_else(|| "Free".to_owned()),
        res::or_dash(service.description.as_deref()),
        service.id,
    )
}

#[debug_handler(state = AppState)]
pub(crate) async fn services(
    Admin(user): Admin,
    State(gateway): State<Arc<dyn Gateway>>,
    State(cache): State<Arc<QueryCache>>,
    session: Session,
) -> AppResult<Response> {
    let gateway = as_user(&gateway, &user);
    let mut toasts = toast::take(&session).await?;
    let mut loader = Loader::new(&*gateway, &cache, &mut toasts);

    let services = Resource::mount(queries::services(), &mut loader).await;

    let table = match services.data.as_slice() {
        [] => res::empty("No services yet."),
        rows => format!(
            "<table><thead><tr><th>Name</th><th>Length</th><th>Price</th><th>Description</th><th></th></tr></thead><tbody>{}</tbody></table>",
            rows.iter().map(row).collect::<String>()
        ),
    };
    let content = include_res!(str, "/pages/admin/services.html")
        .replace("{action}", BACK)
        .replace("{table}", &table);
    Ok(res::page("Manage services", Some(&user), &toasts, &shell(BACK, &content)).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn create(
    Admin(user): Admin,
    State(gateway): State<Arc<dyn Gateway>>,
    State(cache): State<Arc<QueryCache>>,
    session: Session,
    Form(form): Form<ServiceForm>,
) -> AppResult<Response> {
    let fields = match form.validate() {
        Ok(fields) => fields,
        Err(err) => return refused(&session, "Service not saved", err, BACK).await,
    };

    let gateway = as_user(&gateway, &user);
    let stored: Service = match gateway::insert(&*gateway, "services", &fields).await {
        Ok(stored) => stored,
        Err(err) => return refused(&session, "Service not saved", err, BACK).await,
    };

    info!("u/{} added service {}", user.id, stored.id);
    cache.invalidate("services");
    toast::redirect(&session, Toast::success(format!("Added {}", stored.name)), BACK).await
}

#[debug_handler(state = AppState)]
pub(crate) async fn delete(
    Admin(user): Admin,
    Path(id): Path<Uuid>,
    State(gateway): State<Arc<dyn Gateway>>,
    State(cache): State<Arc<QueryCache>>,
    session: Session,
) -> AppResult<Response> {
    let gateway = as_user(&gateway, &user);
    let query = gateway::Query::table("services").eq("id", id.to_string());
    if let Err(err) = gateway.delete(&query).await {
        return refused(&session, "Service not deleted", err, BACK).await;
    }

    info!("u/{} deleted service {id}", user.id);
    cache.invalidate("services");
    toast::redirect(&session, Toast::success("Service deleted"), BACK).await
}
