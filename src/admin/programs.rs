use std::sync::Arc;

use axum::{
    Form, debug_handler,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::info;
use uuid::Uuid;

use crate::{
    AppResult, AppState,
    dashboard::{as_user, refused},
    gateway::{self, Gateway},
    include_res,
    models::{DESTINATIONS, Program, ProgramForm, StudyLevel, date},
    res,
    session::Admin,
    sync::{Loader, QueryCache, Resource, filter::find_program, queries},
    toast::{self, Toast},
};

use super::shell;

const BACK: &str = "/admin/programs";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct EditQuery {
    edit: Option<Uuid>,
}

fn row(program: &Program) -> String {
    format!(
        r#"<tr><td><a href="/programs/{id}">{}</a></td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td><a href="{BACK}?edit={id}">Edit</a><form method="post" action="{BACK}/{id}/delete"><button class="link danger">Delete</button></form></td></tr>"#,
        res::escape(&program.name),
        res::escape(&program.university),
        res::escape(&program.country),
        program.level.label(),
        if program.featured { "Yes" } else { "" },
        id = program.id,
    )
}

fn form(program: Option<&Program>) -> String {
    let value = |f: fn(&Program) -> String| program.map(f).map(|v| res::escape(&v)).unwrap_or_default();
    let action = match program {
        Some(p) => format!("{BACK}/{}", p.id),
        None => BACK.to_owned(),
    };

    include_res!(str, "/pages/admin/program_form.html")
        .replace("{heading}", if program.is_some() { "Edit program" } else { "New program" })
        .replace("{action}", &action)
        .replace("{name}", &value(|p| p.name.clone()))
        .replace("{university}", &value(|p| p.university.clone()))
        .replace(
            "{countries}",
            &res::options(program.map(|p| p.country.as_str()), DESTINATIONS.iter().map(|d| (d.code, d.name))),
        )
        .replace("{location}", &value(|p| p.location.clone()))
        .replace(
            "{levels}",
            &res::options(
                program.map(|p| p.level.as_str()),
                StudyLevel::ALL.iter().map(|l| (l.as_str(), l.label())),
            ),
        )
        .replace("{field}", &value(|p| p.field.clone()))
        .replace("{duration_months}", &value(|p| p.duration_months.map(|d| d.to_string()).unwrap_or_default()))
        .replace("{tuition_min}", &value(|p| p.tuition_min.map(|t| t.to_string()).unwrap_or_default()))
        .replace("{tuition_max}", &value(|p| p.tuition_max.map(|t| t.to_string()).unwrap_or_default()))
        .replace("{currency}", &value(|p| p.currency.clone()))
        .replace("{language}", &value(|p| p.language.clone()))
        .replace("{deadline}", &value(|p| p.deadline.map(date::display).unwrap_or_default()))
        .replace("{featured}", res::checked_attr(program.is_some_and(|p| p.featured)))
        .replace("{description}", &value(|p| p.description.clone().unwrap_or_default()))
}

#[debug_handler(state = AppState)]
pub(crate) async fn programs(
    Admin(user): Admin,
    Query(query): Query<EditQuery>,
    State(gateway): State<Arc<dyn Gateway>>,
    State(cache): State<Arc<QueryCache>>,
    session: Session,
) -> AppResult<Response> {
    let gateway = as_user(&gateway, &user);
    let mut toasts = toast::take(&session).await?;
    let mut loader = Loader::new(&*gateway, &cache, &mut toasts);

    let programs = Resource::mount(queries::programs(), &mut loader).await;
    let editing = query.edit.and_then(|id| find_program(&programs.data, id));

    let table = match programs.data.as_slice() {
        [] => res::empty("No programs yet."),
        rows => format!(
            "<table><thead><tr><th>Name</th><th>University</th><th>Country</th><th>Level</th><th>Featured</th><th></th></tr></thead><tbody>{}</tbody></table>",
            rows.iter().map(row).collect::<String>()
        ),
    };
    let content = format!("<h1>Programs</h1>{}{table}", form(editing));
    Ok(res::page("Manage programs", Some(&user), &toasts, &shell(BACK, &content)).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn create(
    Admin(user): Admin,
    State(gateway): State<Arc<dyn Gateway>>,
    State(cache): State<Arc<QueryCache>>,
    session: Session,
    Form(form): Form<ProgramForm>,
) -> AppResult<Response> {
    let fields = match form.validate() {
        Ok(fields) => fields,
        Err(err) => return refused(&session, "Program not saved", err, BACK).await,
    };

    let gateway = as_user(&gateway, &user);
    let stored: Program = match gateway::insert(&*gateway, "programs", &fields).await {
        Ok(stored) => stored,
        Err(err) => return refused(&session, "Program not saved", err, BACK).await,
    };

    info!("u/{} added program {}", user.id, stored.id);
    cache.invalidate("programs");
    toast::redirect(&session, Toast::success(format!("Added {}", stored.name)), BACK).await
}

#[debug_handler(state = AppState)]
pub(crate) async fn update(
    Admin(user): Admin,
    Path(id): Path<Uuid>,
    State(gateway): State<Arc<dyn Gateway>>,
    State(cache): State<Arc<QueryCache>>,
    session: Session,
    Form(form): Form<ProgramForm>,
) -> AppResult<Response> {
    let back = format!("{BACK}?edit={id}");
    let fields = match form.validate() {
        Ok(fields) => fields,
        Err(err) => return refused(&session, "Program not saved", err, &back).await,
    };

    let gateway = as_user(&gateway, &user);
    let query = gateway::Query::table("programs").eq("id", id.to_string());
    if let Err(err) = gateway::update(&*gateway, &query, &fields).await {
        return refused(&session, "Program not saved", err, &back).await;
    }

    info!("u/{} updated program {id}", user.id);
    cache.invalidate("programs");
    toast::redirect(&session, Toast::success(format!("Saved {}", fields.name)), BACK).await
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
    let query = gateway::Query::table("programs").eq("id", id.to_string());
    if let Err(err) = gateway.delete(&query).await {
        return refused(&session, "Program not deleted", err, BACK).await;
    }

    info!("u/{} deleted program {id}", user.id);
    cache.invalidate("programs");
    toast::redirect(&session, Toast::success("Program deleted"), BACK).await
}
