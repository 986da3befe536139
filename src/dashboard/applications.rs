use std::sync::Arc;

use axum::{
    Form, debug_handler,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;
use tower_sessions::Session;
use tracing::info;
use uuid::Uuid;

use crate::{
    AppResult, AppState,
    gateway::{self, Gateway},
    include_res,
    models::{Application, ApplicationStatus, NewApplicationForm, Priority, Program, timestamp},
    res,
    session::CurrentUser,
    sync::{
        Loader, QueryCache, Resource,
        filter::{ApplicationFilter, ApplicationRow, ApplicationTab, Filtered},
        queries,
    },
    toast::{self, Toast},
};

use super::{as_user, refused, shell};

const BACK: &str = "/dashboard/applications";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Preselect {
    program: Option<Uuid>,
}

fn tabs(filter: &ApplicationFilter) -> String {
    ApplicationTab::ALL
        .iter()
        .map(|tab| {
            let class = if *tab == filter.tab { r#" class="active""# } else { "" };
            format!(
                r#"<a href="{BACK}?tab={}&search={}"{class}>{}</a>"#,
                tab.as_str(),
                res::escape(&res::encode(&filter.search)),
                tab.label()
            )
        })
        .collect()
}

fn row(row: &ApplicationRow) -> String {
    let app = &row.application;
    let (program, university) = match &row.program {
        Some(p) => (res::escape(&p.name), res::escape(&p.university)),
        None => ("Unknown program".to_owned(), String::new()),
    };
    let cancel = if app.status.can_cancel() {
        format!(
            r#"<form method="post" action="{BACK}/{}/cancel"><button class="link">Cancel</button></form>"#,
            app.id
        )
    } else {
        String::new()
    };

    format!(
        r#"<tr><td>{program}<br><span class="muted">{university}</span></td><td><span class="status {}">{}</span></td><td>{}</td><td>{}</td><td>{cancel}</td></tr>"#,
        app.status.as_str(),
        app.status.label(),
        app.priority.label(),
        app.submitted_at.map(timestamp::display).unwrap_or_else(|| "-".to_owned()),
    )
}

fn table(rows: Filtered<ApplicationRow>) -> String {
    match rows {
        Filtered::Rows(rows) => format!(
            r#"<table><thead><tr><th>Program</th><th>Status</th><th>Priority</th><th>Submitted</th><th></th></tr></thead><tbody>{}</tbody></table>"#,
            rows.iter().map(row).collect::<String>()
        ),
        Filtered::NoResults => res::empty("No applications match."),
    }
}

fn new_form(programs: &[Program], preselect: Option<Uuid>) -> String {
    let selected = preselect.map(|id| id.to_string());
    let labels: Vec<(String, String)> = programs
        .iter()
        .map(|p| (p.id.to_string(), format!("{} ({})", p.name, p.university)))
        .collect();
    let programs = res::options(
        selected.as_deref(),
        labels.iter().map(|(id, label)| (id.as_str(), label.as_str())),
    );
    let priorities = res::options(
        Some(Priority::default().as_str()),
        Priority::ALL.iter().map(|p| (p.as_str(), p.label())),
    );

    include_res!(str, "/pages/dashboard/new_application.html")
        .replace("{action}", BACK)
        .replace("{programs}", &programs)
        .replace("{priorities}", &priorities)
}

#[debug_handler(state = AppState)]
pub(crate) async fn applications(
    user: CurrentUser,
    Query(filter): Query<ApplicationFilter>,
    Query(preselect): Query<Preselect>,
    State(gateway): State<Arc<dyn Gateway>>,
    State(cache): State<Arc<QueryCache>>,
    session: Session,
) -> AppResult<Response> {
    let gateway = as_user(&gateway, &user);
    let mut toasts = toast::take(&session).await?;
    let mut loader = Loader::new(&*gateway, &cache, &mut toasts);

    let applications = Resource::mount(queries::applications(user.id), &mut loader).await;
    let programs = Resource::mount(queries::programs(), &mut loader).await;

    let rows = ApplicationRow::join(applications.into_data(), &programs.data);
    let content = include_res!(str, "/pages/dashboard/applications.html")
        .replace("{tabs}", &tabs(&filter))
        .replace("{tab}", filter.tab.as_str())
        .replace("{search}", &res::escape(&filter.search))
        .replace("{table}", &table(filter.apply(&rows)))
        .replace("{form}", &new_form(&programs.data, preselect.program));

    Ok(res::page("Applications", Some(&user), &toasts, &shell(BACK, &content)).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn new_application(
    user: CurrentUser,
    State(gateway): State<Arc<dyn Gateway>>,
    State(cache): State<Arc<QueryCache>>,
    session: Session,
    Form(form): Form<NewApplicationForm>,
) -> AppResult<Response> {
    let application = match form.validate(user.id, OffsetDateTime::now_utc()) {
        Ok(application) => application,
        Err(err) => return refused(&session, "Application not created", err, BACK).await,
    };

    let gateway = as_user(&gateway, &user);
    let stored: Application = match gateway::insert(&*gateway, "applications", &application).await {
        Ok(stored) => stored,
        Err(err) => return refused(&session, "Application not created", err, BACK).await,
    };

    info!("u/{} opened application {} ({})", user.id, stored.id, stored.status.as_str());
    cache.invalidate(&queries::user_tag("applications", user.id));
    let title = match stored.status {
        ApplicationStatus::InReview => "Application submitted",
        _ => "Draft saved",
    };
    toast::redirect(&session, Toast::success(title), BACK).await
}

#[debug_handler(state = AppState)]
pub(crate) async fn cancel_application(
    user: CurrentUser,
    Path(id): Path<Uuid>,
    State(gateway): State<Arc<dyn Gateway>>,
    State(cache): State<Arc<QueryCache>>,
    session: Session,
) -> AppResult<Response> {
    let query = gateway::Query::table("applications")
        .eq("id", id.to_string())
        .eq("user_id", user.id.to_string())
        .any_of(
            "status",
            [ApplicationStatus::Draft, ApplicationStatus::InReview].map(ApplicationStatus::as_str),
        );

    let gateway = as_user(&gateway, &user);
    match gateway::update(&*gateway, &query, &json!({ "status": ApplicationStatus::Cancelled })).await {
        Ok(_) => {}
        Err(err) if err.is_not_found() => {
            return refused(
                &session,
                "Application not cancelled",
                "This application can no longer be cancelled",
                BACK,
            )
            .await;
        }
        Err(err) => return refused(&session, "Application not cancelled", err, BACK).await,
    }

    info!("u/{} cancelled application {id}", user.id);
    cache.invalidate(&queries::user_tag("applications", user.id));
    toast::redirect(&session, Toast::success("Application cancelled"), BACK).await
}
