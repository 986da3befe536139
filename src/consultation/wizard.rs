use std::{collections::HashMap, sync::Arc};

use axum::{
    Form, debug_handler,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::info;

use crate::{
    AppResult, AppState,
    dashboard::{as_user, refused},
    gateway::Gateway,
    include_res,
    models::{ConsultationDraft, DESTINATIONS, Destination, StudyLevel, WizardStep, timestamp},
    res,
    session::CurrentUser,
    sync::{
        Loader, QueryCache, Resource,
        consult::{self, FAILED},
        queries,
    },
    toast::{self, Toast},
};

use super::{clear_draft, draft, save_draft, step_href};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct StepQuery {
    step: Option<String>,
}

fn number(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn text(value: Option<&str>) -> String {
    res::escape(value.unwrap_or_default())
}

fn fields(step: WizardStep, draft: &ConsultationDraft) -> String {
    match step {
        WizardStep::Budget => include_res!(str, "/pages/consultation/budget.html")
            .replace("{budget_min}", &number(draft.budget_min))
            .replace("{budget_max}", &number(draft.budget_max)),
        WizardStep::Study => include_res!(str, "/pages/consultation/study.html")
            .replace(
                "{levels}",
                &res::options(
                    draft.level.map(StudyLevel::as_str),
                    StudyLevel::ALL.iter().map(|l| (l.as_str(), l.label())),
                ),
            )
            .replace("{field}", &text(draft.field.as_deref()))
            .replace(
                "{duration_months}",
                &draft.duration_months.map(|m| m.to_string()).unwrap_or_default(),
            ),
        WizardStep::Destination => include_res!(str, "/pages/consultation/destination.html")
            .replace(
                "{countries}",
                &res::options(draft.country.as_deref(), DESTINATIONS.iter().map(|d| (d.code, d.name))),
            )
            .replace("{language}", &text(draft.language.as_deref())),
        WizardStep::Extras => include_res!(str, "/pages/consultation/extras.html")
            .replace("{needs_scholarship}", res::checked_attr(draft.needs_scholarship))
            .replace("{halal_food}", res::checked_attr(draft.halal_food))
            .replace("{prayer_facilities}", res::checked_attr(draft.prayer_facilities))
            .replace(
                "{international_community}",
                res::checked_attr(draft.international_community),
            ),
    }
}

fn progress(current: WizardStep) -> String {
    WizardStep::ALL
        .iter()
        .map(|step| {
            let class = match step.number().cmp(&current.number()) {
                std::cmp::Ordering::Less => "done",
                std::cmp::Ordering::Equal => "active",
                std::cmp::Ordering::Greater => "",
            };
            format!(r#"<li class="{class}">{}. {}</li>"#, step.number(), step.title())
        })
        .collect()
}

#[debug_handler(state = AppState)]
pub(crate) async fn wizard(
    user: CurrentUser,
    Query(query): Query<StepQuery>,
    State(gateway): State<Arc<dyn Gateway>>,
    State(cache): State<Arc<QueryCache>>,
    session: Session,
) -> AppResult<Response> {
    let draft = draft(&session).await?;
    // a step can't be skipped to before the ones ahead of it are answered
    let furthest = draft.missing_step().unwrap_or(WizardStep::Extras);
    let step = query
        .step
        .and_then(|s| s.parse::<WizardStep>().ok())
        .filter(|s| s.number() <= furthest.number())
        .unwrap_or(furthest);

    let gateway = as_user(&gateway, &user);
    let mut toasts = toast::take(&session).await?;
    let mut loader = Loader::new(&*gateway, &cache, &mut toasts);
    let past = Resource::mount(queries::consultations(user.id), &mut loader).await;

    let back = match step.previous() {
        Some(previous) => format!(r#"<a class="button secondary" href="{}">Back</a>"#, step_href(previous)),
        None => String::new(),
    };
    let submit = if step.next().is_some() { "Next" } else { "Find my programs" };
    let history = match past.data.as_slice() {
        [] => String::new(),
        records => format!(
            "<h2>Past consultations</h2><ul>{}</ul>",
            records
                .iter()
                .map(|r| format!(
                    r#"<li><a href="/consultation/result/{}">{} in {}</a> <span class="muted">{}</span></li>"#,
                    r.id,
                    res::escape(&r.params.field),
                    res::escape(Destination::name_of(&r.params.country)),
                    r.created_at.map(timestamp::display).unwrap_or_default()
                ))
                .collect::<String>()
        ),
    };

    let content = include_res!(str, "/pages/consultation/wizard.html")
        .replace("{progress}", &progress(step))
        .replace("{title}", step.title())
        .replace("{action}", &format!("/consultation/{}", step.as_str()))
        .replace("{fields}", &fields(step, &draft))
        .replace("{back}", &back)
        .replace("{submit}", submit)
        .replace("{history}", &history);
    Ok(res::page("Consultation", Some(&user), &toasts, &content).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn answer(
    user: CurrentUser,
    Path(step): Path<String>,
    State(gateway): State<Arc<dyn Gateway>>,
    State(cache): State<Arc<QueryCache>>,
    session: Session,
    Form(form): Form<HashMap<String, String>>,
) -> AppResult<Response> {
    let step: WizardStep = match step.parse() {
        Ok(step) => step,
        Err(err) => return refused(&session, "Consultation", err, "/consultation").await,
    };

    let mut draft = draft(&session).await?;
    if let Err(err) = draft.apply(step, &form) {
        return refused(&session, "Please check your answers", err, &step_href(step)).await;
    }
    save_draft(&session, &draft).await?;

    if let Some(next) = step.next() {
        return Ok(Redirect::to(&step_href(next)).into_response());
    }

    let params = match draft.params() {
        Ok(params) => params,
        Err(err) => {
            let missing = draft.missing_step().unwrap_or(WizardStep::Budget);
            return refused(&session, "Please check your answers", err, &step_href(missing)).await;
        }
    };

    let gateway = as_user(&gateway, &user);
    match consult::run(&*gateway, user.id, &params).await {
        Ok(result) => {
            clear_draft(&session).await?;
            cache.invalidate(&queries::user_tag("consultations", user.id));
            info!("u/{} finished consultation {}", user.id, result.record.id);
            Ok(Redirect::to(&format!("/consultation/result/{}", result.record.id)).into_response())
        }
        Err(_) => {
            toast::redirect(
                &session,
                Toast::destructive("Consultation failed", FAILED),
                &step_href(step),
            )
            .await
        }
    }
}

#[debug_handler(state = AppState)]
pub(crate) async fn reset(_user: CurrentUser, session: Session) -> AppResult<Response> {
    clear_draft(&session).await?;
    Ok(Redirect::to("/consultation").into_response())
}
