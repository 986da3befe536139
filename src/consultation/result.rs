use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    AppResult, AppState,
    dashboard::as_user,
    gateway::Gateway,
    include_res,
    models::{ConsultationResult, Destination, MatchedProgram},
    res,
    session::CurrentUser,
    site::program_card,
    sync::consult::{self, FAILED},
    toast::{self, Toast},
};

fn scores(matched: &MatchedProgram) -> String {
    matched
        .scores
        .breakdown()
        .iter()
        .map(|(label, score)| format!("<li>{label}: {score:.0}</li>"))
        .collect()
}

fn matches(result: &ConsultationResult) -> String {
    if result.matches.is_empty() {
        return res::empty("No programs matched your answers. Try widening your budget or destination.");
    }
    result
        .matches
        .iter()
        .enumerate()
        .map(|(rank, matched)| {
            format!(
                r#"<section class="match"><h3>#{} <span class="score">{:.0}%</span></h3>{}<ul class="scores">{}</ul><a class="button" href="/dashboard/applications?program={}">Apply</a></section>"#,
                rank + 1,
                matched.scores.total_score,
                program_card(&matched.program, "/programs"),
                scores(matched),
                matched.program.id,
            )
        })
        .collect()
}

#[debug_handler(state = AppState)]
pub(crate) async fn result(
    user: CurrentUser,
    Path(id): Path<Uuid>,
    State(gateway): State<Arc<dyn Gateway>>,
    session: Session,
) -> AppResult<Response> {
    let gateway = as_user(&gateway, &user);
    let mut toasts = toast::take(&session).await?;

    let result = match consult::revisit(&*gateway, user.id, id).await {
        Ok(Some(result)) => result,
        Ok(None) => return res::sorry("consultation"),
        Err(_) => {
            toasts.push(Toast::destructive("Consultation failed", FAILED));
            return Ok(res::page("Consultation", Some(&user), &toasts, "").into_response());
        }
    };

    let params = &result.record.params;
    let content = include_res!(str, "/pages/consultation/result.html")
        .replace("{count}", &result.matches.len().to_string())
        .replace("{field}", &res::escape(&params.field))
        .replace("{level}", params.level.label())
        .replace("{country}", &res::escape(Destination::name_of(&params.country)))
        .replace("{matches}", &matches(&result));
    Ok(res::page("Your matches", Some(&user), &toasts, &content).into_response())
}
