use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;

use crate::{
    AppResult, AppState,
    gateway::Gateway,
    res,
    session::CurrentUser,
    site::{program_filters, program_results},
    sync::{Loader, QueryCache, Resource, filter::ProgramFilter, queries},
    toast,
};

use super::{as_user, shell};

const HERE: &str = "/dashboard/programs";

/// The public catalogue inside the dashboard shell; cards link to the public detail page.
#[debug_handler(state = AppState)]
pub(crate) async fn programs(
    user: CurrentUser,
    Query(filter): Query<ProgramFilter>,
    State(gateway): State<Arc<dyn Gateway>>,
    State(cache): State<Arc<QueryCache>>,
    session: Session,
) -> AppResult<Response> {
    let gateway = as_user(&gateway, &user);
    let mut toasts = toast::take(&session).await?;
    let mut loader = Loader::new(&*gateway, &cache, &mut toasts);

    let programs = Resource::mount(queries::programs_matching(&filter.search), &mut loader).await;

    let content = format!(
        "<h1>Programs</h1>{}{}",
        program_filters(&filter, HERE),
        program_results(&programs.data, &filter, "/programs")
    );
    Ok(res::page("Programs", Some(&user), &toasts, &shell(HERE, &content)).into_response())
}
