use std::sync::Arc;

use axum::{
    debug_handler,
    extract::State,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;

use crate::{
    AppResult, AppState,
    gateway::Gateway,
    include_res,
    models::DESTINATIONS,
    res, session,
    sync::{Loader, QueryCache, Resource, queries},
    toast,
};

use super::program_card;

pub const FEATURED: usize = 6;

#[debug_handler(state = AppState)]
pub(crate) async fn home(
    State(gateway): State<Arc<dyn Gateway>>,
    State(cache): State<Arc<QueryCache>>,
    session: Session,
) -> AppResult<Response> {
    let user = session::current_user(&session).await?;
    let mut toasts = toast::take(&session).await?;
    let mut loader = Loader::new(&*gateway, &cache, &mut toasts);

    let featured = Resource::mount(queries::featured_programs(FEATURED), &mut loader).await;

    let featured = match featured.data.as_slice() {
        [] if featured.is_ok() => res::empty("New programs are on their way."),
        [] => String::new(),
        programs => programs.iter().map(|p| program_card(p, "/programs")).collect(),
    };
    let destinations: String = DESTINATIONS
        .iter()
        .map(|d| {
            format!(
                r#"<a class="card" href="/destinations/{}"><h3>{}</h3><p>{}</p></a>"#,
                d.code,
                res::escape(d.name),
                res::escape(d.summary)
            )
        })
        .collect();

    let content = include_res!(str, "/pages/home.html")
        .replace("{featured}", &featured)
        .replace("{destinations}", &destinations);
    Ok(res::page("Study abroad with confidence", user.as_ref(), &toasts, &content).into_response())
}
