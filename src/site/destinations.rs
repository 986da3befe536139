use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;

use crate::{
    AppResult, AppState,
    gateway::Gateway,
    include_res,
    models::{DESTINATIONS, Destination, DestinationStats, Money},
    res, session,
    sync::{Loader, QueryCache, Resource, filter::Filtered, queries},
    toast,
};

use super::program_card;

fn stats_line(stats: Option<&DestinationStats>) -> String {
    let Some(stats) = stats else {
        return String::new();
    };
    let tuition = stats
        .avg_tuition
        .map(|fee| format!(" · average tuition {}", Money(fee, "USD")))
        .unwrap_or_default();
    format!(
        r#"<p class="muted">{} programs at {} universities{tuition}</p>"#,
        stats.program_count, stats.university_count
    )
}

#[debug_handler(state = AppState)]
pub(crate) async fn destinations(
    State(gateway): State<Arc<dyn Gateway>>,
    State(cache): State<Arc<QueryCache>>,
    session: Session,
) -> AppResult<Response> {
    let user = session::current_user(&session).await?;
    let mut toasts = toast::take(&session).await?;
    let mut loader = Loader::new(&*gateway, &cache, &mut toasts);

    let stats = Resource::mount(queries::destination_stats(), &mut loader).await;

    let cards: String = DESTINATIONS
        .iter()
        .map(|d| {
            let stats = stats
                .data
                .iter()
                .find(|s| s.country.eq_ignore_ascii_case(d.code));
            format!(
                r#"<a class="card" href="/destinations/{}"><h3>{}</h3><p>{}</p>{}</a>"#,
                d.code,
                res::escape(d.name),
                res::escape(d.summary),
                stats_line(stats)
            )
        })
        .collect();

    let content = include_res!(str, "/pages/destinations.html").replace("{cards}", &cards);
    Ok(res::page("Destinations", user.as_ref(), &toasts, &content).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn destination(
    Path(country): Path<String>,
    State(gateway): State<Arc<dyn Gateway>>,
    State(cache): State<Arc<QueryCache>>,
    session: Session,
) -> AppResult<Response> {
    let Some(destination) = Destination::find(&country) else {
        return res::sorry("destination");
    };

    let user = session::current_user(&session).await?;
    let mut toasts = toast::take(&session).await?;
    let mut loader = Loader::new(&*gateway, &cache, &mut toasts);

    let programs = Resource::mount(queries::programs_in(destination.code), &mut loader).await;
    let programs = match Filtered::from_vec(programs.into_data()) {
        Filtered::Rows(rows) => rows.iter().map(|p| program_card(p, "/programs")).collect(),
        Filtered::NoResults => res::empty(&format!("No programs in {} yet.", destination.name)),
    };

    let content = include_res!(str, "/pages/destination.html")
        .replace("{name}", &res::escape(destination.name))
        .replace("{summary}", &res::escape(destination.summary))
        .replace("{code}", destination.code)
        .replace("{programs}", &programs);
    Ok(res::page(destination.name, user.as_ref(), &toasts, &content).into_response())
}
