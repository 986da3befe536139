use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    AppResult, AppState,
    gateway::Gateway,
    include_res,
    models::{DESTINATIONS, Destination, Program, StudyLevel, date},
    res, session,
    sync::{
        Loader, QueryCache, Resource,
        filter::{Filtered, ProgramFilter, ProgramSort},
        queries,
    },
    toast,
};

pub(crate) fn program_card(program: &Program, base: &str) -> String {
    let featured = if program.featured {
        r#"<span class="badge">Featured</span>"#
    } else {
        ""
    };
    let deadline = program
        .deadline
        .map(|d| format!("Apply by {}", date::display(d)))
        .unwrap_or_else(|| "Rolling admissions".to_owned());

    include_res!(str, "/pages/program_card.html")
        .replace("{href}", &format!("{base}/{}", program.id))
        .replace("{featured}", featured)
        .replace("{name}", &res::escape(&program.name))
        .replace("{university}", &res::escape(&program.university))
        .replace("{country}", &res::escape(Destination::name_of(&program.country)))
        .replace("{level}", program.level.label())
        .replace("{duration}", &program.duration_label())
        .replace("{tuition}", &res::escape(&program.tuition_label()))
        .replace("{deadline}", &deadline)
}

pub(crate) fn program_filters(filter: &ProgramFilter, action: &str) -> String {
    let levels = res::options(
        filter.level.map(StudyLevel::as_str),
        StudyLevel::ALL.iter().map(|l| (l.as_str(), l.label())),
    );
    let countries = res::options(
        filter.country.as_deref(),
        DESTINATIONS.iter().map(|d| (d.code, d.name)),
    );
    let sorts = res::options(
        Some(filter.sort.as_str()),
        ProgramSort::ALL.iter().map(|s| {
            let label = match s {
                ProgramSort::FeaturedFirst => "Featured first",
                ProgramSort::Name => "Name",
                ProgramSort::Deadline => "Deadline",
                ProgramSort::Tuition => "Tuition",
            };
            (s.as_str(), label)
        }),
    );

    include_res!(str, "/pages/program_filters.html")
        .replace("{action}", action)
        .replace("{search}", &res::escape(&filter.search))
        .replace("{levels}", &levels)
        .replace("{countries}", &countries)
        .replace("{featured_only}", res::checked_attr(filter.featured_only))
        .replace("{sorts}", &sorts)
}

pub(crate) fn program_results(programs: &[Program], filter: &ProgramFilter, base: &str) -> String {
    match filter.apply(programs) {
        Filtered::Rows(rows) => format!(
            r#"<p class="muted">{} programs</p><div class="grid">{}</div>"#,
            rows.len(),
            rows.iter().map(|p| program_card(p, base)).collect::<String>()
        ),
        Filtered::NoResults => res::empty("No programs match your filters."),
    }
}

#[debug_handler(state = AppState)]
pub(crate) async fn programs(
    Query(filter): Query<ProgramFilter>,
    State(gateway): State<Arc<dyn Gateway>>,
    State(cache): State<Arc<QueryCache>>,
    session: Session,
) -> AppResult<Response> {
    let user = session::current_user(&session).await?;
    let mut toasts = toast::take(&session).await?;
    let mut loader = Loader::new(&*gateway, &cache, &mut toasts);

    let programs = Resource::mount(queries::programs_matching(&filter.search), &mut loader).await;

    let content = include_res!(str, "/pages/programs.html")
        .replace("{filters}", &program_filters(&filter, "/programs"))
        .replace("{results}", &program_results(&programs.data, &filter, "/programs"));
    Ok(res::page("Programs", user.as_ref(), &toasts, &content).into_response())
}

pub(crate) fn program_detail(program: &Program) -> String {
    let description = program
        .description
        .as_deref()
        .map(res::markdown)
        .unwrap_or_default();
    let deadline = program
        .deadline
        .map(date::display)
        .unwrap_or_else(|| "Rolling".to_owned());

    include_res!(str, "/pages/program.html")
        .replace("{id}", &program.id.to_string())
        .replace("{name}", &res::escape(&program.name))
        .replace("{university}", &res::escape(&program.university))
        .replace("{country}", &res::escape(Destination::name_of(&program.country)))
        .replace("{location}", &res::escape(&program.location))
        .replace("{level}", program.level.label())
        .replace("{field}", &res::escape(&program.field))
        .replace("{language}", &res::escape(&program.language))
        .replace("{duration}", &program.duration_label())
        .replace("{tuition}", &res::escape(&program.tuition_label()))
        .replace("{deadline}", &deadline)
        .replace("{description}", &description)
}

#[debug_handler(state = AppState)]
pub(crate) async fn program(
    Path(id): Path<String>,
    State(gateway): State<Arc<dyn Gateway>>,
    State(cache): State<Arc<QueryCache>>,
    session: Session,
) -> AppResult<Response> {
    let Ok(id) = Uuid::parse_str(&id) else {
        return res::sorry("program");
    };

    let user = session::current_user(&session).await?;
    let mut toasts = toast::take(&session).await?;
    let mut loader = Loader::new(&*gateway, &cache, &mut toasts);

    let program = Resource::mount(queries::program(id), &mut loader).await;
    if !program.is_ok() {
        return Ok(res::page("Program", user.as_ref(), &toasts, "").into_response());
    }
    let Some(program) = program.into_data() else {
        return res::sorry("program");
    };

    Ok(res::page(&program.name, user.as_ref(), &toasts, &program_detail(&program)).into_response())
}
