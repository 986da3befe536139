mod destinations;
mod home;
mod programs;

use axum::{Router, routing::get};

use crate::AppState;

pub(crate) use programs::{program_card, program_detail, program_filters, program_results};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/destinations", get(destinations::destinations))
        .route("/destinations/{country}", get(destinations::destination))
        .route("/programs", get(programs::programs))
        .route("/programs/{id}", get(programs::program))
}
