use std::{collections::BTreeMap, sync::Arc};

use axum::{
    debug_handler,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;

use crate::{
    AppResult, AppState,
    gateway::Gateway,
    include_res,
    models::{Money, Payment, PaymentStatus, PaymentTotals, timestamp},
    res,
    session::CurrentUser,
    sync::{
        Loader, QueryCache, Resource,
        filter::{Filtered, PaymentFilter},
        queries,
    },
    toast,
};

use super::{as_user, shell};

const HERE: &str = "/dashboard/payments";

fn sums(totals: &BTreeMap<String, f64>) -> String {
    if totals.is_empty() {
        return "-".to_owned();
    }
    totals
        .iter()
        .map(|(currency, amount)| Money(*amount, currency).to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn status_links(filter: &PaymentFilter) -> String {
    let all = std::iter::once((None, "All"));
    let each = PaymentStatus::ALL.iter().map(|s| (Some(*s), s.label()));
    all.chain(each)
        .map(|(status, label)| {
            let class = if status == filter.status { r#" class="active""# } else { "" };
            let value = status.map(PaymentStatus::as_str).unwrap_or_default();
            format!(r#"<a href="{HERE}?status={value}"{class}>{label}</a>"#)
        })
        .collect()
}

fn row(payment: &Payment) -> String {
    format!(
        r#"<tr><td>{}</td><td>{}</td><td>{}</td><td><span class="status {}">{}</span></td></tr>"#,
        payment.created_at.map(timestamp::display).unwrap_or_default(),
        res::or_dash(payment.description.as_deref()),
        res::escape(&Money(payment.amount, &payment.currency).to_string()),
        payment.status.as_str(),
        payment.status.label(),
    )
}

#[debug_handler(state = AppState)]
pub(crate) async fn payments(
    user: CurrentUser,
    Query(filter): Query<PaymentFilter>,
    State(gateway): State<Arc<dyn Gateway>>,
    State(cache): State<Arc<QueryCache>>,
    session: Session,
) -> AppResult<Response> {
    let gateway = as_user(&gateway, &user);
    let mut toasts = toast::take(&session).await?;
    let mut loader = Loader::new(&*gateway, &cache, &mut toasts);

    let payments = Resource::mount(queries::payments(user.id), &mut loader).await;

    let totals = PaymentTotals::of(&payments.data);
    let table = match filter.apply(&payments.data) {
        Filtered::Rows(rows) => format!(
            "<table><thead><tr><th>Date</th><th>Description</th><th>Amount</th><th>Status</th></tr></thead><tbody>{}</tbody></table>",
            rows.iter().map(row).collect::<String>()
        ),
        Filtered::NoResults => res::empty("No payments yet."),
    };

    let content = include_res!(str, "/pages/dashboard/payments.html")
        .replace("{paid}", &res::escape(&sums(&totals.paid)))
        .replace("{pending}", &res::escape(&sums(&totals.pending)))
        .replace("{statuses}", &status_links(&filter))
        .replace("{table}", &table);
    Ok(res::page("Payments", Some(&user), &toasts, &shell(HERE, &content)).into_response())
}
