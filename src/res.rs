use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::{AppResult, session::CurrentUser, toast::Toasts};

#[macro_export]
macro_rules! include_res {
    (bytes, $p:expr) => {
        include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $p))
    };
    (str, $p:expr) => {
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $p))
    };
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Renders untrusted markdown. Raw HTML in the source is escaped, not passed through.
pub fn markdown(source: &str) -> String {
    use pulldown_cmark::{Event, Parser};

    let parser = Parser::new(source).map(|event| match event {
        Event::Html(html) | Event::InlineHtml(html) => Event::Text(html),
        _ => event,
    });

    let mut html = String::new();
    pulldown_cmark::html::push_html(&mut html, parser);
    html
}

fn nav(user: Option<&CurrentUser>) -> String {
    match user {
        Some(user) => {
            let admin = if user.is_admin() {
                r#"<a href="/admin/programs">Admin</a>"#
            } else {
                ""
            };
            include_res!(str, "/pages/nav_user.html")
                .replace("{email}", &escape(&user.email))
                .replace("{admin}", admin)
        }
        None => include_res!(str, "/pages/nav_guest.html").to_owned(),
    }
}

/// Wraps page content in the site layout.
pub fn page(title: &str, user: Option<&CurrentUser>, toasts: &Toasts, content: &str) -> Html<String> {
    let toasts: String = toasts.iter().map(|toast| toast.render()).collect();
    Html(
        include_res!(str, "/pages/layout.html")
            .replace("{title}", &escape(title))
            .replace("{nav}", &nav(user))
            .replace("{toasts}", &toasts)
            .replace("{content}", content),
    )
}

pub fn sorry(what: &str) -> AppResult<Response> {
    let content = include_res!(str, "/pages/not_found.html").replace("{what}", &escape(what));
    Ok((
        StatusCode::NOT_FOUND,
        page("Not found", None, &Toasts::default(), &content),
    )
        .into_response())
}

pub async fn fallback() -> AppResult<Response> {
    sorry("page")
}

/// The explicit "nothing matched" branch of a list.
pub fn empty(message: &str) -> String {
    format!(r#"<p class="empty">{}</p>"#, escape(message))
}

/// `<option>` list with `selected` marked.
pub fn options<'a>(
    selected: Option<&str>,
    choices: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> String {
    choices
        .into_iter()
        .map(|(value, label)| {
            let mark = if selected == Some(value) { " selected" } else { "" };
            format!(
                r#"<option value="{}"{mark}>{}</option>"#,
                escape(value),
                escape(label)
            )
        })
        .collect()
}

/// Percent-encodes one query-string value.
pub fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

pub fn checked_attr(on: bool) -> &'static str {
    if on { " checked" } else { "" }
}

/// `Option` rendering helper for table cells.
pub fn or_dash(value: Option<&str>) -> String {
    value.map(escape).unwrap_or_else(|| "-".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn encodes_query_values() {
        assert_eq!(encode("law & order+"), "law+%26+order%2B");
        assert_eq!(encode("/dashboard?tab=past"), "%2Fdashboard%3Ftab%3Dpast");
    }

    #[test]
    fn options_mark_selection() {
        let html = options(Some("b"), [("a", "A"), ("b", "B & co")]);
        assert_eq!(
            html,
            r#"<option value="a">A</option><option value="b" selected>B &amp; co</option>"#
        );
    }

    #[test]
    fn markdown_does_not_pass_raw_html() {
        let html = markdown("**hi** <script>alert(1)</script>");
        assert!(html.contains("<strong>hi</strong>"));
        assert!(!html.contains("<script>"));
    }
}
