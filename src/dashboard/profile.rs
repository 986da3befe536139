use std::sync::Arc;

use axum::{
    Form, debug_handler,
    body::Bytes,
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tower_sessions::Session;
use tracing::info;
use uuid::Uuid;

use crate::{
    AppResult, AppState,
    config::Config,
    gateway::{self, Gateway, Query},
    include_res,
    models::{ProfileForm, UserProfile},
    res,
    session::CurrentUser,
    sync::{Loader, QueryCache, Resource, queries},
    toast::{self, Toast},
};

use super::{as_user, refused, shell};

const BACK: &str = "/dashboard/profile";
pub const MAX_AVATAR_BYTES: usize = 2 * 1024 * 1024;
/// Request body limit on the avatar route: the image plus multipart framing.
pub const AVATAR_BODY_LIMIT: usize = MAX_AVATAR_BYTES + 64 * 1024;
const TOO_LARGE: &str = "Avatars must be 2 MB or smaller";

fn value(field: Option<&str>) -> String {
    res::escape(field.unwrap_or_default())
}

fn render(profile: &UserProfile) -> String {
    let avatar = match profile.avatar_url.as_deref() {
        Some(url) => format!(r#"<img class="avatar" src="{}" alt="">"#, res::escape(url)),
        None => r#"<div class="avatar placeholder"></div>"#.to_owned(),
    };

    include_res!(str, "/pages/dashboard/profile.html")
        .replace("{avatar}", &avatar)
        .replace("{completion}", &profile.completion().to_string())
        .replace("{email}", &value(profile.email.as_deref()))
        .replace("{full_name}", &value(profile.full_name.as_deref()))
        .replace("{phone}", &value(profile.phone.as_deref()))
        .replace("{date_of_birth}", &value(profile.date_of_birth.as_deref()))
        .replace("{nationality}", &value(profile.nationality.as_deref()))
        .replace("{passport_number}", &value(profile.passport_number.as_deref()))
        .replace("{passport_expiry}", &value(profile.passport_expiry.as_deref()))
        .replace("{address}", &value(profile.address.as_deref()))
        .replace("{education_level}", &value(profile.education_level.as_deref()))
        .replace("{english_test}", &value(profile.english_test.as_deref()))
        .replace(
            "{english_score}",
            &profile.english_score.map(|s| s.to_string()).unwrap_or_default(),
        )
        .replace(
            "{work_experience_years}",
            &profile
                .work_experience_years
                .map(|y| y.to_string())
                .unwrap_or_default(),
        )
}

#[debug_handler(state = AppState)]
pub(crate) async fn profile_page(
    user: CurrentUser,
    State(gateway): State<Arc<dyn Gateway>>,
    State(cache): State<Arc<QueryCache>>,
    session: Session,
) -> AppResult<Response> {
    let gateway = as_user(&gateway, &user);
    let mut toasts = toast::take(&session).await?;
    let mut loader = Loader::new(&*gateway, &cache, &mut toasts);

    let profile = Resource::mount(queries::profile(user.id), &mut loader).await;
    let profile = profile.into_data().unwrap_or_else(|| UserProfile {
        id: user.id,
        email: Some(user.email.clone()),
        ..Default::default()
    });

    Ok(res::page("Your profile", Some(&user), &toasts, &shell(BACK, &render(&profile))).into_response())
}

fn own_profile(user: &CurrentUser) -> Query {
    Query::table("profiles").eq("id", user.id.to_string())
}

#[debug_handler(state = AppState)]
pub(crate) async fn update_profile(
    user: CurrentUser,
    State(gateway): State<Arc<dyn Gateway>>,
    State(cache): State<Arc<QueryCache>>,
    session: Session,
    Form(form): Form<ProfileForm>,
) -> AppResult<Response> {
    let patch = match form.validate() {
        Ok(patch) => patch,
        Err(err) => return refused(&session, "Profile not saved", err, BACK).await,
    };

    let gateway = as_user(&gateway, &user);
    if let Err(err) = gateway::update(&*gateway, &own_profile(&user), &patch).await {
        return refused(&session, "Profile not saved", err, BACK).await;
    }

    cache.invalidate(&queries::user_tag("profiles", user.id));
    toast::redirect(&session, Toast::success("Profile updated"), BACK).await
}

/// File extension for an accepted avatar type.
fn image_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

/// Content type and bytes of the `avatar` part, if the form has one.
async fn avatar_field(multipart: &mut Multipart) -> Result<Option<(String, Bytes)>, MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("avatar") {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_owned();
        return Ok(Some((content_type, field.bytes().await?)));
    }
    Ok(None)
}

#[debug_handler(state = AppState)]
pub(crate) async fn upload_avatar(
    user: CurrentUser,
    State(gateway): State<Arc<dyn Gateway>>,
    State(cache): State<Arc<QueryCache>>,
    State(config): State<Arc<Config>>,
    session: Session,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let upload = match avatar_field(&mut multipart).await {
        Ok(upload) => upload,
        Err(err) if err.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return refused(&session, "Avatar not uploaded", TOO_LARGE, BACK).await;
        }
        Err(err) => return refused(&session, "Avatar not uploaded", err.body_text(), BACK).await,
    };

    let Some((content_type, bytes)) = upload.filter(|(_, bytes)| !bytes.is_empty()) else {
        return refused(&session, "Avatar not uploaded", "Please choose an image", BACK).await;
    };
    let Some(extension) = image_extension(&content_type) else {
        return refused(
            &session,
            "Avatar not uploaded",
            "Avatars must be PNG, JPEG, WebP or GIF images",
            BACK,
        )
        .await;
    };
    if bytes.len() > MAX_AVATAR_BYTES {
        return refused(&session, "Avatar not uploaded", TOO_LARGE, BACK).await;
    }

    let gateway = as_user(&gateway, &user);
    let path = format!("{}/{}.{extension}", user.id, Uuid::new_v4());
    let url = match gateway
        .upload(&config.avatar_bucket, &path, bytes.to_vec(), &content_type)
        .await
    {
        Ok(url) => url,
        Err(err) => return refused(&session, "Avatar not uploaded", err, BACK).await,
    };

    if let Err(err) = gateway::update(&*gateway, &own_profile(&user), &json!({ "avatar_url": url })).await {
        return refused(&session, "Avatar not saved", err, BACK).await;
    }

    info!("u/{} uploaded {path}", user.id);
    cache.invalidate(&queries::user_tag("profiles", user.id));
    toast::redirect(&session, Toast::success("Avatar updated"), BACK).await
}
