use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{
        StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE},
    },
    response::{IntoResponse, Redirect, Response},
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::error;

use crate::{
    application::{
        comments::CommentError,
        error::HttpError,
        feed::FeedError,
        posts::{PostError, PostInput},
        relationships::RelationshipError,
    },
    domain::entities::UserRecord,
    infra::uploads::UploadStorageError,
    presentation::views::{
        CommentFormView, FeedPageView, FollowTemplate, GroupOptionView, GroupPageView,
        GroupTemplate, IndexTemplate, LayoutContext, PostDetailTemplate, PostDetailView,
        PostFormTemplate, PostFormView, ProfilePageView, ProfileTemplate, ViewerView,
        comment_views, pager_view, post_card, post_cards, render_not_found_response,
        render_template_response,
    },
};

use super::{HttpState, MaybeViewer, RequireViewer};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct PageQuery {
    page: Option<u32>,
}

impl PageQuery {
    fn number(&self) -> u32 {
        self.page.unwrap_or(1)
    }
}

fn viewer_view(viewer: &Option<UserRecord>) -> Option<ViewerView> {
    viewer.as_ref().map(ViewerView::from)
}

fn feed_error_to_response(err: FeedError, viewer: Option<ViewerView>) -> Response {
    match err {
        FeedError::UnknownGroup | FeedError::UnknownUser | FeedError::Pagination(_) => {
            render_not_found_response(viewer)
        }
        FeedError::Repo(err) => HttpError::from_error(
            "infra::http::public::feed_error_to_response",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            &err,
        )
        .into_response(),
    }
}

pub(super) async fn index(
    State(state): State<HttpState>,
    MaybeViewer(viewer): MaybeViewer,
    Query(query): Query<PageQuery>,
) -> Response {
    match state.feed.index_page(query.number()).await {
        Ok(page) => {
            let content = FeedPageView {
                heading: "Latest posts".to_string(),
                posts: post_cards(&page.items),
                pager: pager_view("/", &page),
            };
            let view = LayoutContext::new(
                viewer_view(&viewer),
                content,
            );
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, viewer_view(&viewer)),
    }
}

pub(super) async fn group_feed(
    State(state): State<HttpState>,
    MaybeViewer(viewer): MaybeViewer,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    match state.feed.group_page(&slug, query.number()).await {
        Ok(feed) => {
            let content = GroupPageView {
                group: (&feed.group).into(),
                posts: post_cards(&feed.posts.items),
                pager: pager_view(format!("/group/{slug}/"), &feed.posts),
            };
            let view =
                LayoutContext::new(viewer_view(&viewer), content);
            render_template_response(GroupTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, viewer_view(&viewer)),
    }
}

pub(super) async fn profile_feed(
    State(state): State<HttpState>,
    MaybeViewer(viewer): MaybeViewer,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let viewer_id = viewer.as_ref().map(|user| user.id);
    match state
        .feed
        .profile_page(&username, viewer_id, query.number())
        .await
    {
        Ok(feed) => {
            let is_own_profile = viewer_id == Some(feed.author.id);
            let content = ProfilePageView {
                author_username: feed.author.username.clone(),
                post_count: feed.post_count,
                viewer_follows: feed.viewer_follows,
                is_own_profile,
                posts: post_cards(&feed.posts.items),
                pager: pager_view(format!("/profile/{username}/"), &feed.posts),
            };
            let view =
                LayoutContext::new(viewer_view(&viewer), content);
            render_template_response(ProfileTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, viewer_view(&viewer)),
    }
}

/// Render the detail page, optionally with a failed comment form re-filled.
async fn render_detail(
    state: &HttpState,
    viewer: &Option<UserRecord>,
    post_id: i64,
    comment_form: CommentFormView,
    status: StatusCode,
) -> Response {
    match state.posts.detail(post_id).await {
        Ok(detail) => {
            let can_edit = viewer
                .as_ref()
                .is_some_and(|user| user.id == detail.post.author_id);
            let content = PostDetailView {
                title_preview: PostDetailView::title_for(&detail.post),
                post: post_card(&detail.post),
                author_post_count: detail.author_post_count,
                can_edit,
                comments: comment_views(&detail.comments),
                comment_form,
            };
            let view =
                LayoutContext::new(viewer_view(viewer), content);
            render_template_response(PostDetailTemplate { view }, status)
        }
        Err(PostError::UnknownPost) => render_not_found_response(viewer_view(viewer)),
        Err(err) => HttpError::from_error(
            "infra::http::public::render_detail",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            &err,
        )
        .into_response(),
    }
}

pub(super) async fn post_detail(
    State(state): State<HttpState>,
    MaybeViewer(viewer): MaybeViewer,
    Path(id): Path<i64>,
) -> Response {
    render_detail(&state, &viewer, id, CommentFormView::empty(), StatusCode::OK).await
}

#[derive(Debug, Deserialize)]
pub(super) struct CommentForm {
    #[serde(default)]
    text: String,
}

pub(super) async fn add_comment(
    State(state): State<HttpState>,
    RequireViewer(viewer): RequireViewer,
    Path(id): Path<i64>,
    axum::extract::Form(form): axum::extract::Form<CommentForm>,
) -> Response {
    match state.comments.add_comment(viewer.id, id, &form.text).await {
        Ok(_) => Redirect::to(&format!("/posts/{id}/")).into_response(),
        Err(CommentError::UnknownPost) => {
            render_not_found_response(viewer_view(&Some(viewer)))
        }
        Err(CommentError::Invalid(err)) => {
            let comment_form = CommentFormView {
                text: form.text,
                error: Some(err.to_string()),
            };
            render_detail(&state, &Some(viewer), id, comment_form, StatusCode::OK).await
        }
        Err(err) => HttpError::from_error(
            "infra::http::public::add_comment",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            &err,
        )
        .into_response(),
    }
}

async fn group_options(
    state: &HttpState,
    selected: Option<&str>,
) -> Result<Vec<GroupOptionView>, HttpError> {
    let groups = state.posts.groups().list_all().await.map_err(|err| {
        HttpError::from_error(
            "infra::http::public::group_options",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            &err,
        )
    })?;
    Ok(groups
        .into_iter()
        .map(|group| GroupOptionView {
            selected: selected == Some(group.slug.as_str()),
            slug: group.slug,
            title: group.title,
        })
        .collect())
}

fn render_post_form(
    viewer: &UserRecord,
    form: PostFormView,
    status: StatusCode,
) -> Response {
    let view = LayoutContext::new(
        Some(ViewerView::from(viewer)),
        form,
    );
    render_template_response(PostFormTemplate { view }, status)
}

pub(super) async fn create_form(
    State(state): State<HttpState>,
    RequireViewer(viewer): RequireViewer,
) -> Response {
    let groups = match group_options(&state, None).await {
        Ok(groups) => groups,
        Err(err) => return err.into_response(),
    };
    render_post_form(
        &viewer,
        PostFormView {
            is_edit: false,
            action: "/create/".to_string(),
            text: String::new(),
            groups,
            error: None,
        },
        StatusCode::OK,
    )
}

/// Fields accepted by the compose/revise multipart forms.
struct PostFormData {
    text: String,
    group_slug: Option<String>,
    image: Option<(String, Bytes)>,
}

async fn read_post_form(mut multipart: Multipart) -> Result<PostFormData, HttpError> {
    const SOURCE: &str = "infra::http::public::read_post_form";

    let mut data = PostFormData {
        text: String::new(),
        group_slug: None,
        image: None,
    };

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                return Err(HttpError::from_error(
                    SOURCE,
                    StatusCode::BAD_REQUEST,
                    "Malformed form submission",
                    &err,
                ));
            }
        };

        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("text") => {
                data.text = field.text().await.map_err(|err| {
                    HttpError::from_error(
                        SOURCE,
                        StatusCode::BAD_REQUEST,
                        "Malformed form submission",
                        &err,
                    )
                })?;
            }
            Some("group") => {
                let value = field.text().await.map_err(|err| {
                    HttpError::from_error(
                        SOURCE,
                        StatusCode::BAD_REQUEST,
                        "Malformed form submission",
                        &err,
                    )
                })?;
                if !value.is_empty() {
                    data.group_slug = Some(value);
                }
            }
            Some("image") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(|err| {
                    HttpError::from_error(
                        SOURCE,
                        StatusCode::BAD_REQUEST,
                        "Malformed form submission",
                        &err,
                    )
                })?;
                if !filename.is_empty() && !bytes.is_empty() {
                    data.image = Some((filename, bytes));
                }
            }
            _ => {}
        }
    }

    Ok(data)
}

async fn store_image(
    state: &HttpState,
    image: Option<(String, Bytes)>,
) -> Result<Option<String>, HttpError> {
    let Some((filename, bytes)) = image else {
        return Ok(None);
    };
    match state.uploads.store(&filename, bytes).await {
        Ok(stored_path) => Ok(Some(stored_path)),
        Err(err) => Err(HttpError::from_error(
            "infra::http::public::store_image",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to store uploaded image",
            &err,
        )),
    }
}

pub(super) async fn create_submit(
    State(state): State<HttpState>,
    RequireViewer(viewer): RequireViewer,
    multipart: Multipart,
) -> Response {
    let form = match read_post_form(multipart).await {
        Ok(form) => form,
        Err(err) => return err.into_response(),
    };

    let image_path = match store_image(&state, form.image).await {
        Ok(path) => path,
        Err(err) => return err.into_response(),
    };

    let input = PostInput {
        text: form.text.clone(),
        group_slug: form.group_slug.clone(),
        image_path,
    };

    match state.posts.compose(viewer.id, input).await {
        Ok(_) => Redirect::to(&format!("/profile/{}/", viewer.username)).into_response(),
        Err(PostError::Invalid(err)) => {
            let groups = match group_options(&state, form.group_slug.as_deref()).await {
                Ok(groups) => groups,
                Err(err) => return err.into_response(),
            };
            render_post_form(
                &viewer,
                PostFormView {
                    is_edit: false,
                    action: "/create/".to_string(),
                    text: form.text,
                    groups,
                    error: Some(err.to_string()),
                },
                StatusCode::OK,
            )
        }
        Err(PostError::UnknownGroup) => render_not_found_response(viewer_view(&Some(viewer))),
        Err(err) => HttpError::from_error(
            "infra::http::public::create_submit",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            &err,
        )
        .into_response(),
    }
}

pub(super) async fn edit_form(
    State(state): State<HttpState>,
    RequireViewer(viewer): RequireViewer,
    Path(id): Path<i64>,
) -> Response {
    let detail = match state.posts.detail(id).await {
        Ok(detail) => detail,
        Err(PostError::UnknownPost) => {
            return render_not_found_response(viewer_view(&Some(viewer)));
        }
        Err(err) => {
            return HttpError::from_error(
                "infra::http::public::edit_form",
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                &err,
            )
            .into_response();
        }
    };

    if detail.post.author_id != viewer.id {
        return Redirect::to(&format!("/posts/{id}/")).into_response();
    }

    let groups = match group_options(&state, detail.post.group_slug.as_deref()).await {
        Ok(groups) => groups,
        Err(err) => return err.into_response(),
    };

    render_post_form(
        &viewer,
        PostFormView {
            is_edit: true,
            action: format!("/posts/{id}/edit/"),
            text: detail.post.text.clone(),
            groups,
            error: None,
        },
        StatusCode::OK,
    )
}

pub(super) async fn edit_submit(
    State(state): State<HttpState>,
    RequireViewer(viewer): RequireViewer,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Response {
    let form = match read_post_form(multipart).await {
        Ok(form) => form,
        Err(err) => return err.into_response(),
    };

    let image_path = match store_image(&state, form.image).await {
        Ok(path) => path,
        Err(err) => return err.into_response(),
    };

    let input = PostInput {
        text: form.text.clone(),
        group_slug: form.group_slug.clone(),
        image_path,
    };

    match state.posts.revise(viewer.id, id, input).await {
        Ok(post) => Redirect::to(&format!("/posts/{}/", post.id)).into_response(),
        // The author guard: a non-author reaching this endpoint changes nothing.
        Err(PostError::NotAuthor) => Redirect::to(&format!("/posts/{id}/")).into_response(),
        Err(PostError::UnknownPost) => render_not_found_response(viewer_view(&Some(viewer))),
        Err(PostError::UnknownGroup) => render_not_found_response(viewer_view(&Some(viewer))),
        Err(PostError::Invalid(err)) => {
            let groups = match group_options(&state, form.group_slug.as_deref()).await {
                Ok(groups) => groups,
                Err(err) => return err.into_response(),
            };
            render_post_form(
                &viewer,
                PostFormView {
                    is_edit: true,
                    action: format!("/posts/{id}/edit/"),
                    text: form.text,
                    groups,
                    error: Some(err.to_string()),
                },
                StatusCode::OK,
            )
        }
        Err(err) => HttpError::from_error(
            "infra::http::public::edit_submit",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            &err,
        )
        .into_response(),
    }
}

pub(super) async fn follow_feed(
    State(state): State<HttpState>,
    RequireViewer(viewer): RequireViewer,
    Query(query): Query<PageQuery>,
) -> Response {
    match state.feed.follow_page(viewer.id, query.number()).await {
        Ok(page) => {
            let content = FeedPageView {
                heading: "Authors you follow".to_string(),
                posts: post_cards(&page.items),
                pager: pager_view("/follow/", &page),
            };
            let view = LayoutContext::new(
                Some(ViewerView::from(&viewer)),
                content,
            );
            render_template_response(FollowTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, Some(ViewerView::from(&viewer))),
    }
}

fn relationship_error_to_response(
    err: RelationshipError,
    viewer: Option<ViewerView>,
) -> Response {
    match err {
        RelationshipError::UnknownUser => render_not_found_response(viewer),
        RelationshipError::Repo(err) => HttpError::from_error(
            "infra::http::public::relationship_error_to_response",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            &err,
        )
        .into_response(),
    }
}

pub(super) async fn follow_author(
    State(state): State<HttpState>,
    RequireViewer(viewer): RequireViewer,
    Path(username): Path<String>,
) -> Response {
    match state.relationships.follow(viewer.id, &username).await {
        Ok(_) => Redirect::to("/follow/").into_response(),
        Err(err) => relationship_error_to_response(err, Some(ViewerView::from(&viewer))),
    }
}

pub(super) async fn unfollow_author(
    State(state): State<HttpState>,
    RequireViewer(viewer): RequireViewer,
    Path(username): Path<String>,
) -> Response {
    match state.relationships.unfollow(viewer.id, &username).await {
        Ok(()) => Redirect::to("/follow/").into_response(),
        Err(err) => relationship_error_to_response(err, Some(ViewerView::from(&viewer))),
    }
}

pub(super) async fn serve_upload(
    State(state): State<HttpState>,
    Path(path): Path<String>,
) -> Response {
    const SOURCE: &str = "infra::http::public::serve_upload";

    match state.uploads.read(&path).await {
        Ok(bytes) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            Response::builder()
                .status(StatusCode::OK)
                .header(CONTENT_TYPE, mime.as_ref())
                .header(CACHE_CONTROL, "public, max-age=31536000, immutable")
                .body(Body::from(bytes))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        Err(UploadStorageError::InvalidPath) => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Upload not found",
            "The requested upload is not available",
        )
        .into_response(),
        Err(UploadStorageError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            HttpError::new(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Upload not found",
                "The requested upload is not available",
            )
            .into_response()
        }
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path,
                error = %err,
                "failed to read stored upload"
            );
            HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read uploaded file",
                err.to_string(),
            )
            .into_response()
        }
    }
}

pub(super) async fn fallback(MaybeViewer(viewer): MaybeViewer) -> Response {
    render_not_found_response(viewer_view(&viewer))
}
