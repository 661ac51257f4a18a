use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

use crate::application::error::{ErrorReport, HttpError};
use crate::application::pagination::Page;
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord, UserRecord};
use crate::domain::text;

const DATE_FORMAT: &'static [BorrowedFormatItem<'static>] =
    format_description!("[day] [month repr:short] [year] [hour]:[minute]");

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(viewer: Option<ViewerView>) -> Response {
    let view = LayoutContext::new(viewer, ErrorPageView::not_found());
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::new(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

/// The signed-in identity shown in the layout chrome.
#[derive(Clone)]
pub struct ViewerView {
    pub username: String,
}

impl From<&UserRecord> for ViewerView {
    fn from(user: &UserRecord) -> Self {
        Self {
            username: user.username.clone(),
        }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub viewer: Option<ViewerView>,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(viewer: Option<ViewerView>, content: T) -> Self {
        Self { viewer, content }
    }
}

#[derive(Clone)]
pub struct GroupBadge {
    pub slug: String,
    pub title: String,
}

#[derive(Clone)]
pub struct PostCard {
    pub id: i64,
    pub text: String,
    pub author_username: String,
    pub group: Option<GroupBadge>,
    pub image_path: Option<String>,
    pub published: String,
}

pub fn post_card(record: &PostRecord) -> PostCard {
    let group = match (&record.group_slug, &record.group_title) {
        (Some(slug), Some(title)) => Some(GroupBadge {
            slug: slug.clone(),
            title: title.clone(),
        }),
        _ => None,
    };
    PostCard {
        id: record.id,
        text: record.text.clone(),
        author_username: record.author_username.clone(),
        group,
        image_path: record.image_path.clone(),
        published: format_timestamp(record.created_at),
    }
}

pub fn post_cards(records: &[PostRecord]) -> Vec<PostCard> {
    records.iter().map(post_card).collect()
}

#[derive(Clone)]
pub struct CommentView {
    pub author_username: String,
    pub text: String,
    pub published: String,
}

pub fn comment_views(records: &[CommentRecord]) -> Vec<CommentView> {
    records
        .iter()
        .map(|record| CommentView {
            author_username: record.author_username.clone(),
            text: record.text.clone(),
            published: format_timestamp(record.created_at),
        })
        .collect()
}

/// Numbered page navigation rendered under every feed.
#[derive(Clone)]
pub struct PagerView {
    pub base_path: String,
    pub number: u32,
    pub total_pages: u32,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous_number: u32,
    pub next_number: u32,
}

pub fn pager_view<T>(base_path: impl Into<String>, page: &Page<T>) -> PagerView {
    PagerView {
        base_path: base_path.into(),
        number: page.number,
        total_pages: page.total_pages,
        has_previous: page.has_previous(),
        has_next: page.has_next(),
        previous_number: page.previous_number(),
        next_number: page.next_number(),
    }
}

pub struct FeedPageView {
    pub heading: String,
    pub posts: Vec<PostCard>,
    pub pager: PagerView,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<FeedPageView>,
}

pub struct GroupView {
    pub title: String,
    pub slug: String,
    pub description: String,
}

impl From<&GroupRecord> for GroupView {
    fn from(record: &GroupRecord) -> Self {
        Self {
            title: record.title.clone(),
            slug: record.slug.clone(),
            description: record.description.clone(),
        }
    }
}

pub struct GroupPageView {
    pub group: GroupView,
    pub posts: Vec<PostCard>,
    pub pager: PagerView,
}

#[derive(Template)]
#[template(path = "group.html")]
pub struct GroupTemplate {
    pub view: LayoutContext<GroupPageView>,
}

pub struct ProfilePageView {
    pub author_username: String,
    pub post_count: u64,
    /// `None` when the viewer is anonymous or looking at their own profile.
    pub viewer_follows: Option<bool>,
    pub is_own_profile: bool,
    pub posts: Vec<PostCard>,
    pub pager: PagerView,
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfilePageView>,
}

pub struct CommentFormView {
    pub text: String,
    pub error: Option<String>,
}

impl CommentFormView {
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            error: None,
        }
    }
}

pub struct PostDetailView {
    pub title_preview: String,
    pub post: PostCard,
    pub author_post_count: u64,
    pub can_edit: bool,
    pub comments: Vec<CommentView>,
    pub comment_form: CommentFormView,
}

impl PostDetailView {
    pub fn title_for(record: &PostRecord) -> String {
        text::preview(&record.text)
    }
}

#[derive(Template)]
#[template(path = "post_detail.html")]
pub struct PostDetailTemplate {
    pub view: LayoutContext<PostDetailView>,
}

pub struct GroupOptionView {
    pub slug: String,
    pub title: String,
    pub selected: bool,
}

pub struct PostFormView {
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub groups: Vec<GroupOptionView>,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "post_form.html")]
pub struct PostFormTemplate {
    pub view: LayoutContext<PostFormView>,
}

#[derive(Template)]
#[template(path = "follow.html")]
pub struct FollowTemplate {
    pub view: LayoutContext<FeedPageView>,
}

pub struct AuthFormView {
    pub heading: String,
    pub action: String,
    pub submit_label: String,
    pub username: String,
    pub next: String,
    pub error: Option<String>,
}

impl AuthFormView {
    pub fn login(next: impl Into<String>) -> Self {
        Self {
            heading: "Log in".to_string(),
            action: "/auth/login".to_string(),
            submit_label: "Log in".to_string(),
            username: String::new(),
            next: next.into(),
            error: None,
        }
    }

    pub fn signup() -> Self {
        Self {
            heading: "Sign up".to_string(),
            action: "/auth/signup".to_string(),
            submit_label: "Create account".to_string(),
            username: String::new(),
            next: String::new(),
            error: None,
        }
    }
}

#[derive(Template)]
#[template(path = "auth_form.html")]
pub struct AuthFormTemplate {
    pub view: LayoutContext<AuthFormView>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page not found".to_string(),
            message: "The page you requested does not exist. Try returning to the feed."
                .to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

fn format_timestamp(when: OffsetDateTime) -> String {
    when.format(&DATE_FORMAT)
        .unwrap_or_else(|_| when.to_string())
}
