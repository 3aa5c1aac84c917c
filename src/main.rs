use axum::{
    extract::FromRef,
    routing::{delete, get, post, put},
    Router,
};
use dotenv::dotenv;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

mod admin;
mod auth;
mod blocks;
mod chat;
mod colleges;
mod comments;
mod config;
mod confessions;
mod error;
mod events;
mod follows;
mod notifications;
mod push;
mod reports;
mod response;
mod users;

use config::settings::Settings;
use events::EventBus;
use push::PushClient;

#[derive(Clone)]
pub struct AppState {
    pool: PgPool,
    settings: Settings,
    events: EventBus,
    push: PushClient,
}

impl FromRef<AppState> for PgPool {
    fn from_ref(app_state: &AppState) -> PgPool {
        app_state.pool.clone()
    }
}

impl FromRef<AppState> for Settings {
    fn from_ref(app_state: &AppState) -> Settings {
        app_state.settings.clone()
    }
}

impl FromRef<AppState> for EventBus {
    fn from_ref(app_state: &AppState) -> EventBus {
        app_state.events.clone()
    }
}

impl FromRef<AppState> for PushClient {
    fn from_ref(app_state: &AppState) -> PushClient {
        app_state.push.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let settings = Settings::new();

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&settings.database_url)
        .await?;

    info!("database connected");

    let app_state = AppState {
        pool,
        settings: settings.clone(),
        events: EventBus::new(),
        push: PushClient::new(&settings),
    };

    let auth_router = Router::new()
        .route("/sign-in", post(auth::handler::login))
        .route("/sign-up", post(auth::handler::signup))
        .route("/me", get(auth::handler::get_me));

    let user_router = Router::new()
        .route(
            "/me",
            put(users::handler::update_me).delete(users::handler::delete_me),
        )
        .route("/me/device-token", put(users::handler::register_device_token))
        .route("/me/blocked", get(blocks::handler::get_blocked_users))
        .route("/username-available", get(users::handler::username_available))
        .route("/:id", get(users::handler::get_user_profile))
        .route(
            "/:id/follow",
            post(follows::handler::follow_user).delete(follows::handler::unfollow_user),
        )
        .route("/:id/followers", get(follows::handler::get_followers))
        .route("/:id/following", get(follows::handler::get_following))
        .route(
            "/:id/block",
            post(blocks::handler::block_user).delete(blocks::handler::unblock_user),
        )
        .route(
            "/:id/confessions",
            get(confessions::handler::get_user_confessions),
        );

    let college_router = Router::new()
        .route(
            "/",
            get(colleges::handler::get_colleges).post(colleges::handler::create_college),
        )
        .route(
            "/:id",
            put(colleges::handler::update_college).delete(colleges::handler::delete_college),
        )
        .route("/requests", post(colleges::handler::request_college));

    let confession_router = Router::new()
        .route(
            "/",
            post(confessions::handler::create_confession).get(confessions::handler::get_feed),
        )
        .route("/:id", delete(confessions::handler::delete_confession))
        .route("/:id/like", post(confessions::handler::toggle_like))
        .route(
            "/:id/comments",
            post(comments::handler::create_comment).get(comments::handler::get_comments),
        )
        .route("/:id/report", post(reports::handler::submit_report));

    let chat_router = Router::new()
        .route("/inbox", get(chat::handler::get_inbox))
        .route("/unread-count", get(chat::handler::get_unread_count))
        .route("/unread-counts", get(chat::handler::get_unread_counts))
        .route(
            "/:peer_id/messages",
            post(chat::handler::send_message).get(chat::handler::get_conversation),
        )
        .route("/:peer_id/accept", post(chat::handler::accept_chat))
        .route("/:peer_id/reject", post(chat::handler::reject_chat));

    let notification_router = Router::new()
        .route("/", get(notifications::handler::get_notifications))
        .route("/read", post(notifications::handler::mark_notifications_read))
        .route(
            "/unread-count",
            get(notifications::handler::get_unread_notification_count),
        );

    let admin_router = Router::new()
        .route("/users", get(admin::handler::get_all_users))
        .route("/users/:id", delete(admin::handler::delete_user))
        .route("/users/:id/ban", post(admin::handler::ban_user))
        .route("/users/:id/unban", post(admin::handler::unban_user))
        .route("/users/:id/suspend", post(admin::handler::suspend_user))
        .route("/confessions", get(admin::handler::get_all_confessions))
        .route(
            "/confessions/:id/hide",
            post(admin::handler::hide_confession),
        )
        .route(
            "/confessions/:id/unhide",
            post(admin::handler::unhide_confession),
        )
        .route("/reports", get(reports::handler::get_reports))
        .route("/reports/:id/resolve", post(reports::handler::resolve_report))
        .route("/reports/:id", delete(reports::handler::delete_report))
        .route(
            "/college-requests",
            get(colleges::handler::get_college_requests),
        )
        .route(
            "/college-requests/:id/approve",
            post(colleges::handler::approve_college_request),
        )
        .route(
            "/college-requests/:id",
            delete(colleges::handler::reject_college_request),
        )
        .route(
            "/announcements",
            post(notifications::handler::send_announcement),
        );

    let app = Router::new()
        .route("/", get(|| async { "UniConfess API" }))
        .route("/api/events", get(events::user_events_sse))
        .nest("/api/auth", auth_router)
        .nest("/api/users", user_router)
        .nest("/api/colleges", college_router)
        .nest("/api/confessions", confession_router)
        .nest("/api/chat", chat_router)
        .nest("/api/notifications", notification_router)
        .nest("/api/admin", admin_router)
        .with_state(app_state);

    info!("Server running on http://localhost:{}", settings.port);

    let listener = tokio::net::TcpListener::bind(settings.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
