use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::settings::Settings;

/// Fire-and-forget FCM dispatch. Delivery is best effort: failures are
/// logged and never retried, and callers cannot observe them. When no
/// server key is configured the client is a no-op.
#[derive(Clone)]
pub struct PushClient {
    http: reqwest::Client,
    endpoint: String,
    server_key: Option<String>,
}

impl PushClient {
    pub fn new(settings: &Settings) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: settings.fcm_endpoint.clone(),
            server_key: settings.fcm_server_key.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn disabled() -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: String::new(),
            server_key: None,
        }
    }

    fn dispatch(&self, token: String, title: String, body: String, data: Value) {
        let Some(key) = self.server_key.clone() else {
            return;
        };
        let http = self.http.clone();
        let endpoint = self.endpoint.clone();

        tokio::spawn(async move {
            let payload = json!({
                "to": token,
                "notification": { "title": title, "body": body },
                "data": data,
            });
            let result = http
                .post(&endpoint)
                .header("Authorization", format!("key={}", key))
                .json(&payload)
                .send()
                .await;
            match result {
                Ok(resp) if !resp.status().is_success() => {
                    tracing::warn!("FCM rejected push: {}", resp.status());
                }
                Err(e) => tracing::warn!("FCM send error: {:?}", e),
                _ => {}
            }
        });
    }

    /// Push a stored notification to its recipient's device, if any.
    pub async fn push_notification(
        &self,
        pool: &PgPool,
        user_id: Uuid,
        kind: &str,
        content: Option<&str>,
        notification_id: Uuid,
    ) {
        if self.server_key.is_none() {
            return;
        }

        let token = sqlx::query_scalar::<_, Option<String>>(
            "SELECT fcm_token FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .ok()
        .flatten()
        .flatten();

        let Some(token) = token else { return };

        let title = if kind == "system" {
            "UniConfess Admin".to_string()
        } else {
            "UniConfess".to_string()
        };
        let body = content
            .unwrap_or("You have a new notification")
            .to_string();
        let data = json!({ "url": "/", "notificationId": notification_id });

        self.dispatch(token, title, body, data);
    }

    /// Push a new direct message to the receiver's device, if any.
    pub async fn push_message(
        &self,
        pool: &PgPool,
        receiver_id: Uuid,
        sender_name: &str,
        message_id: Uuid,
    ) {
        if self.server_key.is_none() {
            return;
        }

        let token = sqlx::query_scalar::<_, Option<String>>(
            "SELECT fcm_token FROM users WHERE id = $1",
        )
        .bind(receiver_id)
        .fetch_optional(pool)
        .await
        .ok()
        .flatten()
        .flatten();

        let Some(token) = token else { return };

        self.dispatch(
            token,
            "UniConfess".to_string(),
            format!("New message from {sender_name}"),
            json!({ "url": "/", "messageId": message_id }),
        );
    }

    /// Announce a fresh confession to every device registered in the
    /// college it was posted to.
    pub async fn push_confession_to_college(
        &self,
        pool: &PgPool,
        college_id: Uuid,
        confession_id: Uuid,
        author_id: Uuid,
    ) {
        if self.server_key.is_none() {
            return;
        }

        let tokens = sqlx::query_scalar::<_, String>(
            r#"
            SELECT fcm_token FROM users
            WHERE college_id = $1 AND fcm_token IS NOT NULL AND id != $2
            "#,
        )
        .bind(college_id)
        .bind(author_id)
        .fetch_all(pool)
        .await
        .unwrap_or_default();

        for token in tokens {
            self.dispatch(
                token,
                "UniConfess".to_string(),
                "Someone posted a new confession 👀".to_string(),
                json!({ "confessionId": confession_id }),
            );
        }
    }
}
