use std::sync::Arc;

use reqwest::Method;
use serde_json::{Map, Value, json};

use super::{object_schema, read_f64, read_str, user_section};
use crate::args::required_path_segment;
use crate::dispatcher::ResponseEnvelope;
use crate::error::ToolError;
use crate::registry::{RegistryError, ToolDefinition, ToolRegistry};
use crate::upstream::UpstreamClient;

pub(super) fn register(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    registry.register(
        ToolDefinition::new(
            "get_user_profile",
            "Get the user's profile: display name, class, level and core stats.",
            object_schema(json!({}), &[]),
        ),
        handler!(get_user_profile),
    )?;
    registry.register(
        ToolDefinition::new(
            "get_stats",
            "Get the user's current stats (health, mana, experience, gold, level).",
            object_schema(json!({}), &[]),
        ),
        handler!(get_stats),
    )
}

pub(super) fn register_notifications(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    registry.register(
        ToolDefinition::new(
            "get_notifications",
            "List the user's unread notifications.",
            object_schema(json!({}), &[]),
        ),
        handler!(get_notifications),
    )?;
    registry.register(
        ToolDefinition::new(
            "read_notification",
            "Mark a notification as read.",
            object_schema(
                json!({
                    "notificationId": { "type": "string", "description": "Notification ID" }
                }),
                &["notificationId"],
            ),
        ),
        handler!(read_notification),
    )
}

async fn get_user_profile(
    upstream: Arc<dyn UpstreamClient>,
    _args: Map<String, Value>,
) -> Result<ResponseEnvelope, ToolError> {
    let user = upstream.request(Method::GET, "/user", None).await?;
    let profile = json!({
        "id": user.get("id").or_else(|| user.get("_id")),
        "username": user.pointer("/auth/local/username"),
        "name": user.pointer("/profile/name"),
        "class": user.pointer("/stats/class"),
        "level": user.pointer("/stats/lvl"),
        "stats": {
            "hp": user.pointer("/stats/hp"),
            "maxHealth": user.pointer("/stats/maxHealth"),
            "mp": user.pointer("/stats/mp"),
            "maxMP": user.pointer("/stats/maxMP"),
            "exp": user.pointer("/stats/exp"),
            "toNextLevel": user.pointer("/stats/toNextLevel"),
            "gp": user.pointer("/stats/gp"),
        },
        "party": user.pointer("/party/_id"),
    });
    Ok(ResponseEnvelope::json(&profile))
}

async fn get_stats(
    upstream: Arc<dyn UpstreamClient>,
    _args: Map<String, Value>,
) -> Result<ResponseEnvelope, ToolError> {
    let stats = user_section(upstream.as_ref(), "stats").await?;
    Ok(ResponseEnvelope::text(stats_summary(&stats)).with_json(&stats))
}

fn stats_summary(stats: &Value) -> String {
    let num = |pointer: &str| read_f64(stats, pointer).unwrap_or(0.0);
    format!(
        "Level {} {} | HP {:.0}/{:.0} | MP {:.0}/{:.0} | EXP {:.0}/{:.0} | Gold {:.2}",
        num("/lvl"),
        read_str(stats, "/class").unwrap_or("adventurer"),
        num("/hp"),
        num("/maxHealth"),
        num("/mp"),
        num("/maxMP"),
        num("/exp"),
        num("/toNextLevel"),
        num("/gp"),
    )
}

async fn get_notifications(
    upstream: Arc<dyn UpstreamClient>,
    _args: Map<String, Value>,
) -> Result<ResponseEnvelope, ToolError> {
    let notifications = user_section(upstream.as_ref(), "notifications").await?;
    match notifications.as_array() {
        Some(items) if !items.is_empty() => Ok(ResponseEnvelope::json(&notifications)),
        _ => Ok(ResponseEnvelope::text("No unread notifications.")),
    }
}

async fn read_notification(
    upstream: Arc<dyn UpstreamClient>,
    args: Map<String, Value>,
) -> Result<ResponseEnvelope, ToolError> {
    let notification_id = required_path_segment(&args, "notificationId")?;
    upstream
        .request(
            Method::POST,
            &format!("/notifications/{notification_id}/read"),
            None,
        )
        .await?;
    Ok(ResponseEnvelope::text(format!(
        "Notification {notification_id} marked as read."
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingUpstream;

    #[tokio::test]
    async fn get_stats_requests_only_the_stats_field() {
        let upstream = Arc::new(RecordingUpstream::default());
        upstream.respond(Ok(json!({
            "stats": { "lvl": 7, "class": "healer", "hp": 42.3, "maxHealth": 50, "gp": 12.5 }
        })));

        let envelope = get_stats(upstream.clone(), Map::new()).await.unwrap();

        assert_eq!(upstream.calls()[0].path, "/user?userFields=stats");
        let first = envelope.texts().next().unwrap();
        assert!(first.starts_with("Level 7 healer"));
        assert!(first.contains("Gold 12.50"));
    }

    #[tokio::test]
    async fn read_notification_confirms_without_payload() {
        let upstream = Arc::new(RecordingUpstream::default());
        let envelope = read_notification(
            upstream.clone(),
            json!({ "notificationId": "n-42" }).as_object().cloned().unwrap(),
        )
        .await
        .unwrap();

        assert_eq!(upstream.calls()[0].path, "/notifications/n-42/read");
        assert!(envelope.texts().any(|t| t.contains("n-42")));
    }

    #[tokio::test]
    async fn empty_notifications_render_a_sentence() {
        let upstream = Arc::new(RecordingUpstream::default());
        upstream.respond(Ok(json!({ "notifications": [] })));
        let envelope = get_notifications(upstream, Map::new()).await.unwrap();
        assert_eq!(envelope.texts().next(), Some("No unread notifications."));
    }
}
