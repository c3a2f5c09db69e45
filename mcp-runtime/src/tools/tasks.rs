use std::sync::Arc;

use reqwest::Method;
use serde_json::{Map, Value, json};

use super::{object_schema, read_f64, read_str, with_query};
use crate::args::{
    arg_optional_string, arg_optional_string_array, enum_or_default, required_enum,
    required_path_segment, required_string,
};
use crate::dispatcher::ResponseEnvelope;
use crate::error::ToolError;
use crate::registry::{RegistryError, ToolDefinition, ToolRegistry};
use crate::upstream::UpstreamClient;

const TASK_TYPES: [&str; 4] = ["habit", "daily", "todo", "reward"];
const TASK_LIST_TYPES: [&str; 5] = ["habits", "dailys", "todos", "rewards", "completedTodos"];
const DIFFICULTIES: [&str; 4] = ["trivial", "easy", "medium", "hard"];
const DIRECTIONS: [&str; 2] = ["up", "down"];

pub(super) fn register(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    registry.register(
        ToolDefinition::new(
            "get_tasks",
            "List the user's tasks, optionally filtered by type.",
            object_schema(
                json!({
                    "type": { "type": "string", "enum": TASK_LIST_TYPES, "description": "Task list to fetch" }
                }),
                &[],
            ),
        ),
        handler!(get_tasks),
    )?;
    registry.register(
        ToolDefinition::new(
            "create_task",
            "Create a habit, daily, to-do or reward.",
            object_schema(
                json!({
                    "type": { "type": "string", "enum": TASK_TYPES },
                    "text": { "type": "string", "description": "Task title" },
                    "notes": { "type": "string" },
                    "difficulty": { "type": "string", "enum": DIFFICULTIES, "default": "easy" },
                    "date": { "type": "string", "description": "Due date (ISO 8601), to-dos only" },
                    "checklist": { "type": "array", "items": { "type": "string" } }
                }),
                &["type", "text"],
            ),
        ),
        handler!(create_task),
    )?;
    registry.register(
        ToolDefinition::new(
            "update_task",
            "Update a task's title, notes, difficulty or due date.",
            object_schema(
                json!({
                    "taskId": { "type": "string" },
                    "text": { "type": "string" },
                    "notes": { "type": "string" },
                    "difficulty": { "type": "string", "enum": DIFFICULTIES },
                    "date": { "type": "string" }
                }),
                &["taskId"],
            ),
        ),
        handler!(update_task),
    )?;
    registry.register(
        ToolDefinition::new(
            "delete_task",
            "Delete a task.",
            object_schema(json!({ "taskId": { "type": "string" } }), &["taskId"]),
        ),
        handler!(delete_task),
    )?;
    registry.register(
        ToolDefinition::new(
            "score_task",
            "Score a task up (complete / positive habit) or down (negative habit).",
            object_schema(
                json!({
                    "taskId": { "type": "string" },
                    "direction": { "type": "string", "enum": DIRECTIONS, "default": "up" }
                }),
                &["taskId"],
            ),
        ),
        handler!(score_task),
    )
}

pub(super) fn register_tags(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    registry.register(
        ToolDefinition::new(
            "get_tags",
            "List the user's tags.",
            object_schema(json!({}), &[]),
        ),
        handler!(get_tags),
    )?;
    registry.register(
        ToolDefinition::new(
            "create_tag",
            "Create a new tag.",
            object_schema(json!({ "name": { "type": "string" } }), &["name"]),
        ),
        handler!(create_tag),
    )
}

/// Habitica stores difficulty as a numeric priority.
fn priority(difficulty: &str) -> f64 {
    match difficulty {
        "trivial" => 0.1,
        "medium" => 1.5,
        "hard" => 2.0,
        _ => 1.0,
    }
}

async fn get_tasks(
    upstream: Arc<dyn UpstreamClient>,
    args: Map<String, Value>,
) -> Result<ResponseEnvelope, ToolError> {
    let path = match arg_optional_string(&args, "type")? {
        Some(kind) if TASK_LIST_TYPES.contains(&kind.as_str()) => {
            with_query("/tasks/user", &[("type", &kind)])
        }
        Some(_) => {
            return Err(ToolError::invalid(
                "type",
                format!("'type' must be one of: {}", TASK_LIST_TYPES.join(", ")),
            ));
        }
        None => "/tasks/user".to_string(),
    };
    let tasks = upstream.request(Method::GET, &path, None).await?;
    Ok(ResponseEnvelope::json(&tasks))
}

async fn create_task(
    upstream: Arc<dyn UpstreamClient>,
    args: Map<String, Value>,
) -> Result<ResponseEnvelope, ToolError> {
    let kind = required_enum(&args, "type", &TASK_TYPES)?;
    let text = required_string(&args, "text")?;
    let difficulty = enum_or_default(&args, "difficulty", &DIFFICULTIES, "easy")?;

    let mut body = json!({
        "type": kind,
        "text": text,
        "priority": priority(&difficulty),
    });
    if let Some(notes) = arg_optional_string(&args, "notes")? {
        body["notes"] = json!(notes);
    }
    if let Some(date) = arg_optional_string(&args, "date")? {
        body["date"] = json!(date);
    }
    if let Some(items) = arg_optional_string_array(&args, "checklist")? {
        body["checklist"] = items
            .into_iter()
            .map(|text| json!({ "text": text, "completed": false }))
            .collect();
    }

    let task = upstream.request(Method::POST, "/tasks/user", Some(body)).await?;
    let id = read_str(&task, "/id").or_else(|| read_str(&task, "/_id")).unwrap_or("unknown");
    Ok(ResponseEnvelope::text(format!(
        "Successfully created {kind}: {text} (ID: {id})"
    )))
}

async fn update_task(
    upstream: Arc<dyn UpstreamClient>,
    args: Map<String, Value>,
) -> Result<ResponseEnvelope, ToolError> {
    let task_id = required_path_segment(&args, "taskId")?;
    let mut body = Map::new();
    for key in ["text", "notes", "date"] {
        if let Some(value) = arg_optional_string(&args, key)? {
            body.insert(key.to_string(), json!(value));
        }
    }
    if args.contains_key("difficulty") {
        let difficulty = required_enum(&args, "difficulty", &DIFFICULTIES)?;
        body.insert("priority".to_string(), json!(priority(&difficulty)));
    }
    if body.is_empty() {
        return Err(ToolError::invalid(
            "arguments",
            "Provide at least one of: text, notes, difficulty, date",
        ));
    }

    let task = upstream
        .request(Method::PUT, &format!("/tasks/{task_id}"), Some(Value::Object(body)))
        .await?;
    let title = read_str(&task, "/text").unwrap_or(&task_id);
    Ok(ResponseEnvelope::text(format!("Successfully updated task: {title}")))
}

async fn delete_task(
    upstream: Arc<dyn UpstreamClient>,
    args: Map<String, Value>,
) -> Result<ResponseEnvelope, ToolError> {
    let task_id = required_path_segment(&args, "taskId")?;
    upstream
        .request(Method::DELETE, &format!("/tasks/{task_id}"), None)
        .await?;
    Ok(ResponseEnvelope::text(format!(
        "Successfully deleted task (ID: {task_id})"
    )))
}

async fn score_task(
    upstream: Arc<dyn UpstreamClient>,
    args: Map<String, Value>,
) -> Result<ResponseEnvelope, ToolError> {
    let task_id = required_path_segment(&args, "taskId")?;
    let direction = enum_or_default(&args, "direction", &DIRECTIONS, "up")?;
    let result = upstream
        .request(
            Method::POST,
            &format!("/tasks/{task_id}/score/{direction}"),
            None,
        )
        .await?;
    Ok(ResponseEnvelope::text(score_summary(&direction, &result)))
}

/// Natural-language summary of a score response (`delta`, stats, `_tmp`).
pub(super) fn score_summary(direction: &str, result: &Value) -> String {
    let mut lines = vec![format!("Task scored {direction} successfully!")];
    if let Some(delta) = read_f64(result, "/delta") {
        lines.push(format!("Task value changed by {delta:+.2}"));
    }
    if let Some(exp) = read_f64(result, "/exp") {
        lines.push(format!("Experience: {exp:.0}"));
    }
    if let Some(gp) = read_f64(result, "/gp") {
        lines.push(format!("Gold: {gp:.2}"));
    }
    if let Some(hp) = read_f64(result, "/hp") {
        lines.push(format!("Health: {hp:.1}"));
    }
    let leveled_up = result
        .pointer("/_tmp/leveledUp")
        .is_some_and(|v| !v.is_null() && v != &Value::Bool(false));
    if leveled_up {
        let level = read_f64(result, "/lvl")
            .map(|lvl| format!("{lvl:.0}"))
            .unwrap_or_else(|| "?".to_string());
        lines.push(format!("Level up! You are now level {level}"));
    }
    if let Some(drop) = read_str(result, "/_tmp/drop/dialog") {
        lines.push(format!("Item drop: {drop}"));
    }
    lines.join("\n")
}

async fn get_tags(
    upstream: Arc<dyn UpstreamClient>,
    _args: Map<String, Value>,
) -> Result<ResponseEnvelope, ToolError> {
    let tags = upstream.request(Method::GET, "/tags", None).await?;
    Ok(ResponseEnvelope::json(&tags))
}

async fn create_tag(
    upstream: Arc<dyn UpstreamClient>,
    args: Map<String, Value>,
) -> Result<ResponseEnvelope, ToolError> {
    let name = required_string(&args, "name")?;
    let tag = upstream
        .request(Method::POST, "/tags", Some(json!({ "name": name })))
        .await?;
    let id = read_str(&tag, "/id").unwrap_or("unknown");
    Ok(ResponseEnvelope::text(format!(
        "Successfully created tag: {name} (ID: {id})"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingUpstream;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn create_task_maps_difficulty_and_checklist() {
        let upstream = Arc::new(RecordingUpstream::default());
        upstream.respond(Ok(json!({ "id": "t-1", "text": "buy milk" })));

        let envelope = create_task(
            upstream.clone(),
            args(json!({
                "type": "todo",
                "text": "buy milk",
                "difficulty": "hard",
                "checklist": ["oat", "whole"]
            })),
        )
        .await
        .unwrap();

        let call = &upstream.calls()[0];
        assert_eq!(call.method, Method::POST);
        assert_eq!(call.path, "/tasks/user");
        let body = call.body.clone().unwrap();
        assert_eq!(body["priority"], 2.0);
        assert_eq!(body["checklist"][1]["text"], "whole");
        assert_eq!(
            envelope.texts().next(),
            Some("Successfully created todo: buy milk (ID: t-1)")
        );
    }

    #[tokio::test]
    async fn create_task_rejects_unknown_type_before_upstream() {
        let upstream = Arc::new(RecordingUpstream::default());
        let err = create_task(upstream.clone(), args(json!({ "type": "chore", "text": "x" })))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgument { .. }));
        assert!(upstream.calls().is_empty());
    }

    #[tokio::test]
    async fn update_task_requires_some_change() {
        let upstream = Arc::new(RecordingUpstream::default());
        let err = update_task(upstream.clone(), args(json!({ "taskId": "t-1" })))
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("arguments"));
        assert!(upstream.calls().is_empty());
    }

    #[tokio::test]
    async fn delete_task_confirms_identifier() {
        let upstream = Arc::new(RecordingUpstream::default());
        let envelope = delete_task(upstream.clone(), args(json!({ "taskId": "t-9" })))
            .await
            .unwrap();
        assert_eq!(upstream.calls()[0].method, Method::DELETE);
        assert_eq!(
            envelope.texts().next(),
            Some("Successfully deleted task (ID: t-9)")
        );
    }

    #[tokio::test]
    async fn get_tasks_filters_by_type_query() {
        let upstream = Arc::new(RecordingUpstream::default());
        upstream.respond(Ok(json!([])));
        get_tasks(upstream.clone(), args(json!({ "type": "dailys" })))
            .await
            .unwrap();
        assert_eq!(upstream.calls()[0].path, "/tasks/user?type=dailys");
    }

    #[test]
    fn score_summary_mentions_rewards_and_level_up() {
        let summary = score_summary(
            "up",
            &json!({
                "delta": 0.98,
                "exp": 150,
                "gp": 23.456,
                "lvl": 11,
                "_tmp": { "leveledUp": { "oldLvl": 10, "newLvl": 11 } }
            }),
        );
        assert!(summary.contains("Experience: 150"));
        assert!(summary.contains("Gold: 23.46"));
        assert!(summary.contains("Level up! You are now level 11"));
        assert!(summary.contains("+0.98"));
    }

    #[test]
    fn score_summary_skips_level_up_when_absent() {
        let summary = score_summary("down", &json!({ "delta": -1.0, "hp": 41.2 }));
        assert!(summary.starts_with("Task scored down successfully!"));
        assert!(!summary.contains("Level up"));
        assert!(summary.contains("Health: 41.2"));
    }
}
