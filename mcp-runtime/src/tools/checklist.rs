use std::sync::Arc;

use reqwest::Method;
use serde_json::{Map, Value, json};

use super::{object_schema, read_str};
use crate::args::{arg_optional_bool, arg_optional_string, required_path_segment, required_string};
use crate::dispatcher::ResponseEnvelope;
use crate::error::ToolError;
use crate::registry::{RegistryError, ToolDefinition, ToolRegistry};
use crate::upstream::UpstreamClient;

pub(super) fn register(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    let task_only = || object_schema(json!({ "taskId": { "type": "string" } }), &["taskId"]);
    let task_and_item = || {
        object_schema(
            json!({
                "taskId": { "type": "string" },
                "itemId": { "type": "string", "description": "Checklist item ID" }
            }),
            &["taskId", "itemId"],
        )
    };

    registry.register(
        ToolDefinition::new(
            "get_task_checklist",
            "List the checklist items of a daily or to-do.",
            task_only(),
        ),
        handler!(get_task_checklist),
    )?;
    registry.register(
        ToolDefinition::new(
            "add_checklist_item",
            "Append an item to a task's checklist.",
            object_schema(
                json!({
                    "taskId": { "type": "string" },
                    "text": { "type": "string" }
                }),
                &["taskId", "text"],
            ),
        ),
        handler!(add_checklist_item),
    )?;
    registry.register(
        ToolDefinition::new(
            "update_checklist_item",
            "Rename a checklist item or set its completion flag.",
            object_schema(
                json!({
                    "taskId": { "type": "string" },
                    "itemId": { "type": "string" },
                    "text": { "type": "string" },
                    "completed": { "type": "boolean" }
                }),
                &["taskId", "itemId"],
            ),
        ),
        handler!(update_checklist_item),
    )?;
    registry.register(
        ToolDefinition::new(
            "delete_checklist_item",
            "Remove an item from a task's checklist.",
            task_and_item(),
        ),
        handler!(delete_checklist_item),
    )?;
    registry.register(
        ToolDefinition::new(
            "score_checklist_item",
            "Toggle a checklist item's completion.",
            task_and_item(),
        ),
        handler!(score_checklist_item),
    )
}

fn render_checklist(task: &Value) -> String {
    let items = task
        .get("checklist")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    if items.is_empty() {
        return "No checklist items".to_string();
    }
    items
        .iter()
        .map(|item| {
            let mark = if item.get("completed").and_then(Value::as_bool) == Some(true) {
                "x"
            } else {
                " "
            };
            format!(
                "[{mark}] {} ({})",
                read_str(item, "/text").unwrap_or(""),
                read_str(item, "/id").unwrap_or("?")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

async fn get_task_checklist(
    upstream: Arc<dyn UpstreamClient>,
    args: Map<String, Value>,
) -> Result<ResponseEnvelope, ToolError> {
    let task_id = required_path_segment(&args, "taskId")?;
    let task = upstream
        .request(Method::GET, &format!("/tasks/{task_id}"), None)
        .await?;
    Ok(ResponseEnvelope::text(render_checklist(&task)))
}

async fn add_checklist_item(
    upstream: Arc<dyn UpstreamClient>,
    args: Map<String, Value>,
) -> Result<ResponseEnvelope, ToolError> {
    let task_id = required_path_segment(&args, "taskId")?;
    let text = required_string(&args, "text")?;
    let task = upstream
        .request(
            Method::POST,
            &format!("/tasks/{task_id}/checklist"),
            Some(json!({ "text": text })),
        )
        .await?;
    Ok(ResponseEnvelope::text(format!("Added checklist item: {text}"))
        .with_text(render_checklist(&task)))
}

async fn update_checklist_item(
    upstream: Arc<dyn UpstreamClient>,
    args: Map<String, Value>,
) -> Result<ResponseEnvelope, ToolError> {
    let task_id = required_path_segment(&args, "taskId")?;
    let item_id = required_path_segment(&args, "itemId")?;
    let mut body = Map::new();
    if let Some(text) = arg_optional_string(&args, "text")? {
        body.insert("text".to_string(), json!(text));
    }
    if let Some(completed) = arg_optional_bool(&args, "completed")? {
        body.insert("completed".to_string(), json!(completed));
    }
    if body.is_empty() {
        return Err(ToolError::invalid(
            "arguments",
            "Provide 'text' or 'completed' to update the item",
        ));
    }

    let task = upstream
        .request(
            Method::PUT,
            &format!("/tasks/{task_id}/checklist/{item_id}"),
            Some(Value::Object(body)),
        )
        .await?;
    Ok(ResponseEnvelope::text(format!("Updated checklist item {item_id}"))
        .with_text(render_checklist(&task)))
}

async fn delete_checklist_item(
    upstream: Arc<dyn UpstreamClient>,
    args: Map<String, Value>,
) -> Result<ResponseEnvelope, ToolError> {
    let task_id = required_path_segment(&args, "taskId")?;
    let item_id = required_path_segment(&args, "itemId")?;
    upstream
        .request(
            Method::DELETE,
            &format!("/tasks/{task_id}/checklist/{item_id}"),
            None,
        )
        .await?;
    Ok(ResponseEnvelope::text(format!(
        "Deleted checklist item {item_id} from task {task_id}"
    )))
}

async fn score_checklist_item(
    upstream: Arc<dyn UpstreamClient>,
    args: Map<String, Value>,
) -> Result<ResponseEnvelope, ToolError> {
    let task_id = required_path_segment(&args, "taskId")?;
    let item_id = required_path_segment(&args, "itemId")?;
    let task = upstream
        .request(
            Method::POST,
            &format!("/tasks/{task_id}/checklist/{item_id}/score"),
            None,
        )
        .await?;
    Ok(ResponseEnvelope::text(format!("Toggled checklist item {item_id}"))
        .with_text(render_checklist(&task)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingUpstream;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn checklist_renders_completion_marks() {
        let task = json!({
            "checklist": [
                { "id": "c1", "text": "flour", "completed": true },
                { "id": "c2", "text": "eggs", "completed": false }
            ]
        });
        assert_eq!(render_checklist(&task), "[x] flour (c1)\n[ ] eggs (c2)");
        assert_eq!(render_checklist(&json!({})), "No checklist items");
    }

    #[tokio::test]
    async fn delete_item_confirms_both_identifiers() {
        let upstream = Arc::new(RecordingUpstream::default());
        let envelope = delete_checklist_item(
            upstream.clone(),
            args(json!({ "taskId": "t-1", "itemId": "c-7" })),
        )
        .await
        .unwrap();

        let call = &upstream.calls()[0];
        assert_eq!(call.method, Method::DELETE);
        assert_eq!(call.path, "/tasks/t-1/checklist/c-7");
        assert_eq!(
            envelope.texts().next(),
            Some("Deleted checklist item c-7 from task t-1")
        );
    }

    #[tokio::test]
    async fn update_item_sends_only_supplied_fields() {
        let upstream = Arc::new(RecordingUpstream::default());
        update_checklist_item(
            upstream.clone(),
            args(json!({ "taskId": "t-1", "itemId": "c-7", "completed": true })),
        )
        .await
        .unwrap();
        assert_eq!(
            upstream.calls()[0].body,
            Some(json!({ "completed": true }))
        );
    }

    #[tokio::test]
    async fn item_id_is_required() {
        let upstream = Arc::new(RecordingUpstream::default());
        let err = score_checklist_item(upstream.clone(), args(json!({ "taskId": "t-1" })))
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("itemId"));
        assert!(upstream.calls().is_empty());
    }
}
