//! Habitica tool catalogue.
//!
//! Each handler validates its own arguments before any upstream call, then
//! renders the upstream payload as text blocks.

use reqwest::Method;
use serde_json::{Value, json};

use crate::error::ToolError;
use crate::registry::{RegistryError, ToolRegistry};
use crate::upstream::UpstreamClient;

/// Turns an `async fn(Arc<dyn UpstreamClient>, Map<String, Value>)` into a
/// `ToolHandler` function pointer.
macro_rules! handler {
    ($f:path) => {{
        fn shim(
            upstream: ::std::sync::Arc<dyn $crate::upstream::UpstreamClient>,
            args: ::serde_json::Map<::std::string::String, ::serde_json::Value>,
        ) -> $crate::registry::HandlerFuture {
            Box::pin($f(upstream, args))
        }
        shim as $crate::registry::ToolHandler
    }};
}

mod checklist;
mod items;
mod profile;
mod tasks;

/// Registry pre-loaded with every Habitica tool, in listing order.
pub fn habitica_registry() -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    profile::register(&mut registry)?;
    tasks::register(&mut registry)?;
    checklist::register(&mut registry)?;
    tasks::register_tags(&mut registry)?;
    items::register(&mut registry)?;
    profile::register_notifications(&mut registry)?;
    Ok(registry)
}

fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn with_query(path: &str, pairs: &[(&str, &str)]) -> String {
    if pairs.is_empty() {
        return path.to_string();
    }
    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish();
    format!("{path}?{query}")
}

/// Fetches `GET /user?userFields=<fields>` and returns the nested section.
async fn user_section(upstream: &dyn UpstreamClient, fields: &str) -> Result<Value, ToolError> {
    let path = with_query("/user", &[("userFields", fields)]);
    let data = upstream.request(Method::GET, &path, None).await?;
    let pointer = format!("/{}", fields.replace('.', "/"));
    Ok(data.pointer(&pointer).cloned().unwrap_or(Value::Null))
}

fn read_f64(value: &Value, pointer: &str) -> Option<f64> {
    value.pointer(pointer).and_then(Value::as_f64)
}

fn read_str<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str)
}
