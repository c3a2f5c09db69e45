use std::sync::Arc;

use reqwest::Method;
use serde_json::{Map, Value, json};

use super::{object_schema, read_f64, read_str, user_section, with_query};
use crate::args::{
    arg_optional_string, arg_optional_u64, enum_or_default, required_enum, required_path_segment,
};
use crate::dispatcher::ResponseEnvelope;
use crate::error::ToolError;
use crate::registry::{RegistryError, ToolDefinition, ToolRegistry};
use crate::upstream::UpstreamClient;

const SHOP_TYPES: [&str; 4] = ["market", "questShop", "timeTravelersShop", "seasonalShop"];
const EQUIP_TYPES: [&str; 4] = ["equipped", "costume", "pet", "mount"];

pub(super) fn register(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    let no_args = || object_schema(json!({}), &[]);

    registry.register(
        ToolDefinition::new(
            "get_inventory",
            "Get the user's inventory: gear, eggs, potions, food and quest scrolls.",
            no_args(),
        ),
        handler!(get_inventory),
    )?;
    registry.register(
        ToolDefinition::new(
            "get_shop",
            "List what a shop currently sells.",
            object_schema(
                json!({
                    "shopType": { "type": "string", "enum": SHOP_TYPES, "default": "market" }
                }),
                &[],
            ),
        ),
        handler!(get_shop),
    )?;
    registry.register(
        ToolDefinition::new(
            "buy_item",
            "Buy an item from the market by key.",
            object_schema(
                json!({
                    "itemKey": { "type": "string" },
                    "quantity": { "type": "integer", "minimum": 1, "default": 1 }
                }),
                &["itemKey"],
            ),
        ),
        handler!(buy_item),
    )?;
    registry.register(
        ToolDefinition::new(
            "buy_reward",
            "Buy one of the user's custom rewards.",
            object_schema(json!({ "taskId": { "type": "string" } }), &["taskId"]),
        ),
        handler!(buy_reward),
    )?;
    registry.register(
        ToolDefinition::new("get_pets", "List the user's pets.", no_args()),
        handler!(get_pets),
    )?;
    registry.register(
        ToolDefinition::new(
            "feed_pet",
            "Feed a pet.",
            object_schema(
                json!({
                    "pet": { "type": "string", "description": "Pet key, e.g. Wolf-Base" },
                    "food": { "type": "string", "description": "Food key, e.g. Meat" }
                }),
                &["pet", "food"],
            ),
        ),
        handler!(feed_pet),
    )?;
    registry.register(
        ToolDefinition::new(
            "hatch_pet",
            "Hatch a pet from an egg and a hatching potion.",
            object_schema(
                json!({
                    "egg": { "type": "string" },
                    "hatchingPotion": { "type": "string" }
                }),
                &["egg", "hatchingPotion"],
            ),
        ),
        handler!(hatch_pet),
    )?;
    registry.register(
        ToolDefinition::new("get_mounts", "List the user's mounts.", no_args()),
        handler!(get_mounts),
    )?;
    registry.register(
        ToolDefinition::new(
            "equip_item",
            "Equip gear, a costume piece, a pet or a mount.",
            object_schema(
                json!({
                    "type": { "type": "string", "enum": EQUIP_TYPES },
                    "key": { "type": "string" }
                }),
                &["type", "key"],
            ),
        ),
        handler!(equip_item),
    )?;
    registry.register(
        ToolDefinition::new(
            "cast_spell",
            "Cast a class skill, optionally on a target task or party member.",
            object_schema(
                json!({
                    "spellId": { "type": "string" },
                    "targetId": { "type": "string" }
                }),
                &["spellId"],
            ),
        ),
        handler!(cast_spell),
    )
}

fn shop_path(shop_type: &str) -> &'static str {
    match shop_type {
        "questShop" => "/shops/quests",
        "timeTravelersShop" => "/shops/time-travelers",
        "seasonalShop" => "/shops/seasonal",
        _ => "/shops/market",
    }
}

/// Keys of an object whose value is truthy (owned pets, mounts).
fn owned_keys(section: &Value) -> Vec<&str> {
    section
        .as_object()
        .map(|map| {
            map.iter()
                .filter(|(_, v)| match v {
                    Value::Null | Value::Bool(false) => false,
                    Value::Number(n) => n.as_f64().is_some_and(|n| n > 0.0),
                    _ => true,
                })
                .map(|(k, _)| k.as_str())
                .collect()
        })
        .unwrap_or_default()
}

fn render_owned(kind: &str, section: &Value) -> ResponseEnvelope {
    let keys = owned_keys(section);
    if keys.is_empty() {
        return ResponseEnvelope::text(format!("No {kind} yet."));
    }
    ResponseEnvelope::text(format!("{} {kind}:\n{}", keys.len(), keys.join("\n")))
}

async fn get_inventory(
    upstream: Arc<dyn UpstreamClient>,
    _args: Map<String, Value>,
) -> Result<ResponseEnvelope, ToolError> {
    let items = user_section(upstream.as_ref(), "items").await?;
    Ok(ResponseEnvelope::json(&items))
}

async fn get_shop(
    upstream: Arc<dyn UpstreamClient>,
    args: Map<String, Value>,
) -> Result<ResponseEnvelope, ToolError> {
    let shop_type = enum_or_default(&args, "shopType", &SHOP_TYPES, "market")?;
    let shop = upstream
        .request(Method::GET, shop_path(&shop_type), None)
        .await?;
    Ok(ResponseEnvelope::json(&shop))
}

async fn buy_item(
    upstream: Arc<dyn UpstreamClient>,
    args: Map<String, Value>,
) -> Result<ResponseEnvelope, ToolError> {
    let item_key = required_path_segment(&args, "itemKey")?;
    let quantity = arg_optional_u64(&args, "quantity")?.unwrap_or(1);
    if quantity == 0 {
        return Err(ToolError::invalid("quantity", "'quantity' must be at least 1"));
    }
    let result = upstream
        .request(
            Method::POST,
            &format!("/user/buy/{item_key}"),
            Some(json!({ "quantity": quantity })),
        )
        .await?;
    let mut envelope = ResponseEnvelope::text(format!("Bought {quantity} x {item_key}"));
    if let Some(gp) = read_f64(&result, "/stats/gp") {
        envelope = envelope.with_text(format!("Remaining gold: {gp:.2}"));
    }
    Ok(envelope)
}

async fn buy_reward(
    upstream: Arc<dyn UpstreamClient>,
    args: Map<String, Value>,
) -> Result<ResponseEnvelope, ToolError> {
    let task_id = required_path_segment(&args, "taskId")?;
    let result = upstream
        .request(Method::POST, &format!("/tasks/{task_id}/score/up"), None)
        .await?;
    let gold = read_f64(&result, "/gp")
        .map(|gp| format!("{gp:.2}"))
        .unwrap_or_else(|| "unknown".to_string());
    Ok(ResponseEnvelope::text(format!(
        "Reward {task_id} purchased. Remaining gold: {gold}"
    )))
}

async fn get_pets(
    upstream: Arc<dyn UpstreamClient>,
    _args: Map<String, Value>,
) -> Result<ResponseEnvelope, ToolError> {
    let pets = user_section(upstream.as_ref(), "items.pets").await?;
    Ok(render_owned("pets", &pets))
}

async fn get_mounts(
    upstream: Arc<dyn UpstreamClient>,
    _args: Map<String, Value>,
) -> Result<ResponseEnvelope, ToolError> {
    let mounts = user_section(upstream.as_ref(), "items.mounts").await?;
    Ok(render_owned("mounts", &mounts))
}

async fn feed_pet(
    upstream: Arc<dyn UpstreamClient>,
    args: Map<String, Value>,
) -> Result<ResponseEnvelope, ToolError> {
    let pet = required_path_segment(&args, "pet")?;
    let food = required_path_segment(&args, "food")?;
    let result = upstream
        .request(Method::POST, &format!("/user/feed/{pet}/{food}"), None)
        .await?;
    let mut envelope = ResponseEnvelope::text(format!("Fed {food} to {pet}."));
    if let Some(fullness) = result.as_f64() {
        envelope = envelope.with_text(format!("Fullness: {fullness:.0}"));
    }
    Ok(envelope)
}

async fn hatch_pet(
    upstream: Arc<dyn UpstreamClient>,
    args: Map<String, Value>,
) -> Result<ResponseEnvelope, ToolError> {
    let egg = required_path_segment(&args, "egg")?;
    let potion = required_path_segment(&args, "hatchingPotion")?;
    upstream
        .request(Method::POST, &format!("/user/hatch/{egg}/{potion}"), None)
        .await?;
    Ok(ResponseEnvelope::text(format!("Hatched a {potion} {egg}!")))
}

async fn equip_item(
    upstream: Arc<dyn UpstreamClient>,
    args: Map<String, Value>,
) -> Result<ResponseEnvelope, ToolError> {
    let kind = required_enum(&args, "type", &EQUIP_TYPES)?;
    let key = required_path_segment(&args, "key")?;
    upstream
        .request(Method::POST, &format!("/user/equip/{kind}/{key}"), None)
        .await?;
    Ok(ResponseEnvelope::text(format!("Equipped {key} ({kind}).")))
}

async fn cast_spell(
    upstream: Arc<dyn UpstreamClient>,
    args: Map<String, Value>,
) -> Result<ResponseEnvelope, ToolError> {
    let spell_id = required_path_segment(&args, "spellId")?;
    let target = arg_optional_string(&args, "targetId")?;
    let base = format!("/user/class/cast/{spell_id}");
    let path = match target.as_deref() {
        Some(target) => with_query(&base, &[("targetId", target)]),
        None => base,
    };
    let result = upstream.request(Method::POST, &path, None).await?;
    let mut envelope = ResponseEnvelope::text(format!("Cast {spell_id}."));
    if let Some(mp) = read_f64(&result, "/user/stats/mp") {
        envelope = envelope.with_text(format!("Remaining mana: {mp:.0}"));
    }
    if let Some(class) = read_str(&result, "/user/stats/class") {
        envelope = envelope.with_text(format!("Class: {class}"));
    }
    Ok(envelope)
}
