//! Normalization layer between store metadata blobs and typed records.
//!
//! The store keeps item collections as loosely-typed JSON: arrays of item
//! objects, sometimes wrapped in a legacy extra array level, with reminders
//! encoded as JSON *strings* inside the item and assignees stored either as
//! a scalar or an array. Decoding is lenient field by field; anything that
//! cannot be made sense of is dropped, never an error. Encoding writes the
//! shape the rest of the application expects back, reminders re-encoded as
//! JSON strings.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use duewatch_core::{ItemId, UserId};

use crate::item::{Item, ItemKind, Reminder};

/// Decode one per-project item collection.
///
/// Tolerates the legacy double-nested shape (`[[{..}, {..}]]`) produced by
/// older versions of the editor. Items without an id are skipped.
pub fn decode_items(kind: ItemKind, value: &Value) -> BTreeMap<ItemId, Item> {
    let mut items = BTreeMap::new();

    let Some(list) = value.as_array() else {
        return items;
    };

    // Legacy storage wrapped the item list in one extra array level.
    let list = match list.first() {
        Some(Value::Array(inner)) if !inner.is_empty() => inner,
        _ => list,
    };

    for entry in list {
        if let Some(item) = decode_item(kind, entry) {
            items.insert(item.id.clone(), item);
        }
    }

    items
}

/// Decode a single item object. `None` when the entry has no usable id.
pub fn decode_item(kind: ItemKind, value: &Value) -> Option<Item> {
    let map = value.as_object()?;
    let id = map.get("id").and_then(lenient_string)?;

    let mut item = Item::new(ItemId::new(id), kind);
    item.title = map.get("title").and_then(lenient_string);
    item.milestone = map.get("milestone").and_then(lenient_string);
    item.due_date = map.get("due_date").and_then(lenient_i64);
    item.end_date = map.get("end_date").and_then(lenient_i64);
    item.assigned_to = map
        .get("assigned_to")
        .map(decode_assignees)
        .unwrap_or_default();
    item.reminders = map
        .get("reminders")
        .map(decode_reminders)
        .unwrap_or_default();

    Some(item)
}

/// Encode a collection back into store shape: an array of item objects with
/// reminders as JSON strings. Optional fields are omitted when absent.
pub fn encode_items(items: &BTreeMap<ItemId, Item>) -> Value {
    Value::Array(items.values().map(encode_item).collect())
}

fn encode_item(item: &Item) -> Value {
    let mut map = serde_json::Map::new();
    map.insert("id".into(), json!(item.id.as_str()));
    if let Some(title) = &item.title {
        map.insert("title".into(), json!(title));
    }
    if let Some(milestone) = &item.milestone {
        map.insert("milestone".into(), json!(milestone));
    }
    if let Some(due) = item.due_date {
        map.insert("due_date".into(), json!(due));
    }
    if let Some(end) = item.end_date {
        map.insert("end_date".into(), json!(end));
    }
    map.insert(
        "assigned_to".into(),
        Value::Array(
            item.assigned_to
                .iter()
                .map(|u| json!(u.as_i64()))
                .collect(),
        ),
    );
    map.insert(
        "reminders".into(),
        Value::Array(
            item.reminders
                .iter()
                .map(|r| json!(encode_reminder(r)))
                .collect(),
        ),
    );
    Value::Object(map)
}

fn encode_reminder(reminder: &Reminder) -> String {
    // Reminders are stored as JSON strings inside the item record.
    serde_json::to_string(reminder).unwrap_or_else(|_| String::from("{}"))
}

/// Normalize the `assigned_to` field into user ids.
///
/// Accepts a lone scalar or an array; entries that do not parse to a
/// non-zero integer are dropped.
fn decode_assignees(value: &Value) -> Vec<UserId> {
    let entries: Vec<&Value> = match value {
        Value::Array(list) => list.iter().collect(),
        other => vec![other],
    };

    entries
        .into_iter()
        .filter_map(lenient_i64)
        .filter(|id| *id != 0)
        .map(UserId::new)
        .collect()
}

/// Decode the reminder list; each entry is either a JSON string or a plain
/// object. Undecodable entries are dropped.
fn decode_reminders(value: &Value) -> Vec<Reminder> {
    let Some(list) = value.as_array() else {
        return Vec::new();
    };

    list.iter()
        .filter_map(|entry| match entry {
            Value::String(raw) => serde_json::from_str::<Value>(raw)
                .ok()
                .as_ref()
                .and_then(decode_reminder),
            other => decode_reminder(other),
        })
        .collect()
}

fn decode_reminder(value: &Value) -> Option<Reminder> {
    let map = value.as_object()?;
    let code = map.get("reminder").and_then(lenient_i64)?;
    let sent = map.get("sent").map(lenient_bool).unwrap_or(false);
    let sent_at = map.get("sent_at").and_then(lenient_i64);

    Some(Reminder {
        reminder: code,
        sent,
        sent_at,
    })
}

fn lenient_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn lenient_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn lenient_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().is_some_and(|v| v != 0),
        Value::String(s) => s == "1" || s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}
