//! In-place patches on DSS settings documents.
//!
//! DSS hands back settings as nested JSON. The helpers here apply the small
//! set of edits tools need (merge keys, replace a field, extend or prune a
//! list by index) without touching anything else in the document.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use crate::types::{CloneModifications, JsonObject, StepChanges};
use crate::{Error, Result};

/// Make `value` an object (replacing anything else) and return its map.
pub fn as_object_mut(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just made an object"),
    }
}

/// Shallow merge: every key of `patch` overwrites the same key in `target`.
pub fn merge_object<I>(target: &mut Value, patch: I)
where
    I: IntoIterator<Item = (String, Value)>,
{
    let map = as_object_mut(target);
    for (key, value) in patch {
        map.insert(key, value);
    }
}

/// The array stored under `key`, created empty when missing.
fn array_mut<'a>(parent: &'a mut Value, key: &str) -> &'a mut Vec<Value> {
    let slot = as_object_mut(parent)
        .entry(key.to_string())
        .or_insert_with(|| json!([]));
    if !slot.is_array() {
        *slot = json!([]);
    }
    match slot {
        Value::Array(items) => items,
        _ => unreachable!("slot was just made an array"),
    }
}

/// Scenario triggers: `settings.triggers`.
pub fn triggers_mut(settings: &mut Value) -> &mut Vec<Value> {
    array_mut(settings, "triggers")
}

/// Scenario steps: `settings.params.steps`.
pub fn steps_mut(settings: &mut Value) -> &mut Vec<Value> {
    let params = as_object_mut(settings)
        .entry("params")
        .or_insert_with(|| json!({}));
    array_mut(params, "steps")
}

pub fn triggers(settings: &Value) -> &[Value] {
    settings
        .get("triggers")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

pub fn steps(settings: &Value) -> &[Value] {
    settings
        .get("params")
        .and_then(|p| p.get("steps"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Apply description, tags and custom fields to a metadata document.
///
/// Returns the names of the fields that changed, in application order.
pub fn apply_metadata(
    metadata: &mut Value,
    description: Option<&str>,
    tags: Option<&[String]>,
    custom_fields: Option<&JsonObject>,
) -> Vec<&'static str> {
    let mut updated = Vec::new();
    let map = as_object_mut(metadata);
    if let Some(description) = description {
        map.insert("description".into(), json!(description));
        updated.push("description");
    }
    if let Some(tags) = tags {
        map.insert("tags".into(), json!(tags));
        updated.push("tags");
    }
    if let Some(fields) = custom_fields {
        let custom = map.entry("customFields").or_insert_with(|| json!({}));
        merge_object(custom, fields.clone());
        updated.push("custom_fields");
    }
    updated
}

/// Replace the script of the custom_python step at `index`.
pub fn set_step_script(settings: &mut Value, index: usize, script: &str) -> Result<()> {
    let steps = steps_mut(settings);
    let step = steps.get_mut(index).ok_or_else(|| {
        Error::invalid_param("step_index", format!("Step index {index} is out of range"))
    })?;
    if step.get("type").and_then(Value::as_str) != Some("custom_python") {
        return Err(Error::invalid_param(
            "step_index",
            format!("Step {index} is not a custom_python step"),
        ));
    }
    let params = as_object_mut(step)
        .entry("params")
        .or_insert_with(|| json!({}));
    as_object_mut(params).insert("script".into(), json!(script));
    Ok(())
}

/// Apply per-index step changes. Keys that are not valid indices are ignored.
pub fn apply_step_changes(steps: &mut [Value], changes: &BTreeMap<String, StepChanges>) {
    for (key, change) in changes {
        let Some(step) = key.parse::<usize>().ok().and_then(|i| steps.get_mut(i)) else {
            continue;
        };
        let is_python = step.get("type").and_then(Value::as_str) == Some("custom_python");
        let map = as_object_mut(step);
        if let Some(params) = &change.params {
            let slot = map.entry("params").or_insert_with(|| json!({}));
            merge_object(slot, params.clone());
        }
        if let Some(code) = change.code.as_ref().filter(|_| is_python) {
            let slot = map.entry("params").or_insert_with(|| json!({}));
            as_object_mut(slot).insert("script".into(), json!(code));
        }
        if let Some(name) = &change.name {
            map.insert("name".into(), json!(name));
        }
        if let Some(enabled) = change.enabled {
            map.insert("enabled".into(), json!(enabled));
        }
    }
}

/// Merge keys into triggers by index. Out-of-range keys are ignored.
pub fn apply_trigger_changes(triggers: &mut [Value], changes: &BTreeMap<String, JsonObject>) {
    for (key, change) in changes {
        if let Some(trigger) = key.parse::<usize>().ok().and_then(|i| triggers.get_mut(i)) {
            merge_object(trigger, change.clone());
        }
    }
}

/// Remove items by index, highest index first so earlier removals do not
/// shift later targets. Duplicates and out-of-range indices are skipped.
pub fn remove_indices(items: &mut Vec<Value>, indices: &[usize]) -> Vec<Value> {
    let mut order = indices.to_vec();
    order.sort_unstable_by(|a, b| b.cmp(a));
    order.dedup();
    let mut removed = Vec::with_capacity(order.len());
    for i in order {
        if i < items.len() {
            removed.push(items.remove(i));
        }
    }
    removed
}

/// Apply the settings part of clone modifications: active flag, step and
/// trigger edits, appended triggers, then trigger removals.
pub fn apply_clone_modifications(settings: &mut Value, mods: &CloneModifications) {
    if let Some(active) = mods.active {
        as_object_mut(settings).insert("active".into(), json!(active));
    }
    if let Some(changes) = &mods.step_modifications {
        apply_step_changes(steps_mut(settings), changes);
    }
    if let Some(changes) = &mods.trigger_modifications {
        apply_trigger_changes(triggers_mut(settings), changes);
    }
    if let Some(extra) = &mods.new_triggers {
        triggers_mut(settings).extend(extra.iter().cloned());
    }
    if let Some(indices) = &mods.remove_triggers {
        remove_indices(triggers_mut(settings), indices);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Value {
        json!({
            "name": "nightly",
            "active": false,
            "triggers": [
                {"type": "temporal", "name": "t0"},
                {"type": "temporal", "name": "t1"},
                {"type": "ds_modified", "name": "t2"},
            ],
            "params": {"steps": [
                {"type": "build_flowitem", "name": "build", "params": {"items": []}},
                {"type": "custom_python", "name": "script", "params": {"script": "pass"}},
            ]}
        })
    }

    #[test]
    fn removals_run_in_descending_order() {
        let mut items = vec![json!("a"), json!("b"), json!("c"), json!("d")];
        let removed = remove_indices(&mut items, &[2, 0]);
        assert_eq!(removed, vec![json!("c"), json!("a")]);
        assert_eq!(items, vec![json!("b"), json!("d")]);
    }

    #[test]
    fn removals_skip_duplicates_and_out_of_range() {
        let mut items = vec![json!(0), json!(1)];
        let removed = remove_indices(&mut items, &[1, 1, 9]);
        assert_eq!(removed, vec![json!(1)]);
        assert_eq!(items, vec![json!(0)]);
    }

    #[test]
    fn clone_modifications_edit_steps_and_triggers() {
        let mut s = settings();
        let mods: CloneModifications = serde_json::from_value(json!({
            "active": true,
            "step_modifications": {
                "0": {"code": "ignored", "enabled": false},
                "1": {"code": "print('x')", "name": "renamed", "params": {"timeout": 5}},
                "7": {"name": "missing"},
                "x": {"name": "bad"}
            },
            "trigger_modifications": {"1": {"active": false}},
            "new_triggers": [{"type": "temporal", "name": "t3"}],
            "remove_triggers": [2, 0]
        }))
        .unwrap();
        apply_clone_modifications(&mut s, &mods);

        assert_eq!(s["active"], true);
        let steps = steps(&s);
        assert_eq!(steps[0]["enabled"], false);
        assert!(steps[0]["params"].get("script").is_none());
        assert_eq!(steps[1]["params"]["script"], "print('x')");
        assert_eq!(steps[1]["params"]["timeout"], 5);
        assert_eq!(steps[1]["name"], "renamed");

        let names: Vec<&str> = triggers(&s)
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["t1", "t3"]);
        assert_eq!(triggers(&s)[0]["active"], false);
    }

    #[test]
    fn metadata_fields_are_reported_in_order() {
        let mut meta = json!({"customFields": {"owner": "a"}, "tags": ["old"]});
        let mut custom = JsonObject::new();
        custom.insert("team".into(), json!("data"));
        let updated = apply_metadata(
            &mut meta,
            Some("desc"),
            Some(&["new".to_string()][..]),
            Some(&custom),
        );
        assert_eq!(updated, vec!["description", "tags", "custom_fields"]);
        assert_eq!(meta["customFields"], json!({"owner": "a", "team": "data"}));
        assert_eq!(meta["tags"], json!(["new"]));
    }

    #[test]
    fn step_script_requires_python_step_in_range() {
        let mut s = settings();
        set_step_script(&mut s, 1, "print(1)").unwrap();
        assert_eq!(steps(&s)[1]["params"]["script"], "print(1)");

        let err = set_step_script(&mut s, 0, "x").unwrap_err();
        assert_eq!(err.message, "Step 0 is not a custom_python step");
        let err = set_step_script(&mut s, 5, "x").unwrap_err();
        assert_eq!(err.message, "Step index 5 is out of range");
    }

    #[test]
    fn missing_containers_are_created() {
        let mut s = json!({});
        triggers_mut(&mut s).push(json!({"type": "manual"}));
        steps_mut(&mut s).push(json!({"type": "custom_python"}));
        assert_eq!(triggers(&s).len(), 1);
        assert_eq!(steps(&s).len(), 1);
    }
}
