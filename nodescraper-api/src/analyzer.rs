//! Derives [`crate::event::Event`]s from a [`DataModel`].
//!
//! Analyzers are pure with respect to the connection: they must not execute
//! shell commands, only read the model they were handed.

use indexmap::IndexMap;
use regex::{Captures, Regex};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::data_model::DataModel;
use crate::enums::{EventCategory, EventPriority};
use crate::event::Event;
use crate::task_result::TaskResult;

/// One rule matched against free-text content by [`check_all_regexes`].
pub struct RegexRule {
    pub pattern: Regex,
    pub message: String,
    pub event_category: EventCategory,
    pub event_priority: EventPriority,
}

/// Extracts the matched value the way the source's `findall`-based scanner
/// does: a pattern with no capture groups yields the whole match, split into
/// lines if it spans more than one; a pattern with groups yields the list of
/// non-empty group strings, collapsed back to a scalar when only one group
/// matched.
fn match_value(caps: &Captures) -> Value {
    if caps.len() > 1 {
        let mut groups: Vec<String> = (1..caps.len())
            .filter_map(|i| caps.get(i).map(|m| m.as_str().to_string()))
            .filter(|s| !s.is_empty())
            .collect();
        return if groups.len() == 1 {
            json!(groups.remove(0))
        } else {
            json!(groups)
        };
    }
    let whole = caps.get(0).map(|m| m.as_str()).unwrap_or("");
    if whole.contains('\n') {
        let lines: Vec<&str> = whole.trim().split('\n').collect();
        json!(lines)
    } else {
        json!(whole)
    }
}

/// Scans `content` against every rule, producing one [`Event`] per match.
///
/// When `group` is true, matches with an identical rendered value are
/// collapsed into a single event with an incrementing `count` field in its
/// `data`; when false, every occurrence produces its own event with no
/// deduplication. Each event's priority is capped at
/// `max_event_priority_level` so a rule declared more severe than the
/// caller's configured ceiling never escapes it.
pub fn check_all_regexes(
    content: &str,
    source: &str,
    rules: &[RegexRule],
    group: bool,
    max_event_priority_level: EventPriority,
    task_name: &str,
    task_type: &str,
) -> Vec<Event> {
    let mut grouped: IndexMap<String, Event> = IndexMap::new();
    let mut ungrouped: Vec<Event> = Vec::new();

    for rule in rules {
        for caps in rule.pattern.captures_iter(content) {
            let value = match_value(&caps);
            let key = value.to_string();

            if group {
                if let Some(existing) = grouped.get_mut(&key) {
                    let count = existing.data.get("count").and_then(Value::as_i64).unwrap_or(1);
                    if let Some(obj) = existing.data.as_object_mut() {
                        obj.insert("count".to_string(), json!(count + 1));
                    }
                    continue;
                }
            }

            let priority = rule.event_priority.min(max_event_priority_level);
            let data = json!({
                "match_content": value,
                "source": source,
                "count": 1,
                "task_name": task_name,
                "task_type": task_type,
            });
            let Ok(event) = Event::new(source, rule.event_category, rule.message.clone(), data, priority) else {
                continue;
            };

            if group {
                grouped.insert(key, event);
            } else {
                ungrouped.push(event);
            }
        }
    }

    if group {
        grouped.into_values().collect()
    } else {
        ungrouped
    }
}

pub trait DataAnalyzer: Send {
    type DataModel: DataModel;
    type AnalyzeArgs: DeserializeOwned + Default + Send;

    const NAME: &'static str;
    const TASK_TYPE: &'static str = "DATA_ANALYZER";

    /// If required args are absent, implementations should set
    /// `result.status = NOT_RAN` with an explanatory message and return
    /// `Ok(())` — this is a supported mode, not an error.
    fn analyze_data(
        &mut self,
        data: &Self::DataModel,
        max_event_priority_level: EventPriority,
        args: Option<Self::AnalyzeArgs>,
        result: &mut TaskResult,
    ) -> anyhow::Result<()>;
}
