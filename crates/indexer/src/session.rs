//! Session context files: YAML frontmatter plus an optional embedded JSON block.

use crate::{IndexerError, Result};
use regex::Regex;
use serde_json::{Map, Value};
use std::path::Path;
use threadmap_protocol::SessionRecord;

pub const MACHINE_BLOCK_START: &str = "<!--machine-json-start-->";
pub const MACHINE_BLOCK_END: &str = "<!--machine-json-end-->";

const FRONTMATTER_FENCE: &str = "---";

/// Raw YAML between the leading `---` fence and the next one.
pub fn frontmatter_text(text: &str) -> Option<&str> {
    if !text.starts_with(FRONTMATTER_FENCE) {
        return None;
    }
    let mut parts = text.splitn(3, FRONTMATTER_FENCE);
    parts.next()?;
    let yaml = parts.next()?;
    parts.next()?;
    Some(yaml)
}

/// Frontmatter as a JSON object. `Ok(None)` when there is no fenced block or it is
/// not a mapping; `Err` when the YAML itself is broken.
pub fn parse_frontmatter(
    text: &str,
) -> std::result::Result<Option<Map<String, Value>>, serde_yaml_ng::Error> {
    let Some(yaml) = frontmatter_text(text) else {
        return Ok(None);
    };
    match serde_yaml_ng::from_str::<Value>(yaml)? {
        Value::Object(map) => Ok(Some(map)),
        _ => Ok(None),
    }
}

/// Strings, numbers and booleans as text; empty strings and containers as `None`.
pub(crate) fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn str_field(map: Option<&Map<String, Value>>, key: &str) -> Option<String> {
    map?.get(key).and_then(scalar_string)
}

/// Non-empty list field; an empty list counts as absent.
fn list_field(map: Option<&Map<String, Value>>, key: &str) -> Option<Vec<String>> {
    let items: Vec<String> = map?
        .get(key)?
        .as_array()?
        .iter()
        .filter_map(scalar_string)
        .collect();
    (!items.is_empty()).then_some(items)
}

/// Parses context files into [`SessionRecord`]s.
pub struct ContextParser {
    machine_block: Regex,
}

impl ContextParser {
    pub fn new() -> Result<Self> {
        let pattern = format!(
            "(?s){}(.*?){}",
            regex::escape(MACHINE_BLOCK_START),
            regex::escape(MACHINE_BLOCK_END)
        );
        let machine_block = Regex::new(&pattern).map_err(|e| IndexerError::Pattern(e.to_string()))?;
        Ok(Self { machine_block })
    }

    /// Text between the first pair of machine block markers, trimmed.
    pub fn machine_block<'a>(&self, text: &'a str) -> Option<&'a str> {
        self.machine_block
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
    }

    /// Machine block as a JSON object. Unparseable or non-object blocks are ignored.
    pub fn machine_object(&self, text: &str) -> Option<Map<String, Value>> {
        match serde_json::from_str::<Value>(self.machine_block(text)?) {
            Ok(Value::Object(map)) => Some(map),
            Ok(_) => None,
            Err(e) => {
                log::debug!("Ignoring unparseable machine block: {e}");
                None
            }
        }
    }

    /// Read and parse one context file. `Ok(None)` when it names no session.
    pub fn parse_file(&self, path: &Path, rel_path: &str) -> Result<Option<SessionRecord>> {
        let text = std::fs::read_to_string(path).map_err(|e| IndexerError::read(path, e))?;
        Ok(self.parse_text(&text, rel_path))
    }

    pub fn parse_text(&self, text: &str, rel_path: &str) -> Option<SessionRecord> {
        let frontmatter = parse_frontmatter(text).unwrap_or_else(|e| {
            log::warn!("Ignoring invalid frontmatter in {rel_path}: {e}");
            None
        });
        let machine = self.machine_object(text);
        let fm = frontmatter.as_ref();
        let mb = machine.as_ref();

        let session_id = str_field(fm, "session_id").or_else(|| str_field(mb, "session_id"))?;

        let primary_thread = str_field(mb, "primary_thread")
            .or_else(|| list_field(fm, "active_threads").and_then(|l| l.into_iter().next()))
            .or_else(|| list_field(mb, "active_threads").and_then(|l| l.into_iter().next()));
        let related_threads = list_field(mb, "related_threads")
            .or_else(|| list_field(fm, "active_threads"))
            .unwrap_or_default();

        Some(SessionRecord {
            session_id,
            path: rel_path.to_string(),
            primary_thread,
            related_threads,
            status: str_field(fm, "status").or_else(|| str_field(mb, "status")),
            last_message_date: str_field(fm, "last_message_date")
                .or_else(|| str_field(mb, "last_message_date")),
        })
    }
}
