use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use super::state::Section;

/// Removes `<think>...</think>` blocks some reasoning models prepend.
pub fn strip_think_tags(text: &str) -> String {
    let mut text = text.to_string();
    while let Some(start) = text.find("<think>") {
        match text[start..].find("</think>") {
            Some(offset) => text.replace_range(start..start + offset + "</think>".len(), ""),
            None => text.truncate(start),
        }
    }
    text.trim().to_string()
}

/// Parses the JSON object in a model reply, tolerating code fences and
/// chatter around it.
pub fn parse_json<T: DeserializeOwned>(reply: &str) -> Result<T> {
    let reply = strip_think_tags(reply);
    let body = match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => reply.as_str(),
    };
    serde_json::from_str(body).with_context(|| format!("model reply is not the expected JSON: {reply}"))
}

pub fn format_sections(sections: &[Section]) -> String {
    let mut formatted = String::new();
    for (idx, section) in sections.iter().enumerate() {
        formatted.push_str(&format!(
            "\n{sep}\nSection {n}: {name}\n{sep}\nDescription:\n{description}\nRequires Research:\n{research}\n\nContent:\n{content}\n",
            sep = "=".repeat(60),
            n = idx + 1,
            name = section.name,
            description = section.description,
            research = section.research,
            content = if section.content.is_empty() {
                "[Not yet written]"
            } else {
                section.content.as_str()
            },
        ));
    }
    formatted
}
