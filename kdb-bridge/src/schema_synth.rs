//! Turning server resources into prompt-ready schema, guidance and context text.
//!
//! Everything here is pure; reading resources happens in `schema_discovery`.

use crate::protocol::ResourceDescriptor;
use crate::text::{contains_any, truncate_chars};

/// Audience values that mark a resource as meant for the model.
pub const LLM_AUDIENCES: &[&str] = &["llm", "assistant", "ai"];

const SCHEMA_KEYWORDS: &[&str] = &["schema", "tables", "describe", "meta", "column", "structure"];
const GUIDANCE_KEYWORDS: &[&str] = &["sql", "guidance", "query", "syntax", "example", "how to"];

/// Placeholder schema when nothing could be discovered. The planner must not guess names.
pub const DISCOVER_DYNAMICALLY: &str = "Schema information not available at initialization.\n\
IMPORTANT: Use the available tools to discover the database schema dynamically before querying data.\n\
Do NOT assume any table or column names exist.";

pub const NO_SCHEMA: &str = "No schema information available.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceCategory {
    Schema,
    Guidance,
    Other,
}

/// Resources without an audience, or whose audience includes the model, are kept.
pub fn is_for_llm(resource: &ResourceDescriptor) -> bool {
    match resource.audience() {
        None => true,
        Some([]) => true,
        Some(audience) => audience
            .iter()
            .any(|a| LLM_AUDIENCES.iter().any(|llm| a.eq_ignore_ascii_case(llm))),
    }
}

/// Stable sort, highest priority first.
pub fn sort_by_priority(resources: &mut [ResourceDescriptor]) {
    resources.sort_by(|a, b| b.priority().total_cmp(&a.priority()));
}

/// Bucket by name and description. Schema keywords are checked before guidance keywords.
pub fn categorize(resource: &ResourceDescriptor) -> ResourceCategory {
    let combined = format!(
        "{} {}",
        resource.name.as_deref().unwrap_or_default(),
        resource.description_text()
    );
    if contains_any(&combined, SCHEMA_KEYWORDS) {
        ResourceCategory::Schema
    } else if contains_any(&combined, GUIDANCE_KEYWORDS) {
        ResourceCategory::Guidance
    } else {
        ResourceCategory::Other
    }
}

/// A resource together with the text read from it.
#[derive(Debug, Clone)]
pub struct ResourceContent {
    pub resource: ResourceDescriptor,
    pub content: String,
}

/// Derived prompt sections. Empty strings mean "nothing found" for that section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SynthesizedSchema {
    pub schema: String,
    pub sql_guidance: String,
    /// Uncategorized resources as (name, content), in priority order.
    pub additional_context: Vec<(String, String)>,
}

/// Build the prompt sections from resources that were read in priority order.
///
/// `listed` is every resource the server advertised and only feeds the last-resort
/// name/description list.
pub fn synthesize(
    listed: &[ResourceDescriptor],
    read: &[ResourceContent],
    preview_chars: usize,
) -> SynthesizedSchema {
    let mut schema_parts = Vec::new();
    let mut guidance_parts = Vec::new();
    let mut additional_context = Vec::new();

    for item in read.iter().filter(|r| !r.content.is_empty()) {
        let name = item.resource.display_name();
        let category = categorize(&item.resource);
        tracing::debug!(resource = name, ?category, "categorized resource");
        match category {
            ResourceCategory::Schema => schema_parts.push(section(name, &item.content)),
            ResourceCategory::Guidance => guidance_parts.push(section(name, &item.content)),
            ResourceCategory::Other => {
                additional_context.push((name.to_string(), item.content.clone()))
            }
        }
    }

    let mut schema = schema_parts.join("\n\n");
    if schema.is_empty() && read.iter().any(|r| !r.content.is_empty()) {
        schema = render_generic(read, preview_chars);
    }
    if schema.is_empty() {
        schema = render_resource_list(listed);
    }

    SynthesizedSchema {
        schema,
        sql_guidance: guidance_parts.join("\n\n"),
        additional_context,
    }
}

fn section(name: &str, content: &str) -> String {
    format!("## {}\n{}", name, content)
}

/// Every non-empty resource under one heading, each truncated to `preview_chars`.
pub fn render_generic(read: &[ResourceContent], preview_chars: usize) -> String {
    let mut parts = vec!["## Available Resources from MCP Server".to_string()];
    for item in read.iter().filter(|r| !r.content.is_empty()) {
        parts.push(format!("\n### {}", item.resource.display_name()));
        let cut = truncate_chars(&item.content, preview_chars);
        if cut.len() < item.content.len() {
            parts.push(format!("{}\n... (truncated)", cut));
        } else {
            parts.push(item.content.clone());
        }
    }
    parts.join("\n")
}

/// One line per advertised resource.
pub fn render_resource_list(resources: &[ResourceDescriptor]) -> String {
    if resources.is_empty() {
        return NO_SCHEMA.to_string();
    }
    let mut lines = vec!["Available resources/tables:".to_string()];
    for resource in resources {
        let mut line = format!("- {}", resource.display_name());
        if !resource.description_text().is_empty() {
            line.push_str(&format!(": {}", resource.description_text()));
        }
        lines.push(line);
    }
    lines.join("\n")
}
