//! Discovered tools, their prompt rendering, and the SQL tool binding.

use crate::config::{ClientConfig, DEFAULT_SQL_TOOL};
use crate::protocol::ToolDescriptor;

/// Tools known to one client, plus their prompt rendering.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub tools: Vec<ToolDescriptor>,
    pub tools_description: String,
}

impl Catalog {
    pub fn new(tools: Vec<ToolDescriptor>) -> Self {
        let tools_description = describe_tools(&tools);
        Self {
            tools,
            tools_description,
        }
    }

    pub fn tool(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Resolve the tool used for ad-hoc SQL: explicit config, then a name containing
    /// `sql` or `query`, then the KDB-X default.
    pub fn sql_tool(&self, config: &ClientConfig) -> SqlTool {
        let name = config
            .sql_tool
            .clone()
            .or_else(|| self.sql_capable().next().map(|t| t.name.clone()))
            .unwrap_or_else(|| DEFAULT_SQL_TOOL.to_string());
        self.binding(&name)
    }

    /// Every tool whose name suggests it runs queries, in catalog order.
    pub fn sql_tools(&self) -> Vec<SqlTool> {
        self.sql_capable().map(|t| self.binding(&t.name)).collect()
    }

    fn sql_capable(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.iter().filter(|t| {
            let lower = t.name.to_lowercase();
            lower.contains("sql") || lower.contains("query")
        })
    }

    /// The statement argument is the first required string parameter, else `query`.
    fn binding(&self, name: &str) -> SqlTool {
        let argument = self
            .tool(name)
            .and_then(|t| t.parameters())
            .and_then(|params| {
                params
                    .into_iter()
                    .find(|p| p.required && p.param_type == "string")
                    .map(|p| p.name)
            })
            .unwrap_or_else(|| "query".to_string());

        SqlTool {
            name: name.to_string(),
            argument,
        }
    }
}

/// Name of the SQL tool and the argument that carries the statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlTool {
    pub name: String,
    pub argument: String,
}

impl SqlTool {
    pub fn arguments(&self, sql: &str) -> serde_json::Value {
        let mut args = serde_json::Map::new();
        args.insert(self.argument.clone(), serde_json::Value::String(sql.to_string()));
        serde_json::Value::Object(args)
    }
}

/// Human-readable tool list for the planner prompt.
pub fn describe_tools(tools: &[ToolDescriptor]) -> String {
    tools
        .iter()
        .map(|tool| {
            let mut desc = format!("### {}\n", tool.name);
            let description = match tool.description_text() {
                "" => "No description available",
                d => d,
            };
            desc.push_str(&format!("Description: {}\n", description));

            match tool.parameters() {
                Some(params) => {
                    desc.push_str("Parameters:\n");
                    for param in params {
                        desc.push_str(&format!(
                            "  - {}: {} ({})",
                            param.name,
                            param.param_type,
                            if param.required { "required" } else { "optional" }
                        ));
                        if let Some(d) = &param.description {
                            desc.push_str(&format!(" - {}", d));
                        }
                        desc.push('\n');
                    }
                }
                None => desc.push_str("Parameters: None or unknown\n"),
            }
            desc
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sql_tool() -> ToolDescriptor {
        ToolDescriptor::new("kdbx_run_sql_query", "Execute SQL against KDB-X").with_input_schema(json!({
            "type": "object",
            "properties": {"sql": {"type": "string", "description": "Statement"}},
            "required": ["sql"]
        }))
    }

    #[test]
    fn description_lists_parameters() {
        let text = describe_tools(&[sql_tool(), ToolDescriptor::new("kdbx_describe_tables", "")]);
        assert!(text.contains("### kdbx_run_sql_query\nDescription: Execute SQL against KDB-X\n"));
        assert!(text.contains("  - sql: string (required) - Statement\n"));
        assert!(text.contains("### kdbx_describe_tables\nDescription: No description available\nParameters: None or unknown\n"));
    }

    #[test]
    fn sql_tool_binding_reads_required_argument() {
        let catalog = Catalog::new(vec![ToolDescriptor::new("list_tables", "x"), sql_tool()]);
        let binding = catalog.sql_tool(&ClientConfig::default());
        assert_eq!(binding.name, "kdbx_run_sql_query");
        assert_eq!(binding.argument, "sql");
        assert_eq!(binding.arguments("SELECT 1"), json!({"sql": "SELECT 1"}));
    }

    #[test]
    fn sql_tool_falls_back_to_default_name() {
        let catalog = Catalog::new(vec![]);
        let binding = catalog.sql_tool(&ClientConfig::default());
        assert_eq!(binding.name, DEFAULT_SQL_TOOL);
        assert_eq!(binding.argument, "query");
    }

    #[test]
    fn configured_sql_tool_wins() {
        let catalog = Catalog::new(vec![sql_tool()]);
        let config = ClientConfig {
            sql_tool: Some("q_exec".to_string()),
            ..ClientConfig::default()
        };
        assert_eq!(catalog.sql_tool(&config).name, "q_exec");
    }
}
