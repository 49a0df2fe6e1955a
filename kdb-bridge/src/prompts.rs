//! Prompt templates for planning, synthesis and the single-query chat path.

use crate::text::truncate_chars;

pub const DEFAULT_SQL_GUIDANCE: &str =
    "No specific SQL syntax guidance available. Use standard SQL syntax.";
pub const NO_ADDITIONAL_CONTEXT: &str = "No additional context available.";

const PLANNER_TEMPLATE: &str = r#"You are a data assistant that answers questions by calling tools on a KDB+ database exposed over MCP (Model Context Protocol).

## Available MCP Tools:
{tools}

## Database Schema and Table Information:
{schema}

## Discovered Data Content (actual data in tables):
{data}

## SQL Query Syntax Guidance (follow exactly):
{guidance}

## Additional Resources from MCP Server:
{context}

## User Query:
{query}

## How to plan
1. Pick the relevant table(s) from the schema and list their EXACT column names. Never invent columns.
2. Check the discovered data content. Only filter on values listed under "Available values"; use ticker symbols, not company names.
3. If the schema or data cannot answer the question, say so honestly and describe what IS available.
4. Write standard SQL (SELECT, WHERE, GROUP BY, ORDER BY, LIMIT, AVG, SUM, COUNT).
   - Double-quote every column name, especially reserved words such as "date", "time", "open", "close", "high", "low", "name", "type", "index".
   - There is no CURRENT_DATE or NOW(); for "latest" use ORDER BY the date column DESC LIMIT n.
   - Never use LIKE on dates. Use EXTRACT(YEAR FROM "date") = 2023, EXTRACT(MONTH FROM "date") = 12, or "date" >= '2023-01-01' AND "date" <= '2023-12-31'.
   - Close every string literal: 'AAPL', not 'AAPL.
   - For text search, use LIKE across all relevant text columns.
5. If the schema is unknown, plan a discovery step first and give it a purpose mentioning schema discovery.

## Response format
Respond with ONLY one JSON object and nothing else:
```json
{
    "reasoning": "Which tables/columns you use, what data exists, any limitations",
    "data_available": true,
    "limitations": null,
    "steps": [
        {
            "tool": "{sql_tool}",
            "arguments": {"{sql_argument}": "SELECT \"col\" FROM tablename LIMIT 10"},
            "purpose": "What this call returns"
        }
    ]
}
```

When the requested data does not exist:
```json
{
    "reasoning": "Why the data is not available",
    "data_available": false,
    "limitations": "What is missing and what is available instead",
    "steps": []
}
```"#;

const SYNTHESIS_TEMPLATE: &str = "You are a helpful data assistant. Use the tool results below to answer the user's query clearly.

## User Query:
{query}

## Tool Execution Results:
{results}

## Instructions:
- Include the specific values the data shows
- If steps failed, explain what went wrong
- Be concise but complete

Provide your response:";

/// Inputs for one planning prompt.
#[derive(Clone, Copy)]
pub struct PlannerContext<'a> {
    pub tools_description: &'a str,
    pub schema: &'a str,
    pub discovered_schema: &'a str,
    pub data_content: &'a str,
    pub sql_guidance: &'a str,
    pub additional_context: &'a [(String, String)],
    pub sql_tool: &'a str,
    pub sql_argument: &'a str,
    pub context_chars: usize,
}

/// Render uncategorized resources, each truncated.
pub fn format_additional_context(context: &[(String, String)], max_chars: usize) -> String {
    if context.is_empty() {
        return NO_ADDITIONAL_CONTEXT.to_string();
    }
    context
        .iter()
        .map(|(name, content)| {
            let cut = truncate_chars(content, max_chars);
            if cut.len() < content.len() {
                format!("### {}\n{}\n... (truncated)", name, cut)
            } else {
                format!("### {}\n{}", name, content)
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Schema text with accumulated discoveries appended under their own heading.
pub fn merged_schema(schema: &str, discovered: &str) -> String {
    if discovered.is_empty() {
        schema.to_string()
    } else {
        format!("{}\n\n## Dynamically Discovered Schema:\n{}", schema, discovered)
    }
}

pub fn planner_prompt(ctx: &PlannerContext<'_>, query: &str) -> String {
    let guidance = if ctx.sql_guidance.is_empty() {
        DEFAULT_SQL_GUIDANCE
    } else {
        ctx.sql_guidance
    };

    PLANNER_TEMPLATE
        .replace("{tools}", ctx.tools_description)
        .replace("{schema}", &merged_schema(ctx.schema, ctx.discovered_schema))
        .replace("{data}", ctx.data_content)
        .replace("{guidance}", guidance)
        .replace(
            "{context}",
            &format_additional_context(ctx.additional_context, ctx.context_chars),
        )
        .replace("{sql_tool}", ctx.sql_tool)
        .replace("{sql_argument}", ctx.sql_argument)
        .replace("{query}", query)
}

pub fn synthesis_prompt(query: &str, results: &str) -> String {
    SYNTHESIS_TEMPLATE
        .replace("{query}", query)
        .replace("{results}", results)
}

/// Single-statement generation for the chat path.
pub fn sql_generation_prompt(schema: &str, data_content: &str, query: &str) -> String {
    format!(
        r#"Generate one SQL query for this question. Return ONLY the SQL, nothing else.

Schema:
{schema}

Available Data (check this before querying):
{data}

Rules:
- Double-quote column names: SELECT "col1", "col2" FROM tablename
- Reserved words must be quoted: "date", "time", "open", "close", "high", "low", "name", "type", "index"
- Filter on ticker symbols, not company names, and only on values listed under "Available values"
- Only use columns that exist in the schema
- When searching text, search every relevant text column
- Never use LIKE on dates; use EXTRACT(YEAR FROM "date") = 2023 or "date" >= '2023-01-01' AND "date" <= '2023-12-31'
- Close every string literal: WHERE "sym" = 'AAPL'

Question: {query}

SQL:"#,
        schema = schema,
        data = data_content,
        query = query
    )
}

/// Answer a metadata question from cached schema text.
pub fn schema_answer_prompt(schema_info: &str, query: &str) -> String {
    format!(
        "Answer the user's question about the database.\n\n\
         ## Database Information:\n{}\n\n\
         ## User Question:\n{}\n\n\
         Answer from the information above. Be concise and helpful.",
        schema_info, query
    )
}

/// Short answer over a row preview.
pub fn row_answer_prompt(query: &str, sql: &str, total_rows: usize, preview_json: &str) -> String {
    format!(
        "Based on this data, give a brief answer to the user's question.\n\n\
         Question: {}\n\
         SQL: {}\n\
         Data ({} rows):\n{}\n\n\
         Answer in 2-4 sentences and include the key numbers from the data.",
        query, sql, total_rows, preview_json
    )
}
