//! Prompt assembly for the audit request.

use crate::core::Category;
use crate::model::chunk::SourceChunk;
use std::fmt::Write;

pub const SYSTEM_PROMPT: &str = "You are a security auditor reviewing Python source code. \
Identify exploitable defects: injection risks, unsafe deserialization, weak cryptography, \
leaked secrets, unbounded resource use and insecure network behavior. \
Respond with a single JSON object and nothing else. Schema: \
{\"analysis_summary\": \"<one sentence>\", \"findings\": [{\"category\": \"<name>\", \
\"line\": <number>, \"severity\": \"low|medium|high|critical\", \"confidence\": <0.0-1.0>, \
\"rationale\": \"<why this is exploitable>\", \"snippet\": \"<offending code>\"}]}. \
Report an empty findings array when the code is clean. Do not pad results.";

/// Builds the per-chunk user prompt. Line numbers in the response are
/// relative to the snippet; the analyzer translates them back.
pub fn user_prompt(path: &str, chunk: &SourceChunk) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "Audit this Python code from `{path}` (snippet starts at line {} of the file; \
         report line numbers relative to the snippet, first line = 1).",
        chunk.start_line
    );
    let _ = writeln!(prompt, "\nPrefer these category names when they apply:");
    for category in &Category::TAXONOMY {
        let _ = writeln!(prompt, "- {category}");
    }
    let _ = writeln!(
        prompt,
        "\nUse a short kebab-case name for anything outside that list.\n\n```python\n{}\n```",
        chunk.text
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_every_taxonomy_category() {
        let chunk = SourceChunk {
            start_line: 10,
            text: "x = 1".to_string(),
        };
        let prompt = user_prompt("app.py", &chunk);
        for category in &Category::TAXONOMY {
            assert!(prompt.contains(category.as_str()), "missing {category}");
        }
        assert!(prompt.contains("line 10"));
        assert!(prompt.contains("app.py"));
    }
}
