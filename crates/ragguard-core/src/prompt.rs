//! Prompt template rendering.
//!
//! Templates use `{name}` placeholders. Substitution is single-pass: text
//! inserted for one placeholder is never scanned again, so a query or chunk
//! containing `{context}` cannot pull other values into the prompt.

use crate::config::GuardConfig;

/// Substitute `{name}` placeholders from `values`.
///
/// Unknown placeholders and unmatched braces are left verbatim.
pub fn render_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let replaced = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });

        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Generation prompt for a wrapped context block and sanitized question.
pub fn build_generation_prompt(config: &GuardConfig, wrapped_context: &str, question: &str) -> String {
    render_template(
        &config.system_prompt,
        &[("context", wrapped_context), ("question", question)],
    )
}

/// Evaluator prompt asking whether `answer` is supported by `context`.
pub fn build_faithfulness_prompt(
    config: &GuardConfig,
    context: &str,
    query: &str,
    answer: &str,
) -> String {
    render_template(
        &config.faithfulness_prompt,
        &[("context", context), ("query", query), ("answer", answer)],
    )
}
