use lazy_static::lazy_static;
use regex::Regex;

use super::options::Tone;

lazy_static! {
    static ref LEADING_LABEL: Regex = Regex::new(
        r"(?ix)
        ^\s*
        (?:rewritten\s+text|rewritten\s+version|rewrite|output)  # Label the model likes to add
        \s*:\s*
        "
    )
    .unwrap();

    static ref FORBIDDEN_CONTROL: Regex =
        Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").unwrap();
}

/// Build the instruction sent to the rewriting model.
pub fn build(text: &str, tone: Tone) -> String {
    format!(
        "Rewrite the following text while preserving its meaning, style, and structure, \
         but adjust it to a {} tone. Keep the language clear and natural.\n\n\
         Text:\n{}",
        tone.description(),
        text
    )
}

/// Strip an echoed prompt and any leading label from the model output.
pub fn clean_output(prompt: &str, generated: &str) -> String {
    let mut output = generated.trim_start();

    if let Some(rest) = output.strip_prefix(prompt.trim()) {
        output = rest;
    }

    LEADING_LABEL.replace(output, "").trim().to_string()
}

/// Plain text may contain tabs and line breaks but no other control characters.
pub fn is_plain_text(text: &str) -> bool {
    !FORBIDDEN_CONTROL.is_match(text)
}
