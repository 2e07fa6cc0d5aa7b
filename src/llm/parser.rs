use crate::error::PipelineError;

// Extraction runs in two phases: locate `<tag>...</tag>`, then for list
// payloads keep the `*`-bulleted lines. Each failure gets its own
// `MalformedOutput` message so the retry hint can say what went wrong.

const BULLET: char = '*';

/// Return the text between the first `<tag>` and the first `</tag>` after it.
///
/// Tags are case-sensitive. The returned slice is not trimmed.
pub fn extract_tag<'a>(raw: &'a str, tag: &str) -> Result<&'a str, PipelineError> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");

    let Some(open_at) = raw.find(&open) else {
        return Err(if raw.contains(&close) {
            PipelineError::malformed(format!("found {close} without a preceding {open}"))
        } else {
            PipelineError::malformed(format!("missing opening tag {open}"))
        });
    };

    let body_start = open_at + open.len();
    match raw[body_start..].find(&close) {
        Some(len) => Ok(&raw[body_start..body_start + len]),
        None if raw[..open_at].contains(&close) => Err(PipelineError::malformed(format!(
            "closing tag {close} precedes opening tag {open}"
        ))),
        None => Err(PipelineError::malformed(format!(
            "missing closing tag {close}"
        ))),
    }
}

/// Like [`extract_tag`], but trims the payload and rejects an empty one.
pub fn extract_required_tag<'a>(raw: &'a str, tag: &str) -> Result<&'a str, PipelineError> {
    let inner = extract_tag(raw, tag)?.trim();
    if inner.is_empty() {
        return Err(PipelineError::malformed(format!("<{tag}> is empty")));
    }
    Ok(inner)
}

/// Keep lines whose first non-whitespace character is `*`, with the marker
/// and surrounding whitespace removed. Other lines are dropped.
pub fn extract_bullet_lines(inner: &str) -> Result<Vec<String>, PipelineError> {
    let lines: Vec<String> = inner
        .lines()
        .filter_map(|line| line.trim_start().strip_prefix(BULLET))
        .map(|rest| rest.trim().to_string())
        .filter(|rest| !rest.is_empty())
        .collect();

    if lines.is_empty() {
        return Err(PipelineError::malformed(format!(
            "no lines starting with '{BULLET}'"
        )));
    }
    Ok(lines)
}

/// Plain non-empty lines, with a leading `*`/`-` bullet or `1.` number removed
pub fn extract_plain_lines(inner: &str) -> Vec<String> {
    inner
        .lines()
        .map(strip_list_marker)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix(['*', '-']) {
        return rest.trim();
    }
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix(['.', ')']) {
            // "1.5D Models" is a heading, not item 1
            if rest.starts_with(char::is_whitespace) {
                return rest.trim();
            }
        }
    }
    line
}
