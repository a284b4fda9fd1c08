//! Front matter extraction and parsing.
//!
//! A page may start with a YAML block fenced by `---` lines, or with a JSON
//! object. Either one is parsed into [`Meta`]; the rest of the file is the
//! page body.

use crate::meta::Meta;

const YAML_FENCE: &str = "---";

/// Errors that can occur when parsing front matter.
#[derive(Debug, thiserror::Error)]
pub enum FrontmatterError {
    #[error("Unclosed frontmatter block - missing closing ---")]
    UnclosedYaml,

    #[error("Invalid YAML in frontmatter: {0}")]
    InvalidYaml(String),

    #[error("Unclosed JSON frontmatter - missing closing }}")]
    UnclosedJson,

    #[error("Invalid JSON in frontmatter: {0}")]
    InvalidJson(String),
}

/// Split page content into metadata and body.
///
/// YAML is tried first, then JSON. A block that parses but populates no field
/// counts as absent, in which case the next format is tried. When neither
/// yields anything the metadata is empty and the body is `content` unchanged.
pub fn parse_front_matter(content: &str) -> Result<(Meta, &str), FrontmatterError> {
    if let Some((meta, body)) = parse_yaml(content)? {
        if !meta.is_empty() {
            return Ok((meta, body));
        }
    }

    if let Some((meta, body)) = parse_json(content)? {
        if !meta.is_empty() {
            return Ok((meta, body));
        }
    }

    Ok((Meta::default(), content))
}

/// Parse a leading `---` fenced YAML block, if there is one.
fn parse_yaml(content: &str) -> Result<Option<(Meta, &str)>, FrontmatterError> {
    let Some(after_open) = strip_fence_line(content) else {
        return Ok(None);
    };

    // Find the closing fence: a line holding only `---`.
    let mut offset = 0;
    let mut close = None;
    for line in after_open.split_inclusive('\n') {
        if line.trim_end_matches(['\n', '\r']) == YAML_FENCE {
            close = Some((offset, offset + line.len()));
            break;
        }
        offset += line.len();
    }

    let Some((yaml_end, body_start)) = close else {
        return Err(FrontmatterError::UnclosedYaml);
    };

    let yaml = &after_open[..yaml_end];
    let meta: Meta = if yaml.trim().is_empty() {
        Meta::default()
    } else {
        serde_yaml::from_str(yaml).map_err(|e| FrontmatterError::InvalidYaml(e.to_string()))?
    };

    Ok(Some((meta, strip_leading_newlines(&after_open[body_start..]))))
}

/// Returns the text after an opening `---` line.
fn strip_fence_line(content: &str) -> Option<&str> {
    let rest = content.strip_prefix(YAML_FENCE)?;
    rest.strip_prefix('\n')
        .or_else(|| rest.strip_prefix("\r\n"))
}

/// Parse a leading JSON object, if there is one.
fn parse_json(content: &str) -> Result<Option<(Meta, &str)>, FrontmatterError> {
    if !looks_like_json_object(content) {
        return Ok(None);
    }

    let end = find_object_end(content).ok_or(FrontmatterError::UnclosedJson)?;
    let json = &content[..=end];

    let meta: Meta =
        serde_json::from_str(json).map_err(|e| FrontmatterError::InvalidJson(e.to_string()))?;

    Ok(Some((meta, strip_leading_newlines(&content[end + 1..]))))
}

/// `{` followed by a key or `}`. Template tags like `{{` and `{%` never match.
fn looks_like_json_object(content: &str) -> bool {
    let Some(rest) = content.strip_prefix('{') else {
        return false;
    };
    matches!(rest.trim_start().chars().next(), Some('"') | Some('}'))
}

/// Byte index of the `}` closing the object that opens at index 0.
fn find_object_end(content: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in content.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

fn strip_leading_newlines(body: &str) -> &str {
    body.trim_start_matches(['\n', '\r'])
}
