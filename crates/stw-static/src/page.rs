//! Page render context.

use std::path::Path;

use minijinja::{context, Value};
use stw_meta::Meta;

use crate::site::INDEX_FILE;

/// Everything the base layout sees when rendering one page.
#[derive(Debug, Clone)]
pub struct Page {
    /// "Home" for the root page, otherwise the title-cased directory name
    pub title: String,
    /// Rendered body, inserted without escaping
    pub content: String,
    /// Source path relative to the pages directory
    pub path: String,
    /// Built for the live-reloading dev server
    pub is_dev: bool,
    /// Site configuration, already converted for templates
    pub config: Value,
    /// Site metadata merged with the page's front matter
    pub meta: Meta,
}

impl Page {
    /// Context for rendering the page body, before `content` exists.
    pub fn body_context(&self) -> Value {
        context! {
            title => &self.title,
            path => &self.path,
            is_dev => self.is_dev,
            config => &self.config,
            meta => Value::from_serialize(&self.meta),
        }
    }

    /// Context for rendering the base layout.
    pub fn context(&self) -> Value {
        context! {
            title => &self.title,
            content => Value::from_safe_string(self.content.clone()),
            path => &self.path,
            is_dev => self.is_dev,
            config => &self.config,
            meta => Value::from_serialize(&self.meta),
        }
    }
}

/// Title of the page whose source is `relative` (to the pages directory).
pub fn page_title(relative: &Path) -> String {
    if relative == Path::new(INDEX_FILE) {
        return "Home".to_string();
    }

    relative
        .parent()
        .and_then(|dir| dir.file_name())
        .and_then(|name| name.to_str())
        .map(title_case)
        .unwrap_or_default()
}

/// Upper-case the first letter of every word.
///
/// Words are runs of letters, digits and underscores; the rest of each word
/// is left as is.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut word_start = true;

    for c in s.chars() {
        if word_start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        word_start = !(c.is_alphanumeric() || c == '_');
    }

    out
}

/// `relative` as a forward-slash separated string.
pub(crate) fn url_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
