//! Template composition and rendering.
//!
//! [`Renderer`] turns a fixed list of sources into a [`TemplateSet`] in which
//! the base layout can include partials by name. [`JinjaRenderer`] implements
//! both on minijinja.

use std::collections::BTreeMap;
use std::io::Write;

use minijinja::{AutoEscape, Environment, Error, ErrorKind, UndefinedBehavior, Value};

use stw_meta::Value as ConfigValue;

/// A named template source.
#[derive(Debug, Clone)]
pub struct TemplateSource {
    /// Name other templates use to refer to this one
    pub name: String,
    /// Template text
    pub source: String,
}

/// Errors that can occur when composing or rendering templates.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Failed to compile template {name}: {source}")]
    Syntax {
        name: String,
        source: minijinja::Error,
    },

    #[error("Failed to render template {name}: {source}")]
    Render {
        name: String,
        source: minijinja::Error,
    },

    #[error("Failed to write template output: {0}")]
    Write(#[from] std::io::Error),
}

/// Compiles template sources.
pub trait Renderer: Send + Sync {
    type Set: TemplateSet;

    /// Compile `sources` together into one set.
    fn compose(&self, sources: Vec<TemplateSource>) -> Result<Self::Set, TemplateError>;

    /// Compile and render a one-off template, such as a page body.
    fn render_str(&self, name: &str, source: &str, ctx: &Value) -> Result<String, TemplateError>;
}

/// A compiled, immutable group of templates.
pub trait TemplateSet: Send + Sync {
    /// Render template `name` against `ctx` into `out`.
    fn render_into(&self, out: &mut dyn Write, name: &str, ctx: &Value)
        -> Result<(), TemplateError>;
}

/// [`Renderer`] using minijinja.
///
/// HTML is auto-escaped, and dereferencing a field the context does not
/// have is an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct JinjaRenderer;

impl JinjaRenderer {
    pub fn new() -> Self {
        Self
    }

    fn environment() -> Environment<'static> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_auto_escape_callback(|name| {
            if name.ends_with(".json") || name.ends_with(".js") {
                AutoEscape::None
            } else {
                AutoEscape::Html
            }
        });
        env.add_function("toJson", to_json);
        env.add_filter("tojson", to_json);
        env
    }
}

/// Templates compiled by [`JinjaRenderer`].
pub struct JinjaTemplates {
    env: Environment<'static>,
}

impl Renderer for JinjaRenderer {
    type Set = JinjaTemplates;

    fn compose(&self, sources: Vec<TemplateSource>) -> Result<JinjaTemplates, TemplateError> {
        let mut env = Self::environment();

        for TemplateSource { name, source } in sources {
            env.add_template_owned(name.clone(), source)
                .map_err(|source| TemplateError::Syntax { name, source })?;
        }

        Ok(JinjaTemplates { env })
    }

    fn render_str(&self, name: &str, source: &str, ctx: &Value) -> Result<String, TemplateError> {
        let env = Self::environment();
        env.render_named_str(name, source, ctx)
            .map_err(|source| match source.kind() {
                ErrorKind::SyntaxError => TemplateError::Syntax {
                    name: name.to_string(),
                    source,
                },
                _ => TemplateError::Render {
                    name: name.to_string(),
                    source,
                },
            })
    }
}

impl TemplateSet for JinjaTemplates {
    fn render_into(
        &self,
        out: &mut dyn Write,
        name: &str,
        ctx: &Value,
    ) -> Result<(), TemplateError> {
        let render_error = |source| TemplateError::Render {
            name: name.to_string(),
            source,
        };

        let tmpl = self.env.get_template(name).map_err(render_error)?;
        let html = tmpl.render(ctx).map_err(render_error)?;
        out.write_all(html.as_bytes())?;
        Ok(())
    }
}

/// Serialize a value as JSON that is safe inside a `<script>` element.
fn to_json(value: Value) -> Result<Value, Error> {
    let json = serde_json::to_string(&value).map_err(|e| {
        Error::new(ErrorKind::InvalidOperation, "cannot serialize to JSON").with_source(e)
    })?;
    Ok(Value::from_safe_string(escape_script_json(&json)))
}

fn escape_script_json(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\'' => out.push_str("\\u0027"),
            _ => out.push(c),
        }
    }
    out
}

/// Convert the configuration document into a template value.
///
/// Strings are marked safe: configuration is trusted site content and is
/// interpolated verbatim.
pub fn config_value(value: &ConfigValue) -> Value {
    match value {
        ConfigValue::Null => Value::from(()),
        ConfigValue::Bool(b) => Value::from(*b),
        ConfigValue::Integer(n) => Value::from(*n),
        ConfigValue::Float(f) => Value::from(*f),
        ConfigValue::String(s) => Value::from_safe_string(s.clone()),
        ConfigValue::List(items) => Value::from(items.iter().map(config_value).collect::<Vec<_>>()),
        ConfigValue::Map(map) => Value::from(
            map.iter()
                .map(|(k, v)| (k.clone(), config_value(v)))
                .collect::<BTreeMap<String, Value>>(),
        ),
    }
}
