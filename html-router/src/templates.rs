use std::sync::LazyLock;

use minijinja::{Environment, Value};
use serde::Serialize;

use crate::error::HtmlError;

/// Templates are embedded at build time; the environment is shared
/// process-wide.
static TEMPLATES: LazyLock<Environment<'static>> = LazyLock::new(|| {
    let mut env = Environment::new();
    minijinja_embed::load_templates!(&mut env);
    env
});

pub fn render<T: Serialize>(name: &str, context: T) -> Result<String, HtmlError> {
    let template = TEMPLATES
        .get_template(name)
        .map_err(|e| HtmlError::Template(e.to_string()))?;
    template
        .render(Value::from_serialize(&context))
        .map_err(|e| HtmlError::Template(e.to_string()))
}
