use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::{error::FormError, values::ValuesMap};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[.\w]+\}").expect("placeholder pattern is valid"));

/// Expands `{field}` and `{nested.field}` placeholders in `template` with the
/// first value of the matching key. Missing keys expand to an empty string.
///
/// With `include_query`, keys not used by any placeholder are appended as a query string.
pub fn encode_url(
    template: &str,
    values: &ValuesMap,
    include_query: bool,
) -> Result<String, FormError> {
    let mut consumed = Vec::new();
    let path = PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
        let placeholder = &caps[0];
        let key = &placeholder[1..placeholder.len() - 1];
        consumed.push(key.to_string());
        values.first(key).unwrap_or_default().to_string()
    });

    if !include_query {
        return Ok(path.into_owned());
    }

    let mut rest = values.clone();
    for key in &consumed {
        rest.remove(key);
    }
    if rest.is_empty() {
        return Ok(path.into_owned());
    }
    Ok(format!("{path}?{}", rest.to_query_string()?))
}
