/// Input sanitization behavior
///
/// HTML-escapes every string field of a request, and every string field of
/// objects nested directly inside it, before validation runs:
///
/// | Character | Replacement |
/// |-----------|-------------|
/// | `<`       | `&lt;`      |
/// | `>`       | `&gt;`      |
/// | `&`       | `&amp;`     |
/// | `'`       | `&#39;`     |
/// | `"`       | `&quot;`    |
///
/// Nulls, empty strings and absent nested objects pass through unchanged.
/// Escaping is not idempotent: sanitizing twice escapes the `&` of the first
/// pass again.
///
/// Fields are exempted per request type through [`SanitizationRules`], each
/// with the reason it must stay byte-identical.

use async_trait::async_trait;
use serde_json::Value;
use std::marker::PhantomData;

use super::context::{RequestContext, RequestState};
use super::error::{PipelineError, PipelineResult};
use super::{Behavior, Next, Request};

/// A field left untouched by sanitization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exemption {
    /// `"field"` or `"nested.field"`; exempting a field exempts everything inside it
    pub path: &'static str,
    pub justification: &'static str,
}

/// Sanitization exemptions for one request type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitizationRules {
    exemptions: Vec<Exemption>,
}

impl SanitizationRules {
    /// No exemptions; every string field is escaped
    pub fn none() -> Self {
        Self::default()
    }

    pub fn skip(mut self, path: &'static str, justification: &'static str) -> Self {
        self.exemptions.push(Exemption { path, justification });
        self
    }

    pub fn exemptions(&self) -> &[Exemption] {
        &self.exemptions
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        self.exemptions.iter().any(|e| {
            path == e.path
                || path
                    .strip_prefix(e.path)
                    .map_or(false, |rest| rest.starts_with('.'))
        })
    }
}

/// Escapes HTML-significant characters
pub fn html_escape(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '\'' => escaped.push_str("&#39;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Escapes string fields of `value` in place, honoring `rules`
pub fn sanitize_value(value: &mut Value, rules: &SanitizationRules) {
    let Value::Object(fields) = value else {
        return;
    };

    for (key, field) in fields.iter_mut() {
        if rules.is_exempt(key) {
            continue;
        }
        match field {
            Value::String(s) => *s = html_escape(s),
            Value::Object(nested) => {
                for (nested_key, nested_field) in nested.iter_mut() {
                    if let Value::String(s) = nested_field {
                        if !rules.is_exempt(&format!("{}.{}", key, nested_key)) {
                            *s = html_escape(s);
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

/// Escapes a typed request through its serde representation
pub fn sanitize_request<R: Request>(request: &R, rules: &SanitizationRules) -> PipelineResult<R> {
    let mut value = serde_json::to_value(request).map_err(PipelineError::unhandled)?;
    sanitize_value(&mut value, rules);
    serde_json::from_value(value).map_err(PipelineError::unhandled)
}

pub struct Sanitization<R> {
    rules: SanitizationRules,
    _request: PhantomData<fn() -> R>,
}

impl<R> Sanitization<R> {
    pub fn new(rules: SanitizationRules) -> Self {
        Self {
            rules,
            _request: PhantomData,
        }
    }
}

#[async_trait]
impl<R: Request> Behavior<R> for Sanitization<R> {
    fn name(&self) -> &'static str {
        "Sanitization"
    }

    async fn handle(
        &self,
        request: &mut R,
        ctx: &RequestContext,
        next: Next<'_, R>,
    ) -> PipelineResult<R::Response> {
        ctx.transition(RequestState::Sanitizing)?;
        ctx.ensure_active()?;

        *request = sanitize_request(&*request, &self.rules)?;

        next.run(request, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_escapes_script_tag() {
        assert_eq!(
            html_escape("Hello<script>alert('x')</script>"),
            "Hello&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"
        );
        assert_eq!(html_escape("Tom & \"Jerry\""), "Tom &amp; &quot;Jerry&quot;");
    }

    #[test]
    fn test_sanitizing_twice_double_escapes() {
        let once = html_escape("<b>");
        let twice = html_escape(&once);
        assert_eq!(once, "&lt;b&gt;");
        assert_eq!(twice, "&amp;lt;b&amp;gt;");
    }

    #[test]
    fn test_nested_objects_and_nulls() {
        let mut value = json!({
            "title": "<i>",
            "empty": "",
            "missing": null,
            "count": 3,
            "meta": { "note": "a&b", "depth": { "deep": "<x>" } },
            "absent": null,
            "tags": ["<t>"]
        });

        sanitize_value(&mut value, &SanitizationRules::none());

        assert_eq!(value["title"], "&lt;i&gt;");
        assert_eq!(value["empty"], "");
        assert!(value["missing"].is_null());
        assert_eq!(value["count"], 3);
        assert_eq!(value["meta"]["note"], "a&amp;b");
        // Only directly nested objects are walked
        assert_eq!(value["meta"]["depth"]["deep"], "<x>");
        assert_eq!(value["tags"][0], "<t>");
    }

    #[test]
    fn test_exempt_paths_untouched() {
        let rules = SanitizationRules::none()
            .skip("password", "hashed verbatim")
            .skip("meta.raw", "stored verbatim");
        let mut value = json!({
            "password": "p<a>ss&'\"",
            "meta": { "raw": "<keep>", "note": "<escape>" }
        });

        sanitize_value(&mut value, &rules);

        assert_eq!(value["password"], "p<a>ss&'\"");
        assert_eq!(value["meta"]["raw"], "<keep>");
        assert_eq!(value["meta"]["note"], "&lt;escape&gt;");
    }

    #[test]
    fn test_exemption_covers_children_only_on_dot_boundary() {
        let rules = SanitizationRules::none().skip("meta", "opaque");
        assert!(rules.is_exempt("meta"));
        assert!(rules.is_exempt("meta.note"));
        assert!(!rules.is_exempt("metadata"));
    }
}
