//! Method bodies written as text templates.
//!
//! `{super}` expands to the predecessor's result, `{args}` to all arguments
//! joined with `-`, and `{0}`, `{1}`, ... to single arguments. Anything else
//! is copied verbatim.

use overridable_core::{method_fn, Invocation, MethodFn, Result, Value};

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Super,
    Args,
    Arg(usize),
}

/// A parsed method body template
#[derive(Debug, Clone, PartialEq)]
pub struct MethodTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl MethodTemplate {
    pub fn parse(source: &str) -> Self {
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut rest = source;

        while let Some(start) = rest.find('{') {
            text.push_str(&rest[..start]);
            let candidate = &rest[start..];
            let placeholder = candidate
                .find('}')
                .and_then(|end| placeholder(&candidate[1..end]).map(|p| (p, end)));

            match placeholder {
                Some((segment, end)) => {
                    if !text.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut text)));
                    }
                    segments.push(segment);
                    rest = &candidate[end + 1..];
                }
                None => {
                    text.push('{');
                    rest = &candidate[1..];
                }
            }
        }
        text.push_str(rest);
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }

        Self {
            source: source.to_string(),
            segments,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the body delegates to its predecessor
    pub fn calls_super(&self) -> bool {
        self.segments.contains(&Segment::Super)
    }

    /// Expand the template for one call
    pub fn render(&self, invocation: &Invocation<'_>) -> Result<Value> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Super => out.push_str(&invocation.call_super()?.to_string()),
                Segment::Args => out.push_str(&Value::join(invocation.args(), "-")),
                Segment::Arg(index) => {
                    if let Some(arg) = invocation.arg(*index) {
                        out.push_str(&arg.to_string());
                    }
                }
            }
        }
        Ok(Value::from(out))
    }

    pub fn into_method(self) -> MethodFn {
        method_fn(move |invocation| self.render(invocation))
    }
}

fn placeholder(name: &str) -> Option<Segment> {
    match name {
        "super" => Some(Segment::Super),
        "args" => Some(Segment::Args),
        _ => name.parse().ok().map(Segment::Arg),
    }
}
