//! Command templates with `${{inputs.name}}` / `${{outputs.name}}` placeholders.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const OPEN: &str = "${{";
const CLOSE: &str = "}}";

/// Which side of a component a placeholder refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PortDirection {
    /// `inputs.<name>`
    Input,
    /// `outputs.<name>`
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("inputs"),
            Self::Output => f.write_str("outputs"),
        }
    }
}

/// A placeholder found in a command template.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Placeholder {
    /// Input or output
    pub direction: PortDirection,
    /// Port name
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Port(Placeholder),
}

/// A shell command line with port placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommandTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl CommandTemplate {
    /// Parse a template.
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let segments = parse_segments(&raw)?;
        Ok(Self { raw, segments })
    }

    /// The template text as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the template has no non-whitespace content.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.raw.trim().is_empty()
    }

    /// Placeholders in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = &Placeholder> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Port(p) => Some(p),
            Segment::Literal(_) => None,
        })
    }

    /// Substitute every placeholder with a concrete path.
    pub fn render(
        &self,
        inputs: &BTreeMap<String, String>,
        outputs: &BTreeMap<String, String>,
    ) -> Result<String> {
        let mut out = String::with_capacity(self.raw.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Port(p) => {
                    let values = match p.direction {
                        PortDirection::Input => inputs,
                        PortDirection::Output => outputs,
                    };
                    let value = values.get(&p.name).ok_or_else(|| {
                        Error::template(format!(
                            "no value for ${{{{{}.{}}}}}",
                            p.direction, p.name
                        ))
                    })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

impl fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for CommandTemplate {
    type Error = Error;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(raw)
    }
}

impl From<CommandTemplate> for String {
    fn from(template: CommandTemplate) -> Self {
        template.raw
    }
}

fn parse_segments(raw: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut rest = raw;

    while let Some(start) = rest.find(OPEN) {
        if start > 0 {
            segments.push(Segment::Literal(rest[..start].to_string()));
        }
        let after_open = &rest[start + OPEN.len()..];
        let end = after_open
            .find(CLOSE)
            .ok_or_else(|| Error::template(format!("unterminated placeholder in '{raw}'")))?;
        segments.push(Segment::Port(parse_placeholder(after_open[..end].trim())?));
        rest = &after_open[end + CLOSE.len()..];
    }

    if !rest.is_empty() {
        segments.push(Segment::Literal(rest.to_string()));
    }
    Ok(segments)
}

fn parse_placeholder(body: &str) -> Result<Placeholder> {
    let (kind, name) = body
        .split_once('.')
        .ok_or_else(|| Error::template(format!("placeholder '{body}' must be inputs.<name> or outputs.<name>")))?;

    let direction = match kind {
        "inputs" => PortDirection::Input,
        "outputs" => PortDirection::Output,
        other => {
            return Err(Error::template(format!(
                "unknown placeholder namespace '{other}'"
            )));
        }
    };

    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(Error::template(format!("invalid port name '{name}'")));
    }

    Ok(Placeholder {
        direction,
        name: name.to_string(),
    })
}
