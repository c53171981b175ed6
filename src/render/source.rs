//! Combined shader source files.
//!
//! One file carries every stage, each introduced by a marker line:
//!
//! ```text
//! #type vertex
//! #version 330 core
//! ...
//! #type fragment
//! #version 330 core
//! ...
//! ```

use std::str::FromStr;

use thiserror::Error;

use super::context::ShaderStage;

const MARKER: &str = "#type";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line {line}: text before the first `#type` marker")]
    TextBeforeFirstMarker { line: usize },

    #[error("line {line}: malformed marker, expected `#type <stage>`")]
    MalformedMarker { line: usize },

    #[error("expected exactly 2 stage sections, found {found}")]
    WrongSectionCount { found: usize },

    #[error("line {line}: unknown shader stage `{name}`")]
    UnknownStage { name: String, line: usize },

    #[error("line {line}: stage `{stage}` declared twice")]
    DuplicateStage { stage: ShaderStage, line: usize },

    #[error("stage `{0}` has an empty body")]
    EmptyStage(ShaderStage),
}

/// Vertex and fragment sources split out of one combined file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    vertex: String,
    fragment: String,
}

struct Section<'a> {
    name: &'a str,
    line: usize,
    body: String,
}

impl ShaderSource {
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let sections = tokenize(text)?;
        if sections.len() != 2 {
            return Err(ParseError::WrongSectionCount {
                found: sections.len(),
            });
        }

        let mut vertex = None;
        let mut fragment = None;
        for section in sections {
            let stage = ShaderStage::from_marker_name(section.name).ok_or_else(|| {
                ParseError::UnknownStage {
                    name: section.name.to_string(),
                    line: section.line,
                }
            })?;
            let slot = match stage {
                ShaderStage::Vertex => &mut vertex,
                ShaderStage::Fragment => &mut fragment,
            };
            if slot.is_some() {
                return Err(ParseError::DuplicateStage {
                    stage,
                    line: section.line,
                });
            }
            if section.body.trim().is_empty() {
                return Err(ParseError::EmptyStage(stage));
            }
            *slot = Some(section.body);
        }

        let found = usize::from(vertex.is_some()) + usize::from(fragment.is_some());
        let (Some(vertex), Some(fragment)) = (vertex, fragment) else {
            return Err(ParseError::WrongSectionCount { found });
        };
        Ok(Self { vertex, fragment })
    }

    pub fn vertex(&self) -> &str {
        &self.vertex
    }

    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    pub fn stage(&self, stage: ShaderStage) -> &str {
        match stage {
            ShaderStage::Vertex => &self.vertex,
            ShaderStage::Fragment => &self.fragment,
        }
    }
}

impl FromStr for ShaderSource {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Splits `text` into marker-delimited sections, keeping line endings.
fn tokenize(text: &str) -> Result<Vec<Section<'_>>, ParseError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut sections: Vec<Section<'_>> = Vec::new();

    for (index, raw) in text.split_inclusive('\n').enumerate() {
        let line = index + 1;
        match marker_name(raw, line)? {
            Some(name) => sections.push(Section {
                name,
                line,
                body: String::new(),
            }),
            None => match sections.last_mut() {
                Some(section) => section.body.push_str(raw),
                None if raw.trim().is_empty() => {}
                None => return Err(ParseError::TextBeforeFirstMarker { line }),
            },
        }
    }

    Ok(sections)
}

/// Returns the stage name if `raw` is a marker line.
fn marker_name(raw: &str, line: usize) -> Result<Option<&str>, ParseError> {
    let Some(rest) = raw.trim().strip_prefix(MARKER) else {
        return Ok(None);
    };
    // `#typedef` and friends are ordinary text
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return Ok(None);
    }

    let mut tokens = rest.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (Some(name), None) if name.chars().all(|c| c.is_ascii_alphabetic()) => Ok(Some(name)),
        _ => Err(ParseError::MalformedMarker { line }),
    }
}
