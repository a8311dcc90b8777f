// Output path keys: `a.b`, `list[0]`, `list[item].x`, `map{entry}`, `[item]`

use super::TransformError;

#[derive(Debug, Clone, PartialEq)]
pub enum OutputSegment {
    /// Named property (a numeric name also addresses a list slot)
    Field(String),
    /// `[n]`
    Index(usize),
    /// `[name]`: loop over list items, or over a map converted to a list
    EachItem(String),
    /// `{name}`: loop over map entries
    EachEntry(String),
}

/// Parsed output path; never empty
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPath {
    pub segments: Vec<OutputSegment>,
}

impl OutputPath {
    pub fn parse(key: &str) -> Result<Self, TransformError> {
        let mut segments = Vec::new();
        let mut rest = key;

        loop {
            let stop = rest.find(['.', '[', '{']);
            let name = &rest[..stop.unwrap_or(rest.len())];

            let Some(stop) = stop else {
                if !name.is_empty() || segments.is_empty() {
                    segments.push(OutputSegment::Field(name.to_string()));
                }
                break;
            };

            if !name.is_empty() {
                segments.push(OutputSegment::Field(name.to_string()));
            }

            let (open, tail) = rest[stop..].split_at(1);
            if open == "." {
                rest = tail;
                continue;
            }

            let close = if open == "[" { ']' } else { '}' };
            let end = tail.find(close).ok_or_else(|| TransformError::InvalidPath {
                path: key.to_string(),
                message: format!("unclosed '{}'", open),
            })?;
            let index_name = tail[..end].trim();
            if index_name.is_empty() {
                return Err(TransformError::InvalidPath {
                    path: key.to_string(),
                    message: format!("empty '{}{}'", open, close),
                });
            }

            segments.push(match (open, index_name.parse::<usize>()) {
                ("[", Ok(index)) => OutputSegment::Index(index),
                ("[", Err(_)) => OutputSegment::EachItem(index_name.to_string()),
                _ => OutputSegment::EachEntry(index_name.to_string()),
            });

            rest = &tail[end + 1..];
            rest = rest.strip_prefix('.').unwrap_or(rest);
            if rest.is_empty() {
                break;
            }
        }

        Ok(Self { segments })
    }
}
