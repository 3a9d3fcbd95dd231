//! Dependency spec parsing
//!
//! A dependency value is either a version range or a link to a local path;
//! modeling it as a tagged union keeps link specs out of the version
//! algebra. The CLI shorthands `:ts` and `:dts` are expanded here and
//! nowhere else.

use std::path::PathBuf;

use crate::core::{SlinkError, SlinkResult};

/// What a dependency name points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepTarget {
    /// A version range resolved against the store and registry
    Range(String),
    /// An already-built package at a local path; transitive dependencies
    /// are not followed
    Link(PathBuf),
}

impl DepTarget {
    /// Classify a manifest dependency value
    pub fn parse(value: &str) -> Self {
        if let Some(path) = value.strip_prefix("link:").or_else(|| value.strip_prefix("file:")) {
            DepTarget::Link(PathBuf::from(path))
        } else {
            DepTarget::Range(value.to_string())
        }
    }

    /// The manifest representation of this target
    pub fn format(&self) -> String {
        match self {
            DepTarget::Range(range) => range.clone(),
            DepTarget::Link(path) => format!("link:{}", path.display()),
        }
    }
}

/// A parsed dependency token: name plus target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepRequest {
    pub name: String,
    pub target: DepTarget,
}

/// Which manifest section a request lands in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Dependencies,
    DevDependencies,
}

impl DepRequest {
    /// Parse a CLI or manifest token: `name`, `name@range`,
    /// `@org/name@range`, `link:<path>`, `file:<path>`
    pub fn parse(token: &str) -> SlinkResult<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Err(SlinkError::RangeInvalid(token.to_string()));
        }

        if let Some(path) = token.strip_prefix("link:").or_else(|| token.strip_prefix("file:")) {
            let path = PathBuf::from(path);
            // The real name comes from the target's manifest at install
            // time; the final path component stands in until then.
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            return Ok(Self {
                name,
                target: DepTarget::Link(path),
            });
        }

        // Split on the last `@` that is not at position 0; the leading `@`
        // of a scoped name is part of the name.
        let (name, range) = match token[1..].rfind('@') {
            Some(idx) => {
                let idx = idx + 1;
                (&token[..idx], &token[idx + 1..])
            }
            None => (token, ""),
        };

        let range = if range.is_empty() { "*" } else { range };
        Ok(Self {
            name: name.to_string(),
            target: DepTarget::Range(range.to_string()),
        })
    }

    /// Format a request back into a token; the inverse of `parse`
    pub fn format(&self) -> String {
        match &self.target {
            DepTarget::Range(range) if range == "*" => self.name.clone(),
            DepTarget::Range(range) => format!("{}@{}", self.name, range),
            DepTarget::Link(path) => format!("link:{}", path.display()),
        }
    }
}

/// Expand one CLI token into the requests it stands for, honoring the
/// `:ts` and `:dts` typed-package shorthands.
pub fn expand_token(token: &str, section: Section) -> SlinkResult<Vec<(DepRequest, Section)>> {
    let token = token.trim();

    // Link specs contain a `:` but never the shorthand suffixes
    if token.starts_with("link:") || token.starts_with("file:") {
        return Ok(vec![(DepRequest::parse(token)?, section)]);
    }

    if let Some(base) = token.strip_suffix(":ts") {
        let request = DepRequest::parse(base)?;
        let types = types_request(&request.name);
        return Ok(vec![
            (request, section),
            (types.clone(), Section::Dependencies),
            (types, Section::DevDependencies),
        ]);
    }

    if let Some(base) = token.strip_suffix(":dts") {
        let request = DepRequest::parse(base)?;
        let types = types_request(&request.name);
        return Ok(vec![(request, section), (types, Section::DevDependencies)]);
    }

    Ok(vec![(DepRequest::parse(token)?, section)])
}

/// The `@types/` companion of a package; `@org/name` maps to
/// `@types/org__name`
fn types_request(name: &str) -> DepRequest {
    let suffix = match name.strip_prefix('@') {
        Some(scoped) => scoped.replace('/', "__"),
        None => name.to_string(),
    };
    DepRequest {
        name: format!("@types/{}", suffix),
        target: DepTarget::Range("*".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(token: &str) -> DepRequest {
        DepRequest::parse(token).unwrap()
    }

    #[test]
    fn test_parse_plain() {
        let req = parse("react");
        assert_eq!(req.name, "react");
        assert_eq!(req.target, DepTarget::Range("*".to_string()));
    }

    #[test]
    fn test_parse_with_range() {
        let req = parse("react@^18.0.0");
        assert_eq!(req.name, "react");
        assert_eq!(req.target, DepTarget::Range("^18.0.0".to_string()));
    }

    #[test]
    fn test_parse_scoped() {
        let req = parse("@types/node");
        assert_eq!(req.name, "@types/node");
        assert_eq!(req.target, DepTarget::Range("*".to_string()));

        let req = parse("@types/node@18.0.0");
        assert_eq!(req.name, "@types/node");
        assert_eq!(req.target, DepTarget::Range("18.0.0".to_string()));
    }

    #[test]
    fn test_parse_link_and_file() {
        let req = parse("link:../my-lib");
        assert_eq!(req.name, "my-lib");
        assert_eq!(req.target, DepTarget::Link(PathBuf::from("../my-lib")));

        let req = parse("file:/abs/other-lib");
        assert_eq!(req.target, DepTarget::Link(PathBuf::from("/abs/other-lib")));
    }

    #[test]
    fn test_format_roundtrip() {
        for token in ["react", "react@^18.0.0", "@org/pkg", "@org/pkg@~2.1.0", "foo@latest"] {
            let req = parse(token);
            assert_eq!(parse(&req.format()), req);
        }
        // A bare name and an explicit `*` are the same request
        assert_eq!(parse("react@*").format(), "react");
    }

    #[test]
    fn test_expand_ts() {
        let expanded = expand_token("express:ts", Section::Dependencies).unwrap();
        assert_eq!(expanded.len(), 3);
        assert_eq!(expanded[0].0.name, "express");
        assert_eq!(expanded[0].1, Section::Dependencies);
        assert_eq!(expanded[1].0.name, "@types/express");
        assert_eq!(expanded[1].1, Section::Dependencies);
        assert_eq!(expanded[2].0.name, "@types/express");
        assert_eq!(expanded[2].1, Section::DevDependencies);
    }

    #[test]
    fn test_expand_dts() {
        let expanded = expand_token("express:dts", Section::Dependencies).unwrap();
        assert_eq!(expanded.len(), 2);
        assert_eq!(expanded[0].0.name, "express");
        assert_eq!(expanded[0].1, Section::Dependencies);
        assert_eq!(expanded[1].0.name, "@types/express");
        assert_eq!(expanded[1].1, Section::DevDependencies);
    }

    #[test]
    fn test_expand_scoped_types_name() {
        let expanded = expand_token("@org/thing:dts", Section::DevDependencies).unwrap();
        assert_eq!(expanded[0].0.name, "@org/thing");
        assert_eq!(expanded[1].0.name, "@types/org__thing");
    }

    #[test]
    fn test_expand_plain_token() {
        let expanded = expand_token("left-pad@^1.3.0", Section::Dependencies).unwrap();
        assert_eq!(expanded.len(), 1);
        assert_eq!(expanded[0].0.name, "left-pad");
    }
}
