//! SemVer version range parsing and matching

use crate::core::{SlinkError, SlinkResult};

/// A version range (e.g., ^1.0.0, ~2.1.0, >=3.0.0)
#[derive(Debug, Clone)]
pub enum VersionConstraint {
    /// Exact version (1.0.0)
    Exact(semver::Version),
    /// Caret range (^1.0.0 - compatible with 1.x.x)
    Caret(semver::Version),
    /// Tilde range (~1.0.0 - compatible with 1.0.x)
    Tilde(semver::Version),
    /// Greater than or equal (>=1.0.0)
    GreaterOrEqual(semver::Version),
    /// Greater than (>1.0.0)
    GreaterThan(semver::Version),
    /// Less than or equal (<=1.0.0)
    LessOrEqual(semver::Version),
    /// Less than (<1.0.0)
    LessThan(semver::Version),
    /// Any version (*)
    Any,
    /// Conjunction (>=1.0.0 <2.0.0)
    Range(Box<VersionConstraint>, Box<VersionConstraint>),
}

impl VersionConstraint {
    /// Parse a version range string. The `latest` tag is normalized to `*`
    /// before matching; an unparseable range is an error.
    pub fn parse(s: &str) -> SlinkResult<Self> {
        let s = s.trim();

        if s.is_empty() || s == "*" || s == "latest" {
            return Ok(VersionConstraint::Any);
        }

        // Wildcard forms: 1, 1.x, 1.2, 1.2.x
        if let Some(constraint) = Self::parse_wildcard(s) {
            return Ok(constraint);
        }

        // Hyphen range (1.0.0 - 2.0.0); must come before the space split
        if let Some((lo, hi)) = s.split_once(" - ") {
            let lo = Self::parse_version(lo.trim())?;
            let hi = Self::parse_version(hi.trim())?;
            return Ok(VersionConstraint::Range(
                Box::new(VersionConstraint::GreaterOrEqual(lo)),
                Box::new(VersionConstraint::LessOrEqual(hi)),
            ));
        }

        // Alternatives: keep the first one
        if let Some((first, _)) = s.split_once("||") {
            return Self::parse(first.trim());
        }

        // Conjunction with space (>=1.0.0 <2.0.0)
        if s.contains(' ') {
            let parts: Vec<&str> = s.split_whitespace().collect();
            if parts.len() == 2 {
                let left = Self::parse(parts[0])?;
                let right = Self::parse(parts[1])?;
                return Ok(VersionConstraint::Range(Box::new(left), Box::new(right)));
            }
            return Err(SlinkError::RangeInvalid(s.to_string()));
        }

        if let Some(rest) = s.strip_prefix(">=") {
            return Ok(VersionConstraint::GreaterOrEqual(Self::parse_version(rest.trim())?));
        }
        if let Some(rest) = s.strip_prefix("<=") {
            return Ok(VersionConstraint::LessOrEqual(Self::parse_version(rest.trim())?));
        }
        if let Some(rest) = s.strip_prefix('>') {
            return Ok(VersionConstraint::GreaterThan(Self::parse_version(rest.trim())?));
        }
        if let Some(rest) = s.strip_prefix('<') {
            return Ok(VersionConstraint::LessThan(Self::parse_version(rest.trim())?));
        }
        if let Some(rest) = s.strip_prefix('^') {
            return Ok(VersionConstraint::Caret(Self::parse_version(rest.trim())?));
        }
        if let Some(rest) = s.strip_prefix('~') {
            return Ok(VersionConstraint::Tilde(Self::parse_version(rest.trim())?));
        }
        if let Some(rest) = s.strip_prefix('=') {
            return Ok(VersionConstraint::Exact(Self::parse_version(rest.trim())?));
        }

        match Self::parse_version(s) {
            Ok(v) => Ok(VersionConstraint::Exact(v)),
            Err(_) => Err(SlinkError::RangeInvalid(s.to_string())),
        }
    }

    /// Parse `1`, `1.x`, `1.2`, `1.2.x` wildcard forms
    fn parse_wildcard(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.split('.').collect();
        let is_x = |p: &str| p == "x" || p == "X" || p == "*";
        let num = |p: &str| p.parse::<u64>().ok();

        match parts.as_slice() {
            [major] if is_x(major) => Some(VersionConstraint::Any),
            [major] => {
                let major = num(major)?;
                Some(VersionConstraint::Caret(semver::Version::new(major, 0, 0)))
            }
            [major, minor] if is_x(minor) => {
                let major = num(major)?;
                Some(VersionConstraint::Caret(semver::Version::new(major, 0, 0)))
            }
            [major, minor] => {
                let major = num(major)?;
                let minor = num(minor)?;
                Some(VersionConstraint::Tilde(semver::Version::new(major, minor, 0)))
            }
            [major, minor, patch] if is_x(patch) => {
                let major = num(major)?;
                if is_x(minor) {
                    Some(VersionConstraint::Caret(semver::Version::new(major, 0, 0)))
                } else {
                    let minor = num(minor)?;
                    Some(VersionConstraint::Tilde(semver::Version::new(major, minor, 0)))
                }
            }
            _ => None,
        }
    }

    /// Parse a version string, padding partial versions
    fn parse_version(s: &str) -> SlinkResult<semver::Version> {
        let s = s.trim().trim_start_matches('v');

        let core = s.split(['-', '+']).next().unwrap_or(s);
        // Pad partial versions, keeping any prerelease/build tag in place
        let (head, tail) = s.split_at(core.len());
        let padded = match core.matches('.').count() {
            0 => format!("{}.0.0{}", head, tail),
            1 => format!("{}.0{}", head, tail),
            _ => s.to_string(),
        };

        semver::Version::parse(&padded).map_err(|_| SlinkError::RangeInvalid(s.to_string()))
    }

    /// Check if a version satisfies this range
    pub fn matches(&self, version: &semver::Version) -> bool {
        match self {
            VersionConstraint::Exact(v) => version == v,
            VersionConstraint::Caret(v) => {
                if v.major == 0 {
                    if v.minor == 0 {
                        // ^0.0.x -> >=0.0.x <0.0.(x+1)
                        version.major == 0 && version.minor == 0 && version.patch == v.patch
                    } else {
                        // ^0.y.z -> >=0.y.z <0.(y+1).0
                        version.major == 0 && version.minor == v.minor && version >= v
                    }
                } else {
                    // ^x.y.z -> >=x.y.z <(x+1).0.0
                    version.major == v.major && version >= v
                }
            }
            VersionConstraint::Tilde(v) => {
                // ~x.y.z -> >=x.y.z <x.(y+1).0
                version.major == v.major && version.minor == v.minor && version >= v
            }
            VersionConstraint::GreaterOrEqual(v) => version >= v,
            VersionConstraint::GreaterThan(v) => version > v,
            VersionConstraint::LessOrEqual(v) => version <= v,
            VersionConstraint::LessThan(v) => version < v,
            VersionConstraint::Any => true,
            VersionConstraint::Range(left, right) => left.matches(version) && right.matches(version),
        }
    }

    /// Pick the highest-precedence version from `candidates` that satisfies
    /// this range. Prerelease sorts below release per semver precedence.
    pub fn max_satisfying<'a, I>(&self, candidates: I) -> Option<semver::Version>
    where
        I: IntoIterator<Item = &'a semver::Version>,
    {
        candidates
            .into_iter()
            .filter(|v| self.matches(v))
            .max()
            .cloned()
    }
}

impl std::fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionConstraint::Exact(v) => write!(f, "{}", v),
            VersionConstraint::Caret(v) => write!(f, "^{}", v),
            VersionConstraint::Tilde(v) => write!(f, "~{}", v),
            VersionConstraint::GreaterOrEqual(v) => write!(f, ">={}", v),
            VersionConstraint::GreaterThan(v) => write!(f, ">{}", v),
            VersionConstraint::LessOrEqual(v) => write!(f, "<={}", v),
            VersionConstraint::LessThan(v) => write!(f, "<{}", v),
            VersionConstraint::Any => write!(f, "*"),
            VersionConstraint::Range(l, r) => write!(f, "{} {}", l, r),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> semver::Version {
        semver::Version::parse(s).unwrap()
    }

    #[test]
    fn test_parse_caret() {
        let c = VersionConstraint::parse("^1.0.0").unwrap();
        assert!(c.matches(&v("1.0.0")));
        assert!(c.matches(&v("1.5.0")));
        assert!(!c.matches(&v("2.0.0")));
        assert!(!c.matches(&v("0.9.0")));
    }

    #[test]
    fn test_caret_zero_major() {
        let c = VersionConstraint::parse("^0.2.3").unwrap();
        assert!(c.matches(&v("0.2.3")));
        assert!(c.matches(&v("0.2.9")));
        assert!(!c.matches(&v("0.3.0")));

        let c = VersionConstraint::parse("^0.0.3").unwrap();
        assert!(c.matches(&v("0.0.3")));
        assert!(!c.matches(&v("0.0.4")));
    }

    #[test]
    fn test_parse_tilde() {
        let c = VersionConstraint::parse("~1.2.0").unwrap();
        assert!(c.matches(&v("1.2.0")));
        assert!(c.matches(&v("1.2.5")));
        assert!(!c.matches(&v("1.3.0")));
    }

    #[test]
    fn test_parse_range() {
        let c = VersionConstraint::parse(">=1.0.0 <2.0.0").unwrap();
        assert!(c.matches(&v("1.0.0")));
        assert!(c.matches(&v("1.9.9")));
        assert!(!c.matches(&v("2.0.0")));
    }

    #[test]
    fn test_wildcards() {
        let c = VersionConstraint::parse("1").unwrap();
        assert!(c.matches(&v("1.9.0")));
        assert!(!c.matches(&v("2.0.0")));

        let c = VersionConstraint::parse("1.x").unwrap();
        assert!(c.matches(&v("1.2.3")));
        assert!(!c.matches(&v("2.0.0")));

        let c = VersionConstraint::parse("1.2.x").unwrap();
        assert!(c.matches(&v("1.2.9")));
        assert!(!c.matches(&v("1.3.0")));
    }

    #[test]
    fn test_star_and_latest() {
        for range in ["*", "latest", ""] {
            let c = VersionConstraint::parse(range).unwrap();
            assert!(c.matches(&v("0.0.1")));
            assert!(c.matches(&v("99.0.0")));
        }
    }

    #[test]
    fn test_unparseable_is_error() {
        assert!(matches!(
            VersionConstraint::parse("not-a-range"),
            Err(SlinkError::RangeInvalid(_))
        ));
        assert!(VersionConstraint::parse(">=1.0.0 <2.0.0 <3.0.0").is_err());
    }

    #[test]
    fn test_max_satisfying() {
        let versions = vec![v("1.2.0"), v("1.3.5"), v("2.0.0"), v("1.3.0")];
        let c = VersionConstraint::parse("^1.2.0").unwrap();
        assert_eq!(c.max_satisfying(&versions), Some(v("1.3.5")));

        let c = VersionConstraint::parse("^3.0.0").unwrap();
        assert_eq!(c.max_satisfying(&versions), None);

        let none: Vec<semver::Version> = Vec::new();
        let c = VersionConstraint::parse("*").unwrap();
        assert_eq!(c.max_satisfying(&none), None);
    }

    #[test]
    fn test_prerelease_below_release() {
        let versions = vec![v("1.3.0-beta.1"), v("1.2.9")];
        let c = VersionConstraint::parse("*").unwrap();
        assert_eq!(c.max_satisfying(&versions), Some(v("1.3.0-beta.1")));

        let versions = vec![v("1.3.0-beta.1"), v("1.3.0")];
        assert_eq!(c.max_satisfying(&versions), Some(v("1.3.0")));
    }

    #[test]
    fn test_hyphen_range() {
        let c = VersionConstraint::parse("1.0.0 - 2.0.0").unwrap();
        assert!(c.matches(&v("1.5.0")));
        assert!(c.matches(&v("2.0.0")));
        assert!(!c.matches(&v("2.0.1")));
    }
}
