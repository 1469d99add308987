//! Measurement paths and forests

use crate::error::{MeterError, MeterResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Separator between path segments in the rendered form.
pub const PATH_DELIMITER: char = '\\';

/// One of the independent measurement trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Forest {
    /// Ad hoc scopes and expressions
    Blocks,
    /// Intercepted member calls
    Methods,
}

impl Forest {
    /// Name of the root segment.
    pub fn root_segment(self) -> &'static str {
        match self {
            Forest::Blocks => "blocks",
            Forest::Methods => "methods",
        }
    }

    /// Look a forest up by its root segment.
    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "blocks" => Some(Forest::Blocks),
            "methods" => Some(Forest::Methods),
            _ => None,
        }
    }
}

/// Check that `label` can be used as a single path segment.
pub fn validate_label(label: &str) -> MeterResult<()> {
    if label.is_empty() {
        return Err(MeterError::InvalidLabel {
            label: label.to_string(),
            reason: "label is empty",
        });
    }
    if label.contains(PATH_DELIMITER) {
        return Err(MeterError::InvalidLabel {
            label: label.to_string(),
            reason: "label contains the path delimiter",
        });
    }
    Ok(())
}

/// Position of a measurement in its forest, e.g. `\blocks\parse\tokenize`.
///
/// Ordering compares segment by segment, so a path always sorts directly
/// before its own descendants and after its ancestors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeasurementPath {
    segments: Vec<String>,
}

impl MeasurementPath {
    /// The root path of a forest.
    pub fn root(forest: Forest) -> Self {
        Self {
            segments: vec![forest.root_segment().to_string()],
        }
    }

    /// Build a path from raw segments.
    ///
    /// The first segment must name a forest and every segment must be a
    /// valid label.
    pub fn from_segments<I, S>(segments: I) -> MeterResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        match segments.first() {
            Some(first) if Forest::from_segment(first).is_some() => {}
            _ => {
                return Err(MeterError::InvalidPath(format!(
                    "path must start at a forest root, got {:?}",
                    segments
                )))
            }
        }
        for segment in &segments {
            validate_label(segment)?;
        }
        Ok(Self { segments })
    }

    /// Wrap segments that are already known to be valid.
    pub(crate) fn from_trusted(segments: Vec<String>) -> Self {
        Self { segments }
    }

    /// A child of this path. The label is assumed to be validated.
    pub(crate) fn child(&self, label: &str) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend(self.segments.iter().cloned());
        segments.push(label.to_string());
        Self { segments }
    }

    /// The sibling of this path with its last segment replaced.
    pub(crate) fn with_last(&self, label: &str) -> Self {
        let mut segments = self.segments.clone();
        if let Some(last) = segments.last_mut() {
            *last = label.to_string();
        }
        Self { segments }
    }

    /// Path segments, forest root first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments; forest roots have depth 1.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// The last segment.
    pub fn last(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// The forest this path belongs to.
    pub fn forest(&self) -> Option<Forest> {
        self.segments.first().and_then(|s| Forest::from_segment(s))
    }

    /// True for a forest root.
    pub fn is_root(&self) -> bool {
        self.segments.len() == 1
    }

    /// The enclosing path, `None` for a forest root.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() <= 1 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// All proper ancestors, root first.
    pub fn ancestors(&self) -> Vec<Self> {
        (1..self.segments.len())
            .map(|len| Self {
                segments: self.segments[..len].to_vec(),
            })
            .collect()
    }

    /// True when `self` equals `other` or encloses it.
    pub fn contains(&self, other: &MeasurementPath) -> bool {
        other.segments.starts_with(&self.segments)
    }

    /// Move this path from under `from` to under `to`.
    ///
    /// Returns `None` when `from` does not contain this path.
    pub fn rebase(&self, from: &MeasurementPath, to: &MeasurementPath) -> Option<Self> {
        if !from.contains(self) {
            return None;
        }
        let mut segments = to.segments.clone();
        segments.extend(self.segments[from.segments.len()..].iter().cloned());
        Some(Self { segments })
    }
}

impl fmt::Display for MeasurementPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "{}{}", PATH_DELIMITER, segment)?;
        }
        Ok(())
    }
}

impl FromStr for MeasurementPath {
    type Err = MeterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.strip_prefix(PATH_DELIMITER).ok_or_else(|| {
            MeterError::InvalidPath(format!("{:?} does not start with the delimiter", s))
        })?;
        Self::from_segments(rest.split(PATH_DELIMITER))
    }
}

impl Serialize for MeasurementPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MeasurementPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> MeasurementPath {
        s.parse().unwrap()
    }

    #[test]
    fn test_validate_label() {
        assert!(validate_label("parse").is_ok());
        assert!(validate_label("Parser.parse").is_ok());
        assert!(validate_label("flag = \"true\"").is_ok());
        assert!(matches!(
            validate_label(""),
            Err(MeterError::InvalidLabel { .. })
        ));
        assert!(matches!(
            validate_label("a\\b"),
            Err(MeterError::InvalidLabel { .. })
        ));
    }

    #[test]
    fn test_render_and_parse() {
        let root = MeasurementPath::root(Forest::Blocks);
        assert_eq!(root.to_string(), "\\blocks");

        let p = root.child("d").child("c");
        assert_eq!(p.to_string(), "\\blocks\\d\\c");
        assert_eq!(path("\\blocks\\d\\c"), p);
        assert_eq!(p.depth(), 3);
        assert_eq!(p.last(), "c");
        assert_eq!(p.forest(), Some(Forest::Blocks));
    }

    #[test]
    fn test_parse_rejects_unknown_roots() {
        assert!("blocks\\a".parse::<MeasurementPath>().is_err());
        assert!("\\other\\a".parse::<MeasurementPath>().is_err());
        assert!("\\blocks\\\\a".parse::<MeasurementPath>().is_err());
    }

    #[test]
    fn test_parent_and_ancestors() {
        let p = path("\\methods\\Parser.parse\\Lexer.next");
        assert_eq!(p.parent(), Some(path("\\methods\\Parser.parse")));
        assert_eq!(
            p.ancestors(),
            vec![path("\\methods"), path("\\methods\\Parser.parse")]
        );
        assert_eq!(MeasurementPath::root(Forest::Methods).parent(), None);
    }

    #[test]
    fn test_ordering_keeps_descendants_after_parent() {
        // A plain string sort would put "d-x" between "d" and "d\c".
        let mut paths = vec![
            path("\\blocks\\d\\c"),
            path("\\blocks\\d-x"),
            path("\\blocks\\d"),
            path("\\blocks"),
        ];
        paths.sort();
        assert_eq!(
            paths,
            vec![
                path("\\blocks"),
                path("\\blocks\\d"),
                path("\\blocks\\d\\c"),
                path("\\blocks\\d-x"),
            ]
        );
    }

    #[test]
    fn test_rebase() {
        let from = path("\\blocks\\x");
        let to = path("\\blocks\\x = \"1\"");
        assert_eq!(
            path("\\blocks\\x\\y").rebase(&from, &to),
            Some(path("\\blocks\\x = \"1\"\\y"))
        );
        assert_eq!(path("\\blocks\\z").rebase(&from, &to), None);
    }

    #[test]
    fn test_serde_as_string() {
        let p = path("\\blocks\\a");
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "\"\\\\blocks\\\\a\"");
        let back: MeasurementPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
