//! Path segmentation and parameter extraction.

use crate::error::{Result, RouterError};
use crate::request::PathParams;

/// Prefix marking a named parameter segment, as in `/users/:id`.
pub const PARAM_SIGIL: char = ':';

/// Segment marking a catch-all position, as in `/admin/*`.
pub const CATCH_ALL: &str = "*";

/// Key of a child edge in the route tree.
///
/// Every parameter name at a given position shares the single `Param` key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SegmentKey {
    /// Exact segment text.
    Literal(String),
    /// Any one segment.
    Param,
}

/// A classified pattern segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Segment<'a> {
    /// Produced by leading, trailing or doubled slashes. Stays on the current node.
    Empty,
    /// `*`: flags the current node.
    CatchAll,
    /// `:name`
    Param(&'a str),
    Literal(&'a str),
}

impl<'a> Segment<'a> {
    pub(crate) fn classify(segment: &'a str) -> Self {
        if segment.is_empty() {
            Self::Empty
        } else if segment == CATCH_ALL {
            Self::CatchAll
        } else if let Some(name) = segment.strip_prefix(PARAM_SIGIL) {
            Self::Param(name)
        } else {
            Self::Literal(segment)
        }
    }
}

/// Splits a pattern into classified segments, rejecting bare `:` segments.
pub(crate) fn parse_pattern(pattern: &str) -> Result<Vec<Segment<'_>>> {
    pattern
        .split('/')
        .map(|raw| match Segment::classify(raw) {
            Segment::Param("") => Err(RouterError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "parameter segment without a name".to_string(),
            }),
            segment => Ok(segment),
        })
        .collect()
}

/// Joins a group prefix and a child pattern into a full template.
///
/// Empty components are elided and the rest joined with single slashes, so
/// `("/api/", "users/:id")` gives `/api/users/:id` and the root is `/`.
pub(crate) fn join(prefix: &str, pattern: &str) -> String {
    let mut template = String::new();
    for component in prefix
        .split('/')
        .chain(pattern.split('/'))
        .filter(|c| !c.is_empty())
    {
        template.push('/');
        template.push_str(component);
    }
    if template.is_empty() {
        template.push('/');
    }
    template
}

/// Names of the parameters in `template`, in order.
pub(crate) fn param_names(template: &str) -> Vec<&str> {
    template
        .split('/')
        .filter_map(|raw| match Segment::classify(raw) {
            Segment::Param(name) => Some(name),
            _ => None,
        })
        .collect()
}

/// Recovers parameter values by rescanning a template against a concrete path.
///
/// Both sides are split on `/` with empty segments skipped, the same way the
/// tree matches, so `//users/42/` lines up with `/users/:id`. Each `:name`
/// segment takes the path segment in the same position. Catch-all segments
/// consume nothing. The pair must come from a successful tree match: literals
/// are not compared, and a path that runs out early just yields fewer values.
///
/// # Example
///
/// ```
/// use trie_router::extract_params;
///
/// let params = extract_params("/posts/:postId/comments/:commentId", "/posts/1/comments/2");
/// assert_eq!(params.get("postId"), Some("1"));
/// assert_eq!(params.get("commentId"), Some("2"));
/// ```
pub fn extract_params(template: &str, path: &str) -> PathParams {
    let mut params = PathParams::new();
    let mut values = path.split('/').filter(|s| !s.is_empty());

    for raw in template.split('/') {
        match Segment::classify(raw) {
            Segment::Empty | Segment::CatchAll => {}
            Segment::Param(name) => match values.next() {
                Some(value) => params.insert(name, value),
                None => break,
            },
            Segment::Literal(_) => {
                if values.next().is_none() {
                    break;
                }
            }
        }
    }

    params
}
