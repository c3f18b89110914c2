//! Route matching module
//!
//! Implements `/literal/:param` path templates. A `:name` segment captures
//! exactly one non-empty path segment; all other segments match literally.

/// One segment of a compiled path template
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(&'static str),
    Param(&'static str),
}

/// A compiled path template such as `/block/:ip`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    segments: Vec<Segment>,
}

/// Parameters captured by a successful match
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PathParams<'a> {
    params: Vec<(&'static str, &'a str)>,
}

impl<'a> PathParams<'a> {
    pub fn get(&self, name: &str) -> Option<&'a str> {
        self.params
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| *value)
    }
}

impl PathPattern {
    pub fn new(template: &'static str) -> Self {
        let segments = split_segments(template)
            .map(|segment| {
                segment
                    .strip_prefix(':')
                    .map_or(Segment::Literal(segment), Segment::Param)
            })
            .collect();
        Self { segments }
    }

    /// Match a request path, returning captured parameters on success
    pub fn matches<'a>(&self, path: &'a str) -> Option<PathParams<'a>> {
        let mut params = PathParams::default();
        let mut parts = split_segments(path);

        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(literal) => {
                    if part != *literal {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    params.params.push((*name, part));
                }
            }
        }

        // Trailing segments (including a trailing slash) mean no match
        if parts.next().is_some() {
            return None;
        }
        Some(params)
    }
}

/// Split a path into segments after the leading slash
fn split_segments(path: &str) -> std::str::Split<'_, char> {
    path.strip_prefix('/').unwrap_or(path).split('/')
}

/// Find the first pattern matching a path
pub fn match_route<'p, 'a, T>(
    path: &'a str,
    routes: &'p [(PathPattern, T)],
) -> Option<(&'p T, PathParams<'a>)> {
    routes
        .iter()
        .find_map(|(pattern, target)| pattern.matches(path).map(|params| (target, params)))
}
