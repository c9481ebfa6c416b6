//! Route table and path matching.

use std::collections::HashMap;
use std::sync::Arc;

use crate::models::RouteDefinition;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// A route path with `{name}` segments, e.g. `/users/{id}/orders`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    segments: Vec<Segment>,
    /// Literal segments before the first variable, joined back into a path
    literal_prefix: String,
}

impl PathTemplate {
    /// Parse a template path.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if a segment has unbalanced
    /// braces, an empty or non-identifier name, a `**` wildcard, or if the
    /// path declares no variable at all.
    pub fn parse(path: &str) -> Result<Self, String> {
        let rest = path
            .strip_prefix('/')
            .ok_or_else(|| format!("{path:?} must start with '/'"))?;

        let mut segments = Vec::new();
        for raw in rest.split('/') {
            if raw == "**" {
                return Err("'**' cannot be combined with template variables".to_string());
            }
            if !raw.contains(['{', '}']) {
                segments.push(Segment::Literal(raw.to_string()));
                continue;
            }
            let name = raw
                .strip_prefix('{')
                .and_then(|s| s.strip_suffix('}'))
                .ok_or_else(|| format!("segment {raw:?} must be exactly '{{name}}'"))?;
            let valid = !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
            if !valid {
                return Err(format!("invalid variable name in segment {raw:?}"));
            }
            segments.push(Segment::Variable(name.to_string()));
        }

        if !segments.iter().any(|s| matches!(s, Segment::Variable(_))) {
            return Err(format!("{path:?} declares no variables"));
        }

        let literal_prefix: String = segments
            .iter()
            .map_while(|s| match s {
                Segment::Literal(lit) => Some(lit.as_str()),
                Segment::Variable(_) => None,
            })
            .flat_map(|lit| ["/", lit])
            .collect();

        Ok(Self {
            segments,
            literal_prefix,
        })
    }

    /// Match a request path segment by segment, capturing variables.
    /// Variable segments must be non-empty.
    pub fn captures(&self, path: &str) -> Option<Vec<(String, String)>> {
        let rest = path.strip_prefix('/')?;
        let parts: Vec<&str> = rest.split('/').collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = Vec::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(lit) if lit == part => {}
                Segment::Variable(name) if !part.is_empty() => {
                    params.push((name.clone(), part.to_string()));
                }
                _ => return None,
            }
        }
        Some(params)
    }

    pub fn literal_prefix(&self) -> &str {
        &self.literal_prefix
    }
}

/// A successful route lookup.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<RouteDefinition>,
    /// Portion of the request path removed when the route strips its prefix
    pub prefix: String,
    /// Captured template variables, in path order
    pub params: Vec<(String, String)>,
}

impl RouteMatch {
    /// Path to request on the backend instance.
    ///
    /// With `strip_prefix` the matched prefix is removed and the remainder is
    /// rooted at `/` (an empty remainder becomes `/`, `v2/items` becomes
    /// `/v2/items`). Without it the request path is forwarded unchanged.
    pub fn target_path(&self, request_path: &str) -> String {
        if !self.route.strip_prefix {
            return request_path.to_string();
        }
        match request_path.strip_prefix(self.prefix.as_str()) {
            Some(rest) if rest.starts_with('/') => rest.to_string(),
            Some(rest) => format!("/{rest}"),
            None => request_path.to_string(),
        }
    }
}

/// Immutable routing table built once at startup.
///
/// Lookup order:
/// 1. exact path
/// 2. `/**` prefix routes, configuration order, first wins. The prefix test
///    is a raw string prefix, so `/api/**` also matches `/apiv2`.
/// 3. template routes, configuration order, first wins
#[derive(Debug, Default)]
pub struct RouteTable {
    exact: HashMap<String, Arc<RouteDefinition>>,
    wildcards: Vec<(String, Arc<RouteDefinition>)>,
    templates: Vec<(PathTemplate, Arc<RouteDefinition>)>,
    routes: Vec<Arc<RouteDefinition>>,
}

impl RouteTable {
    /// Build the table. Template routes that fail to parse are skipped;
    /// configuration validation rejects them before this point.
    pub fn new(routes: &[RouteDefinition]) -> Self {
        let mut table = Self::default();
        for route in routes {
            let route = Arc::new(route.clone());
            table.routes.push(route.clone());

            if let Some(prefix) = route.wildcard_prefix() {
                table.wildcards.push((prefix.to_string(), route.clone()));
            } else if route.is_template() {
                match PathTemplate::parse(&route.path) {
                    Ok(template) => table.templates.push((template, route.clone())),
                    Err(e) => {
                        tracing::warn!(route = %route.id, error = %e, "Skipping invalid template route");
                    }
                }
            }
            // Every path is also an exact key; a wildcard route's literal
            // "/**" path then only matches a request for that literal path.
            table.exact.entry(route.path.clone()).or_insert(route);
        }
        table
    }

    pub fn find(&self, path: &str) -> Option<RouteMatch> {
        if let Some(route) = self.exact.get(path) {
            let prefix = route
                .wildcard_prefix()
                .unwrap_or(route.path.as_str())
                .to_string();
            return Some(RouteMatch {
                route: route.clone(),
                prefix,
                params: Vec::new(),
            });
        }

        if let Some((prefix, route)) = self
            .wildcards
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix.as_str()))
        {
            return Some(RouteMatch {
                route: route.clone(),
                prefix: prefix.clone(),
                params: Vec::new(),
            });
        }

        self.templates.iter().find_map(|(template, route)| {
            template.captures(path).map(|params| RouteMatch {
                route: route.clone(),
                prefix: template.literal_prefix().to_string(),
                params,
            })
        })
    }

    /// Routes in configuration order.
    pub fn routes(&self) -> &[Arc<RouteDefinition>] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
