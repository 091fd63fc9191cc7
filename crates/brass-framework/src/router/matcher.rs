use std::sync::Arc;

use brass_core::DeclarationError;
use percent_encoding::percent_decode_str;
use regex::Regex;

use crate::http::PathParams;

/// A raw match reported by a [`PathMatcher`].
///
/// Matchers either hand out the parameters directly, or hand out a list of
/// captured values (`stash`) plus the position of each named parameter in
/// it. The router accepts both.
#[derive(Debug, Clone)]
pub enum RawMatch<P> {
    Inline {
        payload: P,
        params: PathParams,
    },
    Indexed {
        payload: P,
        indices: Vec<(String, usize)>,
        stash: Arc<[String]>,
    },
}

impl<P> RawMatch<P> {
    /// Splits the match into its payload and the parameter map.
    pub fn into_parts(self) -> (P, PathParams) {
        match self {
            Self::Inline { payload, params } => (payload, params),
            Self::Indexed {
                payload,
                indices,
                stash,
            } => {
                let params = indices
                    .into_iter()
                    .filter_map(|(name, index)| stash.get(index).map(|value| (name, value.clone())))
                    .collect();
                (payload, params)
            }
        }
    }
}

/// Path matching engine behind the [`Router`](super::Router).
pub trait PathMatcher<P>: Send + Sync {
    /// Registers `pattern` for `method` (`"ALL"` for every method).
    fn add(&mut self, method: &str, pattern: &str, payload: P) -> Result<(), DeclarationError>;

    /// Returns every registered payload whose method and pattern match, in
    /// registration order.
    fn find(&self, method: &str, path: &str) -> Vec<RawMatch<P>>;
}

// =============================================================================
// RegexMatcher
// =============================================================================

struct Route<P> {
    method: String,
    regex: Regex,
    names: Vec<String>,
    payload: P,
}

/// Matches each pattern with its own compiled regular expression.
///
/// Supported patterns: literal segments, `:name` parameters and `*`. A
/// trailing `/*` also matches the bare prefix, so `/users/*` matches
/// `/users` as well as `/users/42/posts`.
pub struct RegexMatcher<P> {
    routes: Vec<Route<P>>,
}

impl<P> Default for RegexMatcher<P> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<P> RegexMatcher<P> {
    pub fn new() -> Self {
        Self::default()
    }

    fn compile(pattern: &str) -> Result<(Regex, Vec<String>), regex::Error> {
        let (body, open_tail) = match pattern.strip_suffix("/*") {
            Some(prefix) => (prefix, true),
            None => (pattern, false),
        };

        let mut names = Vec::new();
        let mut source = String::from("^");
        for segment in body.split('/').filter(|s| !s.is_empty()) {
            source.push('/');
            if let Some(name) = segment.strip_prefix(':') {
                names.push(name.to_owned());
                source.push_str("([^/]+)");
            } else if segment == "*" {
                source.push_str(".*");
            } else {
                source.push_str(&regex::escape(segment));
            }
        }

        if open_tail {
            source.push_str("(?:/.*)?");
        } else if source == "^" {
            source.push('/');
        } else {
            source.push_str("/?");
        }
        source.push('$');

        Ok((Regex::new(&source)?, names))
    }
}

impl<P: Clone + Send + Sync> PathMatcher<P> for RegexMatcher<P> {
    fn add(&mut self, method: &str, pattern: &str, payload: P) -> Result<(), DeclarationError> {
        let (regex, names) =
            Self::compile(pattern).map_err(|e| DeclarationError::invalid(pattern, e.to_string()))?;
        self.routes.push(Route {
            method: method.to_ascii_uppercase(),
            regex,
            names,
            payload,
        });
        Ok(())
    }

    fn find(&self, method: &str, path: &str) -> Vec<RawMatch<P>> {
        self.routes
            .iter()
            .filter(|route| route.method == "ALL" || route.method.eq_ignore_ascii_case(method))
            .filter_map(|route| {
                let captures = route.regex.captures(path)?;
                let stash: Arc<[String]> = captures
                    .iter()
                    .skip(1)
                    .map(|m| m.map(|m| decode_segment(m.as_str())).unwrap_or_default())
                    .collect();
                let indices = route
                    .names
                    .iter()
                    .cloned()
                    .enumerate()
                    .map(|(index, name)| (name, index))
                    .collect();
                Some(RawMatch::Indexed {
                    payload: route.payload.clone(),
                    indices,
                    stash,
                })
            })
            .collect()
    }
}

/// Percent-decodes a captured value, keeping it raw when it is not UTF-8.
fn decode_segment(raw: &str) -> String {
    percent_decode_str(raw)
        .decode_utf8()
        .map_or_else(|_| raw.to_owned(), |decoded| decoded.into_owned())
}
