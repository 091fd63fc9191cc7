//! Routing: handler registration and the match policy.
//!
//! The [`Router`] hands raw pattern matching to a [`PathMatcher`] and
//! applies the selection policy on top:
//!
//! - of all matching method handlers, the one with the highest priority
//!   wins; on a tie, the first registered wins;
//! - all matching middleware is kept, highest priority first, ties in
//!   registration order, regardless of the request method.

mod matcher;
mod path;

use std::fmt;
use std::sync::Arc;

use brass_core::DeclarationError;
use http::Method;
use tracing::{debug, warn};

use crate::handler::{Handler, HandlerMatch, MatchResult, MethodHandler, MiddlewareHandler};
use crate::http::HttpVerb;

pub use matcher::{PathMatcher, RawMatch, RegexMatcher};
pub use path::{join_paths, wildcard_path};

enum Entry {
    Method(Arc<MethodHandler>),
    Middleware(Arc<MiddlewareHandler>),
}

/// Registered handlers plus the matcher indexing them.
pub struct Router {
    matcher: Box<dyn PathMatcher<usize>>,
    entries: Vec<Entry>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// A router backed by a [`RegexMatcher`].
    pub fn new() -> Self {
        Self::with_matcher(RegexMatcher::new())
    }

    /// A router backed by a custom matcher.
    pub fn with_matcher(matcher: impl PathMatcher<usize> + 'static) -> Self {
        Self {
            matcher: Box::new(matcher),
            entries: Vec::new(),
        }
    }

    /// Registers a handler. Middleware answers every request method.
    pub fn add(&mut self, handler: Handler) -> Result<(), DeclarationError> {
        let index = self.entries.len();
        match handler {
            Handler::Method(handler) => {
                self.matcher.add(handler.verb.as_str(), &handler.path, index)?;
                debug!(verb = %handler.verb, path = %handler.path, priority = handler.priority, "Added method route");
                self.entries.push(Entry::Method(Arc::new(handler)));
            }
            Handler::Middleware(handler) => {
                self.matcher.add(HttpVerb::All.as_str(), &handler.path, index)?;
                debug!(path = %handler.path, priority = handler.priority, "Added middleware route");
                self.entries.push(Entry::Middleware(Arc::new(handler)));
            }
        }
        Ok(())
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Matches a request against every registered handler.
    pub fn match_route(&self, method: &Method, path: &str) -> MatchResult {
        let mut selected: Option<(usize, HandlerMatch<MethodHandler>)> = None;
        let mut middlewares: Vec<(usize, HandlerMatch<MiddlewareHandler>)> = Vec::new();

        for raw in self.matcher.find(method.as_str(), path) {
            let (index, params) = raw.into_parts();
            match self.entries.get(index) {
                Some(Entry::Method(handler)) => {
                    if !handler.verb.accepts(method) {
                        continue;
                    }
                    let better = match &selected {
                        None => true,
                        Some((best_index, best)) => {
                            handler.priority > best.handler.priority
                                || (handler.priority == best.handler.priority && index < *best_index)
                        }
                    };
                    if better {
                        let handler = handler.clone();
                        selected = Some((index, HandlerMatch { handler, params }));
                    }
                }
                Some(Entry::Middleware(handler)) => {
                    let handler = handler.clone();
                    middlewares.push((index, HandlerMatch { handler, params }));
                }
                None => warn!(index, "Path matcher returned an unknown handler"),
            }
        }

        middlewares.sort_by(|(ia, a), (ib, b)| {
            b.handler
                .priority
                .cmp(&a.handler.priority)
                .then_with(|| ia.cmp(ib))
        });

        MatchResult {
            middlewares: middlewares.into_iter().map(|(_, m)| m).collect(),
            method: selected.map(|(_, m)| m),
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("handlers", &self.entries.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use brass_core::{BoxError, Instance, MethodTarget, Target};
    use futures::FutureExt;
    use serde_json::Value;

    use super::*;
    use crate::execution::ExecutionContext;
    use crate::http::PathParams;
    use crate::middleware::{Middleware, MiddlewareRef, Next};
    use crate::param::Params;

    struct Controller;
    struct Noop;

    #[async_trait]
    impl Middleware for Noop {
        async fn handle(&self, _ctx: Arc<ExecutionContext>, next: Next) -> Result<(), BoxError> {
            next.run().await
        }
    }

    fn method(verb: HttpVerb, path: &str, priority: i32, name: &'static str) -> Handler {
        Handler::Method(MethodHandler {
            verb,
            path: path.to_string(),
            priority,
            target: MethodTarget::of::<Controller>(name),
            controller: Target::of::<Controller>(),
            interceptors: Vec::new(),
            params: Vec::new(),
            invoke: Arc::new(|_: Instance, _: Params| async { Ok::<_, BoxError>(Value::Null) }.boxed()),
        })
    }

    fn middleware(path: &str, priority: i32) -> Handler {
        Handler::Middleware(MiddlewareHandler {
            path: path.to_string(),
            priority,
            middleware: MiddlewareRef::of::<Noop>(),
        })
    }

    #[test]
    fn test_highest_priority_first_registered_wins() {
        let mut router = Router::new();
        for (priority, name) in [(2, "a"), (5, "b"), (5, "c"), (1, "d")] {
            router.add(method(HttpVerb::default(), "/items", priority, name)).unwrap();
        }

        let result = router.match_route(&Method::GET, "/items");
        let selected = result.method.unwrap();
        assert_eq!(selected.handler.priority, 5);
        assert_eq!(selected.handler.target.name(), "b");
    }

    #[test]
    fn test_middleware_order_and_verb_independence() {
        let mut router = Router::new();
        router.add(middleware("/*", 0)).unwrap();
        router.add(middleware("/items/*", 3)).unwrap();
        router.add(middleware("/items/:id", 0)).unwrap();
        router.add(method(HttpVerb::Exact(Method::POST), "/items/:id", 0, "update")).unwrap();

        let result = router.match_route(&Method::GET, "/items/9");
        let paths: Vec<_> = result.middlewares.iter().map(|m| m.handler.path.as_str()).collect();
        assert_eq!(paths, vec!["/items/*", "/*", "/items/:id"]);
        assert_eq!(result.middlewares[2].params["id"], "9");
        assert!(result.method.is_none());

        let result = router.match_route(&Method::POST, "/items/9");
        assert_eq!(result.method.unwrap().params["id"], "9");
    }

    #[test]
    fn test_all_verb_matches_any_method() {
        let mut router = Router::new();
        router.add(method(HttpVerb::All, "/health", 0, "health")).unwrap();

        assert!(router.match_route(&Method::DELETE, "/health").method.is_some());
        assert!(router.match_route(&Method::GET, "/other").method.is_none());
    }

    struct FixedMatcher(HashMap<usize, PathParams>);

    impl PathMatcher<usize> for FixedMatcher {
        fn add(&mut self, _method: &str, _pattern: &str, payload: usize) -> Result<(), DeclarationError> {
            self.0.insert(payload, PathParams::from([("slug".to_string(), "x".to_string())]));
            Ok(())
        }

        fn find(&self, _method: &str, _path: &str) -> Vec<RawMatch<usize>> {
            let mut payloads: Vec<_> = self.0.keys().copied().collect();
            payloads.sort_unstable();
            payloads
                .into_iter()
                .map(|payload| RawMatch::Inline {
                    payload,
                    params: self.0[&payload].clone(),
                })
                .collect()
        }
    }

    #[test]
    fn test_custom_matcher_with_inline_params() {
        let mut router = Router::with_matcher(FixedMatcher(HashMap::new()));
        router.add(method(HttpVerb::default(), "/ignored", 0, "show")).unwrap();

        let result = router.match_route(&Method::GET, "/anything");
        assert_eq!(result.method.unwrap().params["slug"], "x");
    }
}
