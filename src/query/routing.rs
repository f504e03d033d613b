//! Keyword-to-document routing table.
//!
//! A query that mentions keywords of exactly one document gets that document
//! pre-selected. Queries touching several documents only collect the routed
//! set, which later earns a relevance bonus during ranking.
use crate::config::DocumentRoute;

#[derive(Debug, Clone, Default)]
pub struct DocumentRouter {
    routes: Vec<DocumentRoute>,
}

/// Routing decision for a single query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteMatch {
    /// Every document whose keyword set intersects the query, in table order.
    pub routed: Vec<String>,
    /// Set only when exactly one document matched.
    pub auto_selected: Option<String>,
}

impl DocumentRouter {
    #[must_use]
    pub fn new(routes: Vec<DocumentRoute>) -> Self {
        let routes = routes
            .into_iter()
            .map(|r| DocumentRoute {
                document_id: r.document_id,
                keywords: r.keywords.iter().map(|k| k.to_lowercase()).collect(),
            })
            .collect();
        Self { routes }
    }

    pub fn route(&self, query: &str) -> RouteMatch {
        let query_lower = query.to_lowercase();
        let mut routed: Vec<String> = Vec::new();

        for route in &self.routes {
            let hit = route
                .keywords
                .iter()
                .any(|kw| !kw.is_empty() && query_lower.contains(kw.as_str()));
            if hit && !routed.contains(&route.document_id) {
                routed.push(route.document_id.clone());
            }
        }

        let auto_selected = if routed.len() == 1 {
            routed.first().cloned()
        } else {
            None
        };

        RouteMatch {
            routed,
            auto_selected,
        }
    }
}
