//! OData query shaping for Graph collection requests.
//!
//! [`GraphQuery`] collects the `$select`, `$top`, `$orderby`, `$filter` and
//! `$count` parameters plus the `ConsistencyLevel: eventual` header. Graph
//! only accepts advanced queries (counting, filtering on indexed
//! relationships) when the header and `$count=true` travel together, so
//! [`GraphQuery::advanced`] always sets both.

/// Header name Graph inspects for advanced query support.
pub const CONSISTENCY_LEVEL_HEADER: &str = "ConsistencyLevel";

/// The only value Graph accepts for [`CONSISTENCY_LEVEL_HEADER`].
pub const EVENTUAL: &str = "eventual";

/// Query parameters and headers for one collection request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphQuery {
    select: Vec<&'static str>,
    top: Option<u32>,
    order_by: Vec<&'static str>,
    filter: Option<String>,
    count: bool,
    eventual_consistency: bool,
}

impl GraphQuery {
    /// Empty query: no parameters, no extra headers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only request the listed properties.
    pub fn select(mut self, fields: &[&'static str]) -> Self {
        self.select = fields.to_vec();
        self
    }

    /// Return at most `n` results per page.
    pub fn top(mut self, n: u32) -> Self {
        self.top = Some(n);
        self
    }

    /// Sort by the listed properties.
    pub fn order_by(mut self, fields: &[&'static str]) -> Self {
        self.order_by = fields.to_vec();
        self
    }

    /// Raw OData filter expression. Callers quote literals with
    /// [`odata_string`].
    pub fn filter(mut self, expression: impl Into<String>) -> Self {
        self.filter = Some(expression.into());
        self
    }

    /// Adds `ConsistencyLevel: eventual` and `$count=true`.
    pub fn advanced(mut self) -> Self {
        self.count = true;
        self.eventual_consistency = true;
        self
    }

    /// True once [`GraphQuery::advanced`] has been applied.
    pub fn is_advanced(&self) -> bool {
        self.count && self.eventual_consistency
    }

    /// Query string pairs in a stable order.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if !self.select.is_empty() {
            pairs.push(("$select", self.select.join(",")));
        }
        if let Some(top) = self.top {
            pairs.push(("$top", top.to_string()));
        }
        if !self.order_by.is_empty() {
            pairs.push(("$orderby", self.order_by.join(",")));
        }
        if let Some(filter) = &self.filter {
            pairs.push(("$filter", filter.clone()));
        }
        if self.count {
            pairs.push(("$count", "true".to_string()));
        }
        pairs
    }

    /// Extra request headers.
    pub fn headers(&self) -> Vec<(&'static str, &'static str)> {
        if self.eventual_consistency {
            vec![(CONSISTENCY_LEVEL_HEADER, EVENTUAL)]
        } else {
            Vec::new()
        }
    }
}

/// Renders `value` as an OData string literal, doubling embedded quotes.
pub fn odata_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
