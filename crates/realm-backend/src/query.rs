//! Table query builder.
//!
//! A [`Query`] names a table, a select expression in PostgREST syntax
//! (`*, collectible:collectibles(*)`), equality filters, an optional
//! order and limit, and the conflict column used by upserts. Filter values
//! are kept in their wire form so both backends compare them the same way.

use std::fmt::Display;

/// Sort order of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Column to sort by.
    pub column: String,
    /// Ascending when true.
    pub ascending: bool,
}

/// A query against one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Target table.
    pub table: String,
    /// Select expression.
    pub select: String,
    /// `(column, value)` equality filters, all of which must match.
    pub filters: Vec<(String, String)>,
    /// Optional sort.
    pub order: Option<Order>,
    /// Optional row limit.
    pub limit: Option<usize>,
    /// Conflict column for upserts; defaults to `id`.
    pub on_conflict: Option<String>,
}

impl Query {
    /// Select every column of `table`.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            select: "*".to_owned(),
            filters: Vec::new(),
            order: None,
            limit: None,
            on_conflict: None,
        }
    }

    /// Replace the select expression.
    #[must_use]
    pub fn select(mut self, select: impl Into<String>) -> Self {
        self.select = select.into();
        self
    }

    /// Require `column` to equal `value`.
    #[must_use]
    pub fn eq(mut self, column: impl Into<String>, value: impl Display) -> Self {
        self.filters.push((column.into(), value.to_string()));
        self
    }

    /// Sort by `column`.
    #[must_use]
    pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.into(),
            ascending,
        });
        self
    }

    /// Return at most `limit` rows.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Resolve upsert conflicts on `column`.
    #[must_use]
    pub fn on_conflict(mut self, column: impl Into<String>) -> Self {
        self.on_conflict = Some(column.into());
        self
    }

    /// The conflict column for upserts.
    pub fn conflict_column(&self) -> &str {
        self.on_conflict.as_deref().unwrap_or("id")
    }

    /// PostgREST query-string parameters for this query.
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = Vec::with_capacity(self.filters.len().saturating_add(3));
        params.push(("select".to_owned(), compact_select(&self.select)));
        for (column, value) in &self.filters {
            params.push((column.clone(), format!("eq.{value}")));
        }
        if let Some(order) = &self.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            params.push(("order".to_owned(), format!("{}.{direction}", order.column)));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_owned(), limit.to_string()));
        }
        params
    }
}

/// Strip whitespace from a select expression.
fn compact_select(select: &str) -> String {
    select.chars().filter(|c| !c.is_whitespace()).collect()
}

/// One item of a parsed select expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectItem {
    /// `*`
    All,
    /// A plain column.
    Column(String),
    /// An embedded related row: `alias:table!hint(columns)`.
    Embed {
        /// Key under which the related row appears.
        alias: String,
        /// Related table.
        table: String,
        /// Whether the parent row is dropped when the relation is empty.
        inner: bool,
        /// Columns of the related row.
        columns: Vec<SelectItem>,
    },
}

/// Parse a PostgREST select expression.
pub fn parse_select(select: &str) -> Vec<SelectItem> {
    split_top_level(&compact_select(select))
        .into_iter()
        .filter(|item| !item.is_empty())
        .map(|item| parse_item(&item))
        .collect()
}

fn parse_item(item: &str) -> SelectItem {
    if item == "*" {
        return SelectItem::All;
    }
    let Some(open) = item.find('(') else {
        return SelectItem::Column(item.to_owned());
    };
    let head = item.get(..open).unwrap_or_default();
    let body = item
        .get(open.saturating_add(1)..)
        .and_then(|rest| rest.strip_suffix(')'))
        .unwrap_or_default();

    let (alias, target) = head.split_once(':').unwrap_or((head, head));
    let (table, hint) = target.split_once('!').unwrap_or((target, ""));
    SelectItem::Embed {
        alias: alias.to_owned(),
        table: table.to_owned(),
        inner: hint == "inner",
        columns: parse_select(body),
    }
}

fn split_top_level(select: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut depth = 0_usize;
    for c in select.chars() {
        match c {
            '(' => {
                depth = depth.saturating_add(1);
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => items.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    items.push(current);
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_produces_postgrest_params() {
        let query = Query::table("economy_ledger")
            .eq("user_id", "u-1")
            .order("occurred_at", false)
            .limit(10);
        assert_eq!(
            query.params(),
            vec![
                ("select".to_owned(), "*".to_owned()),
                ("user_id".to_owned(), "eq.u-1".to_owned()),
                ("order".to_owned(), "occurred_at.desc".to_owned()),
                ("limit".to_owned(), "10".to_owned()),
            ]
        );
    }

    #[test]
    fn boolean_filters_use_wire_form() {
        let query = Query::table("seasonal_events").eq("is_active", true);
        assert_eq!(query.filters, vec![("is_active".to_owned(), "true".to_owned())]);
        assert_eq!(query.conflict_column(), "id");
    }

    #[test]
    fn select_with_embeds_is_parsed() {
        let items =
            parse_select("*, collectible:collectibles(*), seller:user_profiles!inner(username, flair_title)");
        assert_eq!(
            items,
            vec![
                SelectItem::All,
                SelectItem::Embed {
                    alias: "collectible".to_owned(),
                    table: "collectibles".to_owned(),
                    inner: false,
                    columns: vec![SelectItem::All],
                },
                SelectItem::Embed {
                    alias: "seller".to_owned(),
                    table: "user_profiles".to_owned(),
                    inner: true,
                    columns: vec![
                        SelectItem::Column("username".to_owned()),
                        SelectItem::Column("flair_title".to_owned()),
                    ],
                },
            ]
        );
    }

    #[test]
    fn plain_column_list_is_parsed() {
        assert_eq!(
            parse_select("status"),
            vec![SelectItem::Column("status".to_owned())]
        );
    }
}
