//! View query requests
//!
//! A `ViewQuery` names a view, a column projection, an optional ordering and
//! an optional row window. Backends render it into their own dialect: SQL for
//! Postgres, query-string parameters for the REST API.

use crate::db::types::{Record, compare_values};
use std::cmp::Ordering;

/// Column projection
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Projection {
    /// `*`
    #[default]
    All,
    /// Explicit column list
    Columns(Vec<String>),
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// `ORDER BY <column> <direction>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub direction: Direction,
}

/// A read request against a single view or table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewQuery {
    pub view: String,
    pub projection: Projection,
    pub order: Option<OrderBy>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ViewQuery {
    /// `select *` from a view, unordered and unlimited
    pub fn new(view: impl Into<String>) -> Self {
        Self {
            view: view.into(),
            projection: Projection::All,
            order: None,
            limit: None,
            offset: None,
        }
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = Projection::Columns(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order = Some(OrderBy {
            column: column.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Render as a Postgres `SELECT` with quoted identifiers.
    pub fn to_sql(&self) -> String {
        let projection = match &self.projection {
            Projection::All => "*".to_string(),
            Projection::Columns(cols) => cols
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", "),
        };
        let mut sql = format!("SELECT {} FROM {}", projection, quote_relation(&self.view));
        if let Some(order) = &self.order {
            let dir = match order.direction {
                Direction::Ascending => "ASC",
                Direction::Descending => "DESC",
            };
            sql.push_str(&format!(" ORDER BY {} {}", quote_ident(&order.column), dir));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }
        sql
    }

    /// Render as PostgREST query-string parameters (unencoded).
    pub fn to_postgrest_params(&self) -> Vec<(&'static str, String)> {
        let select = match &self.projection {
            Projection::All => "*".to_string(),
            Projection::Columns(cols) => cols.join(","),
        };
        let mut params = vec![("select", select)];
        if let Some(order) = &self.order {
            let dir = match order.direction {
                Direction::Ascending => "asc",
                Direction::Descending => "desc",
            };
            params.push(("order", format!("{}.{}", order.column, dir)));
        }
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(offset) = self.offset {
            params.push(("offset", offset.to_string()));
        }
        params
    }

    /// Evaluate this query over in-memory rows.
    ///
    /// Nulls and missing values sort last in either direction.
    pub fn apply(&self, mut rows: Vec<Record>) -> Vec<Record> {
        if let Some(order) = &self.order {
            rows.sort_by(|a, b| {
                let (av, bv) = (a.get(&order.column), b.get(&order.column));
                let a_null = av.is_none_or(|v| v.is_null());
                let b_null = bv.is_none_or(|v| v.is_null());
                match (a_null, b_null) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    (false, false) => {
                        let ord = match (av, bv) {
                            (Some(x), Some(y)) => compare_values(x, y),
                            _ => Ordering::Equal,
                        };
                        match order.direction {
                            Direction::Ascending => ord,
                            Direction::Descending => ord.reverse(),
                        }
                    }
                }
            });
        }

        let offset = self.offset.unwrap_or(0);
        let rows = rows.into_iter().skip(offset);
        let rows: Vec<Record> = match self.limit {
            Some(limit) => rows.take(limit).collect(),
            None => rows.collect(),
        };

        match &self.projection {
            Projection::All => rows,
            Projection::Columns(cols) => rows
                .into_iter()
                .map(|row| {
                    cols.iter()
                        .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
                        .collect()
                })
                .collect(),
        }
    }
}

/// Double-quote an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a possibly schema-qualified relation name (`schema.view`).
pub fn quote_relation(name: &str) -> String {
    match name.split_once('.') {
        Some((schema, rel)) => format!("{}.{}", quote_ident(schema), quote_ident(rel)),
        None => quote_ident(name),
    }
}
