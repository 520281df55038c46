use serde_json::Value;

use crate::repo::Row;

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Comma-separated column list, or `*`
    Select { columns: String },
    Insert(Vec<Row>),
    /// Shallow patch merged into every matching row
    Update(Row),
    Delete,
}

/// Equality filter; several filters are AND-ed.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// Immutable description of a table operation. Building one has no side
/// effects; a backend interprets it in [`crate::backend::Backend::execute`].
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    table: String,
    operation: Operation,
    filters: Vec<Filter>,
    order: Option<Order>,
    single: bool,
}

/// Entry point returned by [`Query::from`]: picks the operation.
#[derive(Debug, Clone)]
pub struct TableQuery {
    table: String,
}

impl Query {
    pub fn from(table: impl Into<String>) -> TableQuery {
        TableQuery {
            table: table.into(),
        }
    }

    fn new(table: String, operation: Operation) -> Self {
        Self {
            table,
            operation,
            filters: Vec::new(),
            order: None,
            single: false,
        }
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.into(),
            ascending,
        });
        self
    }

    /// Resolve to the first row (or nothing) instead of a list.
    pub fn single(mut self) -> Self {
        self.single = true;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn order_by(&self) -> Option<&Order> {
        self.order.as_ref()
    }

    pub fn is_single(&self) -> bool {
        self.single
    }
}

impl TableQuery {
    pub fn select(self, columns: impl Into<String>) -> Query {
        Query::new(
            self.table,
            Operation::Select {
                columns: columns.into(),
            },
        )
    }

    pub fn insert(self, record: Row) -> Query {
        Query::new(self.table, Operation::Insert(vec![record]))
    }

    pub fn insert_many(self, records: Vec<Row>) -> Query {
        Query::new(self.table, Operation::Insert(records))
    }

    pub fn update(self, patch: Row) -> Query {
        Query::new(self.table, Operation::Update(patch))
    }

    pub fn delete(self) -> Query {
        Query::new(self.table, Operation::Delete)
    }
}

/// Splits a select list into column names; `None` means every column.
pub fn parse_columns(columns: &str) -> Option<Vec<&str>> {
    let columns: Vec<&str> = columns
        .split(',')
        .map(str::trim)
        .filter(|column| !column.is_empty())
        .collect();

    if columns.is_empty() || columns.contains(&"*") {
        None
    } else {
        Some(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_accumulates_intent() {
        let query = Query::from("photos")
            .select("*")
            .eq("user_id", "u1")
            .eq("id", "p1")
            .order("created_at", false)
            .single();

        assert_eq!(query.table(), "photos");
        assert_eq!(
            query.operation(),
            &Operation::Select {
                columns: "*".into()
            }
        );
        assert_eq!(query.filters().len(), 2);
        assert_eq!(query.filters()[1].value, Value::from("p1"));
        assert_eq!(
            query.order_by(),
            Some(&Order {
                column: "created_at".into(),
                ascending: false
            })
        );
        assert!(query.is_single());
    }

    #[test]
    fn later_order_replaces_earlier() {
        let query = Query::from("photos")
            .select("*")
            .order("a", true)
            .order("b", false);

        assert_eq!(query.order_by().map(|o| o.column.as_str()), Some("b"));
    }

    #[test]
    fn column_lists() {
        assert_eq!(parse_columns("*"), None);
        assert_eq!(parse_columns(""), None);
        assert_eq!(parse_columns("id, image_url"), Some(vec!["id", "image_url"]));
    }
}
