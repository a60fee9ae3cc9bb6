//! Table query builder.
//!
//! A [`TableQuery`] describes a read against one table of the backing store:
//! the column/embedding selection, equality filters, ordering and whether a
//! single row is expected. Transports turn it into their own request format;
//! [`TableQuery::to_query_pairs`] yields the PostgREST query-string form.

use crate::id::{ReservationId, UserId};

/// Table names used by the reservation workflow.
pub mod tables {
    pub const RESERVATIONS: &str = "reservations";
    pub const RESERVATION_HISTORY: &str = "reservation_history";
    pub const PROFILES: &str = "profiles";
}

/// Name of the server-side status-transition procedure.
pub const UPDATE_STATUS_PROCEDURE: &str = "update_reservation_status";

/// Reservation columns with customer and items (and their equipment) embedded.
pub const RESERVATION_DETAILS_SELECT: &str = "*,\
customer:customers(first_name,last_name,email,phone),\
items:reservation_items(equipment_id,quantity,price_per_day,deposit,\
equipment:equipment(name,description))";

/// History columns.
pub const STATUS_HISTORY_SELECT: &str =
    "id,previous_status,new_status,changed_at,comment,changed_by";

/// A filter on a single column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    /// Column name.
    pub column: String,
    /// Comparison operator.
    pub op: FilterOp,
    /// Right-hand side value, already rendered as text.
    pub value: String,
}

/// Comparison operators. Only equality is needed today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
}

impl FilterOp {
    fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
        }
    }
}

/// Ordering specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSpec {
    /// Column to order by.
    pub column: String,
    /// Sort direction.
    pub direction: OrderDirection,
}

impl OrderSpec {
    /// Create an ascending order spec.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: OrderDirection::Asc,
        }
    }

    /// Create a descending order spec.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: OrderDirection::Desc,
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

/// A read against one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableQuery {
    /// Table to read from.
    pub table: String,
    /// Selection, including embedded relations.
    pub select: String,
    /// Conjunction of filters.
    pub filters: Vec<Filter>,
    /// Ordering.
    pub order_by: Vec<OrderSpec>,
    /// Whether exactly one row is expected.
    pub single: bool,
}

impl TableQuery {
    /// Start a query selecting all columns of `table`.
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            select: "*".to_string(),
            filters: Vec::new(),
            order_by: Vec::new(),
            single: false,
        }
    }

    /// Set the selection.
    pub fn select(mut self, select: impl Into<String>) -> Self {
        self.select = select.into();
        self
    }

    /// Add an equality filter.
    pub fn eq(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push(Filter {
            column: column.into(),
            op: FilterOp::Eq,
            value: value.to_string(),
        });
        self
    }

    /// Add an ordering.
    pub fn order(mut self, order: OrderSpec) -> Self {
        self.order_by.push(order);
        self
    }

    /// Expect a single row.
    pub fn single(mut self) -> Self {
        self.single = true;
        self
    }

    /// Reservation with customer, items and equipment.
    pub fn reservation_details(id: &ReservationId) -> Self {
        Self::from(tables::RESERVATIONS)
            .select(RESERVATION_DETAILS_SELECT)
            .eq("id", id)
            .single()
    }

    /// History of one reservation, newest first.
    pub fn status_history(id: &ReservationId) -> Self {
        Self::from(tables::RESERVATION_HISTORY)
            .select(STATUS_HISTORY_SELECT)
            .eq("reservation_id", id)
            .order(OrderSpec::desc("changed_at"))
    }

    /// Administrator flag of one profile.
    pub fn admin_flag(user_id: &UserId) -> Self {
        Self::from(tables::PROFILES)
            .select("id,is_admin")
            .eq("id", user_id)
            .single()
    }

    /// Render as PostgREST query-string pairs. Single-row expectation is not
    /// part of the query string; transports signal it out of band.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("select".to_string(), self.select.clone())];

        for filter in &self.filters {
            pairs.push((
                filter.column.clone(),
                format!("{}.{}", filter.op.as_str(), filter.value),
            ));
        }

        if !self.order_by.is_empty() {
            let order = self
                .order_by
                .iter()
                .map(|o| match o.direction {
                    OrderDirection::Asc => format!("{}.asc", o.column),
                    OrderDirection::Desc => format!("{}.desc", o.column),
                })
                .collect::<Vec<_>>()
                .join(",");
            pairs.push(("order".to_string(), order));
        }

        pairs
    }
}
