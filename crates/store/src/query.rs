use chrono::{DateTime, Utc};
use common::{OrderStatus, PaymentStatus, UserId};
use serde::{Deserialize, Serialize};

/// Default page size for order listings.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Largest page size a caller may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Column an order listing is sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrderSortField {
    #[default]
    #[serde(rename = "createdAt")]
    CreatedAt,
    #[serde(rename = "totalMoney")]
    TotalMoney,
    #[serde(rename = "status")]
    Status,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Filter, sort and paging options for listing orders.
#[derive(Debug, Clone)]
pub struct OrderQuery {
    /// Restrict to a single owner. `None` lists every order.
    pub user_id: Option<UserId>,

    pub status: Option<OrderStatus>,

    pub payment_status: Option<PaymentStatus>,

    /// Created at or after this instant.
    pub from: Option<DateTime<Utc>>,

    /// Created at or before this instant.
    pub to: Option<DateTime<Utc>>,

    pub sort_by: OrderSortField,

    pub direction: SortDirection,

    /// 1-based page number.
    pub page: u32,

    pub limit: u32,
}

impl Default for OrderQuery {
    fn default() -> Self {
        Self {
            user_id: None,
            status: None,
            payment_status: None,
            from: None,
            to: None,
            sort_by: OrderSortField::default(),
            direction: SortDirection::default(),
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl OrderQuery {
    /// Creates a query over all orders with default paging.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for a single user's orders.
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..Default::default()
        }
    }

    pub fn user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn payment_status(mut self, payment_status: PaymentStatus) -> Self {
        self.payment_status = Some(payment_status);
        self
    }

    /// Filters by creation time range (inclusive on both ends).
    pub fn created_between(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn sort(mut self, field: OrderSortField, direction: SortDirection) -> Self {
        self.sort_by = field;
        self.direction = direction;
        self
    }

    /// Sets the page, clamping both values into their valid ranges.
    pub fn paginate(mut self, page: u32, limit: u32) -> Self {
        self.page = page.max(1);
        self.limit = limit.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

/// One page of results plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

impl<T> Page<T> {
    /// Transforms the items while keeping paging information.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
        }
    }

    pub fn total_pages(&self) -> u64 {
        if self.limit == 0 {
            0
        } else {
            self.total.div_ceil(u64::from(self.limit))
        }
    }
}
