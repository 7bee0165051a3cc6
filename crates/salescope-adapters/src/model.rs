use std::fmt;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::AdapterError;

/// Canonical column names, in output order. Every adapter produces exactly
/// this shape; derived calendar columns are appended later by the cleaner.
pub const CANONICAL_COLUMNS: [&str; 13] = [
    "transaction_id",
    "date",
    "product_name",
    "category",
    "region",
    "channel",
    "quantity",
    "unit_price",
    "revenue",
    "payment_method",
    "customer_id",
    "discount_pct",
    "is_returned",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CanonicalField {
    TransactionId,
    Date,
    ProductName,
    Category,
    Region,
    Channel,
    Quantity,
    UnitPrice,
    Revenue,
    PaymentMethod,
    CustomerId,
    DiscountPct,
    IsReturned,
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CanonicalField {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::TransactionId => "transaction_id",
            CanonicalField::Date => "date",
            CanonicalField::ProductName => "product_name",
            CanonicalField::Category => "category",
            CanonicalField::Region => "region",
            CanonicalField::Channel => "channel",
            CanonicalField::Quantity => "quantity",
            CanonicalField::UnitPrice => "unit_price",
            CanonicalField::Revenue => "revenue",
            CanonicalField::PaymentMethod => "payment_method",
            CanonicalField::CustomerId => "customer_id",
            CanonicalField::DiscountPct => "discount_pct",
            CanonicalField::IsReturned => "is_returned",
        }
    }
}

/// Column accumulator filled row by row while a source file is consumed.
/// Dates are stored as days since the Unix epoch and cast to a Date column
/// when the frame is built.
#[derive(Debug, Clone, Default)]
pub struct CanonicalColumns {
    pub transaction_id: Vec<String>,
    pub date: Vec<Option<i32>>,
    pub product_name: Vec<String>,
    pub category: Vec<String>,
    pub region: Vec<String>,
    pub channel: Vec<String>,
    pub quantity: Vec<i64>,
    pub unit_price: Vec<f64>,
    pub revenue: Vec<Option<f64>>,
    pub payment_method: Vec<String>,
    pub customer_id: Vec<String>,
    pub discount_pct: Vec<f64>,
    pub is_returned: Vec<bool>,
}

impl CanonicalColumns {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            transaction_id: Vec::with_capacity(capacity),
            date: Vec::with_capacity(capacity),
            product_name: Vec::with_capacity(capacity),
            category: Vec::with_capacity(capacity),
            region: Vec::with_capacity(capacity),
            channel: Vec::with_capacity(capacity),
            quantity: Vec::with_capacity(capacity),
            unit_price: Vec::with_capacity(capacity),
            revenue: Vec::with_capacity(capacity),
            payment_method: Vec::with_capacity(capacity),
            customer_id: Vec::with_capacity(capacity),
            discount_pct: Vec::with_capacity(capacity),
            is_returned: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.transaction_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transaction_id.is_empty()
    }
}

pub(crate) fn build_canonical_dataframe(
    adapter: &'static str,
    columns: CanonicalColumns,
) -> Result<DataFrame, AdapterError> {
    let row_count = columns.len();
    let lengths = [
        columns.date.len(),
        columns.product_name.len(),
        columns.category.len(),
        columns.region.len(),
        columns.channel.len(),
        columns.quantity.len(),
        columns.unit_price.len(),
        columns.revenue.len(),
        columns.payment_method.len(),
        columns.customer_id.len(),
        columns.discount_pct.len(),
        columns.is_returned.len(),
    ];
    if lengths.iter().any(|len| *len != row_count) {
        return Err(AdapterError::Validation {
            adapter,
            message: format!("canonical columns disagree on row count (expected {row_count})"),
        });
    }

    let date_series = Series::new("date".into(), columns.date)
        .cast(&DataType::Date)
        .map_err(|err| AdapterError::Validation {
            adapter,
            message: format!("failed to cast date column: {err}"),
        })?;

    let cols: Vec<Column> = vec![
        Series::new("transaction_id".into(), columns.transaction_id).into(),
        date_series.into(),
        Series::new("product_name".into(), columns.product_name).into(),
        Series::new("category".into(), columns.category).into(),
        Series::new("region".into(), columns.region).into(),
        Series::new("channel".into(), columns.channel).into(),
        Series::new("quantity".into(), columns.quantity).into(),
        Series::new("unit_price".into(), columns.unit_price).into(),
        Series::new("revenue".into(), columns.revenue).into(),
        Series::new("payment_method".into(), columns.payment_method).into(),
        Series::new("customer_id".into(), columns.customer_id).into(),
        Series::new("discount_pct".into(), columns.discount_pct).into(),
        Series::new("is_returned".into(), columns.is_returned).into(),
    ];

    DataFrame::new(cols).map_err(|err| AdapterError::Validation {
        adapter,
        message: format!("failed to build canonical dataframe: {err}"),
    })
}
