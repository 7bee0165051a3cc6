use once_cell::sync::Lazy;

use crate::model::CanonicalField;

/// One entry of the source-column → canonical-field mapping table.
#[derive(Debug, Clone, Copy)]
pub struct ColumnMapping {
    pub source: &'static str,
    pub canonical: CanonicalField,
}

const fn map(source: &'static str, canonical: CanonicalField) -> ColumnMapping {
    ColumnMapping { source, canonical }
}

/// Declarative description of one raw source shape. Adding a source is a
/// data change: declare a schema here and register it below.
#[derive(Debug, Clone, Copy)]
pub struct SourceSchema {
    pub name: &'static str,
    /// Namespace prepended to transaction ids so cross-source collisions
    /// cannot occur. Skipped when the raw id already carries it.
    pub id_prefix: &'static str,
    /// chrono format string owned by this source. A cell that fails to
    /// parse yields a null date; the cleaner discards those rows.
    pub date_format: &'static str,
    /// The retail POS export emits arbitrarily cased region names; this is
    /// the only source-specific repair performed at adapter level.
    pub titlecase_region: bool,
    pub columns: &'static [ColumnMapping],
}

pub static ONLINE: SourceSchema = SourceSchema {
    name: "online",
    id_prefix: "ONL-",
    date_format: "%Y-%m-%d",
    titlecase_region: false,
    columns: &[
        map("order_id", CanonicalField::TransactionId),
        map("date", CanonicalField::Date),
        map("product", CanonicalField::ProductName),
        map("category", CanonicalField::Category),
        map("region", CanonicalField::Region),
        map("channel", CanonicalField::Channel),
        map("quantity", CanonicalField::Quantity),
        map("unit_price", CanonicalField::UnitPrice),
        map("revenue", CanonicalField::Revenue),
        map("payment_method", CanonicalField::PaymentMethod),
        map("customer_id", CanonicalField::CustomerId),
        map("discount_pct", CanonicalField::DiscountPct),
        map("return_flag", CanonicalField::IsReturned),
    ],
};

pub static RETAIL: SourceSchema = SourceSchema {
    name: "retail",
    id_prefix: "RET-",
    date_format: "%d/%m/%Y",
    titlecase_region: true,
    columns: &[
        map("transaction_id", CanonicalField::TransactionId),
        map("sale_date", CanonicalField::Date),
        map("item_name", CanonicalField::ProductName),
        map("product_cat", CanonicalField::Category),
        map("store_region", CanonicalField::Region),
        map("sales_channel", CanonicalField::Channel),
        map("qty_sold", CanonicalField::Quantity),
        map("price_each", CanonicalField::UnitPrice),
        map("total_revenue", CanonicalField::Revenue),
        map("payment", CanonicalField::PaymentMethod),
        map("cust_id", CanonicalField::CustomerId),
        map("discount", CanonicalField::DiscountPct),
        map("returned", CanonicalField::IsReturned),
    ],
};

pub static WHOLESALE: SourceSchema = SourceSchema {
    name: "wholesale",
    id_prefix: "WHL-",
    date_format: "%Y/%m/%d",
    titlecase_region: false,
    columns: &[
        map("ref_number", CanonicalField::TransactionId),
        map("invoice_date", CanonicalField::Date),
        map("product_name", CanonicalField::ProductName),
        map("category", CanonicalField::Category),
        map("territory", CanonicalField::Region),
        map("channel", CanonicalField::Channel),
        map("units", CanonicalField::Quantity),
        map("unit_cost", CanonicalField::UnitPrice),
        map("gross_revenue", CanonicalField::Revenue),
        map("payment_type", CanonicalField::PaymentMethod),
        map("account_id", CanonicalField::CustomerId),
        map("promo_rate", CanonicalField::DiscountPct),
        map("is_returned", CanonicalField::IsReturned),
    ],
};

static SOURCES: Lazy<Vec<&'static SourceSchema>> =
    Lazy::new(|| vec![&ONLINE, &RETAIL, &WHOLESALE]);

/// The registered sources in merge priority order.
pub fn builtin_sources() -> &'static [&'static SourceSchema] {
    SOURCES.as_slice()
}
