use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use polars::prelude::DataFrame;

use crate::errors::AdapterError;
use crate::model::{build_canonical_dataframe, CanonicalColumns, CanonicalField};
use crate::schema::SourceSchema;

/// Adapts one raw source file into the canonical table shape.
///
/// The adapter is a pure renaming + parsing step: it never filters,
/// imputes, or deduplicates. Missing mapped columns are fatal; a single
/// unparseable date cell is not (it becomes a null date for the cleaner).
pub fn adapt_source_path(schema: &SourceSchema, path: &Path) -> Result<DataFrame, AdapterError> {
    let file = File::open(path).map_err(|err| AdapterError::SchemaMismatch {
        adapter: schema.name,
        reason: format!("cannot open {}: {err}", path.display()),
    })?;
    adapt_source(schema, file)
}

pub fn adapt_source<R: Read>(schema: &SourceSchema, reader: R) -> Result<DataFrame, AdapterError> {
    let adapter = schema.name;
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|err| AdapterError::Csv {
            adapter,
            source: err,
        })?
        .clone();

    let mut indices = Vec::with_capacity(schema.columns.len());
    for mapping in schema.columns {
        let position = headers
            .iter()
            .position(|header| header == mapping.source)
            .ok_or_else(|| AdapterError::SchemaMismatch {
                adapter,
                reason: format!("missing required column '{}'", mapping.source),
            })?;
        indices.push((position, mapping));
    }

    let mut columns = CanonicalColumns::with_capacity(128);

    for (row_idx, record) in csv_reader.records().enumerate() {
        let record = record.map_err(|err| AdapterError::Csv {
            adapter,
            source: err,
        })?;
        // data rows start on line 2, after the header
        let line_index = row_idx + 2;

        for (position, mapping) in &indices {
            let value = record.get(*position).unwrap_or("");
            match mapping.canonical {
                CanonicalField::TransactionId => {
                    if value.is_empty() {
                        return Err(AdapterError::DataRow {
                            adapter,
                            line_index,
                            message: "transaction id is empty".to_string(),
                        });
                    }
                    columns
                        .transaction_id
                        .push(namespace_id(schema.id_prefix, value));
                }
                CanonicalField::Date => {
                    columns.date.push(parse_date(schema.date_format, value));
                }
                CanonicalField::ProductName => columns.product_name.push(value.to_string()),
                CanonicalField::Category => columns.category.push(value.to_string()),
                CanonicalField::Region => {
                    let region = if schema.titlecase_region {
                        titlecase(value)
                    } else {
                        value.to_string()
                    };
                    columns.region.push(region);
                }
                CanonicalField::Channel => columns.channel.push(value.to_string()),
                CanonicalField::Quantity => {
                    columns.quantity.push(parse_required_i64(
                        adapter,
                        value,
                        line_index,
                        mapping.source,
                    )?);
                }
                CanonicalField::UnitPrice => {
                    columns.unit_price.push(parse_required_f64(
                        adapter,
                        value,
                        line_index,
                        mapping.source,
                    )?);
                }
                CanonicalField::Revenue => {
                    columns.revenue.push(parse_optional_f64(
                        adapter,
                        value,
                        line_index,
                        mapping.source,
                    )?);
                }
                CanonicalField::PaymentMethod => columns.payment_method.push(value.to_string()),
                CanonicalField::CustomerId => columns.customer_id.push(value.to_string()),
                CanonicalField::DiscountPct => {
                    columns.discount_pct.push(parse_required_f64(
                        adapter,
                        value,
                        line_index,
                        mapping.source,
                    )?);
                }
                CanonicalField::IsReturned => {
                    columns
                        .is_returned
                        .push(parse_return_flag(adapter, value, line_index)?);
                }
            }
        }
    }

    if columns.is_empty() {
        return Err(AdapterError::EmptyData { adapter });
    }

    build_canonical_dataframe(adapter, columns)
}

fn namespace_id(prefix: &str, raw: &str) -> String {
    if raw.starts_with(prefix) {
        raw.to_string()
    } else {
        format!("{prefix}{raw}")
    }
}

fn parse_date(format: &str, value: &str) -> Option<i32> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed = NaiveDate::parse_from_str(trimmed, format).ok()?;
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    Some((parsed - epoch).num_days() as i32)
}

fn titlecase(value: &str) -> String {
    let mut words = Vec::new();
    for token in value.split_whitespace() {
        let mut chars = token.chars();
        let mut word = String::with_capacity(token.len());
        if let Some(first) = chars.next() {
            for upper in first.to_uppercase() {
                word.push(upper);
            }
            word.push_str(&chars.as_str().to_lowercase());
        }
        words.push(word);
    }
    words.join(" ")
}

fn parse_required_i64(
    adapter: &'static str,
    value: &str,
    line_index: usize,
    column: &str,
) -> Result<i64, AdapterError> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|err| AdapterError::DataRow {
            adapter,
            line_index,
            message: format!("failed to parse column '{column}' as integer: {err}"),
        })
}

fn parse_required_f64(
    adapter: &'static str,
    value: &str,
    line_index: usize,
    column: &str,
) -> Result<f64, AdapterError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|err| AdapterError::DataRow {
            adapter,
            line_index,
            message: format!("failed to parse column '{column}' as float: {err}"),
        })
}

fn parse_optional_f64(
    adapter: &'static str,
    value: &str,
    line_index: usize,
    column: &str,
) -> Result<Option<f64>, AdapterError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .map(Some)
        .map_err(|err| AdapterError::DataRow {
            adapter,
            line_index,
            message: format!("failed to parse column '{column}' as float: {err}"),
        })
}

fn parse_return_flag(
    adapter: &'static str,
    value: &str,
    line_index: usize,
) -> Result<bool, AdapterError> {
    match value.trim() {
        "0" => Ok(false),
        "1" => Ok(true),
        other if other.eq_ignore_ascii_case("false") => Ok(false),
        other if other.eq_ignore_ascii_case("true") => Ok(true),
        other => Err(AdapterError::DataRow {
            adapter,
            line_index,
            message: format!("unrecognized return flag '{other}'"),
        }),
    }
}
