// crates/salescope-core/src/validation.rs

use std::collections::HashSet;

use polars::prelude::*;

use crate::error::Result;

/// Category vocabulary the upstream producers draw from. Validation flags
/// anything outside it as a data gap; adapters deliberately do not.
pub const KNOWN_CATEGORIES: [&str; 6] = [
    "Electronics",
    "Clothing",
    "Home & Garden",
    "Sports",
    "Books",
    "Toys",
];

/// Checks the clean-table output contract and returns human-readable
/// violations. Violations are data-quality findings, not pipeline bugs;
/// callers log them and continue.
pub fn validate_clean_table(df: &DataFrame, outlier_threshold: Option<f64>) -> Result<Vec<String>> {
    let mut violations = Vec::new();
    let len = df.height();

    let date = df.column("date")?.date()?;
    if date.null_count() > 0 {
        violations.push(format!("{} rows have a null date", date.null_count()));
    }

    let revenue = df.column("revenue")?.f64()?;
    if revenue.null_count() > 0 {
        violations.push(format!(
            "{} rows have null revenue (unimputable categories upstream)",
            revenue.null_count()
        ));
    }
    if let Some(threshold) = outlier_threshold {
        let above = (0..len)
            .filter_map(|idx| revenue.get(idx))
            .filter(|value| *value > threshold)
            .count();
        if above > 0 {
            violations.push(format!(
                "{above} rows exceed the outlier threshold {threshold}"
            ));
        }
    }

    let ids = df.column("transaction_id")?.str()?;
    let mut seen: HashSet<&str> = HashSet::with_capacity(len);
    let mut duplicates = 0usize;
    for idx in 0..len {
        if let Some(id) = ids.get(idx) {
            if !seen.insert(id) {
                duplicates += 1;
            }
        }
    }
    if duplicates > 0 {
        violations.push(format!("{duplicates} duplicate transaction ids"));
    }

    let returned = df.column("is_returned")?.bool()?;
    let returns = (0..len)
        .filter(|idx| returned.get(*idx).unwrap_or(false))
        .count();
    if returns > 0 {
        violations.push(format!("{returns} returned rows in the clean table"));
    }

    let quarter = df.column("quarter")?.i32()?;
    let bad_quarters = (0..len)
        .filter_map(|idx| quarter.get(idx))
        .filter(|q| !(1..=4).contains(q))
        .count();
    if bad_quarters > 0 {
        violations.push(format!("{bad_quarters} rows with a quarter outside 1..=4"));
    }

    let category = df.column("category")?.str()?;
    let mut unknown: HashSet<&str> = HashSet::new();
    for idx in 0..len {
        if let Some(cat) = category.get(idx) {
            if !KNOWN_CATEGORIES.contains(&cat) {
                unknown.insert(cat);
            }
        }
    }
    if !unknown.is_empty() {
        let mut names: Vec<&str> = unknown.into_iter().collect();
        names.sort_unstable();
        violations.push(format!("unknown categories: {}", names.join(", ")));
    }

    Ok(violations)
}
