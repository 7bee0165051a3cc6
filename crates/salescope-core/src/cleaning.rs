use std::collections::{HashMap, HashSet};

use chrono::Datelike;
use polars::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::CleaningConfig;
use crate::dates;
use crate::error::{PipelineError, Result};

/// Per-step audit counts for one cleaning run.
#[derive(Debug, Clone, Serialize)]
pub struct CleaningReport {
    pub rows_in: usize,
    pub null_dates_dropped: usize,
    pub revenues_imputed: usize,
    pub unimputable_revenue_rows: usize,
    pub outlier_threshold: Option<f64>,
    pub outliers_dropped: usize,
    pub duplicates_dropped: usize,
    pub returns_excluded: usize,
    pub all_rows_len: usize,
    pub clean_rows_len: usize,
}

#[derive(Debug, Clone)]
pub struct CleaningOutcome {
    /// Returns excluded, derived calendar columns appended. Basis for every
    /// revenue KPI.
    pub clean: DataFrame,
    /// Post-dedup table with returns retained. Sole input to return-rate
    /// KPIs.
    pub all_rows: DataFrame,
    pub report: CleaningReport,
}

/// Applies the fixed, ordered repair/filter pipeline to the merged table.
///
/// The order is a contract: imputation medians are computed on the
/// date-filtered table before outliers and duplicates are removed, and the
/// outlier threshold sees imputed values. Reordering the steps changes the
/// percentile and the medians.
pub fn clean_merged(df: &DataFrame, config: &CleaningConfig) -> Result<CleaningOutcome> {
    let rows_in = df.height();
    info!(rows = rows_in, "combined table before cleaning");

    let (df, null_dates_dropped) = drop_null_dates(df)?;
    info!(
        dropped = null_dates_dropped,
        rows = df.height(),
        "dropped rows with null dates"
    );

    let (df, revenues_imputed, unimputable_revenue_rows) = impute_missing_revenue(&df)?;
    info!(
        imputed = revenues_imputed,
        unimputable = unimputable_revenue_rows,
        "filled missing revenue with category medians"
    );

    let (df, outlier_threshold, outliers_dropped) =
        drop_revenue_outliers(&df, config.outlier_percentile)?;
    info!(
        dropped = outliers_dropped,
        threshold = ?outlier_threshold,
        "removed revenue outliers"
    );

    let (all_rows, duplicates_dropped) = drop_duplicate_ids(&df)?;
    info!(dropped = duplicates_dropped, "dropped duplicate transaction ids");

    let (clean, returns_excluded) = exclude_returns(&all_rows)?;
    info!(excluded = returns_excluded, "excluded returned transactions");

    let clean = append_derived_columns(&clean)?;
    info!(
        clean_rows = clean.height(),
        removed = rows_in - clean.height(),
        "clean dataset ready"
    );

    let report = CleaningReport {
        rows_in,
        null_dates_dropped,
        revenues_imputed,
        unimputable_revenue_rows,
        outlier_threshold,
        outliers_dropped,
        duplicates_dropped,
        returns_excluded,
        all_rows_len: all_rows.height(),
        clean_rows_len: clean.height(),
    };

    Ok(CleaningOutcome {
        clean,
        all_rows,
        report,
    })
}

fn filter_rows(df: &DataFrame, keep: &[bool]) -> Result<DataFrame> {
    let mask = BooleanChunked::from_slice("keep".into(), keep);
    Ok(df.filter(&mask)?)
}

fn drop_null_dates(df: &DataFrame) -> Result<(DataFrame, usize)> {
    let date = df.column("date")?.date()?;
    let keep: Vec<bool> = (0..df.height()).map(|idx| date.get(idx).is_some()).collect();
    let filtered = filter_rows(df, &keep)?;
    let dropped = df.height() - filtered.height();
    Ok((filtered, dropped))
}

/// Fills null revenue with the median revenue of the same category, computed
/// over the table as it stands (returns and future outliers included). A
/// category with no non-null revenue anywhere cannot be imputed; those rows
/// stay null and are surfaced as a data-quality warning.
fn impute_missing_revenue(df: &DataFrame) -> Result<(DataFrame, usize, usize)> {
    let revenue = df.column("revenue")?.f64()?;
    let category = df.column("category")?.str()?;
    let len = df.height();

    let mut by_category: HashMap<&str, Vec<f64>> = HashMap::new();
    for idx in 0..len {
        if let (Some(cat), Some(value)) = (category.get(idx), revenue.get(idx)) {
            by_category.entry(cat).or_default().push(value);
        }
    }
    let medians: HashMap<&str, f64> = by_category
        .into_iter()
        .map(|(cat, values)| (cat, median(values)))
        .collect();

    let mut imputed = 0usize;
    let mut unimputable = 0usize;
    let mut filled: Vec<Option<f64>> = Vec::with_capacity(len);
    for idx in 0..len {
        match revenue.get(idx) {
            Some(value) => filled.push(Some(value)),
            None => {
                let cat = category.get(idx).unwrap_or("");
                match medians.get(cat) {
                    Some(median) => {
                        filled.push(Some(*median));
                        imputed += 1;
                    }
                    None => {
                        warn!(
                            category = cat,
                            "category has no non-null revenue; cannot impute"
                        );
                        filled.push(None);
                        unimputable += 1;
                    }
                }
            }
        }
    }

    if imputed == 0 && unimputable == 0 {
        return Ok((df.clone(), 0, 0));
    }

    let mut out = df.clone();
    out.with_column(Series::new("revenue".into(), filled))?;
    Ok((out, imputed, unimputable))
}

fn median(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) / 2.0
    }
}

/// Drops rows whose revenue is strictly greater than the configured
/// percentile of the current revenue distribution. The threshold is
/// recomputed from the data on every run. Null revenue survives the
/// comparison (an unimputable row is not an outlier).
fn drop_revenue_outliers(
    df: &DataFrame,
    percentile: f64,
) -> Result<(DataFrame, Option<f64>, usize)> {
    let revenue = df.column("revenue")?.f64()?;

    let mut values: Vec<f64> = (0..df.height()).filter_map(|idx| revenue.get(idx)).collect();
    if values.is_empty() {
        return Ok((df.clone(), None, 0));
    }
    values.sort_by(f64::total_cmp);
    let threshold = interpolated_quantile(&values, percentile);

    let keep: Vec<bool> = (0..df.height())
        .map(|idx| match revenue.get(idx) {
            Some(value) => value <= threshold,
            None => true,
        })
        .collect();
    let filtered = filter_rows(df, &keep)?;
    let dropped = df.height() - filtered.height();
    Ok((filtered, Some(threshold), dropped))
}

/// Linear-interpolated quantile over an ascending-sorted, non-empty slice.
fn interpolated_quantile(sorted: &[f64], quantile: f64) -> f64 {
    let rank = quantile.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

/// Keeps the first occurrence of each transaction id, stable with respect to
/// merge order.
fn drop_duplicate_ids(df: &DataFrame) -> Result<(DataFrame, usize)> {
    let ids = df.column("transaction_id")?.str()?;
    let mut seen: HashSet<&str> = HashSet::with_capacity(df.height());
    let keep: Vec<bool> = (0..df.height())
        .map(|idx| match ids.get(idx) {
            Some(id) => seen.insert(id),
            None => true,
        })
        .collect();
    let filtered = filter_rows(df, &keep)?;
    let dropped = df.height() - filtered.height();
    Ok((filtered, dropped))
}

fn exclude_returns(df: &DataFrame) -> Result<(DataFrame, usize)> {
    let returned = df.column("is_returned")?.bool()?;
    let keep: Vec<bool> = (0..df.height())
        .map(|idx| !returned.get(idx).unwrap_or(false))
        .collect();
    let filtered = filter_rows(df, &keep)?;
    let excluded = df.height() - filtered.height();
    Ok((filtered, excluded))
}

fn append_derived_columns(df: &DataFrame) -> Result<DataFrame> {
    let date = df.column("date")?.date()?;
    let len = df.height();

    let mut year: Vec<i32> = Vec::with_capacity(len);
    let mut month: Vec<i32> = Vec::with_capacity(len);
    let mut quarter: Vec<i32> = Vec::with_capacity(len);
    let mut month_name: Vec<String> = Vec::with_capacity(len);
    let mut week: Vec<i32> = Vec::with_capacity(len);

    for idx in 0..len {
        let days = date.get(idx).ok_or_else(|| {
            PipelineError::Processing("null date survived the date filter".to_string())
        })?;
        let day = dates::days_to_date(days);
        year.push(day.year());
        month.push(day.month() as i32);
        quarter.push((day.month() as i32 + 2) / 3);
        month_name.push(day.format("%b").to_string());
        week.push(day.iso_week().week() as i32);
    }

    let mut out = df.clone();
    let mut columns = [
        Series::new("year".into(), year).into(),
        Series::new("month".into(), month).into(),
        Series::new("quarter".into(), quarter).into(),
        Series::new("month_name".into(), month_name).into(),
        Series::new("week".into(), week).into(),
    ];
    out.hstack_mut(columns.as_mut_slice())?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(year: i32, month: u32, day: u32) -> i32 {
        crate::dates::date_to_days(NaiveDate::from_ymd_opt(year, month, day).unwrap())
    }

    #[test]
    fn median_averages_the_middle_pair() {
        assert_eq!(median(vec![100.0, 200.0]), 150.0);
        assert_eq!(median(vec![3.0, 1.0, 2.0]), 2.0);
    }

    #[test]
    fn quantile_interpolates_between_ranks() {
        let values: Vec<f64> = (1..=4).map(f64::from).collect();
        assert_eq!(interpolated_quantile(&values, 0.5), 2.5);
        assert_eq!(interpolated_quantile(&values, 1.0), 4.0);
        assert_eq!(interpolated_quantile(&values, 0.0), 1.0);
    }

    #[test]
    fn imputes_with_the_category_median() {
        let df = DataFrame::new(vec![
            Series::new(
                "category".into(),
                vec!["Electronics", "Electronics", "Electronics", "Books"],
            )
            .into(),
            Series::new(
                "revenue".into(),
                vec![Some(100.0), Some(200.0), None, Some(50.0)],
            )
            .into(),
        ])
        .unwrap();

        let (out, imputed, unimputable) = impute_missing_revenue(&df).unwrap();
        assert_eq!(imputed, 1);
        assert_eq!(unimputable, 0);
        let revenue = out.column("revenue").unwrap().f64().unwrap();
        assert_eq!(revenue.get(2), Some(150.0));
        assert_eq!(revenue.null_count(), 0);
    }

    #[test]
    fn category_without_revenue_stays_null() {
        let df = DataFrame::new(vec![
            Series::new("category".into(), vec!["Gadgets", "Books"]).into(),
            Series::new("revenue".into(), vec![None, Some(50.0)]).into(),
        ])
        .unwrap();

        let (out, imputed, unimputable) = impute_missing_revenue(&df).unwrap();
        assert_eq!(imputed, 0);
        assert_eq!(unimputable, 1);
        assert_eq!(out.column("revenue").unwrap().f64().unwrap().null_count(), 1);
    }

    #[test]
    fn extreme_outlier_is_removed_at_the_percentile() {
        let mut values: Vec<Option<f64>> = (1..=1000).map(|v| Some(f64::from(v))).collect();
        values.push(Some(9_999_999.0));
        let df =
            DataFrame::new(vec![Series::new("revenue".into(), values).into()]).unwrap();

        let (out, threshold, dropped) = drop_revenue_outliers(&df, 0.999).unwrap();
        assert_eq!(threshold, Some(1000.0));
        assert_eq!(dropped, 1);
        let revenue = out.column("revenue").unwrap().f64().unwrap();
        let survivors: Vec<f64> = (0..out.height()).filter_map(|idx| revenue.get(idx)).collect();
        assert!(!survivors.contains(&9_999_999.0));
        assert_eq!(out.height(), 1000);
    }

    #[test]
    fn duplicate_ids_keep_the_first_occurrence() {
        let df = DataFrame::new(vec![
            Series::new("transaction_id".into(), vec!["A", "A", "B"]).into(),
            Series::new("revenue".into(), vec![Some(100.0), Some(999.0), Some(200.0)]).into(),
        ])
        .unwrap();

        let (out, dropped) = drop_duplicate_ids(&df).unwrap();
        assert_eq!(dropped, 1);
        assert_eq!(out.height(), 2);
        let revenue = out.column("revenue").unwrap().f64().unwrap();
        assert_eq!(revenue.get(0), Some(100.0));
    }

    #[test]
    fn null_dates_are_dropped() {
        let df = DataFrame::new(vec![Series::new(
            "date".into(),
            vec![Some(day(2023, 1, 5)), None, Some(day(2023, 6, 1))],
        )
        .cast(&DataType::Date)
        .unwrap()
        .into()])
        .unwrap();

        let (out, dropped) = drop_null_dates(&df).unwrap();
        assert_eq!(dropped, 1);
        assert_eq!(out.height(), 2);
    }

    #[test]
    fn derived_columns_follow_the_calendar() {
        let df = DataFrame::new(vec![Series::new(
            "date".into(),
            vec![Some(day(2023, 11, 24)), Some(day(2023, 1, 1))],
        )
        .cast(&DataType::Date)
        .unwrap()
        .into()])
        .unwrap();

        let out = append_derived_columns(&df).unwrap();
        assert_eq!(out.column("year").unwrap().i32().unwrap().get(0), Some(2023));
        assert_eq!(out.column("month").unwrap().i32().unwrap().get(0), Some(11));
        assert_eq!(out.column("quarter").unwrap().i32().unwrap().get(0), Some(4));
        assert_eq!(
            out.column("month_name").unwrap().str().unwrap().get(0),
            Some("Nov")
        );
        assert_eq!(out.column("week").unwrap().i32().unwrap().get(0), Some(47));

        // 2023-01-01 belongs to ISO week 52 of the previous year
        assert_eq!(out.column("quarter").unwrap().i32().unwrap().get(1), Some(1));
        assert_eq!(out.column("week").unwrap().i32().unwrap().get(1), Some(52));
    }
}
