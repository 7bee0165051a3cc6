use std::cmp::Ordering;
use std::collections::HashMap;

use polars::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::config::AnalysisConfig;
use crate::error::{PipelineError, Result};
use crate::stats;

/// Degeneracies that abort one KPI computation without invalidating the
/// rest of the result document.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("{metric}: division by zero ({detail})")]
    ZeroDenominator {
        metric: &'static str,
        detail: String,
    },

    #[error("{metric}: degenerate sample: {reason}")]
    DegenerateSample {
        metric: &'static str,
        reason: String,
    },

    #[error("{metric}: empty table")]
    EmptyTable { metric: &'static str },
}

#[derive(Debug, Clone, Serialize)]
pub struct RevenueSummary {
    pub total_revenue: f64,
    pub total_orders: usize,
    pub avg_order_value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuarterRevenue {
    pub quarter: i32,
    pub revenue: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthRevenue {
    pub month: i32,
    pub revenue: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuarterlyAnalysis {
    pub quarterly_revenue: Vec<QuarterRevenue>,
    pub q3_revenue: f64,
    pub q4_revenue: f64,
    pub q4_vs_q3_growth_pct: f64,
    pub q4_monthly_revenue: Vec<MonthRevenue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryMetrics {
    pub category: String,
    pub total_revenue: f64,
    pub total_orders: usize,
    pub avg_order_value: f64,
    pub avg_quantity: f64,
    pub revenue_share_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryAnalysis {
    pub all_categories: Vec<CategoryMetrics>,
    pub top3_categories: Vec<CategoryMetrics>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionMetrics {
    pub region: String,
    pub total_revenue: f64,
    pub total_orders: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionAnalysis {
    pub region_revenue: Vec<RegionMetrics>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelMetrics {
    pub channel: String,
    pub total_revenue: f64,
    pub total_orders: usize,
    pub share_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelAnalysis {
    pub channel_revenue: Vec<ChannelMetrics>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyTrendPoint {
    pub month: i32,
    pub month_name: String,
    pub revenue: f64,
    pub orders: usize,
    /// `null` for the first chronological month; there is no prior month.
    pub mom_growth_pct: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyTrend {
    pub monthly_trend: Vec<MonthlyTrendPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryReturnRate {
    pub category: String,
    pub returns: usize,
    pub total: usize,
    pub return_rate_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReturnRateAnalysis {
    pub overall_return_rate_pct: f64,
    pub by_category: Vec<CategoryReturnRate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatTestAnalysis {
    pub t_statistic: f64,
    pub p_value: f64,
    pub cohens_d: f64,
    pub significant: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedKpi {
    pub kpi: &'static str,
    pub reason: String,
}

/// The KPI result document. Field names match what the dashboard consumes;
/// a degenerate KPI serializes as `null` and is listed in `skipped_kpis`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisResults {
    #[serde(flatten)]
    pub summary: Option<RevenueSummary>,
    pub quarterly: Option<QuarterlyAnalysis>,
    pub categories: Option<CategoryAnalysis>,
    pub regions: Option<RegionAnalysis>,
    pub channels: Option<ChannelAnalysis>,
    pub monthly: Option<MonthlyTrend>,
    pub returns: Option<ReturnRateAnalysis>,
    pub stats_tests: Option<StatTestAnalysis>,
    pub skipped_kpis: Vec<SkippedKpi>,
}

/// Computes every KPI over the cleaned tables. Under the default partial
/// policy a degenerate KPI is logged, skipped and recorded; under
/// `strict_kpis` it aborts the run.
pub fn analyze(
    clean: &DataFrame,
    all_rows: &DataFrame,
    config: &AnalysisConfig,
) -> Result<AnalysisResults> {
    let mut results = AnalysisResults::default();
    let strict = config.strict_kpis;

    absorb(
        "revenue_summary",
        revenue_summary(clean),
        &mut results.summary,
        strict,
        &mut results.skipped_kpis,
    )?;
    absorb(
        "quarterly",
        quarterly_analysis(clean),
        &mut results.quarterly,
        strict,
        &mut results.skipped_kpis,
    )?;
    absorb(
        "categories",
        category_analysis(clean),
        &mut results.categories,
        strict,
        &mut results.skipped_kpis,
    )?;
    absorb(
        "regions",
        region_analysis(clean),
        &mut results.regions,
        strict,
        &mut results.skipped_kpis,
    )?;
    absorb(
        "channels",
        channel_analysis(clean),
        &mut results.channels,
        strict,
        &mut results.skipped_kpis,
    )?;
    absorb(
        "monthly",
        monthly_trend(clean),
        &mut results.monthly,
        strict,
        &mut results.skipped_kpis,
    )?;
    absorb(
        "returns",
        return_rate(all_rows),
        &mut results.returns,
        strict,
        &mut results.skipped_kpis,
    )?;
    absorb(
        "stats_tests",
        statistical_tests(clean, config.significance_alpha),
        &mut results.stats_tests,
        strict,
        &mut results.skipped_kpis,
    )?;

    Ok(results)
}

fn absorb<T>(
    kpi: &'static str,
    outcome: Result<T>,
    slot: &mut Option<T>,
    strict: bool,
    skipped: &mut Vec<SkippedKpi>,
) -> Result<()> {
    match outcome {
        Ok(value) => {
            *slot = Some(value);
            Ok(())
        }
        Err(PipelineError::Analysis(err)) if !strict => {
            warn!(kpi, reason = %err, "skipping degenerate KPI");
            skipped.push(SkippedKpi {
                kpi,
                reason: err.to_string(),
            });
            Ok(())
        }
        Err(err) => Err(err),
    }
}

pub fn revenue_summary(df: &DataFrame) -> Result<RevenueSummary> {
    let values = revenue_values(df)?;
    if values.is_empty() {
        return Err(AnalysisError::EmptyTable {
            metric: "revenue_summary",
        }
        .into());
    }
    let total: f64 = values.iter().sum();
    Ok(RevenueSummary {
        total_revenue: round2(total),
        total_orders: df.height(),
        avg_order_value: round2(total / values.len() as f64),
    })
}

pub fn quarterly_analysis(df: &DataFrame) -> Result<QuarterlyAnalysis> {
    let revenue = df.column("revenue")?.f64()?;
    let quarter = df.column("quarter")?.i32()?;
    let month = df.column("month")?.i32()?;

    let mut by_quarter: HashMap<i32, f64> = HashMap::new();
    let mut q4_by_month: HashMap<i32, f64> = HashMap::new();
    for idx in 0..df.height() {
        let (Some(q), Some(value)) = (quarter.get(idx), revenue.get(idx)) else {
            continue;
        };
        *by_quarter.entry(q).or_insert(0.0) += value;
        if q == 4 {
            if let Some(m) = month.get(idx) {
                *q4_by_month.entry(m).or_insert(0.0) += value;
            }
        }
    }

    let mut quarterly_revenue: Vec<QuarterRevenue> = by_quarter
        .iter()
        .map(|(q, rev)| QuarterRevenue {
            quarter: *q,
            revenue: round2(*rev),
        })
        .collect();
    quarterly_revenue.sort_by_key(|entry| entry.quarter);

    let q3 = by_quarter.get(&3).copied().unwrap_or(0.0);
    let q4 = by_quarter.get(&4).copied().unwrap_or(0.0);
    if q3 == 0.0 {
        return Err(AnalysisError::ZeroDenominator {
            metric: "quarterly",
            detail: "Q3 revenue is zero".to_string(),
        }
        .into());
    }

    let mut q4_monthly_revenue: Vec<MonthRevenue> = q4_by_month
        .iter()
        .map(|(m, rev)| MonthRevenue {
            month: *m,
            revenue: round2(*rev),
        })
        .collect();
    q4_monthly_revenue.sort_by_key(|entry| entry.month);

    Ok(QuarterlyAnalysis {
        quarterly_revenue,
        q3_revenue: round2(q3),
        q4_revenue: round2(q4),
        q4_vs_q3_growth_pct: round1((q4 - q3) / q3 * 100.0),
        q4_monthly_revenue,
    })
}

pub fn category_analysis(df: &DataFrame) -> Result<CategoryAnalysis> {
    let revenue = df.column("revenue")?.f64()?;
    let category = df.column("category")?.str()?;
    let quantity = df.column("quantity")?.i64()?;

    struct Acc {
        revenue_sum: f64,
        revenue_count: usize,
        orders: usize,
        quantity_sum: i64,
    }

    let mut by_category: HashMap<&str, Acc> = HashMap::new();
    for idx in 0..df.height() {
        let Some(cat) = category.get(idx) else {
            continue;
        };
        let acc = by_category.entry(cat).or_insert(Acc {
            revenue_sum: 0.0,
            revenue_count: 0,
            orders: 0,
            quantity_sum: 0,
        });
        acc.orders += 1;
        acc.quantity_sum += quantity.get(idx).unwrap_or(0);
        if let Some(value) = revenue.get(idx) {
            acc.revenue_sum += value;
            acc.revenue_count += 1;
        }
    }

    if by_category.is_empty() {
        return Err(AnalysisError::EmptyTable {
            metric: "categories",
        }
        .into());
    }

    let grand_total: f64 = by_category.values().map(|acc| acc.revenue_sum).sum();
    if grand_total == 0.0 {
        return Err(AnalysisError::ZeroDenominator {
            metric: "categories",
            detail: "grand total revenue is zero".to_string(),
        }
        .into());
    }

    let mut rows: Vec<(String, Acc)> = by_category
        .into_iter()
        .map(|(cat, acc)| (cat.to_string(), acc))
        .collect();
    rows.sort_by(|a, b| {
        b.1.revenue_sum
            .partial_cmp(&a.1.revenue_sum)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    let all_categories: Vec<CategoryMetrics> = rows
        .into_iter()
        .map(|(cat, acc)| {
            let avg_order_value = if acc.revenue_count > 0 {
                acc.revenue_sum / acc.revenue_count as f64
            } else {
                0.0
            };
            CategoryMetrics {
                category: cat,
                total_revenue: round2(acc.revenue_sum),
                total_orders: acc.orders,
                avg_order_value: round2(avg_order_value),
                avg_quantity: round2(acc.quantity_sum as f64 / acc.orders as f64),
                revenue_share_pct: round1(acc.revenue_sum / grand_total * 100.0),
            }
        })
        .collect();

    let top3_categories = all_categories.iter().take(3).cloned().collect();

    Ok(CategoryAnalysis {
        all_categories,
        top3_categories,
    })
}

pub fn region_analysis(df: &DataFrame) -> Result<RegionAnalysis> {
    let grouped = sum_orders_by_key(df, "region")?;
    let region_revenue = grouped
        .into_iter()
        .map(|(region, revenue_sum, orders)| RegionMetrics {
            region,
            total_revenue: round2(revenue_sum),
            total_orders: orders,
        })
        .collect();
    Ok(RegionAnalysis { region_revenue })
}

pub fn channel_analysis(df: &DataFrame) -> Result<ChannelAnalysis> {
    let grouped = sum_orders_by_key(df, "channel")?;
    let grand_total: f64 = grouped.iter().map(|(_, revenue, _)| revenue).sum();
    if grand_total == 0.0 {
        return Err(AnalysisError::ZeroDenominator {
            metric: "channels",
            detail: "grand total revenue is zero".to_string(),
        }
        .into());
    }
    let channel_revenue = grouped
        .into_iter()
        .map(|(channel, revenue_sum, orders)| ChannelMetrics {
            channel,
            total_revenue: round2(revenue_sum),
            total_orders: orders,
            share_pct: round1(revenue_sum / grand_total * 100.0),
        })
        .collect();
    Ok(ChannelAnalysis { channel_revenue })
}

/// Groups revenue and order counts by a string key column, sorted descending
/// by revenue (key ascending on ties, for deterministic output).
fn sum_orders_by_key(df: &DataFrame, key: &str) -> Result<Vec<(String, f64, usize)>> {
    let revenue = df.column("revenue")?.f64()?;
    let keys = df.column(key)?.str()?;

    let mut grouped: HashMap<&str, (f64, usize)> = HashMap::new();
    for idx in 0..df.height() {
        let Some(group) = keys.get(idx) else {
            continue;
        };
        let entry = grouped.entry(group).or_insert((0.0, 0));
        if let Some(value) = revenue.get(idx) {
            entry.0 += value;
        }
        entry.1 += 1;
    }

    let mut rows: Vec<(String, f64, usize)> = grouped
        .into_iter()
        .map(|(group, (revenue_sum, orders))| (group.to_string(), revenue_sum, orders))
        .collect();
    rows.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    Ok(rows)
}

pub fn monthly_trend(df: &DataFrame) -> Result<MonthlyTrend> {
    let revenue = df.column("revenue")?.f64()?;
    let month = df.column("month")?.i32()?;
    let month_name = df.column("month_name")?.str()?;

    let mut by_month: HashMap<i32, (String, f64, usize)> = HashMap::new();
    for idx in 0..df.height() {
        let Some(m) = month.get(idx) else {
            continue;
        };
        let entry = by_month.entry(m).or_insert((String::new(), 0.0, 0));
        if entry.0.is_empty() {
            entry.0 = month_name.get(idx).unwrap_or("").to_string();
        }
        if let Some(value) = revenue.get(idx) {
            entry.1 += value;
        }
        entry.2 += 1;
    }

    let mut months: Vec<i32> = by_month.keys().copied().collect();
    months.sort_unstable();

    let mut monthly_trend = Vec::with_capacity(months.len());
    let mut previous_revenue: Option<f64> = None;
    for m in months {
        let (name, revenue_sum, orders) = by_month.remove(&m).unwrap_or_default();
        let mom_growth_pct = match previous_revenue {
            None => None,
            Some(prev) if prev == 0.0 => {
                return Err(AnalysisError::ZeroDenominator {
                    metric: "monthly",
                    detail: format!("month {m} follows a zero-revenue month"),
                }
                .into());
            }
            Some(prev) => Some(round2((revenue_sum - prev) / prev * 100.0)),
        };
        previous_revenue = Some(revenue_sum);
        monthly_trend.push(MonthlyTrendPoint {
            month: m,
            month_name: name,
            revenue: round2(revenue_sum),
            orders,
            mom_growth_pct,
        });
    }

    Ok(MonthlyTrend { monthly_trend })
}

/// Return rates come from the all-rows table; the clean table has no
/// returned rows left to count.
pub fn return_rate(df: &DataFrame) -> Result<ReturnRateAnalysis> {
    let returned = df.column("is_returned")?.bool()?;
    let category = df.column("category")?.str()?;
    let total = df.height();
    if total == 0 {
        return Err(AnalysisError::EmptyTable { metric: "returns" }.into());
    }

    let mut returned_count = 0usize;
    let mut by_cat: HashMap<&str, (usize, usize)> = HashMap::new();
    for idx in 0..total {
        let is_returned = returned.get(idx).unwrap_or(false);
        if is_returned {
            returned_count += 1;
        }
        if let Some(cat) = category.get(idx) {
            let entry = by_cat.entry(cat).or_insert((0, 0));
            entry.1 += 1;
            if is_returned {
                entry.0 += 1;
            }
        }
    }

    let mut by_category: Vec<CategoryReturnRate> = by_cat
        .into_iter()
        .map(|(cat, (returns, cat_total))| CategoryReturnRate {
            category: cat.to_string(),
            returns,
            total: cat_total,
            return_rate_pct: round2(returns as f64 / cat_total as f64 * 100.0),
        })
        .collect();
    by_category.sort_by(|a, b| a.category.cmp(&b.category));

    Ok(ReturnRateAnalysis {
        overall_return_rate_pct: round2(returned_count as f64 / total as f64 * 100.0),
        by_category,
    })
}

/// Two-sample test of the Q4 uplift: Q4 revenue values against the other
/// three quarters pooled.
pub fn statistical_tests(df: &DataFrame, alpha: f64) -> Result<StatTestAnalysis> {
    let revenue = df.column("revenue")?.f64()?;
    let quarter = df.column("quarter")?.i32()?;

    let mut q4 = Vec::new();
    let mut rest = Vec::new();
    for idx in 0..df.height() {
        let (Some(q), Some(value)) = (quarter.get(idx), revenue.get(idx)) else {
            continue;
        };
        if q == 4 {
            q4.push(value);
        } else {
            rest.push(value);
        }
    }

    let outcome =
        stats::pooled_t_test("stats_tests", &q4, &rest).map_err(PipelineError::Analysis)?;

    Ok(StatTestAnalysis {
        t_statistic: round4(outcome.t_statistic),
        p_value: round6(outcome.p_value),
        cohens_d: round4(outcome.cohens_d),
        significant: outcome.p_value < alpha,
    })
}

fn revenue_values(df: &DataFrame) -> Result<Vec<f64>> {
    let revenue = df.column("revenue")?.f64()?;
    Ok((0..df.height()).filter_map(|idx| revenue.get(idx)).collect())
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn round1(value: f64) -> f64 {
    round_to(value, 1)
}

fn round2(value: f64) -> f64 {
    round_to(value, 2)
}

fn round4(value: f64) -> f64 {
    round_to(value, 4)
}

fn round6(value: f64) -> f64 {
    round_to(value, 6)
}

#[cfg(test)]
mod tests {
    use super::round_to;

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round_to(23.049, 1), 23.0);
        assert_eq!(round_to(1234.5678, 2), 1234.57);
        assert_eq!(round_to(-0.125, 2), -0.13);
    }
}
