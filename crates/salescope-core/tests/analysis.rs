use polars::prelude::*;

use salescope_core::analysis::{self, analyze};
use salescope_core::config::AnalysisConfig;
use salescope_core::error::PipelineError;

struct CleanRow {
    quarter: i32,
    month: i32,
    month_name: &'static str,
    category: &'static str,
    region: &'static str,
    channel: &'static str,
    quantity: i64,
    revenue: f64,
    returned: bool,
}

fn row(
    quarter: i32,
    month: i32,
    month_name: &'static str,
    category: &'static str,
    revenue: f64,
) -> CleanRow {
    CleanRow {
        quarter,
        month,
        month_name,
        category,
        region: "North",
        channel: "Online",
        quantity: 2,
        revenue,
        returned: false,
    }
}

fn clean_frame(rows: &[CleanRow]) -> DataFrame {
    DataFrame::new(vec![
        Series::new(
            "revenue".into(),
            rows.iter().map(|r| Some(r.revenue)).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "quantity".into(),
            rows.iter().map(|r| r.quantity).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "category".into(),
            rows.iter().map(|r| r.category).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "region".into(),
            rows.iter().map(|r| r.region).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "channel".into(),
            rows.iter().map(|r| r.channel).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "month".into(),
            rows.iter().map(|r| r.month).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "month_name".into(),
            rows.iter().map(|r| r.month_name).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "quarter".into(),
            rows.iter().map(|r| r.quarter).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "is_returned".into(),
            rows.iter().map(|r| r.returned).collect::<Vec<_>>(),
        )
        .into(),
    ])
    .unwrap()
}

/// A year of data with enough spread for every KPI to be well defined.
fn full_year() -> Vec<CleanRow> {
    let months = [
        (1, 1, "Jan"),
        (1, 2, "Feb"),
        (1, 3, "Mar"),
        (2, 4, "Apr"),
        (2, 5, "May"),
        (2, 6, "Jun"),
        (3, 7, "Jul"),
        (3, 8, "Aug"),
        (3, 9, "Sep"),
        (4, 10, "Oct"),
        (4, 11, "Nov"),
        (4, 12, "Dec"),
    ];
    let categories = ["Electronics", "Clothing", "Books", "Sports"];
    let mut rows = Vec::new();
    for (idx, (quarter, month, name)) in months.iter().copied().enumerate() {
        for (offset, category) in categories.iter().copied().enumerate() {
            let mut entry = row(
                quarter,
                month,
                name,
                category,
                100.0 + (idx * 17 + offset * 43) as f64,
            );
            entry.region = ["North", "South", "East", "West"][offset];
            entry.channel = ["Online", "Retail Store", "Wholesale"][offset % 3];
            rows.push(entry);
        }
    }
    rows
}

#[test]
fn q4_growth_matches_the_hand_computed_ratio() {
    let rows = vec![
        row(3, 7, "Jul", "Electronics", 600_000.0),
        row(3, 8, "Aug", "Electronics", 400_000.0),
        row(4, 10, "Oct", "Electronics", 800_000.0),
        row(4, 11, "Nov", "Electronics", 430_000.0),
    ];
    let df = clean_frame(&rows);

    let quarterly = analysis::quarterly_analysis(&df).expect("quarterly failed");
    assert!((quarterly.q4_vs_q3_growth_pct - 23.0).abs() < 0.01);
    assert_eq!(quarterly.q3_revenue, 1_000_000.0);
    assert_eq!(quarterly.q4_revenue, 1_230_000.0);
    assert_eq!(quarterly.q4_monthly_revenue.len(), 2);
    assert_eq!(quarterly.q4_monthly_revenue[0].month, 10);
}

#[test]
fn category_shares_sum_to_one_hundred() {
    let df = clean_frame(&full_year());
    let categories = analysis::category_analysis(&df).expect("categories failed");

    let share_sum: f64 = categories
        .all_categories
        .iter()
        .map(|entry| entry.revenue_share_pct)
        .sum();
    assert!((share_sum - 100.0).abs() < 0.5);

    assert_eq!(categories.top3_categories.len(), 3);
    let revenues: Vec<f64> = categories
        .all_categories
        .iter()
        .map(|entry| entry.total_revenue)
        .collect();
    let mut sorted = revenues.clone();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
    assert_eq!(revenues, sorted);
}

#[test]
fn channel_revenue_covers_the_grand_total() {
    let df = clean_frame(&full_year());
    let channels = analysis::channel_analysis(&df).expect("channels failed");
    let summary = analysis::revenue_summary(&df).expect("summary failed");

    let channel_sum: f64 = channels
        .channel_revenue
        .iter()
        .map(|entry| entry.total_revenue)
        .sum();
    assert!((channel_sum - summary.total_revenue).abs() < 0.05);
}

#[test]
fn monthly_trend_is_chronological_with_undefined_first_growth() {
    let df = clean_frame(&full_year());
    let trend = analysis::monthly_trend(&df).expect("monthly failed");

    assert!(trend.monthly_trend.len() <= 12);
    assert_eq!(trend.monthly_trend.len(), 12);
    assert!(trend.monthly_trend[0].mom_growth_pct.is_none());
    for point in trend.monthly_trend.iter().skip(1) {
        assert!(point.mom_growth_pct.is_some());
    }
    let months: Vec<i32> = trend.monthly_trend.iter().map(|p| p.month).collect();
    let mut sorted = months.clone();
    sorted.sort_unstable();
    assert_eq!(months, sorted);
    assert_eq!(trend.monthly_trend[0].month_name, "Jan");
}

#[test]
fn return_rate_comes_from_the_all_rows_table() {
    let mut rows = vec![
        row(1, 2, "Feb", "Electronics", 100.0),
        row(1, 2, "Feb", "Electronics", 150.0),
        row(2, 5, "May", "Books", 50.0),
        row(3, 8, "Aug", "Books", 75.0),
    ];
    rows[1].returned = true;
    let all_rows = clean_frame(&rows);

    let returns = analysis::return_rate(&all_rows).expect("returns failed");
    assert_eq!(returns.overall_return_rate_pct, 25.0);

    assert_eq!(returns.by_category.len(), 2);
    let electronics = returns
        .by_category
        .iter()
        .find(|entry| entry.category == "Electronics")
        .unwrap();
    assert_eq!(electronics.returns, 1);
    assert_eq!(electronics.total, 2);
    assert_eq!(electronics.return_rate_pct, 50.0);
}

#[test]
fn q4_heavy_year_is_flagged_significant() {
    let mut rows = full_year();
    // a strong, noisy Q4 uplift
    for (idx, entry) in rows.iter_mut().enumerate() {
        if entry.quarter == 4 {
            entry.revenue += 2_000.0 + (idx % 7) as f64 * 13.0;
        }
    }
    let df = clean_frame(&rows);

    let test = analysis::statistical_tests(&df, 0.05).expect("stat test failed");
    assert!(test.t_statistic > 0.0);
    assert!(test.p_value < 0.05);
    assert!(test.significant);
    assert!(test.cohens_d > 0.2);
}

#[test]
fn degenerate_kpis_are_skipped_under_the_partial_policy() {
    // Q4-only data: Q3 revenue is zero and the non-Q4 group is empty
    let rows = vec![
        row(4, 10, "Oct", "Electronics", 500.0),
        row(4, 11, "Nov", "Electronics", 700.0),
    ];
    let df = clean_frame(&rows);

    let results = analyze(&df, &df, &AnalysisConfig::default()).expect("analyze failed");
    assert!(results.quarterly.is_none());
    assert!(results.stats_tests.is_none());
    assert!(results.summary.is_some());
    assert!(results.categories.is_some());
    assert!(results.monthly.is_some());
    assert!(results.returns.is_some());

    let skipped: Vec<&str> = results.skipped_kpis.iter().map(|s| s.kpi).collect();
    assert!(skipped.contains(&"quarterly"));
    assert!(skipped.contains(&"stats_tests"));
}

#[test]
fn strict_policy_turns_degeneracy_into_an_error() {
    let rows = vec![
        row(4, 10, "Oct", "Electronics", 500.0),
        row(4, 11, "Nov", "Electronics", 700.0),
    ];
    let df = clean_frame(&rows);

    let config = AnalysisConfig {
        strict_kpis: true,
        ..AnalysisConfig::default()
    };
    let err = analyze(&df, &df, &config).unwrap_err();
    assert!(matches!(err, PipelineError::Analysis(_)));
}

#[test]
fn results_document_serializes_with_the_dashboard_field_names() {
    let df = clean_frame(&full_year());
    let results = analyze(&df, &df, &AnalysisConfig::default()).expect("analyze failed");
    let json = serde_json::to_value(&results).expect("serialize failed");

    assert!(json.get("total_revenue").is_some());
    assert!(json.get("total_orders").is_some());
    assert!(json.get("avg_order_value").is_some());
    assert!(json["quarterly"]["q4_vs_q3_growth_pct"].is_number());
    assert!(json["categories"]["top3_categories"].is_array());
    assert!(json["channels"]["channel_revenue"].is_array());
    assert!(json["monthly"]["monthly_trend"][0]["mom_growth_pct"].is_null());
    assert!(json["returns"]["overall_return_rate_pct"].is_number());
    assert!(json["stats_tests"]["p_value"].is_number());
}
