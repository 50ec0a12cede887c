mod common;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use csv_dashboard::{
    Dashboard, DashboardError, FilterSet, RunOptions, Value, Variant, queries,
};

use common::{
    TestWorkspace, listings, loaded_dashboard, raw_table, rental_csv, retail_csv, sales,
};

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn average_price_by_room_type_ignores_null_prices() {
    let listings = listings(500);
    assert_eq!(listings.iter().filter(|l| l.price.is_none()).count(), 50);
    let dashboard = loaded_dashboard(&rental_csv(&listings));
    assert_eq!(dashboard.variant(), Variant::Rental);
    assert_eq!(dashboard.active().unwrap().row_count, 500);

    let result = dashboard
        .run_query("avg_price_by_room_type", &FilterSet::new(), &RunOptions::default())
        .expect("run query")
        .result;
    assert_eq!(result.columns, ["room_type", "listing_count", "avg_price"]);
    assert_eq!(result.row_count(), 3);

    let mut expected: BTreeMap<&str, (i64, f64)> = BTreeMap::new();
    for listing in &listings {
        if let Some(price) = listing.price {
            let entry = expected.entry(listing.room_type).or_default();
            entry.0 += 1;
            entry.1 += f64::from(price);
        }
    }
    for row in 0..result.row_count() {
        let room = result.value(row, "room_type").and_then(Value::as_str).unwrap();
        let (count, total) = expected[room];
        assert_eq!(result.value(row, "listing_count").unwrap().as_i64(), Some(count));
        let avg = result.value(row, "avg_price").unwrap().as_f64().unwrap();
        assert!((avg - round2(total / count as f64)).abs() < 0.005, "{room}: {avg}");
    }
    let counted: i64 = expected.values().map(|(count, _)| count).sum();
    assert_eq!(counted, 450);

    let averages = result
        .column_values("avg_price")
        .into_iter()
        .filter_map(Value::as_f64)
        .collect::<Vec<_>>();
    assert!(averages.windows(2).all(|w| w[0] >= w[1]), "largest first");
}

#[test]
fn every_query_returns_zero_rows_when_nothing_matches() {
    let rental = loaded_dashboard(&rental_csv(&listings(60)));
    let nowhere = FilterSet::new().with_values("room_type", ["Treehouse"]);
    let results = rental.run_all(&nowhere, &RunOptions::default()).expect("run all");
    assert_eq!(results.len(), queries::catalog(Variant::Rental).len());
    for named in &results {
        assert!(named.result.is_empty(), "{} returned rows", named.name);
        assert!(!named.result.columns.is_empty(), "{} lost its columns", named.name);
    }

    let retail = loaded_dashboard(&retail_csv(&sales(60)));
    let never = FilterSet::new().with_date_range("date", Some(date(1999, 1, 1)), Some(date(1999, 12, 31)));
    for named in retail.run_all(&never, &RunOptions::default()).expect("run all") {
        assert!(named.result.is_empty(), "{} returned rows", named.name);
    }
}

#[test]
fn empty_selection_means_no_restriction() {
    let dashboard = loaded_dashboard(&rental_csv(&listings(90)));
    let unrestricted = dashboard
        .run_query("overview", &FilterSet::new(), &RunOptions::default())
        .unwrap()
        .result;
    let empty_set = FilterSet::new().with_values("neighbourhood", Vec::<String>::new());
    let with_empty = dashboard
        .run_query("overview", &empty_set, &RunOptions::default())
        .unwrap()
        .result;
    assert_eq!(unrestricted, with_empty);
    assert_eq!(unrestricted.value(0, "listing_count").unwrap().as_i64(), Some(81));
}

#[test]
fn apostrophes_in_filter_values_round_trip() {
    let listings = listings(40);
    let dashboard = loaded_dashboard(&rental_csv(&listings));
    let filters = FilterSet::new().with_values("neighbourhood", ["O'Brien Park"]);
    let result = dashboard
        .run_query("listings_by_neighbourhood_group", &filters, &RunOptions::default())
        .expect("run query")
        .result;

    let expected = listings
        .iter()
        .filter(|l| l.neighbourhood == "O'Brien Park")
        .count() as i64;
    let total: i64 = result
        .column_values("listing_count")
        .into_iter()
        .filter_map(Value::as_i64)
        .sum();
    assert!(expected > 0);
    assert_eq!(total, expected);
}

#[test]
fn date_range_and_category_filters_combine() {
    let sales = sales(300);
    let dashboard = loaded_dashboard(&retail_csv(&sales));
    let (start, end) = (date(2023, 3, 1), date(2023, 5, 31));
    let filters = FilterSet::new()
        .with_values("product_category", ["Beauty", "Clothing"])
        .with_date_range("date", Some(start), Some(end));

    let result = dashboard
        .run_query("overview", &filters, &RunOptions::default())
        .expect("overview")
        .result;
    let matching = sales
        .iter()
        .filter(|s| s.product_category != "Electronics" && s.date >= start && s.date <= end)
        .collect::<Vec<_>>();
    assert_eq!(
        result.value(0, "transaction_count").unwrap().as_i64(),
        Some(matching.len() as i64)
    );
    let revenue: u32 = matching.iter().map(|s| s.total_amount()).sum();
    assert_eq!(
        result.value(0, "total_revenue").unwrap().as_f64(),
        Some(f64::from(revenue))
    );

    let months = dashboard
        .run_query("monthly_revenue", &filters, &RunOptions::default())
        .expect("monthly")
        .result;
    let labels = months
        .column_values("month")
        .into_iter()
        .filter_map(Value::as_str)
        .collect::<Vec<_>>();
    assert_eq!(labels, ["2023-03", "2023-04", "2023-05"]);
}

#[test]
fn inverted_date_range_matches_nothing() {
    let dashboard = loaded_dashboard(&retail_csv(&sales(50)));
    let filters = FilterSet::new().with_date_range("date", Some(date(2023, 6, 1)), Some(date(2023, 1, 1)));
    let result = dashboard
        .run_query("revenue_by_category", &filters, &RunOptions::default())
        .expect("run query");
    assert!(result.result.is_empty());
}

#[test]
fn top_option_only_limits_top_n_queries() {
    let dashboard = loaded_dashboard(&retail_csv(&sales(120)));
    let options = RunOptions { top: Some(2) };
    let top = dashboard
        .run_query("top_regions_by_revenue", &FilterSet::new(), &options)
        .unwrap();
    assert_eq!(top.result.row_count(), 2);
    let categories = dashboard
        .run_query("revenue_by_category", &FilterSet::new(), &options)
        .unwrap();
    assert_eq!(categories.result.row_count(), 3);
}

#[test]
fn age_groups_use_fixed_labels() {
    let dashboard = loaded_dashboard(&retail_csv(&sales(200)));
    let result = dashboard
        .run_query("category_by_age_group", &FilterSet::new(), &RunOptions::default())
        .unwrap()
        .result;
    assert_eq!(
        result.columns,
        ["product_category", "age_group", "transaction_count", "avg_amount"]
    );
    let labels = result
        .column_values("age_group")
        .into_iter()
        .filter_map(Value::as_str)
        .collect::<Vec<_>>();
    assert!(labels.iter().all(|l| ["18-25", "26-35", "36-45", "46-55", "56-65"].contains(l)));
    let total: i64 = result
        .column_values("transaction_count")
        .into_iter()
        .filter_map(Value::as_i64)
        .sum();
    assert_eq!(total, 200);
}

#[test]
fn filter_options_list_values_and_date_bounds() {
    let sales = sales(100);
    let dashboard = loaded_dashboard(&retail_csv(&sales));
    let options = dashboard.filter_options().expect("filter options");
    assert_eq!(
        options.categorical["product_category"],
        ["Beauty", "Clothing", "Electronics"]
    );
    assert_eq!(options.categorical["gender"], ["Female", "Male"]);
    let bounds = &options.date_bounds["date"];
    assert_eq!(bounds.min, sales.iter().map(|s| s.date).min());
    assert_eq!(bounds.max, sales.iter().map(|s| s.date).max());
}

#[test]
fn queries_needing_absent_columns_are_unavailable() {
    let csv = "room_type,price,minimum_nights,availability_365\n\
               Private room,$80,2,100\n\
               Shared room,$40,1,0\n";
    let dashboard = loaded_dashboard(csv);
    let names = dashboard
        .available_queries()
        .into_iter()
        .map(|q| q.name)
        .collect::<Vec<_>>();
    assert_eq!(
        names,
        ["overview", "avg_price_by_room_type", "price_distribution", "room_type_by_availability"]
    );
    let err = dashboard
        .run_query("reviews_by_month", &FilterSet::new(), &RunOptions::default())
        .expect_err("no last_review column");
    assert!(matches!(err, DashboardError::QueryUnavailable { .. }));

    // A filter on a column the file lacks is dropped rather than failing.
    let filters = FilterSet::new().with_values("neighbourhood", ["Harlem"]);
    let overview = dashboard
        .run_query("overview", &filters, &RunOptions::default())
        .unwrap();
    assert_eq!(overview.result.value(0, "listing_count").unwrap().as_i64(), Some(2));
}

#[test]
fn unknown_query_and_missing_dataset_are_errors() {
    let empty = Dashboard::open_in_memory().expect("open");
    assert!(matches!(
        empty.run_query("overview", &FilterSet::new(), &RunOptions::default()),
        Err(DashboardError::NoDataset)
    ));
    assert!(empty.available_queries().is_empty());

    let dashboard = loaded_dashboard(&retail_csv(&sales(5)));
    assert!(matches!(
        dashboard.run_query("price_distribution", &FilterSet::new(), &RunOptions::default()),
        Err(DashboardError::UnknownQuery { .. })
    ));
}

#[test]
fn reload_switches_variant_and_session_resumes_from_file() {
    let workspace = TestWorkspace::new();
    {
        let mut dashboard = Dashboard::open(&workspace.db_path()).expect("open");
        dashboard
            .load(&raw_table(&rental_csv(&listings(30))), "listings.csv")
            .expect("load rental");
        let summary = dashboard
            .load(&raw_table(&retail_csv(&sales(25))), "sales.csv")
            .expect("load retail");
        assert_eq!(summary.variant, Variant::Retail);
        assert_eq!(summary.row_count, 25);
    }

    let resumed = Dashboard::open(&workspace.db_path()).expect("reopen");
    let active = resumed.active().expect("resumed dataset");
    assert_eq!(active.variant, Variant::Retail);
    assert_eq!(active.row_count, 25);
    assert_eq!(active.metadata.source, "sales.csv");
    assert!(!active.has_column("room_type"));
    let overview = resumed
        .run_query("overview", &FilterSet::new(), &RunOptions::default())
        .unwrap();
    assert_eq!(overview.result.value(0, "transaction_count").unwrap().as_i64(), Some(25));
}

/// Hand-sized listings: prices sit on bucket edges, one price is missing and
/// one review date is missing.
const EDGE_LISTINGS: &str = "\
id,room_type,price,minimum_nights,last_review,reviews_per_month,availability_365
1,Private room,$49.99,1,2023-03-15,1.0,0
2,Private room,$50,1,2023-01-02,2.0,90
3,Entire home/apt,$99.99,2,2023-03-01,0.5,91
4,Entire home/apt,$100,2,2022-12-31,3.0,365
5,Private room,$150,3,,4.0,180
6,Entire home/apt,$600,1,2023-01-20,1.5,181
7,Private room,,1,2023-03-31,2.5,0
";

fn rows_of(result: &csv_dashboard::QueryResult) -> Vec<Vec<String>> {
    result
        .rows
        .iter()
        .map(|row| row.iter().map(Value::as_display).collect())
        .collect()
}

fn expected(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect()
}

#[test]
fn price_distribution_uses_inclusive_lower_bounds_in_boundary_order() {
    let dashboard = loaded_dashboard(EDGE_LISTINGS);
    let result = dashboard
        .run_query("price_distribution", &FilterSet::new(), &RunOptions::default())
        .unwrap()
        .result;
    assert_eq!(result.columns, ["bucket", "listing_count"]);
    assert_eq!(
        rows_of(&result),
        expected(&[
            &["under 50", "1"],
            &["50-100", "2"],
            &["100-150", "1"],
            &["150-200", "1"],
            &["500+", "1"],
        ])
    );
}

#[test]
fn reviews_by_month_is_chronological_and_skips_missing_dates() {
    let dashboard = loaded_dashboard(EDGE_LISTINGS);
    let result = dashboard
        .run_query("reviews_by_month", &FilterSet::new(), &RunOptions::default())
        .unwrap()
        .result;
    assert_eq!(result.columns, ["month", "listing_count", "avg_reviews_per_month"]);
    assert_eq!(
        rows_of(&result),
        expected(&[
            &["2022-12", "1", "3"],
            &["2023-01", "2", "1.75"],
            &["2023-03", "3", "1.33"],
        ])
    );
}

#[test]
fn room_type_by_availability_buckets_priced_listings() {
    let dashboard = loaded_dashboard(EDGE_LISTINGS);
    let result = dashboard
        .run_query("room_type_by_availability", &FilterSet::new(), &RunOptions::default())
        .unwrap()
        .result;
    assert_eq!(
        result.columns,
        ["room_type", "availability", "listing_count", "avg_price"]
    );
    // Listing 7 has no price, so "Private room / none" counts only listing 1.
    assert_eq!(
        rows_of(&result),
        expected(&[
            &["Entire home/apt", "91-180", "1", "99.99"],
            &["Entire home/apt", "181-270", "1", "600"],
            &["Entire home/apt", "271-365", "1", "100"],
            &["Private room", "none", "1", "49.99"],
            &["Private room", "1-90", "1", "50"],
            &["Private room", "91-180", "1", "150"],
        ])
    );
}

#[test]
fn amount_distribution_covers_every_bucket_edge() {
    let csv = "\
transaction_id,date,product_category,total_amount
1,2023-01-05,Beauty,$49.99
2,2023-01-06,Beauty,$50
3,2023-01-07,Clothing,$100
4,2023-02-01,Clothing,$250
5,2023-02-02,Electronics,$999.99
6,2023-02-03,Electronics,\"$1,000\"
7,2023-02-04,Electronics,n/a
";
    let dashboard = loaded_dashboard(csv);
    let result = dashboard
        .run_query("amount_distribution", &FilterSet::new(), &RunOptions::default())
        .unwrap()
        .result;
    assert_eq!(result.columns, ["bucket", "transaction_count"]);
    assert_eq!(
        rows_of(&result),
        expected(&[
            &["under 50", "1"],
            &["50-100", "1"],
            &["100-250", "1"],
            &["250-500", "1"],
            &["500-1000", "1"],
            &["1000+", "1"],
        ])
    );
}

#[test]
fn extra_column_differing_only_in_case_still_loads() {
    let csv = "room_type,price,minimum_nights,availability_365,Price\n\
               Private room,$80,2,100,eighty\n\
               Shared room,$40,1,0,forty\n";
    let mut dashboard = Dashboard::open_in_memory().expect("open");
    let summary = dashboard
        .load(&raw_table(csv), "mixed-case.csv")
        .expect("load with clashing extra column");
    assert_eq!(summary.variant, Variant::Rental);
    assert_eq!(summary.report.renamed.len(), 1);
    assert_eq!(summary.report.renamed[0].to, "Price_2");

    let active = dashboard.active().expect("active");
    assert!(active.has_column("price"));
    assert!(active.has_column("Price_2"));
    let overview = dashboard
        .run_query("overview", &FilterSet::new(), &RunOptions::default())
        .unwrap()
        .result;
    assert_eq!(overview.value(0, "avg_price").unwrap().as_f64(), Some(60.0));
}
