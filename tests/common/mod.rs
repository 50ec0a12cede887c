#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Days, NaiveDate};
use csv_dashboard::{Dashboard, RawTable, io_utils};
use encoding_rs::UTF_8;
use tempfile::{TempDir, tempdir};

pub const RENTAL_HEADER: &str = "id,name,host_id,host_name,neighbourhood_group,neighbourhood,\
latitude,longitude,room_type,price,minimum_nights,number_of_reviews,last_review,\
reviews_per_month,availability_365";

pub const RETAIL_HEADER: &str = "transaction_id,date,customer_id,gender,age,product_category,\
quantity,price_per_unit,total_amount,region";

pub const ROOM_TYPES: [&str; 3] = ["Entire home/apt", "Private room", "Shared room"];
pub const BOROUGHS: [&str; 3] = ["Brooklyn", "Manhattan", "Queens"];
pub const NEIGHBOURHOODS: [&str; 4] = ["Harlem", "Williamsburg", "O'Brien Park", "Astoria"];
pub const CATEGORIES: [&str; 3] = ["Beauty", "Clothing", "Electronics"];
pub const REGIONS: [&str; 4] = ["North", "South", "East", "West"];

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    pub fn db_path(&self) -> PathBuf {
        self.temp_dir.path().join("store").join("dashboard.sqlite")
    }
}

#[derive(Debug, Clone)]
pub struct Listing {
    pub id: usize,
    pub neighbourhood_group: &'static str,
    pub neighbourhood: &'static str,
    pub room_type: &'static str,
    pub price: Option<u32>,
    pub minimum_nights: u32,
    pub last_review: Option<NaiveDate>,
    pub reviews_per_month: f64,
    pub availability_365: u32,
}

/// Deterministic listings; every tenth listing has no price.
pub fn listings(count: usize) -> Vec<Listing> {
    let base = NaiveDate::from_ymd_opt(2023, 1, 1).expect("base date");
    (0..count)
        .map(|i| Listing {
            id: i + 1,
            neighbourhood_group: BOROUGHS[i % BOROUGHS.len()],
            neighbourhood: NEIGHBOURHOODS[i % NEIGHBOURHOODS.len()],
            room_type: ROOM_TYPES[(i / 2) % ROOM_TYPES.len()],
            price: (i % 10 != 9).then(|| 40 + ((i * 137) % 1200) as u32),
            minimum_nights: 1 + (i % 7) as u32,
            last_review: (i % 6 != 5).then(|| base + Days::new(((i * 11) % 365) as u64)),
            reviews_per_month: ((i % 40) as f64) / 10.0,
            availability_365: ((i * 29) % 366) as u32,
        })
        .collect()
}

pub fn rental_csv(listings: &[Listing]) -> String {
    let mut out = String::from(RENTAL_HEADER);
    out.push('\n');
    for l in listings {
        let price = l.price.map(format_dollars).unwrap_or_default();
        let last_review = l.last_review.map(|d| d.to_string()).unwrap_or_default();
        out.push_str(&format!(
            "{id},Listing {id},{host},Host {host},{group},{hood},40.{lat:04},-73.{lon:04},{room},\"{price}\",{nights},{reviews},{last_review},{rpm},{avail}\n",
            id = l.id,
            host = 1000 + l.id % 50,
            group = l.neighbourhood_group,
            hood = l.neighbourhood,
            lat = l.id % 10_000,
            lon = (l.id * 7) % 10_000,
            room = l.room_type,
            nights = l.minimum_nights,
            reviews = l.id % 90,
            rpm = l.reviews_per_month,
            avail = l.availability_365,
        ));
    }
    out
}

#[derive(Debug, Clone)]
pub struct Sale {
    pub transaction_id: usize,
    pub date: NaiveDate,
    pub gender: &'static str,
    pub age: u32,
    pub product_category: &'static str,
    pub quantity: u32,
    pub price_per_unit: u32,
    pub region: &'static str,
}

impl Sale {
    pub fn total_amount(&self) -> u32 {
        self.quantity * self.price_per_unit
    }
}

pub fn sales(count: usize) -> Vec<Sale> {
    let base = NaiveDate::from_ymd_opt(2023, 1, 1).expect("base date");
    let prices = [25, 30, 50, 300, 500];
    (0..count)
        .map(|i| Sale {
            transaction_id: i + 1,
            date: base + Days::new(((i * 3) % 365) as u64),
            gender: if i % 2 == 0 { "Female" } else { "Male" },
            age: 18 + (i % 47) as u32,
            product_category: CATEGORIES[i % CATEGORIES.len()],
            quantity: 1 + (i % 4) as u32,
            price_per_unit: prices[i % prices.len()],
            region: REGIONS[i % REGIONS.len()],
        })
        .collect()
}

pub fn retail_csv(sales: &[Sale]) -> String {
    let mut out = String::from(RETAIL_HEADER);
    out.push('\n');
    for s in sales {
        out.push_str(&format!(
            "{id},{date},CUST{id:03},{gender},{age},{category},{qty},{unit},\"{total}\",{region}\n",
            id = s.transaction_id,
            date = s.date,
            gender = s.gender,
            age = s.age,
            category = s.product_category,
            qty = s.quantity,
            unit = s.price_per_unit,
            total = format_dollars(s.total_amount()),
            region = s.region,
        ));
    }
    out
}

/// `1234` -> `$1,234`.
pub fn format_dollars(amount: u32) -> String {
    let digits = amount.to_string();
    let mut grouped = String::new();
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("${grouped}")
}

pub fn raw_table(csv: &str) -> RawTable {
    io_utils::read_raw_table(csv.as_bytes(), b',', UTF_8).expect("parse csv")
}

pub fn loaded_dashboard(csv: &str) -> Dashboard {
    let mut dashboard = Dashboard::open_in_memory().expect("open dashboard");
    dashboard
        .load(&raw_table(csv), "fixture.csv")
        .expect("load fixture");
    dashboard
}
