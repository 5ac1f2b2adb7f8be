//! Core domain types shared across the ingest pipeline and the aggregation
//! engine.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleType {
    NewSale,
    Resale,
}

impl SaleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleType::NewSale => "New Sale",
            SaleType::Resale => "Resale",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "new sale" | "new_sale" | "newsale" => Some(SaleType::NewSale),
            "resale" => Some(SaleType::Resale),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Region {
    Ccr,
    Rcr,
    Ocr,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Ccr => "CCR",
            Region::Rcr => "RCR",
            Region::Ocr => "OCR",
        }
    }
}

/// Canonical three-way tenure bucket. Resolves the source's two conflicting
/// tenure conventions (string match vs. `remaining_lease == 999` sentinel)
/// into a single field computed once at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenureClass {
    Freehold,
    /// 99-year leasehold.
    Y99,
    /// 999-year leasehold (functionally freehold but tracked separately
    /// because some downstream filters key off the literal tenure string).
    Y999,
}

impl TenureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenureClass::Freehold => "freehold",
            TenureClass::Y99 => "99",
            TenureClass::Y999 => "999",
        }
    }
}

/// Source of a promoted row: distinguishes CSV-loaded transactions from
/// (future, out-of-scope) API-pulled ones. Both still flow through the same
/// staging/dedup/promotion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionSource {
    Csv,
    Api,
}

/// A single property sale as it appears in `transactions` (production) or
/// `transactions_staging`. The staging variant additionally carries
/// `batch_id`, `is_valid`, `validation_errors` (see `loader::StagingRow`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Option<i64>,
    pub row_hash: String,
    pub project_name: String,
    /// Always the first day of the transaction month (URA convention).
    pub transaction_date: NaiveDate,
    pub price: f64,
    pub area_sqft: f64,
    pub psf: f64,
    pub district: String,
    pub region: Region,
    pub bedroom_count: u8,
    pub sale_type: SaleType,
    pub floor_range: Option<String>,
    pub tenure: Option<String>,
    pub lease_start_year: Option<i32>,
    pub tenure_class: Option<TenureClass>,
    pub is_outlier: bool,
    pub source: TransactionSource,
    pub run_id: Uuid,
    pub created_at: chrono::DateTime<Utc>,
}

impl Transaction {
    /// Recomputes `psf` from `price`/`area_sqft` and checks it against the
    /// stored value within the 5% tolerance invariant (§3, §8).
    pub fn psf_within_tolerance(&self) -> bool {
        if self.area_sqft <= 0.0 {
            return false;
        }
        let recomputed = self.price / self.area_sqft;
        if recomputed <= 0.0 {
            return false;
        }
        ((self.psf - recomputed).abs() / recomputed) <= 0.05
    }

    pub fn positive_invariants_hold(&self) -> bool {
        self.price > 0.0 && self.area_sqft > 0.0 && self.psf > 0.0
    }

    pub fn is_first_of_month(&self) -> bool {
        use chrono::Datelike;
        self.transaction_date.day() == 1
    }
}
