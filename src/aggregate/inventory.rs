//! `project_name -> total_units` side lookup for the aggregation engine's
//! `total_units`/`percent_sold`/`unsold_inventory` post-processing.
//!
//! The originating system populates `project_inventory` out-of-band (an
//! inventory-sync service pulling from a government developer-sales API);
//! that sync job is a separate collaborator, out of scope here (§1). This
//! crate only reads the table it leaves behind.

use sqlx::PgPool;
use std::collections::BTreeMap;

/// Loaded once per `aggregate()` call that needs it (not cached across
/// calls -- the table is small and changes infrequently, so a fresh read
/// is cheap and avoids a second cache-invalidation path to reason about).
pub async fn load_total_units(pool: &PgPool) -> Result<BTreeMap<String, i64>, sqlx::Error> {
    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT project_name, total_units FROM project_inventory")
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().collect())
}

/// `percent_sold = min(100, 100 * sold / total_units)`; `None` when
/// `total_units` is unknown or zero (division is meaningless).
pub fn percent_sold(sold: i64, total_units: Option<i64>) -> Option<f64> {
    let total = total_units?;
    if total <= 0 {
        return None;
    }
    Some((100.0 * sold as f64 / total as f64).min(100.0))
}

/// `unsold_inventory = max(0, total_units - sold)`; `None` when
/// `total_units` is unknown.
pub fn unsold_inventory(sold: i64, total_units: Option<i64>) -> Option<i64> {
    let total = total_units?;
    Some((total - sold).max(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_sold_caps_at_100() {
        assert_eq!(percent_sold(150, Some(100)), Some(100.0));
    }

    #[test]
    fn percent_sold_none_when_total_unknown() {
        assert_eq!(percent_sold(10, None), None);
    }

    #[test]
    fn unsold_inventory_floors_at_zero() {
        assert_eq!(unsold_inventory(150, Some(100)), Some(0));
    }

    #[test]
    fn unsold_inventory_normal_case() {
        assert_eq!(unsold_inventory(40, Some(100)), Some(60));
    }
}
