//! Offline pricing lookups for waste cost estimates
//!
//! Prices come from an embedded JSON asset shaped
//! `resource_kind -> sku -> region -> price` and are loaded once into a
//! process-wide table. Instance and database prices are hourly; disks and
//! snapshots are per GiB-month; addresses, NAT, functions, load balancers,
//! and subscriptions are flat monthly rates under the sku `"default"`.
//!
//! A region miss falls back to `us-central1` before giving up; an unknown
//! sku prices at zero. On-demand rates only, no committed-use or
//! sustained-use discounts.

use std::collections::HashMap;
use std::sync::OnceLock;

use tracing::warn;

pub const HOURS_PER_MONTH: f64 = 730.0;

const FALLBACK_REGION: &str = "us-central1";

type PriceTable = HashMap<String, HashMap<String, HashMap<String, f64>>>;

static PRICING: OnceLock<PriceTable> = OnceLock::new();

fn table() -> &'static PriceTable {
    PRICING.get_or_init(|| {
        let raw = include_str!("../assets/pricing.json");
        match serde_json::from_str(raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(error = %err, "Failed to parse embedded pricing data");
                PriceTable::new()
            }
        }
    })
}

fn lookup(resource_kind: &str, sku: &str, region: &str) -> Option<f64> {
    let regions = table().get(resource_kind)?.get(sku)?;
    regions
        .get(region)
        .or_else(|| regions.get(FALLBACK_REGION))
        .copied()
}

/// Map a zone to its region by dropping the trailing zone letter
/// ("us-central1-a" -> "us-central1"). Inputs without a zone suffix pass
/// through unchanged.
pub fn region_from_zone(zone: &str) -> String {
    let parts: Vec<&str> = zone.split('-').collect();
    if parts.len() >= 3 {
        parts[..parts.len() - 1].join("-")
    } else {
        zone.to_string()
    }
}

/// Estimated monthly cost of a compute instance (hourly rate x 730).
pub fn monthly_instance_cost(machine_type: &str, zone: &str) -> f64 {
    let region = region_from_zone(zone);
    lookup("compute_instance", machine_type, &region)
        .map(|hourly| hourly * HOURS_PER_MONTH)
        .unwrap_or(0.0)
}

/// Estimated monthly cost of a persistent disk (per-GiB rate x size).
pub fn monthly_disk_cost(disk_type: &str, size_gib: i64, zone: &str) -> f64 {
    let region = region_from_zone(zone);
    lookup("persistent_disk", disk_type, &region)
        .map(|per_gib| per_gib * size_gib as f64)
        .unwrap_or(0.0)
}

/// Monthly cost of an unattached static IP reservation.
pub fn monthly_address_cost(region: &str) -> f64 {
    lookup("static_ip", "default", region).unwrap_or(0.0)
}

/// Estimated monthly cost of a snapshot (per-GiB rate x size).
pub fn monthly_snapshot_cost(size_gib: i64, region: &str) -> f64 {
    lookup("snapshot", "default", region)
        .map(|per_gib| per_gib * size_gib as f64)
        .unwrap_or(0.0)
}

/// Estimated monthly cost of a Cloud SQL instance (hourly rate x 730).
pub fn monthly_cloud_sql_cost(tier: &str, region: &str) -> f64 {
    lookup("cloud_sql", tier, region)
        .map(|hourly| hourly * HOURS_PER_MONTH)
        .unwrap_or(0.0)
}

/// Monthly cost of a Cloud NAT gateway.
pub fn monthly_nat_cost(region: &str) -> f64 {
    lookup("cloud_nat", "default", region).unwrap_or(0.0)
}

/// Monthly base cost attributed to an idle Cloud Function.
pub fn monthly_function_cost(region: &str) -> f64 {
    lookup("cloud_function", "default", region).unwrap_or(0.0)
}

/// Monthly cost of a load-balancer forwarding rule.
pub fn monthly_lb_cost(region: &str) -> f64 {
    lookup("load_balancer", "default", region).unwrap_or(0.0)
}

/// Flat monthly cost attributed to an idle Pub/Sub subscription.
pub fn monthly_pubsub_subscription_cost() -> f64 {
    lookup("pubsub_subscription", "default", FALLBACK_REGION).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn almost_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn test_monthly_instance_cost() {
        let cost = monthly_instance_cost("e2-medium", "us-central1-a");
        assert!(almost_equal(cost, 0.0335 * HOURS_PER_MONTH));
    }

    #[test]
    fn test_monthly_instance_cost_unknown_type() {
        assert_eq!(monthly_instance_cost("unknown-type", "us-central1-a"), 0.0);
    }

    #[test]
    fn test_monthly_instance_cost_region_fallback() {
        let cost = monthly_instance_cost("e2-medium", "unknown-region1-a");
        assert!(almost_equal(cost, 0.0335 * HOURS_PER_MONTH));
    }

    #[test]
    fn test_monthly_disk_cost() {
        let cost = monthly_disk_cost("pd-ssd", 100, "us-central1-a");
        assert!(almost_equal(cost, 17.0));
    }

    #[test]
    fn test_monthly_disk_cost_unknown_type() {
        assert_eq!(monthly_disk_cost("pd-unknown", 100, "us-central1-a"), 0.0);
    }

    #[test]
    fn test_monthly_address_cost() {
        assert!(almost_equal(monthly_address_cost("us-central1"), 7.30));
    }

    #[test]
    fn test_monthly_address_cost_fallback() {
        assert!(almost_equal(monthly_address_cost("unknown-region"), 7.30));
    }

    #[test]
    fn test_monthly_snapshot_cost() {
        let cost = monthly_snapshot_cost(200, "us-central1");
        assert!(almost_equal(cost, 0.026 * 200.0));
    }

    #[test]
    fn test_monthly_cloud_sql_cost() {
        let cost = monthly_cloud_sql_cost("db-f1-micro", "us-central1");
        assert!(almost_equal(cost, 0.0150 * HOURS_PER_MONTH));
    }

    #[test]
    fn test_monthly_cloud_sql_cost_unknown_tier() {
        assert_eq!(monthly_cloud_sql_cost("db-unknown", "us-central1"), 0.0);
    }

    #[test]
    fn test_flat_rate_lookups() {
        assert!(monthly_nat_cost("us-central1") > 0.0);
        assert!(monthly_function_cost("us-central1") > 0.0);
        assert!(monthly_lb_cost("us-central1") > 0.0);
        assert!(monthly_pubsub_subscription_cost() > 0.0);
    }

    #[test]
    fn test_region_from_zone() {
        assert_eq!(region_from_zone("us-central1-a"), "us-central1");
        assert_eq!(region_from_zone("europe-west1-b"), "europe-west1");
        assert_eq!(region_from_zone("asia-east1-c"), "asia-east1");
        assert_eq!(region_from_zone("us-central1"), "us-central1");
    }
}
