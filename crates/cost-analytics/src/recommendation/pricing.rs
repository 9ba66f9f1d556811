//! Pricing catalogue consulted for savings estimates

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Storage access tier, warmest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageTier {
    /// Low-latency premium storage
    Premium,
    /// Frequently accessed
    Hot,
    /// Infrequently accessed
    Cool,
    /// Offline, retrieval latency in hours
    Archive,
}

/// Reservation term
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservedTerm {
    /// 12 months
    OneYear,
    /// 36 months
    ThreeYear,
}

impl ReservedTerm {
    /// Term length in months
    pub fn months(&self) -> f64 {
        match self {
            ReservedTerm::OneYear => 12.0,
            ReservedTerm::ThreeYear => 36.0,
        }
    }
}

/// Reservation payment option
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOption {
    /// Nothing upfront, discounted monthly charge
    NoUpfront,
    /// Half upfront
    PartialUpfront,
    /// Whole commitment upfront
    AllUpfront,
}

/// One purchasable reservation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReservedOffer {
    /// Term length
    pub term: ReservedTerm,
    /// Payment option
    pub payment: PaymentOption,
    /// Fraction off the on-demand rate
    pub discount: f64,
    /// Fraction of the total commitment paid upfront
    pub upfront_fraction: f64,
}

impl ReservedOffer {
    /// Typical public-cloud offer grid
    pub fn standard_offers() -> Vec<ReservedOffer> {
        let offer = |term, payment, discount, upfront_fraction| ReservedOffer {
            term,
            payment,
            discount,
            upfront_fraction,
        };
        vec![
            offer(ReservedTerm::OneYear, PaymentOption::NoUpfront, 0.36, 0.0),
            offer(ReservedTerm::OneYear, PaymentOption::PartialUpfront, 0.40, 0.5),
            offer(ReservedTerm::OneYear, PaymentOption::AllUpfront, 0.42, 1.0),
            offer(ReservedTerm::ThreeYear, PaymentOption::NoUpfront, 0.55, 0.0),
            offer(ReservedTerm::ThreeYear, PaymentOption::PartialUpfront, 0.60, 0.5),
            offer(ReservedTerm::ThreeYear, PaymentOption::AllUpfront, 0.62, 1.0),
        ]
    }
}

/// Billed traffic class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficClass {
    /// Internet egress
    Egress,
    /// Traffic between regions
    CrossRegion,
}

/// Bandwidth prices and the reserved commitment for one traffic class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandwidthOffer {
    /// On-demand price per GB
    pub on_demand_per_gb: f64,
    /// Monthly fee of the commitment
    pub commitment_monthly_fee: f64,
    /// Volume included in the fee
    pub committed_gb: f64,
    /// Price per GB above `committed_gb`
    pub overage_per_gb: f64,
    /// Price after moving the traffic into the same region, when that is possible
    pub same_region_per_gb: Option<f64>,
}

impl BandwidthOffer {
    /// Monthly volume at which the commitment costs the same as on-demand
    pub fn break_even_gb(&self) -> f64 {
        if self.on_demand_per_gb <= 0.0 {
            return f64::INFINITY;
        }
        self.commitment_monthly_fee / self.on_demand_per_gb
    }

    /// Monthly cost under the commitment
    pub fn committed_cost(&self, monthly_volume_gb: f64) -> f64 {
        self.commitment_monthly_fee
            + (monthly_volume_gb - self.committed_gb).max(0.0) * self.overage_per_gb
    }
}

/// Size tier with its on-demand price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeTierPrice {
    /// Tier name
    pub name: String,
    /// On-demand price per hour
    pub hourly_price: f64,
}

impl SizeTierPrice {
    /// Create a size tier
    pub fn new(name: impl Into<String>, hourly_price: f64) -> Self {
        Self {
            name: name.into(),
            hourly_price,
        }
    }
}

/// Price lookups needed by the recommendation engine
pub trait PricingCatalog: Send + Sync {
    /// Currency of every price
    fn currency(&self) -> &str;

    /// On-demand hourly price of a size tier
    fn hourly_price(&self, resource_type: &str, size_tier: &str, region: &str) -> Option<f64>;

    /// Next cheaper size tier in the same family
    fn next_smaller_tier(&self, resource_type: &str, size_tier: &str, region: &str) -> Option<SizeTierPrice>;

    /// Price per GB-month of a storage tier
    fn storage_price(&self, tier: StorageTier, region: &str) -> Option<f64>;

    /// Reservation offers for a resource type
    fn reserved_offers(&self, resource_type: &str, region: &str) -> Vec<ReservedOffer>;

    /// Bandwidth pricing for a traffic class
    fn bandwidth_offer(&self, traffic: TrafficClass, region: &str) -> Option<BandwidthOffer>;
}

/// In-memory pricing table
#[derive(Debug, Clone, Default)]
pub struct StaticPricingCatalog {
    currency: String,
    ladders: HashMap<(String, String), Vec<SizeTierPrice>>,
    storage: HashMap<(StorageTier, String), f64>,
    reserved: HashMap<(String, String), Vec<ReservedOffer>>,
    bandwidth: HashMap<(TrafficClass, String), BandwidthOffer>,
}

impl StaticPricingCatalog {
    /// Empty catalogue priced in `currency`
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
            ..Default::default()
        }
    }

    /// Register a size ladder; tiers are ordered by price
    pub fn with_size_ladder(
        mut self,
        resource_type: impl Into<String>,
        region: impl Into<String>,
        mut tiers: Vec<SizeTierPrice>,
    ) -> Self {
        tiers.sort_by(|a, b| a.hourly_price.total_cmp(&b.hourly_price));
        self.ladders.insert((resource_type.into(), region.into()), tiers);
        self
    }

    /// Register a storage tier price
    pub fn with_storage_price(mut self, tier: StorageTier, region: impl Into<String>, per_gb_month: f64) -> Self {
        self.storage.insert((tier, region.into()), per_gb_month);
        self
    }

    /// Register reservation offers
    pub fn with_reserved_offers(
        mut self,
        resource_type: impl Into<String>,
        region: impl Into<String>,
        offers: Vec<ReservedOffer>,
    ) -> Self {
        self.reserved.insert((resource_type.into(), region.into()), offers);
        self
    }

    /// Register bandwidth pricing
    pub fn with_bandwidth_offer(mut self, traffic: TrafficClass, region: impl Into<String>, offer: BandwidthOffer) -> Self {
        self.bandwidth.insert((traffic, region.into()), offer);
        self
    }

    fn ladder(&self, resource_type: &str, region: &str) -> Option<&[SizeTierPrice]> {
        self.ladders
            .get(&(resource_type.to_string(), region.to_string()))
            .map(Vec::as_slice)
    }
}

impl PricingCatalog for StaticPricingCatalog {
    fn currency(&self) -> &str {
        &self.currency
    }

    fn hourly_price(&self, resource_type: &str, size_tier: &str, region: &str) -> Option<f64> {
        self.ladder(resource_type, region)?
            .iter()
            .find(|t| t.name == size_tier)
            .map(|t| t.hourly_price)
    }

    fn next_smaller_tier(&self, resource_type: &str, size_tier: &str, region: &str) -> Option<SizeTierPrice> {
        let ladder = self.ladder(resource_type, region)?;
        let position = ladder.iter().position(|t| t.name == size_tier)?;
        position.checked_sub(1).map(|i| ladder[i].clone())
    }

    fn storage_price(&self, tier: StorageTier, region: &str) -> Option<f64> {
        self.storage.get(&(tier, region.to_string())).copied()
    }

    fn reserved_offers(&self, resource_type: &str, region: &str) -> Vec<ReservedOffer> {
        self.reserved
            .get(&(resource_type.to_string(), region.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    fn bandwidth_offer(&self, traffic: TrafficClass, region: &str) -> Option<BandwidthOffer> {
        self.bandwidth.get(&(traffic, region.to_string())).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> StaticPricingCatalog {
        StaticPricingCatalog::new("USD").with_size_ladder(
            "vm",
            "eastus",
            vec![
                SizeTierPrice::new("Standard_D8s_v3", 0.384),
                SizeTierPrice::new("Standard_D2s_v3", 0.096),
                SizeTierPrice::new("Standard_D4s_v3", 0.192),
            ],
        )
    }

    #[test]
    fn test_ladder_navigation() {
        let catalog = catalog();
        assert_eq!(catalog.hourly_price("vm", "Standard_D4s_v3", "eastus"), Some(0.192));
        assert_eq!(
            catalog
                .next_smaller_tier("vm", "Standard_D4s_v3", "eastus")
                .map(|t| t.name),
            Some("Standard_D2s_v3".to_string())
        );
        assert!(catalog.next_smaller_tier("vm", "Standard_D2s_v3", "eastus").is_none());
        assert!(catalog.hourly_price("vm", "Standard_D4s_v3", "westus").is_none());
    }

    #[test]
    fn test_bandwidth_break_even() {
        let offer = BandwidthOffer {
            on_demand_per_gb: 0.08,
            commitment_monthly_fee: 400.0,
            committed_gb: 10_000.0,
            overage_per_gb: 0.05,
            same_region_per_gb: None,
        };
        assert!((offer.break_even_gb() - 5000.0).abs() < 1e-9);
        assert_eq!(offer.committed_cost(8000.0), 400.0);
        assert!((offer.committed_cost(12_000.0) - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_standard_offers_cover_grid() {
        let offers = ReservedOffer::standard_offers();
        assert_eq!(offers.len(), 6);
        assert!(offers.iter().all(|o| o.discount > 0.0 && o.discount < 1.0));
    }
}
