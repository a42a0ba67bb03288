//! Geography keys used to group offers into clusters.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::offers::Offer;
use crate::types::OutletId;

/// Finest geography level at which items are pooled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeoLevel {
    Province,
    #[default]
    City,
    Outlet,
}

impl GeoLevel {
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "province" => Some(GeoLevel::Province),
            "city" => Some(GeoLevel::City),
            "outlet" | "site" | "siteid" => Some(GeoLevel::Outlet),
            _ => None,
        }
    }
}

impl fmt::Display for GeoLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeoLevel::Province => write!(f, "province"),
            GeoLevel::City => write!(f, "city"),
            GeoLevel::Outlet => write!(f, "outlet"),
        }
    }
}

/// Outlet location as loaded from the outlet table.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct OutletRecord {
    pub outlet_id: OutletId,
    pub province: String,
    pub city: String,
}

/// An ordered key vector (province, city, outlet) and the outlets it covers.
#[derive(Clone, Debug, Default)]
pub struct Geography {
    pub keys: Vec<String>,
    pub outlets: BTreeSet<OutletId>,
}

impl Geography {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            keys,
            outlets: BTreeSet::new(),
        }
    }

    /// Key vector of `offer` truncated to `level`.
    pub fn for_offer(offer: &Offer, level: GeoLevel) -> Self {
        Self::new(key_vector(&offer.province, &offer.city, offer.outlet, level))
    }

    /// Prefix equality: compare up to the shorter vector's length.
    pub fn matches(&self, keys: &[String]) -> bool {
        self.keys.iter().zip(keys).all(|(a, b)| a == b)
    }

    /// Add every outlet whose location falls inside this geography.
    pub fn add_outlets<'a>(
        &mut self,
        outlets: impl IntoIterator<Item = &'a OutletRecord>,
        level: GeoLevel,
    ) {
        for outlet in outlets {
            let keys = key_vector(&outlet.province, &outlet.city, outlet.outlet_id, level);
            if keys == self.keys {
                self.outlets.insert(outlet.outlet_id);
            }
        }
    }
}

impl fmt::Display for Geography {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keys.join("/"))
    }
}

fn key_vector(province: &str, city: &str, outlet: OutletId, level: GeoLevel) -> Vec<String> {
    match level {
        GeoLevel::Province => vec![province.to_string()],
        GeoLevel::City => vec![province.to_string(), city.to_string()],
        GeoLevel::Outlet => vec![province.to_string(), city.to_string(), outlet.to_string()],
    }
}
