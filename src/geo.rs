//! Store coordinates and map classification

use serde::Serialize;

use crate::db::StoreLocation;

/// Parsed `geo_loc` value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    /// Parse a `"lat,lng"` pair; anything else is rejected
    pub fn parse(geo_loc: &str) -> Option<Self> {
        let mut parts = geo_loc.split(',');
        let lat: f64 = parts.next()?.trim().parse().ok()?;
        let lng: f64 = parts.next()?.trim().parse().ok()?;
        if parts.next().is_some() || !lat.is_finite() || !lng.is_finite() {
            return None;
        }
        Some(Self { lat, lng })
    }
}

/// Countries the map view breaks visitors down by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Uae,
    Qatar,
    Saudi,
}

impl Region {
    pub const ALL: [Region; 3] = [Self::Uae, Self::Qatar, Self::Saudi];

    /// Whether a lower-cased location string names this region.
    /// A location may name more than one.
    pub fn named_in(self, location: &str) -> bool {
        match self {
            Self::Uae => location.contains("dubai") || location.contains("uae"),
            Self::Qatar => location.contains("qatar"),
            Self::Saudi => location.contains("saudi"),
        }
    }
}

/// Visitors per region across all located stores
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegionTotals {
    pub uae: i64,
    pub qatar: i64,
    pub saudi: i64,
}

impl RegionTotals {
    pub fn from_locations(locations: &[StoreLocation]) -> Self {
        let mut totals = Self::default();
        for loc in locations {
            for region in Region::ALL.into_iter().filter(|r| r.named_in(&loc.location)) {
                match region {
                    Region::Uae => totals.uae += loc.total_enter_count,
                    Region::Qatar => totals.qatar += loc.total_enter_count,
                    Region::Saudi => totals.saudi += loc.total_enter_count,
                }
            }
        }
        totals
    }
}

/// Marker colour by visitor volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerTier {
    Red,
    Yellow,
    Green,
}

impl MarkerTier {
    pub fn for_visitors(count: i64) -> Self {
        if count > 3000 {
            Self::Red
        } else if count > 1000 {
            Self::Yellow
        } else {
            Self::Green
        }
    }
}

/// A store placed on the map
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreMarker {
    #[serde(rename = "storeID")]
    pub store_id: String,
    pub location: String,
    pub coordinates: Coordinates,
    pub total_enter_count: i64,
    pub tier: MarkerTier,
}

/// Markers for every location with usable coordinates
pub fn markers(locations: &[StoreLocation]) -> Vec<StoreMarker> {
    locations
        .iter()
        .filter_map(|loc| {
            let coordinates = Coordinates::parse(&loc.geo_loc)?;
            Some(StoreMarker {
                store_id: loc.store_id.clone(),
                location: loc.location.clone(),
                coordinates,
                total_enter_count: loc.total_enter_count,
                tier: MarkerTier::for_visitors(loc.total_enter_count),
            })
        })
        .collect()
}
