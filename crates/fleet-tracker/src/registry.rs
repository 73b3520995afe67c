//! Location registry: the catalog of depots, borders, markets and customers
//!
//! Entries keep their insertion order. Name resolution and nearest-location
//! ties are broken by that order, so the backing store is a `Vec` that is
//! never re-sorted.

use fleet_core::{
    Country, CoreError, CoreResult, GeoPosition, Location, LocationId, LocationType,
    NearestLocation, haversine_distance_km,
};

use parking_lot::RwLock;
use std::path::Path;
use tracing::{debug, info};

/// Catalog compiled into the binary, used when no catalog file is configured
const EMBEDDED_CATALOG: &str = include_str!("../data/locations.json");

/// Tokens of this length or shorter are ignored by the token matcher
const MIN_TOKEN_LEN: usize = 2;

/// A name matching strategy over the active catalog entries.
///
/// `query` arrives trimmed and lowercased.
pub type NameMatcher = for<'a> fn(query: &str, locations: &'a [Location]) -> Option<&'a Location>;

/// Name matchers in precedence order; the first hit wins
pub const NAME_MATCHERS: [(&str, NameMatcher); 3] = [
    ("exact", match_exact),
    ("substring", match_substring),
    ("token", match_token),
];

fn active(locations: &[Location]) -> impl Iterator<Item = &Location> {
    locations.iter().filter(|l| l.active)
}

/// Case-insensitive exact name match
pub fn match_exact<'a>(query: &str, locations: &'a [Location]) -> Option<&'a Location> {
    active(locations).find(|l| l.name.to_lowercase() == query)
}

/// Case-insensitive substring match in either direction
pub fn match_substring<'a>(query: &str, locations: &'a [Location]) -> Option<&'a Location> {
    active(locations).find(|l| {
        let name = l.name.to_lowercase();
        name.contains(query) || query.contains(name.as_str())
    })
}

/// First query token (longer than two characters) contained in a catalog name
pub fn match_token<'a>(query: &str, locations: &'a [Location]) -> Option<&'a Location> {
    query
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| token.chars().count() > MIN_TOKEN_LEN)
        .find_map(|token| active(locations).find(|l| l.name.to_lowercase().contains(token)))
}

/// In-memory location catalog shared by the geofence and progress engines
#[derive(Debug, Default)]
pub struct LocationRegistry {
    locations: RwLock<Vec<Location>>,
}

impl LocationRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from catalog entries, validating each one
    pub fn from_locations(locations: Vec<Location>) -> CoreResult<Self> {
        let registry = Self::new();
        for location in locations {
            registry.add(location)?;
        }
        Ok(registry)
    }

    /// Parse a JSON array of locations
    pub fn from_json(json: &str) -> CoreResult<Self> {
        let locations: Vec<Location> = serde_json::from_str(json)?;
        Self::from_locations(locations)
    }

    /// Load a JSON catalog file
    pub fn load_file(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let registry = Self::from_json(&json)?;
        info!("Loaded {} locations from {}", registry.len(), path.display());
        Ok(registry)
    }

    /// The catalog compiled into the binary
    pub fn embedded() -> CoreResult<Self> {
        Self::from_json(EMBEDDED_CATALOG)
    }

    /// Run `f` against the full catalog (inactive entries included) under the read lock
    pub fn with_locations<R>(&self, f: impl FnOnce(&[Location]) -> R) -> R {
        f(&self.locations.read())
    }

    /// Add a new location at the end of the catalog
    pub fn add(&self, location: Location) -> CoreResult<()> {
        location.validate()?;

        let mut locations = self.locations.write();
        if locations.iter().any(|l| l.id == location.id) {
            return Err(CoreError::DuplicateLocation(location.id.0));
        }

        debug!("Location added: {} ({})", location.name, location.id);
        locations.push(location);
        Ok(())
    }

    /// Replace an existing location in place, keeping its catalog position
    pub fn update(&self, location: Location) -> CoreResult<()> {
        location.validate()?;

        let mut locations = self.locations.write();
        let slot = locations
            .iter_mut()
            .find(|l| l.id == location.id && l.active)
            .ok_or_else(|| CoreError::location_not_found(location.id.0.clone()))?;

        debug!("Location updated: {} ({})", location.name, location.id);
        *slot = Location {
            active: slot.active,
            ..location
        };
        Ok(())
    }

    /// Soft-delete a location; it stays in the catalog but is skipped by lookups
    pub fn remove(&self, id: &LocationId) -> CoreResult<Location> {
        let mut locations = self.locations.write();
        let slot = locations
            .iter_mut()
            .find(|l| &l.id == id && l.active)
            .ok_or_else(|| CoreError::location_not_found(id.0.clone()))?;

        slot.active = false;
        debug!("Location removed: {} ({})", slot.name, slot.id);
        Ok(slot.clone())
    }

    /// Get an active location by id
    pub fn get(&self, id: &LocationId) -> Option<Location> {
        self.with_locations(|locations| active(locations).find(|l| &l.id == id).cloned())
    }

    /// All active locations in catalog order
    pub fn list(&self) -> Vec<Location> {
        self.with_locations(|locations| active(locations).cloned().collect())
    }

    /// Active locations in a given country
    pub fn by_country(&self, country: Country) -> Vec<Location> {
        self.with_locations(|locations| {
            active(locations)
                .filter(|l| l.country == country)
                .cloned()
                .collect()
        })
    }

    /// Active locations of a given type
    pub fn by_type(&self, location_type: LocationType) -> Vec<Location> {
        self.with_locations(|locations| {
            active(locations)
                .filter(|l| l.location_type == location_type)
                .cloned()
                .collect()
        })
    }

    /// Number of active locations
    pub fn len(&self) -> usize {
        self.with_locations(|locations| active(locations).count())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve free text to a location using the ordered matcher chain
    pub fn find_by_name(&self, query: &str) -> Option<Location> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return None;
        }

        self.with_locations(|locations| {
            NAME_MATCHERS.iter().find_map(|(strategy, matcher)| {
                let hit = matcher(&query, locations)?;
                debug!("'{}' resolved to {} by {} match", query, hit.id, strategy);
                Some(hit.clone())
            })
        })
    }

    /// Closest active location to a point.
    ///
    /// Returns `None` for an empty catalog or an unset (0,0 / non-finite) fix.
    pub fn find_nearest(&self, lat: f64, lon: f64) -> Option<NearestLocation> {
        if GeoPosition::new(lat, lon).is_degenerate() {
            return None;
        }

        self.with_locations(|locations| {
            let mut best: Option<(&Location, f64)> = None;
            for location in active(locations) {
                let distance = haversine_distance_km(lat, lon, location.latitude, location.longitude);
                if best.is_none_or(|(_, d)| distance < d) {
                    best = Some((location, distance));
                }
            }

            best.map(|(location, distance_km)| NearestLocation {
                location: location.clone(),
                distance_km,
            })
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_registry() -> LocationRegistry {
        LocationRegistry::from_locations(vec![
            Location::new("DEP-BYO", "Bulawayo Depot", -20.14704, 28.56973),
            Location::new("DEP-HRE", "Harare Depot", -17.8292, 31.0522),
            Location::new("MKT-MBR", "Mbare Musika Market", -17.8601, 31.0371)
                .with_type(LocationType::Market),
            Location::new("BRD-BB", "Beitbridge Border Post", -22.2197, 29.9886)
                .with_type(LocationType::Border)
                .with_radius(1500.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_embedded_catalog_loads() {
        let registry = LocationRegistry::embedded().unwrap();
        assert!(registry.len() >= 10);
        assert!(registry.get(&LocationId::new("DEP-BYO")).is_some());
    }

    #[test]
    fn test_exact_match_is_case_insensitive() {
        let registry = test_registry();
        let hit = registry.find_by_name("  HARARE depot ").unwrap();
        assert_eq!(hit.id.as_str(), "DEP-HRE");
    }

    #[test]
    fn test_substring_match_both_directions() {
        let registry = test_registry();

        // catalog name contains query
        assert_eq!(registry.find_by_name("Musika").unwrap().id.as_str(), "MKT-MBR");

        // query contains catalog name
        let hit = registry.find_by_name("Offload at Bulawayo Depot gate 3").unwrap();
        assert_eq!(hit.id.as_str(), "DEP-BYO");
    }

    #[test]
    fn test_exact_match_beats_substring() {
        let registry = LocationRegistry::from_locations(vec![
            Location::new("A", "Harare Depot North", -17.80, 31.05),
            Location::new("B", "Harare Depot", -17.83, 31.05),
        ])
        .unwrap();

        assert_eq!(registry.find_by_name("harare depot").unwrap().id.as_str(), "B");
    }

    #[test]
    fn test_token_match_order() {
        let registry = test_registry();

        // "to" is too short, "beitbridge" is the first usable token
        let hit = registry.find_by_name("to beitbridge, harare").unwrap();
        assert_eq!(hit.id.as_str(), "BRD-BB");

        // first token wins even though a later token matches an earlier entry
        let hit = registry.find_by_name("mbare, bulawayo").unwrap();
        assert_eq!(hit.id.as_str(), "MKT-MBR");
    }

    #[test]
    fn test_token_match_skips_short_tokens() {
        let registry = test_registry();
        assert!(registry.find_by_name("at de ha").is_none());
    }

    #[test]
    fn test_no_match() {
        let registry = test_registry();
        assert!(registry.find_by_name("Lilongwe").is_none());
        assert!(registry.find_by_name("   ").is_none());
    }

    #[test]
    fn test_matchers_individually() {
        let locations = vec![Location::new("X", "Chirundu Border Post", -16.03, 28.85)];

        assert!(match_exact("chirundu", &locations).is_none());
        assert!(match_substring("chirundu", &locations).is_some());
        assert!(match_token("via chirundu", &locations).is_some());
    }

    #[test]
    fn test_find_nearest() {
        let registry = test_registry();

        let nearest = registry.find_nearest(-17.85, 31.04).unwrap();
        assert_eq!(nearest.location.id.as_str(), "MKT-MBR");
        assert!(nearest.distance_km < 2.0);
    }

    #[test]
    fn test_find_nearest_degenerate() {
        let registry = test_registry();
        assert!(registry.find_nearest(0.0, 0.0).is_none());
        assert!(registry.find_nearest(f64::NAN, 31.0).is_none());
        assert!(LocationRegistry::new().find_nearest(-17.8, 31.0).is_none());
    }

    #[test]
    fn test_find_nearest_tie_keeps_catalog_order() {
        let registry = LocationRegistry::from_locations(vec![
            Location::new("FIRST", "First", -18.0, 31.0),
            Location::new("SECOND", "Second", -18.0, 31.0),
        ])
        .unwrap();

        let nearest = registry.find_nearest(-18.1, 31.0).unwrap();
        assert_eq!(nearest.location.id.as_str(), "FIRST");
    }

    #[test]
    fn test_add_rejects_duplicates_and_bad_radius() {
        let registry = test_registry();

        let dup = registry.add(Location::new("DEP-HRE", "Other", -17.0, 31.0));
        assert!(matches!(dup, Err(CoreError::DuplicateLocation(_))));

        let bad = registry.add(Location::new("NEW", "New", -17.0, 31.0).with_radius(-5.0));
        assert!(matches!(bad, Err(CoreError::InvalidRadius { .. })));

        let blank = registry.add(Location::new("NEW", " ", -17.0, 31.0));
        assert!(matches!(blank, Err(CoreError::BlankName(_))));
        assert_eq!(registry.find_by_name("Beitbridge").unwrap().id.as_str(), "BRD-BB");
    }

    #[test]
    fn test_update_keeps_position() {
        let registry = test_registry();
        let renamed = Location::new("DEP-HRE", "Harare Main Depot", -17.8292, 31.0522);
        registry.update(renamed).unwrap();

        let ids: Vec<String> = registry.list().into_iter().map(|l| l.id.0).collect();
        assert_eq!(ids[1], "DEP-HRE");
        assert_eq!(
            registry.get(&LocationId::new("DEP-HRE")).unwrap().name,
            "Harare Main Depot"
        );

        let missing = registry.update(Location::new("NOPE", "Nope", -17.0, 31.0));
        assert!(matches!(missing, Err(CoreError::LocationNotFound(_))));
    }

    #[test]
    fn test_soft_delete_hides_location() {
        let registry = test_registry();
        let id = LocationId::new("MKT-MBR");

        registry.remove(&id).unwrap();

        assert!(registry.get(&id).is_none());
        assert_eq!(registry.len(), 3);
        assert!(registry.find_by_name("Mbare").is_none());
        assert_ne!(
            registry.find_nearest(-17.8601, 31.0371).unwrap().location.id,
            id
        );
        assert!(registry.remove(&id).is_err());

        // still present in the backing catalog
        assert_eq!(registry.with_locations(|l| l.len()), 4);
    }

    #[test]
    fn test_update_does_not_revive_removed_location() {
        let registry = test_registry();
        let id = LocationId::new("MKT-MBR");
        registry.remove(&id).unwrap();

        let edited = Location::new("MKT-MBR", "Mbare Renamed", -17.8601, 31.0371);
        assert!(matches!(
            registry.update(edited),
            Err(CoreError::LocationNotFound(_))
        ));
        assert!(registry.get(&id).is_none());
        assert_eq!(registry.len(), 3);
        assert_eq!(
            registry.with_locations(|l| l.iter().find(|l| l.id == id).map(|l| l.name.clone())),
            Some("Mbare Musika Market".to_string())
        );
    }

    #[test]
    fn test_update_ignores_active_flag_in_payload() {
        let registry = test_registry();
        let mut edited = Location::new("DEP-HRE", "Harare Depot", -17.8292, 31.0522);
        edited.active = false;

        registry.update(edited).unwrap();
        assert!(registry.get(&LocationId::new("DEP-HRE")).is_some());
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_filters() {
        let registry = LocationRegistry::embedded().unwrap();

        let zambia = registry.by_country(Country::Zambia);
        assert!(!zambia.is_empty());
        assert!(zambia.iter().all(|l| l.country == Country::Zambia));

        let borders = registry.by_type(LocationType::Border);
        assert!(borders.iter().all(|l| l.location_type == LocationType::Border));
    }

    #[test]
    fn test_from_json_rejects_bad_catalog() {
        assert!(LocationRegistry::from_json("not json").is_err());

        let json = r#"[{ "id": "X", "name": "X", "latitude": 120.0, "longitude": 10.0 }]"#;
        assert!(matches!(
            LocationRegistry::from_json(json),
            Err(CoreError::InvalidPosition { .. })
        ));
    }
}
