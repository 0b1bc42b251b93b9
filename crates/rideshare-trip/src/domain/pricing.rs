//! Route planning and fare estimation collaborators.
//!
//! The real route service and pricing arithmetic are external; these ports
//! and the default implementations below stand in for them.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use rideshare_core::error::DomainError;
use rideshare_core::geo::Coordinate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ride packages a rider can choose from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarPackage {
    /// Standard four-seat car.
    Sedan,
    /// Larger car.
    Suv,
    /// Six or more seats.
    Van,
    /// Premium car.
    Luxury,
}

impl CarPackage {
    /// Every package, in display order.
    pub const ALL: [Self; 4] = [Self::Sedan, Self::Suv, Self::Van, Self::Luxury];

    /// The wire slug.
    #[must_use]
    pub fn slug(self) -> &'static str {
        match self {
            Self::Sedan => "sedan",
            Self::Suv => "suv",
            Self::Van => "van",
            Self::Luxury => "luxury",
        }
    }

    /// Price multiplier relative to a sedan.
    #[must_use]
    pub fn multiplier(self) -> f64 {
        match self {
            Self::Sedan => 1.0,
            Self::Suv => 1.5,
            Self::Van => 1.8,
            Self::Luxury => 2.5,
        }
    }
}

impl fmt::Display for CarPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for CarPackage {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.slug() == s)
            .ok_or_else(|| DomainError::Validation(format!("unknown ride package {s:?}")))
    }
}

/// A planned route between two points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Length in meters.
    pub distance_meters: f64,
    /// Expected travel time in seconds.
    pub duration_seconds: f64,
    /// Polyline from pickup to destination.
    pub geometry: Vec<Coordinate>,
}

/// A priced offer for one ride package. Immutable once generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RideFare {
    /// Fare identifier.
    pub id: Uuid,
    /// Ride package slug.
    pub package_slug: String,
    /// Total price in the currency's minor unit.
    pub total_price_in_cents: i64,
    /// ISO 4217 currency code, lowercase.
    pub currency: String,
}

/// Plans a route between two coordinates.
#[async_trait]
pub trait RoutePlanner: Send + Sync {
    /// Returns the route from `pickup` to `destination`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Dependency` if the route service is unavailable.
    async fn plan(&self, pickup: &Coordinate, destination: &Coordinate)
    -> Result<Route, DomainError>;
}

/// Prices every ride package for a route.
pub trait FareEstimator: Send + Sync {
    /// Returns one fare per available package.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Dependency` if pricing is unavailable.
    fn estimate(&self, route: &Route) -> Result<Vec<RideFare>, DomainError>;
}

/// A straight line at a constant urban speed.
#[derive(Debug, Clone, Copy)]
pub struct StraightLineRoutePlanner {
    speed_meters_per_second: f64,
}

impl StraightLineRoutePlanner {
    /// Plans at `speed_kmh` kilometers per hour.
    #[must_use]
    pub fn new(speed_kmh: f64) -> Self {
        Self {
            speed_meters_per_second: speed_kmh * 1000.0 / 3600.0,
        }
    }
}

impl Default for StraightLineRoutePlanner {
    fn default() -> Self {
        Self::new(40.0)
    }
}

#[async_trait]
impl RoutePlanner for StraightLineRoutePlanner {
    async fn plan(
        &self,
        pickup: &Coordinate,
        destination: &Coordinate,
    ) -> Result<Route, DomainError> {
        pickup.validate()?;
        destination.validate()?;
        let distance_meters = pickup.distance_meters(destination);
        Ok(Route {
            distance_meters,
            duration_seconds: distance_meters / self.speed_meters_per_second,
            geometry: vec![*pickup, *destination],
        })
    }
}

/// Distance-and-time pricing scaled by the package multiplier.
#[derive(Debug, Clone)]
pub struct PackageFareEstimator {
    /// Cents per kilometer for a sedan.
    pub cents_per_km: f64,
    /// Cents per minute for a sedan.
    pub cents_per_minute: f64,
    /// Currency of every fare.
    pub currency: String,
}

impl Default for PackageFareEstimator {
    fn default() -> Self {
        Self {
            cents_per_km: 150.0,
            cents_per_minute: 25.0,
            currency: "usd".to_owned(),
        }
    }
}

impl FareEstimator for PackageFareEstimator {
    #[allow(clippy::cast_possible_truncation)]
    fn estimate(&self, route: &Route) -> Result<Vec<RideFare>, DomainError> {
        let base = route.distance_meters / 1000.0 * self.cents_per_km
            + route.duration_seconds / 60.0 * self.cents_per_minute;
        if !base.is_finite() || base < 0.0 {
            return Err(DomainError::Validation(format!(
                "route cannot be priced: {base}"
            )));
        }

        Ok(CarPackage::ALL
            .into_iter()
            .map(|package| RideFare {
                id: Uuid::new_v4(),
                package_slug: package.slug().to_owned(),
                total_price_in_cents: (base * package.multiplier()).round().max(1.0) as i64,
                currency: self.currency.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sf_route_points() -> (Coordinate, Coordinate) {
        (
            Coordinate::new(37.77, -122.41).unwrap(),
            Coordinate::new(37.78, -122.42).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_straight_line_route_connects_endpoints() {
        // Arrange
        let (pickup, destination) = sf_route_points();
        let planner = StraightLineRoutePlanner::default();

        // Act
        let route = planner.plan(&pickup, &destination).await.unwrap();

        // Assert
        assert_eq!(route.geometry, vec![pickup, destination]);
        assert!(route.distance_meters > 1000.0 && route.distance_meters < 2000.0);
        assert!(route.duration_seconds > 0.0);
    }

    #[tokio::test]
    async fn test_route_rejects_out_of_range_coordinates() {
        let planner = StraightLineRoutePlanner::default();
        let bad = Coordinate {
            latitude: 120.0,
            longitude: 0.0,
        };

        let result = planner.plan(&bad, &bad).await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_estimator_prices_every_package_in_multiplier_order() {
        // Arrange
        let route = Route {
            distance_meters: 10_000.0,
            duration_seconds: 900.0,
            geometry: vec![],
        };

        // Act
        let fares = PackageFareEstimator::default().estimate(&route).unwrap();

        // Assert
        let slugs: Vec<&str> = fares.iter().map(|f| f.package_slug.as_str()).collect();
        assert_eq!(slugs, ["sedan", "suv", "van", "luxury"]);
        // 10 km * 150 + 15 min * 25 = 1875
        assert_eq!(fares[0].total_price_in_cents, 1875);
        assert_eq!(fares[3].total_price_in_cents, 4688);
        assert!(fares.iter().all(|f| f.currency == "usd"));
    }

    #[test]
    fn test_package_parses_from_slug() {
        assert_eq!("suv".parse::<CarPackage>().unwrap(), CarPackage::Suv);
        assert!("rickshaw".parse::<CarPackage>().is_err());
    }
}
