use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// A geographic point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude, positive north.
    pub lat: f64,
    /// Longitude, positive east.
    pub lon: f64,
}

impl GeoPoint {
    /// Build a point from a latitude/longitude pair.
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Parse a `"<lat>,<lon>"` coordinate string into a [`GeoPoint`].
///
/// Whitespace around either component is tolerated. Fails on the wrong number
/// of components or non-numeric values; it does not range-check (see
/// [`validate_coordinates`] for that).
pub fn parse_coordinates(input: &str) -> Result<GeoPoint> {
    let mut parts = input.split(',');
    let (Some(lat), Some(lon), None) = (parts.next(), parts.next(), parts.next()) else {
        bail!("expected exactly one comma in coordinate string {input:?}");
    };

    let lat: f64 = lat.trim().parse()?;
    let lon: f64 = lon.trim().parse()?;

    if !lat.is_finite() || !lon.is_finite() {
        bail!("non-finite coordinate in {input:?}");
    }

    Ok(GeoPoint { lat, lon })
}

/// Check whether a coordinate string names a usable location.
///
/// True iff the string parses, latitude is within [-90, 90], longitude is
/// within [-180, 180], and the pair is not the `0,0` unset sentinel.
pub fn validate_coordinates(input: &str) -> bool {
    let Ok(point) = parse_coordinates(input) else {
        return false;
    };

    if !(-90.0..=90.0).contains(&point.lat) || !(-180.0..=180.0).contains(&point.lon) {
        return false;
    }

    // Null Island means "unset", not a real location.
    point.lat != 0.0 || point.lon != 0.0
}

/// Normalize a coordinate-shaped input into a canonical `"lat,lon"` string.
///
/// Returns `None` for anything that is not a bare coordinate pair, e.g. a
/// street address.
pub fn extract_coordinates(input: &str) -> Option<String> {
    let point = parse_coordinates(input).ok()?;
    Some(format!("{},{}", point.lat, point.lon))
}

/// An axis-aligned latitude/longitude box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Southern edge.
    pub min_lat: f64,
    /// Northern edge.
    pub max_lat: f64,
    /// Western edge.
    pub min_lon: f64,
    /// Eastern edge.
    pub max_lon: f64,
}

impl BoundingBox {
    /// The box spanning two points, independent of their order.
    pub fn spanning(a: GeoPoint, b: GeoPoint) -> Self {
        Self {
            min_lat: a.lat.min(b.lat),
            max_lat: a.lat.max(b.lat),
            min_lon: a.lon.min(b.lon),
            max_lon: a.lon.max(b.lon),
        }
    }

    /// Expand every side by `degrees`.
    pub fn padded(self, degrees: f64) -> Self {
        Self {
            min_lat: self.min_lat - degrees,
            max_lat: self.max_lat + degrees,
            min_lon: self.min_lon - degrees,
            max_lon: self.max_lon + degrees,
        }
    }

    /// Whether `point` lies within the box. Closed on the boundary.
    pub fn contains(&self, point: GeoPoint) -> bool {
        point.lat >= self.min_lat
            && point.lat <= self.max_lat
            && point.lon >= self.min_lon
            && point.lon <= self.max_lon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tolerates_whitespace() {
        let point = parse_coordinates(" 40.71 , -74.00 ").unwrap();
        assert_eq!(point, GeoPoint::new(40.71, -74.00));
    }

    #[test]
    fn test_parse_rejects_wrong_arity() {
        assert!(parse_coordinates("40.71").is_err());
        assert!(parse_coordinates("40.71,-74.00,12").is_err());
        assert!(parse_coordinates("").is_err());
    }

    #[test]
    fn test_validate_coordinates() {
        assert!(validate_coordinates("40.71,-74.00"));
        assert!(validate_coordinates("-90,180"));

        assert!(!validate_coordinates("0,0"));
        assert!(!validate_coordinates("200,10"));
        assert!(!validate_coordinates("10,200"));
        assert!(!validate_coordinates("not,numbers"));
        assert!(!validate_coordinates("NaN,0"));
    }

    #[test]
    fn test_extract_coordinates() {
        assert_eq!(
            extract_coordinates("40.71, -74.00").as_deref(),
            Some("40.71,-74")
        );
        assert_eq!(extract_coordinates("123 Main Street"), None);
    }

    #[test]
    fn test_spanning_is_order_independent() {
        let a = GeoPoint::new(40.71, -74.00);
        let b = GeoPoint::new(42.36, -71.06);
        assert_eq!(BoundingBox::spanning(a, b), BoundingBox::spanning(b, a));
    }

    #[test]
    fn test_contains_is_closed_on_the_boundary() {
        let bounds = BoundingBox::spanning(GeoPoint::new(10.0, 10.0), GeoPoint::new(11.0, 11.0));
        assert!(bounds.contains(GeoPoint::new(10.0, 10.5)));
        assert!(bounds.contains(GeoPoint::new(11.0, 11.0)));
        assert!(!bounds.contains(GeoPoint::new(9.999, 10.5)));
    }
}
