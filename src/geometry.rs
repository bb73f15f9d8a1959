use crate::error::{PowerError, Result};

/// The coordinate reference system accepted by the POWER API.
pub const WGS84: &str = "EPSG:4326";

/// Normalized geographic input for a query: a single point or a
/// rectangular region, with its CRS tag.
///
/// Construct values through [`point`] and [`bbox`]; both validate the raw
/// coordinates so that a `Geometry` is well-formed by the time a request is
/// assembled.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point {
        lon: f64,
        lat: f64,
        crs: String,
    },
    BoundingBox {
        lon_min: f64,
        lon_max: f64,
        lat_min: f64,
        lat_max: f64,
        crs: String,
    },
}

impl Geometry {
    /// The CRS tag the geometry was built with.
    pub fn crs(&self) -> &str {
        match self {
            Geometry::Point { crs, .. } => crs,
            Geometry::BoundingBox { crs, .. } => crs,
        }
    }

    pub fn is_point(&self) -> bool {
        matches!(self, Geometry::Point { .. })
    }

    pub fn is_bounding_box(&self) -> bool {
        matches!(self, Geometry::BoundingBox { .. })
    }
}

/// Builds a point geometry from a longitude (`x`) and latitude (`y`).
///
/// The POWER service works on geographic coordinates, so only `EPSG:4326`
/// is accepted; reproject beforehand if your coordinates live in another
/// system.
pub fn point(x: f64, y: f64, crs: &str) -> Result<Geometry> {
    check_crs(crs)?;
    check_lon("x", x)?;
    check_lat("y", y)?;

    Ok(Geometry::Point {
        lon: x,
        lat: y,
        crs: crs.to_string(),
    })
}

/// Builds a bounding-box geometry from minimum and maximum longitudes
/// (`x_min`, `x_max`) and latitudes (`y_min`, `y_max`).
///
/// Bounds must be strictly ordered: `x_min < x_max` and `y_min < y_max`.
pub fn bbox(x_min: f64, x_max: f64, y_min: f64, y_max: f64, crs: &str) -> Result<Geometry> {
    check_crs(crs)?;
    check_lon("x_min", x_min)?;
    check_lon("x_max", x_max)?;
    check_lat("y_min", y_min)?;
    check_lat("y_max", y_max)?;

    if x_min >= x_max {
        return Err(PowerError::validation(format!(
            "x_min ({x_min}) must be smaller than x_max ({x_max})"
        )));
    }
    if y_min >= y_max {
        return Err(PowerError::validation(format!(
            "y_min ({y_min}) must be smaller than y_max ({y_max})"
        )));
    }

    Ok(Geometry::BoundingBox {
        lon_min: x_min,
        lon_max: x_max,
        lat_min: y_min,
        lat_max: y_max,
        crs: crs.to_string(),
    })
}

fn check_crs(crs: &str) -> Result<()> {
    if !crs.starts_with("EPSG:") {
        return Err(PowerError::validation(
            "crs must be an EPSG code such as EPSG:4326; see spatialreference.org",
        ));
    }
    if crs != WGS84 {
        return Err(PowerError::validation(format!(
            "only {WGS84} is supported; reproject your coordinates first"
        )));
    }
    Ok(())
}

fn check_lon(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || !(-180.0..=180.0).contains(&value) {
        return Err(PowerError::validation(format!(
            "{name} ({value}) must be a longitude between -180 and 180 degrees"
        )));
    }
    Ok(())
}

fn check_lat(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || !(-90.0..=90.0).contains(&value) {
        return Err(PowerError::validation(format!(
            "{name} ({value}) must be a latitude between -90 and 90 degrees"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_accepts_valid_coordinates() {
        let g = point(23.727539, 37.983810, WGS84).unwrap();
        assert!(g.is_point());
        assert_eq!(g.crs(), WGS84);
    }

    #[test]
    fn point_rejects_out_of_range_latitude() {
        assert!(matches!(
            point(0.0, 90.5, WGS84),
            Err(PowerError::Validation(_))
        ));
        assert!(matches!(
            point(-181.0, 0.0, WGS84),
            Err(PowerError::Validation(_))
        ));
    }

    #[test]
    fn point_rejects_non_finite_coordinates() {
        assert!(matches!(
            point(f64::NAN, 0.0, WGS84),
            Err(PowerError::Validation(_))
        ));
    }

    #[test]
    fn crs_must_be_wgs84() {
        assert!(matches!(
            point(23.7, 37.9, "EPSG:3857"),
            Err(PowerError::Validation(_))
        ));
        assert!(matches!(
            point(23.7, 37.9, "4326"),
            Err(PowerError::Validation(_))
        ));
    }

    #[test]
    fn bbox_accepts_ordered_bounds() {
        let g = bbox(23.0, 25.0, 37.0, 39.0, WGS84).unwrap();
        assert!(g.is_bounding_box());
    }

    #[test]
    fn bbox_rejects_inverted_bounds() {
        assert!(matches!(
            bbox(25.0, 23.0, 37.0, 39.0, WGS84),
            Err(PowerError::Validation(_))
        ));
        assert!(matches!(
            bbox(23.0, 25.0, 39.0, 37.0, WGS84),
            Err(PowerError::Validation(_))
        ));
    }

    #[test]
    fn bbox_rejects_degenerate_bounds() {
        assert!(matches!(
            bbox(23.0, 23.0, 37.0, 39.0, WGS84),
            Err(PowerError::Validation(_))
        ));
    }
}
