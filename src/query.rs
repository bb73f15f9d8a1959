use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::str::FromStr;

use crate::error::{PowerError, Result};
use crate::geometry::Geometry;

/// Variables requested when the caller does not name any.
pub const DEFAULT_PARAMETERS: [&str; 8] = [
    "TOA_SW_DWN",
    "ALLSKY_SFC_SW_DWN",
    "T2M",
    "T2M_MIN",
    "T2M_MAX",
    "T2MDEW",
    "WS2M",
    "PRECTOTCORR",
];

/// Maximum number of variables per hourly submission.
const MAX_PARAMETERS_HOURLY: usize = 15;
/// Maximum number of variables per daily/monthly/climatology submission.
const MAX_PARAMETERS: usize = 20;

/// Minimum bounding-box span, in degrees, accepted by the regional endpoint.
const MIN_REGIONAL_SPAN_DEG: f64 = 2.0;

/// POWER community, i.e. the domain-specific variable bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Community {
    Agroclimatology,
    SustainableBuildings,
    RenewableEnergy,
}

impl Community {
    /// Wire code used in the query string.
    pub fn code(self) -> &'static str {
        match self {
            Community::Agroclimatology => "ag",
            Community::SustainableBuildings => "sb",
            Community::RenewableEnergy => "re",
        }
    }
}

impl fmt::Display for Community {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Community {
    type Err = PowerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ag" | "agroclimatology" => Ok(Community::Agroclimatology),
            "sb" | "sustainable-buildings" => Ok(Community::SustainableBuildings),
            "re" | "renewable-energy" => Ok(Community::RenewableEnergy),
            other => Err(PowerError::validation(format!(
                "community must be one of: ag, sb, re (got {other:?})"
            ))),
        }
    }
}

/// Temporal aggregation level of the requested series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalApi {
    Daily,
    Hourly,
    Monthly,
    Climatology,
}

impl TemporalApi {
    /// Path segment of the endpoint family.
    pub fn as_str(self) -> &'static str {
        match self {
            TemporalApi::Daily => "daily",
            TemporalApi::Hourly => "hourly",
            TemporalApi::Monthly => "monthly",
            TemporalApi::Climatology => "climatology",
        }
    }

    /// Monthly and climatology series are requested per calendar year.
    fn uses_year_dates(self) -> bool {
        matches!(self, TemporalApi::Monthly | TemporalApi::Climatology)
    }
}

impl fmt::Display for TemporalApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemporalApi {
    type Err = PowerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "daily" => Ok(TemporalApi::Daily),
            "hourly" => Ok(TemporalApi::Hourly),
            "monthly" => Ok(TemporalApi::Monthly),
            "climatology" => Ok(TemporalApi::Climatology),
            other => Err(PowerError::validation(format!(
                "temporal_api must be one of: daily, hourly, monthly, climatology (got {other:?})"
            ))),
        }
    }
}

/// Spatial mode of the query: a single grid cell or a rectangular region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialApi {
    Point,
    Regional,
}

impl SpatialApi {
    pub fn as_str(self) -> &'static str {
        match self {
            SpatialApi::Point => "point",
            SpatialApi::Regional => "regional",
        }
    }
}

impl fmt::Display for SpatialApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpatialApi {
    type Err = PowerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "point" => Ok(SpatialApi::Point),
            "regional" => Ok(SpatialApi::Regional),
            other => Err(PowerError::validation(format!(
                "spatial_api must be one of: point, regional (got {other:?})"
            ))),
        }
    }
}

/// Payload format requested from the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Json,
    Netcdf,
    Ascii,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
            OutputFormat::Netcdf => "netcdf",
            OutputFormat::Ascii => "ascii",
        }
    }

    /// Conventional file extension for persisted payloads.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
            OutputFormat::Netcdf => "nc",
            OutputFormat::Ascii => "txt",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = PowerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            "netcdf" => Ok(OutputFormat::Netcdf),
            "ascii" => Ok(OutputFormat::Ascii),
            other => Err(PowerError::validation(format!(
                "format must be one of: csv, json, netcdf, ascii (got {other:?})"
            ))),
        }
    }
}

/// One POWER query, fully enumerated.
///
/// The optional knobs carry the same defaults as the service documentation:
/// community `ag`, hourly resolution, point mode, csv payload, and the
/// [`DEFAULT_PARAMETERS`] variable set when `parameters` is left empty.
#[derive(Debug, Clone)]
pub struct PowerQuery {
    pub geometry: Geometry,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub community: Community,
    pub parameters: Vec<String>,
    pub temporal_api: TemporalApi,
    pub spatial_api: SpatialApi,
    pub format: OutputFormat,
}

impl PowerQuery {
    pub fn new(geometry: Geometry, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            geometry,
            start,
            end,
            community: Community::Agroclimatology,
            parameters: Vec::new(),
            temporal_api: TemporalApi::Hourly,
            spatial_api: SpatialApi::Point,
            format: OutputFormat::Csv,
        }
    }

    pub fn with_community(mut self, community: Community) -> Self {
        self.community = community;
        self
    }

    pub fn with_parameters<I, S>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters = parameters.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_temporal_api(mut self, temporal_api: TemporalApi) -> Self {
        self.temporal_api = temporal_api;
        self
    }

    pub fn with_spatial_api(mut self, spatial_api: SpatialApi) -> Self {
        self.spatial_api = spatial_api;
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// The variable list actually submitted: the caller's, or the default
    /// set when none were given.
    pub fn resolved_parameters(&self) -> Vec<String> {
        if self.parameters.is_empty() {
            DEFAULT_PARAMETERS.iter().map(|p| p.to_string()).collect()
        } else {
            self.parameters.clone()
        }
    }

    /// Checks every cross-field constraint the service enforces, so that a
    /// bad query fails here instead of with an opaque remote error.
    pub fn validate(&self) -> Result<()> {
        match self.spatial_api {
            SpatialApi::Point => {
                if !self.geometry.is_point() {
                    return Err(PowerError::configuration(
                        "spatial_api is point but the geometry is a bounding box; \
                         build it with geometry::point",
                    ));
                }
            }
            SpatialApi::Regional => {
                if !self.geometry.is_bounding_box() {
                    return Err(PowerError::configuration(
                        "spatial_api is regional but the geometry is a point; \
                         build it with geometry::bbox",
                    ));
                }
            }
        }

        if self.temporal_api == TemporalApi::Hourly && self.spatial_api != SpatialApi::Point {
            return Err(PowerError::configuration(
                "hourly resolution is only served for point queries",
            ));
        }

        let count = if self.parameters.is_empty() {
            DEFAULT_PARAMETERS.len()
        } else {
            self.parameters.len()
        };
        let max = match self.temporal_api {
            TemporalApi::Hourly => MAX_PARAMETERS_HOURLY,
            _ => MAX_PARAMETERS,
        };
        if count > max {
            return Err(PowerError::validation(format!(
                "a maximum of {max} parameters can be requested in one {} submission (got {count})",
                self.temporal_api
            )));
        }

        if self.start > self.end {
            return Err(PowerError::validation(format!(
                "start ({}) cannot be later than end ({})",
                self.start, self.end
            )));
        }

        if self.temporal_api == TemporalApi::Climatology
            && self.end.year() - self.start.year() < 2
        {
            return Err(PowerError::validation(
                "a climatology needs a range of at least two calendar years",
            ));
        }

        if let Geometry::BoundingBox {
            lon_min,
            lon_max,
            lat_min,
            lat_max,
            ..
        } = &self.geometry
        {
            if self.spatial_api == SpatialApi::Regional {
                if lat_max - lat_min < MIN_REGIONAL_SPAN_DEG {
                    return Err(PowerError::validation(format!(
                        "regional queries need at least a {MIN_REGIONAL_SPAN_DEG} degree \
                         latitude range; use the point endpoint otherwise"
                    )));
                }
                if lon_max - lon_min < MIN_REGIONAL_SPAN_DEG {
                    return Err(PowerError::validation(format!(
                        "regional queries need at least a {MIN_REGIONAL_SPAN_DEG} degree \
                         longitude range; use the point endpoint otherwise"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Validates the query and assembles the request descriptor against the
    /// given API base URL.
    pub fn build_request(&self, base_url: &str) -> Result<PowerRequest> {
        self.validate()?;

        let url = format!(
            "{}/temporal/{}/{}",
            base_url.trim_end_matches('/'),
            self.temporal_api,
            self.spatial_api
        );

        let (start, end) = if self.temporal_api.uses_year_dates() {
            (
                self.start.format("%Y").to_string(),
                self.end.format("%Y").to_string(),
            )
        } else {
            (
                self.start.format("%Y%m%d").to_string(),
                self.end.format("%Y%m%d").to_string(),
            )
        };

        let mut params = vec![
            ("parameters".to_string(), self.resolved_parameters().join(",")),
            ("community".to_string(), self.community.code().to_string()),
            ("start".to_string(), start),
            ("end".to_string(), end),
            ("format".to_string(), self.format.to_string()),
        ];

        match &self.geometry {
            Geometry::Point { lon, lat, .. } => {
                params.push(("latitude".to_string(), lat.to_string()));
                params.push(("longitude".to_string(), lon.to_string()));
            }
            Geometry::BoundingBox {
                lon_min,
                lon_max,
                lat_min,
                lat_max,
                ..
            } => {
                params.push(("latitude-min".to_string(), lat_min.to_string()));
                params.push(("latitude-max".to_string(), lat_max.to_string()));
                params.push(("longitude-min".to_string(), lon_min.to_string()));
                params.push(("longitude-max".to_string(), lon_max.to_string()));
            }
        }

        Ok(PowerRequest {
            url,
            params,
            format: self.format,
        })
    }
}

/// A fully-formed request descriptor: endpoint URL plus ordered query pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerRequest {
    /// Endpoint URL without the query string.
    pub url: String,
    /// Query pairs in submission order.
    pub params: Vec<(String, String)>,
    /// Payload format the request asks for.
    pub format: OutputFormat,
}

impl PowerRequest {
    /// The request rendered as a single URL, for logs and error messages.
    /// Values are plain enough that no percent-escaping is needed.
    pub fn full_url(&self) -> String {
        let query = self
            .params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.url, query)
    }
}
