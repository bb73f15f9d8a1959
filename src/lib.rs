//! A small Rust client for the NASA POWER meteorological data API.
//!
//! This crate implements a `pynasapower`-style flow:
//! build a query from a geometry and a date range, issue one HTTP GET
//! against the POWER temporal endpoint family, and decode the payload into
//! an in-memory table or a local file. Daily tables can additionally be
//! reshaped into the column/unit convention crop-growth simulation tools
//! expect (see [`agromodel`]).
//!
//! ## Quick start
//! - No authentication is needed; the base URL can be overridden via
//!   `NASAPOWER_URL` or a `.nasapowerrc` file (supported in the current
//!   directory and in your home directory).
//! - Call [`Client::retrieve`] with a [`PowerQuery`].
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use nasapower::{Client, OutputFormat, PowerQuery, TemporalApi, geometry};
//!
//! fn main() -> Result<(), nasapower::PowerError> {
//!     let client = Client::from_env()?;
//!     let athens = geometry::point(23.727539, 37.983810, "EPSG:4326")?;
//!     let query = PowerQuery::new(
//!         athens,
//!         NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
//!         NaiveDate::from_ymd_opt(2022, 2, 1).unwrap(),
//!     )
//!     .with_temporal_api(TemporalApi::Daily)
//!     .with_format(OutputFormat::Csv);
//!
//!     let data = client.retrieve(&query, Some(std::path::Path::new("./data")))?;
//!     println!("{} rows", data.table().map_or(0, |t| t.len()));
//!     Ok(())
//! }
//! ```
//!
//! For full usage and configuration details, see the crate README.

#![forbid(unsafe_code)]

pub mod agromodel;
mod client;
mod config;
mod data;
mod error;
pub mod geometry;
mod query;

pub use client::{Client, ClientConfig, PowerResponse};
pub use config::DEFAULT_URL;
pub use data::{Datum, FILL_VALUE, MetadataHeader, MeteoTable, PowerData, parse, persist};
pub use error::{PowerError, Result};
pub use geometry::Geometry;
pub use query::{
    Community, DEFAULT_PARAMETERS, OutputFormat, PowerQuery, PowerRequest, SpatialApi, TemporalApi,
};
