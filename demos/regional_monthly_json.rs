use anyhow::Result;
use chrono::NaiveDate;
use nasapower::{Client, OutputFormat, PowerQuery, SpatialApi, TemporalApi, geometry};
use std::path::Path;

fn main() -> Result<()> {
    let client = Client::from_env()?;

    // Monthly series over a 2x2 degree box around Attica.
    let region = geometry::bbox(23.0, 25.0, 37.0, 39.0, "EPSG:4326")?;
    let query = PowerQuery::new(
        region,
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2022, 12, 31).unwrap(),
    )
    .with_temporal_api(TemporalApi::Monthly)
    .with_spatial_api(SpatialApi::Regional)
    .with_format(OutputFormat::Json);

    let data = client.retrieve(&query, Some(Path::new("./data")))?;
    if let Some(metadata) = data.metadata() {
        println!("title: {:?}", metadata.title);
    }

    Ok(())
}
