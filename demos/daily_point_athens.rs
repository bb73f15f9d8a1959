use anyhow::Result;
use chrono::NaiveDate;
use nasapower::{Client, OutputFormat, PowerQuery, TemporalApi, agromodel, geometry};
use std::path::Path;

fn main() -> Result<()> {
    // Example program that calls the library API.
    // The base URL can be overridden via env vars or a `.nasapowerrc` file.
    let client = Client::from_env()?;

    let athens = geometry::point(23.727539, 37.983810, "EPSG:4326")?;
    let query = PowerQuery::new(
        athens,
        NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2022, 2, 1).unwrap(),
    )
    .with_temporal_api(TemporalApi::Daily)
    .with_format(OutputFormat::Csv);

    let data = client.retrieve(&query, Some(Path::new("./data")))?;

    if let Some(table) = data.table() {
        println!("retrieved {} daily rows", table.len());
        let pcse = agromodel::to_agromodel_format(table)?;
        println!("agromodel columns: {}", pcse.columns.join(", "));
    }

    Ok(())
}
