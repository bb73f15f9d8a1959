//! Reshaping of daily POWER tables into the column/unit convention expected
//! by crop-growth simulation tools (PCSE-style weather tables), plus the
//! agro-science helpers that feed it.

use log::warn;

use crate::data::{Datum, FILL_VALUE, MeteoTable};
use crate::error::{PowerError, Result};

/// Column layout of an agromodel table.
pub const AGROMODEL_COLUMNS: [&str; 8] = [
    "DAY", "IRRAD", "TMIN", "TMAX", "VAP", "WIND", "RAIN", "SNOWDEPTH",
];

/// Snow depth is not served by POWER; crop models expect this sentinel.
pub const SNOWDEPTH_MISSING: f64 = -9999.0;

/// Fallback Angstrom coefficients.
pub const ANGSTROM_A_DEFAULT: f64 = 0.29;
pub const ANGSTROM_B_DEFAULT: f64 = 0.49;

/// Days of data below which no Angstrom estimate is attempted.
const ANGSTROM_MIN_DAYS: usize = 200;

/// Converts a daily table into the agromodel layout.
///
/// Column mapping and unit conversions:
/// - `DAY`   — ISO date from the table's date key
/// - `IRRAD` — `ALLSKY_SFC_SW_DWN`, MJ/m²/day → kJ/m²/day
/// - `TMIN`  — `T2M_MIN` (°C)
/// - `TMAX`  — `T2M_MAX` (°C)
/// - `VAP`   — saturation vapour pressure at `T2MDEW` (kPa)
/// - `WIND`  — `WS2M` (m/s; POWER already reports wind at 2 m)
/// - `RAIN`  — `PRECTOTCORR` (falling back to the older `PRECTOT` code, mm)
/// - `SNOWDEPTH` — constant [`SNOWDEPTH_MISSING`]
///
/// `-999` sentinel cells pass through unconverted. The function is pure and
/// idempotent: a table already in agromodel layout is returned unchanged.
pub fn to_agromodel_format(table: &MeteoTable) -> Result<MeteoTable> {
    if table.column_index("DAY").is_some() && table.column_index("IRRAD").is_some() {
        return Ok(table.clone());
    }

    if table.column_index("HR").is_some() {
        return Err(PowerError::validation(
            "agromodel tables are daily; got an hourly table",
        ));
    }

    let dates = table.dates()?;
    let irrad = table.column_f64("ALLSKY_SFC_SW_DWN")?;
    let tmin = table.column_f64("T2M_MIN")?;
    let tmax = table.column_f64("T2M_MAX")?;
    let tdew = table.column_f64("T2MDEW")?;
    let wind = table.column_f64("WS2M")?;
    let rain = table
        .column_f64("PRECTOTCORR")
        .or_else(|_| table.column_f64("PRECTOT"))?;

    let mut rows = Vec::with_capacity(table.len());
    for i in 0..table.len() {
        let vap = if tdew[i] == FILL_VALUE {
            FILL_VALUE
        } else {
            ea_from_tdew(tdew[i])?
        };

        rows.push(vec![
            Datum::Text(dates[i].format("%Y-%m-%d").to_string()),
            Datum::Float(convert(irrad[i], mj_to_kj)),
            Datum::Float(tmin[i]),
            Datum::Float(tmax[i]),
            Datum::Float(vap),
            Datum::Float(wind[i]),
            Datum::Float(rain[i]),
            Datum::Float(SNOWDEPTH_MISSING),
        ]);
    }

    Ok(MeteoTable {
        columns: AGROMODEL_COLUMNS.iter().map(|c| c.to_string()).collect(),
        rows,
    })
}

fn convert(value: f64, f: impl Fn(f64) -> f64) -> f64 {
    if value == FILL_VALUE { value } else { f(value) }
}

fn mj_to_kj(x: f64) -> f64 {
    x * 1000.0
}

/// Actual vapour pressure ea [kPa] from the dewpoint temperature [°C],
/// FAO-56 equation 14. The saturation vapour pressure at the dewpoint is
/// the actual vapour pressure of the air.
pub fn ea_from_tdew(tdew: f64) -> Result<f64> {
    if !(-95.0..=65.0).contains(&tdew) {
        return Err(PowerError::validation(format!(
            "tdew={tdew} is not in range -95 to +65 deg C"
        )));
    }

    let tmp = (17.27 * tdew) / (tdew + 237.3);
    Ok(0.6108 * tmp.exp())
}

/// Estimates Angstrom A/B coefficients from the surface/top-of-atmosphere
/// radiation ratio: the 5th percentile of the ratio approaches the lower
/// envelope (A), the 98th percentile approaches A+B.
///
/// Falls back to ([`ANGSTROM_A_DEFAULT`], [`ANGSTROM_B_DEFAULT`]) when
/// fewer than 200 days of usable data are available or the estimate lands
/// outside the documented plausibility bounds.
pub fn estimate_angstrom(table: &MeteoTable) -> (f64, f64) {
    let defaults = (ANGSTROM_A_DEFAULT, ANGSTROM_B_DEFAULT);

    let surface = match table.column_f64("ALLSKY_SFC_SW_DWN") {
        Ok(v) => v,
        Err(_) => {
            warn!("no surface radiation column; using default Angstrom coefficients");
            return defaults;
        }
    };
    let toa = match table
        .column_f64("TOA_SW_DWN")
        .or_else(|_| table.column_f64("ALLSKY_TOA_SW_DWN"))
    {
        Ok(v) => v,
        Err(_) => {
            warn!("no top-of-atmosphere radiation column; using default Angstrom coefficients");
            return defaults;
        }
    };

    let ratios: Vec<f64> = surface
        .iter()
        .zip(&toa)
        .filter(|(s, t)| **s != FILL_VALUE && **t != FILL_VALUE && **t != 0.0)
        .map(|(s, t)| s / t)
        .collect();

    if ratios.len() < ANGSTROM_MIN_DAYS {
        warn!(
            "only {} days of radiation data (need {ANGSTROM_MIN_DAYS}); \
             using default Angstrom coefficients",
            ratios.len()
        );
        return defaults;
    }

    let a = percentile(&ratios, 5.0);
    let ab = percentile(&ratios, 98.0);
    let b = ab - a;

    match check_angstrom_ab(a, b) {
        Ok(checked) => checked,
        Err(_) => {
            warn!(
                "estimated Angstrom coefficients ({a:.3}, {b:.3}) are out of range; \
                 using defaults"
            );
            defaults
        }
    }
}

/// Validates Angstrom coefficients against the plausible physical ranges.
pub fn check_angstrom_ab(a: f64, b: f64) -> Result<(f64, f64)> {
    const MIN_A: f64 = 0.1;
    const MAX_A: f64 = 0.4;
    const MIN_B: f64 = 0.3;
    const MAX_B: f64 = 0.7;
    const MIN_SUM_AB: f64 = 0.6;
    const MAX_SUM_AB: f64 = 0.9;

    let a = a.abs();
    let b = b.abs();
    if !(MIN_A..=MAX_A).contains(&a) {
        return Err(PowerError::validation("out of range Angstrom A value"));
    }
    if !(MIN_B..=MAX_B).contains(&b) {
        return Err(PowerError::validation("out of range Angstrom B value"));
    }
    let sum = a + b;
    if !(MIN_SUM_AB..=MAX_SUM_AB).contains(&sum) {
        return Err(PowerError::validation(
            "out of range sum of Angstrom A and B values",
        ));
    }

    Ok((a, b))
}

/// Linear-interpolation percentile over unsorted data.
fn percentile(values: &[f64], p: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;

    fn daily_table(rows: &[(i32, u32, u32, f64, f64, f64, f64, f64, f64)]) -> MeteoTable {
        MeteoTable {
            columns: [
                "YEAR",
                "MO",
                "DY",
                "ALLSKY_SFC_SW_DWN",
                "T2M_MIN",
                "T2M_MAX",
                "T2MDEW",
                "WS2M",
                "PRECTOTCORR",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
            rows: rows
                .iter()
                .map(|&(y, m, d, irrad, tmin, tmax, tdew, wind, rain)| {
                    vec![
                        Datum::Float(y as f64),
                        Datum::Float(m as f64),
                        Datum::Float(d as f64),
                        Datum::Float(irrad),
                        Datum::Float(tmin),
                        Datum::Float(tmax),
                        Datum::Float(tdew),
                        Datum::Float(wind),
                        Datum::Float(rain),
                    ]
                })
                .collect(),
        }
    }

    #[test]
    fn converts_daily_table_to_agromodel_layout() {
        let table = daily_table(&[(2022, 1, 1, 10.0, 4.2, 12.8, 3.0, 2.5, 0.4)]);
        let converted = to_agromodel_format(&table).unwrap();

        assert_eq!(converted.columns, AGROMODEL_COLUMNS);
        assert_eq!(converted.rows[0][0], Datum::Text("2022-01-01".to_string()));
        // MJ/m2/day -> kJ/m2/day
        assert_eq!(converted.rows[0][1], Datum::Float(10_000.0));
        assert_eq!(converted.rows[0][2], Datum::Float(4.2));
        assert_eq!(converted.rows[0][3], Datum::Float(12.8));
        let vap = converted.rows[0][4].as_f64().unwrap();
        assert!((vap - ea_from_tdew(3.0).unwrap()).abs() < 1e-12);
        assert_eq!(converted.rows[0][7], Datum::Float(SNOWDEPTH_MISSING));
    }

    #[test]
    fn conversion_is_idempotent() {
        let table = daily_table(&[
            (2022, 1, 1, 10.0, 4.2, 12.8, 3.0, 2.5, 0.4),
            (2022, 1, 2, 11.5, 5.0, 13.1, 2.2, 3.0, 0.0),
        ]);
        let once = to_agromodel_format(&table).unwrap();
        let twice = to_agromodel_format(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn sentinel_values_pass_through_unconverted() {
        let table = daily_table(&[(2022, 1, 1, FILL_VALUE, 4.2, 12.8, FILL_VALUE, 2.5, 0.4)]);
        let converted = to_agromodel_format(&table).unwrap();
        assert_eq!(converted.rows[0][1], Datum::Float(FILL_VALUE));
        assert_eq!(converted.rows[0][4], Datum::Float(FILL_VALUE));
    }

    #[test]
    fn legacy_rain_code_is_accepted() {
        let mut table = daily_table(&[(2022, 1, 1, 10.0, 4.2, 12.8, 3.0, 2.5, 0.4)]);
        let idx = table.column_index("PRECTOTCORR").unwrap();
        table.columns[idx] = "PRECTOT".to_string();
        assert!(to_agromodel_format(&table).is_ok());
    }

    #[test]
    fn missing_source_column_is_a_validation_error() {
        let mut table = daily_table(&[(2022, 1, 1, 10.0, 4.2, 12.8, 3.0, 2.5, 0.4)]);
        table.columns.retain(|c| c != "T2MDEW");
        table.rows[0].remove(6);
        assert!(matches!(
            to_agromodel_format(&table),
            Err(PowerError::Validation(_))
        ));
    }

    #[test]
    fn hourly_tables_are_rejected() {
        let table = MeteoTable {
            columns: vec!["YEAR".into(), "MO".into(), "DY".into(), "HR".into()],
            rows: vec![],
        };
        assert!(matches!(
            to_agromodel_format(&table),
            Err(PowerError::Validation(_))
        ));
    }

    #[test]
    fn vapour_pressure_matches_fao_worked_example() {
        let ea = ea_from_tdew(17.0).unwrap();
        assert!((ea - 1.938).abs() < 1e-3, "got {ea}");
    }

    #[test]
    fn vapour_pressure_rejects_implausible_dewpoints() {
        assert!(matches!(
            ea_from_tdew(-100.0),
            Err(PowerError::Validation(_))
        ));
        assert!(matches!(ea_from_tdew(70.0), Err(PowerError::Validation(_))));
    }

    fn radiation_table(ratios: impl Iterator<Item = f64>) -> MeteoTable {
        const TOA: f64 = 30.0;
        MeteoTable {
            columns: vec!["ALLSKY_SFC_SW_DWN".into(), "TOA_SW_DWN".into()],
            rows: ratios
                .map(|r| vec![Datum::Float(TOA * r), Datum::Float(TOA)])
                .collect(),
        }
    }

    #[test]
    fn angstrom_estimate_tracks_the_ratio_envelope() {
        let n = 250;
        let table =
            radiation_table((0..n).map(|i| 0.25 + 0.5 * i as f64 / (n - 1) as f64));
        let (a, b) = estimate_angstrom(&table);
        assert!((a - 0.275).abs() < 0.01, "got a={a}");
        assert!((b - 0.465).abs() < 0.01, "got b={b}");
    }

    #[test]
    fn angstrom_falls_back_on_short_series() {
        let table = radiation_table((0..10).map(|_| 0.5));
        assert_eq!(
            estimate_angstrom(&table),
            (ANGSTROM_A_DEFAULT, ANGSTROM_B_DEFAULT)
        );
    }

    #[test]
    fn angstrom_falls_back_on_implausible_estimates() {
        // Constant ratio: A = 0.9, B = 0 -> out of range.
        let table = radiation_table((0..250).map(|_| 0.9));
        assert_eq!(
            estimate_angstrom(&table),
            (ANGSTROM_A_DEFAULT, ANGSTROM_B_DEFAULT)
        );
    }

    #[test]
    fn angstrom_bounds_are_enforced() {
        assert!(check_angstrom_ab(0.29, 0.49).is_ok());
        assert!(check_angstrom_ab(0.05, 0.49).is_err());
        assert!(check_angstrom_ab(0.29, 0.75).is_err());
        assert!(check_angstrom_ab(0.4, 0.7).is_err()); // sum out of range
    }
}
