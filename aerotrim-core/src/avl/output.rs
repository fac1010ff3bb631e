//! Scraping of AVL's free-text stdout into [`AeroRecord`]s.

use super::runfile::PointAirData;
use crate::aero::AeroRecord;
use crate::geometry::AircraftGeometry;
use crate::imports::*;
use lazy_static::lazy_static;
use regex::Regex;

/// Prefix of the line AVL prints ahead of each run case
pub const CASE_MARKER: &str = "Run case: -";

/// Number of characters after `=` searched for a value
const VALUE_WINDOW: usize = 11;

lazy_static! {
    static ref LEADING_NUMBER_REGEX: Regex =
        Regex::new(r"^\s*([-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)").unwrap();
}

/// Turns solver text into per-case coefficient records.
pub trait OutputParser {
    /// Returns exactly `n_cases` records, in global-index order. Coefficients that
    /// cannot be recovered are NaN. Forces are left unset.
    fn parse_coefficients(&self, text: &str, n_cases: usize) -> Vec<AeroRecord>;
}

/// Parser for the total-forces report printed by AVL's `oper` / `xx` command.
#[derive(Clone, Copy, Debug, Default)]
pub struct AvlStdoutParser;

impl AvlStdoutParser {
    fn case_block<'a>(text: &'a str, case_number: usize, cursor: &mut usize) -> Option<&'a str> {
        let marker = format!("{CASE_MARKER}{case_number}-");
        let start = text[*cursor..]
            .find(&marker)
            .map(|pos| pos + *cursor)
            // out-of-order output
            .or_else(|| text.find(&marker))?;
        let body = start + marker.len();
        let end = text[body..]
            .find(CASE_MARKER)
            .map_or(text.len(), |pos| pos + body);
        *cursor = body;
        Some(&text[body..end])
    }

    fn field(block: &str, key: &str) -> Option<f64> {
        let key_pos = block.find(key)?;
        let eq_pos = block[key_pos..].find('=')? + key_pos;
        let window: String = block[eq_pos + 1..].chars().take(VALUE_WINDOW).collect();
        LEADING_NUMBER_REGEX
            .captures(&window)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }
}

impl OutputParser for AvlStdoutParser {
    fn parse_coefficients(&self, text: &str, n_cases: usize) -> Vec<AeroRecord> {
        let mut cursor = 0;
        (0..n_cases)
            .map(|i| {
                let mut record = AeroRecord::default();
                let Some(block) = Self::case_block(text, i + 1, &mut cursor) else {
                    log::warn!("Run case -{}- not found in solver output", i + 1);
                    return record;
                };
                for (key, slot) in [
                    ("Alpha", &mut record.alpha_res),
                    ("CLtot", &mut record.CL),
                    ("CDtot", &mut record.CD),
                    ("CYtot", &mut record.CY),
                    ("Cltot", &mut record.Cl),
                    ("Cmtot", &mut record.Cm),
                    ("Cntot", &mut record.Cn),
                ] {
                    match Self::field(block, key) {
                        Some(value) => *slot = value,
                        None => log::warn!("`{key}` missing or unparsable in run case -{}-", i + 1),
                    }
                }
                record
            })
            .collect()
    }
}

/// Parses `text` and dimensionalizes each record with its encoded air data.
/// `air_data` must hold one entry per global index, in order.
pub fn parse_results<P: OutputParser + ?Sized>(
    parser: &P,
    text: &str,
    air_data: &[PointAirData],
    geom: &AircraftGeometry,
) -> Vec<AeroRecord> {
    let mut records = parser.parse_coefficients(text, air_data.len());
    for (record, air) in records.iter_mut().zip(air_data) {
        record.apply_forces(air.q, geom);
        record.v_tas = air.v_tas;
    }
    records
}
