//! CSV loaders for the four input tables.
//!
//! Expected columns:
//!   sales:   period_id, commodity_id, outlet_id, item_id, unit_count, revenue[, unit_size]
//!   catalog: item_id, commodity_id, uom, brand_type, description
//!   outlets: outlet_id, province, city
//!   offers:  offer_id, period_id, rp_name, outlet_id, status_id, item_id
//!
//! An empty `item_id` on an offer means the offer was never initialised.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{SubstitutionError, SubstitutionResult};
use crate::geography::OutletRecord;
use crate::types::{CatalogEntry, CommodityId, ItemId, OfferId, OutletId, PeriodId};

/// One item's sales at one outlet during one period.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SalesRecord {
    pub period_id: PeriodId,
    pub commodity_id: CommodityId,
    pub outlet_id: OutletId,
    pub item_id: ItemId,
    #[serde(deserialize_with = "deserialize_f64_or_zero")]
    pub unit_count: f64,
    #[serde(deserialize_with = "deserialize_f64_or_zero")]
    pub revenue: f64,
    #[serde(default, deserialize_with = "deserialize_f64_or_zero")]
    pub unit_size: f64,
}

/// One offer's state in one period as exported by the collection system.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OfferRecord {
    pub offer_id: OfferId,
    pub period_id: PeriodId,
    pub rp_name: String,
    pub outlet_id: OutletId,
    pub status_id: u8,
    pub item_id: Option<ItemId>,
}

/// Deserialize every row of `reader`, reporting the CSV line of the first
/// bad row.
pub fn load_csv<T, R>(reader: R, source_name: &str) -> SubstitutionResult<Vec<T>>
where
    T: DeserializeOwned,
    R: Read,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for (line_num, result) in csv_reader.deserialize().enumerate() {
        let record: T = result.map_err(|e| SubstitutionError::Parse {
            source_name: source_name.to_string(),
            line: line_num + 2,
            reason: e.to_string(),
        })?;
        records.push(record);
    }
    log::debug!("loaded {} rows from {}", records.len(), source_name);
    Ok(records)
}

pub fn load_csv_file<T>(path: impl AsRef<Path>) -> SubstitutionResult<Vec<T>>
where
    T: DeserializeOwned,
{
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    load_csv(file, &path.display().to_string())
}

pub fn load_sales<R: Read>(reader: R) -> SubstitutionResult<Vec<SalesRecord>> {
    load_csv(reader, "sales")
}

pub fn load_catalog<R: Read>(reader: R) -> SubstitutionResult<Vec<CatalogEntry>> {
    load_csv(reader, "catalog")
}

pub fn load_outlets<R: Read>(reader: R) -> SubstitutionResult<Vec<OutletRecord>> {
    load_csv(reader, "outlets")
}

pub fn load_offers<R: Read>(reader: R) -> SubstitutionResult<Vec<OfferRecord>> {
    load_csv(reader, "offers")
}

/// Group sales rows by commodity, in commodity order.
pub fn group_by_commodity(records: &[SalesRecord]) -> BTreeMap<CommodityId, Vec<&SalesRecord>> {
    let mut groups: BTreeMap<CommodityId, Vec<&SalesRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.commodity_id).or_default().push(record);
    }
    groups
}

/// Flexible number deserializer: an empty field reads as 0.
fn deserialize_f64_or_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Ok(0.0);
    }
    trimmed.parse::<f64>().map_err(|_| {
        serde::de::Error::custom(format!("expected a number, got '{}'", trimmed))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SALES_CSV: &str = "\
period_id,commodity_id,outlet_id,item_id,unit_count,revenue,unit_size
9,1,10,100,4,10.0,1
9,1,11,101,,0,
9,2,10,200,1,2.5,0.5
";

    const OFFERS_CSV: &str = "\
offer_id,period_id,rp_name,outlet_id,status_id,item_id
500,9,white rice 1kg,10,0,100
501,9,brown rice,10,3,
";

    #[test]
    fn load_sample_sales() {
        let records = load_sales(SALES_CSV.as_bytes()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].revenue, 10.0);
        assert_eq!(records[1].unit_count, 0.0);
        assert_eq!(records[1].unit_size, 0.0);
        assert_eq!(records[2].unit_size, 0.5);
    }

    #[test]
    fn unit_size_column_is_optional() {
        let csv = "period_id,commodity_id,outlet_id,item_id,unit_count,revenue\n\
                   9,1,10,100,4,10.0\n";
        let records = load_sales(csv.as_bytes()).unwrap();
        assert_eq!(records[0].unit_size, 0.0);
    }

    #[test]
    fn empty_offer_item_is_none() {
        let records = load_offers(OFFERS_CSV.as_bytes()).unwrap();
        assert_eq!(records[0].item_id, Some(100));
        assert_eq!(records[1].item_id, None);
        assert_eq!(records[1].status_id, 3);
    }

    #[test]
    fn bad_row_reports_line() {
        let csv = "offer_id,period_id,rp_name,outlet_id,status_id,item_id\n\
                   1,9,a,10,0,5\n\
                   x,9,b,10,0,6\n";
        let err = load_offers(csv.as_bytes()).unwrap_err();
        match err {
            SubstitutionError::Parse { source_name, line, .. } => {
                assert_eq!(source_name, "offers");
                assert_eq!(line, 3);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn catalog_and_outlets_load() {
        let catalog = load_catalog(
            "item_id,commodity_id,uom,brand_type,description\n\
             100,1,kg,private,white rice\n"
                .as_bytes(),
        )
        .unwrap();
        assert_eq!(catalog[0].description, "white rice");

        let outlets = load_outlets("outlet_id,province,city\n10,ON,Ottawa\n".as_bytes()).unwrap();
        assert_eq!(outlets[0].city, "Ottawa");
    }

    #[test]
    fn groups_sales_by_commodity() {
        let records = load_sales(SALES_CSV.as_bytes()).unwrap();
        let groups = group_by_commodity(&records);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[&1].len(), 2);
        assert_eq!(groups[&2][0].item_id, 200);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_csv_file::<SalesRecord>("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, SubstitutionError::Io(_)));
    }
}
