use std::time::Duration;

pub const SERVICE_URL: &str = "https://services1.arcgis.com/79kfd2K6fskCAkyg/arcgis/rest/services/Louisville_Metro_KY_Property_Foreclosures/FeatureServer/0/query";
pub const PAGE_SIZE: usize = 1000;
pub const WORKERS: usize = 5;
/// Hard ceiling on pages requested per run: 300 * 1000 = 300k rows max.
pub const MAX_BATCHES: usize = 300;
pub const OUTPUT_DIR: &str = "data";
pub const OUTPUT_FILE: &str = "Louisville_Metro_KY_-_Property_Foreclosures.csv";

/// Output column order. Every row carries exactly these cells, whatever keys
/// a given page returned.
pub const CANONICAL_COLUMNS: [&str; 18] = [
    "House_Nr",
    "Dir",
    "Street_Name",
    "St_Type",
    "Post_Dir",
    "Zip",
    "L_S",
    "CD",
    "Neighborhood",
    "Full_Parcel_ID",
    "Census_Tract",
    "Action_Filed",
    "Case_",
    "Case_Style",
    "Sale_Date",
    "Sale_Price",
    "Purchaser",
    "ObjectId",
];

/// Columns carrying epoch-millisecond timestamps.
pub const DATE_COLUMNS: [&str; 2] = ["Action_Filed", "Sale_Date"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    pub page_size: usize,
    pub workers: usize,
    pub max_batches: usize,
    pub request_timeout: Option<Duration>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
            workers: WORKERS,
            max_batches: MAX_BATCHES,
            request_timeout: None,
        }
    }
}

impl FetchConfig {
    /// Offsets handed to workers: `0, page_size, 2 * page_size, ...`, one per batch.
    pub fn offsets(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.max_batches).map_while(move |batch| batch.checked_mul(self.page_size))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.page_size == 0 {
            return Err(anyhow::anyhow!("Page size must be greater than zero"));
        }
        if self.workers == 0 {
            return Err(anyhow::anyhow!("Worker count must be greater than zero"));
        }
        if self.max_batches.checked_mul(self.page_size).is_none() {
            return Err(anyhow::anyhow!(
                "{} pages of {} records exceeds the addressable offset range",
                self.max_batches,
                self.page_size
            ));
        }
        Ok(())
    }
}
