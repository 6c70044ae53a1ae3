//! Clients for the two Rijkswaterstaat data sources.
//!
//! Submodules:
//! - `thredds`: THREDDS HTML catalog listings.
//! - `catalog`: Waterbase catalog model and the lazily built registry.
//! - `grid`: netCDF file metadata and time series, with open retries.
//! - `extract`: walks every catalog and produces the JSON record sets.
//! - `waterinfo`: station directory and CRS normalization.
//! - `download`: CSV download queries and parsing.
//!
//! Every network call goes through [`HttpFetch`], so each client can be
//! exercised offline with canned responses.

pub mod catalog;
pub mod download;
pub mod extract;
pub mod grid;
#[cfg(feature = "netcdf")]
pub mod netcdf_source;
pub mod thredds;
pub mod waterinfo;

#[cfg(test)]
pub(crate) mod fixtures;

use crate::model::DataError;

/// Blocking GET returning the response body as text.
///
/// Implementations must map non-2xx responses to `DataError::Http`.
pub trait HttpFetch {
    fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String, DataError>;
}

impl HttpFetch for reqwest::blocking::Client {
    fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String, DataError> {
        let response = self.get(url).query(query).send()?;

        if !response.status().is_success() {
            return Err(DataError::Http(response.status().as_u16()));
        }

        Ok(response.text()?)
    }
}
