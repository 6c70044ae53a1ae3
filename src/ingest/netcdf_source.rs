//! libnetcdf-backed grid files.
//!
//! libnetcdf accepts OPeNDAP URLs in place of paths when it is built with DAP
//! support, so the Waterbase files are read without downloading them first.

use crate::ingest::grid::{AttrValue, GridDataset, GridOpener};
use crate::model::DataError;

#[derive(Debug, Clone, Copy, Default)]
pub struct NetcdfOpener;

pub struct NetcdfDataset {
    file: netcdf::File,
}

impl GridOpener for NetcdfOpener {
    type Dataset = NetcdfDataset;

    fn open(&self, path: &str) -> Result<NetcdfDataset, DataError> {
        netcdf::open(path)
            .map(|file| NetcdfDataset { file })
            .map_err(|e| DataError::Open(format!("{}: {}", path, e)))
    }
}

impl GridDataset for NetcdfDataset {
    fn attribute(&self, name: &str) -> Option<AttrValue> {
        let value = self.file.attribute(name)?.value().ok()?;
        match value {
            netcdf::AttributeValue::Str(s) => Some(AttrValue::Text(s)),
            netcdf::AttributeValue::Strs(list) => list.into_iter().next().map(AttrValue::Text),
            netcdf::AttributeValue::Double(d) => Some(AttrValue::Number(d)),
            netcdf::AttributeValue::Float(f) => Some(AttrValue::Number(f64::from(f))),
            netcdf::AttributeValue::Int(i) => Some(AttrValue::Number(f64::from(i))),
            netcdf::AttributeValue::Short(i) => Some(AttrValue::Number(f64::from(i))),
            _ => None,
        }
    }

    fn variable_names(&self) -> Vec<String> {
        self.file.variables().map(|var| var.name()).collect()
    }

    fn read_values(&self, variable: &str) -> Result<Vec<f64>, DataError> {
        let var = self
            .file
            .variable(variable)
            .ok_or_else(|| DataError::Parse(format!("no variable '{}'", variable)))?;
        let values: Vec<f64> = var
            .get_values(..)
            .map_err(|e| DataError::Parse(format!("reading '{}': {}", variable, e)))?;
        Ok(values)
    }
}
