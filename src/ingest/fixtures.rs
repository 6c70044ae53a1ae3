//! Canned responses and in-memory fakes shared by the ingest unit tests.
//!
//! The HTML mirrors the layout of the Deltares THREDDS server: a table of
//! anchors whose text is wrapped in `<tt>`, with navigation and service links
//! around it. The JSON and CSV fixtures are trimmed Waterinfo responses.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::ingest::grid::{AttrValue, GridDataset, GridOpener};
use crate::ingest::HttpFetch;
use crate::model::DataError;

pub const CATALOG_ROOT: &str = "http://thredds.test/catalog/waterbase";
pub const DATA_ROOT: &str = "http://thredds.test/dodsC/waterbase";

pub fn test_settings() -> crate::config::Settings {
    crate::config::Settings {
        catalog_url: CATALOG_ROOT.to_string(),
        data_url: DATA_ROOT.to_string(),
        latest_measurements_url: "http://waterinfo.test/api/point/latestmeasurements".to_string(),
        download_csv_url: "http://waterinfo.test/api/Download/CSV".to_string(),
        download_groups_url: "http://waterinfo.test/api/nav/downloadgroups".to_string(),
        ..crate::config::Settings::default()
    }
}

// ---------------------------------------------------------------------------
// HTTP fake
// ---------------------------------------------------------------------------

/// Serves canned bodies by URL and records every request it receives.
/// Unknown URLs answer 404.
pub struct FakeFetch {
    bodies: HashMap<String, Result<String, DataError>>,
    pub requests: RefCell<Vec<(String, Vec<(String, String)>)>>,
}

impl FakeFetch {
    pub fn new() -> Self {
        FakeFetch {
            bodies: HashMap::new(),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn with_body(mut self, url: &str, body: &str) -> Self {
        self.bodies.insert(url.to_string(), Ok(body.to_string()));
        self
    }

    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.bodies.insert(url.to_string(), Err(DataError::Http(status)));
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn last_query(&self) -> HashMap<String, String> {
        self.requests
            .borrow()
            .last()
            .map(|(_, query)| query.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl HttpFetch for FakeFetch {
    fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String, DataError> {
        self.requests.borrow_mut().push((
            url.to_string(),
            query.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        ));
        self.bodies.get(url).cloned().unwrap_or(Err(DataError::Http(404)))
    }
}

// ---------------------------------------------------------------------------
// Grid fake
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct FakeDataset {
    pub attributes: HashMap<String, AttrValue>,
    pub variables: Vec<(String, Vec<f64>)>,
}

impl FakeDataset {
    pub fn station(name: &str, code: &str) -> Self {
        let mut attributes = HashMap::new();
        attributes.insert("stationname".to_string(), AttrValue::Text(name.to_string()));
        attributes.insert("locationcode".to_string(), AttrValue::Text(code.to_string()));
        attributes.insert("geospatial_lat_min".to_string(), AttrValue::Number(51.98));
        attributes.insert("geospatial_lon_min".to_string(), AttrValue::Number(4.12));
        attributes.insert(
            "time_coverage_start".to_string(),
            AttrValue::Text("1990-01-01P00:00:00".to_string()),
        );
        attributes.insert(
            "time_coverage_end".to_string(),
            AttrValue::Text("2012-12-31P23:00:00".to_string()),
        );
        FakeDataset {
            attributes,
            variables: Vec::new(),
        }
    }

    pub fn with_variable(mut self, name: &str, values: Vec<f64>) -> Self {
        self.variables.push((name.to_string(), values));
        self
    }
}

/// An open fake dataset. Dropping it releases the handle.
pub struct FakeHandle {
    data: FakeDataset,
    live: Rc<Cell<u32>>,
}

impl Drop for FakeHandle {
    fn drop(&mut self) {
        self.live.set(self.live.get() - 1);
    }
}

impl GridDataset for FakeHandle {
    fn attribute(&self, name: &str) -> Option<AttrValue> {
        self.data.attributes.get(name).cloned()
    }

    fn variable_names(&self) -> Vec<String> {
        self.data.variables.iter().map(|(name, _)| name.clone()).collect()
    }

    fn read_values(&self, variable: &str) -> Result<Vec<f64>, DataError> {
        self.data
            .variables
            .iter()
            .find(|(name, _)| name == variable)
            .map(|(_, values)| values.clone())
            .ok_or_else(|| DataError::Parse(format!("no variable '{}'", variable)))
    }
}

/// Opens datasets from memory. The first `transient_failures` opens fail
/// with `DataError::Open`; paths in `broken` always fail.
#[derive(Default)]
pub struct FakeOpener {
    pub datasets: HashMap<String, FakeDataset>,
    pub broken: HashSet<String>,
    pub transient_failures: Cell<u32>,
    pub attempts: Cell<u32>,
    pub live: Rc<Cell<u32>>,
    pub peak_live: Cell<u32>,
}

impl FakeOpener {
    pub fn new() -> Self {
        FakeOpener::default()
    }

    pub fn with_dataset(mut self, path: &str, dataset: FakeDataset) -> Self {
        self.datasets.insert(path.to_string(), dataset);
        self
    }

    pub fn with_broken(mut self, path: &str) -> Self {
        self.broken.insert(path.to_string());
        self
    }

    pub fn failing_first(self, times: u32) -> Self {
        self.transient_failures.set(times);
        self
    }
}

impl GridOpener for FakeOpener {
    type Dataset = FakeHandle;

    fn open(&self, path: &str) -> Result<FakeHandle, DataError> {
        self.attempts.set(self.attempts.get() + 1);

        if self.transient_failures.get() > 0 {
            self.transient_failures.set(self.transient_failures.get() - 1);
            return Err(DataError::Open(format!("{}: server busy", path)));
        }
        if self.broken.contains(path) {
            return Err(DataError::Open(format!("{}: NetCDF: file not found", path)));
        }
        let data = self
            .datasets
            .get(path)
            .cloned()
            .ok_or_else(|| DataError::Open(format!("{}: NetCDF: file not found", path)))?;

        self.live.set(self.live.get() + 1);
        self.peak_live.set(self.peak_live.get().max(self.live.get()));
        Ok(FakeHandle {
            data,
            live: Rc::clone(&self.live),
        })
    }
}

// ---------------------------------------------------------------------------
// THREDDS pages
// ---------------------------------------------------------------------------

pub fn fixture_root_catalog_html() -> &'static str {
    r#"<!DOCTYPE html>
<html>
<head><title>Catalog http://opendap.deltares.nl/thredds/catalog/opendap/rijkswaterstaat/waterbase/catalog.html</title></head>
<body>
<h1>Catalog http://opendap.deltares.nl/thredds/catalog/opendap/rijkswaterstaat/waterbase/catalog.html</h1>
<table>
<tr><th>Dataset</th><th>Size</th><th>Last Modified</th></tr>
<tr><td><a href='../catalog.html'><tt>rijkswaterstaat/</tt></a></td><td>--</td><td>--</td></tr>
<tr><td><a href='01_Afvoer/catalog.html'><tt>01_Afvoer/</tt></a></td><td>--</td><td>--</td></tr>
<tr><td><a href='22_Waterhoogte_in_cm_t.o.v._normaal_amsterdams_peil_in_oppervlaktewater/catalog.html'><tt>22_Waterhoogte_in_cm_t.o.v._normaal_amsterdams_peil_in_oppervlaktewater/</tt></a></td><td>--</td><td>--</td></tr>
<tr><td><a href='catalog.xml'><tt>xml</tt></a></td><td>--</td><td>--</td></tr>
</table>
<h3>THREDDS Data Server [Version 4.6]</h3>
<a href='http://www.unidata.ucar.edu/software/thredds/current/tds/'>Documentation</a>
</body>
</html>"#
}

pub fn fixture_afvoer_catalog_html() -> &'static str {
    r#"<!DOCTYPE html>
<html>
<body>
<h1>Catalog 01_Afvoer/nc</h1>
<table>
<tr><td><a href='catalog.html?dataset=waterbase/01_Afvoer/nc/id1-AMRGBVN.nc'><tt>id1-AMRGBVN.nc</tt></a></td><td>1.2 Mbytes</td></tr>
<tr><td><a href='catalog.html?dataset=waterbase/01_Afvoer/nc/id1-EIJSDPTN.nc'><tt>id1-EIJSDPTN.nc</tt></a></td><td>0.8 Mbytes</td></tr>
<tr><td><a href='catalog.html?dataset=waterbase/01_Afvoer/nc/id1-LOBH.nc'><tt>id1-LOBH.nc</tt></a></td><td>2.3 Mbytes</td></tr>
</table>
</body>
</html>"#
}

pub fn fixture_waterhoogte_catalog_html() -> &'static str {
    r#"<html><body><table>
<tr><td><a href='catalog.html?dataset=waterbase/22/nc/id22-HOEKVHLD.nc'><tt>id22-HOEKVHLD.nc</tt></a></td></tr>
<tr><td><a href='catalog.html?dataset=waterbase/22/nc/id22-SCHEVNGN.nc'><tt>id22-SCHEVNGN.nc</tt></a></td></tr>
</table></body></html>"#
}

/// A catalog page with navigation only and no dataset rows.
pub fn fixture_empty_catalog_html() -> &'static str {
    r#"<html><body>
<h1>Catalog 99_Leeg/nc</h1>
<table>
<tr><th>Dataset</th><th>Size</th><th>Last Modified</th></tr>
</table>
<a href='../catalog.html'>Parent</a>
</body></html>"#
}

/// A catalog whose files do not carry the `id<digits>-` prefix.
pub fn fixture_unnumbered_catalog_html() -> &'static str {
    r#"<html><body><table>
<tr><td><a href='catalog.html?dataset=waterbase/99_Leeg/nc/2010_LOBH.nc'><tt>2010_LOBH.nc</tt></a></td></tr>
</table></body></html>"#
}

/// A catalog page whose parent link text looks like a catalog name.
pub fn fixture_catalog_with_parent_row_html() -> &'static str {
    r#"<html><body><table>
<tr><td><a href='../catalog.html'><tt>01_Afvoer/</tt></a></td></tr>
<tr><td><a href='catalog.html?dataset=waterbase/01_Afvoer/nc/id1-LOBH.nc'><tt>id1-LOBH.nc</tt></a></td></tr>
</table></body></html>"#
}

// ---------------------------------------------------------------------------
// Waterinfo responses
// ---------------------------------------------------------------------------

/// Two wind stations: one in UTM 31N, one already in WGS84.
pub fn fixture_wind_stations_json() -> &'static str {
    r#"{
  "type": "FeatureCollection",
  "features": [
    {
      "type": "Feature",
      "crs": { "type": "name", "properties": { "name": "EPSG:25831" } },
      "geometry": { "type": "Point", "coordinates": [574255.0, 5759212.0] },
      "properties": {
        "name": "Hoek van Holland",
        "locationCode": "HOEKVHLD",
        "measurements": [
          { "parameterId": "Windsnelheid___20Lucht___20t.o.v._20Mean_20Sea_20Level___20in___20m_2Fs", "latestValue": 7.2 },
          { "parameterId": "Windrichting___20Lucht___20t.o.v._20ware_20Noorden___20in___20graad", "latestValue": 240.0 }
        ]
      }
    },
    {
      "type": "Feature",
      "crs": { "type": "name", "properties": { "name": "EPSG:4326" } },
      "geometry": { "type": "Point", "coordinates": [3.5963, 51.4423] },
      "properties": {
        "name": "Vlissingen",
        "locationCode": "VLISSGN",
        "measurements": [
          { "parameterId": "Windsnelheid___20Lucht___20t.o.v._20Mean_20Sea_20Level___20in___20m_2Fs", "latestValue": 9.1 }
        ]
      }
    }
  ]
}"#
}

pub fn fixture_download_groups_json() -> &'static str {
    r#"[
  {
    "label": "Waterhoogten",
    "parameters": [
      { "slug": "waterhoogte-t-o-v-nap", "label": "Waterhoogte t.o.v. NAP", "synonyms": ["waterstand"] },
      { "slug": "astronomische-getij", "label": "Astronomisch getij", "synonyms": [] }
    ]
  },
  {
    "label": "Wind",
    "parameters": [
      { "slug": "windsnelheid", "label": "Windsnelheid", "synonyms": ["wind"] }
    ]
  }
]"#
}

/// Six header lines, then `date;time;...;value;` rows.
pub fn fixture_tidal_csv() -> &'static str {
    "Rijkswaterstaat Waterinfo export\n\
Locatie;Hoek van Holland\n\
Parameter;Waterhoogte t.o.v. NAP\n\
Eenheid;cm\n\
Tijdzone;UTC\n\
Datum;Tijd;Parameter;Locatie;Waarde;\n\
01/02/2019;00:00:00;Waterhoogte;HOEKVHLD;45;\n\
01/02/2019;00:10:00;Waterhoogte;HOEKVHLD;52;\n\
01/02/2019;00:20:00;Waterhoogte;HOEKVHLD;-3.5;\n"
}
