//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tempfile::TempDir;
use textgen_config::product::GeometryIdentifier;
use textgen_config::registry::{GeometryStorage, GisEngine, GisError};

pub const MAIN: &str = "textgen.toml";

/// Default product every fixture starts from.
pub fn default_product(language: &str) -> String {
    format!(
        r#"
[misc]
language = "{language}"
formatter = "html"
timeformat = "iso"
dictionary = "multimysql"

[database_servers.mysql_dictionary]
host = "dictionary-db"
database = "textgen"
username = "reader"
password = "secret"

[parameter_mapping]
temperature = "Temperature"

[geometry_tables]
server = "gis"
schema = "fminames"
table = "municipalities"
field = "name"

[forecast_data]
default_forecast = "/data/pal_skandinavia.sqd"

[unit_format]
celsius = "SI"

[mask]
coast = "Uusimaa"
city = "Helsinki"
missing = "/nonexistent/mask.svg"

[area.timezone]
default = "Europe/Helsinki"
"#
    )
}

/// A directory holding a main configuration file and product files.
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    /// Main config listing `products` (file names) plus the default product.
    pub fn new(products: &[(&str, &str)]) -> Self {
        let fixture = Fixture {
            dir: tempfile::tempdir().unwrap(),
        };
        fixture.write("default.toml", &default_product("fi"));
        let mut names = vec!["default.toml".to_string()];
        for (name, content) in products {
            fixture.write(name, content);
            names.push(name.to_string());
        }
        fixture.write_main(&names);
        fixture
    }

    pub fn write_main(&self, products: &[String]) {
        let list = products
            .iter()
            .map(|p| format!("\"{p}\""))
            .collect::<Vec<_>>()
            .join(", ");
        self.write(
            MAIN,
            &format!("url = \"/textgen\"\nforecast_text_cache_size = 10\nproducts = [{list}]\n"),
        );
    }

    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, content).unwrap();
        path
    }

    pub fn remove(&self, name: &str) -> PathBuf {
        let path = self.path(name);
        fs::remove_file(&path).unwrap();
        path
    }

    pub fn path(&self, name: &str) -> PathBuf {
        std::path::absolute(self.dir.path().join(name)).unwrap()
    }

    pub fn main(&self) -> PathBuf {
        self.path(MAIN)
    }
}

/// GIS engine serving a fixed set of geometries, optionally slowly.
#[derive(Default)]
pub struct MockGis {
    pub delay: Duration,
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl MockGis {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GisEngine for MockGis {
    fn populate_geometry_storage(
        &self,
        identifiers: &[GeometryIdentifier],
        storage: &mut GeometryStorage,
    ) -> Result<(), GisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.fail {
            return Err(GisError::Backend("connection refused".to_string()));
        }
        if !identifiers.is_empty() {
            storage.insert_polygon("Uusimaa", "M 24 60 L 25 60 L 25 61 Z");
            storage.insert_point("Helsinki", 24.94, 60.17);
            storage.insert_point("Espoomunicipalities", 24.65, 60.2);
        }
        Ok(())
    }
}
