//! Run configuration, read from JSON.
//!
//! Every key is optional:
//!
//! ```json
//! {
//!     "closure": "hemispheric_mean",
//!     "delta": true,
//!     "cos_zenith": 0.5,
//!     "surface_albedo": 0.25,
//!     "atmosphere": "mid_latitude_winter",
//!     "diffuse_fraction": 0.0,
//!     "visible_bands": 50,
//!     "energy_tolerance": 1e-10,
//!     "algae_radius_um": 6.0,
//!     "data_dir": "data",
//!     "num_threads": null
//! }
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::column::AlgaeCells;
use crate::error::SnicarError;
use crate::illumination::Atmosphere;
use crate::optics::WavelengthGrid;
use crate::rtm::{Closure, RtmParameters};

/// Albedo of the surface under the snow column.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SurfaceAlbedo {
    /// The same albedo at every wavelength
    Broadband(f64),
    /// One albedo per band
    Spectral(Vec<f64>),
}

impl Default for SurfaceAlbedo {
    fn default() -> Self {
        SurfaceAlbedo::Broadband(0.25)
    }
}

impl SurfaceAlbedo {
    /// Albedo at each band of `grid`.
    pub fn spectrum(&self, grid: &WavelengthGrid) -> Result<Vec<f64>, SnicarError> {
        match self {
            SurfaceAlbedo::Broadband(albedo) => Ok(vec![*albedo; grid.len()]),
            SurfaceAlbedo::Spectral(albedo) if albedo.len() == grid.len() => Ok(albedo.clone()),
            SurfaceAlbedo::Spectral(albedo) => Err(SnicarError::InvalidConfig(format!(
                "surface albedo has {} values but the grid has {} bands",
                albedo.len(),
                grid.len()
            ))),
        }
    }

    fn values(&self) -> &[f64] {
        match self {
            SurfaceAlbedo::Broadband(albedo) => std::slice::from_ref(albedo),
            SurfaceAlbedo::Spectral(albedo) => albedo,
        }
    }
}

/// Settings for a run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Two-stream closure
    pub closure: Closure,
    /// Whether to apply the Delta-Eddington transform
    pub delta: bool,
    /// Cosine of the solar zenith angle
    pub cos_zenith: f64,
    /// Albedo of the underlying surface
    pub surface_albedo: SurfaceAlbedo,
    /// Atmosphere the incident spectrum was computed for
    pub atmosphere: Atmosphere,
    /// Share of the incident flux that is diffuse
    pub diffuse_fraction: f64,
    /// Number of leading bands counted as visible
    pub visible_bands: usize,
    /// Tolerated energy residual relative to the incident flux
    pub energy_tolerance: f64,
    /// Algae cell radius in µm
    pub algae_radius_um: f64,
    /// Root of the optical property and irradiance tables
    pub data_dir: PathBuf,
    /// Worker threads for batch runs, or the rayon default
    pub num_threads: Option<usize>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            closure: Closure::default(),
            delta: true,
            cos_zenith: 0.5,
            surface_albedo: SurfaceAlbedo::default(),
            atmosphere: Atmosphere::default(),
            diffuse_fraction: 0.0,
            visible_bands: 50,
            energy_tolerance: 1e-10,
            algae_radius_um: AlgaeCells::default().radius_um,
            data_dir: PathBuf::from("data"),
            num_threads: None,
        }
    }
}

impl RunConfig {
    /// Read and check a JSON configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SnicarError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let config: RunConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and check a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, SnicarError> {
        let config: RunConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings outside their valid range.
    pub fn validate(&self) -> Result<(), SnicarError> {
        self.parameters().validate()?;
        if !(0.0..=1.0).contains(&self.diffuse_fraction) {
            return Err(SnicarError::InvalidConfig(format!(
                "diffuse fraction {} is outside [0, 1]",
                self.diffuse_fraction
            )));
        }
        if self
            .surface_albedo
            .values()
            .iter()
            .any(|r| !(0.0..=1.0).contains(r))
        {
            return Err(SnicarError::InvalidConfig(
                "surface albedo must lie in [0, 1]".into(),
            ));
        }
        Ok(())
    }

    /// Solver settings for this configuration.
    pub fn parameters(&self) -> RtmParameters {
        RtmParameters {
            closure: self.closure,
            delta: self.delta,
            cos_zenith: self.cos_zenith,
            visible_bands: self.visible_bands,
            energy_tolerance: self.energy_tolerance,
            algae: AlgaeCells {
                radius_um: self.algae_radius_um,
                ..AlgaeCells::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let config = RunConfig::from_json("{}").unwrap();
        assert_eq!(config, RunConfig::default());
        assert_eq!(config.parameters(), RtmParameters::default());
    }

    #[test]
    fn reads_every_key() {
        let config = RunConfig::from_json(
            r#"{
                "closure": "eddington",
                "delta": false,
                "cos_zenith": 0.8,
                "surface_albedo": [0.1, 0.2, 0.3],
                "atmosphere": "summit",
                "diffuse_fraction": 0.4,
                "visible_bands": 2,
                "energy_tolerance": 1e-8,
                "algae_radius_um": 10.0,
                "data_dir": "/opt/snicar",
                "num_threads": 4
            }"#,
        )
        .unwrap();

        assert_eq!(config.closure, Closure::Eddington);
        assert!(!config.delta);
        assert_eq!(config.atmosphere, Atmosphere::Summit);
        assert_eq!(config.surface_albedo, SurfaceAlbedo::Spectral(vec![0.1, 0.2, 0.3]));
        assert_eq!(config.data_dir, PathBuf::from("/opt/snicar"));
        assert_eq!(config.num_threads, Some(4));
        assert_eq!(config.parameters().algae.radius_um, 10.0);

        let grid = WavelengthGrid::new(vec![0.3, 0.4, 0.5]).unwrap();
        assert_eq!(config.surface_albedo.spectrum(&grid).unwrap(), vec![0.1, 0.2, 0.3]);
        let other = WavelengthGrid::new(vec![0.3, 0.4]).unwrap();
        assert!(config.surface_albedo.spectrum(&other).is_err());
    }

    #[test]
    fn rejects_unknown_keys_and_bad_values() {
        assert!(matches!(
            RunConfig::from_json(r#"{"zenith": 60}"#),
            Err(SnicarError::Json(_))
        ));
        assert!(matches!(
            RunConfig::from_json(r#"{"closure": "two_stream"}"#),
            Err(SnicarError::Json(_))
        ));
        for bad in [
            r#"{"cos_zenith": 0.0}"#,
            r#"{"cos_zenith": 1.5}"#,
            r#"{"diffuse_fraction": -0.1}"#,
            r#"{"surface_albedo": 1.2}"#,
            r#"{"visible_bands": 0}"#,
            r#"{"algae_radius_um": 0.0}"#,
        ] {
            assert!(
                matches!(RunConfig::from_json(bad), Err(SnicarError::InvalidConfig(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn reads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"closure": "quadrature", "surface_albedo": 0.6}}"#).unwrap();

        let config = RunConfig::from_file(file.path()).unwrap();
        assert_eq!(config.closure, Closure::Quadrature);
        assert_eq!(config.surface_albedo, SurfaceAlbedo::Broadband(0.6));

        assert!(matches!(
            RunConfig::from_file(file.path().with_extension("missing")),
            Err(SnicarError::Io(_))
        ));
    }
}
