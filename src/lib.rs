//! Spectral albedo and radiative heating of layered snow and ice.
//!
//! A column of snow layers, each with its own grain size and shape, density,
//! and load of light-absorbing impurities (black and brown carbon, mineral
//! dust, volcanic ash, algae), is lit by direct and diffuse sunlight over a
//! reflecting surface. Per-layer optical properties are mixed from tabulated
//! single-particle properties, corrected for grain shape, Delta-scaled, and
//! passed to a multi-layer two-stream solver, one independent tridiagonal
//! system per wavelength.
//!
//! ```no_run
//! use snicar_rtm::{Layer, Model, RunConfig, SnowColumn, Species};
//!
//! # fn main() -> Result<(), snicar_rtm::SnicarError> {
//! let config = RunConfig::from_file("run.json")?;
//! let column = SnowColumn::new(vec![
//!     Layer::new(0.05, 150.0, 100.0).with_impurity(Species::BlackCarbon, 500.0),
//!     Layer::new(1.0, 350.0, 500.0),
//! ])?;
//! let model = Model::load(&config, [&column])?;
//! let outputs = model.run(&column)?;
//! println!("broadband albedo {:.3}", outputs.summary.albedo.broadband);
//! # Ok(())
//! # }
//! ```
//!
//! With the `python` feature the crate also builds a Python extension module
//! exposing `compute_snicar` for batches of columns.

pub mod column;
pub mod config;
pub mod error;
pub mod illumination;
pub mod model;
pub mod optics;
pub mod rtm;
pub mod species;

#[cfg(test)]
pub(crate) mod fixtures;

#[cfg(feature = "python")]
mod python;

pub use column::{AlgaeCells, GrainShape, Layer, SnowColumn};
pub use config::{RunConfig, SurfaceAlbedo};
pub use error::SnicarError;
pub use illumination::{Atmosphere, Beam, Illumination, IrradianceProvider};
pub use model::Model;
pub use optics::{
    ColumnOptics, OpticalLibrary, OpticalPropertyProvider, PropertyKey, SpectralOptics,
    TableDirectory, WavelengthGrid,
};
pub use rtm::{Closure, RtmInputs, RtmOutputs, RtmParameters, SpectralBands, Summary};
pub use species::{Species, SpeciesTable};
