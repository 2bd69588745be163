//! Synthetic optical tables and spectra for tests.
//!
//! The shapes are physically plausible (ice is transparent in the visible and
//! absorbs strongly in the near infrared, carbon is dark, the sun is a
//! 5800 K blackbody) so the solver's qualitative behaviour can be checked
//! without any external data.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::column::{Layer, SnowColumn};
use crate::error::SnicarError;
use crate::illumination::{Atmosphere, Beam, Illumination, IrradianceProvider};
use crate::optics::{
    OpticalLibrary, OpticalPropertyProvider, PropertyKey, SpectralOptics, TableDirectory,
    WavelengthGrid,
};
use crate::species::Species;

/// Imaginary refractive index of ice at a few wavelengths (µm), log-linearly
/// interpolated in between
const ICE_ABSORPTION: [(f64, f64); 9] = [
    (0.2, 1e-9),
    (0.6, 1e-9),
    (0.9, 2e-7),
    (1.0, 1e-6),
    (1.25, 1e-5),
    (1.5, 3e-4),
    (2.0, 1e-3),
    (3.0, 0.3),
    (5.0, 0.01),
];

/// Density of ice, kg/m³
const ICE_DENSITY: f64 = 917.0;

/// hc/k in µm K
const SECOND_RADIATION_CONSTANT: f64 = 14387.77;

/// The default 480-band grid.
pub(crate) fn grid() -> WavelengthGrid {
    WavelengthGrid::snicar_default()
}

fn ice_absorption_index(wavelength: f64) -> f64 {
    let upper = ICE_ABSORPTION
        .partition_point(|&(w, _)| w < wavelength)
        .clamp(1, ICE_ABSORPTION.len() - 1);
    let (w0, k0) = ICE_ABSORPTION[upper - 1];
    let (w1, k1) = ICE_ABSORPTION[upper];
    let t = ((wavelength - w0) / (w1 - w0)).clamp(0.0, 1.0);
    (k0.ln() + t * (k1.ln() - k0.ln())).exp()
}

/// Ice spheres of `radius_um`: absorption grows with grain size and
/// wavelength.
pub(crate) fn ice_optics(grid: &WavelengthGrid, radius_um: f64) -> SpectralOptics {
    let radius = radius_um * 1e-6;
    let ssa = grid
        .as_slice()
        .iter()
        .map(|&wavelength| {
            let alpha = 4.0 * std::f64::consts::PI * ice_absorption_index(wavelength)
                / (wavelength * 1e-6);
            1.0 - 0.47 * (1.0 - (-2.6 * alpha * radius).exp())
        })
        .collect();
    let mac = vec![3.0 / (ICE_DENSITY * radius); grid.len()];
    let asymmetry = vec![0.89; grid.len()];
    SpectralOptics::new(ssa, mac, asymmetry).unwrap()
}

/// Grey-ish impurities: carbon dark, dust and ash brighter.
pub(crate) fn impurity_optics(grid: &WavelengthGrid, species: Species) -> SpectralOptics {
    let (ssa, mac_550, exponent, asymmetry) = match species {
        Species::BlackCarbon => (0.25, 12.0, 1.0, 0.35),
        Species::CoatedBlackCarbon => (0.3, 18.0, 1.0, 0.45),
        Species::BrownCarbon => (0.6, 5.0, 2.0, 0.5),
        Species::CoatedBrownCarbon => (0.65, 7.0, 2.0, 0.55),
        Species::Dust1 | Species::Dust2 | Species::Dust3 | Species::Dust4 | Species::Dust5 => {
            (0.9, 0.5, 0.3, 0.7)
        }
        _ => (0.8, 1.0, 0.3, 0.7),
    };
    let mac = grid
        .as_slice()
        .iter()
        .map(|&wavelength| mac_550 * (0.55 / wavelength).powf(exponent))
        .collect();
    SpectralOptics::new(vec![ssa; grid.len()], mac, vec![asymmetry; grid.len()]).unwrap()
}

/// Pigmented cells absorbing in the visible.
pub(crate) fn algae_optics(grid: &WavelengthGrid) -> SpectralOptics {
    let ssa = grid
        .as_slice()
        .iter()
        .map(|&wavelength| if wavelength < 0.7 { 0.8 } else { 0.99 })
        .collect();
    SpectralOptics::new(ssa, vec![20.0; grid.len()], vec![0.95; grid.len()]).unwrap()
}

/// A 5800 K blackbody, reddened a little, normalised to a unit sum.
pub(crate) fn solar_spectrum(grid: &WavelengthGrid) -> Vec<f64> {
    let raw: Vec<f64> = grid
        .as_slice()
        .iter()
        .map(|&wavelength| {
            let planck = wavelength.powi(-5)
                / ((SECOND_RADIATION_CONSTANT / (wavelength * 5800.0)).exp() - 1.0);
            planck * (-0.6 * (wavelength - 0.2)).exp()
        })
        .collect();
    let total: f64 = raw.iter().sum();
    raw.into_iter().map(|f| f / total).collect()
}

/// Sky light, bluer than the direct beam, normalised to a unit sum.
pub(crate) fn sky_spectrum(grid: &WavelengthGrid) -> Vec<f64> {
    let raw: Vec<f64> = solar_spectrum(grid)
        .into_iter()
        .zip(grid.as_slice())
        .map(|(f, &wavelength)| f * (-wavelength).exp())
        .collect();
    let total: f64 = raw.iter().sum();
    raw.into_iter().map(|f| f / total).collect()
}

/// Direct-beam illumination with the solar spectrum.
pub(crate) fn illumination(grid: &WavelengthGrid) -> Illumination {
    Illumination::direct_beam(solar_spectrum(grid)).unwrap()
}

/// Serves the synthetic tables for any key.
#[derive(Debug)]
pub(crate) struct Provider;

impl OpticalPropertyProvider for Provider {
    fn optical_properties(
        &self,
        key: &PropertyKey,
        grid: &WavelengthGrid,
    ) -> Result<SpectralOptics, SnicarError> {
        Ok(match *key {
            PropertyKey::Ice { radius_um } => ice_optics(grid, f64::from(radius_um)),
            PropertyKey::Impurity(species) => impurity_optics(grid, species),
            PropertyKey::Algae { .. } => algae_optics(grid),
        })
    }
}

impl IrradianceProvider for Provider {
    fn irradiance(
        &self,
        _atmosphere: Atmosphere,
        beam: Beam,
        _zenith_deg: u32,
        grid: &WavelengthGrid,
    ) -> Result<Vec<f64>, SnicarError> {
        Ok(match beam {
            Beam::Direct => solar_spectrum(grid),
            Beam::Diffuse => sky_spectrum(grid),
        })
    }
}

/// A column from `layers`.
pub(crate) fn column(layers: Vec<Layer>) -> SnowColumn {
    SnowColumn::new(layers).unwrap()
}

/// Everything `column` needs, with 6 µm algae.
pub(crate) fn library(grid: &WavelengthGrid, column: &SnowColumn) -> OpticalLibrary {
    OpticalLibrary::load(&Provider, grid, [column], 6.0).unwrap()
}

fn write_table(path: &Path, grid: &WavelengthGrid, columns: &[&[f64]]) {
    let mut contents = String::from("# synthetic table\n");
    for (row, wavelength) in grid.as_slice().iter().enumerate() {
        write!(contents, "{wavelength}").unwrap();
        for column in columns {
            write!(contents, " {}", column[row]).unwrap();
        }
        contents.push('\n');
    }
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// Write the synthetic tables under `root` in the [`TableDirectory`] layout:
/// ice for each of `radii`, every species, 6 µm algae, and mid-latitude
/// winter irradiance for a 60° zenith angle.
pub(crate) fn write_tables(root: &Path, grid: &WavelengthGrid, radii: &[u32]) {
    let store = TableDirectory::new(root);
    let mut keys: Vec<PropertyKey> = radii
        .iter()
        .map(|&radius_um| PropertyKey::Ice { radius_um })
        .collect();
    keys.extend(Species::ALL.into_iter().map(PropertyKey::Impurity));
    keys.push(PropertyKey::algae(6.0));

    for key in keys {
        let optics = Provider.optical_properties(&key, grid).unwrap();
        write_table(
            &store.optics_path(&key),
            grid,
            &[&optics.ssa, &optics.mac, &optics.asymmetry],
        );
    }

    let atmosphere = Atmosphere::MidLatitudeWinter;
    write_table(
        &store.irradiance_path(atmosphere, Beam::Direct, 60),
        grid,
        &[&solar_spectrum(grid)],
    );
    write_table(
        &store.irradiance_path(atmosphere, Beam::Diffuse, 60),
        grid,
        &[&sky_spectrum(grid)],
    );
}
