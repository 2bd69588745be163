//! Whitespace-delimited text tables on disk.
//!
//! Layout under the root directory:
//!
//! ```text
//! optics/ice_r0100.txt          wavelength ssa mac asymmetry
//! optics/bc_uncoated.txt        ...
//! optics/algae_r0006.txt        ...
//! irradiance/mlw_clear_sza60.txt   wavelength flux   (direct beam)
//! irradiance/mlw_cloudy.txt        wavelength flux   (diffuse)
//! ```
//!
//! Lines starting with `#` and blank lines are skipped. Rows must line up
//! with the wavelength grid of the run.

use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};

use log::debug;

use super::{OpticalPropertyProvider, PropertyKey, SpectralOptics, WavelengthGrid};
use crate::error::SnicarError;
use crate::illumination::{Atmosphere, Beam, IrradianceProvider};

/// Largest allowed difference between a table's wavelength and the grid, µm
const WAVELENGTH_TOLERANCE: f64 = 1e-6;

/// A directory of optical property and irradiance tables.
#[derive(Debug, Clone)]
pub struct TableDirectory {
    root: PathBuf,
}

impl TableDirectory {
    /// Use the tables under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the optical property table for `key`.
    pub fn optics_path(&self, key: &PropertyKey) -> PathBuf {
        self.root
            .join("optics")
            .join(format!("{}.txt", key.file_stem()))
    }

    /// Path of the irradiance table for a scenario. The zenith angle only
    /// matters for the direct beam.
    pub fn irradiance_path(&self, atmosphere: Atmosphere, beam: Beam, zenith_deg: u32) -> PathBuf {
        let name = match beam {
            Beam::Direct => format!("{}_clear_sza{zenith_deg:02}.txt", atmosphere.code()),
            Beam::Diffuse => format!("{}_cloudy.txt", atmosphere.code()),
        };
        self.root.join("irradiance").join(name)
    }
}

impl OpticalPropertyProvider for TableDirectory {
    fn optical_properties(
        &self,
        key: &PropertyKey,
        grid: &WavelengthGrid,
    ) -> Result<SpectralOptics, SnicarError> {
        let path = self.optics_path(key);
        let mut columns = read_table(&path, 4, grid)
            .map_err(|e| missing_as(e, || SnicarError::MissingOpticalProperty(key.to_string())))?;

        let asymmetry = columns.pop().unwrap_or_default();
        let mac = columns.pop().unwrap_or_default();
        let ssa = columns.pop().unwrap_or_default();
        SpectralOptics::new(ssa, mac, asymmetry)
    }
}

impl IrradianceProvider for TableDirectory {
    fn irradiance(
        &self,
        atmosphere: Atmosphere,
        beam: Beam,
        zenith_deg: u32,
        grid: &WavelengthGrid,
    ) -> Result<Vec<f64>, SnicarError> {
        let path = self.irradiance_path(atmosphere, beam, zenith_deg);
        let mut columns = read_table(&path, 2, grid).map_err(|e| {
            missing_as(e, || {
                SnicarError::MissingOpticalProperty(format!("irradiance {}", path.display()))
            })
        })?;
        Ok(columns.pop().unwrap_or_default())
    }
}

/// Turn a "file not found" I/O error into a more specific error.
fn missing_as(err: SnicarError, missing: impl FnOnce() -> SnicarError) -> SnicarError {
    match err {
        SnicarError::Io(e) if e.kind() == ErrorKind::NotFound => missing(),
        other => other,
    }
}

/// Read a table with `num_columns` numeric columns, the first of which is
/// wavelength in µm and must match `grid`.
///
/// Returns the columns after the wavelength column.
fn read_table(
    path: &Path,
    num_columns: usize,
    grid: &WavelengthGrid,
) -> Result<Vec<Vec<f64>>, SnicarError> {
    let reader = BufReader::new(File::open(path)?);
    let mut columns = vec![Vec::with_capacity(grid.len()); num_columns - 1];
    let mut row = 0;

    for (line_index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parse_error = || SnicarError::Parse {
            path: path.to_owned(),
            line: line_index + 1,
        };
        let values = line
            .split_whitespace()
            .map(|value| value.parse::<f64>().map_err(|_| parse_error()))
            .collect::<Result<Vec<_>, _>>()?;
        if values.len() != num_columns {
            return Err(parse_error());
        }

        match grid.as_slice().get(row) {
            Some(&expected) if (values[0] - expected).abs() <= WAVELENGTH_TOLERANCE => {}
            _ => return Err(SnicarError::GridMismatch(path.to_owned())),
        }
        for (column, &value) in columns.iter_mut().zip(&values[1..]) {
            column.push(value);
        }
        row += 1;
    }

    if row != grid.len() {
        return Err(SnicarError::GridMismatch(path.to_owned()));
    }
    debug!("read {row} rows from {}", path.display());
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::fixtures;

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn small_grid() -> WavelengthGrid {
        WavelengthGrid::new(vec![0.305, 0.315, 0.325]).unwrap()
    }

    #[test]
    fn reads_optics_table_with_comments() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "optics/ice_r0100.txt",
            "# wavelength ssa mac g\n\
             0.305 0.99 30.0 0.88\n\
             \n\
             0.315 0.98 31.0 0.89\n\
             0.325 0.97 32.0 0.90\n",
        );
        let store = TableDirectory::new(dir.path());
        let optics = store
            .optical_properties(&PropertyKey::ice(100.0), &small_grid())
            .unwrap();
        assert_eq!(optics.ssa, vec![0.99, 0.98, 0.97]);
        assert_eq!(optics.mac, vec![30.0, 31.0, 32.0]);
        assert_eq!(optics.asymmetry, vec![0.88, 0.89, 0.90]);
    }

    #[test]
    fn missing_file_names_the_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = TableDirectory::new(dir.path());
        match store.optical_properties(&PropertyKey::ice(250.0), &small_grid()) {
            Err(SnicarError::MissingOpticalProperty(key)) => assert_eq!(key, "ice_r0250"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn short_or_shifted_tables_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "optics/dust_1.txt",
            "0.305 0.9 1.0 0.7\n0.315 0.9 1.0 0.7\n",
        );
        write(
            dir.path(),
            "optics/dust_2.txt",
            "0.305 0.9 1.0 0.7\n0.316 0.9 1.0 0.7\n0.325 0.9 1.0 0.7\n",
        );
        write(dir.path(), "optics/dust_3.txt", "0.305 0.9 abc 0.7\n");
        let store = TableDirectory::new(dir.path());
        let grid = small_grid();

        use crate::species::Species;
        assert!(matches!(
            store.optical_properties(&PropertyKey::Impurity(Species::Dust1), &grid),
            Err(SnicarError::GridMismatch(_))
        ));
        assert!(matches!(
            store.optical_properties(&PropertyKey::Impurity(Species::Dust2), &grid),
            Err(SnicarError::GridMismatch(_))
        ));
        assert!(matches!(
            store.optical_properties(&PropertyKey::Impurity(Species::Dust3), &grid),
            Err(SnicarError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn irradiance_paths_and_values() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "irradiance/sas_clear_sza60.txt",
            "0.305 1.0\n0.315 2.0\n0.325 3.0\n",
        );
        let store = TableDirectory::new(dir.path());
        let grid = small_grid();

        let direct = store
            .irradiance(Atmosphere::SubArcticSummer, Beam::Direct, 60, &grid)
            .unwrap();
        assert_eq!(direct, vec![1.0, 2.0, 3.0]);
        assert!(matches!(
            store.irradiance(Atmosphere::SubArcticSummer, Beam::Diffuse, 60, &grid),
            Err(SnicarError::MissingOpticalProperty(_))
        ));
    }

    #[test]
    fn fixture_tables_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let grid = fixtures::grid();
        fixtures::write_tables(dir.path(), &grid, &[100]);
        let store = TableDirectory::new(dir.path());

        let from_disk = store
            .optical_properties(&PropertyKey::ice(100.0), &grid)
            .unwrap();
        let expected = fixtures::ice_optics(&grid, 100.0);
        for (a, b) in from_disk.ssa.iter().zip(&expected.ssa) {
            approx::assert_relative_eq!(a, b, max_relative = 1e-12);
        }
    }
}
