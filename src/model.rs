//! Everything a configuration needs, loaded once and shared by every column
//! of a run.

use log::{debug, info};
use rayon::prelude::*;

use crate::column::SnowColumn;
use crate::config::RunConfig;
use crate::error::SnicarError;
use crate::illumination::{Illumination, IrradianceProvider};
use crate::optics::{OpticalLibrary, OpticalPropertyProvider, TableDirectory, WavelengthGrid};
use crate::rtm::{RtmInputs, RtmOutputs, RtmParameters};

/// A configured solver with its optical tables and illumination.
///
/// A `Model` is read-only once built, so one instance can serve any number of
/// threads.
#[derive(Debug, Clone)]
pub struct Model {
    parameters: RtmParameters,
    library: OpticalLibrary,
    illumination: Illumination,
    surface_albedo: Vec<f64>,
    num_threads: Option<usize>,
}

impl Model {
    /// Load the tables under `config.data_dir` needed to run `columns` on
    /// the default grid.
    pub fn load<'a>(
        config: &RunConfig,
        columns: impl IntoIterator<Item = &'a SnowColumn>,
    ) -> Result<Self, SnicarError> {
        let store = TableDirectory::new(&config.data_dir);
        Self::with_providers(
            config,
            &WavelengthGrid::snicar_default(),
            &store,
            &store,
            columns,
        )
    }

    /// Build from arbitrary providers.
    pub fn with_providers<'a>(
        config: &RunConfig,
        grid: &WavelengthGrid,
        optics: &dyn OpticalPropertyProvider,
        irradiance: &dyn IrradianceProvider,
        columns: impl IntoIterator<Item = &'a SnowColumn>,
    ) -> Result<Self, SnicarError> {
        config.validate()?;
        let parameters = config.parameters();
        let library = OpticalLibrary::load(optics, grid, columns, parameters.algae.radius_um)?;
        let illumination = Illumination::load(
            irradiance,
            grid,
            config.atmosphere,
            config.cos_zenith,
            config.diffuse_fraction,
        )?;
        let surface_albedo = config.surface_albedo.spectrum(grid)?;
        debug!(
            "model ready: {:?} closure, delta {}, μ₀ = {}",
            parameters.closure, parameters.delta, parameters.cos_zenith
        );

        Ok(Self {
            parameters,
            library,
            illumination,
            surface_albedo,
            num_threads: config.num_threads,
        })
    }

    /// The wavelength grid of every output.
    pub fn grid(&self) -> &WavelengthGrid {
        self.library.grid()
    }

    /// Solver settings.
    pub fn parameters(&self) -> &RtmParameters {
        &self.parameters
    }

    /// Incident flux.
    pub fn illumination(&self) -> &Illumination {
        &self.illumination
    }

    /// Solve one column.
    ///
    /// The column's optical tables must have been loaded with the model.
    pub fn run(&self, column: &SnowColumn) -> Result<RtmOutputs, SnicarError> {
        let optics = self.library.resolve(column, self.parameters.algae.radius_um)?;
        let inputs = RtmInputs::new(
            self.library.grid(),
            column,
            optics,
            &self.illumination,
            &self.surface_albedo,
        )?;
        inputs.run(&self.parameters)
    }

    /// Solve many columns in parallel, on `num_threads` workers (or the
    /// configured count). A column that fails doesn't stop the others.
    pub fn run_batch(
        &self,
        columns: &[SnowColumn],
        num_threads: Option<usize>,
    ) -> Result<Vec<Result<RtmOutputs, SnicarError>>, SnicarError> {
        let pool = self.thread_pool(num_threads)?;
        info!(
            "running {} columns on {} threads",
            columns.len(),
            pool.current_num_threads()
        );
        Ok(pool.install(|| columns.par_iter().map(|column| self.run(column)).collect()))
    }

    /// A thread pool sized by `num_threads`, falling back to the configured
    /// count and then to the rayon default.
    pub fn thread_pool(&self, num_threads: Option<usize>) -> Result<rayon::ThreadPool, SnicarError> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads.or(self.num_threads).unwrap_or(0))
            .build()
            .map_err(|e| SnicarError::InvalidConfig(format!("can't start worker threads: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::column::Layer;
    use crate::config::SurfaceAlbedo;
    use crate::fixtures;
    use crate::species::Species;

    fn columns() -> Vec<SnowColumn> {
        vec![
            fixtures::column(vec![Layer::new(1000.0, 150.0, 100.0)]),
            fixtures::column(vec![
                Layer::new(0.05, 150.0, 100.0).with_impurity(Species::BlackCarbon, 1000.0),
                Layer::new(1000.0, 150.0, 100.0),
            ]),
            fixtures::column(vec![
                Layer::new(0.05, 150.0, 100.0)
                    .with_impurity(Species::Dust1, 6.0e8)
                    .with_impurity(Species::Dust2, 6.0e8),
            ]),
        ]
    }

    #[test]
    fn loads_tables_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let grid = fixtures::grid();
        fixtures::write_tables(dir.path(), &grid, &[100]);
        let config = RunConfig {
            data_dir: dir.path().to_owned(),
            ..Default::default()
        };
        let columns = columns();

        let model = Model::load(&config, &columns).unwrap();
        assert_eq!(model.grid().len(), 480);
        let direct: f64 = model.illumination().direct().iter().sum();
        assert_relative_eq!(direct, 1.0, max_relative = 1e-12);

        let from_disk = model.run(&columns[0]).unwrap();
        let in_memory = Model::with_providers(
            &config,
            &grid,
            &fixtures::Provider,
            &fixtures::Provider,
            &columns,
        )
        .unwrap()
        .run(&columns[0])
        .unwrap();
        assert_relative_eq!(
            from_disk.summary.albedo.broadband,
            in_memory.summary.albedo.broadband,
            max_relative = 1e-12
        );
    }

    #[test]
    fn missing_tables_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let grid = fixtures::grid();
        fixtures::write_tables(dir.path(), &grid, &[100]);
        let config = RunConfig {
            data_dir: dir.path().to_owned(),
            ..Default::default()
        };
        let coarse = fixtures::column(vec![Layer::new(1.0, 300.0, 250.0)]);

        match Model::load(&config, [&coarse]) {
            Err(SnicarError::MissingOpticalProperty(key)) => assert_eq!(key, "ice_r0250"),
            other => panic!("unexpected {other:?}"),
        }

        // A column the model wasn't loaded for
        let model = Model::load(&config, &columns()).unwrap();
        assert!(matches!(
            model.run(&coarse),
            Err(SnicarError::MissingOpticalProperty(_))
        ));
    }

    #[test]
    fn batch_isolates_failures() {
        let grid = fixtures::grid();
        let columns = columns();
        let model = Model::with_providers(
            &RunConfig::default(),
            &grid,
            &fixtures::Provider,
            &fixtures::Provider,
            &columns,
        )
        .unwrap();

        let results = model.run_batch(&columns, Some(2)).unwrap();
        assert_eq!(results.len(), 3);
        let clean = results[0].as_ref().unwrap();
        let sooty = results[1].as_ref().unwrap();
        assert!(sooty.summary.albedo.broadband < clean.summary.albedo.broadband);
        assert!(matches!(
            results[2],
            Err(SnicarError::InvalidImpurityLoad { layer: 0, .. })
        ));

        // Same answer as a single run
        let single = model.run(&columns[1]).unwrap();
        assert_eq!(single.albedo, sooty.albedo);
    }

    #[test]
    fn spectral_surface_albedo_must_match_grid() {
        let grid = fixtures::grid();
        let config = RunConfig {
            surface_albedo: SurfaceAlbedo::Spectral(vec![0.3; 10]),
            ..Default::default()
        };
        assert!(matches!(
            Model::with_providers(&config, &grid, &fixtures::Provider, &fixtures::Provider, &columns()),
            Err(SnicarError::InvalidConfig(_))
        ));
    }
}
