// SRF Engine - Instance Population
//
// Collection of independent instances keyed by cell index, sharing one
// read-only parameter set.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::core::config::{SrfConfig, SrfMode};
use crate::core::draws::UniformSource;
use crate::core::flux::FluxMultipliers;
use crate::core::parameters::DistributionParameters;
use crate::error::SrfError;

use super::settings::{load_settings, EventRecord, SettingsWriter};
use super::{SrfInstance, StepInput};

/// Instances for every simulated cell (or calcium release unit).
///
/// Instances never read each other's state, so a host may step disjoint
/// cells from different threads via `iter_mut`.
#[derive(Debug, Clone)]
pub struct SrfPopulation {
    cells: BTreeMap<usize, SrfInstance>,
    params: Option<Arc<DistributionParameters>>,
}

impl SrfPopulation {
    /// Builds `cell_count` instances from a validated configuration.
    ///
    /// In `Read` mode the instances replay `config.settings_path`; cells
    /// without a record stay silent.
    ///
    /// # Errors
    ///
    /// Any configuration error from validation or the parameter store, or
    /// an I/O / parse error from the settings file.
    #[tracing::instrument(skip(config), fields(mode = %config.mode))]
    pub fn from_config(config: &SrfConfig, cell_count: usize) -> Result<Self, SrfError> {
        config.validate()?;
        if config.mode == SrfMode::Read {
            let path = config
                .settings_path
                .as_ref()
                .ok_or_else(|| SrfError::Config("Read mode requires settings_path".to_string()))?;
            return Self::from_settings(path, cell_count);
        }

        let params = Arc::new(DistributionParameters::from_config(config)?);
        let cells = (0..cell_count)
            .map(|cell| {
                let shift = config.heterogeneity.threshold_shift(cell, cell_count);
                let instance = SrfInstance::new(cell, Arc::clone(&params), config)
                    .with_threshold_shift(shift);
                (cell, instance)
            })
            .collect();
        tracing::info!(cells = cell_count, set = %config.parameter_set, "built SRF population");
        Ok(Self {
            cells,
            params: Some(params),
        })
    }

    /// Builds a Read-mode population replaying the first recorded event of
    /// each cell in `path`. Records for cells at or beyond `cell_count` are
    /// ignored.
    pub fn from_settings(path: impl AsRef<Path>, cell_count: usize) -> Result<Self, SrfError> {
        let records = load_settings(path)?;
        Ok(Self::from_records(&records, cell_count))
    }

    /// Builds a Read-mode population from already loaded records.
    pub fn from_records(records: &BTreeMap<usize, EventRecord>, cell_count: usize) -> Self {
        let cells = (0..cell_count)
            .map(|cell| {
                let instance = match records.get(&cell) {
                    Some(record) => SrfInstance::replay(record),
                    None => SrfInstance::idle_replay(cell),
                };
                (cell, instance)
            })
            .collect();
        Self {
            cells,
            params: None,
        }
    }

    /// Shared parameter set, absent in Read mode.
    pub fn parameters(&self) -> Option<&Arc<DistributionParameters>> {
        self.params.as_ref()
    }

    pub fn get(&self, cell: usize) -> Result<&SrfInstance, SrfError> {
        self.cells.get(&cell).ok_or(SrfError::UnknownCell { cell })
    }

    pub fn get_mut(&mut self, cell: usize) -> Result<&mut SrfInstance, SrfError> {
        self.cells.get_mut(&cell).ok_or(SrfError::UnknownCell { cell })
    }

    /// Steps one cell and returns its open-RyR proxy.
    pub fn step<U: UniformSource + ?Sized>(
        &mut self,
        cell: usize,
        input: StepInput,
        rng: &mut U,
    ) -> Result<f64, SrfError> {
        Ok(self.get_mut(cell)?.step(input, rng))
    }

    pub fn flux_multipliers(&self, cell: usize) -> Result<FluxMultipliers, SrfError> {
        Ok(self.get(cell)?.flux_multipliers())
    }

    /// Enables transition logging on every instance.
    pub fn with_logs(mut self, max_events: usize) -> Self {
        self.cells = std::mem::take(&mut self.cells)
            .into_iter()
            .map(|(cell, instance)| (cell, instance.with_log(max_events)))
            .collect();
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&usize, &SrfInstance)> {
        self.cells.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&usize, &mut SrfInstance)> {
        self.cells.iter_mut()
    }

    /// Takes every pending event record, ordered by cell.
    pub fn drain_records(&mut self) -> Vec<EventRecord> {
        self.cells
            .values_mut()
            .flat_map(|instance| std::iter::from_fn(move || instance.take_record()))
            .collect()
    }

    /// Takes pending records and appends them to `writer`.
    pub fn write_records<W: std::io::Write>(
        &mut self,
        writer: &mut SettingsWriter<W>,
    ) -> std::io::Result<usize> {
        let records = self.drain_records();
        writer.write_records(&records)?;
        Ok(records.len())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
