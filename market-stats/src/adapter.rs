use crate::{
    fields::{AggregateResponse, AggregateRow, ContractError, ExecutionMode, VersionGate},
    settings::ContractSettings,
};

/// Entry point of the adapter pipeline: validates the response contract and
/// releases its rows to the transforms.
#[derive(Debug, Clone, Default)]
pub struct Adapter {
    gate: VersionGate,
}

impl Adapter {
    pub fn new(gate: VersionGate) -> Self {
        Self { gate }
    }

    pub fn from_settings(settings: &ContractSettings) -> Self {
        Self::new(VersionGate::new(
            settings.supported_versions.iter().copied(),
            settings.mode,
        ))
    }

    pub fn mode(&self) -> ExecutionMode {
        self.gate.mode()
    }

    pub fn gate(&self) -> &VersionGate {
        &self.gate
    }

    pub fn accept(&self, response: AggregateResponse) -> Result<Vec<AggregateRow>, ContractError> {
        let version = self.gate.check(&response.meta)?;
        tracing::trace!(
            version = ?version,
            rows = response.data.len(),
            "accepted aggregate response"
        );
        Ok(response.data)
    }
}
