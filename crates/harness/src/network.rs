use std::path::Path;

use attendlog_engine::{ApplyOutcome, EngineError};
use attendlog_storage::Storage;

use crate::TestDevice;

/// Several devices exchanging change logs.
pub struct TestNetwork {
    devices: Vec<TestDevice>,
}

impl Default for TestNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl TestNetwork {
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
        }
    }

    pub fn add_device(&mut self, contributor: &str) -> Result<usize, EngineError> {
        let device = TestDevice::new(contributor)?;
        let index = self.devices.len();
        self.devices.push(device);
        Ok(index)
    }

    pub fn device(&self, index: usize) -> &TestDevice {
        &self.devices[index]
    }

    pub fn device_mut(&mut self, index: usize) -> &mut TestDevice {
        &mut self.devices[index]
    }

    /// Replay everything `from` has captured onto `to`.
    ///
    /// Afterwards `from`'s clock is moved past every stamp `to` holds, so
    /// changes `from` makes next are newer than the watermark `to` just kept.
    pub fn sync(&mut self, from: usize, to: usize) -> Result<ApplyOutcome, EngineError> {
        let records = self.devices[from].entries()?;
        let outcome = self.devices[to].apply(&records)?;
        self.align(from, to)?;
        Ok(outcome)
    }

    /// Like `sync`, but through an exported log file in `dir`.
    pub fn sync_via_file(
        &mut self,
        from: usize,
        to: usize,
        dir: &Path,
    ) -> Result<ApplyOutcome, EngineError> {
        let path = dir.join(format!("{}.log", self.devices[from].contributor()));
        self.devices[from].engine.output(Some(path.as_path()))?;
        let target = &mut self.devices[to];
        let records = target.engine.read_log_file(&path)?;
        let outcome = target.apply(&records)?;
        self.align(from, to)?;
        Ok(outcome)
    }

    fn align(&mut self, from: usize, to: usize) -> Result<(), EngineError> {
        let newest = self.devices[to].storage()?.tick();
        self.devices[from].storage()?.observe(newest);
        Ok(())
    }
}
