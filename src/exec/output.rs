// src/exec/output.rs

//! Console output multiplexing for concurrently building modules.
//!
//! Each worker writes through a [`UnitOutput`]. In [`OutputMode::Prefixed`]
//! every line goes straight to the sink as `[unit] line`; in
//! [`OutputMode::Buffered`] a unit's lines are held back and written as one
//! block when the unit finishes, so modules never interleave.

use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::types::{BuildUnit, OutputMode};

struct MuxInner {
    sink: Box<dyn Write + Send>,
    mode: OutputMode,
    pending: HashMap<BuildUnit, Vec<String>>,
}

impl MuxInner {
    fn emit(&mut self, unit: &BuildUnit, line: &str) {
        if let Err(e) = writeln!(self.sink, "[{unit}] {line}") {
            warn!(unit = %unit, error = %e, "failed to write module output");
        }
    }
}

#[derive(Clone)]
pub struct OutputMux {
    inner: Arc<Mutex<MuxInner>>,
}

impl fmt::Debug for OutputMux {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputMux")
            .field("mode", &self.mode())
            .finish_non_exhaustive()
    }
}

impl OutputMux {
    pub fn new(sink: impl Write + Send + 'static, mode: OutputMode) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MuxInner {
                sink: Box::new(sink),
                mode,
                pending: HashMap::new(),
            })),
        }
    }

    pub fn stdout(mode: OutputMode) -> Self {
        Self::new(std::io::stdout(), mode)
    }

    pub fn mode(&self) -> OutputMode {
        self.lock().mode
    }

    /// Writer handle for one unit.
    pub fn unit(&self, unit: &BuildUnit) -> UnitOutput {
        UnitOutput {
            unit: unit.clone(),
            mux: self.clone(),
        }
    }

    pub fn write_line(&self, unit: &BuildUnit, line: &str) {
        let mut inner = self.lock();
        match inner.mode {
            OutputMode::Prefixed => inner.emit(unit, line),
            OutputMode::Buffered => inner
                .pending
                .entry(unit.clone())
                .or_default()
                .push(line.to_string()),
        }
    }

    /// Flush whatever `unit` buffered. Called once the unit reached a
    /// terminal state; a no-op in prefixed mode.
    pub fn finish(&self, unit: &BuildUnit) {
        let mut inner = self.lock();
        if let Some(lines) = inner.pending.remove(unit) {
            for line in lines.iter() {
                inner.emit(unit, line);
            }
        }
        if let Err(e) = inner.sink.flush() {
            warn!(error = %e, "failed to flush module output");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MuxInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Line sink bound to a single unit.
#[derive(Debug, Clone)]
pub struct UnitOutput {
    unit: BuildUnit,
    mux: OutputMux,
}

impl UnitOutput {
    pub fn line(&self, line: &str) {
        self.mux.write_line(&self.unit, line);
    }
}
