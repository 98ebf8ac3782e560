//! Reader configuration.

use crate::enums::IPCFraming;

/// Options for a single ingestion call.
///
/// The defaults sniff the framing, accept streams that end without an EOS
/// marker, and decode fields in parallel when the `parallel` feature is on.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Skip framing detection and assume this framing.
    pub framing: Option<IPCFraming>,
    /// Fail when the buffer ends without an end-of-stream marker.
    pub require_eos: bool,
    /// Convert the fields of one batch on the rayon pool.
    pub parallel_fields: bool,
    /// Name for the assembled table.
    pub table_name: Option<String>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            framing: None,
            require_eos: false,
            parallel_fields: true,
            table_name: None,
        }
    }
}

impl ReadOptions {
    pub fn with_framing(mut self, framing: IPCFraming) -> Self {
        self.framing = Some(framing);
        self
    }

    pub fn with_require_eos(mut self, require_eos: bool) -> Self {
        self.require_eos = require_eos;
        self
    }

    pub fn with_parallel_fields(mut self, parallel: bool) -> Self {
        self.parallel_fields = parallel;
        self
    }

    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = Some(name.into());
        self
    }

    /// Whether field-parallel decoding is both requested and compiled in.
    #[inline]
    pub(crate) fn use_parallel(&self) -> bool {
        cfg!(feature = "parallel") && self.parallel_fields
    }
}
