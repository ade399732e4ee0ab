use crate::{GdidBlock, Result};

/// A block allocation request, as carried by any transport.
///
/// `block_size` and `vicinity` are optional; the receiving authority fills in
/// its configured defaults. The authority id is never part of the request —
/// it is fixed per authority instance.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AllocateRequest {
    pub scope: String,
    pub sequence: String,
    pub block_size: Option<u32>,
    pub vicinity: Option<u64>,
}

impl AllocateRequest {
    pub fn new(scope: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            sequence: sequence.into(),
            block_size: None,
            vicinity: None,
        }
    }

    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = Some(block_size);
        self
    }

    pub fn with_vicinity(mut self, vicinity: u64) -> Self {
        self.vicinity = Some(vicinity);
        self
    }
}

/// One reachable authority, behind whatever transport the deployment uses.
///
/// The contract is deliberately small: one allocation per call, returning
/// either a disjoint [`GdidBlock`] or a structured [`Error`]. Duplicate
/// *requests* are harmless (each receives a fresh disjoint block), so a
/// transport does not need at-most-once delivery.
///
/// `gdid-authority` implements this for in-process hosting; network transports
/// implement it by serializing [`AllocateRequest`]/[`GdidBlock`].
///
/// [`Error`]: crate::Error
#[async_trait::async_trait]
pub trait AuthorityEndpoint: Send + Sync {
    /// A stable name for diagnostics and error reporting.
    fn name(&self) -> &str;

    /// Requests one block. Must not retain partial state across calls.
    async fn allocate(&self, request: AllocateRequest) -> Result<GdidBlock>;
}
