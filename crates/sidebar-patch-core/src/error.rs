use crate::host::Region;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    /// The host page did not contain exactly one element for a structural role.
    #[error("expected exactly one {region} element, found {found}")]
    MissingRegion { region: Region, found: usize },
    /// Structure created by the controller no longer has the shape it left behind.
    #[error("invalid {context}: {detail}")]
    InvalidStructure {
        context: &'static str,
        detail: String,
    },
    #[error("host document operation failed: {0}")]
    Host(String),
}

impl PatchError {
    pub fn invalid_structure(context: &'static str, detail: impl Into<String>) -> Self {
        Self::InvalidStructure {
            context,
            detail: detail.into(),
        }
    }

    /// Mismatches the host resolves on its own (not ready yet, or mid-render).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::MissingRegion { .. })
    }
}
