use crate::error::ModelError;

/// Which list the UI is showing, and therefore which store query backs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewMode {
    /// Catalog browsing, most recently updated first.
    ReleaseCard = 0,
    /// History browsing, most recently watched first.
    WatchedReleaseCard = 1,
}

impl TryFrom<i32> for ViewMode {
    type Error = ModelError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::ReleaseCard),
            1 => Ok(Self::WatchedReleaseCard),
            other => Err(ModelError::UnknownViewMode(other)),
        }
    }
}
