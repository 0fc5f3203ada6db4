//! Engine error taxonomy.

use thiserror::Error;

use stationview_store::StoreError;

/// Errors surfaced by a station overview resolution.
///
/// Only top-level failures land here: a bad request, a failed collaborator
/// fetch, or an undecodable top-level document. Everything below that —
/// undecodable dictionary entries, missing live-value records, structural
/// cycles — degrades inside the resolution and never aborts it.
#[derive(Debug, Error)]
pub enum OverviewError {
    /// The request carried no usable station identifier.
    #[error("missing or empty station id")]
    InvalidStationId,

    /// A top-level collaborator fetch failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A top-level document was malformed or not an object.
    #[error("failed to decode {document} document for station '{station_id}'")]
    Decode {
        /// Which document failed: `"basic"` or `"index"`.
        document: &'static str,
        /// Station the document belongs to.
        station_id: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// A directory key was absent from the value store.
    #[error("value store key '{key}' not found")]
    MissingKey {
        /// The absent key.
        key: String,
    },
}
