pub mod document;
pub mod snapshot;

pub use document::{
    export_document, export_json, import_document, import_json, ImportError, WorldDocument,
    DOCUMENT_VERSION, MAX_GRID_SIDE,
};
pub use snapshot::{
    list_snapshots, load_latest_valid_snapshot, load_snapshot, prune_snapshots, save_snapshot,
    read_header, SnapshotError, SnapshotHeader, SnapshotMetadata,
};
