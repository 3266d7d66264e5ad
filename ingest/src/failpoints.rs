//! Named failpoints compiled in with the `failpoints` feature.
//!
//! Without the feature [`ingest_fail_point`] is a no-op.

use fail::fail_point;

use crate::bail;
use crate::error::{ErrorKind, IngestResult};

/// Evaluated inside the write transaction after the first table has been inserted.
pub const WRITE_BATCH__AFTER_FIRST_TABLE: &str = "write_batch.after_first_table";

/// Evaluated before the deduplication lookup.
pub const DEDUPLICATE__BEFORE_LOOKUP: &str = "deduplicate.before_lookup";

/// Returns an error when the failpoint `name` is configured to `return`.
///
/// The optional parameter selects the kind: `io`, `connection` or `query` (default).
pub fn ingest_fail_point(name: &str) -> IngestResult<()> {
    fail_point!(name, |parameter| {
        let error_kind = match parameter.as_deref() {
            Some("io") => ErrorKind::StoreIoError,
            Some("connection") => ErrorKind::StoreConnectionFailed,
            _ => ErrorKind::StoreQueryFailed,
        };

        bail!(
            error_kind,
            "An error occurred in a fail point",
            format!("The failpoint '{name}' returned an error")
        );
    });

    Ok(())
}
