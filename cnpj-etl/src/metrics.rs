//! Metric names and labels recorded through the `metrics` facade.

pub const TABLE_NAME_LABEL: &str = "table_name";

pub const DESTINATION_LABEL: &str = "destination";

pub const DEFECT_LABEL: &str = "defect";

/// Counter of rows accepted by the destination.
pub const CNPJ_ROWS_LOADED_TOTAL: &str = "cnpj_rows_loaded_total";

/// Counter of rows rejected by the destination as part of a rejected batch.
pub const CNPJ_ROWS_REJECTED_TOTAL: &str = "cnpj_rows_rejected_total";

/// Histogram of the time spent in one bulk transfer call.
pub const CNPJ_BATCH_SEND_DURATION_SECONDS: &str = "cnpj_batch_send_duration_seconds";

/// Counter of assembled company documents.
pub const CNPJ_DOCUMENTS_ASSEMBLED_TOTAL: &str = "cnpj_documents_assembled_total";

/// Counter of defects absorbed without stopping a table (malformed rows, skipped files).
pub const CNPJ_DEFECTS_TOTAL: &str = "cnpj_defects_total";
