//! Shared vocabulary of the refined-zone pipeline: job parameters, the
//! stage error taxonomy, and the canonical Arrow schemas exchanged between
//! stages.

use std::collections::BTreeMap;
use std::path::PathBuf;

use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Columns the raw snapshot must expose before any transformation runs.
pub const EXPECTED_COLUMNS: [&str; 8] = [
    "results_segment",
    "results_asset",
    "results_cod",
    "results_type",
    "results_theoricalQty",
    "results_part",
    "results_partAcum",
    "header_date",
];

/// Non-essential raw columns projected away by the cleansing stage: page
/// metadata and header fields duplicated on every row.
pub const DROP_COLUMNS: [&str; 10] = [
    "page_pageNumber",
    "page_pageSize",
    "page_totalRecords",
    "page_totalPages",
    "header_text",
    "header_part",
    "header_partAcum",
    "header_textReductor",
    "header_reductor",
    "header_theoricalQty",
];

/// Partition keys of the curated store, in directory order.
pub const PARTITION_KEYS: [&str; 4] = ["year", "month", "day", "nom_setor"];

/// Participation percentages as stored on normalized records.
pub const PERC_PRECISION: u8 = 5;
pub const PERC_SCALE: i8 = 3;

/// Averages of participation percentages widen the scale by four digits.
pub const AVG_PRECISION: u8 = 9;
pub const AVG_SCALE: i8 = 7;

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Pipeline-wide error taxonomy. Every stage surfaces one of these to the
/// invocation boundary unmodified; there is no local recovery or retry.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Required invocation parameters absent or empty, checked pre-flight.
    #[error("missing required job parameters: {0:?}")]
    MissingParams(Vec<String>),
    /// Expected columns absent from the raw batch. Lists every missing name.
    #[error("missing expected columns: {0:?}")]
    MissingColumns(Vec<String>),
    /// A value that cannot be coerced to its canonical type. Aborts the run.
    #[error("cannot convert column '{column}' value '{value}': {reason}")]
    Conversion {
        column: String,
        value: String,
        reason: String,
    },
    /// Read/write failure against the raw or curated store.
    #[error("storage failure: {0}")]
    Storage(String),
    /// Catalog lookup/create failure that is not a plain "not found".
    #[error("catalog failure: {0}")]
    Catalog(String),
    /// Partition discovery failure against the query layer.
    #[error("partition discovery failure: {0}")]
    Discovery(String),
}

impl PipelineError {
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }

    pub fn catalog(err: impl std::fmt::Display) -> Self {
        Self::Catalog(err.to_string())
    }

    pub fn discovery(err: impl std::fmt::Display) -> Self {
        Self::Discovery(err.to_string())
    }

    pub fn conversion(column: &str, value: &str, reason: impl std::fmt::Display) -> Self {
        Self::Conversion {
            column: column.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Job parameters
// ---------------------------------------------------------------------------

/// Required invocation parameters, in reporting order.
pub const REQUIRED_PARAMS: [&str; 8] = [
    "job_name",
    "table_name",
    "database_name",
    "input_root",
    "object_key",
    "output_root",
    "output_prefix",
    "region",
];

/// Resolved invocation parameters. Construction validates presence of the
/// full required set before any stage runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobParams {
    pub job_name: String,
    pub table_name: String,
    pub database_name: String,
    pub input_root: PathBuf,
    pub object_key: String,
    pub output_root: PathBuf,
    pub output_prefix: String,
    pub region: String,
}

impl JobParams {
    /// Validates and types a raw key/value mapping. Fails with
    /// [`PipelineError::MissingParams`] naming every absent or empty
    /// parameter, not just the first.
    pub fn resolve(raw: &BTreeMap<String, String>) -> Result<Self, PipelineError> {
        let missing: Vec<String> = REQUIRED_PARAMS
            .iter()
            .filter(|key| raw.get(**key).map_or(true, |v| v.trim().is_empty()))
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::MissingParams(missing));
        }
        let get = |key: &str| raw[key].trim().to_string();
        Ok(Self {
            job_name: get("job_name"),
            table_name: get("table_name"),
            database_name: get("database_name"),
            input_root: PathBuf::from(get("input_root")),
            object_key: get("object_key"),
            output_root: PathBuf::from(get("output_root")),
            output_prefix: get("output_prefix"),
            region: get("region"),
        })
    }

    /// Location of the raw snapshot to refine.
    pub fn input_location(&self) -> PathBuf {
        self.input_root.join(&self.object_key)
    }

    /// Destination of the curated partitioned dataset.
    pub fn output_location(&self) -> PathBuf {
        self.output_root.join(&self.output_prefix)
    }
}

/// Encodes a job-parameter mapping to the compact base64(JSON) token the
/// upstream trigger hands around.
pub fn encode_params(params: &BTreeMap<String, serde_json::Value>) -> String {
    // BTreeMap keeps key order stable, so encoding is deterministic.
    let json = serde_json::to_string(params).expect("string-keyed JSON map always serializes");
    BASE64.encode(json.as_bytes())
}

/// A job-parameter token that is not valid base64(JSON).
#[derive(Debug, Error)]
#[error("invalid job-parameter token: {0}")]
pub struct TokenError(String);

/// Decodes a token produced by [`encode_params`].
pub fn decode_params(token: &str) -> Result<BTreeMap<String, serde_json::Value>, TokenError> {
    let bytes = BASE64
        .decode(token)
        .map_err(|e| TokenError(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| TokenError(e.to_string()))
}

// ---------------------------------------------------------------------------
// Canonical schemas
// ---------------------------------------------------------------------------

/// Schema of a normalized batch: canonical business names, converted types,
/// zero nulls by construction.
pub fn normalized_schema() -> Schema {
    use DataType::*;
    Schema::new(vec![
        Field::new("nom_setor", Utf8, false),
        Field::new("nom_empresa", Utf8, false),
        Field::new("cod_acao", Utf8, false),
        Field::new("des_tipo_acao", Utf8, false),
        Field::new("qtd_teorica", Int64, false),
        Field::new(
            "perc_participacao_setor",
            Decimal128(PERC_PRECISION, PERC_SCALE),
            false,
        ),
        Field::new(
            "perc_participacao_setor_acumulada",
            Decimal128(PERC_PRECISION, PERC_SCALE),
            false,
        ),
        Field::new("data_ref", Date32, false),
        Field::new("year", Int32, false),
        Field::new("month", Int32, false),
        Field::new("day", Int32, false),
    ])
}

/// Schema of the aggregated output, one row per
/// (nom_setor, nom_empresa, data_ref, year, month, day) group.
pub fn aggregate_schema() -> Schema {
    use DataType::*;
    Schema::new(vec![
        Field::new("nom_empresa", Utf8, false),
        Field::new("qtd_registros", Int64, false),
        Field::new("qtd_acao", Int64, false),
        Field::new("qtd_tipos_acao", Int64, false),
        Field::new("qtd_teorica_acumulada", Int64, false),
        Field::new("qtd_teorica_max", Int64, false),
        Field::new("qtd_teorica_min", Int64, false),
        Field::new(
            "avg_participacao_setor_total",
            Decimal128(AVG_PRECISION, AVG_SCALE),
            false,
        ),
        Field::new(
            "avg_participacao_setor_acumulada_total",
            Decimal128(AVG_PRECISION, AVG_SCALE),
            false,
        ),
        Field::new("qtd_dias_atraso", Int32, false),
        Field::new("data_ref", Date32, false),
        Field::new(
            "dth_etl_processamento",
            Timestamp(TimeUnit::Microsecond, None),
            false,
        ),
        Field::new("year", Int32, false),
        Field::new("month", Int32, false),
        Field::new("day", Int32, false),
        Field::new("nom_setor", Utf8, false),
    ])
}
