//! Raw snapshot -> normalized batches: schema validation, null cleansing,
//! and type normalization of the market-index portfolio data.
//!
//! The three stages run strictly in order and each consumes the previous
//! stage's complete output. Any unparseable value aborts the run; the
//! cleanser is the only null-tolerant stage.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Date32Builder, Decimal128Builder, Int32Builder, Int64Builder,
    RecordBatch, StringArray, StringBuilder,
};
use arrow::compute::{and, filter_record_batch, is_not_null};
use arrow::datatypes::{Schema, SchemaRef};
use chrono::{Datelike, NaiveDate};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::info;

use model::{
    normalized_schema, PipelineError, DROP_COLUMNS, EXPECTED_COLUMNS, PERC_PRECISION, PERC_SCALE,
};

const DATE_FORMAT: &str = "%d/%m/%y";

#[derive(Debug, Clone)]
pub struct RefineConfig {
    /// Directory (or single file) holding the raw parquet snapshot.
    pub input_location: PathBuf,
}

#[derive(Debug, Default, Clone)]
pub struct RefineStats {
    pub rows_in: u64,
    pub rows_removed: u64,
    pub rows_out: u64,
}

/// Reads the raw snapshot and runs validate -> cleanse -> normalize.
pub async fn refine_dataset(
    cfg: RefineConfig,
) -> Result<(Vec<RecordBatch>, RefineStats), PipelineError> {
    let (schema, batches) = read_raw(&cfg.input_location)?;
    let rows_in: u64 = batches.iter().map(|b| b.num_rows() as u64).sum();
    info!(rows = rows_in, location = %cfg.input_location.display(), "raw snapshot read");

    validate_schema(&schema)?;
    info!("schema validation passed");

    let (cleansed, rows_removed) = cleanse(&batches)?;
    let normalized = normalize(&cleansed)?;
    let rows_out: u64 = normalized.iter().map(|b| b.num_rows() as u64).sum();
    info!(rows = rows_out, "normalization complete");

    Ok((
        normalized,
        RefineStats {
            rows_in,
            rows_removed,
            rows_out,
        },
    ))
}

/// Reads every parquet object under `location` (recursing into partition
/// directories) into memory.
pub fn read_raw(location: &Path) -> Result<(SchemaRef, Vec<RecordBatch>), PipelineError> {
    let mut files = Vec::new();
    collect_parquet_files(location, &mut files)?;
    if files.is_empty() {
        return Err(PipelineError::Storage(format!(
            "no parquet objects at {}",
            location.display()
        )));
    }
    files.sort();

    let mut schema: Option<SchemaRef> = None;
    let mut batches = Vec::new();
    for path in files {
        let file =
            File::open(&path).map_err(|e| PipelineError::Storage(format!("open {}: {e}", path.display())))?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .and_then(|b| b.build())
            .map_err(|e| PipelineError::Storage(format!("read {}: {e}", path.display())))?;
        for batch in reader {
            let batch =
                batch.map_err(|e| PipelineError::Storage(format!("read {}: {e}", path.display())))?;
            schema.get_or_insert_with(|| batch.schema());
            batches.push(batch);
        }
    }
    // A snapshot of empty files still carries a schema via the footer.
    let schema = match schema {
        Some(s) => s,
        None => {
            let path = first_parquet_file(location)?;
            let file = File::open(&path)
                .map_err(|e| PipelineError::Storage(format!("open {}: {e}", path.display())))?;
            ParquetRecordBatchReaderBuilder::try_new(file)
                .map_err(|e| PipelineError::Storage(format!("read {}: {e}", path.display())))?
                .schema()
                .clone()
        }
    };
    Ok((schema, batches))
}

fn collect_parquet_files(location: &Path, out: &mut Vec<PathBuf>) -> Result<(), PipelineError> {
    if location.is_file() {
        out.push(location.to_path_buf());
        return Ok(());
    }
    let entries = std::fs::read_dir(location)
        .map_err(|e| PipelineError::Storage(format!("list {}: {e}", location.display())))?;
    for entry in entries {
        let path = entry
            .map_err(|e| PipelineError::Storage(format!("list {}: {e}", location.display())))?
            .path();
        if path.is_dir() {
            collect_parquet_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "parquet") {
            out.push(path);
        }
    }
    Ok(())
}

fn first_parquet_file(location: &Path) -> Result<PathBuf, PipelineError> {
    let mut files = Vec::new();
    collect_parquet_files(location, &mut files)?;
    files.sort();
    files.into_iter().next().ok_or_else(|| {
        PipelineError::Storage(format!("no parquet objects at {}", location.display()))
    })
}

/// Checks the batch schema exposes the full expected column set. The error
/// lists every missing column, not just the first.
pub fn validate_schema(schema: &Schema) -> Result<(), PipelineError> {
    let missing: Vec<String> = EXPECTED_COLUMNS
        .iter()
        .filter(|name| schema.index_of(name).is_err())
        .map(|name| name.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::MissingColumns(missing))
    }
}

/// Projects away the non-essential columns, then drops every row carrying at
/// least one null across the remaining columns. Logs the removed-row count.
pub fn cleanse(batches: &[RecordBatch]) -> Result<(Vec<RecordBatch>, u64), PipelineError> {
    let mut out = Vec::with_capacity(batches.len());
    let mut removed = 0u64;
    for batch in batches {
        let projected = drop_columns(batch)?;
        let kept = drop_null_rows(&projected)?;
        removed += (projected.num_rows() - kept.num_rows()) as u64;
        out.push(kept);
    }
    info!(rows_removed = removed, "null rows removed by cleansing");
    Ok((out, removed))
}

fn drop_columns(batch: &RecordBatch) -> Result<RecordBatch, PipelineError> {
    let schema = batch.schema();
    let keep: Vec<usize> = (0..schema.fields().len())
        .filter(|&i| !DROP_COLUMNS.contains(&schema.field(i).name().as_str()))
        .collect();
    batch
        .project(&keep)
        .map_err(|e| PipelineError::Storage(format!("project raw batch: {e}")))
}

fn drop_null_rows(batch: &RecordBatch) -> Result<RecordBatch, PipelineError> {
    if batch.num_rows() == 0 || batch.num_columns() == 0 {
        return Ok(batch.clone());
    }
    let mut mask: Option<BooleanArray> = None;
    for column in batch.columns() {
        let not_null = is_not_null(column).map_err(PipelineError::storage)?;
        mask = Some(match mask {
            Some(m) => and(&m, &not_null).map_err(PipelineError::storage)?,
            None => not_null,
        });
    }
    let mask = mask.expect("at least one column");
    filter_record_batch(batch, &mask).map_err(PipelineError::storage)
}

/// Renames to canonical business names, trims strings, coerces numeric and
/// date fields, and derives the year/month/day partition components.
pub fn normalize(batches: &[RecordBatch]) -> Result<Vec<RecordBatch>, PipelineError> {
    let schema = Arc::new(normalized_schema());
    batches
        .iter()
        .map(|batch| normalize_batch(batch, &schema))
        .collect()
}

fn normalize_batch(
    batch: &RecordBatch,
    schema: &Arc<Schema>,
) -> Result<RecordBatch, PipelineError> {
    let n = batch.num_rows();
    let segment = utf8_column(batch, "results_segment")?;
    let asset = utf8_column(batch, "results_asset")?;
    let cod = utf8_column(batch, "results_cod")?;
    let kind = utf8_column(batch, "results_type")?;
    let qty = utf8_column(batch, "results_theoricalQty")?;
    let part = utf8_column(batch, "results_part")?;
    let part_acum = utf8_column(batch, "results_partAcum")?;
    let date = utf8_column(batch, "header_date")?;

    let mut nom_setor = StringBuilder::with_capacity(n, n * 16);
    let mut nom_empresa = StringBuilder::with_capacity(n, n * 16);
    let mut cod_acao = StringBuilder::with_capacity(n, n * 8);
    let mut des_tipo_acao = StringBuilder::with_capacity(n, n * 8);
    let mut qtd_teorica = Int64Builder::with_capacity(n);
    let mut perc_setor = Decimal128Builder::with_capacity(n)
        .with_precision_and_scale(PERC_PRECISION, PERC_SCALE)
        .map_err(PipelineError::storage)?;
    let mut perc_acum = Decimal128Builder::with_capacity(n)
        .with_precision_and_scale(PERC_PRECISION, PERC_SCALE)
        .map_err(PipelineError::storage)?;
    let mut data_ref = Date32Builder::with_capacity(n);
    let mut year = Int32Builder::with_capacity(n);
    let mut month = Int32Builder::with_capacity(n);
    let mut day = Int32Builder::with_capacity(n);

    for row in 0..n {
        nom_setor.append_value(required_str(segment, "results_segment", row)?.trim());
        nom_empresa.append_value(required_str(asset, "results_asset", row)?.trim());
        cod_acao.append_value(required_str(cod, "results_cod", row)?.trim());
        des_tipo_acao.append_value(required_str(kind, "results_type", row)?.trim());

        let qty_raw = required_str(qty, "results_theoricalQty", row)?;
        qtd_teorica.append_value(parse_grouped_int(qty_raw).ok_or_else(|| {
            PipelineError::conversion("qtd_teorica", qty_raw.trim(), "not a grouped integer")
        })?);

        let part_raw = required_str(part, "results_part", row)?;
        perc_setor.append_value(parse_locale_decimal(part_raw, PERC_SCALE as u32).ok_or_else(
            || {
                PipelineError::conversion(
                    "perc_participacao_setor",
                    part_raw.trim(),
                    "not a locale decimal",
                )
            },
        )?);

        let acum_raw = required_str(part_acum, "results_partAcum", row)?;
        perc_acum.append_value(parse_locale_decimal(acum_raw, PERC_SCALE as u32).ok_or_else(
            || {
                PipelineError::conversion(
                    "perc_participacao_setor_acumulada",
                    acum_raw.trim(),
                    "not a locale decimal",
                )
            },
        )?);

        let date_raw = required_str(date, "header_date", row)?;
        let parsed = NaiveDate::parse_from_str(date_raw.trim(), DATE_FORMAT).map_err(|e| {
            PipelineError::conversion("data_ref", date_raw.trim(), e)
        })?;
        data_ref.append_value(date32_from_naive(parsed));
        year.append_value(parsed.year());
        month.append_value(parsed.month() as i32);
        day.append_value(parsed.day() as i32);
    }

    let columns: Vec<ArrayRef> = vec![
        Arc::new(nom_setor.finish()),
        Arc::new(nom_empresa.finish()),
        Arc::new(cod_acao.finish()),
        Arc::new(des_tipo_acao.finish()),
        Arc::new(qtd_teorica.finish()),
        Arc::new(perc_setor.finish()),
        Arc::new(perc_acum.finish()),
        Arc::new(data_ref.finish()),
        Arc::new(year.finish()),
        Arc::new(month.finish()),
        Arc::new(day.finish()),
    ];
    RecordBatch::try_new(schema.clone(), columns).map_err(PipelineError::storage)
}

fn utf8_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, PipelineError> {
    let index = batch
        .schema()
        .index_of(name)
        .map_err(|_| PipelineError::MissingColumns(vec![name.to_string()]))?;
    batch
        .column(index)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| {
            PipelineError::conversion(
                name,
                &batch.column(index).data_type().to_string(),
                "expected a utf8 raw column",
            )
        })
}

fn required_str<'a>(
    array: &'a StringArray,
    column: &str,
    row: usize,
) -> Result<&'a str, PipelineError> {
    if array.is_null(row) {
        // Unreachable after cleansing; kept as a hard failure rather than a skip.
        Err(PipelineError::conversion(column, "", "unexpected null"))
    } else {
        Ok(array.value(row))
    }
}

/// Days since 1970-01-01 for an Arrow `Date32` value.
fn date32_from_naive(d: NaiveDate) -> i32 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("valid epoch");
    (d - epoch).num_days() as i32
}

/// Parses a theoretical quantity: spaces are always grouping separators,
/// periods only when the text is strictly `d{1,3}(.ddd)+` grouped. Anything
/// else (a fractional tail included) is not an integer.
fn parse_grouped_int(raw: &str) -> Option<i64> {
    let compact: String = raw.trim().chars().filter(|c| *c != ' ').collect();
    let (sign, digits) = match compact.strip_prefix('-') {
        Some(rest) => (-1i64, rest),
        None => (1i64, compact.as_str()),
    };
    let joined = if digits.contains('.') {
        strip_strict_grouping(digits)?
    } else {
        digits.to_string()
    };
    if joined.is_empty() || !joined.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    joined.parse::<i64>().ok().map(|v| sign * v)
}

/// Removes `.` separators iff they delimit strict 3-digit groups
/// (`1.234.567`). Returns None when the text is not grouped that way.
fn strip_strict_grouping(digits: &str) -> Option<String> {
    let groups: Vec<&str> = digits.split('.').collect();
    if groups.len() < 2 {
        return Some(digits.to_string());
    }
    let head_ok = (1..=3).contains(&groups[0].len())
        && groups[0].bytes().all(|b| b.is_ascii_digit());
    let tail_ok = groups[1..]
        .iter()
        .all(|g| g.len() == 3 && g.bytes().all(|b| b.is_ascii_digit()));
    if head_ok && tail_ok {
        Some(groups.concat())
    } else {
        None
    }
}

/// Parses a locale-formatted percentage into a scaled integer at the given
/// decimal scale, rounding half-up. The decimal separator is a comma;
/// periods before it are grouping separators. Without a comma, a period is
/// read as a plain decimal point.
fn parse_locale_decimal(raw: &str, scale: u32) -> Option<i128> {
    let compact: String = raw.trim().chars().filter(|c| *c != ' ').collect();
    let (negative, body) = match compact.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, compact.as_str()),
    };
    let (int_part, frac_part) = match body.rsplit_once(',') {
        Some((int_part, frac)) => {
            let int_part = if int_part.contains('.') {
                strip_strict_grouping(int_part)?
            } else {
                int_part.to_string()
            };
            (int_part, frac.to_string())
        }
        None => match body.split_once('.') {
            Some((int_part, frac)) => (int_part.to_string(), frac.to_string()),
            None => (body.to_string(), String::new()),
        },
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let mut scaled: i128 = if int_part.is_empty() {
        0
    } else {
        int_part.parse::<i128>().ok()?
    };
    for _ in 0..scale {
        scaled = scaled.checked_mul(10)?;
    }
    let mut frac_value: i128 = 0;
    for (i, b) in frac_part.bytes().enumerate() {
        let digit = (b - b'0') as i128;
        if (i as u32) < scale {
            frac_value = frac_value * 10 + digit;
        } else if i as u32 == scale {
            // Round half-up on the first digit past the scale.
            if digit >= 5 {
                frac_value += 1;
            }
            break;
        }
    }
    if (frac_part.len() as u32) < scale {
        for _ in 0..(scale - frac_part.len() as u32) {
            frac_value *= 10;
        }
    }
    let value = scaled.checked_add(frac_value)?;
    Some(if negative { -value } else { value })
}
