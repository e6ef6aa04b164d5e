//! Normalized batches -> curated store: per-group aggregation and the
//! partitioned parquet sink with dynamic partition overwrite.

use std::collections::{BTreeMap, HashSet};
use std::fs::{create_dir_all, remove_dir_all, File};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, Date32Array, Date32Builder, Decimal128Array, Decimal128Builder, Int32Array,
    Int32Builder, Int64Array, Int64Builder, RecordBatch, StringArray, StringBuilder,
    TimestampMicrosecondBuilder, UInt32Array,
};
use arrow::compute::take;
use arrow::datatypes::{Field, Schema};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use tracing::info;

use model::{aggregate_schema, PipelineError, AVG_PRECISION, AVG_SCALE, PARTITION_KEYS};

#[derive(Debug, Clone)]
pub struct CurateConfig {
    /// Root of the curated partitioned dataset.
    pub output_location: PathBuf,
    /// Partition keys, in directory order.
    pub partition_keys: Vec<String>,
    pub compression: Codec,
}

impl CurateConfig {
    pub fn new(output_location: PathBuf, compression: Codec) -> Self {
        Self {
            output_location,
            partition_keys: PARTITION_KEYS.iter().map(|k| k.to_string()).collect(),
            compression,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct CurateStats {
    pub groups: u64,
    pub files_written: u32,
    pub rows_written: u64,
    /// Hive-style relative paths of the partitions replaced by this run.
    pub partitions_replaced: Vec<String>,
}

/// Output compression codec. Snappy is the default general-purpose choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Snappy,
    Zstd,
    Gzip,
    Uncompressed,
}

impl FromStr for Codec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "snappy" => Ok(Self::Snappy),
            "zstd" => Ok(Self::Zstd),
            "gzip" => Ok(Self::Gzip),
            "uncompressed" | "none" => Ok(Self::Uncompressed),
            other => Err(format!("unknown compression codec '{other}'")),
        }
    }
}

impl Codec {
    fn to_parquet(self) -> Result<Compression, PipelineError> {
        Ok(match self {
            Self::Snappy => Compression::SNAPPY,
            Self::Zstd => {
                Compression::ZSTD(ZstdLevel::try_new(3).map_err(PipelineError::storage)?)
            }
            Self::Gzip => {
                Compression::GZIP(GzipLevel::try_new(6).map_err(PipelineError::storage)?)
            }
            Self::Uncompressed => Compression::UNCOMPRESSED,
        })
    }
}

/// Aggregates the normalized batches and writes the curated partitions.
pub async fn curate_dataset(
    cfg: CurateConfig,
    batches: &[RecordBatch],
) -> Result<CurateStats, PipelineError> {
    let aggregated = aggregate(batches, Utc::now())?;
    let groups = aggregated.num_rows() as u64;
    info!(groups, "aggregation complete");

    let mut stats = write_partitioned(&cfg, &aggregated)?;
    stats.groups = groups;
    info!(
        files = stats.files_written,
        location = %cfg.output_location.display(),
        "curated dataset written"
    );
    Ok(stats)
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Grouping key: (nom_setor, nom_empresa, data_ref, year, month, day).
/// Year/month/day are functionally determined by data_ref and kept only to
/// preserve the partition columns through the aggregation.
type GroupKey = (String, String, i32, i32, i32, i32);

#[derive(Debug)]
struct GroupAcc {
    count: i64,
    codes: HashSet<String>,
    kinds: HashSet<String>,
    qty_sum: i64,
    qty_max: i64,
    qty_min: i64,
    part_sum: i128,
    acum_sum: i128,
}

impl GroupAcc {
    fn new() -> Self {
        Self {
            count: 0,
            codes: HashSet::new(),
            kinds: HashSet::new(),
            qty_sum: 0,
            qty_max: i64::MIN,
            qty_min: i64::MAX,
            part_sum: 0,
            acum_sum: 0,
        }
    }

    fn push(&mut self, code: &str, kind: &str, qty: i64, part: i128, acum: i128) {
        self.count += 1;
        self.codes.insert(code.to_string());
        self.kinds.insert(kind.to_string());
        self.qty_sum += qty;
        self.qty_max = self.qty_max.max(qty);
        self.qty_min = self.qty_min.min(qty);
        self.part_sum += part;
        self.acum_sum += acum;
    }
}

/// Groups by (sector, company, reference date) and computes the per-group
/// measures. Emits exactly one row per distinct key, sorted by key so the
/// output files are deterministic.
pub fn aggregate(
    batches: &[RecordBatch],
    processed_at: DateTime<Utc>,
) -> Result<RecordBatch, PipelineError> {
    let mut groups: BTreeMap<GroupKey, GroupAcc> = BTreeMap::new();

    for batch in batches {
        let setor = utf8(batch, "nom_setor")?;
        let empresa = utf8(batch, "nom_empresa")?;
        let cod = utf8(batch, "cod_acao")?;
        let tipo = utf8(batch, "des_tipo_acao")?;
        let qty = int64(batch, "qtd_teorica")?;
        let part = decimal(batch, "perc_participacao_setor")?;
        let acum = decimal(batch, "perc_participacao_setor_acumulada")?;
        let date = date32(batch, "data_ref")?;
        let year = int32(batch, "year")?;
        let month = int32(batch, "month")?;
        let day = int32(batch, "day")?;

        for row in 0..batch.num_rows() {
            let key = (
                setor.value(row).to_string(),
                empresa.value(row).to_string(),
                date.value(row),
                year.value(row),
                month.value(row),
                day.value(row),
            );
            groups.entry(key).or_insert_with(GroupAcc::new).push(
                cod.value(row),
                tipo.value(row),
                qty.value(row),
                part.value(row),
                acum.value(row),
            );
        }
    }

    build_aggregate_batch(groups, processed_at)
}

fn build_aggregate_batch(
    groups: BTreeMap<GroupKey, GroupAcc>,
    processed_at: DateTime<Utc>,
) -> Result<RecordBatch, PipelineError> {
    let n = groups.len();
    let mut nom_empresa = StringBuilder::with_capacity(n, n * 16);
    let mut qtd_registros = Int64Builder::with_capacity(n);
    let mut qtd_acao = Int64Builder::with_capacity(n);
    let mut qtd_tipos_acao = Int64Builder::with_capacity(n);
    let mut qtd_acumulada = Int64Builder::with_capacity(n);
    let mut qtd_max = Int64Builder::with_capacity(n);
    let mut qtd_min = Int64Builder::with_capacity(n);
    let mut avg_part = Decimal128Builder::with_capacity(n)
        .with_precision_and_scale(AVG_PRECISION, AVG_SCALE)
        .map_err(PipelineError::storage)?;
    let mut avg_acum = Decimal128Builder::with_capacity(n)
        .with_precision_and_scale(AVG_PRECISION, AVG_SCALE)
        .map_err(PipelineError::storage)?;
    let mut dias_atraso = Int32Builder::with_capacity(n);
    let mut data_ref = Date32Builder::with_capacity(n);
    let mut processamento = TimestampMicrosecondBuilder::with_capacity(n);
    let mut year = Int32Builder::with_capacity(n);
    let mut month = Int32Builder::with_capacity(n);
    let mut day = Int32Builder::with_capacity(n);
    let mut nom_setor = StringBuilder::with_capacity(n, n * 16);

    let processing_date = processed_at.date_naive();
    let processing_micros = processed_at.timestamp_micros();

    for ((setor, empresa, date_days, y, m, d), acc) in groups {
        nom_empresa.append_value(&empresa);
        qtd_registros.append_value(acc.count);
        qtd_acao.append_value(acc.codes.len() as i64);
        qtd_tipos_acao.append_value(acc.kinds.len() as i64);
        qtd_acumulada.append_value(acc.qty_sum);
        qtd_max.append_value(acc.qty_max);
        qtd_min.append_value(acc.qty_min);
        // Mean of a scale-3 decimal widened to scale 7: multiply by 10^4
        // before the rounded division by the row count.
        avg_part.append_value(div_round_half_up(acc.part_sum * 10_000, acc.count as i128));
        avg_acum.append_value(div_round_half_up(acc.acum_sum * 10_000, acc.count as i128));
        dias_atraso.append_value(processing_lag_days(processing_date, date_days));
        data_ref.append_value(date_days);
        processamento.append_value(processing_micros);
        year.append_value(y);
        month.append_value(m);
        day.append_value(d);
        nom_setor.append_value(&setor);
    }

    let columns: Vec<ArrayRef> = vec![
        Arc::new(nom_empresa.finish()),
        Arc::new(qtd_registros.finish()),
        Arc::new(qtd_acao.finish()),
        Arc::new(qtd_tipos_acao.finish()),
        Arc::new(qtd_acumulada.finish()),
        Arc::new(qtd_max.finish()),
        Arc::new(qtd_min.finish()),
        Arc::new(avg_part.finish()),
        Arc::new(avg_acum.finish()),
        Arc::new(dias_atraso.finish()),
        Arc::new(data_ref.finish()),
        Arc::new(processamento.finish()),
        Arc::new(year.finish()),
        Arc::new(month.finish()),
        Arc::new(day.finish()),
        Arc::new(nom_setor.finish()),
    ];
    RecordBatch::try_new(Arc::new(aggregate_schema()), columns).map_err(PipelineError::storage)
}

fn column<'a, T: 'static>(
    batch: &'a RecordBatch,
    name: &str,
    type_name: &str,
) -> Result<&'a T, PipelineError> {
    let index = batch
        .schema()
        .index_of(name)
        .map_err(|_| PipelineError::Storage(format!("normalized batch missing '{name}'")))?;
    batch
        .column(index)
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| {
            PipelineError::Storage(format!("normalized column '{name}' is not {type_name}"))
        })
}

fn utf8<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, PipelineError> {
    column(batch, name, "utf8")
}

fn int64<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int64Array, PipelineError> {
    column(batch, name, "int64")
}

fn int32<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int32Array, PipelineError> {
    column(batch, name, "int32")
}

fn date32<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Date32Array, PipelineError> {
    column(batch, name, "date32")
}

fn decimal<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Decimal128Array, PipelineError> {
    column(batch, name, "decimal128")
}

/// Whole days between the processing date and the reference date. Positive
/// when the reference date lies in the past.
fn processing_lag_days(processing_date: NaiveDate, date_days: i32) -> i32 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("valid epoch");
    let reference = epoch + Duration::days(date_days as i64);
    (processing_date - reference).num_days() as i32
}

fn div_round_half_up(num: i128, den: i128) -> i128 {
    if num >= 0 {
        (num + den / 2) / den
    } else {
        -((-num + den / 2) / den)
    }
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Writes the aggregate batch as hive-partitioned parquet. Dynamic partition
/// overwrite: only partition directories present in the batch are replaced;
/// every other partition is left untouched.
pub fn write_partitioned(
    cfg: &CurateConfig,
    batch: &RecordBatch,
) -> Result<CurateStats, PipelineError> {
    let schema = batch.schema();
    let key_indices: Vec<usize> = cfg
        .partition_keys
        .iter()
        .map(|key| {
            schema
                .index_of(key)
                .map_err(|_| PipelineError::Storage(format!("missing partition column '{key}'")))
        })
        .collect::<Result<_, _>>()?;
    let data_indices: Vec<usize> = (0..schema.fields().len())
        .filter(|i| !key_indices.contains(i))
        .collect();
    let data_schema = Arc::new(Schema::new(
        data_indices
            .iter()
            .map(|&i| schema.field(i).clone())
            .collect::<Vec<Field>>(),
    ));

    // Row indices per rendered partition path.
    let mut partitions: BTreeMap<String, Vec<u32>> = BTreeMap::new();
    for row in 0..batch.num_rows() {
        let mut parts = Vec::with_capacity(key_indices.len());
        for (&idx, key) in key_indices.iter().zip(&cfg.partition_keys) {
            let value = render_partition_value(batch.column(idx), row)?;
            parts.push(format!("{key}={}", escape_partition_value(&value)));
        }
        partitions.entry(parts.join("/")).or_default().push(row as u32);
    }

    let props = WriterProperties::builder()
        .set_compression(cfg.compression.to_parquet()?)
        .build();

    let mut stats = CurateStats::default();
    for (rel_path, rows) in partitions {
        let dir = cfg.output_location.join(&rel_path);
        if dir.exists() {
            remove_dir_all(&dir)
                .map_err(|e| PipelineError::Storage(format!("replace {}: {e}", dir.display())))?;
        }
        create_dir_all(&dir)
            .map_err(|e| PipelineError::Storage(format!("mkdir -p {}: {e}", dir.display())))?;

        let indices = UInt32Array::from(rows);
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(data_indices.len());
        for &i in &data_indices {
            let taken =
                take(batch.column(i).as_ref(), &indices, None).map_err(PipelineError::storage)?;
            columns.push(taken);
        }
        let part_batch =
            RecordBatch::try_new(data_schema.clone(), columns).map_err(PipelineError::storage)?;

        let file_path = dir.join("part-000000.parquet");
        let file = File::create(&file_path)
            .map_err(|e| PipelineError::Storage(format!("create {}: {e}", file_path.display())))?;
        let mut writer = ArrowWriter::try_new(file, data_schema.clone(), Some(props.clone()))
            .map_err(PipelineError::storage)?;
        writer.write(&part_batch).map_err(PipelineError::storage)?;
        writer.close().map_err(PipelineError::storage)?;

        stats.files_written += 1;
        stats.rows_written += part_batch.num_rows() as u64;
        stats.partitions_replaced.push(rel_path);
    }
    Ok(stats)
}

fn render_partition_value(column: &ArrayRef, row: usize) -> Result<String, PipelineError> {
    if let Some(a) = column.as_any().downcast_ref::<Int32Array>() {
        return Ok(a.value(row).to_string());
    }
    if let Some(a) = column.as_any().downcast_ref::<Int64Array>() {
        return Ok(a.value(row).to_string());
    }
    if let Some(a) = column.as_any().downcast_ref::<StringArray>() {
        return Ok(a.value(row).to_string());
    }
    Err(PipelineError::Storage(format!(
        "unsupported partition column type {}",
        column.data_type()
    )))
}

/// Percent-escapes characters that would corrupt a hive partition path.
fn escape_partition_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            '\\' => out.push_str("%5C"),
            '=' => out.push_str("%3D"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use model::normalized_schema;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use std::fs;

    struct Row {
        setor: &'static str,
        empresa: &'static str,
        cod: &'static str,
        tipo: &'static str,
        qty: i64,
        part: i128,
        acum: i128,
        date: (i32, u32, u32),
    }

    fn normalized_batch(rows: &[Row]) -> RecordBatch {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        let n = rows.len();
        let mut setor = StringBuilder::new();
        let mut empresa = StringBuilder::new();
        let mut cod = StringBuilder::new();
        let mut tipo = StringBuilder::new();
        let mut qty = Int64Builder::with_capacity(n);
        let mut part = Decimal128Builder::with_capacity(n)
            .with_precision_and_scale(5, 3)
            .unwrap();
        let mut acum = Decimal128Builder::with_capacity(n)
            .with_precision_and_scale(5, 3)
            .unwrap();
        let mut date = Date32Builder::with_capacity(n);
        let mut year = Int32Builder::with_capacity(n);
        let mut month = Int32Builder::with_capacity(n);
        let mut day = Int32Builder::with_capacity(n);
        for r in rows {
            setor.append_value(r.setor);
            empresa.append_value(r.empresa);
            cod.append_value(r.cod);
            tipo.append_value(r.tipo);
            qty.append_value(r.qty);
            part.append_value(r.part);
            acum.append_value(r.acum);
            let d = NaiveDate::from_ymd_opt(r.date.0, r.date.1, r.date.2).unwrap();
            date.append_value((d - epoch).num_days() as i32);
            year.append_value(r.date.0);
            month.append_value(r.date.1 as i32);
            day.append_value(r.date.2 as i32);
        }
        let columns: Vec<ArrayRef> = vec![
            Arc::new(setor.finish()),
            Arc::new(empresa.finish()),
            Arc::new(cod.finish()),
            Arc::new(tipo.finish()),
            Arc::new(qty.finish()),
            Arc::new(part.finish()),
            Arc::new(acum.finish()),
            Arc::new(date.finish()),
            Arc::new(year.finish()),
            Arc::new(month.finish()),
            Arc::new(day.finish()),
        ];
        RecordBatch::try_new(Arc::new(normalized_schema()), columns).unwrap()
    }

    fn acme_rows() -> Vec<Row> {
        vec![
            Row {
                setor: "Finance",
                empresa: "ACME",
                cod: "ACME3",
                tipo: "ON",
                qty: 100,
                part: 1_000,
                acum: 2_000,
                date: (2024, 1, 2),
            },
            Row {
                setor: "Finance",
                empresa: "ACME",
                cod: "ACME4",
                tipo: "ON",
                qty: 300,
                part: 2_000,
                acum: 4_000,
                date: (2024, 1, 2),
            },
        ]
    }

    fn processed_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap()
    }

    fn i64_value(batch: &RecordBatch, name: &str, row: usize) -> i64 {
        batch
            .column(batch.schema().index_of(name).unwrap())
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap()
            .value(row)
    }

    #[test]
    fn aggregate_computes_group_measures() {
        let batch = normalized_batch(&acme_rows());
        let out = aggregate(&[batch], processed_at()).unwrap();
        assert_eq!(out.num_rows(), 1);
        assert_eq!(i64_value(&out, "qtd_registros", 0), 2);
        assert_eq!(i64_value(&out, "qtd_acao", 0), 2);
        assert_eq!(i64_value(&out, "qtd_tipos_acao", 0), 1);
        assert_eq!(i64_value(&out, "qtd_teorica_acumulada", 0), 400);
        assert_eq!(i64_value(&out, "qtd_teorica_max", 0), 300);
        assert_eq!(i64_value(&out, "qtd_teorica_min", 0), 100);

        // (1.000 + 2.000) / 2 = 1.5 at scale 7.
        let avg = out
            .column(out.schema().index_of("avg_participacao_setor_total").unwrap())
            .as_any()
            .downcast_ref::<Decimal128Array>()
            .unwrap();
        assert_eq!(avg.value(0), 15_000_000);

        let lag = out
            .column(out.schema().index_of("qtd_dias_atraso").unwrap())
            .as_any()
            .downcast_ref::<Int32Array>()
            .unwrap();
        assert_eq!(lag.value(0), 3);
    }

    #[test]
    fn aggregate_keeps_one_row_per_group_key() {
        let mut rows = acme_rows();
        rows.push(Row {
            setor: "Finance",
            empresa: "Globex",
            cod: "GLB3",
            tipo: "PN",
            qty: 50,
            part: 500,
            acum: 500,
            date: (2024, 1, 2),
        });
        rows.push(Row {
            setor: "Finance",
            empresa: "ACME",
            cod: "ACME3",
            tipo: "ON",
            qty: 10,
            part: 100,
            acum: 100,
            date: (2024, 1, 3),
        });
        let out = aggregate(&[normalized_batch(&rows)], processed_at()).unwrap();
        // (Finance, ACME, 01-02), (Finance, ACME, 01-03), (Finance, Globex, 01-02).
        assert_eq!(out.num_rows(), 3);
    }

    #[test]
    fn aggregate_of_empty_input_is_empty() {
        let out = aggregate(&[normalized_batch(&[])], processed_at()).unwrap();
        assert_eq!(out.num_rows(), 0);
    }

    fn partition_rows(dir: &std::path::Path) -> u64 {
        let file = fs::File::open(dir.join("part-000000.parquet")).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();
        reader.map(|b| b.unwrap().num_rows() as u64).sum()
    }

    #[test]
    fn sink_overwrites_only_touched_partitions() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = CurateConfig::new(tmp.path().to_path_buf(), Codec::Snappy);

        let mut first = acme_rows();
        first.push(Row {
            setor: "Finance",
            empresa: "ACME",
            cod: "ACME3",
            tipo: "ON",
            qty: 10,
            part: 100,
            acum: 100,
            date: (2024, 1, 3),
        });
        let batch = aggregate(&[normalized_batch(&first)], processed_at()).unwrap();
        let stats = write_partitioned(&cfg, &batch).unwrap();
        assert_eq!(stats.files_written, 2);

        let day2 = tmp.path().join("year=2024/month=1/day=2/nom_setor=Finance");
        let day3 = tmp.path().join("year=2024/month=1/day=3/nom_setor=Finance");
        assert_eq!(partition_rows(&day2), 1);
        assert_eq!(partition_rows(&day3), 1);
        let day3_before = fs::metadata(day3.join("part-000000.parquet")).unwrap().len();

        // Second run touches only day=2; day=3 must be preserved bit for bit.
        let rows = vec![
            Row {
                setor: "Finance",
                empresa: "ACME",
                cod: "ACME3",
                tipo: "ON",
                qty: 999,
                part: 100,
                acum: 100,
                date: (2024, 1, 2),
            },
            Row {
                setor: "Finance",
                empresa: "Globex",
                cod: "GLB3",
                tipo: "PN",
                qty: 1,
                part: 100,
                acum: 100,
                date: (2024, 1, 2),
            },
        ];
        let batch = aggregate(&[normalized_batch(&rows)], processed_at()).unwrap();
        let stats = write_partitioned(&cfg, &batch).unwrap();
        assert_eq!(stats.files_written, 1);
        assert_eq!(stats.partitions_replaced, vec!["year=2024/month=1/day=2/nom_setor=Finance"]);

        assert_eq!(partition_rows(&day2), 2);
        let day3_after = fs::metadata(day3.join("part-000000.parquet")).unwrap().len();
        assert_eq!(day3_before, day3_after);
    }

    #[test]
    fn sink_projects_partition_columns_out_of_data_files() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = CurateConfig::new(tmp.path().to_path_buf(), Codec::Snappy);
        let batch = aggregate(&[normalized_batch(&acme_rows())], processed_at()).unwrap();
        write_partitioned(&cfg, &batch).unwrap();

        let dir = tmp.path().join("year=2024/month=1/day=2/nom_setor=Finance");
        let file = fs::File::open(dir.join("part-000000.parquet")).unwrap();
        let schema = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .schema()
            .clone();
        for key in PARTITION_KEYS {
            assert!(schema.index_of(key).is_err(), "{key} should live in the path");
        }
        assert!(schema.index_of("qtd_registros").is_ok());
    }

    #[test]
    fn partition_values_are_path_safe() {
        assert_eq!(escape_partition_value("Financ/Outros"), "Financ%2FOutros");
        assert_eq!(escape_partition_value("a=b"), "a%3Db");
        assert_eq!(escape_partition_value("plain"), "plain");
    }

    #[test]
    fn codec_parses_known_names_only() {
        assert_eq!(Codec::from_str("snappy").unwrap(), Codec::Snappy);
        assert_eq!(Codec::from_str("ZSTD").unwrap(), Codec::Zstd);
        assert!(Codec::from_str("lzma").is_err());
    }
}
