//! End-to-end pipeline scenarios over a scratch directory tree: raw parquet
//! snapshot in, curated partitions + catalog registration out.

use std::fs::{create_dir_all, File};
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Int64Array, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;

use catalog::{lookup_table, register_table, repair_partitions, CatalogConfig, RegisterOutcome};
use curate::{curate_dataset, Codec, CurateConfig};
use model::PipelineError;
use refine::{refine_dataset, RefineConfig};

const PAGE_AND_HEADER: [&str; 10] = [
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

struct RawRow {
    segment: &'static str,
    asset: &'static str,
    cod: &'static str,
    kind: &'static str,
    qty: &'static str,
    part: &'static str,
    part_acum: &'static str,
    date: Option<&'static str>,
}

fn raw_row(segment: &'static str, asset: &'static str, cod: &'static str) -> RawRow {
    RawRow {
        segment,
        asset,
        cod,
        kind: "ON",
        qty: "1.000",
        part: "0,123",
        part_acum: "1,234",
        date: Some("02/01/24"),
    }
}

fn write_raw_snapshot(path: &Path, rows: &[RawRow], include_type_column: bool) {
    let mut fields: Vec<Field> = PAGE_AND_HEADER
        .iter()
        .map(|name| Field::new(*name, DataType::Utf8, true))
        .collect();
    for name in [
        "header_date",
        "results_segment",
        "results_cod",
        "results_asset",
        "results_type",
        "results_part",
        "results_partAcum",
        "results_theoricalQty",
    ] {
        if name == "results_type" && !include_type_column {
            continue;
        }
        fields.push(Field::new(name, DataType::Utf8, true));
    }
    let schema = Arc::new(Schema::new(fields));

    let mut columns: Vec<ArrayRef> = PAGE_AND_HEADER
        .iter()
        .map(|_| Arc::new(StringArray::from(vec![Some("1"); rows.len()])) as ArrayRef)
        .collect();
    columns.push(Arc::new(StringArray::from(
        rows.iter().map(|r| r.date).collect::<Vec<_>>(),
    )));
    columns.push(Arc::new(StringArray::from(
        rows.iter().map(|r| Some(r.segment)).collect::<Vec<_>>(),
    )));
    columns.push(Arc::new(StringArray::from(
        rows.iter().map(|r| Some(r.cod)).collect::<Vec<_>>(),
    )));
    columns.push(Arc::new(StringArray::from(
        rows.iter().map(|r| Some(r.asset)).collect::<Vec<_>>(),
    )));
    if include_type_column {
        columns.push(Arc::new(StringArray::from(
            rows.iter().map(|r| Some(r.kind)).collect::<Vec<_>>(),
        )));
    }
    columns.push(Arc::new(StringArray::from(
        rows.iter().map(|r| Some(r.part)).collect::<Vec<_>>(),
    )));
    columns.push(Arc::new(StringArray::from(
        rows.iter().map(|r| Some(r.part_acum)).collect::<Vec<_>>(),
    )));
    columns.push(Arc::new(StringArray::from(
        rows.iter().map(|r| Some(r.qty)).collect::<Vec<_>>(),
    )));

    let batch = RecordBatch::try_new(schema.clone(), columns).unwrap();
    create_dir_all(path.parent().unwrap()).unwrap();
    let file = File::create(path).unwrap();
    let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
}

fn read_counts(partition_dir: &Path) -> i64 {
    let file = File::open(partition_dir.join("part-000000.parquet")).unwrap();
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .unwrap()
        .build()
        .unwrap();
    let mut total = 0;
    for batch in reader {
        let batch = batch.unwrap();
        let counts = batch
            .column(batch.schema().index_of("qtd_registros").unwrap())
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        total += counts.iter().flatten().sum::<i64>();
    }
    total
}

#[tokio::test]
async fn pipeline_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let raw = tmp.path().join("raw/index_portfolio/data-000.parquet");
    let curated = tmp.path().join("curated/index_portfolio");
    let catalog_root = tmp.path().join("catalog");

    // 10 valid rows across two sectors, plus 2 rows with a null header_date.
    let mut rows = Vec::new();
    for cod in ["ACME3", "ACME4", "ACME5", "ACME6", "ACME7"] {
        rows.push(raw_row("Finance", "ACME", cod));
    }
    for cod in ["GLB3", "GLB4", "GLB5"] {
        rows.push(raw_row("Finance", "Globex", cod));
    }
    for cod in ["VLT3", "VLT4"] {
        rows.push(raw_row("Energy", "Volt", cod));
    }
    for cod in ["BAD1", "BAD2"] {
        let mut row = raw_row("Finance", "ACME", cod);
        row.date = None;
        rows.push(row);
    }
    write_raw_snapshot(&raw, &rows, true);

    let (normalized, stats) = refine_dataset(RefineConfig {
        input_location: tmp.path().join("raw/index_portfolio"),
    })
    .await
    .unwrap();
    assert_eq!(stats.rows_in, 12);
    assert_eq!(stats.rows_removed, 2);
    assert_eq!(stats.rows_out, 10);

    let curate_stats = curate_dataset(
        CurateConfig::new(curated.clone(), Codec::Snappy),
        &normalized,
    )
    .await
    .unwrap();
    // (Finance, ACME), (Finance, Globex), (Energy, Volt) on one date.
    assert_eq!(curate_stats.groups, 3);
    assert_eq!(curate_stats.files_written, 2);

    // Group counts reflect only the 10 surviving source rows.
    let finance = curated.join("year=2024/month=1/day=2/nom_setor=Finance");
    let energy = curated.join("year=2024/month=1/day=2/nom_setor=Energy");
    assert_eq!(read_counts(&finance) + read_counts(&energy), 10);

    let catalog_cfg = CatalogConfig {
        catalog_root,
        database: "market".to_string(),
        table: "index_portfolio".to_string(),
        location: curated.clone(),
        region: "us-east-1".to_string(),
    };
    assert_eq!(register_table(&catalog_cfg).unwrap(), RegisterOutcome::Created);
    assert_eq!(
        register_table(&catalog_cfg).unwrap(),
        RegisterOutcome::AlreadyExists
    );

    let repair_stats = repair_partitions(&catalog_cfg).unwrap();
    assert_eq!(repair_stats.partitions_total, 2);

    let def = lookup_table(&catalog_cfg.catalog_root, "market", "index_portfolio")
        .unwrap()
        .unwrap();
    assert_eq!(
        def.partitions,
        vec![
            "year=2024/month=1/day=2/nom_setor=Energy",
            "year=2024/month=1/day=2/nom_setor=Finance",
        ]
    );
}

#[tokio::test]
async fn missing_column_aborts_before_any_write() {
    let tmp = tempfile::tempdir().unwrap();
    let raw = tmp.path().join("raw/index_portfolio/data-000.parquet");
    let curated = tmp.path().join("curated/index_portfolio");

    write_raw_snapshot(&raw, &[raw_row("Finance", "ACME", "ACME3")], false);

    let err = refine_dataset(RefineConfig {
        input_location: tmp.path().join("raw/index_portfolio"),
    })
    .await
    .unwrap_err();
    match err {
        PipelineError::MissingColumns(missing) => {
            assert_eq!(missing, vec!["results_type"]);
        }
        other => panic!("expected MissingColumns, got {other:?}"),
    }
    assert!(!curated.exists(), "no curated write may happen");
}
