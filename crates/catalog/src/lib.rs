//! Catalog registration and partition discovery for the curated table.
//!
//! The catalog is a JSON metadata store keyed by (database, table) under a
//! root directory. Registration creates the table definition only when it is
//! absent; discovery rescans the storage location and rewrites the
//! definition's partition list so fresh partitions become queryable.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use model::PipelineError;

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Root directory of the catalog metadata store.
    pub catalog_root: PathBuf,
    pub database: String,
    pub table: String,
    /// Storage location of the curated dataset the table points at.
    pub location: PathBuf,
    pub region: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
}

impl ColumnDef {
    fn new(name: &str, column_type: &str) -> Self {
        Self {
            name: name.to_string(),
            column_type: column_type.to_string(),
        }
    }
}

/// External table definition, created at most once per (database, table).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableDefinition {
    pub database: String,
    pub name: String,
    pub location: String,
    pub classification: String,
    pub compressed: bool,
    pub region: String,
    pub columns: Vec<ColumnDef>,
    pub partition_keys: Vec<ColumnDef>,
    /// Hive-style relative partition paths, maintained by partition repair.
    pub partitions: Vec<String>,
}

/// Column schema of the curated aggregate table, with catalog type names.
pub fn aggregate_table_columns() -> Vec<ColumnDef> {
    vec![
        ColumnDef::new("nom_empresa", "string"),
        ColumnDef::new("qtd_registros", "bigint"),
        ColumnDef::new("qtd_acao", "bigint"),
        ColumnDef::new("qtd_tipos_acao", "bigint"),
        ColumnDef::new("qtd_teorica_acumulada", "bigint"),
        ColumnDef::new("qtd_teorica_max", "bigint"),
        ColumnDef::new("qtd_teorica_min", "bigint"),
        ColumnDef::new("qtd_dias_atraso", "int"),
        ColumnDef::new("avg_participacao_setor_total", "decimal(9,7)"),
        ColumnDef::new("avg_participacao_setor_acumulada_total", "decimal(9,7)"),
        ColumnDef::new("data_ref", "date"),
        ColumnDef::new("dth_etl_processamento", "timestamp"),
    ]
}

fn partition_key_columns() -> Vec<ColumnDef> {
    vec![
        ColumnDef::new("year", "int"),
        ColumnDef::new("month", "int"),
        ColumnDef::new("day", "int"),
        ColumnDef::new("nom_setor", "string"),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Created,
    AlreadyExists,
}

fn definition_path(root: &Path, database: &str, table: &str) -> PathBuf {
    root.join(database).join(format!("{table}.json"))
}

/// Reads a table definition. `Ok(None)` is the specific "not found"
/// condition; any other failure is fatal.
pub fn lookup_table(
    root: &Path,
    database: &str,
    table: &str,
) -> Result<Option<TableDefinition>, PipelineError> {
    let path = definition_path(root, database, table);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(PipelineError::Catalog(format!(
                "lookup {}.{}: {e}",
                database, table
            )))
        }
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| PipelineError::Catalog(format!("corrupt definition for {database}.{table}: {e}")))
}

/// Ensures the table definition exists, creating it only if absent.
///
/// The check-then-create window is closed with an atomic `create_new`: the
/// first writer wins, and a creator losing the race observes AlreadyExists
/// and degrades to the existing-table no-op path.
pub fn register_table(cfg: &CatalogConfig) -> Result<RegisterOutcome, PipelineError> {
    if lookup_table(&cfg.catalog_root, &cfg.database, &cfg.table)?.is_some() {
        info!(
            database = %cfg.database,
            table = %cfg.table,
            "table already registered, no action needed"
        );
        return Ok(RegisterOutcome::AlreadyExists);
    }

    let definition = TableDefinition {
        database: cfg.database.clone(),
        name: cfg.table.clone(),
        location: cfg.location.display().to_string(),
        classification: "parquet".to_string(),
        compressed: true,
        region: cfg.region.clone(),
        columns: aggregate_table_columns(),
        partition_keys: partition_key_columns(),
        partitions: Vec::new(),
    };

    let path = definition_path(&cfg.catalog_root, &cfg.database, &cfg.table);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| PipelineError::Catalog(format!("mkdir -p {}: {e}", parent.display())))?;
    }
    let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            info!(
                database = %cfg.database,
                table = %cfg.table,
                "lost creation race, table registered by a concurrent run"
            );
            return Ok(RegisterOutcome::AlreadyExists);
        }
        Err(e) => {
            return Err(PipelineError::Catalog(format!(
                "create {}: {e}",
                path.display()
            )))
        }
    };
    write_definition(file, &definition, &path).map_err(PipelineError::catalog)?;
    info!(database = %cfg.database, table = %cfg.table, "table registered in catalog");
    Ok(RegisterOutcome::Created)
}

fn write_definition(
    mut file: File,
    definition: &TableDefinition,
    path: &Path,
) -> Result<(), String> {
    let json = serde_json::to_string_pretty(definition).map_err(|e| e.to_string())?;
    file.write_all(json.as_bytes())
        .and_then(|_| file.flush())
        .map_err(|e| format!("write {}: {e}", path.display()))
}

#[derive(Debug, Default, Clone)]
pub struct RepairStats {
    pub partitions_total: usize,
    pub partitions_added: usize,
}

/// Rescans the table's storage location for hive partition directories and
/// rewrites the definition's partition list. The analog of a repair-table
/// command against the query layer.
pub fn repair_partitions(cfg: &CatalogConfig) -> Result<RepairStats, PipelineError> {
    let definition = lookup_table(&cfg.catalog_root, &cfg.database, &cfg.table)
        .map_err(|e| PipelineError::Discovery(e.to_string()))?
        .ok_or_else(|| {
            PipelineError::Discovery(format!(
                "table {}.{} is not registered",
                cfg.database, cfg.table
            ))
        })?;

    let location = PathBuf::from(&definition.location);
    let mut discovered = Vec::new();
    collect_partitions(&location, definition.partition_keys.len(), "", &mut discovered)
        .map_err(|e| PipelineError::Discovery(format!("scan {}: {e}", location.display())))?;
    discovered.sort();

    let added = discovered
        .iter()
        .filter(|p| !definition.partitions.contains(p))
        .count();
    let updated = TableDefinition {
        partitions: discovered.clone(),
        ..definition
    };

    // Atomic replace, so a concurrent reader never sees a half-written file.
    let path = definition_path(&cfg.catalog_root, &cfg.database, &cfg.table);
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(&updated).map_err(PipelineError::discovery)?;
    fs::write(&tmp, json.as_bytes())
        .map_err(|e| PipelineError::Discovery(format!("write {}: {e}", tmp.display())))?;
    fs::rename(&tmp, &path)
        .map_err(|e| PipelineError::Discovery(format!("replace {}: {e}", path.display())))?;

    info!(
        database = %cfg.database,
        table = %cfg.table,
        total = discovered.len(),
        added,
        "partition discovery complete"
    );
    Ok(RepairStats {
        partitions_total: discovered.len(),
        partitions_added: added,
    })
}

fn collect_partitions(
    dir: &Path,
    depth_left: usize,
    prefix: &str,
    out: &mut Vec<String>,
) -> std::io::Result<()> {
    if depth_left == 0 {
        let has_parquet = fs::read_dir(dir)?
            .filter_map(Result::ok)
            .any(|e| e.path().extension().is_some_and(|ext| ext == "parquet"));
        if has_parquet {
            out.push(prefix.to_string());
        }
        return Ok(());
    }
    if !dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if path.is_dir() && name.contains('=') {
            let child_prefix = if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{prefix}/{name}")
            };
            collect_partitions(&path, depth_left - 1, &child_prefix, out)?;
        }
    }
    Ok(())
}
