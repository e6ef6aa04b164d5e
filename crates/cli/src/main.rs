use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use catalog::CatalogConfig;
use curate::{Codec, CurateConfig};
use model::JobParams;
use refine::RefineConfig;

#[derive(Parser, Debug)]
#[command(name = "refined-zone", version, about = "Market-index refined-zone pipeline CLI")]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Raw snapshot -> curated partitioned dataset, registered and repaired.
    Run(RunArgs),
    /// Encode a JSON job-parameter mapping to the trigger token format.
    EncodeParams {
        /// JSON object of job parameters.
        #[arg(long)]
        json: String,
    },
    /// Decode a trigger token back to its JSON job-parameter mapping.
    DecodeParams {
        #[arg(long)]
        token: String,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    #[arg(long)]
    job_name: Option<String>,
    #[arg(long)]
    table_name: Option<String>,
    #[arg(long)]
    database_name: Option<String>,
    /// Root of the raw store.
    #[arg(long)]
    input_root: Option<String>,
    /// Key of the raw snapshot under the input root.
    #[arg(long)]
    object_key: Option<String>,
    /// Root of the curated store.
    #[arg(long)]
    output_root: Option<String>,
    /// Prefix of the curated dataset under the output root.
    #[arg(long)]
    output_prefix: Option<String>,
    #[arg(long)]
    region: Option<String>,
    /// Output compression codec.
    #[arg(long, default_value = "snappy")]
    compression: Codec,
    /// Catalog metadata root. Defaults to `_catalog` under the output root.
    #[arg(long)]
    catalog_root: Option<PathBuf>,
}

impl RunArgs {
    fn to_map(&self) -> BTreeMap<String, String> {
        let mut raw = BTreeMap::new();
        let mut put = |key: &str, value: &Option<String>| {
            if let Some(v) = value {
                raw.insert(key.to_string(), v.clone());
            }
        };
        put("job_name", &self.job_name);
        put("table_name", &self.table_name);
        put("database_name", &self.database_name);
        put("input_root", &self.input_root);
        put("object_key", &self.object_key);
        put("output_root", &self.output_root);
        put("output_prefix", &self.output_prefix);
        put("region", &self.region);
        raw
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let start = std::time::Instant::now();
    match cli.cmd {
        Commands::Run(args) => run(args).await?,
        Commands::EncodeParams { json } => {
            let params: BTreeMap<String, serde_json::Value> = serde_json::from_str(&json)?;
            println!("{}", model::encode_params(&params));
        }
        Commands::DecodeParams { token } => {
            let params = model::decode_params(&token)?;
            println!("{}", serde_json::to_string_pretty(&params)?);
        }
    }
    println!("DONE in {}", humantime::format_duration(start.elapsed()));
    Ok(())
}

/// One invocation runs the whole chain; any stage failure aborts the run and
/// the caller re-invokes from raw input.
async fn run(args: RunArgs) -> Result<()> {
    let params = JobParams::resolve(&args.to_map())?;
    info!(job = %params.job_name, "starting refined-zone run");

    let refine_cfg = RefineConfig {
        input_location: params.input_location(),
    };
    let (normalized, refine_stats) = refine::refine_dataset(refine_cfg).await?;
    println!(
        "REFINE OK rows_in={} rows_removed={} rows_out={}",
        refine_stats.rows_in, refine_stats.rows_removed, refine_stats.rows_out
    );

    let curate_cfg = CurateConfig::new(params.output_location(), args.compression);
    let curate_stats = curate::curate_dataset(curate_cfg, &normalized).await?;
    println!(
        "CURATE OK groups={} files_written={} rows_written={}",
        curate_stats.groups, curate_stats.files_written, curate_stats.rows_written
    );

    let catalog_cfg = CatalogConfig {
        catalog_root: args
            .catalog_root
            .clone()
            .unwrap_or_else(|| params.output_root.join("_catalog")),
        database: params.database_name.clone(),
        table: params.table_name.clone(),
        location: params.output_location(),
        region: params.region.clone(),
    };
    let outcome = catalog::register_table(&catalog_cfg)?;
    println!("REGISTER OK outcome={outcome:?}");

    let repair_stats = catalog::repair_partitions(&catalog_cfg)?;
    println!(
        "REPAIR OK partitions={} added={}",
        repair_stats.partitions_total, repair_stats.partitions_added
    );
    Ok(())
}
