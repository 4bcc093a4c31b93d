// Courtside batch runner.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Load config
// 3. Load player, match and ranking tables
// 4. Sample the configured cohort and print the elbow curve
// 5. Cluster with the configured k and print the centroids
// 6. Classify the configured extra players and show their titles
// 7. Export the run

use courtside::clustering::interpret::{CentroidTable, Prediction};
use courtside::config;
use courtside::dataset;
use courtside::export::{CsvResultsWriter, ResultsSink};
use courtside::player::history::{MatchHistory, TournamentFilter};
use courtside::session::{Classification, ClassificationSession, CohortRequest};

use anyhow::Context;
use tracing::info;

fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("Courtside starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    let request = CohortRequest::from_config(&config).context("invalid session configuration")?;
    info!(
        "Config loaded: {} cohort, {}, {} players, k={}",
        request.cohort, request.mode, request.sample_size, config.session.k
    );

    // 3. Load datasets
    let data = dataset::load_all(&config.data_paths).context("failed to load tennis data")?;

    // 4. Sample and compute the elbow curve
    let session = ClassificationSession::new(&data, config.sampling.clone(), config.kmeans.clone());
    let prepared = session
        .prepare(&request, &mut rand::rng())
        .with_context(|| format!("could not prepare {} cohort", request.cohort))?;

    if !prepared.sample.is_complete() {
        println!(
            "Only {} of {} requested players have complete statistics.",
            prepared.players().len(),
            prepared.sample.requested
        );
    }
    println!("Elbow curve ({} players):", prepared.matrix.len());
    for point in &prepared.elbow {
        println!("  k={:>2}  inertia={:.2}", point.k, point.inertia);
    }

    // 5. Cluster
    let run = session
        .cluster(&prepared, config.session.k)
        .context("clustering failed")?;
    println!();
    println!("Centroids:");
    println!("  {:<10} {}", "", run.result.centroids.labels.join(" | "));
    for (i, row) in run.result.centroids.rows.iter().enumerate() {
        let values: Vec<String> = row.iter().map(|v| format!("{v:.0}")).collect();
        println!("  {:<10} {}", CentroidTable::row_label(i), values.join(" | "));
    }
    for cluster in 0..run.result.k {
        let names: Vec<&str> = run.result.members(cluster).map(|a| a.player.as_str()).collect();
        println!("  Cluster {}: {}", cluster, names.join(", "));
    }

    // 6. Classify extra players
    for name in &config.session.classify {
        let full = format!("{} {}", name.first, name.last);
        match session.classify(&run, &name.first, &name.last)? {
            Classification::NotFound => println!("{full}: not found"),
            Classification::Incomplete(missing) => {
                println!("{full}: missing statistics ({})", missing.join(", "))
            }
            Classification::Classified { prediction, record } => {
                match prediction {
                    Prediction::AlreadyClustered(c) => println!("{full}: already in cluster {c}"),
                    Prediction::Predicted(c) => println!("{full}: would be placed in cluster {c}"),
                }
                let titles = MatchHistory::from_dataset(&data, record.sex)
                    .titles(&record.id, &TournamentFilter::default());
                println!("  {} titles in the loaded match tables", titles.len());
            }
        }
    }

    // 7. Export
    let mut writer = CsvResultsWriter::new(&config.output_dir);
    writer
        .write_run(&run.result)
        .context("failed to export clustering results")?;
    if let Some(dir) = writer.written().last() {
        println!("Results written to {}", dir.display());
    }

    info!("Courtside finished");
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("courtside.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("courtside=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")?;

    Ok(())
}
