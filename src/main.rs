use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use clusterflow::model::Object;
use clusterflow::{ClusterReconciler, InMemoryStore, ReconcileOutcome, ReconcilerConfig};
use log::{info, warn};
use slog::{o, Drain, Logger};

#[derive(Parser, Debug)]
#[command(name = "clusterflow")]
#[command(
    about = "Reconcile a database Cluster against an in-memory object store",
    long_about = None
)]
struct Args {
    /// JSON file holding an array of objects to seed the store with
    #[arg(short, long)]
    objects: PathBuf,

    /// Namespace of the Cluster
    #[arg(short, long, default_value = "default")]
    namespace: String,

    /// Name of the Cluster
    #[arg(long)]
    name: String,

    /// Number of reconcile rounds to run
    #[arg(short, long, default_value_t = 3)]
    rounds: u32,

    /// Optional JSON file overriding reconciler settings
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn create_logger() -> Logger {
    let decorator = slog_term::PlainDecorator::new(std::io::stdout());
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    Logger::root(drain, o!())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ReconcilerConfig::from_file(path)?,
        None => ReconcilerConfig::default(),
    };

    let raw = std::fs::read_to_string(&args.objects)?;
    let objects: Vec<Object> = serde_json::from_str(&raw)?;
    let store = Arc::new(InMemoryStore::new());
    for obj in objects {
        store.seed(obj).await;
    }
    info!("Seeded store with {} objects", store.len().await);

    let reconciler = ClusterReconciler::new(store.clone(), config, create_logger());
    let mut events = reconciler.events().subscribe();

    for round in 1..=args.rounds {
        match reconciler.reconcile(&args.namespace, &args.name).await {
            Ok(ReconcileOutcome::Done) => info!("Round {}: done", round),
            Ok(ReconcileOutcome::Requeue { reason, after }) => {
                info!("Round {}: requeue after {:?} ({})", round, after, reason)
            }
            Err(e) => warn!("Round {}: failed: {}", round, e),
        }
    }

    while let Ok(event) = events.try_recv() {
        println!(
            "event {:?} {} {}: {}",
            event.event_type, event.object, event.reason, event.message
        );
    }
    println!("{}", serde_json::to_string_pretty(&store.objects().await)?);
    Ok(())
}
