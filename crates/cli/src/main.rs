//! treelens Command Line Interface
//!
//! Prints described trees from a directory of model files and checks their
//! NA routing.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use treelens_core::{find_violations, PlainLanguageRules};
use treelens_registry::{FileModelStore, ModelStore, TreeLensConfig, TreeRequest, TreeResolver};

#[derive(Parser, Debug)]
#[command(name = "treelens")]
#[command(author = "treelens Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Decode and describe compressed decision trees", long_about = None)]
struct Cli {
    /// Model directory, overrides the configured one
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print one described tree as JSON
    Tree {
        /// Model id
        model: String,
        /// Tree index
        #[arg(allow_hyphen_values = true)]
        tree_number: i64,
        /// Response level selecting the class tree
        #[arg(long, default_value = "")]
        class: String,
        /// Decision path rendering: auto, true or false
        #[arg(long)]
        plain_language: Option<PlainLanguageRules>,
        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Run the NA routing validator over every tree of a model
    Check {
        /// Model id
        model: String,
    },
    /// List the models in the store
    Models,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => TreeLensConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => TreeLensConfig::default(),
    };
    config
        .apply_env_overrides()
        .context("Invalid environment override")?;
    if let Some(store) = &cli.store {
        config.store.model_directory = Some(store.clone());
    }

    init_logging(&config, cli.verbose)?;
    for warning in config.validate().context("Invalid configuration")? {
        warn!("{}", warning);
    }

    let directory = config
        .store
        .model_directory
        .clone()
        .context("No model directory given; use --store or TREELENS_MODEL_DIR")?;
    let store = FileModelStore::new(&directory)
        .context("Failed to open model store")?
        .with_caching(config.store.cache_models);

    match cli.command {
        Commands::Tree {
            model,
            tree_number,
            class,
            plain_language,
            pretty,
        } => {
            let resolver = TreeResolver::from_config(store, &config);
            let mut request = TreeRequest::new(model, tree_number).with_class(class);
            request.plain_language_rules = plain_language;

            let response = resolver.resolve(&request)?;
            let json = if pretty {
                response.to_json_pretty()
            } else {
                response.to_json()
            }
            .context("Failed to serialize tree")?;
            println!("{json}");
        }
        Commands::Check { model } => check_model(&store, &model)?,
        Commands::Models => {
            for id in store.model_ids() {
                println!("{id}");
            }
        }
    }

    Ok(())
}

fn init_logging(config: &TreeLensConfig, verbose: bool) -> Result<()> {
    let level = if verbose {
        "debug".to_string()
    } else {
        config.logging.level.to_ascii_lowercase()
    };
    let filter = EnvFilter::try_new(&level).context("Invalid log level")?;

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

fn check_model(store: &FileModelStore, model_id: &str) -> Result<()> {
    let model = store
        .load(model_id)
        .context("Failed to load model")?
        .with_context(|| format!("Given model does not exist: {model_id}"))?;

    let mut checked = 0usize;
    let mut violations = 0usize;
    for (tree_index, classes) in model.trees.iter().enumerate() {
        for (class_index, slot) in classes.iter().enumerate() {
            let Some(compressed) = slot else { continue };
            let tree = compressed
                .decode(&model.feature_names, &model.domains)
                .with_context(|| {
                    format!("Tree {tree_index} class {class_index} failed to decode")
                })?;
            checked += 1;
            for violation in find_violations(&tree) {
                violations += 1;
                println!(
                    "tree {tree_index} class '{}': {violation}",
                    model.class_label(class_index)
                );
            }
        }
    }

    info!(
        model = model_id,
        trees = checked,
        violations, "NA routing check finished"
    );
    if violations > 0 {
        bail!("{violations} NA routing violations in {checked} trees");
    }
    println!("{checked} trees checked, NA routing is consistent");
    Ok(())
}
