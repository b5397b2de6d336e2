use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dicom_core::VR;
use dicom_dictionary_std::tags;
use qrbrowse::config::{Config, LoggingConfig, ModelKind};
use qrbrowse::{
    DimseAssociationService, Filter, InformationEntity, InformationModel, PatientRootModel,
    QueryModel, StudyRootModel, UniqueKey, UniqueKeySet,
};
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(
    name = "qrbrowse",
    about = "Browse and retrieve from a DICOM query/retrieve archive"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Query the archive and print the result tree
    Browse {
        #[arg(short, long)]
        config: PathBuf,
        /// Levels to expand below the root
        #[arg(short, long, default_value_t = 1)]
        depth: usize,
        /// Matching or return key, e.g. PatientName=Smith^Mary or Modality
        #[arg(short = 'k', long = "key")]
        keys: Vec<String>,
    },
    /// Ask the archive to send a study, series or instance to another AE
    ///
    /// Moves always go through the study-root information model.
    Move {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        destination: String,
        #[arg(long)]
        study: String,
        #[arg(long)]
        series: Option<String>,
        #[arg(long, requires = "series")]
        instance: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Browse {
            config,
            depth,
            keys,
        } => {
            let config = load(&config)?;
            match config.query.information_model {
                ModelKind::Study => browse(StudyRootModel::new(), &config, &keys, depth),
                ModelKind::Patient => browse(PatientRootModel::new(), &config, &keys, depth),
            }
        }
        Cmd::Move {
            config,
            destination,
            study,
            series,
            instance,
        } => {
            let config = load(&config)?;
            let keys = move_keys(&study, series.as_deref(), instance.as_deref());
            let service = DimseAssociationService::new(config.dimse_config());
            let mut query_model = QueryModel::new(
                StudyRootModel::new(),
                service,
                config.to_endpoint(),
                config.association_mode(),
            )?;
            let summary = query_model.perform_hierarchical_move(&keys, &destination)?;
            println!("{}", summary);
            Ok(())
        }
    }
}

fn load(path: &Path) -> anyhow::Result<Config> {
    let config = Config::from_path(path)
        .with_context(|| format!("loading configuration from {}", path.display()))?;
    init_logging(&config.logging)?;
    tracing::info!("Using archive {}", config.to_endpoint());
    Ok(config)
}

fn init_logging(logging: &LoggingConfig) -> anyhow::Result<()> {
    let file_layer = if logging.log_to_file {
        let file = File::create(&logging.log_file_path)
            .with_context(|| format!("creating log file {}", logging.log_file_path))?;
        Some(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
    } else {
        None
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(logging.env_filter()?)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("initializing logging")?;
    Ok(())
}

fn browse<M: InformationModel>(
    model: M,
    config: &Config,
    keys: &[String],
    depth: usize,
) -> anyhow::Result<()> {
    let mut filter = Filter::default_for(&model);
    for keyword in config.query.return_keys.iter().chain(keys) {
        filter = filter.with_keyword(keyword)?;
    }

    let service = DimseAssociationService::new(config.dimse_config());
    let mut query_model = QueryModel::new(
        model,
        service,
        config.to_endpoint(),
        config.association_mode(),
    )?;
    let mut tree = query_model.perform_hierarchical_query(filter);
    print!("{}", tree.render(depth));
    Ok(())
}

fn move_keys(study: &str, series: Option<&str>, instance: Option<&str>) -> UniqueKeySet {
    let uid = |tag, value: &str| UniqueKey {
        tag,
        vr: VR::UI,
        value: value.to_string(),
    };

    let mut keys = UniqueKeySet::new();
    keys.insert(InformationEntity::Study, uid(tags::STUDY_INSTANCE_UID, study));
    if let Some(series) = series {
        keys.insert(InformationEntity::Series, uid(tags::SERIES_INSTANCE_UID, series));
    }
    if let Some(instance) = instance {
        keys.insert(InformationEntity::Instance, uid(tags::SOP_INSTANCE_UID, instance));
    }
    keys
}
