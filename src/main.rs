use clap::Parser;
use tracing_subscriber::EnvFilter;

use surveycat::{
    CatalogConfig,
    DataDir,
    Index,
    ModelManager,
    cli::{self, Cli, Command},
    config::EmbeddingBackend,
    embedding::{Embedder, HashingEmbedder},
    error,
    index_builder::{self, BuildOptions},
    matcher::TermMatcher,
    readers::{ReadLimits, ReaderRegistry},
    scanner,
    search,
    server::{self, CatalogContext},
    walker::{self, WalkOptions},
};

const LOG_ENV_VAR: &str = "SURVEYCAT_LOG";

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var(LOG_ENV_VAR) {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let config = CatalogConfig::resolve(cli.config.as_deref(), data_dir.root())?;
    let show_progress = !cli.quiet;

    match cli.command {
        Command::Scan(args) => {
            cmd_scan(&config, &data_dir, &args, show_progress)?;
        }
        Command::Build(args) => {
            cmd_build(&config, &data_dir, &args, show_progress)?;
        }
        Command::Search(args) => {
            let embedder = make_embedder(&config, show_progress)?;
            let index =
                Index::load(&data_dir, &config.category_names(), embedder.as_ref())?;
            let outcome = search::execute_search(
                &args.to_query(),
                &index,
                embedder.as_ref(),
            )?;
            if args.json {
                search::format_json(&outcome)?;
            } else {
                search::format_human(&outcome);
            }
        }
        Command::Stats(args) => {
            let embedder = make_embedder(&config, show_progress)?;
            let index =
                Index::load(&data_dir, &config.category_names(), embedder.as_ref())?;
            cmd_stats(&index, args.json)?;
        }
        Command::Serve(args) => {
            let embedder = make_embedder(&config, show_progress)?;
            let index =
                Index::load(&data_dir, &config.category_names(), embedder.as_ref())?;
            let ctx = CatalogContext::new(index, embedder);
            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?
                .block_on(server::serve(ctx, args.bind))?;
        }
        Command::Completions(_) => {}
    }

    Ok(())
}

fn make_embedder(
    config: &CatalogConfig,
    show_progress: bool,
) -> error::Result<Box<dyn Embedder>> {
    Ok(match config.embedding.backend {
        EmbeddingBackend::Fastembed => Box::new(
            ModelManager::new(config.embedding.cache_dir.clone())
                .with_download_progress(show_progress),
        ),
        EmbeddingBackend::Hashing => {
            Box::new(HashingEmbedder::new(config.embedding.dimension)?)
        }
    })
}

fn cmd_scan(
    config: &CatalogConfig,
    data_dir: &DataDir,
    args: &cli::ScanArgs,
    show_progress: bool,
) -> error::Result<()> {
    if !args.root.is_dir() {
        return Err(error::Error::NotFound {
            kind: "directory",
            name: args.root.display().to_string(),
        });
    }

    let matcher = TermMatcher::new(&config.categories)?;
    tracing::info!(
        "{} categories, {} terms",
        matcher.categories().len(),
        matcher.term_count()
    );

    let options =
        WalkOptions::new(&config.skip_extensions, config.max_file_size_bytes())?;
    let targets = walker::discover_targets(&args.root, &options)?;
    tracing::info!("found {} files to scan", targets.len());
    for (target_type, count) in walker::count_by_type(&targets) {
        tracing::info!("  {target_type}: {count}");
    }

    let report = scanner::scan_all(
        &targets,
        &matcher,
        &ReaderRegistry::with_builtin(),
        ReadLimits {
            max_rows: config.max_rows,
        },
        show_progress,
    );

    let output = args.output.clone().unwrap_or_else(|| data_dir.scan_csv());
    scanner::write_scan_csv(&report, &output)?;
    eprintln!("Scan written to {}", output.display());
    Ok(())
}

fn cmd_build(
    config: &CatalogConfig,
    data_dir: &DataDir,
    args: &cli::BuildArgs,
    show_progress: bool,
) -> error::Result<()> {
    let embedder = make_embedder(config, show_progress)?;
    let categories = config.category_names();
    let options = BuildOptions {
        categories: &categories,
        embedder: embedder.as_ref(),
        batch_size: config.embedding.batch_size,
        show_progress,
    };

    let scan_path = args.scan.clone().unwrap_or_else(|| data_dir.scan_csv());
    let built = index_builder::build_from_paths(
        &scan_path,
        args.metadata_dir.as_deref(),
        &options,
    )?;
    index_builder::write_artifacts(&built, data_dir)?;
    eprintln!(
        "Indexed {} records ({} dimensions)",
        built.manifest.records, built.manifest.dimension
    );
    Ok(())
}

fn cmd_stats(index: &Index, json: bool) -> error::Result<()> {
    let stats = index.stats();
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Files: {}", stats.total_files);
    println!("By type:");
    for (file_type, count) in &stats.by_type {
        println!("  {file_type}: {count}");
    }
    println!("By category:");
    for (category, count) in &stats.by_category {
        println!("  {category}: {count}");
    }
    Ok(())
}
