use anyhow::{bail, Context};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::sync::Arc;
use strata_wing::{
    Agent, CommandApplier, ConvergeEngine, CycleReport, FileManifestSource, FileStore,
    ManifestSource, Outcome, WingConfig,
};
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("strata-wing")
        .version(strata_wing::VERSION)
        .about("Per-instance convergence agent")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .default_value("/etc/strata/wing.yaml")
                .value_parser(value_parser!(PathBuf))
                .help("Agent configuration file"),
        )
        .arg(
            Arg::new("manifest")
                .long("manifest")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Override the manifest path"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(Command::new("converge").about("Run one convergence cycle"))
        .subcommand(Command::new("dry-run").about("Validate the manifest without applying it"))
        .subcommand(
            Command::new("watch")
                .about("Converge on every manifest change until interrupted")
                .arg(
                    Arg::new("interval")
                        .long("interval")
                        .value_parser(value_parser!(u64))
                        .help("Seconds between cycles"),
                ),
        )
        .subcommand(Command::new("status").about("Print the stored instance record"))
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<WingConfig> {
    let path = matches
        .get_one::<PathBuf>("config")
        .context("missing --config")?;
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let mut config =
        WingConfig::from_yaml(&raw).with_context(|| format!("loading {}", path.display()))?;
    if let Some(manifest) = matches.get_one::<PathBuf>("manifest") {
        config = config.with_manifest_path(manifest);
    }
    Ok(config)
}

fn build_agent(config: &WingConfig) -> Agent {
    let engine = ConvergeEngine::new(
        config.instance_id.clone(),
        config.instance_pool,
        Arc::new(FileStore::new(&config.state_dir)),
        Arc::new(CommandApplier::from_config(&config.apply)),
        &config.dry_run_dir,
    );
    Agent::new(
        engine,
        Arc::new(FileManifestSource::new(&config.manifest_path)),
        config.interval(),
    )
    .with_dry_run_first(config.dry_run_first)
}

fn describe(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Unchanged => "unchanged".into(),
        Outcome::Converged => "converged".into(),
        Outcome::Failed(e) => format!("error: {e}"),
    }
}

fn print_report(report: &CycleReport) {
    let Some(hash) = &report.hash else {
        println!("no manifest published");
        return;
    };
    println!("manifest {hash}");
    if let Some(outcome) = &report.dry_run {
        println!("  dryRun:   {}", describe(outcome));
    }
    if let Some(outcome) = &report.converge {
        println!("  converge: {}", describe(outcome));
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    let Some((command, args)) = matches.subcommand() else {
        bail!("no subcommand given");
    };
    init_tracing(args.get_flag("log-json"));
    let config = load_config(args)?;

    match command {
        "converge" => {
            let report = build_agent(&config).run_once().await?;
            print_report(&report);
            if report.failed() {
                bail!("convergence failed");
            }
        }
        "dry-run" => {
            let agent = build_agent(&config);
            let source = FileManifestSource::new(&config.manifest_path);
            let Some(manifest) = source.fetch().await? else {
                println!("no manifest published");
                return Ok(());
            };
            let outcome = agent.engine().dry_run(&manifest).await?;
            println!("dryRun: {}", describe(&outcome));
            if outcome.is_failed() {
                bail!("dry run failed");
            }
        }
        "watch" => {
            let mut config = config;
            if let Some(secs) = args.get_one::<u64>("interval") {
                config.interval_secs = *secs;
                config.validate()?;
            }
            let agent = build_agent(&config);
            let (tx, rx) = tokio::sync::watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("interrupt received, shutting down");
                }
                let _ = tx.send(true);
            });
            agent.run(rx).await;
        }
        "status" => {
            let agent = build_agent(&config);
            match agent.engine().record().await? {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => bail!("no record for instance {}", config.instance_id),
            }
        }
        other => bail!("unknown subcommand {other}"),
    }
    Ok(())
}
