use anyhow::{Context, Result};
use backupminder::{
    cli::{Cli, Commands},
    config::ManagerConfig,
    core::{Outcome, Report},
    observability::{init_logging, shutdown_logging},
    platform::{error_text_for_status, Authorization, JobScheduler},
    service::{DaemonUtility, JobListing},
};
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use tracing::{debug, info};

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let code = run(cli);
    shutdown_logging();
    code
}

#[tokio::main]
async fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(&cli.config).await
        .context("Failed to load configuration")?;

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    init_logging(level, config.log_directory.as_deref(), (&config.log_rotation).into())?;

    info!("BackupMinder v{}", env!("CARGO_PKG_VERSION"));
    debug!("Managing {:?} jobs in {}", config.domain, config.daemon_directory().display());

    let auth = if cli.sudo {
        match Authorization::acquire_sudo(true).await {
            Ok(auth) => auth,
            Err(e) => {
                eprintln!("{}", Outcome::failed(&e));
                return Ok(ExitCode::FAILURE);
            }
        }
    } else {
        Authorization::detect().await
    };

    let utility = DaemonUtility::launchctl(config);

    let success = match cli.command {
        Commands::Add(args) => {
            let job = args.to_config().context("Failed to resolve job paths")?;
            print_report(&utility.add_job(&job, &auth).await)
        }
        Commands::Edit(args) => {
            let job = args.to_config().context("Failed to resolve job paths")?;
            print_report(&utility.update_job(&job, &auth).await)
        }
        Commands::Enable { name } => print_report(&utility.enable_job(&name, &auth).await),
        Commands::Disable { name } => print_report(&utility.disable_job(&name, &auth).await),
        Commands::Remove { name } => print_report(&utility.delete_job(&name, &auth).await),
        Commands::List { json } => match utility.list_jobs(&auth).await {
            Ok(listings) => {
                if json {
                    println!("{}", serde_json::to_string_pretty(&listings)?);
                } else {
                    print_listings(&listings);
                }
                true
            }
            Err(e) => {
                eprintln!("{}", Outcome::failed(&e));
                false
            }
        },
        Commands::Show { name, json } => show_job(&utility, &name, json, &auth).await?,
        Commands::StatusText { code } => {
            println!("{}: {}", code, error_text_for_status(code));
            true
        }
    };

    Ok(if success { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

async fn load_config(path: &Path) -> Result<ManagerConfig> {
    if !path.exists() {
        debug!("No configuration at {}, using defaults", path.display());
        return Ok(ManagerConfig::default());
    }

    let content = tokio::fs::read_to_string(path).await
        .context("Failed to read config file")?;

    let config: ManagerConfig = serde_json::from_str(&content)
        .context("Failed to parse config file")?;

    Ok(config)
}

fn print_report(report: &Report) -> bool {
    for warning in &report.warnings {
        eprintln!("Warning: {}", warning);
    }
    for outcome in &report.steps {
        if outcome.is_success() {
            println!("{}", outcome);
        } else {
            eprintln!("{}", outcome);
        }
    }
    report.is_success()
}

fn print_listings(listings: &[JobListing]) {
    if listings.is_empty() {
        println!("No backup jobs");
        return;
    }

    println!("{:<24} {:<9} {:<22} SOURCE -> DESTINATION", "NAME", "STATE", "SCHEDULE");
    for listing in listings {
        let state = if listing.loaded { "enabled" } else { "disabled" };
        match (&listing.config, &listing.problem) {
            (Some(job), _) => println!(
                "{:<24} {:<9} {:<22} {} -> {}",
                listing.name,
                state,
                job.schedule.to_string(),
                job.source_path.display(),
                job.destination_path.display()
            ),
            (None, problem) => println!(
                "{:<24} {:<9} {:<22} {}",
                listing.name,
                state,
                "-",
                problem.as_deref().unwrap_or("unreadable")
            ),
        }
    }
}

async fn show_job<S: JobScheduler>(
    utility: &DaemonUtility<S>,
    name: &str,
    json: bool,
    auth: &Authorization,
) -> Result<bool> {
    let job = match utility.read_job(name, auth).await {
        Ok(job) => job,
        Err(e) => {
            eprintln!("{}", Outcome::failed(&e));
            return Ok(false);
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&job)?);
        return Ok(true);
    }

    println!("Name:            {}", job.name);
    println!("Label:           {}", utility.config().label_for(&job.name));
    println!("State:           {}", if job.enabled { "enabled" } else { "disabled" });
    println!("Source:          {}", job.source_path.display());
    println!("Destination:     {}", job.destination_path.display());
    println!("Name contains:   {}", job.name_filter);
    println!("Backups to keep: {}", job.retention_count);
    println!("Warn after days: {}", job.warning_days);
    println!("Schedule:        {}", job.schedule);
    println!("Job description: {}", utility.config().plist_path(&job.name).display());
    Ok(true)
}
