//! The `jumpline` command.

use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};

use jumpline::cli::{Cli, Command};
use jumpline::config::{Config, EnvConfig};
use jumpline::inventory::InventorySource;
use jumpline::login::LoginSequencer;
use jumpline::session::PtySpawner;
use jumpline::{ResolveError, TargetResolver, listing, logging};

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("jumpline: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut config =
        Config::load(cli.config.as_deref(), &EnvConfig::default()).context("loading configuration")?;
    config.apply_cli(&cli);

    let mut resolver = TargetResolver::new(
        config.inventory_source(),
        config.result_cache(),
        config.candidate_policy(),
    );

    // The result list survives `--refresh`, so `--refresh <n>` still
    // resolves against the last listing.
    if cli.refresh {
        resolver.refresh_inventory().context("refreshing inventory")?;
    }

    match (cli.command, cli.target) {
        (Some(Command::Find { query, asg }), _) => find(&mut resolver, &query, asg),
        (Some(Command::Refresh), _) => {
            resolver.refresh().context("refreshing caches")?;
            Ok(ExitCode::SUCCESS)
        }
        (None, Some(target)) => login(&config, &mut resolver, &target),
        (None, None) if cli.refresh => Ok(ExitCode::SUCCESS),
        (None, None) => Cli::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "a TARGET or a subcommand is required",
            )
            .exit(),
    }
}

fn find<I: InventorySource>(
    resolver: &mut TargetResolver<I>,
    query: &str,
    asg: bool,
) -> Result<ExitCode> {
    let mut stdout = io::stdout().lock();
    if asg {
        let groups = resolver.find_groups(query)?;
        listing::write_groups(&mut stdout, &groups)?;
    } else {
        let machines = resolver.find(query)?;
        listing::write_machines(&mut stdout, &machines)?;
    }
    stdout.flush()?;
    Ok(ExitCode::SUCCESS)
}

fn login<I: InventorySource>(
    config: &Config,
    resolver: &mut TargetResolver<I>,
    target: &str,
) -> Result<ExitCode> {
    let candidates = match resolver.resolve(target) {
        Ok(candidates) => candidates,
        Err(ResolveError::Ambiguous { query, matches }) => {
            let mut stdout = io::stdout().lock();
            listing::write_machines(&mut stdout, &matches)?;
            stdout.flush()?;
            eprintln!(
                "jumpline: '{query}' matches {} machines; run again with one of the numbers above",
                matches.len()
            );
            return Ok(ExitCode::FAILURE);
        }
        Err(err) => return Err(err.into()),
    };

    let bastion = config.bastion_command()?;
    let options = config.login_options()?;

    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    let sequencer = LoginSequencer::new(PtySpawner::new(bastion), candidates, options);
    let report = runtime.block_on(sequencer.run())?;

    tracing::info!(
        login = %report.candidate.target(),
        status = %report.status,
        "session finished"
    );
    Ok(ExitCode::SUCCESS)
}
