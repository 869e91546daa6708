//! `fsr-sim`: run scripted landing editing sessions from the command line

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, Command};
use fsr_harness::{run_simulation, SimulatorConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Command::new("fsr-sim")
        .version(fsr_editor::VERSION)
        .about("Field-sampling record editor session simulator")
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("simulate")
                .about("Run a scripted editing session")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .short('c')
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML file with [editor] and [scenario] tables"),
                )
                .arg(
                    Arg::new("edits")
                        .long("edits")
                        .value_parser(value_parser!(u32))
                        .help("Override the number of edit-and-save rounds"),
                )
                .arg(
                    Arg::new("remote-updates")
                        .long("remote-updates")
                        .value_parser(value_parser!(u32))
                        .help("Override the number of remote updates"),
                )
                .arg(
                    Arg::new("field")
                        .long("field")
                        .action(ArgAction::SetTrue)
                        .help("Run in field usage mode"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the report as JSON"),
                ),
        )
        .subcommand(Command::new("config").about("Print the default configuration"));

    let matches = cli.get_matches();
    init_tracing(matches.get_flag("log-json"));

    match matches.subcommand() {
        Some(("simulate", sub)) => {
            let mut config = match sub.get_one::<PathBuf>("config") {
                Some(path) => {
                    let text = std::fs::read_to_string(path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    SimulatorConfig::from_toml(&text)
                        .with_context(|| format!("parsing {}", path.display()))?
                }
                None => SimulatorConfig::default(),
            };
            if let Some(edits) = sub.get_one::<u32>("edits") {
                config.scenario.edits = *edits;
            }
            if let Some(updates) = sub.get_one::<u32>("remote-updates") {
                config.scenario.remote_updates = *updates;
            }
            if sub.get_flag("field") {
                config.scenario.usage_mode = fsr_editor::UsageMode::Field;
            }

            let report = run_simulation(&config).await?;
            if sub.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("=== Simulation Report ===");
                println!("Record:            {:?}", report.record_id);
                println!("Title:             {}", report.title);
                println!("Saves ok/failed:   {}/{}", report.saves_ok, report.saves_failed);
                println!(
                    "Remote applied:    {} (discarded {})",
                    report.remote_applied, report.remote_discarded
                );
                println!("Conflict refresh:  {}", report.conflict_refreshes);
                println!("Selected tab:      {}", report.selected_tab);
                println!("Navigations:       {}", report.navigations);
                println!("Final path:        {}", report.final_path);
                println!("Deleted:           {}", report.deleted);
            }
        }
        Some(("config", _)) => {
            print!("{}", toml::to_string_pretty(&SimulatorConfig::default())?);
        }
        _ => {
            println!("Use --help for usage");
        }
    }
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
