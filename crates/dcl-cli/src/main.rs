//! DCL CLI - Main entry point

use clap::Parser;
use dcl_cli::commands;
use dcl_cli::verify::parse_delimiter;
use dcl_cli::{Cli, Commands, Config, ExportCommand, ProgramCommand, ProjectCommand};
use dcl_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    // Pick up DCL_* and LOG_* variables from a local .env
    let _ = dotenvy::dotenv();

    // Parse command-line arguments
    let cli = Cli::parse();

    // Handle markdown help generation
    if cli.markdown_help {
        println!("{}", clap_markdown::help_markdown::<Cli>());
        return;
    }

    // Ensure a command is provided
    let Some(command) = cli.command.as_ref() else {
        eprintln!("Error: A subcommand is required");
        eprintln!();
        eprintln!("For more information, try '--help'.");
        process::exit(2);
    };

    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Warn
    };
    let log_config = LogConfig::builder()
        .level(level)
        .output(LogOutput::Console)
        .log_file_prefix("dcl")
        .build();

    // Environment variables take precedence over the flag defaults
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // The CLI works without logging, so a failed setup is not fatal
    let _guard = init_logging(&log_config).ok();

    if let Err(e) = execute_command(&cli, command).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Build the effective configuration: defaults, then env, then flags
fn load_config(cli: &Cli, command: &Commands) -> dcl_cli::Result<Config> {
    let mut config = Config::from_env()?;

    if let Some(endpoint) = &cli.endpoint {
        config.set_endpoint(endpoint.clone());
    }

    match command {
        Commands::Submit {
            chunk_size,
            row_offset,
            ..
        } => {
            if let Some(chunk_size) = chunk_size {
                config.chunk_size = *chunk_size;
            }
            if let Some(row_offset) = row_offset {
                config.row_offset = *row_offset;
            }
        },
        Commands::Verify {
            concurrency,
            delimiter,
            ..
        } => {
            if let Some(concurrency) = concurrency {
                config.concurrency = *concurrency;
            }
            if let Some(delimiter) = delimiter {
                config.delimiter = parse_delimiter(delimiter)?;
            }
        },
        _ => {},
    }

    config.validate()?;
    Ok(config)
}

/// Execute the CLI command
async fn execute_command(cli: &Cli, command: &Commands) -> dcl_cli::Result<()> {
    let config = load_config(cli, command)?;

    match command {
        Commands::Submit {
            file,
            project_id,
            report,
            ..
        } => commands::submit::run(&config, file, project_id, report.as_deref()).await,

        Commands::Verify {
            manifest, output, ..
        } => commands::verify::run(&config, manifest, output.clone()).await,

        Commands::Query {
            query,
            variables,
            max_tries,
        } => commands::query::run(&config, query, variables.as_deref(), *max_tries).await,

        Commands::Export { command } => match command {
            ExportCommand::Record {
                ids,
                project_id,
                format,
                output,
            } => commands::export::record(&config, project_id, ids, *format, output.as_deref()).await,
            ExportCommand::Node {
                node,
                project_id,
                format,
                output,
            } => commands::export::node(&config, project_id, node, *format, output.as_deref()).await,
        },

        Commands::Dictionary { node } => commands::dictionary::run(&config, node).await,

        Commands::SubmitRecord { file, project_id } => {
            commands::records::submit(&config, project_id, file).await
        },

        Commands::DeleteRecord { id, project_id } => {
            commands::records::delete(&config, project_id, id).await
        },

        Commands::Program { command } => match command {
            ProgramCommand::Create { file } => commands::program::create_program(&config, file).await,
            ProgramCommand::Delete { program } => {
                commands::program::delete_program(&config, program).await
            },
        },

        Commands::Project { command } => match command {
            ProjectCommand::Create { program, file } => {
                commands::program::create_project(&config, program, file).await
            },
            ProjectCommand::Delete { project_id } => {
                commands::program::delete_project(&config, project_id).await
            },
        },

        Commands::Schema => commands::schema::run(&config).await,
    }
}
