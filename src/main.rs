use clap::{CommandFactory, Parser};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use hrcalc::error_display::user_message_from_report;
use hrcalc::export::{write_csv, ExportOptions};
use hrcalc::flows::{run_hours, run_pivot, run_split, run_variants};
use hrcalc::{
    AppConfig, Args, Command, ConfigManager, HoursRequest, InputArgs, OpenOptions, OutputArgs,
    PivotSpec, Session, APP_NAME,
};
use polars::prelude::DataFrame;
use std::io::Read;
use std::path::Path;

fn init_logging(debug: bool) {
    let default_filter = if debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn handle_early_exit_flags(args: &Args) -> Result<Option<()>> {
    if args.generate_config {
        let manager = ConfigManager::new(APP_NAME)?;
        let path = manager.write_default_config(args.force)?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(Some(()));
    }
    Ok(None)
}

fn open_session(input: &InputArgs, config: &AppConfig) -> Result<Session> {
    let opts = OpenOptions::from_args_and_config(input, config);
    Session::load(&input.path, &opts)
}

/// Print a preview and write the table when `--output` is given.
fn finish_table(df: &mut DataFrame, output: &OutputArgs, config: &AppConfig) -> Result<()> {
    let preview = output.preview.unwrap_or(config.display.preview_rows);
    if preview > 0 {
        println!("{}", df.head(Some(preview)));
    }
    if let Some(path) = &output.output {
        let options = ExportOptions::from_config(&config.export, output.compression, path)?;
        write_csv(df, path, &options)?;
        println!("Saved {} rows to {}", df.height(), path.display());
    }
    Ok(())
}

fn read_text(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}

fn run(command: Command, config: &AppConfig) -> Result<()> {
    match command {
        Command::Split {
            input,
            columns,
            remove_original,
            output,
        } => {
            let mut session = open_session(&input, config)?;
            let created = run_split(&mut session, &columns, remove_original)?;
            println!("Created columns: {}", created.join(", "));
            finish_table(session.df_mut(), &output, config)
        }
        Command::Hours {
            input,
            pairs,
            percentiles,
            no_percentiles,
            group_by,
            bucket,
            bucket_width,
            scale,
            report_json,
            output,
        } => {
            let mut session = open_session(&input, config)?;
            let request = HoursRequest::from_args_and_config(
                &pairs,
                &percentiles,
                no_percentiles,
                group_by.as_deref(),
                bucket,
                bucket_width,
                scale,
                config,
            );
            let report = run_hours(&mut session, &request);
            if report_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            for failure in &report.failures {
                eprintln!("Warning: {}: {}", failure.item, failure.error);
            }
            if report.durations.is_empty() {
                return Err(eyre!("No duration column could be computed"));
            }
            finish_table(session.df_mut(), &output, config)
        }
        Command::Pivot {
            input,
            rows,
            columns,
            values,
            aggregation,
            output,
        } => {
            let session = open_session(&input, config)?;
            let spec = PivotSpec {
                rows,
                columns,
                values,
                aggregation: aggregation.into(),
            };
            let mut pivoted = run_pivot(&session, &spec)?;
            finish_table(&mut pivoted, &output, config)
        }
        Command::Variants {
            path,
            listing_format,
            output,
        } => {
            let text = read_text(path.as_deref())?;
            let html = run_variants(&text, listing_format.into())?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &html)?;
                    println!("Saved HTML to {}", path.display());
                }
                None => println!("{}", html),
            }
            Ok(())
        }
        Command::Sheets { path } => {
            for (i, name) in hrcalc::source::list_sheets(&path)?.iter().enumerate() {
                println!("{}\t{}", i, name);
            }
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);
    color_eyre::install()?;

    if let Some(()) = handle_early_exit_flags(&args)? {
        return Ok(());
    }

    let Some(command) = args.command else {
        Args::command().print_help()?;
        return Ok(());
    };

    let config = AppConfig::load(APP_NAME)?;
    if let Err(e) = run(command, &config) {
        eprintln!("Error: {}", user_message_from_report(&e, None));
        std::process::exit(1);
    }
    Ok(())
}
