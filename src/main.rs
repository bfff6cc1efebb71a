use anyhow::{Context, Result};
use serving_pipeline::cli::commands::{DataFormat, InspectCommand, RunCommand, TraceCommand, ValidateCommand};
use serving_pipeline::cli::output::*;
use serving_pipeline::cli::{Cli, Command};
use serving_pipeline::profiler::read_events;
use serving_pipeline::{Data, EngineConfig, Pipeline, PipelineContext};
use std::io::Write;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd, &cli)?,
        Command::Validate(cmd) => validate_pipeline(cmd, &cli)?,
        Command::Inspect(cmd) => inspect_data(cmd)?,
        Command::Trace(cmd) => show_trace(cmd)?,
    }

    Ok(())
}

fn load_context(cli: &Cli) -> Result<PipelineContext> {
    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("Failed to load engine config {}", path))?,
        None => EngineConfig::default(),
    };
    PipelineContext::from_config(&config).context("Failed to set up pipeline context")
}

fn run_pipeline(cmd: &RunCommand, cli: &Cli) -> Result<()> {
    let pipeline = Pipeline::from_file(&cmd.file).context("Failed to load pipeline")?;
    let input = Data::from_file(&cmd.input)
        .with_context(|| format!("Failed to read input data {}", cmd.input))?;
    let ctx = load_context(cli)?;

    eprintln!(
        "{} Running pipeline {} ({} steps)",
        ROCKET,
        style(pipeline.id()).bold(),
        pipeline.step_configs().len()
    );

    let mut executor = pipeline.executor(&ctx).context("Failed to build pipeline")?;
    let result = executor.exec(&input);
    executor.close();
    ctx.shutdown();

    let output = match result {
        Ok(output) => output,
        Err(e) => {
            eprintln!("{} Pipeline {}", CROSS, style("failed").red());
            error!("{}", e);
            std::process::exit(1);
        }
    };

    match &cmd.output {
        Some(path) => {
            write_data(&output, cmd.format, std::fs::File::create(path)?)
                .with_context(|| format!("Failed to write output {}", path))?;
            eprintln!("{} Output written to {}", CHECK, style(path).cyan());
        }
        None => write_data(&output, cmd.format, std::io::stdout().lock())?,
    }

    if cmd.metrics {
        eprintln!("\n{} Metrics", INFO);
        eprint!("{}", ctx.metrics_backend().snapshot().render_text());
    }

    Ok(())
}

fn write_data<W: Write>(data: &Data, format: DataFormat, mut out: W) -> Result<()> {
    match format {
        DataFormat::Json => writeln!(out, "{}", data.to_json()?)?,
        DataFormat::Yaml => write!(out, "{}", data.to_yaml()?)?,
        DataFormat::Binary => data.write_to(&mut out)?,
    }
    out.flush()?;
    Ok(())
}

fn validate_pipeline(cmd: &ValidateCommand, cli: &Cli) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    // Building the executor also checks that every step type is registered
    let result = Pipeline::from_file(&cmd.file).and_then(|pipeline| {
        let ctx = load_context(cli).map_err(|e| {
            serving_pipeline::PipelineError::Configuration(format!("{:#}", e))
        })?;
        pipeline.executor(&ctx)?.close();
        Ok(pipeline)
    });

    match result {
        Ok(pipeline) => {
            println!("{} Pipeline is valid!", CHECK);
            println!("{}", format_pipeline(&pipeline));

            if cmd.json {
                println!("\n{}", pipeline.to_json()?);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(e).red());
            std::process::exit(1);
        }
    }
}

fn inspect_data(cmd: &InspectCommand) -> Result<()> {
    let data = Data::from_file(&cmd.file)
        .with_context(|| format!("Failed to read data file {}", cmd.file))?;

    match cmd.format {
        Some(format) => write_data(&data, format, std::io::stdout().lock())?,
        None => {
            println!("{} {} ({} keys)", INFO, style(&cmd.file).bold(), data.len());
            println!("{}", format_data(&data));
        }
    }
    Ok(())
}

fn show_trace(cmd: &TraceCommand) -> Result<()> {
    let events = read_events(&cmd.file)
        .with_context(|| format!("Failed to read trace file {}", cmd.file))?;

    if events.is_empty() {
        println!("{} No events in {}", WARN, cmd.file);
        return Ok(());
    }

    println!("{} {} events in {}", INFO, events.len(), style(&cmd.file).bold());
    for span in summarize_trace(&events) {
        println!("{}", format_span(&span));
    }
    Ok(())
}
