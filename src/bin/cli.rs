use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, LevelFilter};

use dfc::settings::{self, CompilerSettings};
use dfc::template::encode;
use dfc::{delivery, paths, project, ActionSchema, AppError, Program};

// ── CLI argument parsing ─────────────────────────────────────────

#[derive(Parser)]
#[command(name = "dfc", about = "Compile dfc programs into DiamondFire code templates", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// More log output (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a source file and print or write the result
    Build {
        source: PathBuf,
        #[command(flatten)]
        inputs: Inputs,
        /// Write here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Format::Give)]
        format: Format,
    },
    /// Compile a source file and report the first error, if any
    Check {
        source: PathBuf,
        #[command(flatten)]
        inputs: Inputs,
    },
    /// Print the JSON inside an encoded template
    Decode { template: String },
    /// Write a default dfc.json and a starter program
    Init {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// Print the effective settings
    Settings {
        /// Print the settings file's JSON schema instead
        #[arg(long)]
        schema: bool,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct Inputs {
    /// Action catalog; overrides `actiondump` in dfc.json
    #[arg(long)]
    actiondump: Option<PathBuf>,
    /// Settings file; defaults to dfc.json beside the source
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    /// One `/give` command for a container of templates
    Give,
    /// One encoded template per line
    Templates,
    /// Pretty JSON array of code lines
    Json,
}

// ── Commands ─────────────────────────────────────────────────────

struct Loaded {
    settings: CompilerSettings,
    schema: ActionSchema,
    program: Program,
}

fn compile_file(source: &Path, inputs: &Inputs) -> Result<Loaded> {
    let config = inputs
        .config
        .clone()
        .unwrap_or_else(|| paths::config_path(&paths::source_dir(source)));
    let settings = settings::load_settings_from(&config)?;

    let actiondump = match &inputs.actiondump {
        Some(path) => path.clone(),
        None => paths::resolve(&paths::source_dir(&config), &settings.actiondump),
    };
    let schema = ActionSchema::load(&actiondump)
        .with_context(|| format!("loading action catalog {}", actiondump.display()))?;

    let text = fs::read_to_string(source).map_err(|e| AppError::io(source, e))?;
    let file = source.to_string_lossy();
    let program = dfc::compile_source(&file, &text, &schema).map_err(AppError::from)?;
    info!("compiled {} into {} code lines", source.display(), program.lines.len());

    Ok(Loaded {
        settings,
        schema,
        program,
    })
}

fn render(loaded: &Loaded, format: Format) -> Result<String> {
    let Loaded {
        settings,
        schema,
        program,
    } = loaded;
    Ok(match format {
        Format::Give => delivery::give_command(program, schema, settings)?,
        Format::Templates => delivery::template_codes(program, schema)?.join("\n"),
        Format::Json => serde_json::to_string_pretty(&program.to_json(schema)?)?,
    })
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Build {
            source,
            inputs,
            out,
            format,
        } => {
            let loaded = compile_file(&source, &inputs)?;
            let output = render(&loaded, format)?;
            match out {
                Some(path) => {
                    project::atomic_write(&path, output.as_bytes())?;
                    info!("wrote {}", path.display());
                }
                None => println!("{output}"),
            }
        }
        Commands::Check { source, inputs } => {
            let loaded = compile_file(&source, &inputs)?;
            println!(
                "{}: ok ({} code lines)",
                source.display(),
                loaded.program.lines.len()
            );
        }
        Commands::Decode { template } => {
            let value = encode::decode(&template).map_err(AppError::from)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Commands::Init { dir } => {
            for path in project::init_project(&dir)? {
                println!("created {}", path.display());
            }
        }
        Commands::Settings { schema, config } => {
            if schema {
                println!("{}", CompilerSettings::json_schema()?);
            } else {
                let path = config.unwrap_or_else(|| paths::config_path(Path::new(".")));
                let loaded = settings::load_settings_from(&path)?;
                println!("{}", serde_json::to_string_pretty(&loaded)?);
            }
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let level = match (cli.quiet, cli.verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Warn,
        (false, 1) => LevelFilter::Info,
        (false, 2) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    };
    if let Err(e) = simple_logger::SimpleLogger::new()
        .with_level(level)
        .env()
        .init()
    {
        eprintln!("failed to initialize logging: {e}");
    }

    if let Err(e) = run(cli) {
        eprintln!("{e:#}");
        process::exit(1);
    }
}
