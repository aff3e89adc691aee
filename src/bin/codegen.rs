//! Schema Codegen CLI
//!
//! Runs constraint analysis over JSON Schema files and writes the generation IR.

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use schema_codegen::config::CONFIG_FILE;
use schema_codegen::{CodegenConfig, Generator, JsonRenderer, Renderer, TargetLanguage};

#[derive(Parser)]
#[command(name = "schema-codegen")]
#[command(about = "Resolve JSON Schema constraints into a code generation IR")]
struct Cli {
    /// Config file layered over the default locations
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the IR for schema files or directories
    Generate {
        /// Schema files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Enforce additional-properties constraints
        #[arg(long)]
        strict: bool,

        /// Target language (kotlin, java, typescript, rust)
        #[arg(short, long)]
        language: Option<String>,

        /// Base package for generated classes
        #[arg(short, long)]
        package: Option<String>,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Analyse schemas and report diagnostics without writing output
    Check {
        /// Schema files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Write the effective configuration to a TOML file
    InitConfig {
        #[arg(default_value = CONFIG_FILE)]
        path: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = CodegenConfig::load_from(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Generate {
            paths,
            strict,
            language,
            package,
            output,
        } => {
            if strict {
                config.generator.strict_additional_properties = true;
            }
            if let Some(name) = language {
                config.generator.target_language =
                    TargetLanguage::parse(&name).ok_or_else(|| anyhow!("unknown target language '{}'", name))?;
            }
            if package.is_some() {
                config.generator.base_package = package;
            }

            let generated = Generator::new(config)?.generate_paths(&paths)?;
            if !generated.diagnostics.is_empty() {
                eprint!("{}", generated.diagnostics.format_all());
            }
            let text = JsonRenderer::pretty().render(&generated)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
                    eprintln!("✅ Wrote {} classes to {}", generated.classes.len(), path.display());
                }
                None => print!("{}", text),
            }
        }

        Commands::Check { paths } => {
            let generated = Generator::new(config)?.generate_paths(&paths)?;
            print!("{}", generated.diagnostics.format_all());
            println!(
                "✅ {} classes, {} diagnostic(s)",
                generated.classes.len(),
                generated.diagnostics.len()
            );
        }

        Commands::InitConfig { path } => {
            config.save(&path).with_context(|| format!("writing {}", path.display()))?;
            println!("✅ Wrote configuration to {}", path.display());
        }
    }

    Ok(())
}
