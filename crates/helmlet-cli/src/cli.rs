//! helmlet CLI - render templates against layered values
//!
//! Usage:
//!   helmlet --value values.yaml --template deploy.yaml --set image.tag=1.27
//!   helmlet --value base.yaml --value prod.yaml --template-dir templates/ --output-dir out/
//!   helmlet --value values.yaml --dump-values json

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use colored::Colorize;
use helmlet_core::{
    find_templates, read_utf8_file, template_context, ConflictPolicy, Delimiters, Template, Value,
    ValuesBuilder,
};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_ENV: &str = "HELMLET_LOG";
const RULE: &str = "# -----------------------------------------------";

/// helmlet - render text templates against layered YAML values
#[derive(Parser)]
#[command(name = "helmlet")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Values YAML file, later files override earlier ones (repeatable)
    #[arg(long = "value", value_name = "FILE")]
    values: Vec<PathBuf>,

    /// Template file (repeatable)
    #[arg(long = "template", value_name = "FILE")]
    templates: Vec<PathBuf>,

    /// Directory searched recursively for .yaml, .yml and .tpl templates
    #[arg(long, value_name = "DIR")]
    template_dir: Option<PathBuf>,

    /// Directory to write rendered templates to
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Output file (when processing a single template)
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Set values on the command line: key1=val1,key2=val2 (repeatable)
    #[arg(long = "set", value_name = "PAIRS")]
    set: Vec<String>,

    /// Template delimiters as "left,right"
    #[arg(long, default_value = "{{,}}")]
    delimiter: String,

    /// Missing keys in templates are errors
    #[arg(long)]
    strict: bool,

    /// Reject values layers that change a key between mapping and non-mapping
    #[arg(long)]
    strict_merge: bool,

    /// Print the merged values instead of rendering templates
    #[arg(long, value_enum, value_name = "FORMAT")]
    dump_values: Option<DumpFormat>,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DumpFormat {
    Yaml,
    Json,
}

/// Run the CLI with the process arguments
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(format) = cli.dump_values {
        return cmd_dump_values(&cli, format);
    }

    println!("# Helmlet version: {}", env!("CARGO_PKG_VERSION"));

    if cli.templates.is_empty() && cli.template_dir.is_none() {
        println!("Usage: helmlet --value values.yaml --template template.yaml [--set key1=val1,key2=val2] [--output output.yaml]");
        println!("       helmlet --value values.yaml --template-dir templates/ [--output-dir output/]");
        return ExitCode::SUCCESS;
    }

    cmd_render(&cli)
}

fn init_logging(verbose: bool) {
    let default_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .with_env_var(LOG_ENV)
        .from_env_lossy();

    // Also routes `log` records from helmlet-core through tracing.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init();
}

fn load_values(cli: &Cli) -> anyhow::Result<Value> {
    let policy = if cli.strict_merge {
        ConflictPolicy::Strict
    } else {
        ConflictPolicy::OverrideWins
    };

    let mut builder = ValuesBuilder::new().with_policy(policy);
    for file in &cli.values {
        builder = builder
            .merge_file(file)
            .with_context(|| format!("values file {}", file.display()))?;
    }
    for set in &cli.set {
        builder = builder
            .apply_set(set)
            .with_context(|| format!("--set {}", set))?;
    }

    Ok(builder.build())
}

fn report(err: &anyhow::Error) {
    eprintln!("{} {:#}", "# Error".red(), err);
}

fn cmd_dump_values(cli: &Cli, format: DumpFormat) -> ExitCode {
    let values = match load_values(cli) {
        Ok(v) => v,
        Err(e) => {
            report(&e);
            return ExitCode::from(2);
        }
    };

    let rendered = match format {
        DumpFormat::Yaml => serde_yaml::to_string(&values).map_err(anyhow::Error::from),
        DumpFormat::Json => serde_json::to_string_pretty(&values)
            .map(|s| s + "\n")
            .map_err(anyhow::Error::from),
    };

    match rendered {
        Ok(text) => {
            print!("{}", text);
            ExitCode::SUCCESS
        }
        Err(e) => {
            report(&e);
            ExitCode::from(2)
        }
    }
}

/// Values, delimiters and the template list; failures here exit with 2
fn prepare(cli: &Cli) -> anyhow::Result<(Value, Delimiters, Vec<PathBuf>)> {
    let values = load_values(cli)?;
    let delimiters = Delimiters::parse(&cli.delimiter).context("--delimiter")?;

    let mut templates = cli.templates.clone();
    if let Some(dir) = &cli.template_dir {
        let found = find_templates(dir)
            .with_context(|| format!("reading template directory {}", dir.display()))?;
        templates.extend(found);
    }

    if let Some(dir) = &cli.output_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
    }

    Ok((values, delimiters, templates))
}

fn cmd_render(cli: &Cli) -> ExitCode {
    let (values, delimiters, templates) = match prepare(cli) {
        Ok(prepared) => prepared,
        Err(e) => {
            report(&e);
            return ExitCode::from(2);
        }
    };

    if templates.is_empty() {
        println!("No templates found to process");
        return ExitCode::SUCCESS;
    }

    let context = template_context(values);
    let job = RenderJob {
        context: &context,
        delimiters: &delimiters,
        strict: cli.strict,
    };

    if let ([template], Some(output)) = (templates.as_slice(), &cli.output) {
        return match job.to_file(template, output) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                report(&e);
                ExitCode::from(1)
            }
        };
    }

    let mut failed = 0;
    for template in &templates {
        let result = match (&cli.output_dir, &cli.output) {
            (Some(dir), _) => job.to_file(template, &dir.join(base_name(template))),
            (None, Some(output)) => job.to_file(template, output),
            (None, None) => job.to_stdout(template),
        };
        if let Err(e) = result {
            report(&e);
            failed += 1;
        }
    }

    if failed > 0 {
        log::debug!("{} of {} templates failed", failed, templates.len());
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}

fn base_name(path: &Path) -> &Path {
    path.file_name().map(Path::new).unwrap_or(path)
}

struct RenderJob<'a> {
    context: &'a Value,
    delimiters: &'a Delimiters,
    strict: bool,
}

impl RenderJob<'_> {
    fn render(&self, path: &Path) -> anyhow::Result<String> {
        let decoded = read_utf8_file(path)?;
        if decoded.converted {
            println!("# Converted {} to UTF-8", path.display());
        }

        let template = Template::parse(path.display().to_string(), &decoded.text, self.delimiters)
            .with_context(|| format!("parsing template {}", path.display()))?;
        let out = template
            .render(self.context, self.strict)
            .with_context(|| format!("executing template {}", path.display()))?;
        Ok(out)
    }

    fn to_file(&self, template: &Path, output: &Path) -> anyhow::Result<()> {
        let out = self.render(template)?;
        fs::write(output, out)
            .with_context(|| format!("writing to output file {}", output.display()))?;
        println!("# Output written to {}", output.display());
        Ok(())
    }

    fn to_stdout(&self, template: &Path) -> anyhow::Result<()> {
        println!("\n# Processing template: {}", template.display());
        println!("{}", RULE);
        let out = self.render(template)?;
        print!("{}", out);
        Ok(())
    }
}
