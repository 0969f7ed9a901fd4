//! CLI: map JSON documents against a schema document, or describe a class.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::descriptor::TypeDescriptor;
use crate::mapper::{Mapper, MapperConfig};
use crate::path_de;
use crate::schema::{Registry, SchemaDocument, SchemaProvider};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// decode JSON documents into the classes declared by a schema document
#[derive(Parser, Debug)]
#[command(name = "json-mapper", version)]
pub struct CommandLineInterface {
    /// more logging (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// map every input document onto a class and print the decoded trees
    Map(MapOut),
    /// print the resolved constructor parameters of a class
    Describe(DescribeOut),
}

#[derive(Args, Debug, Clone)]
struct SchemaSettings {
    /// schema document (.json) declaring classes and enums
    #[arg(long)]
    schema: PathBuf,

    /// target class name
    #[arg(long)]
    class: String,
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items/0/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct MapOut {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    #[command(flatten)]
    input_settings: InputSettings,

    /// mapper config (.json) with class_mapping / parameter_name_mapping
    #[arg(long)]
    config: Option<PathBuf>,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct DescribeOut {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    /// expected type expression, e.g. `Box<Cat>` (defaults to the class itself)
    #[arg(long = "type")]
    ty: Option<String>,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

/// One input document and where it came from (`path` or `path:line`).
#[derive(Debug)]
struct Document {
    source: String,
    value: Value,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn load_documents(&self) -> anyhow::Result<Vec<Document>> {
        let source_paths =
            resolve_file_path_patterns(&self.input).context("failed to resolve input file paths")?;
        let mut documents = Vec::new();
        for source_path in source_paths {
            let source_path_str = source_path.to_string_lossy().to_string();
            let source = std::fs::read_to_string(&source_path)
                .with_context(|| format!("failed to read source file {source_path_str}"))?;
            if self.ndjson {
                for (i, line) in source.lines().enumerate().filter(|(_, l)| !l.trim().is_empty()) {
                    let source = format!("{source_path_str}:{}", i + 1);
                    let value = serde_json::from_str::<Value>(line)
                        .with_context(|| format!("failed to parse JSON ({source})"))?;
                    documents.push(self.select(source, value)?);
                }
            } else {
                let value = serde_json::from_str::<Value>(&source)
                    .with_context(|| format!("failed to parse JSON source file ({source_path_str})"))?;
                documents.push(self.select(source_path_str, value)?);
            }
        }
        Ok(documents)
    }

    fn select(&self, source: String, value: Value) -> anyhow::Result<Document> {
        let Some(pointer) = self.json_pointer.as_deref() else {
            return Ok(Document { source, value });
        };
        match value.pointer(pointer) {
            Some(node) => Ok(Document { value: node.clone(), source }),
            None => bail!("JSON pointer {pointer} selects nothing in {source}"),
        }
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn init_tracing(&self) {
        let default = match self.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        };
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    }

    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Map(target) => target.run(),
            Command::Describe(target) => target.run(),
        }
    }
}

impl MapOut {
    fn run(&self) -> anyhow::Result<()> {
        let SchemaSettings { schema, class } = &self.schema_settings;
        let registry = load_registry(schema)?;
        let config = match self.config.as_ref() {
            Some(path) => load_config(path)?,
            None => MapperConfig::default(),
        };
        let mapper = Mapper::builder().with_config(config).build(Arc::new(registry));

        let documents = self.input_settings.load_documents()?;
        info!(documents = documents.len(), %class, "mapping");
        let results: Vec<_> = documents
            .par_iter()
            .map(|doc| mapper.map_value(class, &doc.value).map(|instance| instance.to_json()))
            .collect();

        let mut outputs = Vec::with_capacity(results.len());
        let mut failures = 0usize;
        for (doc, result) in documents.iter().zip(results) {
            match result {
                Ok(value) => outputs.push(value),
                Err(error) => {
                    failures += 1;
                    eprintln!("{} {}: {error}", "failed".red().bold(), doc.source.bold());
                }
            }
        }

        let rendered = if self.input_settings.ndjson {
            let mut lines = String::new();
            for value in &outputs {
                lines.push_str(&serde_json::to_string(value)?);
                lines.push('\n');
            }
            lines
        } else {
            serde_json::to_string_pretty(&Value::Array(outputs))? + "\n"
        };
        write_output(self.out.as_deref(), &rendered)?;

        if failures > 0 {
            bail!("{failures} of {} documents failed to map", documents.len());
        }
        Ok(())
    }
}

impl DescribeOut {
    fn run(&self) -> anyhow::Result<()> {
        let SchemaSettings { schema, class } = &self.schema_settings;
        let registry = load_registry(schema)?;
        let expected = match self.ty.as_deref() {
            Some(src) => src
                .parse::<TypeDescriptor>()
                .with_context(|| format!("invalid --type {src:?}"))?
                .resolve_names(&[], &|name: &str| registry.is_enum(name)),
            None => TypeDescriptor::class(class.as_str()),
        };
        let parameters = registry.parameters(class, &expected)?;
        let view = serde_json::json!({
            "class": class,
            "type": expected.to_string(),
            "parameters": &*parameters,
        });
        write_output(self.out.as_deref(), &(serde_json::to_string_pretty(&view)? + "\n"))
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn load_registry(path: &Path) -> anyhow::Result<Registry> {
    let document = SchemaDocument::load(path)?;
    document
        .into_registry()
        .with_context(|| format!("invalid schema document {}", path.display()))
}

fn load_config(path: &Path) -> anyhow::Result<MapperConfig> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read config {}", path.display()))?;
    path_de::from_slice_with_path(&bytes).with_context(|| format!("invalid config {}", path.display()))
}

fn write_output(out: Option<&Path>, contents: &str) -> anyhow::Result<()> {
    let Some(out) = out else {
        print!("{contents}");
        return Ok(());
    };
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(out, contents).with_context(|| format!("failed to write {}", out.display()))
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                // Pattern was explicitly a glob but matched nothing -> surface as an error
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
