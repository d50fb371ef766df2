use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use colored::Colorize;
use serde_json::Value;
use tracing::debug;

use egc_client::{
    CacheConfig, Denormalized, EntityCache, ExecutionError, FetchPolicy, QueryExecutor, ReadOutcome,
};
use egc_types::{IdentityKey, Operation, OperationKind, Record, Schema, Variables};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Check(args) => cmd_check(args),
        Command::Normalize(args) => cmd_normalize(args, cli.format).await,
        Command::Read(args) => cmd_read(args, cli.format).await,
    }
}

/// Answers every operation with the response loaded from disk.
struct FileExecutor {
    response: Value,
}

#[async_trait]
impl QueryExecutor for FileExecutor {
    async fn execute(&self, _operation: &Operation, _variables: &Variables) -> Result<Value, ExecutionError> {
        Ok(self.response.clone())
    }
}

fn cmd_check(args: CheckArgs) -> anyhow::Result<()> {
    let schema = load_schema(&args.schema)?;
    schema.validate()?;
    println!(
        "{} Schema ok: {} types, query root {}",
        "✓".green().bold(),
        schema.len(),
        schema.query_type().yellow()
    );
    if let Some(root) = schema.mutation_type() {
        println!("  Mutation root: {}", root.yellow());
    }

    if let Some(path) = args.operation {
        let operation = load_operation(&path)?;
        schema.validate_operation(&operation)?;
        println!(
            "{} Operation {} ({}) fits the schema",
            "✓".green().bold(),
            operation.label().bold(),
            operation.kind
        );
    }
    Ok(())
}

async fn cmd_normalize(args: NormalizeArgs, format: OutputFormat) -> anyhow::Result<()> {
    let (cache, _, _) = write_input(&args.input).await?;
    if args.gc {
        let evicted = cache.gc()?;
        if format == OutputFormat::Text {
            println!("{} GC: {} records removed.", "✓".green(), evicted.len());
        }
    }
    let records = cache.extract()?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        OutputFormat::Text => print_records(&records),
    }
    Ok(())
}

async fn cmd_read(args: ReadArgs, format: OutputFormat) -> anyhow::Result<()> {
    let (cache, operation, variables) = write_input(&args.input).await?;
    let query = match &args.query {
        Some(path) => load_operation(path)?,
        None => operation,
    };
    let query_vars = match &args.query_vars {
        Some(path) => load_variables(path)?,
        None => variables,
    };

    let read = cache.read_query(&query, &query_vars)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&read)?),
        OutputFormat::Text => print_read(&query, &read)?,
    }
    Ok(())
}

/// Build a cache and write the input response into it through the
/// operation's normal path.
async fn write_input(input: &WriteInput) -> anyhow::Result<(EntityCache<FileExecutor>, Operation, Variables)> {
    let schema = load_schema(&input.schema)?;
    let operation = load_operation(&input.operation)?;
    let variables = match &input.vars {
        Some(path) => load_variables(path)?,
        None => Variables::new(),
    };
    let config = match &input.config {
        Some(path) => CacheConfig::from_toml_str(&read_text(path)?)?,
        None => CacheConfig::default(),
    };
    let response: Value = serde_json::from_str(&read_text(&input.response)?)
        .with_context(|| format!("parsing response {}", input.response.display()))?;

    let cache = EntityCache::with_config(schema, FileExecutor { response }, config)?;
    match operation.kind {
        OperationKind::Query => {
            cache
                .query_with_policy(&operation, &variables, FetchPolicy::NetworkOnly)
                .await?;
        }
        OperationKind::Mutation => {
            cache.mutate(&operation, &variables).await?;
        }
    }
    debug!(operation = operation.label(), records = cache.store().keys()?.len(), "input written");
    Ok((cache, operation, variables))
}

fn print_records(records: &BTreeMap<IdentityKey, Record>) {
    println!("{} records", records.len().to_string().bold());
    for (key, record) in records {
        println!("{}", key.as_str().yellow().bold());
        for (field, value) in record.iter() {
            println!("  {}: {}", field.cyan(), value.to_json());
        }
    }
}

fn print_read(query: &Operation, read: &Denormalized) -> anyhow::Result<()> {
    match &read.outcome {
        ReadOutcome::Complete(tree) => {
            println!(
                "{} {} complete ({} records read)",
                "✓".green().bold(),
                query.label().bold(),
                read.dependencies.len()
            );
            println!("{}", serde_json::to_string_pretty(tree)?);
        }
        ReadOutcome::Miss(missing) => {
            println!("{} {} missing {} path(s)", "✗".red().bold(), query.label().bold(), missing.len());
            for m in missing {
                println!("  {}", m.to_string().dimmed());
            }
        }
    }
    Ok(())
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn load_schema(path: &Path) -> anyhow::Result<Schema> {
    Schema::from_toml_str(&read_text(path)?).with_context(|| format!("loading schema {}", path.display()))
}

fn load_operation(path: &Path) -> anyhow::Result<Operation> {
    parse_operation(&read_text(path)?).with_context(|| format!("loading operation {}", path.display()))
}

fn load_variables(path: &Path) -> anyhow::Result<Variables> {
    serde_json::from_str(&read_text(path)?).with_context(|| format!("loading variables {}", path.display()))
}

fn parse_operation(text: &str) -> serde_json::Result<Operation> {
    serde_json::from_str(text)
}
