use anyhow::{bail, Context};
use colored::Colorize;
use serialz_codec::text::{from_json, to_json};
use serialz_store::{
    BinaryRecord, KvRecord, OpenOptions, PathResolver, Record, StoreConfig, TextRecord,
};
use serialz_types::{Attributes, RecordId, TypeTag, Value};
use tracing::debug;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let resolver = resolver(&cli)?;
    debug!(root = %resolver.root().display(), backend = ?cli.backend, "store ready");
    match cli.command {
        Command::Put(args) => match cli.backend {
            Backend::Text => cmd_put::<TextRecord>(&resolver, args, cli.format),
            Backend::Binary => cmd_put::<BinaryRecord>(&resolver, args, cli.format),
            Backend::Kv => cmd_put::<KvRecord>(&resolver, args, cli.format),
        },
        Command::Get(args) => match cli.backend {
            Backend::Text => cmd_get::<TextRecord>(&resolver, args, cli.format),
            Backend::Binary => cmd_get::<BinaryRecord>(&resolver, args, cli.format),
            Backend::Kv => cmd_get::<KvRecord>(&resolver, args, cli.format),
        },
        Command::Delete(args) => match cli.backend {
            Backend::Text => cmd_delete::<TextRecord>(&resolver, args),
            Backend::Binary => cmd_delete::<BinaryRecord>(&resolver, args),
            Backend::Kv => cmd_delete::<KvRecord>(&resolver, args),
        },
    }
}

fn resolver(cli: &Cli) -> anyhow::Result<PathResolver> {
    let mut config = match &cli.config {
        Some(path) => StoreConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => StoreConfig::default(),
    };
    if let Some(root) = &cli.root {
        config.root = root.clone();
    }
    Ok(PathResolver::new(config)?)
}

fn identity(type_tag: &str, id: &str) -> anyhow::Result<(TypeTag, RecordId)> {
    Ok((TypeTag::new(type_tag)?, RecordId::new(id)?))
}

/// Parse a `NAME=VALUE` argument.
pub fn parse_field(arg: &str) -> anyhow::Result<(String, Value)> {
    let Some((name, raw)) = arg.split_once('=') else {
        bail!("expected NAME=VALUE, got {arg:?}");
    };
    if name.is_empty() {
        bail!("empty field name in {arg:?}");
    }
    let value = if let Some(digits) = raw.strip_prefix("hex:") {
        Value::Bytes(hex::decode(digits).with_context(|| format!("bad hex in field {name}"))?)
    } else {
        match serde_json::from_str(raw) {
            Ok(json) => from_json(json).unwrap_or_else(|_| Value::Text(raw.to_string())),
            Err(_) => Value::Text(raw.to_string()),
        }
    };
    Ok((name.to_string(), value))
}

pub fn put<R: Record>(resolver: &PathResolver, args: &PutArgs) -> anyhow::Result<R> {
    let (type_tag, id) = identity(&args.type_tag, &args.id)?;
    let fields = args
        .fields
        .iter()
        .map(String::as_str)
        .map(parse_field)
        .collect::<anyhow::Result<Vec<_>>>()?;

    let options = OpenOptions::new().overwrite(args.overwrite);
    let mut record = R::open(resolver, type_tag, id, options)?;
    for (name, value) in fields {
        record
            .set(&name, value)
            .with_context(|| format!("setting field {name}"))?;
    }
    record.save()?;
    Ok(record)
}

pub fn get<R: Record>(resolver: &PathResolver, args: &GetArgs) -> anyhow::Result<R> {
    let (type_tag, id) = identity(&args.type_tag, &args.id)?;
    Ok(R::open(resolver, type_tag, id, OpenOptions::new())?)
}

pub fn delete<R: Record>(resolver: &PathResolver, args: &DeleteArgs) -> anyhow::Result<R> {
    let (type_tag, id) = identity(&args.type_tag, &args.id)?;
    let record = R::open(resolver, type_tag, id, OpenOptions::new().autoload(false))?;
    record.delete()?;
    Ok(record)
}

fn cmd_put<R: Record>(resolver: &PathResolver, args: PutArgs, format: OutputFormat) -> anyhow::Result<()> {
    let record = put::<R>(resolver, &args)?;
    match format {
        OutputFormat::Text => {
            println!(
                "{} Saved {}/{} ({} fields)",
                "✓".green().bold(),
                record.type_tag().as_str().cyan(),
                record.id().as_str().yellow(),
                record.attributes().len()
            );
            if let Some(dest) = record.destination() {
                println!("  {}", dest.display().to_string().dimmed());
            }
        }
        OutputFormat::Json => print_json(&record)?,
    }
    Ok(())
}

fn cmd_get<R: Record>(resolver: &PathResolver, args: GetArgs, format: OutputFormat) -> anyhow::Result<()> {
    let record = get::<R>(resolver, &args)?;
    if let Some(name) = &args.field {
        let Some(value) = record.get(name) else {
            bail!("{}/{} has no field {name:?}", record.type_tag(), record.id());
        };
        match format {
            OutputFormat::Text => println!("{value}"),
            OutputFormat::Json => println!("{}", to_json(value)?),
        }
        return Ok(());
    }

    match format {
        OutputFormat::Text => print_text(record.attributes()),
        OutputFormat::Json => print_json(&record)?,
    }
    Ok(())
}

fn cmd_delete<R: Record>(resolver: &PathResolver, args: DeleteArgs) -> anyhow::Result<()> {
    let record = delete::<R>(resolver, &args)?;
    println!(
        "{} Deleted {}/{}",
        "✓".green().bold(),
        record.type_tag().as_str().cyan(),
        record.id().as_str().yellow()
    );
    Ok(())
}

fn print_text(attributes: &Attributes) {
    if attributes.is_empty() {
        println!("{}", "(no fields)".dimmed());
        return;
    }
    for (name, value) in attributes {
        println!("{} = {}", name.bold(), value);
    }
}

fn print_json<R: Record>(record: &R) -> anyhow::Result<()> {
    let payload = record.state().payload();
    let json = to_json(&payload).context("record cannot be shown as JSON; use --format text")?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
