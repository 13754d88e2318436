//! Object type listing.

use clap::{Args, ValueEnum};
use patchbay_registry::{ObjectCategory, ObjectRegistry, ObjectSpec};
use serde::Serialize;

#[derive(Clone, Copy, ValueEnum)]
enum Category {
    Control,
    Signal,
}

impl From<Category> for ObjectCategory {
    fn from(c: Category) -> Self {
        match c {
            Category::Control => ObjectCategory::Control,
            Category::Signal => ObjectCategory::Signal,
        }
    }
}

#[derive(Args)]
pub struct ObjectsArgs {
    /// Only list one category
    #[arg(long, value_enum)]
    category: Option<Category>,

    /// Resolve a type text (e.g. "pack f f f") instead of listing
    #[arg(long, value_name = "TEXT")]
    resolve: Option<String>,

    /// Print JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct ObjectRow {
    name: &'static str,
    category: &'static str,
    inlets: Option<usize>,
    outlets: Option<usize>,
    variadic: bool,
}

pub fn run(args: ObjectsArgs) -> anyhow::Result<()> {
    let registry = ObjectRegistry::new();

    if let Some(text) = &args.resolve {
        let arity = registry.resolve(text)?;
        if args.json {
            println!(
                "{}",
                serde_json::json!({ "text": text, "inlets": arity.inlets, "outlets": arity.outlets })
            );
        } else {
            println!("{text}: {arity}");
        }
        return Ok(());
    }

    let objects = match args.category {
        Some(c) => registry.objects_in_category(c.into()),
        None => registry.all_objects(),
    };
    let rows: Vec<ObjectRow> = objects
        .iter()
        .map(|d| {
            let fixed = match d.spec {
                ObjectSpec::Fixed(arity) => Some(arity),
                ObjectSpec::Variadic(_) => None,
            };
            ObjectRow {
                name: d.name,
                category: d.category.name(),
                inlets: fixed.map(|a| a.inlets),
                outlets: fixed.map(|a| a.outlets),
                variadic: d.spec.is_variadic(),
            }
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("Known objects ({}):", rows.len());
    println!();
    println!("  {:16}  {:8}  {}", "Name", "Category", "Arity");
    println!("  {:16}  {:8}  {}", "----", "--------", "-----");
    for row in &rows {
        let arity = match (row.inlets, row.outlets) {
            (Some(i), Some(o)) => format!("{i} in / {o} out"),
            _ => "depends on arguments".to_string(),
        };
        println!("  {:16}  {:8}  {arity}", row.name, row.category);
    }
    Ok(())
}
