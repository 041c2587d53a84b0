//! Describe command: resolved storage shapes and their DDL

use clap::Args;
use entimap_core::MappingResolver;
use entimap_store::migrations::create_table_sql;

use crate::model;

#[derive(Debug, Args)]
pub struct DescribeArgs {
    /// Entity to describe; all entities when omitted
    pub entity: Option<String>,

    /// Print CREATE TABLE statements instead of JSON shapes
    #[arg(long)]
    pub ddl: bool,
}

pub fn execute(args: DescribeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let resolver = MappingResolver::new(model::registry()?);
    let shapes = match &args.entity {
        Some(entity) => vec![resolver.resolve_name(entity)?],
        None => resolver.resolve_all()?,
    };

    if args.ddl {
        for shape in &shapes {
            println!("{}\n", create_table_sql(shape));
        }
        return Ok(());
    }

    let shapes = shapes.iter().map(|s| s.as_ref()).collect::<Vec<_>>();
    println!("{}", serde_json::to_string_pretty(&shapes)?);
    Ok(())
}
