//! Show-category command

use std::path::Path;

use clap::Args;
use entimap_core::Value;

#[derive(Debug, Args)]
pub struct ShowCategoryArgs {
    pub id: u8,

    /// Print the instance as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: ShowCategoryArgs, db: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let factory = super::open_factory(db)?;
    let session = factory.open_session()?;

    let category = session
        .find("Category", &[Value::Byte(args.id)])?
        .ok_or_else(|| format!("category {} not found", args.id))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&category)?);
        return Ok(());
    }

    println!("Category:");
    for (field, value) in category.values() {
        println!("  {}: {}", field, value);
    }
    Ok(())
}
