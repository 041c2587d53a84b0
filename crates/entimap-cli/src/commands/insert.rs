//! Insert-category command

use std::path::Path;

use clap::Args;
use entimap_core::{ChangeOperation, EntityInstance};

#[derive(Debug, Args)]
pub struct InsertCategoryArgs {
    /// Category name (at most 50 characters)
    pub name: String,
}

pub fn execute(args: InsertCategoryArgs, db: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let factory = super::open_factory(db)?;
    let mut session = factory.open_session()?;

    let change = session.stage(
        ChangeOperation::Insert,
        EntityInstance::new("Category").with("Name", args.name.as_str()),
    )?;
    let receipt = session.commit()?;

    let id = receipt
        .instance(change)
        .and_then(|category| category.get("Id"))
        .ok_or("commit returned no generated id")?;

    println!("Category inserted:");
    println!("  Id: {}", id);
    println!("  Name: {}", args.name);
    Ok(())
}
