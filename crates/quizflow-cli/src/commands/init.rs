//! The `quizflow init` command.

use std::path::Path;

use anyhow::Result;

use quizflow_client::config::{sample_config, CONFIG_FILE};

pub fn execute() -> Result<()> {
    if Path::new(CONFIG_FILE).exists() {
        println!("{CONFIG_FILE} already exists, skipping.");
        return Ok(());
    }

    std::fs::write(CONFIG_FILE, sample_config())?;
    println!("Created {CONFIG_FILE}");

    println!("\nNext steps:");
    println!("  1. Point base_url in {CONFIG_FILE} at your quiz service");
    println!("  2. Run: quizflow play --category \"Chess\"");

    Ok(())
}
