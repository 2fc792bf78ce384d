use anyhow::Result;
use log::info;
use std::env;
use std::path::PathBuf;

use shader_repair_rust::{generate_directory_report, RepairConfig, VERSION};

fn main() -> Result<()> {
    // Initialiser le logging
    env_logger::init();
    info!("Shader Repair Rust v{}", VERSION);

    // Parser les arguments de ligne de commande
    let args: Vec<String> = env::args().collect();
    let mut config_path: Option<String> = None;
    let mut directory: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                config_path = Some(args[i + 1].clone());
                i += 1;
            }
            "--dir" if i + 1 < args.len() => {
                directory = Some(PathBuf::from(&args[i + 1]));
                i += 1;
            }
            other => {
                eprintln!("Argument ignoré: {}", other);
            }
        }
        i += 1;
    }

    let config = match &config_path {
        Some(path) => RepairConfig::load_from_file(path)?,
        None => RepairConfig::default(),
    };
    let directory = directory.unwrap_or(config.bundle_directory);

    info!("Analyse de {}", directory.display());
    let report = generate_directory_report(&directory)?;
    println!("{}", report);

    Ok(())
}
