//! `frontgate validate` — check a configuration file for errors.
//!
//! Parses and validates the config file, reporting every problem found
//! in either human-readable text or machine-readable JSON format.

use crate::cli::{ValidateArgs, ValidateFormat};
use crate::config::validation;
use crate::config::{extension_of, parse_config_str};
use crate::error::FrontgateError;

pub fn execute(args: &ValidateArgs) -> Result<(), FrontgateError> {
    let path = &args.config;

    if !path.exists() {
        return Err(FrontgateError::ConfigFileNotFound { path: path.clone() });
    }

    let content = std::fs::read_to_string(path)?;
    let config = parse_config_str(extension_of(path), &content, &path.display().to_string())?;

    if let Err(errors) = validation::validate(&config) {
        match args.format {
            ValidateFormat::Text => {
                eprintln!("\u{2717} {} has {} errors\n", path.display(), errors.len());
                for error in &errors {
                    eprintln!("  {}: {error}", error.field);
                }
            }
            ValidateFormat::Json => {
                let json_errors: Vec<serde_json::Value> = errors
                    .iter()
                    .map(|e| {
                        serde_json::json!({
                            "field": e.field,
                            "message": e.message,
                        })
                    })
                    .collect();
                println!(
                    "{}",
                    serde_json::json!({
                        "valid": false,
                        "errors": json_errors,
                    })
                );
            }
        }
        return Err(FrontgateError::ConfigValidation { errors });
    }

    match args.format {
        ValidateFormat::Text => {
            println!(
                "\u{2713} {}",
                validation::format_validation_report(&path.display().to_string(), &config)
            );
        }
        ValidateFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "valid": true,
                    "listen": config.listen.to_string(),
                    "services": config.services.len(),
                    "hosts": config.total_hosts(),
                })
            );
        }
    }

    Ok(())
}
