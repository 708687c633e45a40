//! `frontgate init` — generate a starter configuration file.
//!
//! Writes a YAML, JSON, or TOML config with one example service and
//! refuses to overwrite an existing file.

use std::path::PathBuf;

use crate::cli::{ConfigFormat, InitArgs};
use crate::error::FrontgateError;

pub fn execute(args: &InitArgs) -> Result<(), FrontgateError> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("frontgate.{}", args.format.extension())));

    if output.exists() {
        return Err(FrontgateError::FileExists { path: output });
    }

    std::fs::write(&output, template(&args.format))?;
    println!("Created {}", output.display());
    Ok(())
}

#[must_use]
pub const fn template(format: &ConfigFormat) -> &'static str {
    match format {
        ConfigFormat::Yaml => YAML_TEMPLATE,
        ConfigFormat::Json => JSON_TEMPLATE,
        ConfigFormat::Toml => TOML_TEMPLATE,
    }
}

const YAML_TEMPLATE: &str = r#"# Frontgate config
#
# Requests name their service with ?s=<domain>; each request goes to a
# randomly chosen host of that service.

proxy:
  listen:
    address: ""          # empty binds all interfaces
    port: 8080

  services:
    - name: my-service
      domain: my-service.my-company.com
      hosts:
        - address: "127.0.0.1"
          port: 9090
        - address: "127.0.0.1"
          port: 9091
"#;

const JSON_TEMPLATE: &str = r#"{
  "proxy": {
    "listen": { "address": "", "port": 8080 },
    "services": [
      {
        "name": "my-service",
        "domain": "my-service.my-company.com",
        "hosts": [
          { "address": "127.0.0.1", "port": 9090 },
          { "address": "127.0.0.1", "port": 9091 }
        ]
      }
    ]
  }
}
"#;

const TOML_TEMPLATE: &str = r#"# Frontgate config

[proxy.listen]
address = ""
port = 8080

[[proxy.services]]
name = "my-service"
domain = "my-service.my-company.com"

[[proxy.services.hosts]]
address = "127.0.0.1"
port = 9090

[[proxy.services.hosts]]
address = "127.0.0.1"
port = 9091
"#;
