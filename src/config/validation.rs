//! Configuration validation with aggregated error reporting.
//!
//! The [`validate`] function checks a parsed [`ProxyConfig`] for
//! structural errors: an unset listen port, no services, and services or
//! hosts with missing fields. Every problem is collected; nothing stops
//! at the first failure. An empty `listen.address` is allowed and binds
//! to all interfaces.

use super::model::ProxyConfig;
use crate::error::ValidationError;

pub fn validate(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listen.port == 0 {
        errors.push(ValidationError::new(
            "proxy.listen.port",
            "Listen Port is not set",
        ));
    }

    if config.services.is_empty() {
        errors.push(ValidationError::new(
            "proxy.services",
            "No services have been defined",
        ));
    }

    for (i, service) in config.services.iter().enumerate() {
        let prefix = format!("proxy.services[{i}]");

        if service.name.is_empty() {
            errors.push(ValidationError::new(
                format!("{prefix}.name"),
                format!("The service at index {i} has no name"),
            ));
            // Later messages are keyed by name, so there is nothing useful left to report.
            continue;
        }

        if service.domain.is_empty() {
            errors.push(ValidationError::new(
                format!("{prefix}.domain"),
                format!("Service {} has no domain", service.name),
            ));
        }

        if service.hosts.is_empty() {
            errors.push(ValidationError::new(
                format!("{prefix}.hosts"),
                format!("Service {} has no hosts", service.name),
            ));
        }

        for (j, host) in service.hosts.iter().enumerate() {
            if host.address.is_empty() {
                errors.push(ValidationError::new(
                    format!("{prefix}.hosts[{j}].address"),
                    format!("The {j} host in service {} has no address", service.name),
                ));
            }

            if host.port == 0 {
                errors.push(ValidationError::new(
                    format!("{prefix}.hosts[{j}].port"),
                    format!("The {j} host in service {} has no port", service.name),
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[must_use]
pub fn format_validation_report(path: &str, config: &ProxyConfig) -> String {
    let mut lines = vec![format!(
        "  listen {}, {} services, {} hosts\n",
        config.listen,
        config.services.len(),
        config.total_hosts()
    )];

    for service in &config.services {
        let hosts = service
            .hosts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("  {} ({})", service.domain, service.name));
        lines.push(format!("    hosts: {hosts}"));
    }

    format!("{} is valid\n{}", path, lines.join("\n"))
}
