use super::*;
use anyhow::{anyhow, Result};

/// Validate the complete configuration
pub fn validate_config(config: &DevDeckConfig) -> Result<()> {
    validate_server_options(&config.server)?;
    validate_process_options(&config.process)?;

    if config.deploy.step_timeout.is_zero() {
        return Err(anyhow!("Deploy step timeout must be greater than 0"));
    }

    for (project_type, type_config) in &config.project_types {
        validate_project_type_config(*project_type, type_config)?;
    }

    Ok(())
}

/// Validate server options
fn validate_server_options(options: &ServerOptions) -> Result<()> {
    if options.port == 0 {
        return Err(anyhow!("Port must be between 1 and 65535, got: {}", options.port));
    }

    if options.projects_file.trim().is_empty() {
        return Err(anyhow!("Projects file path cannot be empty"));
    }

    match options.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(anyhow!(
            "Invalid log level: {}, must be one of: trace, debug, info, warn, error",
            options.log_level
        )),
    }
}

/// Validate process lifecycle options
fn validate_process_options(options: &ProcessOptions) -> Result<()> {
    if options.kill_timeout.is_zero() {
        return Err(anyhow!("Kill timeout must be greater than 0"));
    }

    let name = options.launch_script_name.as_str();
    if name.is_empty() {
        return Err(anyhow!("Launch script name cannot be empty"));
    }
    if !name.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
        return Err(anyhow!(
            "Launch script name can only contain alphanumeric characters, hyphens, and underscores: {}",
            name
        ));
    }

    Ok(())
}

/// Validate the commands of one project type
fn validate_project_type_config(project_type: ProjectType, config: &ProjectTypeConfig) -> Result<()> {
    if config.start_command.trim().is_empty() {
        return Err(anyhow!("Start command for {} cannot be empty", project_type));
    }

    for (index, step) in config.deploy_steps.iter().enumerate() {
        match step.first() {
            Some(program) if !program.trim().is_empty() => {}
            _ => {
                return Err(anyhow!(
                    "Deploy step {} for {} must name a program",
                    index + 1,
                    project_type
                ))
            }
        }
    }

    Ok(())
}
