use super::CommandContext;

/// Print the config file location
pub fn path(context: &CommandContext) -> Result<(), String> {
    let manager = context.manager();
    let state = if manager.config_exists() { "" } else { " (not created yet)" };
    println!("{}{}", manager.config_file_path().display(), state);
    Ok(())
}

/// Print the effective configuration as JSON
pub fn show(context: &CommandContext) -> Result<(), String> {
    let config = context.load_config()?;
    let json = serde_json::to_string_pretty(&config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    println!("{}", json);

    if let Err(e) = config.validate() {
        println!("Warning: {}", e);
    }
    Ok(())
}

/// Write a default config file if none exists
pub fn init(context: &CommandContext) -> Result<(), String> {
    let manager = context.manager();
    let written = manager.init().map_err(|e| e.to_string())?;

    if written {
        println!("Wrote default config to {}", manager.config_file_path().display());
    } else {
        println!("Config already exists at {}", manager.config_file_path().display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_init_then_show() {
        let dir = std::env::temp_dir().join(format!("vital-monitor-cmd-config-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        let context = CommandContext::new(Some(dir.join("config.json"))).unwrap();

        path(&context).unwrap();
        init(&context).unwrap();
        assert!(context.manager().config_exists());
        init(&context).unwrap();
        show(&context).unwrap();

        let _ = fs::remove_dir_all(&dir);
    }
}
