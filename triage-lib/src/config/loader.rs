use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::error::{Result, TriageError};

pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let txt = fs::read_to_string(p)
        .map_err(|e| TriageError::Config(format!("Failed to read config file: {e}")))?;
    let cfg: Config = toml::from_str(&txt)
        .map_err(|e| TriageError::Config(format!("Failed to parse config: {e}")))?;

    validate_config(&cfg)?;

    Ok(cfg)
}

fn validate_config(cfg: &Config) -> Result<()> {
    if cfg.gate.window_ms == 0 {
        return Err(TriageError::Config("gate.window_ms must be positive".to_string()));
    }
    if cfg.gate.max_requests == 0 {
        return Err(TriageError::Config("gate.max_requests must be positive".to_string()));
    }

    for (name, over) in [
        ("auth", cfg.gate.auth.as_ref()),
        ("api", cfg.gate.api.as_ref()),
        ("search", cfg.gate.search.as_ref()),
    ] {
        if let Some(o) = over {
            if o.window_ms == Some(0) {
                return Err(TriageError::Config(format!(
                    "gate.{name}.window_ms must be positive"
                )));
            }
            if o.max_requests == Some(0) {
                return Err(TriageError::Config(format!(
                    "gate.{name}.max_requests must be positive"
                )));
            }
        }
    }

    Ok(())
}
