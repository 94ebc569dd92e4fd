use std::path::PathBuf;

use crate::aggregate::Interval;
use crate::cli::SourceArgs;
use crate::error::{PaylensError, Result};
use crate::loader::load_transactions;
use crate::settings::{load_settings, save_settings, shellexpand_path};

pub fn run(path: &str, interval: Option<Interval>, source: &SourceArgs) -> Result<()> {
    let resolved = PathBuf::from(shellexpand_path(path));
    if !resolved.is_file() {
        return Err(PaylensError::Settings(format!(
            "No payment file found at {}",
            resolved.display()
        )));
    }

    let mut settings = load_settings();
    settings.data_file = resolved.to_string_lossy().to_string();
    if let Some(encoding) = source.encoding {
        settings.encoding = encoding;
    }
    if let Some(column) = &source.timestamp_column {
        settings.timestamp_column = column.clone();
    }
    if let Some(scope) = source.carrier_scope {
        settings.carrier_scope = scope;
    }
    if let Some(interval) = interval {
        settings.default_interval = interval;
    }

    // Refuse to save a file the dashboard could not open.
    let table = load_transactions(&resolved, &settings.load_options())?;

    let settings_path = save_settings(&settings)?;
    println!(
        "Using {} ({} rows, {})",
        resolved.display(),
        table.records.len(),
        settings.encoding
    );
    println!("Saved settings to {}", settings_path.display());
    Ok(())
}
