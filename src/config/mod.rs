use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::currency::{Currency, FxBook};
use crate::errors::LedgerResult;
use crate::ledger::time_interval::RepeatType;
use crate::utils::{app_data_dir, ensure_dir};

const CONFIG_FILE: &str = "config.json";
const TMP_SUFFIX: &str = "tmp";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub base_currency: String,
    pub fx_tolerance_days: i64,
    /// Repeat code used for new budgets.
    pub budget_repeat_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_currency: "USD".into(),
            fx_tolerance_days: 5,
            budget_repeat_type: RepeatType::Monthly.code().into(),
            log_filter: None,
        }
    }
}

impl Config {
    pub fn base_currency(&self) -> Currency {
        Currency::new(self.base_currency.as_str())
    }

    pub fn budget_repeat_type(&self) -> RepeatType {
        RepeatType::from_code(&self.budget_repeat_type)
    }

    /// Empty rate table using the configured lookup tolerance.
    pub fn fx_book(&self) -> FxBook {
        FxBook::with_tolerance(self.fx_tolerance_days)
    }
}

pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> LedgerResult<Self> {
        Self::with_base_dir(app_data_dir())
    }

    pub fn with_base_dir(base: PathBuf) -> LedgerResult<Self> {
        ensure_dir(&base)?;
        Ok(Self {
            path: base.join(CONFIG_FILE),
        })
    }

    /// Reads the configuration, or the defaults when no file exists yet.
    pub fn load(&self) -> LedgerResult<Config> {
        if self.path.exists() {
            let data = fs::read_to_string(&self.path)?;
            debug!(path = %self.path.display(), "loaded configuration");
            Ok(serde_json::from_str(&data)?)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self, config: &Config) -> LedgerResult<()> {
        if let Some(parent) = self.path.parent() {
            ensure_dir(parent)?;
        }
        let json = serde_json::to_string_pretty(config)?;
        let tmp = tmp_path(&self.path);
        write_atomic(&tmp, &json)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "saved configuration");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_atomic(path: &Path, data: &str) -> LedgerResult<()> {
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    Ok(())
}
