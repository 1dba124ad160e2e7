use std::{env, fs, io, path::Path, path::PathBuf, sync::Once};

use dirs::home_dir;

static TRACING_INIT: Once = Once::new();

const DEFAULT_DIR_NAME: &str = ".ledger_core";
const DEFAULT_DIRECTIVE: &str = "ledger_core=info";

/// Initializes the global tracing subscriber with sensible defaults.
///
/// `RUST_LOG` is honored; `extra_filter` (typically from the configuration) is added on top.
pub fn init_tracing(extra_filter: Option<&str>) {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{filter::Directive, fmt, EnvFilter};

        let mut filter = EnvFilter::from_default_env();
        for directive in std::iter::once(DEFAULT_DIRECTIVE).chain(extra_filter) {
            match directive.parse::<Directive>() {
                Ok(directive) => filter = filter.add_directive(directive),
                Err(err) => eprintln!("ignoring invalid log directive `{directive}`: {err}"),
            }
        }

        // Another subscriber may already be installed by the host application.
        let _ = fmt().with_env_filter(filter).try_init();
    });
}

/// Root directory for configuration: `$LEDGER_CORE_HOME` or `~/.ledger_core`.
pub fn app_data_dir() -> PathBuf {
    if let Some(custom) = env::var_os("LEDGER_CORE_HOME") {
        return PathBuf::from(custom);
    }
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_DIR_NAME)
}

pub fn ensure_dir(path: &Path) -> io::Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}
