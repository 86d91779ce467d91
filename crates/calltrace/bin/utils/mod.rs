use std::error::Error;

use eyre::EyreHandler;
use tracing_error::ErrorLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use yansi::Paint;

/// Selects the verbose `color_eyre` report when set.
const DEBUG_ENV: &str = "CALLTRACE_DEBUG";

/// Log filter used when `RUST_LOG` is not set. Stdout carries the trace document, so only
/// warnings reach the terminal by default.
const DEFAULT_LOG_FILTER: &str = "warn";

const ISSUES_URL: &str = "https://github.com/walnuthq/calltrace/issues";

/// Short, user-facing error report: the error, its causes and a pointer to the verbose mode.
#[derive(Debug)]
struct Handler;

/// The causes of `error`, outermost first.
fn causes(error: &(dyn Error + 'static)) -> Vec<String> {
    std::iter::successors(error.source(), |&cause| cause.source())
        .map(ToString::to_string)
        .collect()
}

impl EyreHandler for Handler {
    fn debug(
        &self,
        error: &(dyn Error + 'static),
        f: &mut core::fmt::Formatter<'_>,
    ) -> core::fmt::Result {
        if f.alternate() {
            return core::fmt::Debug::fmt(error, f);
        }

        write!(f, "\n{}", error.red())?;
        let causes = causes(error);
        if !causes.is_empty() {
            write!(f, "\n\nCaused by:")?;
            for (n, cause) in causes.iter().enumerate() {
                write!(f, "\n  {n}: {cause}")?;
            }
        }
        write!(f, "\n\n{}", format!("Set {DEBUG_ENV}=1 for a detailed report.").dim())
    }
}

/// Installs the calltrace eyre hook as the global error report hook.
///
/// `CALLTRACE_DEBUG` switches to the full `color_eyre` report, with backtraces captured
/// unless `RUST_BACKTRACE` says otherwise. Panics always use the `color_eyre` hook.
pub fn install_error_handler() {
    if std::env::var_os(DEBUG_ENV).is_some() {
        if std::env::var_os("RUST_BACKTRACE").is_none() {
            std::env::set_var("RUST_BACKTRACE", "1");
        }
        if let Err(e) = color_eyre::install() {
            warn!("failed to install color eyre error hook: {e}");
        }
        return;
    }

    let (panic_hook, _) = color_eyre::config::HookBuilder::default()
        .panic_section(format!("This is a bug. Consider reporting it at {ISSUES_URL}"))
        .into_hooks();
    panic_hook.install();
    if let Err(e) = eyre::set_hook(Box::new(|_| Box::new(Handler))) {
        warn!("failed to install eyre error hook: {e}");
    }
}

fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Initializes logging to stderr.
pub fn subscriber() {
    tracing_subscriber::Registry::default()
        .with(log_filter())
        .with(ErrorLayer::default())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init()
}

/// Sets the default [`yansi`] color output condition.
pub fn enable_paint() {
    let enable = yansi::Condition::os_support() && yansi::Condition::tty_and_color_live();
    yansi::whenever(yansi::Condition::cached(enable));
}

#[cfg(test)]
mod tests {
    use std::io;

    use eyre::WrapErr;

    use super::*;

    #[test]
    fn test_causes_outermost_first() {
        let report = Err::<(), _>(io::Error::other("disk full"))
            .wrap_err("failed to write /tmp/trace.json.tmp")
            .wrap_err("failed to persist trace")
            .unwrap_err();
        let error: &(dyn Error + 'static) = report.as_ref();

        assert_eq!(error.to_string(), "failed to persist trace");
        assert_eq!(causes(error), vec!["failed to write /tmp/trace.json.tmp", "disk full"]);
    }

    #[test]
    fn test_no_causes() {
        let error = io::Error::other("session script missing");
        assert!(causes(&error).is_empty());
    }
}
