use crate::config::{LoggingConfig, Section};
use crate::home_dir::resolve_against;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    io::{IsTerminal, Write},
    path::Path,
    sync::Arc,
};
use tracing::{level_filters::LevelFilter, Level, Subscriber};
use tracing_subscriber::{
    filter::{FilterFn, Targets},
    fmt,
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    Layer, Registry,
};

use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    ContentLimit, FileRotate,
};

const DEFAULT_SECTION: &str = "default";
const DEFAULT_MAX_SIZE_MB: u64 = 100;

fn parse_tracing_level(s: &str) -> Option<Level> {
    match s.to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        "off" | "none" => None,
        _ => Some(Level::INFO),
    }
}

/// True if `target` is `subsystem` itself or one of its modules.
fn matches_subsystem(target: &str, subsystem: &str) -> bool {
    target
        .strip_prefix(subsystem)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

/// Events at or below `max_level` whose target is none of `explicit`.
fn catch_all_filter(
    explicit: Vec<String>,
    max_level: Level,
) -> FilterFn<impl Fn(&tracing::Metadata<'_>) -> bool + Send + Sync + 'static> {
    FilterFn::new(move |meta: &tracing::Metadata<'_>| {
        meta.level() <= &max_level
            && !explicit
                .iter()
                .any(|s| matches_subsystem(meta.target(), s))
    })
}

// -------- rotating file writers --------

#[derive(Clone)]
struct RotWriter(Arc<Mutex<FileRotate<AppendTimestamp>>>);

impl Write for RotWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.lock().flush()
    }
}

fn open_rotating(section: &Section, base_dir: &Path) -> std::io::Result<RotWriter> {
    let path = resolve_against(section.file.trim(), base_dir);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let limit = match (section.max_backups, section.max_age_days) {
        (Some(files), _) => FileLimit::MaxFiles(files),
        (None, days) => FileLimit::Age(chrono::Duration::days(i64::from(days.unwrap_or(1)))),
    };
    let max_bytes = section.max_size_mb.unwrap_or(DEFAULT_MAX_SIZE_MB) * 1024 * 1024;
    let rot = FileRotate::new(
        &path,
        AppendTimestamp::default(limit),
        ContentLimit::BytesSurpassed(max_bytes as usize),
        Compression::None,
        #[cfg(unix)]
        None,
    );
    Ok(RotWriter(Arc::new(Mutex::new(rot))))
}

/// Sends each event to the file of the subsystem owning its target, else to the default file.
#[derive(Clone, Default)]
struct FileRouter {
    default: Option<RotWriter>,
    by_subsystem: HashMap<String, RotWriter>,
}

/// Writer that drops output when no file is configured for the event.
struct MaybeWriter(Option<RotWriter>);

impl Write for MaybeWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.0 {
            Some(w) => w.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.0 {
            Some(w) => w.flush(),
            None => Ok(()),
        }
    }
}

impl FileRouter {
    fn resolve(&self, target: &str) -> Option<RotWriter> {
        self.by_subsystem
            .iter()
            .find(|(name, _)| matches_subsystem(target, name))
            .map(|(_, w)| w.clone())
            .or_else(|| self.default.clone())
    }

    fn is_empty(&self) -> bool {
        self.default.is_none() && self.by_subsystem.is_empty()
    }
}

impl<'a> fmt::MakeWriter<'a> for FileRouter {
    type Writer = MaybeWriter;

    fn make_writer(&'a self) -> Self::Writer {
        MaybeWriter(self.default.clone())
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        MaybeWriter(self.resolve(meta.target()))
    }
}

// -------- plan --------

/// Filters and writers derived from a [`LoggingConfig`] before any subscriber is touched.
struct LoggingPlan {
    console: Targets,
    file: Targets,
    router: FileRouter,
    subsystems: Vec<String>,
    default_console: Option<Level>,
    default_file: Option<Level>,
}

fn plan(cfg: &LoggingConfig, base_dir: &Path) -> LoggingPlan {
    let mut console = Targets::new().with_default(LevelFilter::OFF);
    let mut file = Targets::new().with_default(LevelFilter::OFF);
    let mut router = FileRouter::default();
    let mut subsystems = Vec::new();

    for (name, section) in cfg.iter().filter(|(k, _)| k.as_str() != DEFAULT_SECTION) {
        subsystems.push(name.clone());
        if let Some(level) = parse_tracing_level(&section.console_level) {
            console = console.with_target(name.clone(), LevelFilter::from_level(level));
        }
        if section.file.trim().is_empty() {
            continue;
        }
        match open_rotating(section, base_dir) {
            Ok(writer) => {
                router.by_subsystem.insert(name.clone(), writer);
                if let Some(level) = parse_tracing_level(&section.file_level) {
                    file = file.with_target(name.clone(), LevelFilter::from_level(level));
                }
            }
            Err(e) => eprintln!("Failed to open log file '{}' for '{name}': {e}", section.file),
        }
    }

    let default = cfg.get(DEFAULT_SECTION);
    if let Some(section) = default.filter(|s| !s.file.trim().is_empty()) {
        match open_rotating(section, base_dir) {
            Ok(writer) => router.default = Some(writer),
            Err(e) => eprintln!("Failed to open default log file '{}': {e}", section.file),
        }
    }

    LoggingPlan {
        console,
        file,
        subsystems,
        default_console: default.and_then(|s| parse_tracing_level(&s.console_level)),
        default_file: router
            .default
            .as_ref()
            .and(default)
            .and_then(|s| parse_tracing_level(&s.file_level)),
        router,
    }
}

fn console_layer<S>() -> impl Layer<S> + Send + Sync + 'static
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    fmt::layer()
        .with_ansi(std::io::stdout().is_terminal())
        .with_target(true)
        .with_level(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
}

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

fn layers<S>(plan: LoggingPlan) -> Vec<BoxedLayer<S>>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    let mut layers: Vec<BoxedLayer<S>> =
        vec![console_layer::<S>().with_filter(plan.console).boxed()];

    if let Some(level) = plan.default_console {
        layers.push(
            console_layer::<S>()
                .with_filter(catch_all_filter(plan.subsystems.clone(), level))
                .boxed(),
        );
    }

    if plan.router.is_empty() {
        return layers;
    }

    let json_file = |router: FileRouter| {
        fmt::layer()
            .json()
            .with_ansi(false)
            .with_target(true)
            .with_level(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(router)
    };

    layers.push(json_file(plan.router.clone()).with_filter(plan.file).boxed());
    if let Some(level) = plan.default_file {
        layers.push(
            json_file(plan.router)
                .with_filter(catch_all_filter(plan.subsystems, level))
                .boxed(),
        );
    }
    layers
}

/// Installs the global subscriber described by `cfg`.
///
/// Relative log file paths are resolved against `base_dir` (normally `server.home_dir`).
/// An empty config falls back to a plain console logger at `info`.
pub fn init_logging_from_config(cfg: &LoggingConfig, base_dir: &Path) {
    // Bridge `log` records before the subscriber is installed.
    let _ = tracing_log::LogTracer::init();

    if cfg.is_empty() {
        let _ = fmt()
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .try_init();
        return;
    }

    let _ = Registry::default().with(layers(plan(cfg, base_dir))).try_init();
}
