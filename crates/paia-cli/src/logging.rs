use std::fmt::Write as _;
use std::path::Path;

use chrono::SecondsFormat;
use chrono::Utc;
use tracing::Event;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::fmt::FormatEvent;
use tracing_subscriber::fmt::FormatFields;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

/// `<RFC 3339 timestamp>: <message>`, one event per line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogLine;

impl<S, N> FormatEvent<S, N> for LogLine
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        write!(
            writer,
            "{}: ",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Opens `log_path` for appending under its exact name. The file is never
/// rotated.
pub fn file_appender(log_path: &Path) -> Result<RollingFileAppender, Box<dyn std::error::Error>> {
    let dir = match log_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = log_path
        .file_name()
        .ok_or_else(|| format!("log path has no file name: {}", log_path.display()))?;
    std::fs::create_dir_all(dir)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy().into_owned())
        .build(dir)?;
    Ok(appender)
}

/// Human-readable stderr output filtered by `RUST_LOG`, plus an
/// append-only log file at `log_path`. Keep the guard alive until exit so
/// buffered lines get flushed.
pub fn init(log_path: &Path) -> Result<WorkerGuard, Box<dyn std::error::Error>> {
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender(log_path)?);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer)
        .event_format(LogLine)
        .with_filter(EnvFilter::new("info"));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Arc;
    use std::sync::Mutex;

    use chrono::DateTime;
    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn lines_are_timestamp_colon_message() {
        let buffer = Buffer::default();
        let sink = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || sink.clone())
            .event_format(LogLine)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("Saved context with 2 exchanges");
            tracing::warn!("Error loading context: parse failed");
        });

        let text = String::from_utf8(buffer.0.lock().expect("lock").clone()).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let (timestamp, message) = lines[0].split_once(": ").expect("separator");
        assert!(DateTime::parse_from_rfc3339(timestamp).is_ok(), "{timestamp}");
        assert_eq!(message, "Saved context with 2 exchanges");

        let (_, message) = lines[1].split_once(": ").expect("separator");
        assert_eq!(message, "Error loading context: parse failed");
    }

    #[test]
    fn log_file_keeps_its_name_and_appends_across_runs() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let log_path = dir.path().join("logs").join("claude-paia-context.log");

        for message in ["first run", "second run"] {
            let appender = file_appender(&log_path).expect("appender");
            let subscriber = tracing_subscriber::fmt()
                .with_ansi(false)
                .with_writer(Mutex::new(appender))
                .event_format(LogLine)
                .finish();
            tracing::subscriber::with_default(subscriber, || tracing::info!("{message}"));
        }

        let entries: Vec<String> = std::fs::read_dir(dir.path().join("logs"))
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec!["claude-paia-context.log".to_string()]);

        let text = std::fs::read_to_string(&log_path).expect("read log");
        let messages: Vec<&str> = text
            .lines()
            .map(|line| line.split_once(": ").expect("separator").1)
            .collect();
        assert_eq!(messages, vec!["first run", "second run"]);
    }
}
