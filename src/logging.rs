use tokio::sync::broadcast;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::MakeWriter;

pub(crate) const LOG_CHANNEL_CAPACITY: usize = 500;

/// Where log lines are echoed besides the broadcast channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LogEcho {
    Stdout,
    /// For commands whose stdout carries their output (`run`, `mcp`).
    Stderr,
}

/// Tees formatted log lines to a terminal stream and to a broadcast channel
/// that the `/api/logs` endpoint subscribes to.
#[derive(Clone)]
pub(crate) struct BroadcastMakeWriter {
    pub sender: broadcast::Sender<String>,
    pub echo: LogEcho,
}

impl<'a> MakeWriter<'a> for BroadcastMakeWriter {
    type Writer = BroadcastWriter;

    fn make_writer(&'a self) -> Self::Writer {
        BroadcastWriter {
            sender: self.sender.clone(),
            echo: self.echo,
        }
    }
}

pub(crate) struct BroadcastWriter {
    sender: broadcast::Sender<String>,
    echo: LogEcho,
}

impl std::io::Write for BroadcastWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let line = String::from_utf8_lossy(buf).trim_end().to_string();
        if !line.is_empty() {
            let _ = self.sender.send(line); // no subscribers is fine
        }
        match self.echo {
            LogEcho::Stdout => std::io::stdout().write_all(buf)?,
            LogEcho::Stderr => std::io::stderr().write_all(buf)?,
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self.echo {
            LogEcho::Stdout => std::io::stdout().flush(),
            LogEcho::Stderr => std::io::stderr().flush(),
        }
    }
}

/// Install the global subscriber and hand back the sender feeding the log stream.
pub(crate) fn init(level: Level, echo: LogEcho) -> broadcast::Sender<String> {
    let (log_tx, _) = broadcast::channel::<String>(LOG_CHANNEL_CAPACITY);
    let make_writer = BroadcastMakeWriter {
        sender: log_tx.clone(),
        echo,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_ansi(false)
        .with_writer(make_writer)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok(); // already set in tests

    log_tx
}
