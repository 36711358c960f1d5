use std::{
    fmt,
    io::{self, Write},
    sync::{Arc, Mutex, PoisonError},
};

/// A line-oriented progress sink shared by all workers.
///
/// Implementations must keep concurrent lines whole: a line passed to
/// `narrate` is never interleaved with another.
pub trait Narrator: Send + Sync {
    fn narrate(&self, line: fmt::Arguments<'_>);
}

impl<N> Narrator for Arc<N>
where
    N: Narrator + ?Sized,
{
    fn narrate(&self, line: fmt::Arguments<'_>) {
        (**self).narrate(line)
    }
}

impl<N> Narrator for &N
where
    N: Narrator + ?Sized,
{
    fn narrate(&self, line: fmt::Arguments<'_>) {
        (**self).narrate(line)
    }
}

/// Writes each line to a stream, serialized through one output guard and
/// optionally prefixed with the local wall-clock time.
#[derive(Debug)]
pub struct StreamNarrator<W>
where
    W: Write + Send,
{
    sink_: Mutex<W>,
    timestamps_: bool,
}

impl StreamNarrator<io::Stdout> {
    pub fn stdout() -> Self {
        StreamNarrator::new(io::stdout())
    }
}

impl<W> StreamNarrator<W>
where
    W: Write + Send,
{
    pub fn new(sink: W) -> Self {
        StreamNarrator {
            sink_: Mutex::new(sink),
            timestamps_: true,
        }
    }

    pub fn without_timestamps(mut self) -> Self {
        self.timestamps_ = false;
        self
    }

    pub fn into_inner(self) -> W {
        self.sink_.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W> Narrator for StreamNarrator<W>
where
    W: Write + Send,
{
    fn narrate(&self, line: fmt::Arguments<'_>) {
        let mut sink = self.sink_.lock().unwrap_or_else(PoisonError::into_inner);
        let r = if self.timestamps_ {
            let now = chrono::Local::now().format("%H:%M:%S%.3f");
            writeln!(sink, "[{now}] {line}")
        } else {
            writeln!(sink, "{line}")
        };
        if let Result::Err(e) = r {
            log::warn!("[StreamNarrator::narrate] {e}");
        }
    }
}

/// Forwards each line to the `log` facade at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNarrator;

impl Narrator for LogNarrator {
    fn narrate(&self, line: fmt::Arguments<'_>) {
        log::info!(target: "narrate", "{line}");
    }
}

/// Discards every line.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentNarrator;

impl Narrator for SilentNarrator {
    fn narrate(&self, _: fmt::Arguments<'_>) {}
}
