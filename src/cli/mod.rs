use std::io;

use serde::Serialize;

pub(crate) mod command;
pub(crate) mod decode;
pub(crate) mod listen;
pub(crate) mod metrics;
pub(crate) mod ui;

pub use self::command::{Args, Command, FakeArgs, LogLevel, OutputFormat};
pub use self::decode::DecodeArgs;
pub use self::listen::ListenArgs;
pub use self::metrics::MetricsArgs;

/// Writes one value as a single JSON line.
pub(crate) fn write_json<W, T>(out: &mut W, value: &T) -> anyhow::Result<()>
where
    W: io::Write,
    T: Serialize + ?Sized,
{
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
