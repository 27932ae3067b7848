use env_logger::{Env, Target};
use std::fs;
use std::io;
use std::path::Path;

/// Initialise the global logger.
///
/// `RUST_LOG` overrides the default `info` level. When `log_file` is given the log is appended
/// there; if the file cannot be opened (permissions, readonly FS, etc.) we fall back to stderr.
/// Calling this more than once is harmless.
pub fn init(log_file: Option<&Path>) {
    let target = log_file
        .and_then(|path| open_log_file(path).ok())
        .unwrap_or(Target::Stderr);

    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(target)
        .try_init();
}

fn open_log_file(path: &Path) -> io::Result<Target> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Target::Pipe(Box::new(file)))
}
