#[derive(clap::Args, Debug, Clone)]
#[group()]
pub struct LoggingArgs {
    /// Enable debug mode.
    #[arg(long, default_value_t = false)]
    debug: bool,
}

impl LoggingArgs {
    pub fn init(&self) {
        init_logging(self.debug);
    }
}

/// Log to standard output, since per-archive progress is part of the
/// command's normal output. `RUST_LOG` is honoured in debug mode.
pub fn init_logging(debug_mode: bool) {
    let mut builder = if debug_mode {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
    } else {
        let mut builder = env_logger::builder();
        builder.filter(None, log::LevelFilter::Info);
        builder
    };
    builder
        .target(env_logger::Target::Stdout)
        .format_timestamp(None)
        .format_target(false)
        .init();
}
