use tracing_subscriber::EnvFilter;

/// Installs the stderr logger. `RUST_LOG` overrides the default `info`
/// level; `log` records are forwarded through the tracing bridge.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn,tungstenite=warn"));
    if let Err(e) = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init() {
        eprintln!("Logger already installed: {e}");
    }
}
