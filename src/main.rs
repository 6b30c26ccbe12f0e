use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    use clap::Parser;
    use std::error::Error;
    let args = ficbind::cli::Args::parse();

    let default_filter = if args.quiet {
        "warn"
    } else if args.verbose {
        "ficbind=debug,info"
    } else {
        "info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(ficbind::cli::run(&args)) {
        eprintln!("{}", e);
        if e.is_network() {
            eprintln!("The site could not be reached or refused the request; nothing was written.");
        }
        if args.verbose {
            let mut source = e.source();
            while let Some(s) = source {
                eprintln!("  cause: {}", s);
                source = s.source();
            }
        }
        std::process::exit(e.exit_code());
    }
}
