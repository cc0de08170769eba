use std::error::Error;
use std::process;

use tracing::{error, info};

use runtime_conformance::{
    cli::Cli,
    config::ConformanceConfig,
    context::Context,
    logging::Logging,
    runner::{summarize, SuiteRunner},
};

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::init_runtime_conformance_cli();

    // init logging singleton
    Logging::try_init(cli.log_level())?;

    if cli.print_debug_info() {
        println!("Printing debug info");
        println!("CLI: {:#?}", cli);
        return Ok(());
    }

    let config = ConformanceConfig::load(&cli.get_config()).map_err(|e| {
        error!("Could not load config {}: {}", cli.get_config().display(), e);
        e
    })?;

    // The kubelet credentials file can only be written as root
    #[cfg(unix)]
    if config.needs_registry() && !nix::unistd::Uid::effective().is_root() {
        return Err("Program must run as root to provide registry credentials".into());
    }

    info!("Creating the global context");
    let ctx = Context::new();

    info!("Creating the signal handler");
    ctrlc::set_handler({
        let ctx = ctx.clone();
        move || ctx.cancel_all()
    })
    .map_err(|e| {
        error!("Could not set signal handler: {}", e);
        e
    })?;

    // Cleanup on drop blocks a worker thread, at least two are needed
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    let total = config.cases.len();
    let outcomes = match runtime.block_on(SuiteRunner::new(config, ctx).run()) {
        Ok(outcomes) => outcomes,
        Err(e) => {
            error!("runtime conformance error: {}", e);
            process::exit(1);
        }
    };

    for outcome in &outcomes {
        match &outcome.result {
            Ok(()) => println!("PASS: {}", outcome.description),
            Err(e) => println!("FAIL: {}: {}", outcome.description, e),
        }
    }
    if let Err(e) = summarize(&outcomes, total) {
        error!("{}", e);
        process::exit(1);
    }
    Ok(())
}
