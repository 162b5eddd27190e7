//! qx CLI - the qooxdoo command line tool

use miette::Diagnostic;

use qx::backend::ProcessBackend;
use qx::cli::RawArguments;
use qx::error::BootstrapError;
use qx::installer::ProcessInstaller;
use qx::ops::Bootstrap;
use qx::util::config::{global_config_path, load_config, project_config_path};
use qx::util::logging;

fn main() {
    let code = match run() {
        Ok(()) => 0,
        Err(e) => report(&e),
    };
    std::process::exit(code);
}

fn run() -> Result<(), BootstrapError> {
    let raw = RawArguments::from_env();
    let root = std::env::current_dir()
        .map_err(|e| BootstrapError::io("failed to determine the current directory", e.into()))?;

    // Tool settings: global, then project, then environment
    let mut tools = load_config(global_config_path().as_deref(), &project_config_path(&root));
    tools.apply_env(|key| std::env::var(key).ok());

    let bootstrap = Bootstrap::new(raw, &root, &tools)?;

    let log = logging::init(bootstrap.verbosity())
        .map_err(|e| BootstrapError::io("failed to set up logging", e))?;

    let args = bootstrap.args();
    let mut installer = ProcessInstaller::new(
        tools.installer(),
        root.clone(),
        bootstrap.layout().lockfile_path.clone(),
    )
    .with_output(args.verbose, args.quiet);
    let mut backend = ProcessBackend::new(tools.backend());

    bootstrap
        .with_log_handle(log)
        .run(&mut installer, &mut backend)?;
    Ok(())
}

/// Print the error and pick the exit status.
fn report(err: &BootstrapError) -> i32 {
    if err.is_informational() {
        println!("{}", err);
        return 0;
    }
    // Command failures are logged by the dispatcher, unless the filter drops them.
    if err.already_reported() && tracing::enabled!(target: "qx", tracing::Level::ERROR) {
        return 1;
    }

    match err {
        // clap renders its own `error:` prefix and usage hint
        BootstrapError::Usage { kind: Some(_), .. } => eprintln!("{}", err),
        _ => {
            eprintln!("error: {}", err);
            let mut source = std::error::Error::source(err);
            while let Some(cause) = source {
                eprintln!("  caused by: {}", cause);
                source = cause.source();
            }
            if let Some(help) = err.help() {
                eprintln!("help: {}", help);
            }
        }
    }
    1
}
