use log::warn;

use crate::archive::ZipExtractor;
use crate::config::Config;
use crate::handoff::LaunchPlan;
use crate::install::{InstallOrchestrator, RunReport, write_error};
use crate::provider::LocalVersionProvider;
use crate::runtime::Runtime;

/// Run one install pass and print a line per package.
///
/// Blocking; callers on an async runtime should move this onto a worker thread.
#[tracing::instrument(skip(runtime, config))]
pub fn install<R: Runtime + Clone + 'static>(runtime: R, config: Config) -> RunReport {
    let launch = config.launch.clone();
    let install_root = config.install_root.clone();

    let provider = LocalVersionProvider::new(&runtime, &config.packages);
    let report = InstallOrchestrator::new(runtime.clone(), provider, ZipExtractor, config).run();

    for package in &report.packages {
        println!("{}", package);
    }
    for error in &report.root_errors {
        let mut line = String::new();
        // Writing into a String cannot fail.
        let _ = write_error(&mut line, error);
        eprintln!("error: {}", line);
    }

    if report.ready()
        && let Some(spec) = launch
    {
        match LaunchPlan::resolve(&runtime, &spec, &install_root) {
            Ok(plan) => println!("ready: {}", plan),
            Err(e) => warn!("Cannot build launch command: {:#}", e),
        }
    }
    report
}
