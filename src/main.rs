use migry::cli;
use migry::git::GitCli;
use migry::logger;
use migry::orchestrator::{Orchestrator, RunOptions, State};
use migry::platform::{RestDestinationPlatform, RestSourcePlatform};

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("migry: {:#}", err);
            std::process::exit(1);
        }
    }
}

async fn run() -> anyhow::Result<i32> {
    let config = cli::run()?;
    logger::init(&config.log)?;

    let source = RestSourcePlatform::new(&config.source_api, &config.source_token)?;
    let destination = RestDestinationPlatform::new(
        &config.dest_api,
        &config.intent.destination_repo.owner,
        &config.dest_token,
    )?;

    let options = RunOptions {
        skip_pipeline: config.skip_pipeline,
        skip_permissions: config.skip_permissions,
        step_timeout: config.step_timeout,
        ..RunOptions::default()
    };

    let mut orchestrator = Orchestrator::new(GitCli, source, destination, config.intent, options);
    let report = orchestrator.run().await;

    print!("{}", report);
    if let Some(path) = &config.report {
        std::fs::write(path, report.to_json()?)?;
    }

    Ok(if orchestrator.state() == State::Completed {
        0
    } else {
        1
    })
}
