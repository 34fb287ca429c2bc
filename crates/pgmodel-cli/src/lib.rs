mod cli;
mod config;
mod run;

pub async fn run(args: Vec<String>) -> anyhow::Result<()> {
    let cmd = cli::parse_args(&args)?;
    match cmd {
        cli::Command::Help(topic) => {
            cli::print_help(topic);
            Ok(())
        }
        cli::Command::Entities(args) => run::entities(args),
        cli::Command::Dispatch(args) => run::dispatch(args).await,
    }
}

/// HTTP-style status for an error; anything that is not a model error is 500.
pub fn status_code(err: &anyhow::Error) -> u16 {
    err.downcast_ref::<pgmodel::ModelError>()
        .map_or(500, pgmodel::ModelError::status_code)
}
