use std::env;
use std::process::ExitCode;

use license_issuer::cli::{format_report, parse_command, Command, USAGE};
use license_issuer::config::IssuerConfig;
use license_issuer::issuance::run_issuance;
use license_issuer::logging::init_logging;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    let issue = match parse_command(&args) {
        Ok(Command::Issue(issue)) => issue,
        Ok(Command::Help) => {
            println!("{USAGE}");
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("Error: {e}\n\n{USAGE}");
            return ExitCode::from(e.exit_code());
        }
    };

    let config = match IssuerConfig::load_from_file(&issue.config_file) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(e.exit_code());
        }
    };
    init_logging(&config.logging);

    let request = match issue.to_request(&config.plan_table()) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(e.exit_code());
        }
    };

    match run_issuance(&config, &request).await {
        Ok(record) => {
            if issue.json {
                match serde_json::to_string_pretty(&record) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        // The record is already committed; still report the key.
                        eprintln!("Error: failed to encode record as JSON: {e}");
                        println!("{}", format_report(&record));
                    }
                }
            } else {
                println!("{}", format_report(&record));
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}
