//! copperbeet interactive client binary
//!
//! With trailing arguments, sends one command and prints the reply; with
//! none, drops into the interactive REPL.

use clap::{Arg, ArgAction, Command};
use copperbeet::cli::{CliClient, InteractiveMode};
use std::process;

#[derive(Debug)]
struct CliArgs {
    host: String,
    port: u16,
    command: Vec<String>,
}

fn parse_args() -> CliArgs {
    let matches = Command::new("copperbeet-cli")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Command line client for the copperbeet server")
        .arg(
            Arg::new("host")
                .short('H')
                .long("host")
                .value_name("HOST")
                .default_value("localhost")
                .help("Server hostname"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .default_value("6379")
                .value_parser(clap::value_parser!(u16))
                .help("Server port"),
        )
        .arg(
            Arg::new("command")
                .value_name("COMMAND")
                .num_args(0..)
                .action(ArgAction::Append)
                .trailing_var_arg(true)
                .help("Command to run once instead of entering the REPL"),
        )
        .get_matches();

    CliArgs {
        host: matches.get_one::<String>("host").cloned().unwrap_or_default(),
        port: matches.get_one::<u16>("port").copied().unwrap_or(6379),
        command: matches
            .get_many::<String>("command")
            .map(|values| values.cloned().collect())
            .unwrap_or_default(),
    }
}

#[tokio::main]
async fn main() {
    let args = parse_args();
    let address = format!("{}:{}", args.host, args.port);

    if args.command.is_empty() {
        let mut repl = InteractiveMode::new(address);
        if repl.start().await.is_err() {
            process::exit(1);
        }
        return;
    }

    let mut client = CliClient::with_address(address);
    if let Err(e) = client.connect().await {
        eprintln!("{e}");
        process::exit(1);
    }

    match client.send_command(&args.command).await {
        Ok(reply) => println!("{}", client.format_response(&reply)),
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    }

    let _ = client.disconnect().await;
}
