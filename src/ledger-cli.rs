//! A simple CLI tool for administering the on-chain ballot mirror.
//! This talks to the ledger gateway used by the deployed contract, so its
//! view is by definition the contract's externally observed behaviour.

use std::process;

use clap::{Arg, ArgAction, ArgMatches, Command};
use rocket::tokio::time::Duration;

use chainvote_backend::ledger::{
    await_confirmation, sync_candidates, BallotContract, CandidatesFile, Deployment, HttpLedger,
    SyncAction, TxHash, TxStatus,
};

const PROGRAM_NAME: &str = "ledger-cli";

const ABOUT_TEXT: &str = "Administer the on-chain ballot mirror.

EXIT CODES:
     0: Success.
   255: The requested transaction was rejected by the contract.
 Other: Error.";

const GATEWAY: &str = "gateway";
const GATEWAY_HELP: &str = "URL of the ledger gateway (defaults to $LEDGER_URL)";

const TIMEOUT: &str = "timeout";
const TIMEOUT_HELP: &str = "Seconds to wait for a confirmation before reporting it as pending";

const POLL_INTERVAL: &str = "poll-interval";
const POLL_INTERVAL_HELP: &str = "Seconds between confirmation status queries";

const CANDIDATES_PATH: &str = "CANDIDATES_PATH";
const CANDIDATE_ID: &str = "CANDIDATE_ID";
const TX_HASH: &str = "TX_HASH";
const ADDRESS: &str = "ADDRESS";
const DEPLOYMENT_PATH: &str = "DEPLOYMENT_PATH";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .subcommand_required(true)
        .arg(
            Arg::new(GATEWAY)
                .long(GATEWAY)
                .short('g')
                .help(GATEWAY_HELP)
                .action(ArgAction::Set)
                .global(true),
        )
        .arg(
            Arg::new(TIMEOUT)
                .long(TIMEOUT)
                .help(TIMEOUT_HELP)
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(u64))
                .default_value("60")
                .global(true),
        )
        .arg(
            Arg::new(POLL_INTERVAL)
                .long(POLL_INTERVAL)
                .help(POLL_INTERVAL_HELP)
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(u64))
                .default_value("2")
                .global(true),
        )
        .subcommand(
            Command::new("sync")
                .about("Register the candidates from a local roster, skipping existing ones")
                .arg(
                    Arg::new(CANDIDATES_PATH)
                        .help("Path to a candidates.json roster")
                        .action(ArgAction::Set)
                        .required(true),
                ),
        )
        .subcommand(Command::new("list").about("List all active candidates and their tallies"))
        .subcommand(
            Command::new("vote")
                .about("Cast this wallet's single vote for a candidate")
                .arg(
                    Arg::new(CANDIDATE_ID)
                        .help("The on-chain candidate ID")
                        .action(ArgAction::Set)
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("status")
                .about("Query the status of a submitted transaction")
                .arg(
                    Arg::new(TX_HASH)
                        .help("The transaction hash")
                        .action(ArgAction::Set)
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("has-voted")
                .about("Check whether an address has used its vote")
                .arg(
                    Arg::new(ADDRESS)
                        .help("The address to check")
                        .action(ArgAction::Set)
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("contract")
                .about("Show the contract recorded in a deployment file")
                .arg(
                    Arg::new(DEPLOYMENT_PATH)
                        .help("Path to a deployment record, e.g. deployments/fuji.json")
                        .action(ArgAction::Set)
                        .required(true),
                ),
        )
}

fn gateway_url(matches: &ArgMatches) -> Result<String, String> {
    matches
        .get_one::<String>(GATEWAY)
        .cloned()
        .or_else(|| std::env::var("LEDGER_URL").ok())
        .ok_or_else(|| "No gateway configured: pass --gateway or set LEDGER_URL".to_string())
}

/// How long to wait for a transaction before reporting it as pending, and
/// how often to ask in the meantime.
#[derive(Clone, Copy)]
struct Confirmation {
    timeout: Duration,
    poll_interval: Duration,
}

fn confirmation(matches: &ArgMatches) -> Confirmation {
    // Both args carry defaults, so the lookups cannot fail.
    Confirmation {
        timeout: Duration::from_secs(*matches.get_one::<u64>(TIMEOUT).unwrap()),
        poll_interval: Duration::from_secs(*matches.get_one::<u64>(POLL_INTERVAL).unwrap()),
    }
}

async fn run_sync(ledger: &HttpLedger, confirm: Confirmation, path: &str) -> Result<i32, String> {
    let roster = CandidatesFile::load(path).map_err(|e| e.to_string())?;
    let actions = sync_candidates(ledger, &roster)
        .await
        .map_err(|e| e.to_string())?;

    let mut exit = 0;
    for (name, action) in actions {
        match action {
            SyncAction::AlreadyPresent => println!("Candidate \"{name}\" already on the ledger"),
            SyncAction::Submitted(tx) => {
                match await_confirmation(ledger, &tx, confirm.timeout, confirm.poll_interval)
                    .await
                    .map_err(|e| e.to_string())?
                {
                    TxStatus::Confirmed { block_number } => {
                        println!("Added candidate \"{name}\" in block {block_number}")
                    }
                    TxStatus::Pending => {
                        println!("Candidate \"{name}\" submitted as {tx}, still pending; re-run `status {tx}` later")
                    }
                    TxStatus::Failed { reason } => {
                        println!("Adding candidate \"{name}\" failed: {reason}");
                        exit = 255;
                    }
                }
            }
        }
    }
    Ok(exit)
}

async fn run_list(ledger: &HttpLedger) -> Result<i32, String> {
    let ids = ledger
        .active_candidate_ids()
        .await
        .map_err(|e| e.to_string())?;
    println!("Active candidates: {}", ids.len());
    for id in ids {
        let candidate = ledger.candidate(id).await.map_err(|e| e.to_string())?;
        println!(
            "ID: {} | Name: {} | Party: {} | Votes: {}",
            candidate.id, candidate.name, candidate.party, candidate.vote_count
        );
    }
    Ok(0)
}

async fn run_vote(ledger: &HttpLedger, confirm: Confirmation, raw_id: &str) -> Result<i32, String> {
    let candidate_id = raw_id
        .parse::<u64>()
        .map_err(|_| format!("Invalid candidate ID '{raw_id}'"))?;

    let tx = match ledger.vote(candidate_id).await {
        Ok(tx) => tx,
        Err(err) if err.to_string().contains("already voted") => {
            println!("You have already voted.");
            return Ok(255);
        }
        Err(err) => return Err(err.to_string()),
    };
    println!("Vote transaction sent! Hash: {tx}");

    // A timed-out wait is not a failure: never resubmit, query again later.
    match await_confirmation(ledger, &tx, confirm.timeout, confirm.poll_interval)
        .await
        .map_err(|e| e.to_string())?
    {
        TxStatus::Confirmed { block_number } => {
            println!("Vote confirmed in block: {block_number}");
            Ok(0)
        }
        TxStatus::Pending => {
            println!("Vote still pending; re-run `status {tx}` later");
            Ok(0)
        }
        TxStatus::Failed { reason } => {
            println!("Voting failed: {reason}");
            Ok(255)
        }
    }
}

async fn run_status(ledger: &HttpLedger, hash: &str) -> Result<i32, String> {
    let status = ledger
        .transaction_status(&TxHash::from(hash))
        .await
        .map_err(|e| e.to_string())?;
    match status {
        TxStatus::Pending => println!("{hash}: pending"),
        TxStatus::Confirmed { block_number } => println!("{hash}: confirmed in block {block_number}"),
        TxStatus::Failed { reason } => println!("{hash}: failed ({reason})"),
    }
    Ok(0)
}

async fn run_has_voted(ledger: &HttpLedger, address: &str) -> Result<i32, String> {
    let voted = ledger
        .has_address_voted(address)
        .await
        .map_err(|e| e.to_string())?;
    println!("{address} has {}voted", if voted { "" } else { "not " });
    Ok(0)
}

fn run_contract(path: &str) -> Result<i32, String> {
    let deployment = Deployment::load(path).map_err(|e| e.to_string())?;
    println!("Contract address: {}", deployment.contract.address);
    let entries = deployment
        .contract
        .abi
        .as_array()
        .map(Vec::len)
        .unwrap_or(0);
    println!("ABI entries: {entries}");
    Ok(0)
}

async fn run(matches: ArgMatches) -> Result<i32, String> {
    // The deployment record is local; only the other subcommands need a
    // gateway.
    if let Some(("contract", sub)) = matches.subcommand() {
        return run_contract(sub.get_one::<String>(DEPLOYMENT_PATH).unwrap());
    }

    let ledger = HttpLedger::new(gateway_url(&matches)?);
    let confirm = confirmation(&matches);

    match matches.subcommand() {
        Some(("sync", sub)) => {
            run_sync(&ledger, confirm, sub.get_one::<String>(CANDIDATES_PATH).unwrap()).await
        }
        Some(("list", _)) => run_list(&ledger).await,
        Some(("vote", sub)) => {
            run_vote(&ledger, confirm, sub.get_one::<String>(CANDIDATE_ID).unwrap()).await
        }
        Some(("status", sub)) => run_status(&ledger, sub.get_one::<String>(TX_HASH).unwrap()).await,
        Some(("has-voted", sub)) => {
            run_has_voted(&ledger, sub.get_one::<String>(ADDRESS).unwrap()).await
        }
        _ => unreachable!("subcommand is required"),
    }
}

#[rocket::main]
async fn main() {
    let matches = cli().get_matches();
    match run(matches).await {
        Ok(code) => process::exit(code),
        Err(message) => {
            eprintln!("{message}");
            process::exit(1);
        }
    }
}
