//! tmplctl - command-line interface for the template store
//!
//! Creates and manages message templates for a client, and feeds the letter
//! pipeline with virus scan and proof events.

mod app;
mod cli;
mod commands;
mod config;
mod constants;
mod errors;
mod output;

use clap::Parser;
use template_core::VERSION;

use crate::app::{init_logging, AppContext};
use crate::cli::{Cli, Commands};
use crate::commands::{events, init, maintenance, misc, templates};
use crate::errors::CliError;

fn main() {
    let cli = Cli::parse();
    let ctx = AppContext::new(&cli);
    init_logging(ctx.log_filter().as_deref());

    if let Err(e) = run(&ctx, &cli) {
        let err = CliError::from_anyhow(&e);
        if matches!(err, CliError::Internal) {
            tracing::error!(error = ?e, "Command failed");
        }
        err.exit();
    }
}

fn run(ctx: &AppContext, cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Some(Commands::Init(args)) => init::handle_init(ctx, args)?,
        Some(Commands::Create(args)) => templates::handle_create(ctx, args)?,
        Some(Commands::UploadLetter(args)) => templates::handle_upload_letter(ctx, args)?,
        Some(Commands::Update(args)) => templates::handle_update(ctx, args)?,
        Some(Commands::Submit(args)) => templates::handle_submit(ctx, args)?,
        Some(Commands::Delete(args)) => templates::handle_delete(ctx, args)?,
        Some(Commands::Show(args)) => templates::handle_show(ctx, args)?,
        Some(Commands::List(args)) => templates::handle_list(ctx, args)?,
        Some(Commands::RequestProof(args)) => templates::handle_request_proof(ctx, args)?,
        Some(Commands::ScanResult(args)) => events::handle_scan_result(ctx, args)?,
        Some(Commands::ProofResult(args)) => events::handle_proof_result(ctx, args)?,
        Some(Commands::PollProofs) => maintenance::handle_poll_proofs(ctx)?,
        Some(Commands::ProofRequests) => maintenance::handle_proof_requests(ctx)?,
        Some(Commands::Purge) => maintenance::handle_purge(ctx)?,
        Some(Commands::Completions(args)) => misc::handle_completions(args)?,
        None => {
            println!("tmplctl v{}", VERSION);
            println!("\nRun `tmplctl --help` for usage information.");
        }
    }
    Ok(())
}
