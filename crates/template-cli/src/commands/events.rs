use std::io::{self, Read};
use std::path::Path;

use template_core::ingest::{FileScanEvent, ProofScanEvent, ScanOutcome, SkipReason, ValidationOutcome};
use template_core::ProofOutcome;

use crate::app::AppContext;
use crate::cli::EventArgs;
use crate::output::print_json;

pub fn handle_scan_result(ctx: &AppContext, args: &EventArgs) -> anyhow::Result<()> {
    let body = read_event(args.file.as_deref())?;
    let event = FileScanEvent::parse(&body)?;
    let outcome = ctx.scan_ingester()?.handle(&event)?;

    let (result, detail) = describe_scan(&outcome);
    print_outcome(ctx, &event.template.id.to_string(), result, detail)
}

pub fn handle_proof_result(ctx: &AppContext, args: &EventArgs) -> anyhow::Result<()> {
    let body = read_event(args.file.as_deref())?;
    let event = ProofScanEvent::parse(&body)?;
    let outcome = ctx.proof_ingester()?.handle(&event)?;

    let result = match outcome {
        ProofOutcome::Rejected => "rejected",
        ProofOutcome::Appended(_) => "appended",
        ProofOutcome::Escalated(_) => "escalated",
    };
    print_outcome(ctx, &event.template_id.to_string(), result, None)
}

fn describe_scan(outcome: &ScanOutcome) -> (&'static str, Option<&'static str>) {
    match outcome {
        ScanOutcome::Stale => ("stale", None),
        ScanOutcome::Recorded => ("recorded", None),
        ScanOutcome::Validated(ValidationOutcome::Recorded { valid: true }) => {
            ("validated", Some("valid"))
        }
        ScanOutcome::Validated(ValidationOutcome::Recorded { valid: false }) => {
            ("validated", Some("invalid"))
        }
        ScanOutcome::Validated(ValidationOutcome::Rejected) => ("validated", Some("rejected")),
        ScanOutcome::Validated(ValidationOutcome::Skipped(reason)) => (
            "validated",
            Some(match reason {
                SkipReason::NotLetter => "skipped: not a letter",
                SkipReason::StaleVersion => "skipped: stale version",
                SkipReason::NotPendingValidation => "skipped: not pending validation",
                SkipReason::ScanFailed => "skipped: scan failed",
                SkipReason::ScanPending => "skipped: scan pending",
            }),
        ),
    }
}

fn print_outcome(
    ctx: &AppContext,
    template_id: &str,
    result: &str,
    detail: Option<&str>,
) -> anyhow::Result<()> {
    if ctx.json() {
        return print_json(&serde_json::json!({
            "templateId": template_id,
            "result": result,
            "detail": detail,
        }));
    }
    if !ctx.quiet() {
        match detail {
            Some(detail) => println!("{} {} ({})", template_id, result, detail),
            None => println!("{} {}", template_id, result),
        }
    }
    Ok(())
}

fn read_event(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read event {}: {}", path.display(), e)),
        _ => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| anyhow::anyhow!("Failed to read stdin: {}", e))?;
            Ok(buffer)
        }
    }
}
