use crate::app::AppContext;
use crate::output::{print_json, proof_request_table};

pub fn handle_poll_proofs(ctx: &AppContext) -> anyhow::Result<()> {
    let report = ctx.proof_poller()?.poll();

    if ctx.json() {
        let archived: Vec<_> = report
            .archived
            .iter()
            .map(|proof| {
                serde_json::json!({
                    "supplier": proof.supplier,
                    "templateId": proof.template_id,
                    "fileName": proof.file_name,
                    "path": proof.path,
                })
            })
            .collect();
        return print_json(&serde_json::json!({
            "archived": archived,
            "rejected": report.rejected,
            "failed": report.failed,
            "skipped": report.skipped,
        }));
    }

    if !ctx.quiet() {
        for proof in &report.archived {
            println!(
                "Archived {} from {} for template {}",
                proof.file_name, proof.supplier, proof.template_id
            );
        }
        println!(
            "{} archived, {} rejected, {} failed, {} skipped",
            report.archived.len(),
            report.rejected,
            report.failed,
            report.skipped
        );
    }

    if report.failed > 0 {
        return Err(anyhow::anyhow!(
            "{} proof file(s) could not be processed and were left in the inbox",
            report.failed
        ));
    }
    Ok(())
}

pub fn handle_proof_requests(ctx: &AppContext) -> anyhow::Result<()> {
    let user = ctx.user()?;
    let queue = ctx.proof_requests()?;
    let requests: Vec<_> = queue
        .pending()?
        .into_iter()
        .filter(|request| request.user.client_id == user.client_id)
        .collect();

    if ctx.json() {
        return print_json(&requests);
    }
    if ctx.quiet() {
        for request in &requests {
            println!("{}", request.template_id);
        }
    } else if requests.is_empty() {
        println!("No queued proofing requests in {}", queue.dir().display());
    } else {
        println!("{}", proof_request_table(&requests));
    }
    Ok(())
}

pub fn handle_purge(ctx: &AppContext) -> anyhow::Result<()> {
    let removed = ctx.repository()?.purge_expired()?;

    if ctx.json() {
        print_json(&serde_json::json!({ "removed": removed }))
    } else {
        if !ctx.quiet() {
            println!("Purged {} expired template(s)", removed);
        }
        Ok(())
    }
}
