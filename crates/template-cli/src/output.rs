//! Output formatting helpers for the CLI.

use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};

use template_core::proofing::ProofingRequest;
use template_core::{Template, TemplateContent};

/// Print any serialisable value as pretty JSON.
pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// One-line summary used after mutating commands.
pub fn template_summary(template: &Template) -> String {
    format!(
        "{} {} (status {}, lock {})",
        template.template_type(),
        template.id,
        template.template_status,
        template.current_lock()
    )
}

/// Print a single template in human-readable format.
pub fn print_template(template: &Template, quiet: bool) {
    if !quiet {
        println!("ID: {}", template.id);
        println!("Name: {}", template.name);
        println!("Type: {}", template.template_type());
        println!("Status: {}", template.template_status);
        println!("Lock: {}", template.current_lock());
        println!("Created: {} by {}", template.created_at, template.created_by);
        println!("Updated: {} by {}", template.updated_at, template.updated_by);
    }

    match &template.content {
        TemplateContent::Email { subject, message } => {
            println!("Subject: {}", subject);
            println!();
            println!("{}", message);
        }
        TemplateContent::Sms { message } | TemplateContent::NhsApp { message } => {
            println!();
            println!("{}", message);
        }
        TemplateContent::Letter(letter) => {
            println!("Letter type: {}", letter.letter_type.as_str());
            println!("Language: {}", letter.language.code());
            if let Some(campaign) = &letter.campaign_id {
                println!("Campaign: {}", campaign);
            }
            println!("Proofing enabled: {}", letter.proofing_enabled);
            for (file_type, file) in letter.files.uploads() {
                println!(
                    "File {}: {} (version {}, scan {})",
                    file_type,
                    file.file_name,
                    file.current_version,
                    file.virus_scan_status.as_str()
                );
            }
            if let Some(parameters) = &letter.personalisation_parameters {
                println!("Personalisation: {}", parameters.join(", "));
            }
            for proof in letter.files.proofs.values() {
                println!(
                    "Proof: {} from {} (scan {})",
                    proof.file_name,
                    proof.supplier,
                    proof.virus_scan_status.as_str()
                );
            }
        }
    }
}

/// Render templates as a table.
pub fn template_table(templates: &[Template]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["ID", "NAME", "TYPE", "STATUS", "LOCK", "UPDATED"]);

    for template in templates {
        table.add_row(vec![
            template.id.to_string(),
            template.name.clone(),
            template.template_type().to_string(),
            template.template_status.to_string(),
            template.current_lock().to_string(),
            template.updated_at.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }
    table.to_string()
}

/// Render queued proofing requests as a table.
pub fn proof_request_table(requests: &[ProofingRequest]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["TEMPLATE", "NAME", "SUPPLIER", "CAMPAIGN", "LANGUAGE", "TYPE"]);

    for request in requests {
        table.add_row(vec![
            request.template_id.to_string(),
            request.template_name.clone(),
            request.supplier.clone(),
            request.campaign_id.clone(),
            request.language.code().to_string(),
            request.letter_type.as_str().to_string(),
        ]);
    }
    table.to_string()
}

/// Plain, space-separated listing for quiet mode.
pub fn template_lines(templates: &[Template]) -> String {
    templates
        .iter()
        .map(|template| {
            format!(
                "{} {} {}",
                template.id,
                template.template_status,
                template.current_lock()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
