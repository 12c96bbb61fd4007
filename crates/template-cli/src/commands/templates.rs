use std::io::{self, IsTerminal, Read};
use std::path::Path;

use uuid::Uuid;

use template_core::{
    Language, LetterType, LetterUpload, NewTemplate, Template, TemplateContent, TemplateFilter,
    TemplateStatus, TemplateType, UploadedFile,
};

use crate::app::AppContext;
use crate::cli::{CreateArgs, ListArgs, LockedArgs, ShowArgs, TypeArg, UpdateArgs, UploadLetterArgs};
use crate::errors::CliError;
use crate::output::{print_json, print_template, template_lines, template_summary, template_table};

pub fn handle_create(ctx: &AppContext, args: &CreateArgs) -> anyhow::Result<()> {
    let user = ctx.user()?;
    if args.subject.is_some() && args.template_type != TypeArg::Email {
        return Err(CliError::invalid_input("--subject is only valid for email templates").into());
    }
    let message = read_message(args.message.clone())?;
    let template = build_template(
        args.template_type.into(),
        args.name.clone(),
        args.subject.clone().unwrap_or_default(),
        message,
    )?;

    let created = ctx.service()?.create_template(&template, &user)?;
    report(ctx, &created, "Created")
}

pub fn handle_upload_letter(ctx: &AppContext, args: &UploadLetterArgs) -> anyhow::Result<()> {
    let user = ctx.user()?;
    let letter = LetterUpload {
        name: args.name.clone(),
        letter_type: args.letter_type.parse::<LetterType>()?,
        language: args.language.parse::<Language>()?,
        campaign_id: args.campaign.clone(),
    };
    let pdf = read_upload(&args.pdf)?;
    let csv = args.csv.as_deref().map(read_upload).transpose()?;

    let uploaded = ctx
        .service()?
        .upload_letter_template(&letter, &pdf, csv.as_ref(), &user)?;
    report(ctx, &uploaded, "Uploaded")
}

pub fn handle_update(ctx: &AppContext, args: &UpdateArgs) -> anyhow::Result<()> {
    let user = ctx.user()?;
    let id = parse_id(&args.id)?;
    let service = ctx.service()?;
    let existing = service.get_template(&id, &user)?;

    let template_type = args
        .template_type
        .map(TemplateType::from)
        .unwrap_or_else(|| existing.template_type());
    let subject = match (&args.subject, &existing.content) {
        (Some(subject), _) => subject.clone(),
        (None, TemplateContent::Email { subject, .. }) => subject.clone(),
        (None, _) => String::new(),
    };
    let message = args
        .message
        .clone()
        .or_else(|| existing.content.message().map(str::to_string))
        .unwrap_or_default();
    let name = args.name.clone().unwrap_or_else(|| existing.name.clone());

    let template = build_template(template_type, name, subject, message)?;
    let updated = service.update_template(&id, &template, &user, args.lock)?;
    report(ctx, &updated, "Updated")
}

pub fn handle_submit(ctx: &AppContext, args: &LockedArgs) -> anyhow::Result<()> {
    let user = ctx.user()?;
    let id = parse_id(&args.id)?;
    let submitted = ctx.service()?.submit_template(&id, &user, args.lock)?;
    report(ctx, &submitted, "Submitted")
}

pub fn handle_delete(ctx: &AppContext, args: &LockedArgs) -> anyhow::Result<()> {
    let user = ctx.user()?;
    let id = parse_id(&args.id)?;
    ctx.service()?.delete_template(&id, &user, args.lock)?;

    if ctx.json() {
        print_json(&serde_json::json!({ "id": id, "deleted": true }))?;
    } else if !ctx.quiet() {
        println!("Deleted template {}", id);
    }
    Ok(())
}

pub fn handle_show(ctx: &AppContext, args: &ShowArgs) -> anyhow::Result<()> {
    let user = ctx.user()?;
    let id = parse_id(&args.id)?;
    let template = ctx.service()?.get_template(&id, &user)?;

    if ctx.json() {
        print_json(&template)
    } else {
        print_template(&template, ctx.quiet());
        Ok(())
    }
}

pub fn handle_list(ctx: &AppContext, args: &ListArgs) -> anyhow::Result<()> {
    let user = ctx.user()?;
    let mut filter = TemplateFilter::new();
    if let Some(status) = &args.status {
        filter = filter.status(status.parse::<TemplateStatus>()?);
    }
    if let Some(template_type) = &args.template_type {
        filter = filter.template_type(template_type.parse::<TemplateType>()?);
    }
    if let Some(language) = &args.language {
        filter = filter.language(language.parse::<Language>()?);
    }
    if let Some(letter_type) = &args.letter_type {
        filter = filter.letter_type(letter_type.parse::<LetterType>()?);
    }

    let templates = ctx.service()?.list_templates(&user, &filter)?;
    if ctx.json() {
        print_json(&templates)
    } else {
        if ctx.quiet() {
            if !templates.is_empty() {
                println!("{}", template_lines(&templates));
            }
        } else if templates.is_empty() {
            println!("No templates found.");
        } else {
            println!("{}", template_table(&templates));
        }
        Ok(())
    }
}

pub fn handle_request_proof(ctx: &AppContext, args: &LockedArgs) -> anyhow::Result<()> {
    let user = ctx.user()?;
    let id = parse_id(&args.id)?;
    let template = ctx.service()?.request_proof(&id, &user, args.lock)?;
    report(ctx, &template, "Requested proof for")
}

fn report(ctx: &AppContext, template: &Template, verb: &str) -> anyhow::Result<()> {
    if ctx.json() {
        print_json(template)
    } else {
        if ctx.quiet() {
            println!("{}", template.id);
        } else {
            println!("{} {}", verb, template_summary(template));
        }
        Ok(())
    }
}

fn build_template(
    template_type: TemplateType,
    name: String,
    subject: String,
    message: String,
) -> anyhow::Result<NewTemplate> {
    Ok(match template_type {
        TemplateType::Email => NewTemplate::email(name, subject, message),
        TemplateType::Sms => NewTemplate::sms(name, message),
        TemplateType::NhsApp => NewTemplate::nhs_app(name, message),
        TemplateType::Letter => {
            return Err(CliError::invalid_input(
                "Letter templates are created with `tmplctl upload-letter`",
            )
            .into())
        }
    })
}

fn parse_id(value: &str) -> anyhow::Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| CliError::invalid_input(format!("Invalid template ID: {}", e)).into())
}

fn read_upload(path: &Path) -> anyhow::Result<UploadedFile> {
    let data = std::fs::read(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    Ok(UploadedFile::new(file_name, data))
}

fn read_message(message: Option<String>) -> anyhow::Result<String> {
    if let Some(value) = message {
        return Ok(value);
    }

    if !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| anyhow::anyhow!("Failed to read stdin: {}", e))?;
        return Ok(buffer.trim_end().to_string());
    }

    Err(CliError::invalid_input("No message given. Use --message or pipe it via stdin.").into())
}
