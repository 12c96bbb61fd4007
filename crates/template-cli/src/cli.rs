use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use template_core::{TemplateType, VERSION};

/// tmplctl - manage message templates and drive the letter pipeline
#[derive(Parser)]
#[command(name = "tmplctl")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Client the command acts for
    #[arg(long, global = true, env = "TMPLCTL_CLIENT_ID")]
    pub client: Option<String>,

    /// Internal user id of the acting user
    #[arg(long, global = true, env = "TMPLCTL_USER_ID")]
    pub user: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default config and create the template database
    Init(InitArgs),

    /// Create an email, SMS or NHS App template
    Create(CreateArgs),

    /// Upload a letter template PDF (and optional test data CSV)
    UploadLetter(UploadLetterArgs),

    /// Replace the content of a draft template
    Update(UpdateArgs),

    /// Submit a template
    Submit(LockedArgs),

    /// Delete a template
    Delete(LockedArgs),

    /// Show a template
    Show(ShowArgs),

    /// List templates
    List(ListArgs),

    /// Request supplier proofs for a validated letter
    RequestProof(LockedArgs),

    /// Apply a virus scan result for an uploaded letter file
    ScanResult(EventArgs),

    /// Apply a virus scan result for a supplier proof
    ProofResult(EventArgs),

    /// Move supplier proofs from the inbox into the archive
    PollProofs,

    /// List queued proofing requests for the acting client
    ProofRequests,

    /// Remove deleted templates whose retention has expired
    Purge,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Template types a user can create directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum TypeArg {
    Email,
    Sms,
    NhsApp,
}

impl From<TypeArg> for TemplateType {
    fn from(value: TypeArg) -> Self {
        match value {
            TypeArg::Email => TemplateType::Email,
            TypeArg::Sms => TemplateType::Sms,
            TypeArg::NhsApp => TemplateType::NhsApp,
        }
    }
}

/// Arguments for the `init` command
#[derive(Args)]
pub struct InitArgs {
    /// Directory for the database, uploads and proofs
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Campaign id allowed for the acting client (repeatable)
    #[arg(long = "campaign", value_name = "ID")]
    pub campaigns: Vec<String>,

    /// Enable proofing for the acting client
    #[arg(long)]
    pub proofing: bool,

    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `create` command
#[derive(Args)]
pub struct CreateArgs {
    /// Template type
    #[arg(value_enum, value_name = "TYPE")]
    pub template_type: TypeArg,

    /// Template name
    #[arg(long)]
    pub name: String,

    /// Email subject
    #[arg(long)]
    pub subject: Option<String>,

    /// Message body (read from stdin if omitted)
    #[arg(long)]
    pub message: Option<String>,
}

/// Arguments for the `upload-letter` command
#[derive(Args)]
pub struct UploadLetterArgs {
    /// Template name
    #[arg(long)]
    pub name: String,

    /// Letter template PDF
    #[arg(long, value_name = "FILE")]
    pub pdf: PathBuf,

    /// Test personalisation data CSV
    #[arg(long, value_name = "FILE")]
    pub csv: Option<PathBuf>,

    /// Letter type (q1, q4, x0, x1, x3)
    #[arg(long, default_value = "x0")]
    pub letter_type: String,

    /// Letter language (ISO 639-1)
    #[arg(long, default_value = "en")]
    pub language: String,

    /// Campaign id
    #[arg(long)]
    pub campaign: String,
}

/// Arguments for the `update` command
#[derive(Args)]
pub struct UpdateArgs {
    /// Template ID
    #[arg(value_name = "ID")]
    pub id: String,

    /// Lock number from the last read
    #[arg(long)]
    pub lock: u64,

    /// Template type (defaults to the stored type)
    #[arg(long = "type", value_enum)]
    pub template_type: Option<TypeArg>,

    /// New name
    #[arg(long)]
    pub name: Option<String>,

    /// New email subject
    #[arg(long)]
    pub subject: Option<String>,

    /// New message body
    #[arg(long)]
    pub message: Option<String>,
}

/// Arguments for commands that act on one template at a known lock number
#[derive(Args)]
pub struct LockedArgs {
    /// Template ID
    #[arg(value_name = "ID")]
    pub id: String,

    /// Lock number from the last read
    #[arg(long)]
    pub lock: u64,
}

/// Arguments for the `show` command
#[derive(Args)]
pub struct ShowArgs {
    /// Template ID
    #[arg(value_name = "ID")]
    pub id: String,
}

/// Arguments for the `list` command
#[derive(Args)]
pub struct ListArgs {
    /// Filter by status (e.g. NOT_YET_SUBMITTED)
    #[arg(long)]
    pub status: Option<String>,

    /// Filter by template type
    #[arg(long = "type")]
    pub template_type: Option<String>,

    /// Filter letters by language
    #[arg(long)]
    pub language: Option<String>,

    /// Filter letters by letter type
    #[arg(long)]
    pub letter_type: Option<String>,
}

/// Arguments for event commands
#[derive(Args)]
pub struct EventArgs {
    /// JSON event file ("-" or omitted reads stdin)
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,
}

/// Arguments for the `completions` command
#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_name = "SHELL")]
    pub shell: Shell,
}
