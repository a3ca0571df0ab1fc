use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::error;

use jobdesk::config::{load_config, print_schema};
use jobdesk::models::{Job, JobDraft, JobFilters, JobStatus, LoginCredentials, Registration};
use jobdesk::startup;
use jobdesk::state::AppState;
use jobdesk::utils::logger::init_logging;
use jobdesk::{Result, SessionError};

/// jobdesk - command-line client for the job-board API
#[derive(Parser, Debug)]
#[command(name = "jobdesk", version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(long = "config", default_value = "./config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and remember the session
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account and log in
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Password confirmation (defaults to --password)
        #[arg(long)]
        password2: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show the cached account without contacting the server
    Whoami,
    /// Fetch account details from the server
    Profile,
    /// Browse and manage job postings
    #[command(subcommand)]
    Jobs(JobsCommand),
    /// Print the JSON schema of the configuration file
    Schema,
}

#[derive(Subcommand, Debug)]
enum JobsCommand {
    /// List postings, 10 per page
    List {
        /// Free-text search
        #[arg(long)]
        q: Option<String>,
        #[arg(long)]
        status: Option<JobStatus>,
        #[arg(long)]
        company: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u64,
    },
    /// Show one posting
    Show { id: i64 },
    /// Post a new job
    Create(JobFields),
    /// Edit a posting; omitted fields keep their current value
    Update {
        id: i64,
        #[command(flatten)]
        fields: JobFields,
    },
    /// Delete a posting
    Delete { id: i64 },
}

#[derive(Args, Debug)]
struct JobFields {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    company: Option<String>,
    #[arg(long)]
    location: Option<String>,
    /// Yearly salary; pass an empty string to clear it
    #[arg(long)]
    salary: Option<String>,
    #[arg(long)]
    status: Option<JobStatus>,
}

impl JobFields {
    fn apply(self, mut draft: JobDraft) -> Result<JobDraft> {
        if let Some(title) = self.title {
            draft.title = title;
        }
        if let Some(description) = self.description {
            draft.description = description;
        }
        if let Some(company) = self.company {
            draft.company = company;
        }
        if let Some(location) = self.location {
            draft.location = location;
        }
        if let Some(salary) = self.salary {
            draft.salary = JobDraft::parse_salary(&salary).map_err(SessionError::Config)?;
        }
        if let Some(status) = self.status {
            draft.status = status;
        }
        Ok(draft)
    }
}

fn print_job(job: &Job) {
    println!("#{} {} [{}]", job.id, job.title, job.status);
    println!("  {} - {}", job.company, job.location);
    if let Some(salary) = job.salary {
        println!("  salary: {:.0}", salary);
    }
    if let Some(author) = &job.created_by {
        println!("  posted by {}", author);
    }
}

async fn run(state: AppState, command: Command) -> Result<()> {
    match command {
        Command::Login { username, password } => {
            let profile = state
                .sessions
                .login(&LoginCredentials::new(username, password))
                .await?;
            println!("Logged in as {}", profile.username);
        }
        Command::Register {
            username,
            email,
            password,
            password2,
        } => {
            let registration = Registration {
                username,
                email,
                password2: password2.unwrap_or_else(|| password.clone()),
                password,
            };
            let profile = state.sessions.register(&registration).await?;
            println!("Registered and logged in as {}", profile.username);
        }
        Command::Logout => {
            state.sessions.logout().await;
            println!("Logged out");
        }
        Command::Whoami => match state.session().user() {
            Some(user) => println!("{} (id {})", user.username, user.id),
            None => println!("Not logged in"),
        },
        Command::Profile => {
            let profile = state.sessions.fetch_profile().await?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        Command::Jobs(jobs) => run_jobs(&state, jobs).await?,
        Command::Schema => unreachable!("handled before startup"),
    }
    Ok(())
}

async fn run_jobs(state: &AppState, command: JobsCommand) -> Result<()> {
    match command {
        JobsCommand::List {
            q,
            status,
            company,
            location,
            page,
        } => {
            let filters = JobFilters {
                q,
                status,
                company,
                location,
            };
            let listing = state.jobs.list(&filters, page).await?;
            let user = state.session().user();
            for job in &listing.results {
                print_job(job);
                if user.as_ref().is_some_and(|u| job.is_owned_by(u)) {
                    println!("  (yours)");
                }
            }
            println!(
                "page {}/{} - {} jobs",
                listing.page,
                listing.total_pages(),
                listing.count
            );
        }
        JobsCommand::Show { id } => {
            let job = state.jobs.get(id).await?;
            print_job(&job);
            if !job.description.is_empty() {
                println!("\n{}", job.description);
            }
        }
        JobsCommand::Create(fields) => {
            let draft = fields.apply(JobDraft::default())?;
            let job = state.jobs.create(&draft).await?;
            println!("Created job #{}", job.id);
        }
        JobsCommand::Update { id, fields } => {
            let current = state.jobs.get(id).await?;
            let draft = fields.apply(JobDraft::from(&current))?;
            state.jobs.update(id, &draft).await?;
            println!("Updated job #{}", id);
        }
        JobsCommand::Delete { id } => {
            state.jobs.delete(id).await?;
            println!("Deleted job #{}", id);
        }
    }
    Ok(())
}

fn report(e: &SessionError) {
    match e {
        SessionError::Validation { fields } => {
            eprintln!("Registration rejected:");
            for (field, messages) in fields {
                eprintln!("  {}: {}", field, messages.join(" "));
            }
        }
        SessionError::RefreshFailure(_) => {
            eprintln!("{}\nYour session has expired. Please log in again.", e);
        }
        other => match other.server_message() {
            Some(message) => eprintln!("{}: {}", other, message),
            None => eprintln!("{}", other),
        },
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if matches!(cli.command, Command::Schema) {
        if let Err(e) = print_schema() {
            eprintln!("{}", e);
            std::process::exit(1);
        }
        return;
    }

    let config = match load_config(&cli.config) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    let result = match startup::start(config).await {
        Ok(state) => run(state, cli.command).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        error!(error = %e, "command failed");
        report(&e);
        std::process::exit(1);
    }
}
