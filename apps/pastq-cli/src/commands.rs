use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand, ValueEnum};
use pastq_client::models::{
    CourseQuery, PastQuestionQuery, PastQuestionSearch, PastQuestionUpload, RegisterRequest,
    ReviewStatus, UploadFile,
};
use pastq_client::{ClientConfig, PortalClient, UserQuery};
use serde::Serialize;

#[derive(Subcommand)]
pub enum Command {
    /// Log in and store the session
    Login {
        #[arg(long)]
        index_number: String,
        #[arg(long, env = "PASTQ_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and log in with it
    Register {
        #[arg(long)]
        index_number: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "PASTQ_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// End the session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Browse and manage courses
    #[command(subcommand)]
    Courses(CourseCommand),
    /// Browse, upload and moderate past questions
    #[command(subcommand)]
    Questions(QuestionCommand),
    /// Manage accounts (admins only)
    #[command(subcommand)]
    Users(UserCommand),
    /// Print the effective configuration and exit
    Config,
}

#[derive(Args)]
pub struct CourseFilters {
    #[arg(long)]
    faculty: Option<String>,
    #[arg(long)]
    department: Option<String>,
    #[arg(long)]
    level: Option<String>,
    #[arg(long)]
    semester: Option<String>,
    #[arg(long)]
    ordering: Option<String>,
    #[arg(long)]
    page: Option<u32>,
}

impl CourseFilters {
    fn into_query(self, search: Option<String>) -> CourseQuery {
        CourseQuery {
            faculty: self.faculty,
            department: self.department,
            level: self.level,
            semester: self.semester,
            search,
            ordering: self.ordering,
            page: self.page,
        }
    }
}

#[derive(Subcommand)]
pub enum CourseCommand {
    List {
        #[command(flatten)]
        filters: CourseFilters,
        #[arg(long)]
        search: Option<String>,
    },
    Show {
        code: String,
    },
    Search {
        query: String,
        #[command(flatten)]
        filters: CourseFilters,
    },
    Popular,
    Faculties,
    Departments {
        #[arg(long)]
        faculty: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum StatusArg {
    Pending,
    Approved,
    Rejected,
}

impl From<StatusArg> for ReviewStatus {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Pending => ReviewStatus::Pending,
            StatusArg::Approved => ReviewStatus::Approved,
            StatusArg::Rejected => ReviewStatus::Rejected,
        }
    }
}

#[derive(Subcommand)]
pub enum QuestionCommand {
    List {
        /// Course id
        #[arg(long)]
        course: Option<i64>,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        semester: Option<String>,
        #[arg(long)]
        exam_type: Option<String>,
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        page: Option<u32>,
    },
    Show {
        id: i64,
    },
    Search {
        #[arg(long)]
        q: Option<String>,
        /// Course code
        #[arg(long)]
        course: Option<String>,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        semester: Option<String>,
        #[arg(long)]
        exam_type: Option<String>,
    },
    Popular,
    /// Your own uploads
    Mine,
    /// Moderation queue
    Pending,
    Approve {
        id: i64,
    },
    Reject {
        id: i64,
        #[arg(long)]
        reason: String,
    },
    Download {
        id: i64,
        /// Target file or directory (default: the server's file name in the
        /// current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    Upload(UploadArgs),
}

#[derive(Args)]
pub struct UploadArgs {
    #[arg(long)]
    course_id: i64,
    #[arg(long)]
    year: i32,
    #[arg(long, default_value = "first")]
    semester: String,
    #[arg(long, default_value = "final")]
    exam_type: String,
    #[arg(long)]
    title: String,
    #[arg(long)]
    file: PathBuf,
    #[arg(long)]
    lecturer: Option<String>,
    #[arg(long)]
    has_solutions: bool,
    #[arg(long)]
    scanned: bool,
}

#[derive(Subcommand)]
pub enum UserCommand {
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        page: Option<u32>,
    },
    Activate {
        id: i64,
    },
    Deactivate {
        id: i64,
    },
    Delete {
        id: i64,
    },
}

#[derive(Serialize)]
struct Saved {
    file: PathBuf,
    bytes: usize,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn run(command: Command, config: &ClientConfig) -> Result<()> {
    let connect = || PortalClient::from_config(config).context("failed to set up the portal client");
    match command {
        Command::Config => print_json(config),
        Command::Login {
            index_number,
            password,
        } => {
            let client = connect()?;
            print_json(&client.auth().login(&index_number, &password).await?)
        }
        Command::Register {
            index_number,
            email,
            password,
        } => {
            let client = connect()?;
            let request = RegisterRequest {
                index_number,
                email,
                confirm_password: password.clone(),
                password,
            };
            print_json(&client.auth().register(&request).await?)
        }
        Command::Logout => Ok(connect()?.auth().logout().await?),
        Command::Whoami => match connect()?.auth().restore().await? {
            Some(profile) => print_json(&profile),
            None => anyhow::bail!("not logged in"),
        },
        Command::Courses(cmd) => courses(&connect()?, cmd).await,
        Command::Questions(cmd) => questions(&connect()?, cmd).await,
        Command::Users(cmd) => users(&connect()?, cmd).await,
    }
}

async fn courses(client: &PortalClient, command: CourseCommand) -> Result<()> {
    let courses = client.courses();
    match command {
        CourseCommand::List { filters, search } => {
            print_json(&courses.list(&filters.into_query(search)).await?)
        }
        CourseCommand::Show { code } => print_json(&courses.get(&code).await?),
        CourseCommand::Search { query, filters } => {
            print_json(&courses.search(&query, &filters.into_query(None)).await?)
        }
        CourseCommand::Popular => print_json(&courses.popular().await?),
        CourseCommand::Faculties => print_json(&courses.faculties().await?),
        CourseCommand::Departments { faculty } => {
            print_json(&courses.departments(faculty.as_deref()).await?)
        }
    }
}

async fn questions(client: &PortalClient, command: QuestionCommand) -> Result<()> {
    let questions = client.past_questions();
    match command {
        QuestionCommand::List {
            course,
            year,
            semester,
            exam_type,
            status,
            search,
            page,
        } => {
            let query = PastQuestionQuery {
                course,
                year,
                semester,
                exam_type,
                status: status.map(Into::into),
                search,
                page,
                ..PastQuestionQuery::default()
            };
            print_json(&questions.list(&query).await?)
        }
        QuestionCommand::Show { id } => print_json(&questions.get(id).await?),
        QuestionCommand::Search {
            q,
            course,
            year,
            semester,
            exam_type,
        } => {
            let search = PastQuestionSearch {
                q,
                course,
                year,
                semester,
                exam_type,
            };
            print_json(&questions.search(&search).await?)
        }
        QuestionCommand::Popular => print_json(&questions.popular().await?),
        QuestionCommand::Mine => print_json(&questions.my_uploads().await?),
        QuestionCommand::Pending => print_json(&questions.pending().await?),
        QuestionCommand::Approve { id } => print_json(&questions.approve(id).await?),
        QuestionCommand::Reject { id, reason } => print_json(&questions.reject(id, &reason).await?),
        QuestionCommand::Download { id, output } => {
            let download = questions.download(id).await?;
            let target = match output {
                Some(path) if path.is_dir() => path.join(&download.file_name),
                Some(path) => path,
                None => PathBuf::from(&download.file_name),
            };
            tokio::fs::write(&target, &download.data)
                .await
                .with_context(|| format!("failed to write {}", target.display()))?;
            print_json(&Saved {
                bytes: download.data.len(),
                file: target,
            })
        }
        QuestionCommand::Upload(args) => {
            let upload = PastQuestionUpload {
                course_id: args.course_id,
                year: args.year,
                semester: args.semester,
                exam_type: args.exam_type,
                title: args.title,
                file: UploadFile::from_path(&args.file).await?,
                lecturer: args.lecturer,
                has_solutions: args.has_solutions,
                is_scanned: args.scanned,
            };
            print_json(&questions.upload(&upload).await?)
        }
    }
}

async fn users(client: &PortalClient, command: UserCommand) -> Result<()> {
    let users = client.users();
    match command {
        UserCommand::List { search, page } => {
            let query = UserQuery {
                search,
                page,
                ..UserQuery::default()
            };
            print_json(&users.list(&query).await?)
        }
        UserCommand::Activate { id } => print_json(&users.set_active(id, true).await?),
        UserCommand::Deactivate { id } => print_json(&users.set_active(id, false).await?),
        UserCommand::Delete { id } => print_json(&users.delete(id).await?),
    }
}
