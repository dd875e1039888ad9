use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use training_admin::api::types::{
    NewCourse, NewJobFunction, NewLesson, NewSector, NewSubSector, UserFunctionInput,
};
use training_admin::api::{ApiClient, ApiError};
use training_admin::config::{ClientConfig, ConfigError};
use training_admin::session::validator::SessionValidator;
use training_admin::session::{AccountError, SessionError, SessionRuntime, SessionState, TickOutcome};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("api request failed: {0}")]
    Api(#[from] ApiError),
    #[error("refresh token was rejected; signed out")]
    RefreshRefused,
    #[error("refresh did not complete ({0:?})")]
    RefreshIncomplete(TickOutcome),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "training-admin", about = "Session keeper and admin client for the training platform")]
struct Cli {
    #[arg(long, env = "TRAINING_ADMIN_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "TRAINING_ADMIN_SESSION_FILE")]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and persist the token pair.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "TRAINING_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account. Does not sign in.
    Register {
        #[arg(long)]
        email: String,
        #[arg(long, env = "TRAINING_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        confirm: String,
    },
    Logout,
    Status,
    /// Ask the backend whether the stored access token is still valid.
    Verify,
    /// Exchange the stored refresh token for a new access token.
    Refresh,
    /// Keep the session alive until Ctrl-C or until it ends.
    Watch,
    Api(ApiCommand),
}

#[derive(Args, Debug)]
struct ApiCommand {
    #[command(subcommand)]
    command: ApiSubcommand,
}

#[derive(Subcommand, Debug)]
enum ApiSubcommand {
    #[command(subcommand)]
    Sector(SectorCommand),
    #[command(subcommand)]
    Subsector(SubsectorCommand),
    #[command(subcommand)]
    Function(FunctionCommand),
    #[command(subcommand)]
    UserFunction(UserFunctionCommand),
    #[command(subcommand)]
    Profile(ProfileCommand),
    #[command(subcommand)]
    Course(CourseCommand),
    #[command(subcommand)]
    Lesson(LessonCommand),
}

#[derive(Subcommand, Debug)]
enum SectorCommand {
    List,
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: String,
    },
    Delete {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
enum SubsectorCommand {
    List,
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        sector: String,
        #[arg(long, default_value_t = false)]
        inactive: bool,
    },
    Delete {
        id: String,
    },
}

#[derive(Args, Debug)]
struct FunctionArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    description: String,
    #[arg(long, default_value_t = false)]
    inactive: bool,
}

impl From<FunctionArgs> for NewJobFunction {
    fn from(args: FunctionArgs) -> Self {
        Self { name: args.name, description: args.description, is_active: !args.inactive }
    }
}

#[derive(Subcommand, Debug)]
enum FunctionCommand {
    List,
    Create(FunctionArgs),
    Update {
        id: String,
        #[command(flatten)]
        fields: FunctionArgs,
    },
    Delete {
        id: String,
    },
}

#[derive(Args, Debug)]
struct AssignmentArgs {
    #[arg(long)]
    user: String,
    #[arg(long)]
    function: String,
    #[arg(long, default_value = "required")]
    permission_type: String,
    #[arg(long, default_value_t = false)]
    obsolete: bool,
}

impl From<AssignmentArgs> for UserFunctionInput {
    fn from(args: AssignmentArgs) -> Self {
        Self {
            user: args.user,
            function: args.function,
            permission_type: args.permission_type,
            is_obsolete: args.obsolete,
        }
    }
}

#[derive(Subcommand, Debug)]
enum UserFunctionCommand {
    List,
    Create(AssignmentArgs),
    Update {
        id: String,
        #[command(flatten)]
        fields: AssignmentArgs,
    },
    Delete {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
    List,
}

#[derive(Subcommand, Debug)]
enum CourseCommand {
    List,
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        course: String,
        #[arg(long, help = "Days until the course expires")]
        expires_in_days: u32,
    },
}

#[derive(Subcommand, Debug)]
enum LessonCommand {
    List,
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value_t = 1)]
        sequence: u32,
        #[arg(long, default_value = "video")]
        file_type: String,
        #[arg(long)]
        course: String,
        #[arg(long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = cli.base_url.as_deref() {
        config = config.with_base_url(base_url)?;
    }
    if let Some(path) = cli.session_file {
        config = config.with_session_file(path);
    }
    let runtime = SessionRuntime::from_config(&config)?;

    match cli.command {
        Command::Login { email, password } => {
            let snapshot = runtime.accounts.login(&email, &password).await?;
            println!("signed in as {} ({})", snapshot.user_id.as_deref().unwrap_or("unknown user"), snapshot.role);
            Ok(())
        }
        Command::Register { email, password, confirm } => {
            let json = runtime.accounts.register(&email, &password, &confirm).await?;
            print_json(&json)
        }
        Command::Logout => {
            runtime.accounts.logout()?;
            println!("signed out");
            Ok(())
        }
        Command::Status => run_status(&runtime),
        Command::Verify => {
            let validator = SessionValidator::new(runtime.backend.clone());
            let valid = validator.verify(runtime.context.access_token().as_deref()).await;
            println!("{}", if valid { "valid" } else { "invalid" });
            Ok(())
        }
        Command::Refresh => match runtime.keeper.refresh_now().await {
            TickOutcome::Refreshed => {
                println!("access token renewed");
                Ok(())
            }
            TickOutcome::LoggedOut => Err(CliError::RefreshRefused),
            TickOutcome::NoSession => Err(SessionError::NotAuthenticated.into()),
            other => Err(CliError::RefreshIncomplete(other)),
        },
        Command::Watch => run_watch(&config, runtime).await,
        Command::Api(api) => {
            runtime.context.require_authenticated()?;
            let client = ApiClient::from_config(&config, &runtime)?;
            run_api(&client, api).await
        }
    }
}

fn run_status(runtime: &SessionRuntime) -> Result<(), CliError> {
    let snapshot = runtime.context.snapshot();
    let state = match snapshot.state {
        SessionState::Authenticated => "authenticated",
        SessionState::Unauthenticated => "unauthenticated",
        SessionState::Uninitialized => "uninitialized",
        SessionState::Disposed => "disposed",
    };
    print_json(&json!({
        "state": state,
        "role": snapshot.role.to_string(),
        "user_id": snapshot.user_id,
    }))
}

async fn run_watch(config: &ClientConfig, runtime: SessionRuntime) -> Result<(), CliError> {
    runtime.context.require_authenticated()?;
    let mut updates = runtime.context.subscribe();
    let handle = runtime.keeper.clone().spawn(config.validate_interval);
    println!("watching session; Ctrl-C to stop");

    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res?;
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() || !updates.borrow_and_update().is_authenticated() {
                    println!("session ended");
                    break;
                }
            }
        }
    }

    handle.shutdown().await;
    runtime.context.dispose();
    Ok(())
}

async fn run_api(client: &ApiClient, api: ApiCommand) -> Result<(), CliError> {
    match api.command {
        ApiSubcommand::Sector(cmd) => match cmd {
            SectorCommand::List => print_json(&client.list_sectors().await?),
            SectorCommand::Create { name, description } => {
                print_json(&client.create_sector(&NewSector { name, description }).await?)
            }
            SectorCommand::Delete { id } => {
                client.delete_sector(&id).await?;
                print_json(&json!({ "deleted": id }))
            }
        },
        ApiSubcommand::Subsector(cmd) => match cmd {
            SubsectorCommand::List => print_json(&client.list_subsectors().await?),
            SubsectorCommand::Create { name, description, sector, inactive } => {
                let input = NewSubSector { name, description, sector, is_active: !inactive };
                print_json(&client.create_subsector(&input).await?)
            }
            SubsectorCommand::Delete { id } => {
                client.delete_subsector(&id).await?;
                print_json(&json!({ "deleted": id }))
            }
        },
        ApiSubcommand::Function(cmd) => match cmd {
            FunctionCommand::List => print_json(&client.list_functions().await?),
            FunctionCommand::Create(args) => print_json(&client.create_function(&args.into()).await?),
            FunctionCommand::Update { id, fields } => {
                print_json(&client.update_function(&id, &fields.into()).await?)
            }
            FunctionCommand::Delete { id } => {
                client.delete_function(&id).await?;
                print_json(&json!({ "deleted": id }))
            }
        },
        ApiSubcommand::UserFunction(cmd) => match cmd {
            UserFunctionCommand::List => print_json(&client.list_user_functions().await?),
            UserFunctionCommand::Create(args) => {
                print_json(&client.create_user_function(&args.into()).await?)
            }
            UserFunctionCommand::Update { id, fields } => {
                print_json(&client.update_user_function(&id, &fields.into()).await?)
            }
            UserFunctionCommand::Delete { id } => {
                client.delete_user_function(&id).await?;
                print_json(&json!({ "deleted": id }))
            }
        },
        ApiSubcommand::Profile(ProfileCommand::List) => print_json(&client.list_profiles().await?),
        ApiSubcommand::Course(cmd) => match cmd {
            CourseCommand::List => print_json(&client.list_courses().await?),
            CourseCommand::Create { name, course, expires_in_days } => {
                let input = NewCourse {
                    name,
                    course,
                    sequence_in_course: expires_in_days,
                    class_file_type: String::new(),
                    class_file: String::new(),
                };
                print_json(&client.create_course(&input).await?)
            }
        },
        ApiSubcommand::Lesson(cmd) => match cmd {
            LessonCommand::List => print_json(&client.list_lessons().await?),
            LessonCommand::Create { name, description, sequence, file_type, course, file } => {
                let bytes = tokio::fs::read(&file).await?;
                let file_name = file
                    .file_name()
                    .map_or_else(|| "upload".to_owned(), |n| n.to_string_lossy().into_owned());
                let input = NewLesson {
                    name,
                    description,
                    sequence_in_course: sequence,
                    class_file_type: file_type,
                    course,
                    file_name,
                    file: bytes,
                };
                print_json(&client.create_lesson(&input).await?)
            }
        },
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
