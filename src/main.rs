use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use zxpm::application::errors::{BotError, StoreError};
use zxpm::application::services::{Access, PluginManage, RequestRecorder, Rules, SqlConsole};
use zxpm::domain::entities::{BlockType, HandleType, NewPlugin, PluginKind, RequestKind, Session};
use zxpm::domain::traits::{Bot, Clock, SystemClock};
use zxpm::infrastructure::adapters::console::{ConsoleAdapter, ConsoleEvent};
use zxpm::infrastructure::config::Config;
use zxpm::infrastructure::database::Database;

#[derive(Parser)]
#[command(name = "zxpm")]
#[command(about = "Plugin management and request recording for a chat bot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Database path (overrides config)
    #[arg(long)]
    db: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Record requests read from the console
    Run,
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
    /// Plugin switches
    #[command(subcommand)]
    Plugin(PluginCommand),
    /// Group sleep/wake
    #[command(subcommand)]
    Group(GroupCommand),
    /// SQL console
    #[command(subcommand)]
    Sql(SqlCommand),
    /// Recorded friend/group requests
    #[command(subcommand)]
    Request(RequestCommand),
    /// Per-group user permission levels
    #[command(subcommand)]
    Level(LevelCommand),
}

#[derive(Clone, Copy, ValueEnum)]
enum Switch {
    On,
    Off,
}

impl Switch {
    fn enabled(self) -> bool {
        matches!(self, Switch::On)
    }
}

#[derive(Args)]
struct SuperuserArgs {
    /// Plugin id or name
    plugin: String,
    /// Only this group
    #[arg(long)]
    group: Option<String>,
    /// Global block type to write: all, group or private
    #[arg(long)]
    block_type: Option<BlockType>,
}

#[derive(Subcommand)]
enum PluginCommand {
    /// List plugins (hidden ones excluded)
    List,
    /// Register or refresh a plugin
    Register {
        module: String,
        name: String,
        #[arg(long, default_value = "normal")]
        kind: PluginKind,
        /// Start switched off in new groups
        #[arg(long)]
        default_off: bool,
        /// Mark as failed to load
        #[arg(long)]
        unloaded: bool,
    },
    /// Effective state of a module
    Status {
        module: String,
        #[arg(long)]
        group: Option<String>,
    },
    /// Disable a module globally
    Block { module: String },
    /// Enable a module globally
    Unblock { module: String },
    /// Group admin disable
    GroupBlock { plugin: String, group: String },
    /// Group admin enable
    GroupUnblock { plugin: String, group: String },
    /// Superuser disable
    SuBlock(SuperuserArgs),
    /// Superuser enable
    SuUnblock(SuperuserArgs),
    /// Default state in newly joined groups
    Default { plugin: String, status: Switch },
    /// Switch every normal plugin
    All {
        status: Switch,
        /// Change the default state instead
        #[arg(long)]
        default: bool,
        #[arg(long)]
        group: Option<String>,
    },
}

#[derive(Subcommand)]
enum GroupCommand {
    Sleep { group: String },
    Wake { group: String },
    Awake { group: String },
}

#[derive(Subcommand)]
enum SqlCommand {
    /// Execute a statement
    Exec {
        sql: String,
        /// Caller address for the audit log
        #[arg(long)]
        ip: Option<String>,
    },
    /// List tables
    Tables,
    /// List columns of a table
    Columns { table: String },
    /// Show the audit log
    Log {
        #[arg(long, default_value_t = 1)]
        index: u32,
        #[arg(long, default_value_t = 20)]
        size: u32,
    },
}

#[derive(Subcommand)]
enum RequestCommand {
    List {
        #[arg(long)]
        kind: Option<RequestKind>,
        #[arg(long)]
        pending: bool,
    },
    /// Close a pending request: approve, refuse or ignore
    Mark { id: i64, handle: HandleType },
}

#[derive(Subcommand)]
enum LevelCommand {
    Set { user: String, group: String, level: i64 },
    Get { user: String, group: String },
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = dispatch(cli) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn dispatch(cli: Cli) -> Result<(), BotError> {
    let Cli { command, config, db } = cli;

    match command {
        Commands::Version => {
            println!("zxpm v{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Commands::InitConfig => {
            println!("{}", Config::default().to_yaml()?);
            println!("\nSave this to config.yaml and adjust as needed.");
            return Ok(());
        }
        _ => {}
    }

    let mut config = load_config(&config);
    if let Some(path) = db {
        config.database.path = path;
    }
    let database = Arc::new(open_database(&config.database.path)?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match command {
        Commands::Run => run_bot(config, database, clock),
        Commands::Plugin(cmd) => plugin_command(PluginManage::new(database, clock), cmd),
        Commands::Group(cmd) => group_command(PluginManage::new(database, clock), cmd),
        Commands::Sql(cmd) => sql_command(SqlConsole::new(database, clock), cmd),
        Commands::Request(RequestCommand::List { kind, pending }) => {
            for r in database.list_requests(kind, pending)? {
                println!(
                    "{:>4}  {:<6}  user={} group={} flag={} nickname={} handle={} at {}",
                    r.id,
                    r.request_kind,
                    r.user_id,
                    r.group_id.as_deref().unwrap_or("-"),
                    r.flag,
                    r.nickname,
                    r.handle_type.map(|h| h.to_string()).unwrap_or_else(|| "pending".to_string()),
                    r.created_at.to_rfc3339(),
                );
            }
            Ok(())
        }
        Commands::Request(RequestCommand::Mark { id, handle }) => {
            let recorder = RequestRecorder::new(
                database,
                config.bot.superusers.clone(),
                config.request.dedup_window(),
                clock,
            );
            recorder.mark_handled(id, handle)?;
            println!("Request {} marked {}", id, handle);
            Ok(())
        }
        Commands::Level(LevelCommand::Set { user, group, level }) => {
            database.set_user_level(&user, &group, level)?;
            println!("{} in group {} now has level {}", user, group, level);
            Ok(())
        }
        Commands::Level(LevelCommand::Get { user, group }) => {
            match database.get_user_level(&user, &group)? {
                Some(level) => println!("{}", level),
                None => println!("no level"),
            }
            Ok(())
        }
        Commands::Version | Commands::InitConfig => Ok(()),
    }
}

fn load_config(path: &str) -> Config {
    if !Path::new(path).exists() {
        return Config::load_env();
    }
    let mut config = Config::load(path).unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}, using defaults", e);
        Config::default()
    });
    config.apply_env();
    config
}

fn open_database(path: &Path) -> Result<Database, StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let db = Database::new(path)?;
    tracing::info!("Database initialized at {}", path.display());
    Ok(db)
}

fn plugin_command(manage: PluginManage, cmd: PluginCommand) -> Result<(), BotError> {
    let outcome = match cmd {
        PluginCommand::List => {
            println!(
                "{:>4}  {:<20} {:<20} {:<8} {:<10} {:<8} {:<8}",
                "ID", "MODULE", "NAME", "STATUS", "BLOCK", "LOADED", "DEFAULT"
            );
            for p in manage.list_plugins()? {
                println!(
                    "{:>4}  {:<20} {:<20} {:<8} {:<10} {:<8} {:<8}",
                    p.id,
                    p.module,
                    p.name,
                    if p.status { "on" } else { "off" },
                    p.block_type.map(|b| b.to_string()).unwrap_or_else(|| "-".to_string()),
                    if p.load_status { "success" } else { "error" },
                    if p.default_status { "on" } else { "off" },
                );
            }
            return Ok(());
        }
        PluginCommand::Register { module, name, kind, default_off, unloaded } => {
            let plugin = NewPlugin::new(module, name)
                .with_kind(kind)
                .with_default_status(!default_off)
                .with_load_status(!unloaded);
            let id = manage.register_plugin(&plugin)?;
            println!("Registered {} with id {}", plugin.module, id);
            return Ok(());
        }
        PluginCommand::Status { module, group } => {
            match manage.resolve_state(&module, group.as_deref())? {
                Some(state) => println!("{}: {}", module, state),
                None => println!("{}: unknown module", module),
            }
            return Ok(());
        }
        PluginCommand::Block { module } => {
            manage.block(&module)?;
            println!("Blocked {}", module);
            return Ok(());
        }
        PluginCommand::Unblock { module } => {
            manage.unblock(&module)?;
            println!("Unblocked {}", module);
            return Ok(());
        }
        PluginCommand::GroupBlock { plugin, group } => manage.block_group_plugin(&plugin, &group)?,
        PluginCommand::GroupUnblock { plugin, group } => manage.unblock_group_plugin(&plugin, &group)?,
        PluginCommand::SuBlock(args) => {
            manage.superuser_block(&args.plugin, args.block_type, args.group.as_deref())?
        }
        PluginCommand::SuUnblock(args) => {
            manage.superuser_unblock(&args.plugin, args.block_type, args.group.as_deref())?
        }
        PluginCommand::Default { plugin, status } => manage.set_default_status(&plugin, status.enabled())?,
        PluginCommand::All { status, default, group } => {
            manage.set_all_plugin_status(status.enabled(), default, group.as_deref())?
        }
    };
    println!("{}", outcome);
    Ok(())
}

fn group_command(manage: PluginManage, cmd: GroupCommand) -> Result<(), BotError> {
    match cmd {
        GroupCommand::Sleep { group } => {
            manage.sleep(&group)?;
            println!("Group {} is asleep", group);
        }
        GroupCommand::Wake { group } => {
            manage.wake(&group)?;
            println!("Group {} is awake", group);
        }
        GroupCommand::Awake { group } => {
            println!("{}", manage.is_awake(&group)?);
        }
    }
    Ok(())
}

fn sql_command(console: SqlConsole, cmd: SqlCommand) -> Result<(), BotError> {
    let json = match cmd {
        SqlCommand::Exec { sql, ip } => serde_json::to_string_pretty(&console.exec_sql(&sql, ip.as_deref())),
        SqlCommand::Tables => serde_json::to_string_pretty(&console.get_table_list()),
        SqlCommand::Columns { table } => serde_json::to_string_pretty(&console.get_table_column(&table)),
        SqlCommand::Log { index, size } => serde_json::to_string_pretty(&console.get_sql_log(index, size)),
    }
    .map_err(|e| StoreError::Serialization(e.to_string()))?;
    println!("{}", json);
    Ok(())
}

fn run_bot(config: Config, db: Arc<Database>, clock: Arc<dyn Clock>) -> Result<(), BotError> {
    tracing::info!("Starting {}", config.bot.name);

    let recorder = Arc::new(RequestRecorder::new(
        db.clone(),
        config.bot.superusers.clone(),
        config.request.dedup_window(),
        clock.clone(),
    ));
    let manage = PluginManage::new(db.clone(), clock);
    let rules = Rules::new(config.bot.superusers.clone(), db);

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| BotError::Internal(format!("Failed to start runtime: {}", e)))?;

    rt.block_on(async {
        let sweeper = recorder.spawn_sweeper(config.request.sweep_interval());
        let bot = ConsoleAdapter::new();
        let session = Session::new(bot.bot_info().platform);

        tracing::info!("Reading events from stdin (friend/group/block/unblock/sweep/quit)");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Failed to read stdin: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            let event = match ConsoleEvent::parse(&line) {
                Ok(event) => event,
                Err(e) => {
                    println!("[BOT] {}", e);
                    continue;
                }
            };

            let result = match event {
                ConsoleEvent::Friend(event) => recorder.on_friend_request(&bot, &session, &event).await,
                ConsoleEvent::Group(event) => recorder.on_group_request(&bot, &session, &event).await,
                ConsoleEvent::Switch { user_id, group_id, plugin, enable } => {
                    let mut from = session.clone().with_user(user_id);
                    if let Some(group_id) = group_id {
                        from = from.in_group(group_id);
                    }
                    match switch_plugin(&rules, &manage, &from, &plugin, enable, config.bot.admin_level) {
                        Ok(reply) => println!("[BOT] {}", reply),
                        Err(e) => tracing::error!("Failed to switch plugin: {}", e),
                    }
                    continue;
                }
                ConsoleEvent::Sweep => {
                    recorder.sweep();
                    continue;
                }
                ConsoleEvent::Quit => break,
            };

            match result {
                Ok(outcome) => println!("[BOT] {:?}", outcome),
                Err(e) => tracing::error!("Failed to handle request: {}", e),
            }
        }

        sweeper.abort();
    });

    Ok(())
}

/// Group admin plugin switch, gated on group scope and admin level.
fn switch_plugin(
    rules: &Rules,
    manage: &PluginManage,
    session: &Session,
    plugin: &str,
    enable: bool,
    level: i64,
) -> Result<String, BotError> {
    match rules.group_admin_access(session, level)? {
        Access::NotInGroup => Ok("This command can only be used in groups".to_string()),
        Access::Denied => Ok(format!("Permission denied, requires admin level {}", level)),
        Access::Allowed => {
            let group_id = session.group_id.as_deref().unwrap_or_default();
            let outcome = if enable {
                manage.unblock_group_plugin(plugin, group_id)?
            } else {
                manage.block_group_plugin(plugin, group_id)?
            };
            Ok(outcome.to_string())
        }
    }
}
