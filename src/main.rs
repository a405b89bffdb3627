//! tickit-webdav - command-line task manager with WebDAV sync

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use tickit_webdav::config::Config;
use tickit_webdav::models::{Priority, ProgressScope, Task, Theme, timestamp};
use tickit_webdav::notify::ConsoleNotifier;
use tickit_webdav::store::{ListUpdate, NewList, NewTask, SettingsUpdate, TaskUpdate};
use tickit_webdav::{App, Database, WebDavClient};

#[derive(Parser)]
#[command(name = "tickit-webdav")]
#[command(about = "Task and list manager with WebDAV sync")]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new config file
    Init {
        /// Output path for config file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show all lists
    Lists,

    /// Manage lists
    List {
        #[command(subcommand)]
        command: ListCommands,
    },

    /// Show tasks of a list
    Tasks {
        /// List id (defaults to the first list)
        #[arg(short, long)]
        list: Option<String>,

        /// Show tasks of every list
        #[arg(short, long)]
        all: bool,
    },

    /// Add a task
    Add {
        title: String,

        #[arg(short, long)]
        content: Option<String>,

        /// low, medium or high
        #[arg(short, long)]
        priority: Option<Priority>,

        /// List id (defaults to the first list)
        #[arg(short, long)]
        list: Option<String>,
    },

    /// Edit a task
    Edit {
        id: String,

        #[arg(short, long)]
        title: Option<String>,

        /// New content, empty to clear
        #[arg(short, long)]
        content: Option<String>,

        #[arg(short, long)]
        priority: Option<Priority>,

        /// Move to another list
        #[arg(short, long)]
        list: Option<String>,
    },

    /// Toggle a task between pending and completed
    Toggle { id: String },

    /// Delete a task
    Rm { id: String },

    /// Show completion progress
    Stats {
        #[arg(short, long)]
        list: Option<String>,
    },

    /// Show or change application settings
    Settings {
        /// light or dark
        #[arg(long)]
        theme: Option<Theme>,

        /// Sync automatically on startup
        #[arg(long)]
        auto_sync: Option<bool>,

        /// all or current
        #[arg(long)]
        progress_scope: Option<ProgressScope>,
    },

    /// Show or change WebDAV settings
    Webdav {
        #[arg(long)]
        url: Option<String>,

        #[arg(long)]
        username: Option<String>,

        #[arg(long)]
        password: Option<String>,

        #[arg(long, conflicts_with = "disable")]
        enable: bool,

        #[arg(long)]
        disable: bool,
    },

    /// Check that the WebDAV server is reachable
    TestConnection,

    /// Synchronize with the WebDAV server
    Sync,

    /// Delete all local tasks, lists and settings
    Reset {
        /// Skip the safety check
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ListCommands {
    /// Create a list
    Add {
        name: String,

        #[arg(long)]
        id: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(long)]
        color: Option<String>,
    },

    /// Rename a list
    Rename { id: String, name: String },

    /// Delete a list and all of its tasks
    Rm { id: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Application errors have already been shown as notifications
            if e.downcast_ref::<tickit_webdav::Error>().is_none() {
                eprintln!("Error: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cfg: &Config, verbose: bool) {
    let level = if verbose { "debug" } else { cfg.log.level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("tickit_webdav={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    if let Commands::Init { output } = &cli.command {
        let path = match output {
            Some(path) => path.clone(),
            None => Config::default_path()?,
        };
        Config::default().save_to(&path)?;

        println!("Created config file: {}", path.display());
        println!();
        println!("Next steps:");
        println!("  1. Point WebDAV at your server:");
        println!("     tickit-webdav webdav --url https://dav.example.com --username me --password *** --enable");
        println!("  2. Add a task: tickit-webdav add \"Write report\"");
        println!("  3. Sync: tickit-webdav sync");
        return Ok(());
    }

    let cfg = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    init_logging(&cfg, cli.verbose);

    let store = Database::new(&cfg.database.path);
    let mut app = App::new(store, WebDavClient::new(), Box::new(ConsoleNotifier));
    app.init().await?;

    match cli.command {
        Commands::Init { .. } => {}

        Commands::Lists => {
            let state = app.state();
            for list in state.lists() {
                let count = state.tasks_in_list(&list.id).count();
                let description = list.description.as_deref().unwrap_or("");
                println!("{}  {} ({} tasks)  {}", list.id, list.name, count, description);
            }
        }

        Commands::List { command } => match command {
            ListCommands::Add {
                name,
                id,
                description,
                color,
            } => {
                let list = app
                    .create_list(NewList {
                        id,
                        name,
                        description,
                        color,
                    })
                    .await?;
                println!("{}", list.id);
            }
            ListCommands::Rename { id, name } => {
                app.update_list(
                    &id,
                    ListUpdate {
                        name: Some(name),
                        ..ListUpdate::default()
                    },
                )
                .await?;
            }
            ListCommands::Rm { id } => {
                app.delete_list(&id).await?;
            }
        },

        Commands::Tasks { list, all } => {
            if let Some(id) = &list {
                app.set_current_list(id)?;
            }
            let state = app.state();
            let tasks: Vec<&Task> = if all {
                state.tasks().iter().collect()
            } else {
                state.current_tasks()
            };
            if let Some(current) = state.current_list().filter(|_| !all) {
                println!("{}", current.name);
            }
            if tasks.is_empty() {
                println!("No tasks.");
            }
            for task in tasks {
                print_task(task);
            }
        }

        Commands::Add {
            title,
            content,
            priority,
            list,
        } => {
            let task = app
                .create_task(NewTask {
                    title,
                    content,
                    list_id: list,
                    priority,
                })
                .await?;
            println!("{}", task.id);
        }

        Commands::Edit {
            id,
            title,
            content,
            priority,
            list,
        } => {
            let task = app
                .update_task(
                    &id,
                    TaskUpdate {
                        title,
                        content: content.map(Some),
                        priority,
                        status: None,
                        list_id: list,
                    },
                )
                .await?;
            print_task(&task);
        }

        Commands::Toggle { id } => {
            let task = app.toggle_task_status(&id).await?;
            print_task(&task);
        }

        Commands::Rm { id } => {
            app.delete_task(&id).await?;
        }

        Commands::Stats { list } => {
            if let Some(id) = &list {
                app.set_current_list(id)?;
            }
            let stats = app.state().task_stats();
            println!(
                "{}/{} completed ({}%), {} pending",
                stats.completed, stats.total, stats.completion_rate, stats.pending
            );
        }

        Commands::Settings {
            theme,
            auto_sync,
            progress_scope,
        } => {
            if theme.is_none() && auto_sync.is_none() && progress_scope.is_none() {
                let settings = app.state().settings();
                println!("theme          = {:?}", settings.theme);
                println!("auto_sync      = {}", settings.auto_sync);
                println!("progress_scope = {:?}", settings.progress_scope);
            } else {
                app.update_settings(SettingsUpdate {
                    theme,
                    auto_sync,
                    progress_scope,
                    ..SettingsUpdate::default()
                })
                .await?;
            }
        }

        Commands::Webdav {
            url,
            username,
            password,
            enable,
            disable,
        } => {
            let mut webdav = app.state().settings().webdav.clone();
            let unchanged =
                url.is_none() && username.is_none() && password.is_none() && !enable && !disable;
            if unchanged {
                let masked = if webdav.password.is_empty() { "" } else { "********" };
                println!("url      = {}", webdav.url);
                println!("username = {}", webdav.username);
                println!("password = {}", masked);
                println!("enabled  = {}", webdav.enabled);
                println!("usable   = {}", app.is_remote_configured());
            } else {
                if let Some(url) = url {
                    webdav.url = url;
                }
                if let Some(username) = username {
                    webdav.username = username;
                }
                if let Some(password) = password {
                    webdav.password = password;
                }
                if enable {
                    webdav.enabled = true;
                }
                if disable {
                    webdav.enabled = false;
                }
                app.update_settings(SettingsUpdate {
                    webdav: Some(webdav),
                    ..SettingsUpdate::default()
                })
                .await?;
            }
        }

        Commands::TestConnection => {
            if app.test_connection().await {
                println!("✅ WebDAV server reachable");
            } else {
                anyhow::bail!("WebDAV server not reachable");
            }
        }

        Commands::Sync => {
            let report = app.sync().await?;
            println!(
                "{} tasks, {} lists ({:?} data kept) at {}",
                report.tasks,
                report.lists,
                report.source,
                timestamp::format(&report.completed_at)
            );
        }

        Commands::Reset { yes } => {
            if !yes {
                anyhow::bail!("Refusing to delete all data without --yes");
            }
            app.reset().await?;
        }
    }

    Ok(())
}

fn print_task(task: &Task) {
    let mark = if task.is_completed() { "x" } else { " " };
    println!(
        "[{}] {}  ({})  {}",
        mark,
        task.title,
        task.priority.as_str(),
        task.id
    );
    if let Some(content) = &task.content {
        println!("      {}", content);
    }
}
