use std::io;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};
use directories::ProjectDirs;
use structopt::StructOpt;

use zeitfresser::cli::{Command::*, CommandLineArgs};
use zeitfresser::db::{SqliteStore, DATABASE_NAME};
use zeitfresser::interface;
use zeitfresser::logging::enable_logging;
use zeitfresser::manager::TaskManager;
use zeitfresser::store::{DefaultTaskStore, TaskStore};

fn find_default_db_file() -> anyhow::Result<PathBuf> {
    let base_dirs = ProjectDirs::from("de", "hdmstuttgart", "zeitfresser")
        .ok_or(anyhow!("Failed to find data directory."))?;
    let root_dir = base_dirs.data_dir();
    std::fs::create_dir_all(root_dir)
        .with_context(|| format!("Failed to create directory {}.", root_dir.display()))?;
    Ok(root_dir.join(DATABASE_NAME))
}

fn main() -> anyhow::Result<()> {
    // Get the command-line arguments.
    let CommandLineArgs {
        action,
        db_file,
        in_memory,
        log,
    } = CommandLineArgs::from_args();

    enable_logging(log)?;

    if in_memory {
        return run(action, DefaultTaskStore);
    }

    // Unpack the database file.
    let db_file = match db_file {
        Some(path) => path,
        None => find_default_db_file()?,
    };
    let store = SqliteStore::open(&db_file)?;

    match action {
        Init => println!("Database ready at {}.", db_file.display()),
        Reset => {
            store.reset()?;
            println!("Database at {} reset.", db_file.display());
        }
        action => run(action, store)?,
    }
    Ok(())
}

/// Perform an action against the task list of `store`.
fn run<S: TaskStore>(action: zeitfresser::cli::Command, store: S) -> anyhow::Result<()> {
    let mut manager = TaskManager::open(store)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match action {
        List => interface::list(&manager, &mut out),
        Add { name } => interface::add_task(&mut manager, &name, &mut out),
        Eval { from, to } => interface::eval(&manager, from, to, &mut out),
        Session => interface::session(&mut manager, io::stdin().lock(), &mut out),
        Init | Reset => bail!("This command needs a database file."),
    }
}
