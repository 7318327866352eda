use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use loadout_cli::{commands, CliDeployMode, CliToggle};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(author, version, about = "Profile-based mod-set manager")]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Override the data directory (profiles, registry, settings).
    #[arg(long, global = true, env = "LOADOUT_DATA_DIR")]
    data_dir: Option<Utf8PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage profiles (named mod sets)
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Switch the active profile and materialize its mod set
    Activate {
        profile: String,
        /// Version catalog; enables the startup auto-update pass
        #[arg(long)]
        catalog: Option<Utf8PathBuf>,
    },
    /// Benchmark the disk and derive the update concurrency pool size
    Calibrate {
        #[arg(long)]
        force: bool,
    },
    /// Check the active profile's mods for pending updates
    Check {
        #[arg(long)]
        catalog: Utf8PathBuf,
    },
    /// Update a single mod to its pending version
    Update {
        #[arg(long)]
        mod_id: u64,
        #[arg(long)]
        catalog: Utf8PathBuf,
    },
    /// Update every mod with a pending update
    #[command(name = "update-all")]
    UpdateAll {
        #[arg(long)]
        catalog: Utf8PathBuf,
    },
    /// Show the engine state at a glance
    Status,
    /// Show or change persistent settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    List,
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
    },
    Remove {
        name: String,
    },
    Show {
        name: String,
    },
    #[command(name = "add-mod")]
    AddMod {
        profile: String,
        #[arg(long, required_unless_present = "local_id")]
        mod_id: Option<u64>,
        #[arg(long, conflicts_with = "mod_id")]
        local_id: Option<String>,
        #[arg(long)]
        file_name: String,
        /// Payload location under the download cache root
        #[arg(long)]
        cache_location: String,
        /// Installed marketplace version id (defaults from the cache key)
        #[arg(long)]
        version: Option<u64>,
        #[arg(long)]
        hash: Option<String>,
        #[arg(long)]
        disabled: bool,
    },
    #[command(name = "remove-mod")]
    RemoveMod {
        profile: String,
        #[arg(long)]
        mod_id: Option<u64>,
        #[arg(long)]
        local_id: Option<String>,
    },
}

#[derive(Subcommand)]
enum SettingsCommands {
    Show,
    Set {
        #[arg(long)]
        mods_path: Option<Utf8PathBuf>,
        #[arg(long)]
        cache_root: Option<Utf8PathBuf>,
        #[arg(long)]
        backups_root: Option<Utf8PathBuf>,
        #[arg(long, value_enum)]
        deploy_mode: Option<CliDeployMode>,
        #[arg(long, value_enum)]
        backups: Option<CliToggle>,
        #[arg(long, value_enum)]
        auto_update: Option<CliToggle>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("default subscriber");

    let services = commands::services(cli.data_dir)?;

    match cli.command {
        Commands::Profile { command } => match command {
            ProfileCommands::List => commands::handle_profile_list(&services)?,
            ProfileCommands::Create {
                name,
                description,
                tags,
            } => commands::handle_profile_create(&services, name, description, tags)?,
            ProfileCommands::Remove { name } => commands::handle_profile_remove(&services, name)?,
            ProfileCommands::Show { name } => commands::handle_profile_show(&services, name)?,
            ProfileCommands::AddMod {
                profile,
                mod_id,
                local_id,
                file_name,
                cache_location,
                version,
                hash,
                disabled,
            } => commands::handle_add_mod(
                &services,
                profile,
                mod_id,
                local_id,
                file_name,
                cache_location,
                version,
                hash,
                disabled,
            )?,
            ProfileCommands::RemoveMod {
                profile,
                mod_id,
                local_id,
            } => commands::handle_remove_mod(&services, profile, mod_id, local_id)?,
        },
        Commands::Activate { profile, catalog } => {
            commands::cmd_activate(&services, profile, catalog).await?
        }
        Commands::Calibrate { force } => commands::cmd_calibrate(&services, force).await?,
        Commands::Check { catalog } => commands::cmd_check(&services, catalog).await?,
        Commands::Update { mod_id, catalog } => {
            commands::cmd_update(&services, mod_id, catalog).await?
        }
        Commands::UpdateAll { catalog } => commands::cmd_update_all(&services, catalog).await?,
        Commands::Status => commands::cmd_status(&services)?,
        Commands::Settings { command } => match command {
            SettingsCommands::Show => commands::handle_settings_show(&services)?,
            SettingsCommands::Set {
                mods_path,
                cache_root,
                backups_root,
                deploy_mode,
                backups,
                auto_update,
            } => commands::handle_settings_set(
                &services,
                mods_path,
                cache_root,
                backups_root,
                deploy_mode.map(Into::into),
                backups.map(CliToggle::as_bool),
                auto_update.map(CliToggle::as_bool),
            )?,
        },
    }

    Ok(())
}
