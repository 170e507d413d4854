//! Binary entrypoint for the Tinyquest CLI.
//!
//! Commands:
//! - `start [--name <hero>] [--class <id>]` - run the game with the sync engine attached
//! - `init` - create a starter `config.toml`
//! - `status` - print the stored save summary without starting a session
//!
//! See the library crate docs for module-level details: `tinyquest::`.
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{info, warn};

use tinyquest::config::Config;
use tinyquest::game::content::{self, ContentTables};
use tinyquest::game::runtime::Runtime;
use tinyquest::game::types::{GameMode, GameSession, SyncStatus};
use tinyquest::sync::{SledStore, SyncEngine};

#[derive(Parser)]
#[command(name = "tinyquest")]
#[command(about = "An idle RPG for the terminal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the game
    Start {
        /// Hero name for a brand-new save
        #[arg(long, default_value = "Wanderer")]
        name: String,

        /// Starting class for a brand-new save
        #[arg(long, default_value = "adventurer")]
        class: String,
    },
    /// Initialize a new configuration file
    Init,
    /// Show the stored save summary
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config early to configure logging (except for Init which writes defaults later)
    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Start { name, class } => {
            let config = match pre_config {
                Some(config) => config,
                None => Config::load(&cli.config).await?,
            };
            config.validate()?;
            info!("Starting Tinyquest v{}", env!("CARGO_PKG_VERSION"));

            let tables = ContentTables::standard();
            if tables.class(&class).is_none() {
                anyhow::bail!("unknown class '{}'", class);
            }
            let mut player = content::template_player(&tables, &class);
            player.name = name;
            let session = GameSession::fresh(player);

            let (runtime, dirty_rx) = Runtime::new(
                tables,
                config.game.clone(),
                config.narrative.clone(),
                session,
            );
            let store = Arc::new(SledStore::open(&config.sync.data_dir)?);
            let engine = SyncEngine::new(store, runtime.clone(), config.sync.clone());
            tokio::spawn(engine.run(dirty_rx));

            repl(runtime).await?;
        }
        Commands::Init => {
            info!("Initializing Tinyquest configuration");
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
            info!(
                "Save data will live under {}/",
                Config::default().sync.data_dir
            );
        }
        Commands::Status => {
            let config = match pre_config {
                Some(config) => config,
                None => Config::load(&cli.config).await?,
            };
            show_status(&config).await?;
        }
    }

    Ok(())
}

/// Print the stored save without booting a session.
async fn show_status(config: &Config) -> Result<()> {
    let store = SledStore::open(&config.sync.data_dir)?;
    use tinyquest::sync::RemoteStore;
    let identity = store.authenticate().await?;
    let mut rx = store.subscribe("saves", &identity).await?;
    let Some(change) = rx.recv().await else {
        println!("No save data found.");
        return Ok(());
    };
    let Some(data) = change.data else {
        println!("No save found for identity {identity}.");
        return Ok(());
    };
    match tinyquest::game::migration::migrate_save(data) {
        Some(doc) => {
            let p = &doc.player;
            println!("Identity:  {identity}");
            println!(
                "Hero:      {} (level {} {})",
                p.name, p.level, p.class_id
            );
            println!("HP/MP:     {}/{}  {}/{}", p.hp, p.max_hp, p.mp, p.max_mp);
            println!("Gold:      {}", p.gold);
            println!("Location:  {}", p.location);
            println!(
                "Kills:     {}  Deaths: {}  Rank: {}",
                p.stats.kills, p.stats.deaths, p.meta.rank
            );
            println!("Last save: {} (ms since epoch)", doc.last_active);
        }
        None => println!("Save document is unreadable; it will be replaced on next start."),
    }
    Ok(())
}

/// Line-oriented front end over the runtime. Every command maps to one
/// entry point; rejections land in the session log, which is echoed
/// after each input.
async fn repl(runtime: Runtime) -> Result<()> {
    use tokio::io::{AsyncBufReadExt, BufReader};

    println!("Tinyquest. Type 'help' for commands, 'quit' to exit.");
    print_status(&runtime);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut log_seen = runtime.snapshot().log.len();
    while let Some(line) = lines.next_line().await? {
        let mut parts = line.split_whitespace();
        let Some(cmd) = parts.next() else { continue };
        let arg = parts.next();

        let result = match cmd {
            "quit" | "exit" => break,
            "help" => {
                print_help();
                Ok(())
            }
            "status" => {
                print_status(&runtime);
                Ok(())
            }
            "items" => {
                print_inventory(&runtime);
                Ok(())
            }
            "go" => match arg {
                Some(target) => runtime.move_to(target),
                None => {
                    print_connections(&runtime);
                    Ok(())
                }
            },
            "explore" => runtime.explore().await,
            "rest" => runtime.rest(),
            "grave" => runtime.collect_grave(),
            "choose" => runtime.choose_event(parse_index(arg)),
            "attack" => runtime.attack(),
            "skill" => runtime.use_skill(),
            "cycle" => runtime.cycle_skill(),
            "escape" => runtime.escape(),
            "shop" => runtime.open_facility(GameMode::Shop),
            "jobs" => runtime.open_facility(GameMode::JobChange),
            "board" => runtime.open_facility(GameMode::QuestBoard),
            "forge" => runtime.open_facility(GameMode::Crafting),
            "leave" => runtime.leave_facility(),
            "use" => with_item(&runtime, arg, |id| runtime.use_item(id)),
            "equip" => with_item(&runtime, arg, |id| runtime.equip(id)),
            "sell" => with_item(&runtime, arg, |id| runtime.sell(id)),
            "unequip" => runtime.unequip_offhand(),
            "quick" => runtime.use_quick_slot(parse_index(arg)),
            "bind" => {
                let slot = parse_index(arg);
                let item = parts.next().map(str::to_string);
                runtime.assign_quick_slot(slot, item)
            }
            "buy" => match arg {
                Some(item_id) => runtime.buy(item_id),
                None => {
                    println!("usage: buy <item_id>");
                    Ok(())
                }
            },
            "craft" => match arg {
                Some(recipe_id) => runtime.craft(recipe_id),
                None => {
                    println!("usage: craft <recipe_id>");
                    Ok(())
                }
            },
            "accept" => match arg {
                Some(quest_id) => runtime.accept_quest(quest_id),
                None => {
                    println!("usage: accept <quest_id>");
                    Ok(())
                }
            },
            "claim" => match arg {
                Some(quest_id) => runtime.claim_quest(quest_id),
                None => {
                    println!("usage: claim <quest_id>");
                    Ok(())
                }
            },
            "class" => match arg {
                Some(class_id) => runtime.change_class(class_id),
                None => {
                    println!("usage: class <class_id>");
                    Ok(())
                }
            },
            "reset" => runtime.reset_session(),
            other => {
                println!("Unknown command '{other}'. Type 'help'.");
                Ok(())
            }
        };
        // Rejections are already logged by the runtime.
        let _ = result;

        // Echo session log lines appended since the last prompt.
        let session = runtime.snapshot();
        let log_len = session.log.len();
        if log_len < log_seen {
            log_seen = 0;
        }
        for entry in session.log.iter().skip(log_seen) {
            println!("  {entry}");
        }
        log_seen = log_len;
        if let Some(event) = &session.event {
            println!("  ! {}", event.description);
            for (i, choice) in event.choices.iter().enumerate() {
                println!("    choose {i}: {choice}");
            }
        }
        if let Some(enemy) = &session.enemy {
            println!(
                "  vs {} [{}/{}]  you [{}/{}]",
                enemy.name,
                enemy.display_hp(),
                enemy.max_hp,
                session.player.hp,
                session.player.max_hp
            );
        }
    }

    let session = runtime.snapshot();
    if session.sync == SyncStatus::Syncing {
        warn!("Exiting with unsaved progress still debouncing");
    }
    info!("Goodbye.");
    Ok(())
}

fn print_help() {
    println!("World:   go [map], explore, rest, grave, choose <n>");
    println!("Combat:  attack, skill, cycle, escape");
    println!("Town:    shop, jobs, board, forge, leave, buy <id>, craft <id>");
    println!("Quests:  accept <id>, claim <id>");
    println!("Gear:    items, use <n>, equip <n>, sell <n>, unequip, quick <n>, bind <n> <id>");
    println!("Misc:    status, class <id>, reset, help, quit");
}

fn print_status(runtime: &Runtime) {
    let s = runtime.snapshot();
    let p = &s.player;
    println!(
        "{} the {}  Lv{}  HP {}/{}  MP {}/{}  XP {}/{}  {}g  @{}  [{:?}/{:?}]",
        p.name,
        p.class_id,
        p.level,
        p.hp,
        p.max_hp,
        p.mp,
        p.max_mp,
        p.exp,
        p.next_exp,
        p.gold,
        p.location,
        s.mode,
        s.sync
    );
    if !p.status_effects.is_empty() {
        let effects: Vec<&str> = p.status_effects.iter().map(String::as_str).collect();
        println!("  effects: {}", effects.join(", "));
    }
    for quest in &p.quests {
        println!("  quest {}: {}/{}", quest.quest_id, quest.progress, quest.goal);
    }
}

fn print_inventory(runtime: &Runtime) {
    let s = runtime.snapshot();
    let p = &s.player;
    println!(
        "Equipped: {} / {}{}",
        p.equipment.weapon.name,
        p.equipment.armor.name,
        p.equipment
            .offhand
            .as_ref()
            .map(|i| format!(" / {}", i.name))
            .unwrap_or_default()
    );
    if p.inventory.is_empty() {
        println!("Inventory is empty.");
        return;
    }
    for (i, item) in p.inventory.iter().enumerate() {
        println!("  {i}: {} ({:?}, {}g)", item.name, item.kind, item.value());
    }
}

fn print_connections(runtime: &Runtime) {
    let s = runtime.snapshot();
    if let Some(map) = runtime.content().map(&s.player.location) {
        println!("{} connects to: {}", map.name, map.connections.join(", "));
    }
}

/// Resolve an inventory index argument to an instance id and run the
/// entry point with it.
fn with_item<F>(
    runtime: &Runtime,
    arg: Option<&str>,
    run: F,
) -> Result<(), tinyquest::game::combat::TurnRejection>
where
    F: FnOnce(uuid::Uuid) -> Result<(), tinyquest::game::combat::TurnRejection>,
{
    let index = parse_index(arg);
    match runtime.snapshot().player.inventory.get(index) {
        Some(item) => run(item.instance_id),
        None => {
            println!("No item at slot {index}. Try 'items'.");
            Ok(())
        }
    }
}

fn parse_index(arg: Option<&str>) -> usize {
    arg.and_then(|a| a.parse().ok()).unwrap_or(0)
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // Base level from CLI verbosity overrides config
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    if let Some(file) = config.as_ref().and_then(|c| c.logging.file.clone()) {
        if let Ok(f) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file)
        {
            let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));

            // If stdout is a terminal, mirror log lines to the console
            // as well as the file.
            let is_tty = atty::is(atty::Stream::Stdout);

            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());
                if let Ok(mut guard) = write_mutex.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        } else {
            builder.format(default_format);
        }
    } else {
        builder.format(default_format);
    }
    let _ = builder.try_init();
}

fn default_format(
    fmt: &mut env_logger::fmt::Formatter,
    record: &log::Record,
) -> std::io::Result<()> {
    use std::io::Write;
    writeln!(
        fmt,
        "{} [{}] {}",
        chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
        record.level(),
        record.args()
    )
}
