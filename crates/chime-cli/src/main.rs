use anyhow::{bail, Context, Result};
use chime_core::Biometrics;
use chime_face::FaceEngine;
use chime_store::{EntranceLedger, IdentityStore, PauseStore};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "chime", about = "Chime doorbell admin CLI")]
struct Cli {
    /// Path to the SQLite database file (default: CHIME_DB_PATH or the
    /// standard data dir).
    #[arg(long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a person from a reference photo
    Register {
        /// Person's name (also the lookup key)
        name: String,
        /// Reference photo containing exactly one face
        #[arg(short, long)]
        photo: PathBuf,
        /// Audio clip played on their first entrance of the day
        #[arg(short, long)]
        audio: Option<PathBuf>,
        /// Directory containing the ONNX model files
        #[arg(long)]
        model_dir: Option<PathBuf>,
    },
    /// List registered people
    List,
    /// Remove a registered person
    Remove { name: String },
    /// Pause the doorbell loop
    Pause,
    /// Resume the doorbell loop
    Resume,
    /// Flip the pause state
    Toggle,
    /// Show pause state, registered people, and recent entrances
    Status,
    /// Drop all tables (identities, entrances, pause state)
    Reset,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let db_path = cli
        .db
        .or_else(|| std::env::var("CHIME_DB_PATH").ok().map(PathBuf::from))
        .unwrap_or_else(chime_store::default_db_path);

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating data dir {}", parent.display()))?;
    }

    match cli.command {
        Commands::Register {
            name,
            photo,
            audio,
            model_dir,
        } => register(&db_path, &name, &photo, audio.as_deref(), model_dir),
        Commands::List => list(&db_path),
        Commands::Remove { name } => remove(&db_path, &name),
        Commands::Pause => set_paused(&db_path, true),
        Commands::Resume => set_paused(&db_path, false),
        Commands::Toggle => toggle(&db_path),
        Commands::Status => status(&db_path),
        Commands::Reset => reset(&db_path),
    }
}

fn register(
    db_path: &std::path::Path,
    name: &str,
    photo: &std::path::Path,
    audio: Option<&std::path::Path>,
    model_dir: Option<PathBuf>,
) -> Result<()> {
    let model_dir = model_dir
        .or_else(|| std::env::var("CHIME_MODEL_DIR").ok().map(PathBuf::from))
        .unwrap_or_else(chime_face::default_model_dir);

    let image = image::open(photo)
        .with_context(|| format!("opening photo {}", photo.display()))?
        .to_luma8();
    let (width, height) = image.dimensions();

    let mut engine = FaceEngine::load(&model_dir)
        .with_context(|| format!("loading models from {}", model_dir.display()))?;

    let regions = engine
        .locate(image.as_raw(), width, height)
        .context("face detection")?;
    match regions.len() {
        0 => bail!("no face found in {}", photo.display()),
        1 => {}
        n => println!("note: {n} faces found; using the most confident one"),
    }

    let encodings = engine
        .encode(image.as_raw(), width, height, &regions[..1])
        .context("face encoding")?;
    let Some(encoding) = encodings.first() else {
        bail!("could not compute an encoding from {}", photo.display());
    };

    let audio_clip = match audio {
        Some(path) => Some(
            std::fs::read(path).with_context(|| format!("reading clip {}", path.display()))?,
        ),
        None => None,
    };

    let store = IdentityStore::open(db_path)?;
    store.add(name, encoding, audio_clip.as_deref())?;
    println!("registered {name} ({} dims)", encoding.values.len());
    Ok(())
}

fn list(db_path: &std::path::Path) -> Result<()> {
    let store = IdentityStore::open(db_path)?;
    let snapshot = store.snapshot()?;
    if snapshot.is_empty() {
        println!("no one registered");
        return Ok(());
    }
    for id in snapshot {
        let audio = if id.audio_clip.is_some() {
            "custom clip"
        } else {
            "default chime"
        };
        println!("{}  ({} dims, {audio})", id.name, id.encoding.values.len());
    }
    Ok(())
}

fn remove(db_path: &std::path::Path, name: &str) -> Result<()> {
    let store = IdentityStore::open(db_path)?;
    if store.remove(name)? {
        println!("removed {name}");
    } else {
        println!("{name} is not registered");
    }
    Ok(())
}

fn set_paused(db_path: &std::path::Path, paused: bool) -> Result<()> {
    let store = PauseStore::open(db_path)?;
    store.set_paused(paused)?;
    println!(
        "doorbell {}",
        if paused { "paused" } else { "resumed" }
    );
    Ok(())
}

fn toggle(db_path: &std::path::Path) -> Result<()> {
    let store = PauseStore::open(db_path)?;
    let paused = store.toggle()?;
    println!(
        "doorbell {}",
        if paused { "paused" } else { "resumed" }
    );
    Ok(())
}

fn status(db_path: &std::path::Path) -> Result<()> {
    let pause = PauseStore::open(db_path)?;
    let identities = IdentityStore::open(db_path)?;
    let ledger = EntranceLedger::open(db_path)?;

    println!(
        "state: {}",
        if pause.is_paused()? { "paused" } else { "running" }
    );
    println!("registered: {}", identities.snapshot()?.len());

    let recent = ledger.recent(10)?;
    if recent.is_empty() {
        println!("no entrances recorded");
    } else {
        println!("recent entrances:");
        for record in recent {
            println!(
                "  {}  {}",
                record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                record.name
            );
        }
    }
    Ok(())
}

fn reset(db_path: &std::path::Path) -> Result<()> {
    chime_store::reset(db_path)?;
    println!("tables dropped; they are recreated on next use");
    Ok(())
}
