use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use quantblog::accounts;
use quantblog::analytics;
use quantblog::blog::{self, PostAdmin};
use quantblog::config::Config;
use quantblog::db::models::{BlogSettings, NewPost, PostPatch, Profile, Role};
use quantblog::db::ContentStore;
use quantblog::engagement::{Actor, Engagement, StaticAuth};
use quantblog::error::BlogError;
use quantblog::output::terminal;
use quantblog::storage::{FileStorage, KeyValueStore, MemoryStorage};

/// quantblog: engagement backend for a Vietnamese quantitative-trading blog.
///
/// Manages posts, comments, likes, shares, and view analytics from the
/// command line, and serves the same operations over HTTP.
#[derive(Parser)]
#[command(name = "quantblog", version, about)]
struct Cli {
    /// Act as this user id (omit to act as this machine's anonymous session)
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Show system status (DB stats, engagement totals, local session)
    Status,

    /// Remove stale local view markers
    Gc,

    /// Create, list, and manage posts
    #[command(subcommand)]
    Post(PostCommand),

    /// Record a view of a post (counted once per day)
    View { post_id: String },

    /// Toggle your like on a post
    Like { post_id: String },

    /// Check whether you currently like a post
    LikeStatus { post_id: String },

    /// Record a share of a post
    Share { post_id: String },

    /// Read and write comments
    #[command(subcommand)]
    Comment(CommentCommand),

    /// Show or change blog-wide settings
    #[command(subcommand)]
    Settings(SettingsCommand),

    /// Manage user profiles
    #[command(subcommand)]
    Profile(ProfileCommand),

    /// Recompute engagement counters from interaction records
    Reconcile {
        /// Only this post (default: every post)
        post_id: Option<String>,
    },

    /// Start the web API server
    #[cfg(feature = "web")]
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8080")]
        port: u16,

        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
    },
}

#[derive(Subcommand)]
enum PostCommand {
    /// Publish a new post (admin)
    Create {
        #[arg(long)]
        title: String,

        #[command(flatten)]
        body: BodyArgs,

        /// Author shown on the post (default: your display name)
        #[arg(long, default_value = "")]
        author: String,

        /// Tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Summary shown in listings (default: start of the body)
        #[arg(long)]
        excerpt: Option<String>,

        /// Reading time in minutes (default: estimated from the body)
        #[arg(long)]
        read_time: Option<u32>,

        #[arg(long)]
        image_url: Option<String>,

        /// Create the post hidden from readers
        #[arg(long)]
        hidden: bool,
    },

    /// List posts
    List {
        /// Include hidden posts (admin)
        #[arg(long)]
        all: bool,
    },

    /// Show a single post
    Show { id: String },

    /// Edit a post (admin)
    Update {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[command(flatten)]
        body: BodyArgs,

        #[arg(long)]
        author: Option<String>,

        /// Replace the tags (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        #[arg(long)]
        excerpt: Option<String>,

        #[arg(long)]
        read_time: Option<u32>,

        #[arg(long, conflicts_with = "clear_image")]
        image_url: Option<String>,

        /// Remove the post's image
        #[arg(long)]
        clear_image: bool,
    },

    /// Hide a post from readers (admin)
    Hide { id: String },

    /// Make a hidden post visible again (admin)
    Unhide { id: String },

    /// Permanently delete a post with its comments and interactions (admin)
    Delete { id: String },
}

#[derive(Args)]
struct BodyArgs {
    /// Post body (markdown)
    #[arg(long, conflicts_with = "file")]
    content: Option<String>,

    /// Read the post body from a file
    #[arg(long)]
    file: Option<PathBuf>,
}

impl BodyArgs {
    fn read(&self) -> Result<Option<String>> {
        match (&self.content, &self.file) {
            (Some(content), _) => Ok(Some(content.clone())),
            (None, Some(path)) => std::fs::read_to_string(path)
                .map(Some)
                .with_context(|| format!("Failed to read post body from {}", path.display())),
            (None, None) => Ok(None),
        }
    }
}

#[derive(Subcommand)]
enum CommentCommand {
    /// Comment on a post, or reply to a comment
    Add {
        post_id: String,
        content: String,

        /// Id of the top-level comment to reply to
        #[arg(long)]
        reply_to: Option<String>,
    },

    /// Show a post's comment threads
    List { post_id: String },

    /// Delete a comment (author or admin)
    Delete { comment_id: String },
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// Show the current settings
    Show,

    /// Change settings (admin). Unspecified fields keep their value.
    Set {
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        github: Option<String>,
        #[arg(long)]
        linkedin: Option<String>,
        #[arg(long)]
        facebook: Option<String>,
        /// Replace the topic list (repeatable)
        #[arg(long = "topic")]
        topics: Vec<String>,
    },
}

#[derive(Subcommand)]
enum ProfileCommand {
    /// Create or update a user's profile
    Set {
        id: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        email: Option<String>,

        /// reader or admin
        #[arg(long, default_value = "reader")]
        role: String,

        /// Set (or replace) the web login password
        #[arg(long)]
        password: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("quantblog=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    if let Commands::Init = cli.command {
        info!("Initializing quantblog database...");
        let store = init_database(&config).await?;
        let table_count = store.table_count().await?;
        println!("Database initialized at: {}", display_db(&config));
        println!("Tables created: {table_count}");
        println!("\nquantblog is ready. Next steps:");
        println!("  quantblog profile set admin --name \"Tên của bạn\" --role admin");
        println!("  quantblog --user admin post create --title ... --file bai-viet.md");
        return Ok(());
    }

    let store = open_database(&config).await?;
    let storage = open_local_storage(&config);
    let engagement = Engagement::new(store.clone(), storage.clone());

    // Stale markers only accumulate between runs; sweep them once per start.
    let removed = engagement.gc.cleanup(Utc::now());
    if removed > 0 {
        info!(removed, "Removed stale view markers");
    }

    let auth = StaticAuth::new(cli.user.clone());
    let identity = engagement.session.resolve(&auth).await;
    let actor = Actor::resolve(store.as_ref(), identity).await;

    match cli.command {
        Commands::Init => {}

        Commands::Status => {
            quantblog::status::show(&store, &display_db(&config), storage.as_ref(), &config.storage_path)
                .await?;
        }

        Commands::Gc => {
            // Start-up already swept; report what it did.
            println!("Removed {removed} stale view marker(s)");
        }

        Commands::Post(cmd) => run_post_command(cmd, &store, &actor).await?,

        Commands::View { post_id } => {
            let outcome = engagement
                .views
                .record_view(&post_id, &actor.identity)
                .await;
            terminal::display_view_outcome(&outcome);
        }

        Commands::Like { post_id } => {
            let liked = engagement.likes.toggle_like(&post_id, &actor.identity).await;
            if liked {
                println!("  {} Liked", "♥".red());
            } else if engagement
                .likes
                .check_like_status(&post_id, &actor.identity)
                .await
            {
                println!("  {} Like could not be removed", "!".red());
            } else {
                println!("  Not liked");
            }
            if let Some(counts) = engagement.likes.engagement(&post_id).await {
                terminal::display_counts(&counts);
            }
        }

        Commands::LikeStatus { post_id } => {
            let liked = engagement
                .likes
                .check_like_status(&post_id, &actor.identity)
                .await;
            println!("{}", if liked { "liked" } else { "not liked" });
        }

        Commands::Share { post_id } => {
            if engagement
                .likes
                .record_share(&post_id, &actor.identity)
                .await
            {
                println!("  {} Share recorded", "✓".green());
            } else {
                println!("  {} Share not recorded", "!".red());
            }
            if let Some(counts) = engagement.likes.engagement(&post_id).await {
                terminal::display_counts(&counts);
            }
        }

        Commands::Comment(cmd) => match cmd {
            CommentCommand::Add {
                post_id,
                content,
                reply_to,
            } => {
                let comment = engagement
                    .comments
                    .add(&post_id, &actor, &content, reply_to.as_deref())
                    .await?;
                println!("  {} Comment {} added", "✓".green(), comment.id);
            }
            CommentCommand::List { post_id } => {
                let threads = engagement.comments.threads(&post_id).await;
                terminal::display_threads(&threads);
            }
            CommentCommand::Delete { comment_id } => {
                if engagement.comments.remove(&comment_id, &actor).await? {
                    println!("  {} Comment deleted", "✓".green());
                } else {
                    println!("  Comment {comment_id} not found");
                }
            }
        },

        Commands::Settings(cmd) => match cmd {
            SettingsCommand::Show => {
                terminal::display_settings(&blog::load_settings(&store).await);
            }
            SettingsCommand::Set {
                title,
                description,
                bio,
                email,
                github,
                linkedin,
                facebook,
                topics,
            } => {
                let current = blog::load_settings(&store).await;
                let updated = BlogSettings {
                    title: title.unwrap_or(current.title),
                    description: description.unwrap_or(current.description),
                    author_bio: bio.unwrap_or(current.author_bio),
                    contact_email: email.or(current.contact_email),
                    github_url: github.or(current.github_url),
                    linkedin_url: linkedin.or(current.linkedin_url),
                    facebook_url: facebook.or(current.facebook_url),
                    topics: if topics.is_empty() {
                        current.topics
                    } else {
                        topics
                    },
                    updated_at: current.updated_at,
                };
                let saved = blog::save_settings(&store, &actor, updated).await?;
                terminal::display_settings(&saved);
            }
        },

        Commands::Profile(ProfileCommand::Set {
            id,
            name,
            email,
            role,
            password,
        }) => {
            let created_at = store
                .get_profile(&id)
                .await?
                .map(|p| p.created_at)
                .unwrap_or_else(Utc::now);
            let profile = Profile {
                id: id.clone(),
                email,
                display_name: name,
                role: Role::parse(&role),
                created_at,
            };
            store.upsert_profile(&profile).await?;
            if let Some(password) = password {
                accounts::set_password(store.as_ref(), &id, &password).await?;
            }
            println!(
                "  {} Profile {} saved ({})",
                "✓".green(),
                id,
                profile.role
            );
        }

        Commands::Reconcile { post_id } => {
            if !actor.is_admin() {
                return Err(BlogError::forbidden("only admins can reconcile counters").into());
            }
            match post_id {
                Some(post_id) => match analytics::reconcile_counters(&store, &post_id).await? {
                    Some((before, after)) if before == after => {
                        println!("  Counters already consistent");
                        terminal::display_counts(&after);
                    }
                    Some((before, after)) => {
                        println!("  Before:");
                        terminal::display_counts(&before);
                        println!("  After:");
                        terminal::display_counts(&after);
                    }
                    None => println!("  Post {post_id} not found"),
                },
                None => {
                    let drifted = analytics::reconcile_all(&store).await?;
                    println!("  Reconciled counters; {drifted} post(s) had drifted");
                }
            }
        }

        #[cfg(feature = "web")]
        Commands::Serve { port, bind } => {
            config.require_web()?;
            quantblog::web::run_server(config, store, port, &bind).await?;
        }
    }

    Ok(())
}

async fn run_post_command(
    cmd: PostCommand,
    store: &Arc<dyn ContentStore>,
    actor: &Actor,
) -> Result<()> {
    let posts = PostAdmin::new(store.clone());

    match cmd {
        PostCommand::Create {
            title,
            body,
            author,
            tags,
            excerpt,
            read_time,
            image_url,
            hidden,
        } => {
            let content = body
                .read()?
                .ok_or_else(|| anyhow::anyhow!("Provide the post body with --content or --file"))?;
            let post = posts
                .create(
                    actor,
                    NewPost {
                        title,
                        content,
                        excerpt,
                        author,
                        tags,
                        read_time,
                        image_url,
                        is_hidden: hidden,
                    },
                )
                .await?;
            println!("  {} Post created: {}", "✓".green(), post.id);
        }

        PostCommand::List { all } => {
            if all && !actor.is_admin() {
                warn!("--all needs an admin user; showing visible posts only");
            }
            terminal::display_post_list(&posts.list(actor).await?);
        }

        PostCommand::Show { id } => {
            terminal::display_post_detail(&posts.get_visible(&id, actor).await?);
        }

        PostCommand::Update {
            id,
            title,
            body,
            author,
            tags,
            excerpt,
            read_time,
            image_url,
            clear_image,
        } => {
            let patch = PostPatch {
                title,
                content: body.read()?,
                excerpt,
                author,
                tags: (!tags.is_empty()).then_some(tags),
                read_time,
                image_url: if clear_image {
                    Some(None)
                } else {
                    image_url.map(Some)
                },
            };
            let post = posts.update(actor, &id, patch).await?;
            println!("  {} Post {} updated", "✓".green(), post.id);
        }

        PostCommand::Hide { id } => {
            posts.set_hidden(actor, &id, true).await?;
            println!("  {} Post {id} hidden", "✓".green());
        }

        PostCommand::Unhide { id } => {
            posts.set_hidden(actor, &id, false).await?;
            println!("  {} Post {id} visible", "✓".green());
        }

        PostCommand::Delete { id } => {
            posts.delete(actor, &id).await?;
            println!("  {} Post {id} deleted", "✓".green());
        }
    }

    Ok(())
}

/// Open the local storage file; fall back to a throwaway in-memory store
/// so engagement commands still work on a read-only home directory.
fn open_local_storage(config: &Config) -> Arc<dyn KeyValueStore> {
    match FileStorage::open(&config.storage_path) {
        Ok(storage) => Arc::new(storage),
        Err(e) => {
            warn!(error = %e, "Local storage unavailable, session will not persist");
            Arc::new(MemoryStorage::new())
        }
    }
}

/// Display-friendly store identifier. For PostgreSQL, redact the password
/// from the connection URL before printing it.
fn display_db(config: &Config) -> String {
    match config.postgres_url() {
        Some(url) => match url.find('@') {
            Some(at) => {
                let scheme_end = url.find("://").map(|i| i + 3).unwrap_or(0);
                format!("{}****@{}", &url[..scheme_end], &url[at + 1..])
            }
            None => url.to_string(),
        },
        None => config.db_path.clone(),
    }
}

async fn open_database(config: &Config) -> Result<Arc<dyn ContentStore>> {
    if let Some(url) = config.postgres_url() {
        #[cfg(feature = "postgres")]
        {
            info!("Using PostgreSQL backend");
            return quantblog::db::connect_postgres(url).await;
        }
        #[cfg(not(feature = "postgres"))]
        anyhow::bail!(
            "DATABASE_URL points to PostgreSQL ({url}) but the 'postgres' feature is not compiled in.\n\
             Rebuild with: cargo build --features postgres"
        );
    }
    #[cfg(feature = "sqlite")]
    {
        quantblog::db::connect_sqlite(&config.db_path)
    }
    #[cfg(not(feature = "sqlite"))]
    anyhow::bail!("No database backend compiled in. Set DATABASE_URL or enable the 'sqlite' feature.")
}

async fn init_database(config: &Config) -> Result<Arc<dyn ContentStore>> {
    if let Some(url) = config.postgres_url() {
        #[cfg(feature = "postgres")]
        {
            info!("Using PostgreSQL backend");
            return quantblog::db::connect_postgres(url).await;
        }
        #[cfg(not(feature = "postgres"))]
        anyhow::bail!(
            "DATABASE_URL points to PostgreSQL ({url}) but the 'postgres' feature is not compiled in.\n\
             Rebuild with: cargo build --features postgres"
        );
    }
    #[cfg(feature = "sqlite")]
    {
        quantblog::db::initialize_sqlite(&config.db_path)
    }
    #[cfg(not(feature = "sqlite"))]
    anyhow::bail!("No database backend compiled in. Set DATABASE_URL or enable the 'sqlite' feature.")
}
