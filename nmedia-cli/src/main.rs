use anyhow::Context;
use chrono::{TimeZone, Utc};
use clap::Parser;
use log::info;
use nmedia_db::{MemoryRepository, Op};
use nmedia_feed::{Clock, FeedConfig, FeedEvent, FeedSnapshot, FeedViewModel, SystemClock};
use nmedia_msg::{FeedItem, Identity, Post};
use nmedia_ref::{PostId, UserId};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::{sync::watch, time::timeout};
use tracing_subscriber::EnvFilter;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "nmedia")]
#[command(about = "Walk through the NMedia feed over sample posts", long_about = None)]
struct Cli {
    /// Config file, defaults to ~/.nmedia/config.json
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Posts per page
    #[arg(long, default_value = "3")]
    page_size: usize,

    /// User to sign in as
    #[arg(long, default_value = "1")]
    viewer: i64,

    /// User to switch to afterwards
    #[arg(long, default_value = "2")]
    switch_to: i64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref()).await?;

    let now = SystemClock.now_seconds();
    let repository = MemoryRepository::new(cli.page_size)
        .with_posts(sample_posts(now, UserId(cli.viewer), UserId(cli.switch_to)))
        .with_author(UserId(cli.viewer), "You");

    let identity = watch::Sender::new(Identity::signed_in(cli.viewer, "demo-token"));
    let view_model = FeedViewModel::new(
        Arc::new(repository.clone()),
        identity.subscribe(),
        config,
        Arc::new(SystemClock),
    );
    let mut events = view_model
        .take_events()
        .context("Failed to take feed events")?;

    let snapshot = read_all(&view_model).await?;
    println!("Feed for user {}:", cli.viewer);
    print_feed(&snapshot);
    let fetched = repository.calls(Op::Page);

    identity.send_replace(Identity::signed_in(cli.switch_to, "demo-token-2"));
    let switched = UserId(cli.switch_to);
    let snapshot = wait_feed(&view_model, |s| s.viewer == Some(switched)).await?;
    println!("\nFeed for user {}:", cli.switch_to);
    print_feed(&snapshot);
    println!(
        "pages fetched: {} before switch, {} after",
        fetched,
        repository.calls(Op::Page)
    );

    let greeting = "Hello from the command line";
    view_model.update_content(&format!("  {}  ", greeting));
    view_model.save();
    println!(
        "\ndraft after save: {:?}",
        view_model.draft().borrow().post.content
    );
    match timeout(WAIT, events.recv()).await {
        Ok(Some(event)) => println!("event: {}", describe(&event)),
        Ok(None) => println!("event stream closed"),
        Err(_) => println!("no event within {:?}", WAIT),
    }
    wait_feed(&view_model, |s| s.posts().any(|post| post.content == greeting)).await?;

    let first = snapshot.posts().next().map(|post| post.id);
    if let Some(id) = first {
        match view_model.like_by_id(id).await {
            Ok(post) => println!("liked post {}, now {} likes", post.id, post.likes),
            Err(error) => println!("{}", error),
        }
    }
    let last = snapshot.posts().last().map(|post| post.id);
    if let Some(id) = last {
        match view_model.remove_by_id(id).await {
            Ok(()) => println!("removed post {}", id),
            Err(error) => println!("{}", error),
        }
    }
    // already gone, reported as an event too
    if let Some(id) = last {
        if let Err(error) = view_model.remove_by_id(id).await {
            println!("{}", error);
        }
    }

    read_all(&view_model).await?;
    let snapshot = wait_feed(&view_model, |s| {
        s.end_of_feed && last.map_or(true, |id| s.posts().all(|post| post.id != id))
    })
    .await?;
    println!("\nFeed after changes:");
    print_feed(&snapshot);

    while let Ok(event) = events.try_recv() {
        println!("event: {}", describe(&event));
    }
    println!("status: {:?}", *view_model.status().borrow());

    info!("Done!");
    Ok(())
}

async fn load_config(path: Option<&PathBuf>) -> anyhow::Result<FeedConfig> {
    if let Some(path) = path {
        return FeedConfig::load(path)
            .await
            .with_context(|| format!("Failed to load config from {:?}", path));
    }
    match simple_home_dir::home_dir() {
        Some(home) => {
            let path = home.join(".nmedia").join("config.json");
            FeedConfig::load_or_default(&path)
                .await
                .with_context(|| format!("Failed to load config from {:?}", path))
        }
        None => Ok(FeedConfig::default()),
    }
}

fn sample_posts(now: i64, viewer: UserId, other: UserId) -> Vec<Post> {
    let hour = 60 * 60;
    let day = 24 * hour;
    [
        (8, viewer, "You", "Just shipped the new feed", 10 * 60),
        (7, other, "Netology", "Webinar starts in an hour", 3 * hour),
        (6, UserId(100), "Student", "Homework is in", 20 * hour),
        (5, other, "Netology", "Yesterday's recording is up", day + 2 * hour),
        (4, viewer, "You", "Trying out coroutines", day + 6 * hour),
        (3, UserId(100), "Student", "Anyone up for a study group?", 3 * day),
        (2, other, "Netology", "Welcome to the course", 8 * day),
        (1, viewer, "You", "First post", 30 * day),
    ]
    .into_iter()
    .map(|(id, author_id, author, content, age)| Post {
        id: PostId(id),
        content: content.to_string(),
        author_id,
        author: author.to_string(),
        published: now - age,
        ..Post::empty()
    })
    .collect()
}

async fn wait_feed(
    view_model: &FeedViewModel,
    f: impl FnMut(&FeedSnapshot) -> bool,
) -> anyhow::Result<FeedSnapshot> {
    let mut feed = view_model.feed();
    let snapshot = timeout(WAIT, feed.wait_for(f))
        .await
        .context("Timed out waiting for feed")??
        .clone();
    Ok(snapshot)
}

/// Pages through to the end of the feed.
async fn read_all(view_model: &FeedViewModel) -> anyhow::Result<FeedSnapshot> {
    let mut feed = view_model.feed();
    loop {
        let snapshot = feed.borrow_and_update().clone();
        if snapshot.end_of_feed {
            return Ok(snapshot);
        }
        if wants_more(&snapshot) {
            view_model.load_more();
        }
        timeout(WAIT, feed.changed())
            .await
            .context("Timed out waiting for feed")??;
    }
}

/// A page can be asked for once the first one arrived, or again after a
/// failed fetch.
fn wants_more(snapshot: &FeedSnapshot) -> bool {
    !snapshot.end_of_feed && (!snapshot.items.is_empty() || snapshot.error.is_some())
}

fn print_feed(snapshot: &FeedSnapshot) {
    for item in snapshot.items.iter() {
        match item {
            FeedItem::Separator(separator) => println!("-- {} --", separator.label),
            FeedItem::Post(post) => {
                let published = Utc
                    .timestamp_opt(post.published, 0)
                    .single()
                    .map(|time| time.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                println!(
                    "  [{}] {} ({}){} {} likes{}",
                    post.id,
                    post.author,
                    published,
                    if post.owned_by_me { " *mine*" } else { "" },
                    post.likes,
                    if post.liked_by_me { ", liked" } else { "" },
                );
                println!("      {}", post.content);
            }
        }
    }
    if let Some(error) = &snapshot.error {
        println!("  (page error: {})", error);
    }
}

fn describe(event: &FeedEvent) -> String {
    match event {
        FeedEvent::PostSaved(post) => format!("saved post {}: {:?}", post.id, post.content),
        FeedEvent::SaveFailed(error) => error.to_string(),
        FeedEvent::MutationFailed(error) => error.to_string(),
    }
}
