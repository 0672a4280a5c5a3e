use std::sync::Arc;

use clap::Parser;
use ksi_threads::{
    ClientConfig, ConfigError, FetchError, HttpThreadFetcher, PostDialogOutcome, PostId, ResponsiveDepthPolicy,
    ThreadHub, ThreadId, ThreadSnapshot, ThreadViewModel, Viewport,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("backend client failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("stdin read failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "ksi-threads", about = "Watch a KSI discussion thread from the terminal")]
struct Cli {
    /// Thread to display.
    thread_id: u64,

    /// Show only the replies under this post.
    #[arg(long)]
    root_post: Option<u64>,

    /// Viewport width in CSS pixels, drives the reply nesting depth.
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// REST API root; wins over the rest of the env config.
    #[arg(long, env = "KSI_API_BASE_URL")]
    base_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url)?;
    }

    let hub = ThreadHub::new(Arc::new(HttpThreadFetcher::new(&config)?));
    let view = hub.view(ThreadId(cli.thread_id));
    let policy = Arc::new(ResponsiveDepthPolicy::new());
    policy.set_viewport(Viewport { width: cli.width });

    tracing::info!(thread_id = cli.thread_id, base_url = %config.base_url, "watching thread");
    let renderer = tokio::spawn(render_loop(Arc::clone(&view), Arc::clone(&policy), cli.root_post.map(PostId)));

    eprintln!("commands: r = refresh, p = post created, m = posts modified, w <px> = resize, q = quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let mut words = line.split_whitespace();
        match (words.next(), words.next()) {
            (Some("r"), _) => view.trigger_refresh(),
            (Some("p"), _) => view.on_post_dialog_closed(PostDialogOutcome::Replied),
            (Some("m"), _) => view.on_posts_modified(),
            (Some("w"), Some(px)) => match px.parse() {
                Ok(width) => policy.set_viewport(Viewport { width }),
                Err(_) => eprintln!("not a width: {px}"),
            },
            (Some("q"), _) => break,
            (None, _) => {}
            (Some(other), _) => eprintln!("unknown command: {other}"),
        }
    }

    renderer.abort();
    let _ = renderer.await;
    drop(view);
    hub.release(ThreadId(cli.thread_id));
    Ok(())
}

async fn render_loop(view: Arc<ThreadViewModel>, policy: Arc<ResponsiveDepthPolicy>, root_post: Option<PostId>) {
    let mut snapshots = view.observe();
    let mut depths = policy.subscribe();
    let mut depth = policy.current();
    let mut latest: Option<Arc<ThreadSnapshot>> = None;

    loop {
        tokio::select! {
            event = snapshots.next() => match event {
                Some(Ok(snapshot)) => latest = Some(snapshot),
                Some(Err(e)) => {
                    eprintln!("could not load thread: {e}");
                    continue;
                }
                None => break,
            },
            next = depths.next() => match next {
                Some(d) if d == depth && latest.is_some() => continue,
                Some(d) => depth = d,
                None => break,
            },
        }
        if let Some(snapshot) = &latest {
            render(snapshot, root_post, depth);
        }
    }
}

fn render(snapshot: &ThreadSnapshot, root_post: Option<PostId>, depth: u8) {
    let title = snapshot.thread.title.as_deref().unwrap_or("(untitled)");
    println!("== thread {} · {title} · {} posts · depth {depth}", snapshot.thread.id, snapshot.posts.len());
    for entry in snapshot.layout(root_post, depth) {
        let Some(post) = snapshot.posts.get(entry.post) else {
            continue;
        };
        let indent = "  ".repeat(usize::from(entry.depth));
        println!("{indent}#{} user {} at {}: {}", post.id, post.author, post.published_at, post.body);
    }
}
