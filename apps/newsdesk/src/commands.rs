//! Subcommands and the page flows behind them. Every command drives the same
//! page objects a graphical front end would, then prints the resulting view
//! and the notifications the page produced.

use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    sync::Arc,
};

use anyhow::Result;
use clap::{Subcommand, ValueEnum};
use client_core::{
    pages::{HomePage, HomeView, PostDetailPage, PostDetailView, PostAddPage, SettingsPage, SettingsView},
    ActionOutcome, AppContext, ImageUpload, NewsdeskApi, Notification, NotificationKind,
};
use shared::domain::{ChannelId, PostId};
use tokio::sync::broadcast::{error::TryRecvError, Receiver};
use tracing::debug;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List posts, optionally refreshing until interrupted.
    List {
        #[arg(long)]
        watch: bool,
    },
    Show {
        id: i64,
    },
    Publish {
        id: i64,
        #[arg(long)]
        yes: bool,
    },
    Delete {
        id: i64,
        #[arg(long)]
        yes: bool,
    },
    Edit {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        link: Option<String>,
    },
    /// Ask the backend to regenerate one part of a post.
    Regen {
        id: i64,
        target: RegenTarget,
    },
    #[command(subcommand)]
    Photo(PhotoCommand),
    /// Create a post, optionally filling fields by generation first.
    Add {
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        text: String,
        #[arg(long)]
        link: Option<String>,
        #[arg(long)]
        image: Option<PathBuf>,
        #[arg(long)]
        gen_title: bool,
        #[arg(long)]
        gen_text: bool,
        #[arg(long)]
        gen_photo: bool,
    },
    #[command(subcommand)]
    Settings(SettingsCommand),
    #[command(subcommand)]
    Channels(ChannelsCommand),
    #[command(subcommand)]
    Parsing(ParsingCommand),
    #[command(subcommand)]
    Theme(ThemeCommand),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RegenTarget {
    Title,
    Text,
    Photo,
}

#[derive(Subcommand, Debug)]
pub enum PhotoCommand {
    Upload { id: i64, path: PathBuf },
    Delete { id: i64 },
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    Show,
    Set {
        #[arg(long)]
        prompt: Option<String>,
        #[arg(long)]
        prompt_title: Option<String>,
        #[arg(long)]
        prompt_text: Option<String>,
        #[arg(long)]
        prompt_img: Option<String>,
        #[arg(long)]
        count_news: Option<u32>,
        #[arg(long)]
        count_news_parsing: Option<u32>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ChannelsCommand {
    List,
    Add {
        url: String,
    },
    Remove {
        id: i64,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ParsingCommand {
    Status,
    On,
    Off,
    Site,
    Telegram,
}

#[derive(Subcommand, Debug)]
pub enum ThemeCommand {
    Show,
    Toggle,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::List { .. } => "list",
            Command::Show { .. } => "show",
            Command::Publish { .. } => "publish",
            Command::Delete { .. } => "delete",
            Command::Edit { .. } => "edit",
            Command::Regen { .. } => "regen",
            Command::Photo(_) => "photo",
            Command::Add { .. } => "add",
            Command::Settings(_) => "settings",
            Command::Channels(_) => "channels",
            Command::Parsing(_) => "parsing",
            Command::Theme(_) => "theme",
        }
    }
}

/// Tracks whether any action in the command failed.
#[derive(Default)]
struct Tally {
    failed: bool,
}

impl Tally {
    fn settle<T>(&mut self, outcome: ActionOutcome<T>, events: &mut Receiver<Notification>) -> Option<T> {
        print_notifications(events);
        if outcome.is_failed() {
            self.failed = true;
        }
        outcome.completed()
    }
}

/// Runs one command. `Ok(false)` means an action failed and was reported.
pub async fn execute(command: Command, ctx: &AppContext, api: Arc<dyn NewsdeskApi>) -> Result<bool> {
    let mut tally = Tally::default();
    match command {
        Command::List { watch } => list(ctx, api, watch, &mut tally).await?,
        Command::Show { id } => {
            detail(ctx, api, PostId(id), &mut tally).await;
        }
        Command::Publish { id, yes } => {
            confirm_from_list(ctx, api, PostId(id), false, yes, &mut tally).await?
        }
        Command::Delete { id, yes } => {
            confirm_from_list(ctx, api, PostId(id), true, yes, &mut tally).await?
        }
        Command::Edit {
            id,
            title,
            text,
            link,
        } => {
            if let Some(page) = detail(ctx, api, PostId(id), &mut tally).await {
                let mut events = page.notifications().subscribe();
                page.edit(|form| {
                    if let Some(title) = title {
                        form.title = title;
                    }
                    if let Some(text) = text {
                        form.text = text;
                    }
                    if let Some(link) = link {
                        form.link = link;
                    }
                });
                if tally.settle(page.save().await, &mut events).is_some() {
                    print_post(&page.snapshot());
                }
            }
        }
        Command::Regen { id, target } => {
            if let Some(page) = detail(ctx, api, PostId(id), &mut tally).await {
                let mut events = page.notifications().subscribe();
                let outcome = match target {
                    RegenTarget::Title => page.regenerate_title().await,
                    RegenTarget::Text => page.regenerate_text().await,
                    RegenTarget::Photo => page.regenerate_photo().await,
                };
                if tally.settle(outcome, &mut events).is_some() {
                    print_post(&page.snapshot());
                }
            }
        }
        Command::Photo(PhotoCommand::Upload { id, path }) => {
            let image = ImageUpload::from_path(&path).await?;
            if let Some(page) = detail(ctx, api, PostId(id), &mut tally).await {
                let mut events = page.notifications().subscribe();
                page.open_upload();
                tally.settle(page.upload_photo(image).await, &mut events);
            }
        }
        Command::Photo(PhotoCommand::Delete { id }) => {
            if let Some(page) = detail(ctx, api, PostId(id), &mut tally).await {
                let mut events = page.notifications().subscribe();
                tally.settle(page.delete_photo().await, &mut events);
            }
        }
        Command::Add {
            title,
            text,
            link,
            image,
            gen_title,
            gen_text,
            gen_photo,
        } => {
            let page = PostAddPage::new(api, ctx.config());
            let mut events = page.notifications().subscribe();
            page.edit(|draft| {
                draft.title = title;
                draft.text = text;
                draft.link = link.unwrap_or_default();
            });
            if let Some(path) = image {
                tally.settle(page.attach_image(&path).await, &mut events);
            }
            if gen_title {
                tally.settle(page.generate_title().await, &mut events);
            }
            if gen_text {
                tally.settle(page.generate_text().await, &mut events);
            }
            if gen_photo {
                tally.settle(page.generate_photo().await, &mut events);
            }
            if !tally.failed {
                tally.settle(page.save().await, &mut events);
                if let Some(id) = page.snapshot().created {
                    println!("created post {id}");
                }
            }
        }
        Command::Settings(command) => settings(ctx, api, command, &mut tally).await,
        Command::Channels(command) => channels(ctx, api, command, &mut tally).await?,
        Command::Parsing(command) => parsing(ctx, api, command, &mut tally).await,
        Command::Theme(ThemeCommand::Show) => println!("theme: {}", ctx.theme()),
        Command::Theme(ThemeCommand::Toggle) => println!("theme: {}", ctx.toggle_theme()?),
    }
    Ok(!tally.failed)
}

async fn list(ctx: &AppContext, api: Arc<dyn NewsdeskApi>, watch: bool, tally: &mut Tally) -> Result<()> {
    let page = HomePage::new(api, ctx.config());
    let mut events = page.notifications().subscribe();
    page.mount().await;
    print_notifications(&mut events);
    let mut shown = page.snapshot();
    print_list(&shown);
    if shown.error.is_some() {
        tally.failed = true;
    }

    if watch {
        let mut ticker = tokio::time::interval(ctx.config().poll_interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    break;
                }
                _ = ticker.tick() => {
                    let current = page.snapshot();
                    if current != shown {
                        print_list(&current);
                        shown = current;
                    }
                }
            }
        }
    }
    page.unmount();
    Ok(())
}

async fn detail(
    ctx: &AppContext,
    api: Arc<dyn NewsdeskApi>,
    id: PostId,
    tally: &mut Tally,
) -> Option<PostDetailPage> {
    let page = PostDetailPage::new(id, api, ctx.config());
    let mut events = page.notifications().subscribe();
    tally.settle(page.load().await, &mut events)?;
    print_post(&page.snapshot());
    Some(page)
}

async fn confirm_from_list(
    ctx: &AppContext,
    api: Arc<dyn NewsdeskApi>,
    id: PostId,
    delete: bool,
    yes: bool,
    tally: &mut Tally,
) -> Result<()> {
    let page = HomePage::new(api, ctx.config());
    let mut events = page.notifications().subscribe();
    let question = if delete {
        page.request_delete(id);
        format!("Delete post {id}? This cannot be undone.")
    } else {
        page.request_publish(id);
        format!("Publish post {id}?")
    };
    if !yes && !ask(&question)? {
        page.cancel_confirm();
        println!("canceled");
    }
    tally.settle(page.confirm().await, &mut events);
    Ok(())
}

async fn settings(ctx: &AppContext, api: Arc<dyn NewsdeskApi>, command: SettingsCommand, tally: &mut Tally) {
    let page = SettingsPage::new(api, ctx.config());
    let mut events = page.notifications().subscribe();
    if tally.settle(page.load().await, &mut events).is_none() {
        return;
    }
    match command {
        SettingsCommand::Show => {}
        SettingsCommand::Set {
            prompt,
            prompt_title,
            prompt_text,
            prompt_img,
            count_news,
            count_news_parsing,
        } => {
            page.edit(|settings| {
                if let Some(v) = prompt {
                    settings.prompt = v;
                }
                if let Some(v) = prompt_title {
                    settings.prompt_title = v;
                }
                if let Some(v) = prompt_text {
                    settings.prompt_text = v;
                }
                if let Some(v) = prompt_img {
                    settings.prompt_img = v;
                }
                if let Some(v) = count_news {
                    settings.count_news = v;
                }
                if let Some(v) = count_news_parsing {
                    settings.count_news_parsing = v;
                }
            });
            tally.settle(page.save_settings().await, &mut events);
        }
    }
    print_settings(&page.snapshot());
}

async fn channels(
    ctx: &AppContext,
    api: Arc<dyn NewsdeskApi>,
    command: ChannelsCommand,
    tally: &mut Tally,
) -> Result<()> {
    let page = SettingsPage::new(api, ctx.config());
    let mut events = page.notifications().subscribe();
    if tally.settle(page.load().await, &mut events).is_none() {
        return Ok(());
    }
    match command {
        ChannelsCommand::List => {}
        ChannelsCommand::Add { url } => {
            page.set_channel_input(url);
            tally.settle(page.add_channel().await, &mut events);
        }
        ChannelsCommand::Remove { id, yes } => {
            let id = ChannelId(id);
            page.request_remove_channel(id);
            if !yes && !ask(&format!("Remove channel {id}?"))? {
                page.cancel_remove_channel();
                println!("canceled");
            }
            tally.settle(page.confirm_remove_channel().await, &mut events);
        }
    }
    print_channels(&page.snapshot());
    Ok(())
}

async fn parsing(ctx: &AppContext, api: Arc<dyn NewsdeskApi>, command: ParsingCommand, tally: &mut Tally) {
    let page = SettingsPage::new(api, ctx.config());
    let mut events = page.notifications().subscribe();
    match command {
        ParsingCommand::Site => {
            tally.settle(page.parse_site().await, &mut events);
        }
        ParsingCommand::Telegram => {
            tally.settle(page.parse_telegram().await, &mut events);
        }
        ParsingCommand::Status | ParsingCommand::On | ParsingCommand::Off => {
            if tally.settle(page.load().await, &mut events).is_none() {
                return;
            }
            let wanted = match command {
                ParsingCommand::On => Some(true),
                ParsingCommand::Off => Some(false),
                _ => None,
            };
            let current = page.snapshot().auto_parsing;
            if wanted.is_some() && wanted != current {
                tally.settle(page.toggle_auto_parsing().await, &mut events);
            } else if wanted.is_some() {
                debug!(?wanted, "parsing: timer already in the requested state");
            }
            print_auto_parsing(page.snapshot().auto_parsing);
        }
    }
}

fn ask(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn print_notifications(events: &mut Receiver<Notification>) {
    loop {
        match events.try_recv() {
            Ok(notification) => {
                let tag = match notification.kind {
                    NotificationKind::Success => "ok",
                    NotificationKind::Error => "error",
                };
                println!("[{tag}] {}", notification.text);
            }
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => return,
        }
    }
}

fn print_list(view: &HomeView) {
    if let Some(error) = &view.error {
        println!("error: {error}");
        return;
    }
    if view.posts.is_empty() {
        println!("no posts");
        return;
    }
    for post in &view.posts {
        let image = if post.has_image() { "img" } else { "   " };
        println!("{:>6}  {:<12} {image}  {}", post.id, post.status, post.title);
    }
}

fn print_post(view: &PostDetailView) {
    let Some(post) = &view.post else {
        return;
    };
    println!("id:     {}", post.id);
    println!("status: {}", post.status);
    if let Some(published) = post.published_at() {
        println!("date:   {published}");
    }
    println!("title:  {}", view.form.title);
    if !view.form.link.is_empty() {
        println!("link:   {}", view.form.link);
    }
    if let Some(img) = &post.img_url {
        println!("image:  {img}");
    }
    println!();
    println!("{}", view.form.text);
}

fn print_settings(view: &SettingsView) {
    let settings = &view.settings;
    println!("prompt:             {}", settings.prompt);
    println!("prompt_title:       {}", settings.prompt_title);
    println!("prompt_text:        {}", settings.prompt_text);
    println!("prompt_img:         {}", settings.prompt_img);
    println!("count_news:         {}", settings.count_news);
    println!("count_news_parsing: {}", settings.count_news_parsing);
    print_auto_parsing(view.auto_parsing);
}

fn print_channels(view: &SettingsView) {
    if view.channels.is_empty() {
        println!("no channels");
    }
    for channel in &view.channels {
        println!("{:>6}  {}", channel.id, channel.url);
    }
}

fn print_auto_parsing(state: Option<bool>) {
    let label = match state {
        Some(true) => "on",
        Some(false) => "off",
        None => "unknown",
    };
    println!("auto-parsing: {label}");
}
