use std::{
    path::Path,
    sync::{Arc, RwLock},
};

use anyhow::bail;
use clap::Parser;
use inquire::error::InquireResult;
use tracing_subscriber::EnvFilter;

mod app;
mod cli;
mod config;
mod posts;
mod semantic;
mod storage;
#[cfg(test)]
mod tests;
mod web;

use config::Config;
use posts::{PostCreate, PostUpdate};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = cli::Args::parse();

    let data_dir = Path::new(&args.data_dir);
    let config = Arc::new(RwLock::new(Config::load_with(data_dir)?));
    let app_mgr = app::App::new(config.clone(), data_dir)?;

    match args.command {
        cli::Command::Daemon {} => {
            web::start_daemon(app_mgr);
            Ok(())
        }

        cli::Command::Search { query } => {
            let posts = app_mgr.search(query.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&posts)?);
            Ok(())
        }

        cli::Command::Add {
            title,
            content,
            author,
            slug,
        } => {
            let post = app_mgr.create(PostCreate {
                title,
                content,
                author,
                slug,
            })?;
            println!("{}", serde_json::to_string_pretty(&post)?);
            Ok(())
        }

        cli::Command::Update {
            id,
            title,
            content,
            author,
            slug,
        } => {
            let post = app_mgr.update(
                id,
                PostUpdate {
                    title,
                    content,
                    author,
                    slug,
                },
            )?;
            println!("{}", serde_json::to_string_pretty(&post)?);
            Ok(())
        }

        cli::Command::Delete { id, yes } => {
            if !yes {
                let post = app_mgr.find(id)?;
                match inquire::prompt_confirmation(format!(
                    "Are you sure you want to delete post #{id} \"{}\"?",
                    post.title
                )) {
                    InquireResult::Ok(true) => {}
                    InquireResult::Ok(false) => return Ok(()),
                    InquireResult::Err(err) => bail!("An error occurred: {}", err),
                }
            }

            app_mgr.delete(id)?;
            println!("post #{id} removed");
            Ok(())
        }

        cli::Command::Sync {} => {
            let report = app_mgr.sync_embeddings()?;
            println!(
                "generated embeddings for {} of {} posts",
                report.succeeded, report.attempted
            );
            Ok(())
        }
    }
}
