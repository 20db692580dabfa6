mod app;
mod backup;
mod cli;
mod config;
mod error;
mod game;
mod index;
mod links;
mod manifest;
mod modlist;
mod names;
mod notes;
mod profile;
mod resolver;
mod steam;
mod workshop_id;

use anyhow::Result;

fn main() -> Result<()> {
    cli::run()
}
