use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Directory holding posts.csv, config.yaml and the model cache
    #[clap(short, long, default_value = ".")]
    pub data_dir: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start blogd as a service.
    Daemon {},

    /// Search posts. Without a query, lists every post newest-first.
    Search {
        /// Free-text query ranked by semantic similarity
        query: Option<String>,
    },

    /// Add a post
    Add {
        /// Post title
        #[clap(short, long)]
        title: String,

        /// Post body
        #[clap(short, long)]
        content: String,

        /// Post author
        #[clap(short, long)]
        author: Option<String>,

        /// Url slug (derived from the title when omitted)
        #[clap(short, long)]
        slug: Option<String>,
    },

    /// Update a post
    Update {
        /// Post id
        id: u64,

        /// Post title
        #[clap(short, long)]
        title: Option<String>,

        /// Post body
        #[clap(short, long)]
        content: Option<String>,

        /// Post author
        #[clap(short, long)]
        author: Option<String>,

        /// Url slug
        #[clap(short, long)]
        slug: Option<String>,
    },

    /// Delete a post
    Delete {
        /// Post id
        id: u64,

        /// Auto confirm
        #[clap(short, long, default_value = "false")]
        yes: bool,
    },

    /// Generate embeddings for every post
    Sync {},
}
