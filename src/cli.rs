// src/cli.rs
// =============================================================================
// Command-line interface, built with clap's derive API.
// =============================================================================

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "sitepack",
    version,
    about = "Snapshot a web page and its resources into a self-contained zip",
    long_about = "sitepack fetches a page, downloads the stylesheets, scripts, images \
                  and other resources it references, rewrites the document to point at \
                  the local copies, and packs everything into a single zip archive."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Snapshot a page into a zip archive
    ///
    /// Example: sitepack snap https://example.com --output ./out
    Snap {
        /// Page URL to snapshot (https is assumed when no scheme is given)
        url: String,

        /// Print the receipt as JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Directory to write the zip into (default: current directory)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}
