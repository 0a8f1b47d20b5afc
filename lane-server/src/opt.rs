use std::path::PathBuf;

use clap::Parser;

#[derive(Clone, Debug, Parser)]
#[command(name = "lane-server", about = "Secretlane workspaces service")]
pub struct Opt {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,
}
