use clap::Parser;

#[derive(Parser)]
#[command(name = "bakery")]
#[command(author, version, about = "Manifest-manipulation gateway for adaptive streaming")]
pub struct Cli {
    /// Listen address, overriding HTTP_PORT
    #[arg(short, long)]
    pub listen: Option<String>,

    /// Log level, overriding LOG_LEVEL
    #[arg(long)]
    pub log_level: Option<String>,
}
