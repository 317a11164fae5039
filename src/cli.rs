use clap::Parser;

/// Serve a directory with content hash ETags
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE", default_value = "./config.toml")]
    pub config: String,
    /// Overrides `log_level` from the config file
    #[arg(short, long, value_name = "FILTER")]
    pub log_level: Option<String>,
}
