//! layer-session: interactive Telegram session string generator.
//!
//! Walks through api_id / api_hash entry, phone number, login code and
//! (if enabled) the 2FA password, then prints a string session that other
//! tools can load without logging in again.
//!
//! ```text
//! cargo run -p layer-session
//! cargo run -p layer-session -- --api-id 12345 --api-hash <hash> --phone +447712345678
//! ```
//!
//! Logging: `-v` shows the client's progress, `-vv` everything.
//! `RUST_LOG` overrides both.

mod console;
mod credentials;
mod delivery;
mod flow;
mod remedy;

use clap::Parser;

use console::Console;

#[derive(Parser, Debug)]
#[command(name = "layer-session", version, about = "Generate a Telegram string session")]
pub struct Args {
    /// App api_id from https://my.telegram.org/apps
    #[arg(long, env = "TG_API_ID")]
    pub api_id: Option<String>,

    /// App api_hash from https://my.telegram.org/apps
    #[arg(long, env = "TG_API_HASH", hide_env_values = true)]
    pub api_hash: Option<String>,

    /// Phone number with + and country code
    #[arg(long, env = "TG_PHONE")]
    pub phone: Option<String>,

    /// Data centre to contact first (1-5)
    #[arg(long)]
    pub dc: Option<i32>,

    /// SOCKS5 proxy as host:port
    #[arg(long, value_name = "HOST:PORT")]
    pub socks5: Option<String>,

    #[arg(long, requires = "socks5")]
    pub socks5_user: Option<String>,

    #[arg(long, requires = "socks5_user")]
    pub socks5_pass: Option<String>,

    /// Accept IPv6 data-centre addresses
    #[arg(long)]
    pub ipv6: bool,

    /// Do not clear the screen
    #[arg(long)]
    pub no_clear: bool,

    /// Do not wait for Enter before exiting
    #[arg(long)]
    pub no_pause: bool,

    /// More log output (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let out = Console::new(!args.no_clear, !args.no_pause);
    let code = tokio::select! {
        code = run(&args, &out) => code,
        _ = tokio::signal::ctrl_c() => {
            out.cancelled();
            0
        }
    };
    std::process::exit(code);
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

async fn run(args: &Args, out: &Console) -> i32 {
    match flow::run(args, out).await {
        Ok(outcome) => {
            flow::print_result(out, &outcome);
            let _ = out.pause("Press Enter to exit…").await;
            0
        }
        Err(failure) => {
            out.fail(&failure);
            let _ = out.pause("Press Enter to exit…").await;
            1
        }
    }
}
