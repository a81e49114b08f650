// # dhcpv6pd-emit-notification
//
// Sends one prefix notification to a running dhcpv6pd. Meant to be called
// from DHCPv6 client hooks:
//
// ```bash
// dhcpv6pd-emit-notification --notif prefix-assigned --interface eth0 --prefix 2001:db8:1::/56
// ```

use anyhow::Result;
use clap::{Parser, ValueEnum};
use dhcpv6pd_core::traits::{Emitter, emit_prefix_assigned, emit_prefix_removed};
use dhcpv6pd_linux::{DEFAULT_SOCKET_PATH, UnixSocketEmitter};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "dhcpv6pd-emit-notification")]
#[command(author, version, about = "Send a prefix delegation notification to dhcpv6pd", long_about = None)]
struct Args {
    /// Notification to send
    #[arg(long, value_enum)]
    notif: NotificationKind,

    /// Interface the prefix was delegated on
    #[arg(long)]
    interface: String,

    /// Delegated prefix in CIDR form
    #[arg(long)]
    prefix: String,

    /// Notification socket of the daemon
    #[arg(long, default_value = DEFAULT_SOCKET_PATH)]
    socket: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum NotificationKind {
    PrefixAssigned,
    PrefixRemoved,
}

async fn emit(args: &Args) -> Result<()> {
    let emitter: &dyn Emitter = &UnixSocketEmitter::new(&args.socket);
    match args.notif {
        NotificationKind::PrefixAssigned => {
            emit_prefix_assigned(emitter, &args.interface, &args.prefix).await?
        }
        NotificationKind::PrefixRemoved => {
            emit_prefix_removed(emitter, &args.interface, &args.prefix).await?
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    match emit(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("failed to send {:?}: {:#}", args.notif, e);
            ExitCode::FAILURE
        }
    }
}
