/*
 * This file is part of uboot-bootcount.
 *
 * Copyright (C) 2025 uboot-bootcount contributors
 *
 * uboot-bootcount is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * uboot-bootcount is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with uboot-bootcount. If not, see <https://www.gnu.org/licenses/>.
 */

use anyhow::Context;
use bootcount::config::{config_path, load_config};
use bootcount::logger;
use bootcount::{BootcountError, Platform};
use serde_json::json;
use tracing::{debug, warn};

/// Value that makes U-Boot run `altbootcmd` on the next boot.
const FORCE_VALUE: u16 = u16::MAX - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Read,
    Write(u16),
    Identify,
}

fn usage(prog: &str) {
    eprintln!("Usage: {} [-d] [--logging] [-r | -f | -s <value> | -i]", prog);
    eprintln!("  (no option)  print the current bootcount");
    eprintln!("  -r           reset the bootcount to 0");
    eprintln!("  -f           force altbootcmd on next boot (bootcount {})", FORCE_VALUE);
    eprintln!("  -s <value>   set the bootcount to <value>");
    eprintln!("  -i           print the detected storage backend");
    eprintln!("  -d           debug output on stderr");
    eprintln!("  --logging    append JSON events to the event log");
}

/// Parse everything after the program name. `None` means print usage.
fn parse_args(args: &[String]) -> Option<(Command, bool, bool)> {
    let mut command = None;
    let mut debug = false;
    let mut logging = false;
    let mut it = args.iter();
    while let Some(arg) = it.next() {
        let next = match arg.as_str() {
            "-d" | "--debug" => {
                debug = true;
                continue;
            }
            "--logging" => {
                logging = true;
                continue;
            }
            "-r" => Command::Write(0),
            "-f" => Command::Write(FORCE_VALUE),
            "-i" => Command::Identify,
            "-s" => Command::Write(it.next()?.parse::<u16>().ok()?),
            _ => return None,
        };
        // Only one action per invocation.
        if command.replace(next).is_some() {
            return None;
        }
    }
    Some((command.unwrap_or(Command::Read), debug, logging))
}

fn run(command: Command) -> anyhow::Result<()> {
    let path = config_path();
    let config = load_config().with_context(|| format!("loading {}", path.display()))?;
    debug!("configuration from {}", path.display());
    let mut platform = Platform::new(config);

    let name = platform.detect()?.name();
    logger::log_event("detect", json!({ "backend": name }));

    match command {
        Command::Identify => {
            println!("{}", name);
        }
        Command::Read => {
            let value = platform.read()?;
            logger::log_event("read", json!({ "value": value }));
            println!("{}", value);
        }
        Command::Write(value) => {
            platform
                .write(value)
                .with_context(|| format!("setting bootcount on {}", name))?;
            logger::log_event("write", json!({ "value": value }));
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let prog = args.first().map(String::as_str).unwrap_or("bootcount");

    let (command, debug, logging) = match parse_args(args.get(1..).unwrap_or(&[])) {
        Some(parsed) => parsed,
        None => {
            usage(prog);
            std::process::exit(64);
        }
    };

    logger::init_tracing(debug);
    if logging {
        logger::init_event_log();
        logger::log_event("startup", json!({ "args": args }));
    }

    // /dev/mem needs root; the sysfs backends may not.
    if unsafe { libc::geteuid() } != 0 {
        warn!("not running as root, register backends will fail");
    }

    let result = run(command);
    if let Err(e) = &result {
        let kind = e.downcast_ref::<BootcountError>().map(|b| format!("{:?}", b.kind()));
        logger::log_event("error", json!({ "kind": kind, "message": format!("{:#}", e) }));
    }
    logger::shutdown_event_log();

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        let code = e.downcast_ref::<BootcountError>().map_or(1, BootcountError::exit_code);
        std::process::exit(code);
    }
    Ok(())
}
