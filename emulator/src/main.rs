mod hardware;
mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::process;

use session::{Profile, Session};

const USAGE: &str = "Usage: relay-emulator [--provider <pins|mask|frame|light>] [--sync <independent|none-or-one|exactly-one|all-same>]";

fn main() -> io::Result<()> {
    let profile = parse_profile().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut session = Session::new(profile);
    let mut line = String::new();

    writeln!(
        writer,
        "Relay Controller Emulator ready. Type `help` for commands or `exit` to quit."
    )?;
    for response in session.start() {
        writeln!(writer, "{response}")?;
    }

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        for response in session.handle_command(trimmed) {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_profile() -> Result<Profile, String> {
    let mut profile = Profile::default();
    let mut args = env::args().skip(1);

    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
            None => (arg, None),
        };
        let value = match inline {
            Some(value) => value,
            None => args
                .next()
                .ok_or_else(|| format!("Expected value after {flag}"))?,
        };

        match flag.as_str() {
            "--provider" => profile.provider = Profile::provider_from_tag(&value)?,
            "--sync" => profile.sync = Profile::sync_from_tag(&value)?,
            _ => return Err(format!("Unknown argument `{flag}`")),
        }
    }

    Ok(profile)
}
