use crate::{api::UsersApi, view::UserManagementView};
use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::Write;
use std::path::PathBuf;

pub struct Context<A> {
    pub view: UserManagementView<A>,
    pub session_id: String,
    pub history_path: Option<PathBuf>,
}

/// Run each command in order, stopping early on /exit
pub fn run_batch<A: UsersApi>(
    ctx: &mut Context<A>,
    commands: &[String],
    out: &mut impl Write,
) -> Result<()> {
    for cmd in commands {
        if handle_command(ctx, cmd.trim(), out)? {
            break;
        }
    }
    Ok(())
}

pub fn run_repl<A: UsersApi>(mut ctx: Context<A>) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    if let Some(path) = &ctx.history_path {
        // Missing on first run
        let _ = rl.load_history(path);
    }
    let mut stdout = std::io::stdout();

    writeln!(stdout, "userdesk - type /help for commands, /exit to quit")?;
    write!(stdout, "{}", ctx.view.render())?;

    loop {
        match rl.readline("userdesk> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line)?;

                match handle_command(&mut ctx, line, &mut stdout) {
                    Ok(true) => break,
                    Ok(false) => {}
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Input error: {}", e);
                break;
            }
        }
    }

    if let Some(path) = &ctx.history_path {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = rl.save_history(path) {
            eprintln!("Warning: failed to save history: {}", e);
        }
    }

    Ok(())
}

/// Execute one shell command. Returns true when the shell should exit.
pub fn handle_command<A: UsersApi>(
    ctx: &mut Context<A>,
    line: &str,
    out: &mut impl Write,
) -> Result<bool> {
    if !line.starts_with('/') {
        writeln!(out, "Commands start with '/'. Type /help for a list.")?;
        return Ok(false);
    }

    let parts = match shell_words::split(line) {
        Ok(parts) => parts,
        Err(e) => {
            writeln!(out, "Invalid input: {}", e)?;
            return Ok(false);
        }
    };
    let Some((cmd, args)) = parts.split_first() else {
        return Ok(false);
    };

    match cmd.as_str() {
        "/exit" | "/quit" => return Ok(true),
        "/help" => print_help(out)?,
        "/show" => write!(out, "{}", ctx.view.render())?,
        "/refresh" => {
            ctx.view.fetch_users();
            write!(out, "{}", ctx.view.render())?;
        }
        "/name" => {
            ctx.view.set_name(&args.join(" "));
            writeln!(out, "Name: {}", ctx.view.form().name)?;
        }
        "/email" => {
            ctx.view.set_email(&args.join(" "));
            writeln!(out, "Email: {}", ctx.view.form().email)?;
        }
        "/submit" => {
            ctx.view.submit();
            write!(out, "{}", ctx.view.render())?;
        }
        "/edit" => {
            let Some(id) = parse_id(args, "/edit", out)? else {
                return Ok(false);
            };
            match ctx.view.find_user(id).cloned() {
                Some(user) => {
                    ctx.view.begin_edit(&user);
                    write!(out, "{}", ctx.view.render())?;
                }
                None => writeln!(out, "No user with id {}. Use /refresh to reload the list.", id)?,
            }
        }
        "/delete" => {
            let Some(id) = parse_id(args, "/delete", out)? else {
                return Ok(false);
            };
            if ctx.view.find_user(id).is_some() {
                ctx.view.delete_user(id);
                write!(out, "{}", ctx.view.render())?;
            } else {
                writeln!(out, "No user with id {}. Use /refresh to reload the list.", id)?;
            }
        }
        "/diagnostics" => {
            let diagnostics = ctx.view.diagnostics();
            if diagnostics.is_empty() {
                writeln!(out, "No diagnostics.")?;
            }
            for (i, d) in diagnostics.iter().enumerate() {
                writeln!(out, "  [{}] {}: {}", i, d.kind(), d)?;
            }
        }
        "/session" => {
            writeln!(out, "Session: {}", ctx.session_id)?;
            match ctx.view.transcript() {
                Some(t) => writeln!(out, "Transcript: {}", t.path.display())?,
                None => writeln!(out, "Transcript: disabled")?,
            }
        }
        _ => writeln!(out, "Unknown command: {}", cmd)?,
    }
    Ok(false)
}

fn parse_id(args: &[String], cmd: &str, out: &mut impl Write) -> Result<Option<i64>> {
    match args.first().map(|s| s.parse::<i64>()) {
        Some(Ok(id)) => Ok(Some(id)),
        Some(Err(_)) => {
            writeln!(out, "Invalid id: {}", args[0])?;
            Ok(None)
        }
        None => {
            writeln!(out, "Usage: {} <id>", cmd)?;
            Ok(None)
        }
    }
}

fn print_help(out: &mut impl Write) -> Result<()> {
    writeln!(out, "Commands:")?;
    writeln!(out, "  /exit            - quit")?;
    writeln!(out, "  /help            - show commands")?;
    writeln!(out, "  /show            - show the form and user list")?;
    writeln!(out, "  /refresh         - reload users from the API")?;
    writeln!(out, "Form:")?;
    writeln!(out, "  /name <text>     - set the name field")?;
    writeln!(out, "  /email <text>    - set the email field")?;
    writeln!(out, "  /submit          - add the user, or update the one being edited")?;
    writeln!(out, "Users:")?;
    writeln!(out, "  /edit <id>       - load a user into the form for editing")?;
    writeln!(out, "  /delete <id>     - delete a user")?;
    writeln!(out, "Debugging:")?;
    writeln!(out, "  /diagnostics     - show recent errors")?;
    writeln!(out, "  /session         - show session info")?;
    Ok(())
}
