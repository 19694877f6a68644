use std::{error::Error, path::Path, process::exit};

use clap::Parser;
use rusqlite::Connection;

use expense_tracker::{Role, get_user_by_email, set_user_role};

/// A utility for changing the role of a registered user, e.g. to make them an admin.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long, env = "DB_PATH")]
    db_path: String,

    /// The email address the user registered with.
    #[arg(long)]
    email: String,

    /// The new role, either USER or ADMIN.
    #[arg(long, default_value = "ADMIN")]
    role: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let db_path = Path::new(&args.db_path);
    validate_db_path(db_path);

    let role: Role = match args.role.parse() {
        Ok(role) => role,
        Err(error) => {
            print_error(error);
            exit(1);
        }
    };

    let conn = Connection::open(db_path)?;

    let Some(user) = get_user_by_email(&args.email, &conn)? else {
        print_error(format!("No user is registered with the email {}", args.email));
        exit(1);
    };

    if user.role == role {
        println!("{} already has the role {role}", user.email);
        return Ok(());
    }

    let user = set_user_role(&user.email, role, &conn)?;
    println!("Changed the role of {} to {}", user.email, user.role);

    Ok(())
}

fn validate_db_path(db_path: &Path) {
    if !db_path.is_file() {
        print_error(format!("File does not exist at {db_path:#?}!"));
        exit(1);
    }
}

fn print_error(error: impl ToString) {
    eprintln!(
        "\x1b[31;1m{}\x1b[0m",
        capitalise_first_char(&error.to_string())
    )
}

/// From https://crates.io/crates/capitalize
fn capitalise_first_char(string: &str) -> String {
    let mut chars = string.chars();
    let Some(first) = chars.next() else {
        return String::with_capacity(0);
    };
    first.to_uppercase().chain(chars).collect()
}
