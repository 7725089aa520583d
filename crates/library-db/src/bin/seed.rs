//! # Seed Data Generator
//!
//! Populates a development database with a small school library.
//!
//! ## Usage
//! ```bash
//! # Seed ./library_dev.db
//! cargo run -p library-db --bin seed
//!
//! # Specify database path and the admin password
//! cargo run -p library-db --bin seed -- --db ./data/library.db --admin-password hunter22
//! ```
//!
//! ## Generated Data
//! - A catalogue of well-known children's and reference titles, each with
//!   one barcode per copy
//! - Students and class monitors
//! - A librarian account `admin`
//! - A few loans: one returned late (with a fine), one still out, one
//!   overdue

use chrono::{Duration, Local};
use library_core::{MemberRole, NewBook, NewMember};
use library_db::{Database, DbConfig};
use std::env;

/// (title, author, genre, isbn, copies)
const BOOKS: &[(&str, &str, &str, &str, i64)] = &[
    ("Matilda", "Roald Dahl", "Fiction", "9780142410370", 3),
    ("The BFG", "Roald Dahl", "Fiction", "9780142410387", 2),
    ("Charlotte's Web", "E. B. White", "Fiction", "9780064400558", 2),
    ("The Hobbit", "J. R. R. Tolkien", "Fantasy", "9780261102217", 2),
    ("A Wrinkle in Time", "Madeleine L'Engle", "Science Fiction", "9780312367541", 1),
    ("Holes", "Louis Sachar", "Fiction", "9780440414803", 2),
    ("The Secret Garden", "Frances Hodgson Burnett", "Classic", "9780141321066", 1),
    ("Wonder", "R. J. Palacio", "Fiction", "9780375869020", 3),
    ("Cosmos", "Carl Sagan", "Science", "9780345539434", 1),
    ("A Short History of Nearly Everything", "Bill Bryson", "Science", "9780767908184", 1),
    ("The Diary of a Young Girl", "Anne Frank", "History", "9780553296983", 2),
    ("Oxford School Atlas", "Oxford University Press", "Reference", "9780198487708", 4),
];

/// (name, contact, role)
const MEMBERS: &[(&str, Option<&str>, MemberRole)] = &[
    ("Amara Okafor", Some("amara.o@school.example"), MemberRole::ClassMonitor),
    ("Ben Carter", None, MemberRole::Student),
    ("Chen Wei", Some("0712 000 111"), MemberRole::Student),
    ("Dina Haddad", None, MemberRole::Student),
    ("Elif Yilmaz", Some("elif.y@school.example"), MemberRole::ClassMonitor),
    ("Finn Murphy", None, MemberRole::Student),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./library_dev.db");
    let mut admin_password = String::from("library-admin");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--admin-password" | "-p" => {
                if i + 1 < args.len() {
                    admin_password = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("School Library Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>                Database file path (default: ./library_dev.db)");
                println!("  -p, --admin-password <PASS>    Password for the 'admin' librarian");
                println!("  -h, --help                     Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 School Library Seed Data Generator");
    println!("=====================================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.books().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} books", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Catalogue
    println!();
    println!("Adding books...");
    let mut book_ids = Vec::with_capacity(BOOKS.len());
    for (title, author, genre, isbn, copies) in BOOKS {
        let book = db
            .books()
            .insert(&NewBook {
                title: title.to_string(),
                author: author.to_string(),
                genre: Some(genre.to_string()),
                isbn: isbn.to_string(),
                copies: *copies,
            })
            .await?;
        db.barcodes().generate(book.id, *copies).await?;
        book_ids.push(book.id);
    }
    println!("  {} books, one barcode per copy", book_ids.len());

    // Members
    println!("Adding members...");
    let today = Local::now().date_naive();
    let mut member_ids = Vec::with_capacity(MEMBERS.len());
    for (idx, (name, contact, role)) in MEMBERS.iter().enumerate() {
        let member = db
            .members()
            .insert(&NewMember {
                name: name.to_string(),
                contact: contact.map(str::to_string),
                role: *role,
                join_date: Some(today - Duration::days(200 - 20 * idx as i64)),
            })
            .await?;
        member_ids.push(member.id);
    }
    println!("  {} members", member_ids.len());

    // Staff
    match db.librarians().create("admin", &admin_password).await {
        Ok(_) => println!("✓ Librarian 'admin' created"),
        Err(e) => eprintln!("Failed to create librarian 'admin': {}", e),
    }

    // A little lending history
    println!("Recording sample loans...");
    let loans = db.loans();

    let late = loans
        .borrow_on(book_ids[0], member_ids[1], None, today - Duration::days(40))
        .await?;
    let returned = loans.return_on(late.id, today - Duration::days(20)).await?;
    println!(
        "  Returned late: loan {} (fine {})",
        returned.id,
        returned.fine().unwrap_or_default()
    );

    let current = loans
        .borrow_on(book_ids[3], member_ids[2], None, today - Duration::days(3))
        .await?;
    println!("  On loan: loan {} due {}", current.id, current.due_date);

    let overdue = loans
        .borrow_on(book_ids[4], member_ids[3], None, today - Duration::days(30))
        .await?;
    println!("  Overdue: loan {} due {}", overdue.id, overdue.due_date);

    println!();
    println!("Verifying...");
    println!("  Active loans:  {}", loans.list_active().await?.len());
    println!("  Overdue loans: {}", loans.list_overdue().await?.len());

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
