//! Basic usage example for `encdict`.

use encdict::prelude::*;
use tempfile::TempDir;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("encdict Basic Usage Example");
    println!("===========================\n");

    // Setup: application pepper and a cheap KDF for the demo
    let config = Config::from_hex_pepper("ebf20414c784cd8b8fc70539031d2182")?
        .with_kdf_params(KdfParams { memory_kib: 64 * 1024, iterations: 1, lanes: 4 });
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("example.db");

    // Create a fresh database
    let mut db = EncryptedDatabase::open(&path, "password", &config, OpenMode::New)?;
    println!("✓ Database opened at {}\n", path.display());

    // Store a few values
    db.put(b"user:alice", "alice@example.com")?;
    db.put(b"user:bob", "bob@example.com")?;
    db.put(b"counter", 42_i64)?;
    println!("✓ Stored {} values\n", db.len()?);

    // Read them back
    let email = db.get(b"user:alice")?.unwrap_or_default();
    println!("user:alice = {}", String::from_utf8_lossy(&email));

    let counter = db.get(b"counter")?.map(|raw| Value::decode_int(&raw)).transpose()?;
    println!("counter    = {counter:?}\n");

    // Filter keys by pattern
    for key in db.filter("user:")? {
        println!("matched key: {}", String::from_utf8_lossy(&key?));
    }
    println!();

    // Rotate the password; stored values are not re-encrypted
    db.change_password("password", "new password")?;
    db.close()?;
    println!("✓ Password changed");

    let db = EncryptedDatabase::open(&path, "new password", &config, OpenMode::Write)?;
    assert!(db.get(b"user:bob")?.is_some());
    println!("✓ Reopened with the new password\n");

    // Reopening with the old password fails authentication
    match EncryptedDatabase::open(&path, "password", &config, OpenMode::Write) {
        Err(Error::AuthenticationFailed) => println!("✓ Old password rejected"),
        other => println!("unexpected result: {other:?}"),
    }

    println!("\nThe temporary database is removed on exit");

    Ok(())
}
